use std::any::Any;

use chrono::{DateTime, Utc};

use crate::message::envelope::{Context, CorrelationId, MessageInfo};
use crate::message::request::default_group_name;

/// Per-notification metadata embedded by every concrete notification type.
#[derive(Debug, Clone, Default)]
pub struct NotificationInfo {
    pub message: MessageInfo,
    pub context: Context,
    pub group_name: Option<String>,
}

impl NotificationInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata for a notification spawned while handling another message.
    pub fn spawned_from(correlation_id: CorrelationId) -> Self {
        Self {
            message: MessageInfo::spawned_from(correlation_id),
            context: Context::new(),
            group_name: None,
        }
    }

    pub fn with_group(mut self, group_name: impl Into<String>) -> Self {
        self.group_name = Some(group_name.into());
        self
    }
}

/// A fire-and-forget message fanned out to every matching handler.
///
/// Same shape as a request minus the paired response type.
pub trait Notification: Send + Sync {
    fn notification_info(&self) -> &NotificationInfo;

    fn notification_info_mut(&mut self) -> &mut NotificationInfo;

    fn as_any(&self) -> &dyn Any;

    fn correlation_id(&self) -> CorrelationId {
        self.notification_info().message.correlation_id
    }

    fn created_at_utc(&self) -> DateTime<Utc> {
        self.notification_info().message.created_at_utc
    }

    fn context(&self) -> &Context {
        &self.notification_info().context
    }

    fn set_context(&mut self, context: Context) {
        self.notification_info_mut().context = context;
    }

    fn group_name(&self) -> String {
        match &self.notification_info().group_name {
            Some(group) => group.clone(),
            None => default_group_name(std::any::type_name::<Self>()),
        }
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
