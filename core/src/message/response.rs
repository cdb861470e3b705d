use std::any::Any;

use chrono::{DateTime, Utc};

use crate::message::envelope::{CorrelationId, MessageInfo};
use crate::message::request::Request;

/// Per-response metadata embedded by every concrete response type.
#[derive(Debug, Clone, Default)]
pub struct ResponseInfo {
    pub message: MessageInfo,
}

impl ResponseInfo {
    /// Metadata for a response to the given request: same correlation id,
    /// fresh creation timestamp.
    pub fn replying_to(request: &(impl Request + ?Sized)) -> Self {
        Self {
            message: MessageInfo::spawned_from(request.correlation_id()),
        }
    }

    /// Metadata correlated to an already known id.
    pub fn correlated(correlation_id: CorrelationId) -> Self {
        Self {
            message: MessageInfo::spawned_from(correlation_id),
        }
    }
}

/// A correlated result, as seen by the engine.
///
/// The `as_any`/`into_any` accessors let the bus and the deferred-response
/// wrapper recover the concrete type; application code reads responses
/// through those typed views, never through the erased box directly.
pub trait Response: Send + Sync {
    fn response_info(&self) -> &ResponseInfo;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;

    fn correlation_id(&self) -> CorrelationId {
        self.response_info().message.correlation_id
    }

    fn created_at_utc(&self) -> DateTime<Utc> {
        self.response_info().message.created_at_utc
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

pub type BoxResponse = Box<dyn Response>;

impl std::fmt::Debug for dyn Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("type_name", &self.type_name())
            .field("info", self.response_info())
            .finish()
    }
}
