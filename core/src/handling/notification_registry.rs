// Notification handler registry: zero or more handlers per notification type
use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::handling::{AnyNotificationHandler, NotificationHandler, NotificationHandlerResolver};
use crate::message::Notification;
use crate::{CourierError, Result};

struct Registration {
    handler_type_name: &'static str,
    factory: Arc<dyn Fn() -> Box<dyn AnyNotificationHandler> + Send + Sync>,
}

/// In-process [`NotificationHandlerResolver`]. Unlike request resolution
/// there is no specialization and no uniqueness rule: every registered
/// handler for the notification type is returned.
#[derive(Default)]
pub struct NotificationHandlerRegistry {
    registrations: DashMap<TypeId, Vec<Registration>>,
}

impl NotificationHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<N, H, F>(&self, factory: F)
    where
        N: Notification + Sized + 'static,
        H: NotificationHandler<N> + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        info!(
            notification = std::any::type_name::<N>(),
            handler = std::any::type_name::<H>(),
            "Registering notification handler"
        );
        let erased: Arc<dyn Fn() -> Box<dyn AnyNotificationHandler> + Send + Sync> =
            Arc::new(move || {
                Box::new(NotificationHandlerAdapter::<N, H> {
                    inner: factory(),
                    _marker: PhantomData,
                })
            });
        self.registrations
            .entry(TypeId::of::<N>())
            .or_insert_with(Vec::new)
            .push(Registration {
                handler_type_name: std::any::type_name::<H>(),
                factory: erased,
            });
    }
}

impl NotificationHandlerResolver for NotificationHandlerRegistry {
    fn create_handlers_for(
        &self,
        notification: &dyn Notification,
    ) -> Vec<Box<dyn AnyNotificationHandler>> {
        match self.registrations.get(&notification.as_any().type_id()) {
            Some(regs) => {
                debug!(
                    notification = notification.type_name(),
                    handlers = regs.len(),
                    "Resolved notification handlers"
                );
                regs.iter().map(|reg| (reg.factory)()).collect()
            }
            None => Vec::new(),
        }
    }

    fn dispose(&self, handler: Box<dyn AnyNotificationHandler>) {
        debug!(handler = handler.type_name(), "Disposing notification handler");
        drop(handler);
    }
}

struct NotificationHandlerAdapter<N: Notification + Sized + 'static, H: NotificationHandler<N>> {
    inner: H,
    _marker: PhantomData<fn() -> N>,
}

#[async_trait]
impl<N, H> AnyNotificationHandler for NotificationHandlerAdapter<N, H>
where
    N: Notification + Sized + 'static,
    H: NotificationHandler<N> + 'static,
{
    fn type_name(&self) -> &'static str {
        std::any::type_name::<H>()
    }

    async fn handle(&self, notification: &dyn Notification) -> Result<()> {
        let typed = notification.as_any().downcast_ref::<N>().ok_or_else(|| {
            CourierError::Contract(format!(
                "handler {} received notification {}, expected {}",
                std::any::type_name::<H>(),
                notification.type_name(),
                std::any::type_name::<N>()
            ))
        })?;
        self.inner.handle(typed).await
    }
}
