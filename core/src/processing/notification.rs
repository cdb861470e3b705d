// Local notification processor: detached unit per (notification, handler)
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::handling::{AnyNotificationHandler, NotificationHandlerResolver};
use crate::interception::{Interceptor, InvocationChain, NotificationHandleInvocation, Terminal};
use crate::message::Notification;
use crate::processing::NotificationProcessor;
use crate::Result;

/// Delivers notifications to every matching in-process handler.
///
/// Every (notification, handler) pair becomes a detached fire-and-forget
/// unit: its own chain run, its own error boundary. A failing handler is
/// logged and swallowed; siblings are unaffected and the `process` call
/// never blocks on handler completion.
pub struct LocalNotificationProcessor {
    name: String,
    resolver: Arc<dyn NotificationHandlerResolver>,
    chain: Arc<InvocationChain<NotificationHandleInvocation>>,
}

impl LocalNotificationProcessor {
    pub fn new(resolver: Arc<dyn NotificationHandlerResolver>) -> Self {
        Self {
            name: std::any::type_name::<Self>().to_string(),
            resolver,
            chain: Arc::new(InvocationChain::empty()),
        }
    }

    pub fn with_interceptors(
        mut self,
        interceptors: Vec<Arc<dyn Interceptor<NotificationHandleInvocation>>>,
    ) -> Self {
        self.chain = Arc::new(InvocationChain::new(interceptors));
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl NotificationProcessor for LocalNotificationProcessor {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn process(&self, notifications: Vec<Arc<dyn Notification>>) {
        for notification in notifications {
            let handlers = self.resolver.create_handlers_for(&*notification);
            if handlers.is_empty() {
                debug!(
                    processor = %self.name,
                    notification = notification.type_name(),
                    "No handlers for notification"
                );
                continue;
            }
            for handler in handlers {
                spawn_unit(
                    self.chain.clone(),
                    self.resolver.clone(),
                    notification.clone(),
                    handler,
                );
            }
        }
    }
}

fn spawn_unit(
    chain: Arc<InvocationChain<NotificationHandleInvocation>>,
    resolver: Arc<dyn NotificationHandlerResolver>,
    notification: Arc<dyn Notification>,
    handler: Box<dyn AnyNotificationHandler>,
) {
    tokio::spawn(async move {
        let notification_type = notification.type_name();
        let handler_name = handler.type_name();
        let terminal = InvokeHandlerTerminal { handler };
        let invocation = NotificationHandleInvocation::new(notification);
        let outcome = chain.execute(invocation, &terminal).await;
        // Handler release happens whether the unit succeeded or not.
        resolver.dispose(terminal.handler);
        if let Err(err) = outcome {
            warn!(
                notification = notification_type,
                handler = handler_name,
                error = %err,
                "Notification handler failed; delivery is best-effort"
            );
        }
    });
}

struct InvokeHandlerTerminal {
    handler: Box<dyn AnyNotificationHandler>,
}

#[async_trait]
impl Terminal<NotificationHandleInvocation> for InvokeHandlerTerminal {
    async fn terminate(
        &self,
        invocation: NotificationHandleInvocation,
    ) -> Result<NotificationHandleInvocation> {
        self.handler.handle(&*invocation.notification).await?;
        Ok(invocation)
    }
}
