//! Handler contracts and in-process handler resolution.
//!
//! Application code implements the typed [`RequestHandler`] /
//! [`NotificationHandler`] traits; the registries erase them behind
//! [`AnyRequestHandler`] / [`AnyNotificationHandler`] so the local
//! processors can resolve and invoke handlers without knowing concrete
//! types. The resolver contracts are the seam an external DI container can
//! plug into instead of the in-process registries.

pub mod notification_registry;
pub mod registry;

// Re-export key types for ergonomic access
pub use notification_registry::NotificationHandlerRegistry;
pub use registry::{HandlerRegistry, Specialization};

use async_trait::async_trait;

use crate::message::{BoxResponse, Notification, Request, TypedRequest};
use crate::Result;

/// Typed handler for one request type.
#[async_trait]
pub trait RequestHandler<R: TypedRequest>: Send + Sync {
    async fn handle(&self, request: &R) -> Result<R::Response>;
}

/// Typed handler for one notification type.
#[async_trait]
pub trait NotificationHandler<N: Notification>: Send + Sync {
    async fn handle(&self, notification: &N) -> Result<()>;
}

/// Type-erased request handler, as resolved and invoked by the local
/// request processor.
#[async_trait]
pub trait AnyRequestHandler: Send + Sync {
    fn type_name(&self) -> &'static str;

    async fn handle(&self, request: &dyn Request) -> Result<BoxResponse>;
}

impl std::fmt::Debug for dyn AnyRequestHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnyRequestHandler")
            .field("type_name", &self.type_name())
            .finish()
    }
}

/// Type-erased notification handler.
#[async_trait]
pub trait AnyNotificationHandler: Send + Sync {
    fn type_name(&self) -> &'static str;

    async fn handle(&self, notification: &dyn Notification) -> Result<()>;
}

/// Resolves request handlers. One handler per request; creation fails on
/// missing or ambiguous registrations. Handlers are disposed through the
/// resolver that created them, even when handling failed.
pub trait HandlerResolver: Send + Sync {
    fn can_create_handler_for(&self, request: &dyn Request) -> bool;

    fn create_handler_for(&self, request: &dyn Request) -> Result<Box<dyn AnyRequestHandler>>;

    fn dispose(&self, handler: Box<dyn AnyRequestHandler>);
}

/// Resolves notification handlers: zero or more per notification.
pub trait NotificationHandlerResolver: Send + Sync {
    fn create_handlers_for(
        &self,
        notification: &dyn Notification,
    ) -> Vec<Box<dyn AnyNotificationHandler>>;

    fn dispose(&self, handler: Box<dyn AnyNotificationHandler>);
}
