//! Processor contracts and the in-process executors.
//!
//! A processor turns a batch of requests into responses (locally or via a
//! remote transport); a notification processor delivers notification
//! batches. The bus routes each request to exactly one request processor
//! and fans every notification batch out to all notification processors.

pub mod local;
pub mod notification;

// Re-export key types for ergonomic access
pub use local::LocalRequestProcessor;
pub use notification::LocalNotificationProcessor;

use std::sync::Arc;

use async_trait::async_trait;

use crate::message::{Notification, Request, RequestBatch, ResponsesGroup};
use crate::Result;

/// A component able to turn a batch of requests into responses.
///
/// One or more are registered with the bus; for any given request exactly
/// one of them must answer `can_process` with true.
#[async_trait]
pub trait RequestProcessor: Send + Sync {
    /// Name used in routing diagnostics.
    fn name(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }

    fn can_process(&self, request: &dyn Request) -> bool;

    /// Must return a group covering exactly the requests it was given.
    async fn process(&self, batch: RequestBatch) -> Result<ResponsesGroup>;
}

/// A component delivering notification batches. Zero or more are
/// registered; each receives every notified batch in full.
#[async_trait]
pub trait NotificationProcessor: Send + Sync {
    fn name(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }

    /// Best-effort delivery: implementations log failures internally and
    /// never surface them to the notifier.
    async fn process(&self, notifications: Vec<Arc<dyn Notification>>);
}
