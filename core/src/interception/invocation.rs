// The four invocation payload shapes carried through interceptor chains
use std::sync::Arc;

use crate::message::{BoxResponse, Notification, RequestBatch, RequestKey, ResponsesGroup};

/// Payload of a bus-level send: the outgoing batch and, once the terminal
/// (or a short-circuiting interceptor) has run, the responses.
pub struct SendInvocation {
    pub requests: RequestBatch,
    pub responses: Option<ResponsesGroup>,
}

impl SendInvocation {
    pub fn new(requests: RequestBatch) -> Self {
        Self {
            requests,
            responses: None,
        }
    }
}

/// Payload of a bus-level notify: the notification batch fanned out to
/// every registered notification processor.
pub struct NotifyInvocation {
    pub notifications: Vec<Arc<dyn Notification>>,
}

impl NotifyInvocation {
    pub fn new(notifications: Vec<Arc<dyn Notification>>) -> Self {
        Self { notifications }
    }
}

/// Payload of one local request-handling worker.
pub struct RequestHandleInvocation {
    pub key: RequestKey,
    pub request: Box<dyn crate::message::Request>,
    pub response: Option<BoxResponse>,
}

impl RequestHandleInvocation {
    pub fn new(key: RequestKey, request: Box<dyn crate::message::Request>) -> Self {
        Self {
            key,
            request,
            response: None,
        }
    }
}

/// Payload of one fire-and-forget notification-handling unit.
pub struct NotificationHandleInvocation {
    pub notification: Arc<dyn Notification>,
}

impl NotificationHandleInvocation {
    pub fn new(notification: Arc<dyn Notification>) -> Self {
        Self { notification }
    }
}
