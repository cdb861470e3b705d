// Courier Core Library
// Typed request/response and notification dispatch engine

pub mod bus;
pub mod handling;
pub mod interception;
pub mod message;
pub mod processing;
pub mod stateful;
pub mod telemetry;

// Export core types
pub use bus::{AsyncSendHandle, GroupStats, MessageBus, MessageBusBuilder};
pub use handling::{
    AnyNotificationHandler, AnyRequestHandler, HandlerRegistry, HandlerResolver,
    NotificationHandler, NotificationHandlerRegistry, NotificationHandlerResolver, RequestHandler,
    Specialization,
};
pub use interception::{
    priority, Interceptor, InvocationChain, Next, NotificationHandleInvocation, NotifyInvocation,
    RequestHandleInvocation, SendInvocation, Terminal,
};
pub use message::{
    BoxResponse, Context, CorrelationId, KeyedRequest, MessageInfo, Notification,
    NotificationInfo, Request, RequestBatch, RequestInfo, RequestKey, Response, ResponseInfo,
    ResponsesGroup, TypedRequest,
};
pub use processing::{
    LocalNotificationProcessor, LocalRequestProcessor, NotificationProcessor, RequestProcessor,
};
pub use stateful::{DeferredResponse, StatefulMessageBus};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CourierError {
    #[error("Routing error: {0}")]
    Routing(String),

    #[error("Handler resolution error: {0}")]
    Resolution(String),

    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Batch execution error: {} worker(s) failed: [{}]", .0.len(), .0.join("; "))]
    Aggregate(Vec<String>),

    #[error("Send quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Contract violation: {0}")]
    Contract(String),

    #[error("No cache key defined for {0}")]
    CacheKeyUndefined(String),

    #[error("Deferred send failed: {0}")]
    DeferredSendFailed(String),
}

pub type Result<T> = std::result::Result<T, CourierError>;
