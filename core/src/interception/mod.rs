//! Ordered interceptor chains wrapped around every dispatch operation.
//!
//! One generic mechanism serves all four operation kinds (send, notify,
//! request handling, notification handling); only the invocation payload
//! and the terminal behavior differ.

pub mod chain;
pub mod invocation;

// Re-export key types for ergonomic access
pub use chain::{priority, Interceptor, InvocationChain, Next, Terminal};
pub use invocation::{
    NotificationHandleInvocation, NotifyInvocation, RequestHandleInvocation, SendInvocation,
};
