//! Message model: requests, responses, notifications, and batches.
//!
//! This module provides the leaf data types the dispatch engine is built on:
//! - `CorrelationId` / `MessageInfo`: correlation and creation metadata
//! - `Request` / `TypedRequest`: dispatchable requests with a paired response type
//! - `Response`: correlated results
//! - `Notification`: fire-and-forget messages fanned out to many handlers
//! - `RequestBatch` / `ResponsesGroup`: identity-keyed batching primitives

pub mod batch;
pub mod envelope;
pub mod notification;
pub mod request;
pub mod response;

// Re-export key types for ergonomic access
pub use batch::{KeyedRequest, RequestBatch, RequestKey, ResponsesGroup};
pub use envelope::{Context, CorrelationId, MessageInfo};
pub use notification::{Notification, NotificationInfo};
pub use request::{Request, RequestInfo, TypedRequest};
pub use response::{BoxResponse, Response, ResponseInfo};
