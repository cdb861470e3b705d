use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ambient key/value metadata carried by requests and notifications.
///
/// The context travels with a message across process boundaries and is the
/// input to handler specialization: a handler may declare that it only
/// applies when a given key (or key/value pair) is present.
pub type Context = HashMap<String, String>;

/// Identifier linking a request to its response and to any message spawned
/// while handling it.
///
/// Generated at message construction and copied, never regenerated, along
/// the causal chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Correlation and creation metadata shared by every message kind.
///
/// Embedded by `RequestInfo`, `NotificationInfo` and `ResponseInfo`.
#[derive(Debug, Clone)]
pub struct MessageInfo {
    pub correlation_id: CorrelationId,
    pub created_at_utc: DateTime<Utc>,
}

impl MessageInfo {
    /// Fresh metadata with a newly generated correlation id.
    pub fn new() -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            created_at_utc: Utc::now(),
        }
    }

    /// Metadata for a message spawned while handling another message.
    ///
    /// The parent's correlation id is preserved so the causal chain stays
    /// traceable end-to-end.
    pub fn spawned_from(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            created_at_utc: Utc::now(),
        }
    }
}

impl Default for MessageInfo {
    fn default() -> Self {
        Self::new()
    }
}
