use std::any::Any;

use chrono::{DateTime, Utc};

use crate::message::envelope::{Context, CorrelationId, MessageInfo};
use crate::message::response::Response;
use crate::{CourierError, Result};

/// Per-request metadata embedded by every concrete request type.
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    pub message: MessageInfo,
    pub context: Context,
    pub group_name: Option<String>,
}

impl RequestInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata for a request spawned while handling another message,
    /// carrying that message's correlation id forward.
    pub fn spawned_from(correlation_id: CorrelationId) -> Self {
        Self {
            message: MessageInfo::spawned_from(correlation_id),
            context: Context::new(),
            group_name: None,
        }
    }

    /// Sets an explicit routing group and returns self for chaining.
    pub fn with_group(mut self, group_name: impl Into<String>) -> Self {
        self.group_name = Some(group_name.into());
        self
    }

    /// Inserts a context entry and returns self for chaining.
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// A dispatchable request, as seen by the engine.
///
/// Concrete request types embed a [`RequestInfo`] and implement the three
/// accessor methods; everything else is provided. The typed pairing with a
/// response lives on [`TypedRequest`].
pub trait Request: Send + Sync {
    fn request_info(&self) -> &RequestInfo;

    fn request_info_mut(&mut self) -> &mut RequestInfo;

    fn as_any(&self) -> &dyn Any;

    fn correlation_id(&self) -> CorrelationId {
        self.request_info().message.correlation_id
    }

    fn created_at_utc(&self) -> DateTime<Utc> {
        self.request_info().message.created_at_utc
    }

    fn context(&self) -> &Context {
        &self.request_info().context
    }

    /// Replaces the whole context map.
    fn set_context(&mut self, context: Context) {
        self.request_info_mut().context = context;
    }

    /// Routing/transport affinity label.
    ///
    /// Defaults to the module path of the implementing type unless an
    /// explicit group was set on the request info.
    fn group_name(&self) -> String {
        match &self.request_info().group_name {
            Some(group) => group.clone(),
            None => default_group_name(std::any::type_name::<Self>()),
        }
    }

    /// True only for side-effect-free requests. Only such requests may be
    /// batched together in a single multi-request send.
    fn is_side_effect_free(&self) -> bool {
        false
    }

    /// Key under which caching interceptors may store this request's
    /// response. Errors unless the request type opts in with an override.
    fn cache_key(&self) -> Result<String> {
        Err(CourierError::CacheKeyUndefined(
            std::any::type_name::<Self>().to_string(),
        ))
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// The typed side of a request: its paired response type.
pub trait TypedRequest: Request + Sized + 'static {
    type Response: Response + Sized + 'static;

    /// Instantiates the paired response, copying this request's correlation
    /// id ([`crate::message::ResponseInfo::replying_to`] is the supported
    /// way to do that).
    fn create_response(&self) -> Self::Response;
}

/// Derives the default group name from a fully qualified type path:
/// everything up to the type's own name.
pub(crate) fn default_group_name(type_path: &str) -> String {
    match type_path.rsplit_once("::") {
        Some((module, _)) => module.to_string(),
        None => type_path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::response::ResponseInfo;

    struct Probe {
        info: RequestInfo,
    }

    impl Request for Probe {
        fn request_info(&self) -> &RequestInfo {
            &self.info
        }

        fn request_info_mut(&mut self) -> &mut RequestInfo {
            &mut self.info
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct ProbeResponse {
        info: ResponseInfo,
    }

    impl Response for ProbeResponse {
        fn response_info(&self) -> &ResponseInfo {
            &self.info
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
            self
        }
    }

    impl TypedRequest for Probe {
        type Response = ProbeResponse;

        fn create_response(&self) -> ProbeResponse {
            ProbeResponse {
                info: ResponseInfo::replying_to(self),
            }
        }
    }

    #[test]
    fn default_group_is_the_defining_module() {
        let probe = Probe {
            info: RequestInfo::new(),
        };
        assert_eq!(
            probe.group_name(),
            "courier_core::message::request::tests"
        );
    }

    #[test]
    fn explicit_group_wins_over_default() {
        let probe = Probe {
            info: RequestInfo::new().with_group("billing"),
        };
        assert_eq!(probe.group_name(), "billing");
    }

    #[test]
    fn cache_key_errors_unless_overridden() {
        let probe = Probe {
            info: RequestInfo::new(),
        };
        assert!(matches!(
            probe.cache_key(),
            Err(CourierError::CacheKeyUndefined(_))
        ));
    }

    #[test]
    fn created_response_copies_the_correlation_id() {
        let probe = Probe {
            info: RequestInfo::new(),
        };
        let response = probe.create_response();
        assert_eq!(response.correlation_id(), probe.correlation_id());
    }

    #[test]
    fn context_is_replaced_as_a_whole() {
        let mut probe = Probe {
            info: RequestInfo::new().with_context_entry("tenant", "acme"),
        };
        let mut replacement = Context::new();
        replacement.insert("lang".to_string(), "fr".to_string());
        probe.set_context(replacement);
        assert!(probe.context().get("tenant").is_none());
        assert_eq!(probe.context().get("lang").map(String::as_str), Some("fr"));
    }
}
