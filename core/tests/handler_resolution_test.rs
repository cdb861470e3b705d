use std::any::Any;

use async_trait::async_trait;
use courier_core::{
    AnyRequestHandler, CourierError, HandlerRegistry, HandlerResolver, Request, RequestHandler,
    RequestInfo, Response, ResponseInfo, Result, Specialization, TypedRequest,
};

struct GreetRequest {
    info: RequestInfo,
}

impl GreetRequest {
    fn new() -> Self {
        Self {
            info: RequestInfo::new(),
        }
    }

    fn with_context(key: &str, value: &str) -> Self {
        Self {
            info: RequestInfo::new().with_context_entry(key, value),
        }
    }
}

impl Request for GreetRequest {
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

struct GreetResponse {
    info: ResponseInfo,
    greeting: String,
}

impl Response for GreetResponse {
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

impl TypedRequest for GreetRequest {
    type Response = GreetResponse;

    fn create_response(&self) -> GreetResponse {
        GreetResponse {
            info: ResponseInfo::replying_to(self),
            greeting: String::new(),
        }
    }
}

macro_rules! greeter {
    ($name:ident, $greeting:expr) => {
        struct $name;

        #[async_trait]
        impl RequestHandler<GreetRequest> for $name {
            async fn handle(&self, request: &GreetRequest) -> Result<GreetResponse> {
                let mut response = request.create_response();
                response.greeting = $greeting.to_string();
                Ok(response)
            }
        }
    };
}

greeter!(GeneralGreeter, "hello");
greeter!(TenantGreeter, "hello tenant");
greeter!(AcmeGreeter, "hello acme");
greeter!(RivalTenantGreeter, "hello rival");
greeter!(SecondGeneralGreeter, "hello again");

async fn resolve_greeting(registry: &HandlerRegistry, request: &GreetRequest) -> Result<String> {
    let handler = registry.create_handler_for(request)?;
    let response = handler.handle(request).await?;
    let greeting = response
        .as_any()
        .downcast_ref::<GreetResponse>()
        .expect("greet response")
        .greeting
        .clone();
    Ok(greeting)
}

#[tokio::test]
async fn general_handler_is_the_fallback() {
    let registry = HandlerRegistry::new();
    registry.register::<GreetRequest, _, _>(|| GeneralGreeter);
    registry.register_specialized::<GreetRequest, _, _>(Specialization::key("tenant"), || {
        TenantGreeter
    });

    let plain = GreetRequest::new();
    assert_eq!(resolve_greeting(&registry, &plain).await.unwrap(), "hello");

    let tenanted = GreetRequest::with_context("tenant", "acme");
    assert_eq!(
        resolve_greeting(&registry, &tenanted).await.unwrap(),
        "hello tenant"
    );
}

#[tokio::test]
async fn key_value_specialization_beats_key_presence() {
    let registry = HandlerRegistry::new();
    registry.register::<GreetRequest, _, _>(|| GeneralGreeter);
    registry.register_specialized::<GreetRequest, _, _>(Specialization::key("tenant"), || {
        TenantGreeter
    });
    registry.register_specialized::<GreetRequest, _, _>(
        Specialization::key_value("tenant", "acme"),
        || AcmeGreeter,
    );

    let acme = GreetRequest::with_context("tenant", "acme");
    assert_eq!(
        resolve_greeting(&registry, &acme).await.unwrap(),
        "hello acme"
    );

    let other = GreetRequest::with_context("tenant", "globex");
    assert_eq!(
        resolve_greeting(&registry, &other).await.unwrap(),
        "hello tenant"
    );
}

#[tokio::test]
async fn equally_specific_matches_are_ambiguous_and_name_both() {
    let registry = HandlerRegistry::new();
    registry.register_specialized::<GreetRequest, _, _>(Specialization::key("tenant"), || {
        TenantGreeter
    });
    registry.register_specialized::<GreetRequest, _, _>(Specialization::key("tenant"), || {
        RivalTenantGreeter
    });

    let request = GreetRequest::with_context("tenant", "acme");
    let err = registry.create_handler_for(&request).unwrap_err();
    match err {
        CourierError::Resolution(message) => {
            assert!(message.contains("TenantGreeter"));
            assert!(message.contains("RivalTenantGreeter"));
            assert!(message.contains("GreetRequest"));
        }
        other => panic!("expected resolution error, got {other}"),
    }
}

#[tokio::test]
async fn two_general_handlers_without_a_specialized_winner_are_ambiguous() {
    let registry = HandlerRegistry::new();
    registry.register::<GreetRequest, _, _>(|| GeneralGreeter);
    registry.register::<GreetRequest, _, _>(|| SecondGeneralGreeter);
    registry.register_specialized::<GreetRequest, _, _>(Specialization::key("tenant"), || {
        TenantGreeter
    });

    // Specialized handler satisfied: no ambiguity
    let tenanted = GreetRequest::with_context("tenant", "acme");
    assert_eq!(
        resolve_greeting(&registry, &tenanted).await.unwrap(),
        "hello tenant"
    );

    // No specialized winner: the two generals tie
    let plain = GreetRequest::new();
    assert!(matches!(
        registry.create_handler_for(&plain),
        Err(CourierError::Resolution(_))
    ));
}

#[tokio::test]
async fn resolution_is_reevaluated_per_request() {
    let registry = HandlerRegistry::new();
    registry.register::<GreetRequest, _, _>(|| GeneralGreeter);
    registry.register_specialized::<GreetRequest, _, _>(Specialization::key("tenant"), || {
        TenantGreeter
    });

    // Same request type, different contexts, interleaved
    for _ in 0..2 {
        let plain = GreetRequest::new();
        assert_eq!(resolve_greeting(&registry, &plain).await.unwrap(), "hello");
        let tenanted = GreetRequest::with_context("tenant", "acme");
        assert_eq!(
            resolve_greeting(&registry, &tenanted).await.unwrap(),
            "hello tenant"
        );
    }
}

#[tokio::test]
async fn unregistered_request_type_cannot_resolve() {
    let registry = HandlerRegistry::new();
    let request = GreetRequest::new();

    assert!(!registry.can_create_handler_for(&request));
    assert!(matches!(
        registry.create_handler_for(&request),
        Err(CourierError::Resolution(_))
    ));
}
