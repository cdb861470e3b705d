// Request handler registry with context-based specialization
use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::handling::{AnyRequestHandler, HandlerResolver, RequestHandler};
use crate::message::{BoxResponse, Context, Request, TypedRequest};
use crate::{CourierError, Result};

/// Context predicate restricting when a handler registration applies.
///
/// Specificity is ranked: a key/value match beats a key-presence match,
/// which beats an unspecialized registration. The unspecialized form always
/// matches and acts as the fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Specialization {
    None,
    ContextKey(String),
    ContextKeyValue(String, String),
}

impl Specialization {
    pub fn key(key: impl Into<String>) -> Self {
        Self::ContextKey(key.into())
    }

    pub fn key_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::ContextKeyValue(key.into(), value.into())
    }

    fn score(&self) -> u8 {
        match self {
            Specialization::None => 0,
            Specialization::ContextKey(_) => 1,
            Specialization::ContextKeyValue(_, _) => 2,
        }
    }

    fn matches(&self, context: &Context) -> bool {
        match self {
            Specialization::None => true,
            Specialization::ContextKey(key) => context.contains_key(key),
            Specialization::ContextKeyValue(key, value) => {
                context.get(key).map(|v| v == value).unwrap_or(false)
            }
        }
    }
}

impl fmt::Display for Specialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Specialization::None => write!(f, "general"),
            Specialization::ContextKey(key) => write!(f, "context[{key}]"),
            Specialization::ContextKeyValue(key, value) => write!(f, "context[{key}={value}]"),
        }
    }
}

struct Registration {
    handler_type_name: &'static str,
    specialization: Specialization,
    factory: Arc<dyn Fn() -> Box<dyn AnyRequestHandler> + Send + Sync>,
}

/// In-process [`HandlerResolver`]: one ranked-predicate registration list
/// per request type, evaluated against the live request context on every
/// resolution.
#[derive(Default)]
pub struct HandlerRegistry {
    registrations: DashMap<TypeId, Vec<Registration>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an unspecialized handler for `R`.
    pub fn register<R, H, F>(&self, factory: F)
    where
        R: TypedRequest,
        H: RequestHandler<R> + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        self.register_specialized::<R, H, F>(Specialization::None, factory);
    }

    /// Registers a handler for `R` restricted by a context predicate.
    pub fn register_specialized<R, H, F>(&self, specialization: Specialization, factory: F)
    where
        R: TypedRequest,
        H: RequestHandler<R> + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        info!(
            request = std::any::type_name::<R>(),
            handler = std::any::type_name::<H>(),
            specialization = %specialization,
            "Registering request handler"
        );
        let erased: Arc<dyn Fn() -> Box<dyn AnyRequestHandler> + Send + Sync> =
            Arc::new(move || {
                Box::new(RequestHandlerAdapter::<R, H> {
                    inner: factory(),
                    _marker: PhantomData,
                })
            });
        self.registrations
            .entry(TypeId::of::<R>())
            .or_insert_with(Vec::new)
            .push(Registration {
                handler_type_name: std::any::type_name::<H>(),
                specialization,
                factory: erased,
            });
    }
}

impl HandlerResolver for HandlerRegistry {
    fn can_create_handler_for(&self, request: &dyn Request) -> bool {
        self.registrations
            .get(&request.as_any().type_id())
            .map(|regs| !regs.is_empty())
            .unwrap_or(false)
    }

    fn create_handler_for(&self, request: &dyn Request) -> Result<Box<dyn AnyRequestHandler>> {
        let regs = self
            .registrations
            .get(&request.as_any().type_id())
            .ok_or_else(|| {
                CourierError::Resolution(format!(
                    "no handler registered for request {}",
                    request.type_name()
                ))
            })?;

        // Most specific satisfied predicate wins; re-evaluated against the
        // live context on every call, never cached per request type.
        let mut best_score = 0u8;
        let mut winners: Vec<&Registration> = Vec::new();
        for reg in regs.iter() {
            if !reg.specialization.matches(request.context()) {
                continue;
            }
            let score = reg.specialization.score();
            if winners.is_empty() || score > best_score {
                best_score = score;
                winners.clear();
                winners.push(reg);
            } else if score == best_score {
                winners.push(reg);
            }
        }

        match winners.len() {
            0 => Err(CourierError::Resolution(format!(
                "no handler applies to request {} with its current context",
                request.type_name()
            ))),
            1 => {
                debug!(
                    request = request.type_name(),
                    handler = winners[0].handler_type_name,
                    "Resolved request handler"
                );
                Ok((winners[0].factory)())
            }
            _ => {
                let tied: Vec<&str> = winners.iter().map(|reg| reg.handler_type_name).collect();
                Err(CourierError::Resolution(format!(
                    "request {} resolves ambiguously between [{}]",
                    request.type_name(),
                    tied.join(", ")
                )))
            }
        }
    }

    fn dispose(&self, handler: Box<dyn AnyRequestHandler>) {
        // Handler instances are created per request; dropping the erased box
        // releases the instance and everything its factory gave it.
        debug!(handler = handler.type_name(), "Disposing request handler");
        drop(handler);
    }
}

struct RequestHandlerAdapter<R: TypedRequest, H: RequestHandler<R>> {
    inner: H,
    _marker: PhantomData<fn() -> R>,
}

#[async_trait]
impl<R, H> AnyRequestHandler for RequestHandlerAdapter<R, H>
where
    R: TypedRequest,
    H: RequestHandler<R> + 'static,
{
    fn type_name(&self) -> &'static str {
        std::any::type_name::<H>()
    }

    async fn handle(&self, request: &dyn Request) -> Result<BoxResponse> {
        let typed = request.as_any().downcast_ref::<R>().ok_or_else(|| {
            CourierError::Contract(format!(
                "handler {} received request {}, expected {}",
                std::any::type_name::<H>(),
                request.type_name(),
                std::any::type_name::<R>()
            ))
        })?;
        let response = self.inner.handle(typed).await?;
        Ok(Box::new(response))
    }
}
