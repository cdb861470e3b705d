// Generic interceptor chain: compiled per dispatch, executed front to back
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::Result;

/// Conventional priority bands. Lower values run first (outermost).
pub mod priority {
    pub const HIGH: i32 = 10;
    pub const MEDIUM: i32 = 50;
    pub const LOW: i32 = 90;
}

/// One link of an interceptor chain.
///
/// An interceptor may act before calling [`Next::proceed`], after it, both,
/// or not at all (short-circuiting the rest of the chain). It receives the
/// invocation by value and returns it, possibly mutated.
#[async_trait]
pub trait Interceptor<I: Send + 'static>: Send + Sync {
    /// Lower runs first. Ties keep registration order.
    fn priority(&self) -> i32 {
        priority::MEDIUM
    }

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    async fn intercept(&self, invocation: I, next: Next<'_, I>) -> Result<I>;
}

/// The executor at the end of a chain: the actual processor/handler call.
#[async_trait]
pub trait Terminal<I: Send + 'static>: Send + Sync {
    async fn terminate(&self, invocation: I) -> Result<I>;
}

/// Continuation handle for the remaining chain.
///
/// Consumed by value: a link can advance the chain at most once.
pub struct Next<'a, I: Send + 'static> {
    links: &'a [Arc<dyn Interceptor<I>>],
    terminal: &'a dyn Terminal<I>,
}

impl<'a, I: Send + 'static> Next<'a, I> {
    /// Advances to the next link, or to the terminal when the links are
    /// exhausted.
    pub async fn proceed(self, invocation: I) -> Result<I> {
        match self.links.split_first() {
            Some((head, rest)) => {
                debug!(link = head.name(), "Advancing interceptor chain");
                head.intercept(
                    invocation,
                    Next {
                        links: rest,
                        terminal: self.terminal,
                    },
                )
                .await
            }
            None => self.terminal.terminate(invocation).await,
        }
    }
}

/// A compiled chain: interceptors stable-sorted by priority, then executed
/// around a terminal. Each dispatch call runs the chain against its own
/// invocation instance; the chain itself holds no per-dispatch state.
pub struct InvocationChain<I: Send + 'static> {
    links: Vec<Arc<dyn Interceptor<I>>>,
}

impl<I: Send + 'static> InvocationChain<I> {
    pub fn new(mut links: Vec<Arc<dyn Interceptor<I>>>) -> Self {
        // sort_by_key is stable: equal priorities keep registration order
        links.sort_by_key(|link| link.priority());
        Self { links }
    }

    pub fn empty() -> Self {
        Self { links: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub async fn execute(&self, invocation: I, terminal: &dyn Terminal<I>) -> Result<I> {
        Next {
            links: self.links.as_slice(),
            terminal,
        }
        .proceed(invocation)
        .await
    }
}
