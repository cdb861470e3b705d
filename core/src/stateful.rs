// Stateful message bus: deferred sends coalesced into one physical batch
use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::bus::MessageBus;
use crate::message::{
    KeyedRequest, Notification, RequestBatch, RequestKey, Response, ResponsesGroup, TypedRequest,
};
use crate::{CourierError, Result};

struct DeferredState {
    pending: Vec<KeyedRequest>,
    received: HashMap<RequestKey, Arc<dyn Any + Send + Sync>>,
    failed: HashMap<RequestKey, String>,
    sends: u32,
}

/// Bus variant that defers sends and batches them behind lazy responses.
///
/// `future_send` performs no I/O: the request is parked and a
/// [`DeferredResponse`] is returned. The first read of any deferred
/// response flushes **all** currently pending requests as a single physical
/// batch, so several logical sends cost one dispatch. A configurable quota
/// bounds the number of physical sends.
///
/// Instance state is lock-protected, but the component is meant for a
/// single logical caller; it is not a concurrency primitive.
pub struct StatefulMessageBus {
    bus: MessageBus,
    max_allowed_sends: i32,
    state: Arc<Mutex<DeferredState>>,
}

impl StatefulMessageBus {
    pub fn new(bus: MessageBus) -> Self {
        Self {
            bus,
            max_allowed_sends: 0,
            state: Arc::new(Mutex::new(DeferredState {
                pending: Vec::new(),
                received: HashMap::new(),
                failed: HashMap::new(),
                sends: 0,
            })),
        }
    }

    /// Caps the number of physical send batches. Zero or negative disables
    /// the quota.
    pub fn with_max_allowed_sends(mut self, max_allowed_sends: i32) -> Self {
        self.max_allowed_sends = max_allowed_sends;
        self
    }

    pub fn max_allowed_sends(&self) -> i32 {
        self.max_allowed_sends
    }

    /// Number of deferred requests not yet flushed.
    pub fn pending_count(&self) -> usize {
        self.state.lock().expect("deferred state lock poisoned").pending.len()
    }

    /// Defers a send. Only side-effect-free requests are accepted, since
    /// the flush may batch this request with other pending ones.
    pub fn future_send<R>(&self, request: R) -> Result<DeferredResponse<R::Response>>
    where
        R: TypedRequest,
    {
        if !request.is_side_effect_free() {
            return Err(CourierError::Contract(format!(
                "request {} is not side-effect free and cannot be deferred",
                request.type_name()
            )));
        }
        let key = RequestKey::next();
        let mut state = self.state.lock().expect("deferred state lock poisoned");
        state.pending.push(KeyedRequest {
            key,
            request: Box::new(request),
        });
        debug!(request_key = %key, pending = state.pending.len(), "Deferred send queued");
        Ok(DeferredResponse {
            key,
            bus: self.bus.clone(),
            state: self.state.clone(),
            max_allowed_sends: self.max_allowed_sends,
            _marker: PhantomData,
        })
    }

    /// Immediate send, counted against the quota.
    pub async fn send<R: TypedRequest>(&self, request: R) -> Result<R::Response> {
        self.check_send_quota()?;
        self.bus.send(request).await
    }

    /// Immediate batch send, counted against the quota.
    pub async fn send_batch(&self, batch: RequestBatch) -> Result<ResponsesGroup> {
        self.check_send_quota()?;
        self.bus.send_batch(batch).await
    }

    /// Notification dispatch, counted against the quota.
    pub async fn notify<N: Notification + Sized + 'static>(&self, notification: N) -> Result<()> {
        self.check_send_quota()?;
        self.bus.notify(notification).await
    }

    pub async fn notify_batch(&self, notifications: Vec<Arc<dyn Notification>>) -> Result<()> {
        self.check_send_quota()?;
        self.bus.notify_batch(notifications).await
    }

    fn check_send_quota(&self) -> Result<()> {
        let mut state = self.state.lock().expect("deferred state lock poisoned");
        check_quota(&mut state, self.max_allowed_sends)
    }
}

fn check_quota(state: &mut DeferredState, max_allowed_sends: i32) -> Result<()> {
    state.sends += 1;
    if max_allowed_sends > 0 && state.sends > max_allowed_sends as u32 {
        return Err(CourierError::QuotaExceeded(format!(
            "{} physical send(s) already performed, at most {} allowed",
            state.sends - 1,
            max_allowed_sends
        )));
    }
    Ok(())
}

/// Deferred response: pending until first read.
///
/// `get` resolves lazily: on a pending key it runs the quota check, flushes
/// every pending request of its bus as one physical batch, caches all
/// results by request identity, and returns this request's response. Reads
/// of an already-resolved response return the cached value without further
/// sends. All reads go through this accessor; the underlying response type
/// needs no special support.
pub struct DeferredResponse<T: Response + 'static> {
    key: RequestKey,
    bus: MessageBus,
    state: Arc<Mutex<DeferredState>>,
    max_allowed_sends: i32,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Response + 'static> std::fmt::Debug for DeferredResponse<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredResponse")
            .field("key", &self.key)
            .field("max_allowed_sends", &self.max_allowed_sends)
            .finish()
    }
}

impl<T: Response + 'static> DeferredResponse<T> {
    pub fn key(&self) -> RequestKey {
        self.key
    }

    /// Resolves and returns the response, flushing pending sends if this
    /// key is still unresolved.
    pub async fn get(&self) -> Result<Arc<T>> {
        let batch = {
            let mut state = self.state.lock().expect("deferred state lock poisoned");
            if let Some(found) = state.received.get(&self.key) {
                return downcast_cached::<T>(self.key, found.clone());
            }
            if let Some(rendered) = state.failed.get(&self.key) {
                return Err(CourierError::DeferredSendFailed(rendered.clone()));
            }
            check_quota(&mut state, self.max_allowed_sends)?;
            let mut batch = RequestBatch::new();
            for item in state.pending.drain(..) {
                batch.push_keyed(item.key, item.request);
            }
            batch
        };

        let keys = batch.keys();
        debug!(requests = keys.len(), "Flushing deferred sends");
        match self.bus.send_batch(batch).await {
            Ok(mut responses) => {
                let mut state = self.state.lock().expect("deferred state lock poisoned");
                for key in keys {
                    if let Some(response) = responses.take(key) {
                        state
                            .received
                            .insert(key, Arc::from(response.into_any()));
                    }
                }
                match state.received.get(&self.key) {
                    Some(found) => downcast_cached::<T>(self.key, found.clone()),
                    None => Err(CourierError::Contract(format!(
                        "deferred flush produced no response for request {}",
                        self.key
                    ))),
                }
            }
            Err(err) => {
                // The original failure is cached for every request of the
                // failed batch and surfaced verbatim on later reads; the
                // triggering reader gets the failure itself.
                let rendered = err.to_string();
                let mut state = self.state.lock().expect("deferred state lock poisoned");
                for key in keys {
                    state.failed.insert(key, rendered.clone());
                }
                warn!(error = %rendered, "Deferred flush failed");
                Err(err)
            }
        }
    }
}

fn downcast_cached<T: Response + 'static>(
    key: RequestKey,
    cached: Arc<dyn Any + Send + Sync>,
) -> Result<Arc<T>> {
    cached.downcast::<T>().map_err(|_| {
        CourierError::Contract(format!(
            "deferred response for request {key} is not a {}",
            std::any::type_name::<T>()
        ))
    })
}
