// Message bus: public dispatch entry point and processor routing
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::interception::{
    Interceptor, InvocationChain, NotifyInvocation, SendInvocation, Terminal,
};
use crate::message::{
    Notification, RequestBatch, RequestKey, ResponsesGroup, TypedRequest,
};
use crate::processing::{NotificationProcessor, RequestProcessor};
use crate::{CourierError, Result};

/// Per-group dispatch statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupStats {
    pub total_requests: u64,
    pub total_responses: u64,
    pub failed_requests: u64,
    pub total_notifications: u64,
}

/// Builder collecting processors and interceptors before the bus is made.
#[derive(Default)]
pub struct MessageBusBuilder {
    request_processors: Vec<Arc<dyn RequestProcessor>>,
    notification_processors: Vec<Arc<dyn NotificationProcessor>>,
    send_interceptors: Vec<Arc<dyn Interceptor<SendInvocation>>>,
    notify_interceptors: Vec<Arc<dyn Interceptor<NotifyInvocation>>>,
}

impl MessageBusBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_request_processor(mut self, processor: Arc<dyn RequestProcessor>) -> Self {
        info!(processor = %processor.name(), "Registering request processor");
        self.request_processors.push(processor);
        self
    }

    pub fn add_notification_processor(mut self, processor: Arc<dyn NotificationProcessor>) -> Self {
        info!(processor = %processor.name(), "Registering notification processor");
        self.notification_processors.push(processor);
        self
    }

    pub fn add_send_interceptor(mut self, interceptor: Arc<dyn Interceptor<SendInvocation>>) -> Self {
        self.send_interceptors.push(interceptor);
        self
    }

    pub fn add_notify_interceptor(
        mut self,
        interceptor: Arc<dyn Interceptor<NotifyInvocation>>,
    ) -> Self {
        self.notify_interceptors.push(interceptor);
        self
    }

    pub fn build(self) -> MessageBus {
        info!(
            request_processors = self.request_processors.len(),
            notification_processors = self.notification_processors.len(),
            "Message bus built"
        );
        MessageBus {
            request_processors: Arc::new(self.request_processors),
            notification_processors: Arc::new(self.notification_processors),
            send_chain: Arc::new(InvocationChain::new(self.send_interceptors)),
            notify_chain: Arc::new(InvocationChain::new(self.notify_interceptors)),
            stats: Arc::new(dashmap::DashMap::new()),
        }
    }
}

/// Stateless dispatch entry point.
///
/// Cheap to clone: all internals are shared. Every dispatch call builds its
/// own invocation and runs it through the configured interceptor chain; the
/// bus itself holds no per-request state.
#[derive(Clone)]
pub struct MessageBus {
    request_processors: Arc<Vec<Arc<dyn RequestProcessor>>>,
    notification_processors: Arc<Vec<Arc<dyn NotificationProcessor>>>,
    send_chain: Arc<InvocationChain<SendInvocation>>,
    notify_chain: Arc<InvocationChain<NotifyInvocation>>,
    stats: Arc<dashmap::DashMap<String, GroupStats>>,
}

impl MessageBus {
    pub fn builder() -> MessageBusBuilder {
        MessageBusBuilder::new()
    }

    /// Sends one request and returns its typed response.
    pub async fn send<R: TypedRequest>(&self, request: R) -> Result<R::Response> {
        let request_type = request.type_name();
        let mut batch = RequestBatch::new();
        let key = batch.push(Box::new(request));
        let mut responses = self.send_batch(batch).await?;
        match responses.take(key) {
            Some(response) => {
                let actual = response.type_name();
                match response.into_any().downcast::<R::Response>() {
                    Ok(boxed) => Ok(*boxed),
                    Err(_) => Err(CourierError::Contract(format!(
                        "send of {request_type} produced response {actual}, expected {}",
                        std::any::type_name::<R::Response>()
                    ))),
                }
            }
            None => Err(CourierError::Contract(format!(
                "send of {request_type} produced no response"
            ))),
        }
    }

    /// Sends a batch of requests; with more than one element every request
    /// must be side-effect free.
    pub async fn send_batch(&self, batch: RequestBatch) -> Result<ResponsesGroup> {
        if batch.is_empty() {
            return Err(CourierError::Contract(
                "cannot send an empty request batch".to_string(),
            ));
        }
        if batch.len() > 1 {
            for item in batch.iter() {
                if !item.request.is_side_effect_free() {
                    return Err(CourierError::Contract(format!(
                        "request {} is not side-effect free and cannot be batched with others",
                        item.request.type_name()
                    )));
                }
            }
        }

        let groups: Vec<String> = batch.iter().map(|item| item.request.group_name()).collect();
        for group in &groups {
            self.record(group, |stats| stats.total_requests += 1);
        }

        debug!(requests = batch.len(), "Dispatching send");
        let terminal = SendTerminal {
            processors: self.request_processors.clone(),
        };
        match self
            .send_chain
            .execute(SendInvocation::new(batch), &terminal)
            .await
        {
            Ok(invocation) => {
                let responses = invocation.responses.ok_or_else(|| {
                    CourierError::Contract(
                        "send chain completed without producing responses".to_string(),
                    )
                })?;
                for group in &groups {
                    self.record(group, |stats| stats.total_responses += 1);
                }
                Ok(responses)
            }
            Err(err) => {
                for group in &groups {
                    self.record(group, |stats| stats.failed_requests += 1);
                }
                Err(err)
            }
        }
    }

    /// Hands the send off to a dedicated worker; the registered callback is
    /// invoked from that worker, never from the calling thread.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime (the runtime handle is
    /// captured here to drive the send from the worker thread).
    pub fn send_async<R: TypedRequest>(&self, request: R) -> AsyncSendHandle<R> {
        AsyncSendHandle {
            bus: self.clone(),
            request,
            runtime: tokio::runtime::Handle::current(),
        }
    }

    /// Notifies all registered notification processors.
    pub async fn notify<N: Notification + Sized + 'static>(&self, notification: N) -> Result<()> {
        self.notify_batch(vec![Arc::new(notification) as Arc<dyn Notification>])
            .await
    }

    /// Notifies all registered notification processors with a batch. Returns
    /// once dispatch has been handed off; delivery itself is detached.
    pub async fn notify_batch(&self, notifications: Vec<Arc<dyn Notification>>) -> Result<()> {
        if notifications.is_empty() {
            return Ok(());
        }
        for notification in &notifications {
            self.record(&notification.group_name(), |stats| {
                stats.total_notifications += 1
            });
        }

        debug!(notifications = notifications.len(), "Dispatching notify");
        let terminal = NotifyTerminal {
            processors: self.notification_processors.clone(),
        };
        self.notify_chain
            .execute(NotifyInvocation::new(notifications), &terminal)
            .await?;
        Ok(())
    }

    /// Dispatch statistics for one group name.
    pub fn stats(&self, group: &str) -> Option<GroupStats> {
        self.stats.get(group).map(|stats| stats.clone())
    }

    fn record<F>(&self, group: &str, f: F)
    where
        F: FnOnce(&mut GroupStats),
    {
        f(self
            .stats
            .entry(group.to_string())
            .or_default()
            .value_mut());
    }
}

/// Pending asynchronous send. Nothing happens until a callback pair is
/// registered.
pub struct AsyncSendHandle<R: TypedRequest> {
    bus: MessageBus,
    request: R,
    runtime: tokio::runtime::Handle,
}

impl<R: TypedRequest> AsyncSendHandle<R> {
    /// Starts the worker and registers the completion callbacks. Exactly
    /// one of them is invoked, from the worker thread.
    pub fn register<S, E>(self, on_success: S, on_error: E) -> std::thread::JoinHandle<()>
    where
        S: FnOnce(R::Response) + Send + 'static,
        E: FnOnce(CourierError) + Send + 'static,
    {
        let Self {
            bus,
            request,
            runtime,
        } = self;
        std::thread::spawn(move || match runtime.block_on(bus.send(request)) {
            Ok(response) => on_success(response),
            Err(err) => on_error(err),
        })
    }
}

/// Send terminal: routes every request to exactly one claiming processor,
/// dispatches per-processor sub-batches concurrently, and merges results.
struct SendTerminal {
    processors: Arc<Vec<Arc<dyn RequestProcessor>>>,
}

#[async_trait]
impl Terminal<SendInvocation> for SendTerminal {
    async fn terminate(&self, mut invocation: SendInvocation) -> Result<SendInvocation> {
        let batch = std::mem::take(&mut invocation.requests);

        let mut per_processor: Vec<RequestBatch> =
            (0..self.processors.len()).map(|_| RequestBatch::new()).collect();
        for item in batch.into_items() {
            let claimants: Vec<usize> = self
                .processors
                .iter()
                .enumerate()
                .filter(|(_, processor)| processor.can_process(&*item.request))
                .map(|(idx, _)| idx)
                .collect();
            match claimants.len() {
                0 => {
                    return Err(CourierError::Routing(format!(
                        "no processor can process request {} ({})",
                        item.request.type_name(),
                        item.request.correlation_id()
                    )))
                }
                1 => per_processor[claimants[0]].push_keyed(item.key, item.request),
                _ => {
                    let names: Vec<String> = claimants
                        .iter()
                        .map(|&idx| self.processors[idx].name())
                        .collect();
                    return Err(CourierError::Routing(format!(
                        "request {} is claimed by multiple processors: [{}]",
                        item.request.type_name(),
                        names.join(", ")
                    )));
                }
            }
        }

        let mut dispatched = Vec::new();
        for (idx, sub_batch) in per_processor.into_iter().enumerate() {
            if sub_batch.is_empty() {
                continue;
            }
            let processor = self.processors[idx].clone();
            let name = processor.name();
            let expected = sub_batch.keys();
            debug!(processor = %name, requests = sub_batch.len(), "Dispatching sub-batch");
            let handle = tokio::spawn(async move { processor.process(sub_batch).await });
            dispatched.push((name, expected, handle));
        }

        let mut merged = ResponsesGroup::new();
        for (name, expected, handle) in dispatched {
            let group = handle.await.map_err(|join_err| {
                CourierError::Contract(format!("processor {name} crashed: {join_err}"))
            })??;
            verify_coverage(&name, &expected, &group)?;
            merged.merge(group);
        }
        invocation.responses = Some(merged);
        Ok(invocation)
    }
}

fn verify_coverage(processor: &str, expected: &[RequestKey], group: &ResponsesGroup) -> Result<()> {
    if group.len() != expected.len() {
        return Err(CourierError::Contract(format!(
            "processor {processor} returned {} response(s) for {} request(s)",
            group.len(),
            expected.len()
        )));
    }
    for key in expected {
        if !group.contains(*key) {
            return Err(CourierError::Contract(format!(
                "processor {processor} returned no response for request {key}"
            )));
        }
    }
    Ok(())
}

/// Notify terminal: full-batch fan-out to every registered notification
/// processor, each on its own detached task.
struct NotifyTerminal {
    processors: Arc<Vec<Arc<dyn NotificationProcessor>>>,
}

#[async_trait]
impl Terminal<NotifyInvocation> for NotifyTerminal {
    async fn terminate(&self, invocation: NotifyInvocation) -> Result<NotifyInvocation> {
        if self.processors.is_empty() {
            return Err(CourierError::Routing(
                "no notification processors registered".to_string(),
            ));
        }
        for processor in self.processors.iter() {
            let processor = processor.clone();
            let batch = invocation.notifications.clone();
            tokio::spawn(async move {
                processor.process(batch).await;
            });
        }
        Ok(invocation)
    }
}
