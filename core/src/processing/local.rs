// Local request processor: one concurrent worker per request in a batch
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::handling::HandlerResolver;
use crate::interception::{Interceptor, InvocationChain, RequestHandleInvocation, Terminal};
use crate::message::{Request, RequestBatch, ResponsesGroup};
use crate::processing::RequestProcessor;
use crate::{CourierError, Result};

/// Executes resolved handlers in-process.
///
/// `can_process` delegates to the handler resolver, so this processor
/// claims exactly the requests it has handlers for. Each batch member runs
/// on its own tokio worker through the request-handle interceptor chain;
/// the batch call joins every worker before returning.
pub struct LocalRequestProcessor {
    name: String,
    resolver: Arc<dyn HandlerResolver>,
    chain: Arc<InvocationChain<RequestHandleInvocation>>,
}

impl LocalRequestProcessor {
    pub fn new(resolver: Arc<dyn HandlerResolver>) -> Self {
        Self {
            name: std::any::type_name::<Self>().to_string(),
            resolver,
            chain: Arc::new(InvocationChain::empty()),
        }
    }

    /// Installs the request-handle interceptors run around every handler
    /// invocation.
    pub fn with_interceptors(
        mut self,
        interceptors: Vec<Arc<dyn Interceptor<RequestHandleInvocation>>>,
    ) -> Self {
        self.chain = Arc::new(InvocationChain::new(interceptors));
        self
    }

    /// Overrides the diagnostic name (useful when several local processors
    /// coexist).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl RequestProcessor for LocalRequestProcessor {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn can_process(&self, request: &dyn Request) -> bool {
        self.resolver.can_create_handler_for(request)
    }

    async fn process(&self, batch: RequestBatch) -> Result<ResponsesGroup> {
        debug!(
            processor = %self.name,
            requests = batch.len(),
            "Processing request batch"
        );

        let mut workers = Vec::with_capacity(batch.len());
        for item in batch.into_items() {
            let resolver = self.resolver.clone();
            let chain = self.chain.clone();
            let key = item.key;
            let request_type = item.request.type_name();
            let handle = tokio::spawn(async move {
                let terminal = ResolveAndHandleTerminal { resolver };
                let invocation = RequestHandleInvocation::new(item.key, item.request);
                let out = chain.execute(invocation, &terminal).await?;
                out.response.ok_or_else(|| {
                    CourierError::Contract(format!(
                        "request-handle chain for {request_type} completed without a response"
                    ))
                })
            });
            workers.push((key, request_type, handle));
        }

        // Join everything before reporting: a failing worker never cuts its
        // siblings short.
        let mut responses = ResponsesGroup::new();
        let mut failures = Vec::new();
        for (key, request_type, handle) in workers {
            match handle.await {
                Ok(Ok(response)) => responses.insert(key, response),
                Ok(Err(err)) => {
                    error!(request = request_type, request_key = %key, error = %err, "Request worker failed");
                    failures.push(format!("{request_type} {key}: {err}"));
                }
                Err(join_err) => {
                    error!(request = request_type, request_key = %key, error = %join_err, "Request worker panicked");
                    failures.push(format!("{request_type} {key}: worker panicked: {join_err}"));
                }
            }
        }

        if !failures.is_empty() {
            return Err(CourierError::Aggregate(failures));
        }
        Ok(responses)
    }
}

struct ResolveAndHandleTerminal {
    resolver: Arc<dyn HandlerResolver>,
}

#[async_trait]
impl Terminal<RequestHandleInvocation> for ResolveAndHandleTerminal {
    async fn terminate(
        &self,
        mut invocation: RequestHandleInvocation,
    ) -> Result<RequestHandleInvocation> {
        let handler = self.resolver.create_handler_for(&*invocation.request)?;
        let outcome = handler.handle(&*invocation.request).await;
        // Released through the resolver that created it, success or not.
        self.resolver.dispose(handler);
        invocation.response = Some(outcome?);
        Ok(invocation)
    }
}
