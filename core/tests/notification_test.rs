use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use courier_core::{
    CourierError, LocalNotificationProcessor, MessageBus, Notification, NotificationHandler,
    NotificationHandlerRegistry, NotificationInfo, Result,
};

struct OrderShipped {
    info: NotificationInfo,
}

impl OrderShipped {
    fn new() -> Self {
        Self {
            info: NotificationInfo::new(),
        }
    }
}

impl Notification for OrderShipped {
    fn notification_info(&self) -> &NotificationInfo {
        &self.info
    }

    fn notification_info_mut(&mut self) -> &mut NotificationInfo {
        &mut self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct CountingHandler {
    hits: Arc<AtomicUsize>,
}

#[async_trait]
impl NotificationHandler<OrderShipped> for CountingHandler {
    async fn handle(&self, _notification: &OrderShipped) -> Result<()> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FailingHandler {
    hits: Arc<AtomicUsize>,
}

#[async_trait]
impl NotificationHandler<OrderShipped> for FailingHandler {
    async fn handle(&self, _notification: &OrderShipped) -> Result<()> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        Err(CourierError::Handler("handler exploded".to_string()))
    }
}

async fn wait_for(counter: &Arc<AtomicUsize>, expected: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while counter.load(Ordering::SeqCst) < expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timed out waiting for notification handlers");
}

#[tokio::test]
async fn fan_out_reaches_every_processor_and_handler() {
    let first_hits = Arc::new(AtomicUsize::new(0));
    let failing_hits = Arc::new(AtomicUsize::new(0));
    let second_hits = Arc::new(AtomicUsize::new(0));

    let first_registry = Arc::new(NotificationHandlerRegistry::new());
    let hits = first_hits.clone();
    first_registry.register::<OrderShipped, _, _>(move || CountingHandler { hits: hits.clone() });
    let hits = failing_hits.clone();
    first_registry.register::<OrderShipped, _, _>(move || FailingHandler { hits: hits.clone() });

    let second_registry = Arc::new(NotificationHandlerRegistry::new());
    let hits = second_hits.clone();
    second_registry.register::<OrderShipped, _, _>(move || CountingHandler { hits: hits.clone() });

    let bus = MessageBus::builder()
        .add_notification_processor(Arc::new(LocalNotificationProcessor::new(first_registry)))
        .add_notification_processor(Arc::new(LocalNotificationProcessor::new(second_registry)))
        .build();

    bus.notify(OrderShipped::new()).await.unwrap();

    // The failing sibling is invoked, logged and swallowed; everyone else
    // still completes.
    wait_for(&first_hits, 1).await;
    wait_for(&failing_hits, 1).await;
    wait_for(&second_hits, 1).await;
}

#[tokio::test]
async fn notify_without_processors_is_a_routing_error() {
    let bus = MessageBus::builder().build();
    let err = bus.notify(OrderShipped::new()).await.unwrap_err();
    assert!(matches!(err, CourierError::Routing(_)));
}

#[tokio::test]
async fn every_notification_of_a_batch_is_delivered() {
    let hits = Arc::new(AtomicUsize::new(0));
    let registry = Arc::new(NotificationHandlerRegistry::new());
    let handler_hits = hits.clone();
    registry.register::<OrderShipped, _, _>(move || CountingHandler {
        hits: handler_hits.clone(),
    });

    let bus = MessageBus::builder()
        .add_notification_processor(Arc::new(LocalNotificationProcessor::new(registry)))
        .build();

    bus.notify_batch(vec![
        Arc::new(OrderShipped::new()) as Arc<dyn Notification>,
        Arc::new(OrderShipped::new()),
        Arc::new(OrderShipped::new()),
    ])
    .await
    .unwrap();

    wait_for(&hits, 3).await;
}

#[tokio::test]
async fn notification_without_handlers_is_not_an_error() {
    let registry = Arc::new(NotificationHandlerRegistry::new());
    let bus = MessageBus::builder()
        .add_notification_processor(Arc::new(LocalNotificationProcessor::new(registry)))
        .build();

    bus.notify(OrderShipped::new()).await.unwrap();
}
