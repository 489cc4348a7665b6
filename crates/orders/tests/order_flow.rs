//! Order intake through the full saga to the audit log.

use std::sync::Arc;
use std::time::Duration;

use broker::{Consumer, ConsumerConfig, InMemoryBroker, MessageBroker, Topic};
use domain::{Event, EventSource, Money, OrderLine, Product, SagaStatus};
use event_store::{InMemoryCompensationStore, InMemoryOrderStore, InMemorySagaEventStore};
use orders::{CompletionNotifier, CreateOrderRequest, EventFilter, EventService, OrderService};
use saga::{
    InMemoryProductCatalog, InMemoryStockStore, InventoryAdjustment, InventoryService, Payment,
    PaymentConfig, PaymentService, ProductValidationService, SagaParticipants, SagaRuntime,
    Validation,
};

struct TestHarness {
    orders: OrderService,
    events: EventService,
    _runtime: SagaRuntime,
}

impl TestHarness {
    async fn new() -> Self {
        let broker: Arc<dyn MessageBroker> = Arc::new(InMemoryBroker::new());
        let config = ConsumerConfig {
            max_attempts: 3,
            retry_backoff: Duration::from_millis(1),
        };

        let participants = SagaParticipants {
            product_validation: ProductValidationService::new(
                Arc::new(InMemoryProductCatalog::with_products(["BOOKS", "MOVIES"])),
                Arc::new(InMemoryCompensationStore::<Validation>::new()),
            ),
            payment: PaymentService::new(
                Arc::new(InMemoryCompensationStore::<Payment>::new()),
                PaymentConfig::default(),
            ),
            inventory: InventoryService::new(
                Arc::new(InMemoryStockStore::with_stock([("BOOKS", 10), ("MOVIES", 1)])),
                Arc::new(InMemoryCompensationStore::<InventoryAdjustment>::new()),
            ),
        };
        let runtime = SagaRuntime::start(broker.clone(), participants, config.clone())
            .await
            .unwrap();

        let event_store = Arc::new(InMemorySagaEventStore::new());
        let events = EventService::new(event_store.clone());
        Consumer::new(
            Topic::NotifyEnding,
            Arc::new(CompletionNotifier::new(events.clone())),
            config,
        )
        .start(broker.as_ref())
        .await
        .unwrap();

        let orders = OrderService::new(Arc::new(InMemoryOrderStore::new()), event_store, broker);

        Self {
            orders,
            events,
            _runtime: runtime,
        }
    }

    /// Polls the audit log until the saga for `order` has a terminal event.
    async fn wait_for_ending(&self, filter: EventFilter) -> Event {
        for _ in 0..200 {
            if let Ok(event) = self.events.find_by_filter(&filter).await
                && event.source == EventSource::Orchestrator
                && event.history().len() > 1
            {
                return event;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("saga did not finish in time");
    }
}

fn request(code: &str, quantity: u32) -> CreateOrderRequest {
    CreateOrderRequest {
        products: vec![OrderLine::new(
            Product::new(code, Money::from_dollars(10)),
            quantity,
        )],
    }
}

#[tokio::test]
async fn start_event_is_queryable_immediately() {
    let harness = TestHarness::new().await;
    let order = harness.orders.create_order(request("BOOKS", 1)).await.unwrap();

    // The start trigger is stored before publishing.
    let event = harness
        .events
        .find_by_filter(&EventFilter {
            order_id: Some(order.id),
            transaction_id: None,
        })
        .await
        .unwrap();
    assert_eq!(event.transaction_id, order.transaction_id);
}

#[tokio::test]
async fn successful_order_is_recorded_as_finished() {
    let harness = TestHarness::new().await;
    let order = harness.orders.create_order(request("BOOKS", 2)).await.unwrap();

    let done = harness
        .wait_for_ending(EventFilter {
            order_id: None,
            transaction_id: Some(order.transaction_id.clone()),
        })
        .await;

    assert_eq!(done.status, SagaStatus::Success);
    assert_eq!(
        done.last_history().unwrap().message,
        "Saga finished successfully!"
    );
    assert_eq!(done.payload.total_amount, Money::from_dollars(20));
}

#[tokio::test]
async fn failed_order_is_recorded_with_full_history() {
    let harness = TestHarness::new().await;
    let order = harness.orders.create_order(request("MOVIES", 3)).await.unwrap();

    let done = harness
        .wait_for_ending(EventFilter {
            order_id: Some(order.id),
            transaction_id: None,
        })
        .await;

    assert_eq!(done.status, SagaStatus::Fail);
    assert_eq!(done.history().len(), 8);
    assert_eq!(
        done.last_history().unwrap().message,
        "Saga finished with errors!"
    );
    assert_eq!(harness.events.find_all().await.unwrap().len(), 1);
}
