//! HTTP API server and process wiring for the order saga.
//!
//! Exposes order intake and audit queries over REST, with structured
//! logging (tracing) and Prometheus metrics. [`Application`] brings up the
//! saga runtime and the completion notifier on a shared broker.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use broker::{Consumer, MessageBroker, Topic};
use event_store::{
    CompensationStore, InMemoryCompensationStore, InMemoryOrderStore, InMemorySagaEventStore,
    OrderStore, PostgresCompensationStore, PostgresOrderStore, PostgresSagaEventStore,
    SagaEventStore,
};
use metrics_exporter_prometheus::PrometheusHandle;
use orders::{CompletionNotifier, EventService, OrderService};
use saga::{
    InMemoryProductCatalog, InMemoryStockStore, InventoryAdjustment, InventoryService, Payment,
    PaymentService, ProductValidationService, SagaParticipants, SagaRuntime, Validation,
};
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use error::StartupError;

/// Product codes and starting stock for the participant-local stores.
pub const SEED_STOCK: &[(&str, u32)] = &[
    ("COMIC_BOOKS", 10),
    ("BOOKS", 10),
    ("MOVIES", 10),
    ("MUSIC", 10),
];

/// Where orders, audit events and compensation records live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Memory => "memory",
            StorageBackend::Postgres => "postgres",
        }
    }
}

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub orders: OrderService,
    pub events: EventService,
    pub storage: StorageBackend,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/api/order", post(routes::orders::create))
        .route("/api/event", get(routes::events::find_by_filter))
        .route("/api/event/all", get(routes::events::find_all))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Every store the process needs, on one backend.
pub struct Stores {
    pub backend: StorageBackend,
    pub orders: Arc<dyn OrderStore>,
    pub events: Arc<dyn SagaEventStore>,
    pub validations: Arc<dyn CompensationStore<Validation>>,
    pub payments: Arc<dyn CompensationStore<Payment>>,
    pub adjustments: Arc<dyn CompensationStore<InventoryAdjustment>>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            backend: StorageBackend::Memory,
            orders: Arc::new(InMemoryOrderStore::new()),
            events: Arc::new(InMemorySagaEventStore::new()),
            validations: Arc::new(InMemoryCompensationStore::<Validation>::new()),
            payments: Arc::new(InMemoryCompensationStore::<Payment>::new()),
            adjustments: Arc::new(InMemoryCompensationStore::<InventoryAdjustment>::new()),
        }
    }

    /// Stores on PostgreSQL. Migrations must already be applied.
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            backend: StorageBackend::Postgres,
            orders: Arc::new(PostgresOrderStore::new(pool.clone())),
            events: Arc::new(PostgresSagaEventStore::new(pool.clone())),
            validations: Arc::new(PostgresCompensationStore::<Validation>::new(pool.clone())),
            payments: Arc::new(PostgresCompensationStore::<Payment>::new(pool.clone())),
            adjustments: Arc::new(PostgresCompensationStore::<InventoryAdjustment>::new(pool)),
        }
    }
}

/// The running saga: every participant, the orchestrator and the
/// completion notifier, plus the state the HTTP layer serves from.
pub struct Application {
    state: Arc<AppState>,
    runtime: SagaRuntime,
    notifier: JoinHandle<()>,
}

impl Application {
    /// Subscribes every consumer on `broker` and builds the HTTP state.
    ///
    /// Product catalogue and stock are seeded from [`SEED_STOCK`].
    pub async fn start(
        config: &Config,
        broker: Arc<dyn MessageBroker>,
        stores: Stores,
    ) -> Result<Self, StartupError> {
        let consumer_config = config.consumer_config();

        let participants = SagaParticipants {
            product_validation: ProductValidationService::new(
                Arc::new(InMemoryProductCatalog::with_products(
                    SEED_STOCK.iter().map(|(code, _)| *code),
                )),
                stores.validations,
            ),
            payment: PaymentService::new(stores.payments, config.payment_config()),
            inventory: InventoryService::new(
                Arc::new(InMemoryStockStore::with_stock(SEED_STOCK.iter().copied())),
                stores.adjustments,
            ),
        };
        let runtime =
            SagaRuntime::start(broker.clone(), participants, consumer_config.clone()).await?;

        let events = EventService::new(stores.events.clone());
        let notifier = Consumer::new(
            Topic::NotifyEnding,
            Arc::new(CompletionNotifier::new(events.clone())),
            consumer_config,
        )
        .start(broker.as_ref())
        .await?;

        let state = Arc::new(AppState {
            orders: OrderService::new(stores.orders, stores.events, broker),
            events,
            storage: stores.backend,
        });

        tracing::info!(storage = stores.backend.as_str(), "Application started");
        Ok(Self {
            state,
            runtime,
            notifier,
        })
    }

    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    /// Stops every consumer.
    pub fn shutdown(self) {
        self.runtime.abort();
        self.notifier.abort();
    }
}
