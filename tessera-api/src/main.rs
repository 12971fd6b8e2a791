use std::net::SocketAddr;
use std::sync::Arc;

use tessera_api::{app, metrics::Metrics, state::AppState, worker};
use tessera_booking::{BookingOrchestrator, Reaper};
use tessera_core::{EventRelay, ReservationLedger, SeatInventory};
use tessera_store::{Config, DbClient, KafkaRelay, PgLedger, RedisInventory};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tessera_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().expect("Failed to load config");
    tracing::info!("Starting Tessera API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    let inventory: Arc<dyn SeatInventory> = Arc::new(
        RedisInventory::new(&config.redis.url).expect("Failed to open Redis client"),
    );
    let ledger: Arc<dyn ReservationLedger> = Arc::new(PgLedger::new(db.pool.clone()));
    let relay: Arc<dyn EventRelay> = Arc::new(
        KafkaRelay::new(&config.kafka.brokers).expect("Failed to create Kafka producer"),
    );

    let policy = config.reservation.policy();
    let orchestrator = Arc::new(BookingOrchestrator::new(
        inventory.clone(),
        ledger.clone(),
        relay.clone(),
        policy.clone(),
    ));
    let reaper = Arc::new(Reaper::new(inventory.clone(), ledger.clone(), relay.clone(), policy.clone()));

    let (seat_tx, _) = tokio::sync::broadcast::channel(256);
    let metrics = Arc::new(Metrics::new().expect("Failed to build metrics registry"));

    let app_state = AppState {
        inventory,
        ledger,
        relay,
        orchestrator,
        policy: policy.clone(),
        seat_tx,
        metrics: metrics.clone(),
    };

    tokio::spawn(worker::start_payment_worker(
        config.kafka.brokers.clone(),
        config.kafka.group_id.clone(),
        app_state.clone(),
    ));
    tokio::spawn(worker::start_confirmation_worker(
        config.kafka.brokers.clone(),
        format!("{}-confirmations", config.kafka.group_id),
        app_state.clone(),
    ));
    tokio::spawn(worker::start_sweeper(reaper, metrics, policy.sweep_interval));

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
