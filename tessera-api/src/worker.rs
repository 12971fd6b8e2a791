use std::sync::Arc;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use tessera_booking::Reaper;
use tessera_shared::messages::{topics, BookingConfirmedMessage, PaymentOutcomeMessage};
use tracing::{error, info};

use crate::metrics::Metrics;
use crate::payments;
use crate::state::AppState;

fn build_consumer(brokers: &str, group_id: &str, topic: &str) -> StreamConsumer {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", brokers)
        .set("group.id", group_id)
        .set("enable.auto.commit", "true")
        .set("auto.offset.reset", "earliest")
        .create()
        .expect("Consumer creation failed");

    consumer.subscribe(&[topic]).expect("Can't subscribe");
    consumer
}

/// Consume payment outcomes and settle the bookings they name. Deliveries
/// are at-least-once; settling is replay-safe, so redelivered outcomes are
/// absorbed.
pub async fn start_payment_worker(brokers: String, group_id: String, state: AppState) {
    let consumer = build_consumer(&brokers, &group_id, topics::PAYMENT_OUTCOME);

    info!("Payment worker started, listening for outcomes...");

    loop {
        match consumer.recv().await {
            Err(e) => error!("Kafka error: {}", e),
            Ok(m) => {
                if let Some(payload) = m.payload_view::<str>() {
                    match payload {
                        Ok(text) => match serde_json::from_str::<PaymentOutcomeMessage>(text) {
                            Ok(msg) => {
                                if let Err(e) = payments::apply_outcome(&state, &msg).await {
                                    error!(booking_id = %msg.booking_id, "Failed to settle outcome: {}", e);
                                }
                            }
                            Err(e) => error!("Malformed payment outcome: {}", e),
                        },
                        Err(e) => error!("Error reading payload: {}", e),
                    }
                }
            }
        }
    }
}

/// Consume confirmation notices and pin the sold seats so their locks never
/// expire. Runs in its own consumer group; replayed notices re-pin the same
/// seats, which is harmless.
pub async fn start_confirmation_worker(brokers: String, group_id: String, state: AppState) {
    let consumer = build_consumer(&brokers, &group_id, topics::BOOKING_CONFIRMED);

    info!("Confirmation worker started, listening for notices...");

    loop {
        match consumer.recv().await {
            Err(e) => error!("Kafka error: {}", e),
            Ok(m) => {
                if let Some(payload) = m.payload_view::<str>() {
                    match payload {
                        Ok(text) => match serde_json::from_str::<BookingConfirmedMessage>(text) {
                            Ok(msg) => apply_confirmed_notice(&state, &msg).await,
                            Err(e) => error!("Malformed confirmation notice: {}", e),
                        },
                        Err(e) => error!("Error reading payload: {}", e),
                    }
                }
            }
        }
    }
}

pub async fn apply_confirmed_notice(state: &AppState, msg: &BookingConfirmedMessage) {
    let seat_ids: Vec<String> = msg.seats.iter().map(|s| s.id.clone()).collect();
    if let Err(e) = state
        .inventory
        .finalize(msg.event_id, &seat_ids, msg.booking_id)
        .await
    {
        error!(booking_id = %msg.booking_id, "Failed to pin sold seats: {}", e);
    } else {
        info!(booking_id = %msg.booking_id, seats = seat_ids.len(), "sold seats pinned");
    }
}

/// Cancel stale pending reservations on a fixed cadence and put their
/// inventory back.
pub async fn start_sweeper(reaper: Arc<Reaper>, metrics: Arc<Metrics>, period: Duration) {
    let mut ticker = tokio::time::interval(period);

    info!("Reservation sweeper started");

    loop {
        ticker.tick().await;
        match reaper.sweep().await {
            Ok(0) => {}
            Ok(cancelled) => {
                info!(cancelled, "stale reservations swept");
                metrics.reservations_cancelled.inc_by(cancelled as u64);
            }
            Err(e) => error!("Sweep failed: {}", e),
        }
    }
}
