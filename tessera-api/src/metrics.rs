use prometheus::{Encoder, IntCounter, Registry, TextEncoder};
use tracing::warn;

/// Pipeline counters exposed on `/metrics`.
pub struct Metrics {
    registry: Registry,
    pub reservations_created: IntCounter,
    pub reservations_confirmed: IntCounter,
    pub reservations_failed: IntCounter,
    pub reservations_cancelled: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let reservations_created = IntCounter::new(
            "tessera_reservations_created_total",
            "Reservations admitted into the pending window",
        )?;
        let reservations_confirmed = IntCounter::new(
            "tessera_reservations_confirmed_total",
            "Reservations settled by a successful payment",
        )?;
        let reservations_failed = IntCounter::new(
            "tessera_reservations_failed_total",
            "Reservations settled by a failed payment",
        )?;
        let reservations_cancelled = IntCounter::new(
            "tessera_reservations_cancelled_total",
            "Reservations cancelled by the stale sweep",
        )?;
        registry.register(Box::new(reservations_created.clone()))?;
        registry.register(Box::new(reservations_confirmed.clone()))?;
        registry.register(Box::new(reservations_failed.clone()))?;
        registry.register(Box::new(reservations_cancelled.clone()))?;
        Ok(Self {
            registry,
            reservations_created,
            reservations_confirmed,
            reservations_failed,
            reservations_cancelled,
        })
    }

    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            warn!("Failed to encode metrics: {}", e);
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_render_in_text_format() {
        let metrics = Metrics::new().unwrap();
        metrics.reservations_created.inc();
        metrics.reservations_cancelled.inc_by(3);
        let text = metrics.render();
        assert!(text.contains("tessera_reservations_created_total 1"));
        assert!(text.contains("tessera_reservations_cancelled_total 3"));
    }
}
