use std::time::Duration;

/// Timing knobs for the reservation window.
#[derive(Debug, Clone)]
pub struct ReservationPolicy {
    /// How long seat locks live before they expire on their own.
    pub seat_hold: Duration,
    /// Age past which a pending reservation counts as abandoned.
    pub stale_after: Duration,
    /// How often the sweeper looks for abandoned reservations.
    pub sweep_interval: Duration,
}

impl Default for ReservationPolicy {
    fn default() -> Self {
        ReservationPolicy {
            seat_hold: Duration::from_secs(15 * 60),
            stale_after: Duration::from_secs(15 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl ReservationPolicy {
    /// Cutoff instant for the stale sweep, measured from now.
    pub fn stale_cutoff(&self) -> chrono::DateTime<chrono::Utc> {
        chrono::Utc::now() - chrono::Duration::milliseconds(self.stale_after.as_millis() as i64)
    }
}
