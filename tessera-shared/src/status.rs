use std::fmt;

/// Lifecycle state of a reservation.
///
/// `Pending` is the only non-terminal state. The three terminal states are
/// mutually exclusive and final; once a reservation leaves `Pending` it never
/// moves again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Failed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Failed => "failed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReservationStatus::Pending)
    }

    /// Whether `self -> next` is a legal transition. Only the three
    /// pending-to-terminal edges exist; everything else is rejected.
    pub fn can_transition_to(self, next: ReservationStatus) -> bool {
        matches!(
            (self, next),
            (ReservationStatus::Pending, ReservationStatus::Confirmed)
                | (ReservationStatus::Pending, ReservationStatus::Failed)
                | (ReservationStatus::Pending, ReservationStatus::Cancelled)
        )
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ReservationStatus::*;

    #[test]
    fn pending_reaches_every_terminal_state() {
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Failed));
        assert!(Pending.can_transition_to(Cancelled));
    }

    #[test]
    fn terminal_states_never_move() {
        for from in [Confirmed, Failed, Cancelled] {
            for to in [Pending, Confirmed, Failed, Cancelled] {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be rejected");
            }
        }
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn terminality_matches_the_transition_table() {
        assert!(!Pending.is_terminal());
        assert!(Confirmed.is_terminal());
        assert!(Failed.is_terminal());
        assert!(Cancelled.is_terminal());
    }
}
