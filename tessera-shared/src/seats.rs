use std::fmt;

/// Ticket tier a seat (or a block of unassigned seats) is sold under.
///
/// Each class has its own availability counter, so a sold-out VIP tier never
/// blocks a normal-tier sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketClass {
    Normal,
    Vip,
    Vvip,
}

impl TicketClass {
    pub const ALL: [TicketClass; 3] = [TicketClass::Normal, TicketClass::Vip, TicketClass::Vvip];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketClass::Normal => "normal",
            TicketClass::Vip => "vip",
            TicketClass::Vvip => "vvip",
        }
    }
}

impl fmt::Display for TicketClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A seat identifier together with the class it is sold under.
///
/// Seat ids are venue-defined strings ("A-12", "GA-107"); the class is carried
/// explicitly rather than inferred from the id.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SeatRef {
    pub id: String,
    pub class: TicketClass,
}

impl SeatRef {
    pub fn new(id: impl Into<String>, class: TicketClass) -> Self {
        SeatRef { id: id.into(), class }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_class_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&TicketClass::Vvip).unwrap(), "\"vvip\"");
        let parsed: TicketClass = serde_json::from_str("\"vip\"").unwrap();
        assert_eq!(parsed, TicketClass::Vip);
    }

    #[test]
    fn seat_ref_round_trips_with_explicit_class() {
        let seat = SeatRef::new("A-12", TicketClass::Normal);
        let json = serde_json::to_string(&seat).unwrap();
        assert!(json.contains("\"class\":\"normal\""));
        let back: SeatRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, seat);
    }
}
