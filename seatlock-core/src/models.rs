use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::{CoreError, CoreResult};

const MAX_ID_LEN: usize = 128;

/// An event with a fixed number of seats. Seats are numbered `1..=total_seats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub total_seats: u32,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn new(total_seats: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            total_seats,
            created_at: Utc::now(),
        }
    }

    /// Seat ids in ascending order.
    pub fn seat_ids(&self) -> impl Iterator<Item = String> {
        (1..=self.total_seats).map(|n| n.to_string())
    }

    pub fn has_seat(&self, seat_id: &str) -> bool {
        // "007" parses but is not a canonical seat id
        match seat_id.parse::<u32>() {
            Ok(n) => n >= 1 && n <= self.total_seats && n.to_string() == seat_id,
            Err(_) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatStatus {
    Available,
    Held,
    Reserved,
}

/// A seat as seen by callers. `user_id` is set iff the seat is held or reserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    pub id: String,
    pub event_id: String,
    pub status: SeatStatus,
    pub user_id: Option<String>,
}

impl Seat {
    pub fn available(event_id: &str, seat_id: &str) -> Self {
        Self {
            id: seat_id.to_string(),
            event_id: event_id.to_string(),
            status: SeatStatus::Available,
            user_id: None,
        }
    }

    pub fn held(event_id: &str, seat_id: &str, user_id: &str) -> Self {
        Self {
            id: seat_id.to_string(),
            event_id: event_id.to_string(),
            status: SeatStatus::Held,
            user_id: Some(user_id.to_string()),
        }
    }

    pub fn reserved(event_id: &str, seat_id: &str, user_id: &str) -> Self {
        Self {
            status: SeatStatus::Reserved,
            ..Self::held(event_id, seat_id, user_id)
        }
    }

    pub fn is_held_by(&self, user_id: &str) -> bool {
        self.status == SeatStatus::Held && self.user_id.as_deref() == Some(user_id)
    }

    /// Sort key: event first, then numeric seat order.
    pub(crate) fn ordering_key(&self) -> (String, u64, String) {
        (
            self.event_id.clone(),
            self.id.parse::<u64>().unwrap_or(u64::MAX),
            self.id.clone(),
        )
    }
}

/// Remaining lifetime of a hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldTime {
    /// Seconds left before the hold lapses.
    Remaining(u64),
    /// The claim exists and never expires (reserved).
    Persisted,
    /// No claim: never held, or already expired.
    Absent,
}

impl Serialize for HoldTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            HoldTime::Remaining(secs) => serializer.serialize_u64(*secs),
            HoldTime::Persisted => serializer.serialize_str("PERSISTED"),
            HoldTime::Absent => serializer.serialize_none(),
        }
    }
}

/// Identifiers become parts of store keys and scan patterns, so key
/// separators and glob metacharacters are refused.
pub fn validate_id(kind: &str, value: &str) -> CoreResult<()> {
    if value.is_empty() {
        return Err(CoreError::ValidationError(format!("{} is required", kind)));
    }
    if value.len() > MAX_ID_LEN {
        return Err(CoreError::ValidationError(format!(
            "{} must be at most {} bytes",
            kind, MAX_ID_LEN
        )));
    }
    if value
        .chars()
        .any(|c| matches!(c, ':' | '*' | '?' | '[' | ']' | '\\') || c.is_whitespace())
    {
        return Err(CoreError::ValidationError(format!(
            "{} contains an illegal character",
            kind
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_seat_ids() {
        let event = Event::new(12);
        let ids: Vec<String> = event.seat_ids().collect();
        assert_eq!(ids.len(), 12);
        assert_eq!(ids[0], "1");
        assert_eq!(ids[11], "12");

        assert!(event.has_seat("1"));
        assert!(event.has_seat("12"));
        assert!(!event.has_seat("0"));
        assert!(!event.has_seat("13"));
        assert!(!event.has_seat("07"));
        assert!(!event.has_seat("A1"));
    }

    #[test]
    fn test_seat_serialization() {
        let seat = Seat::held("evt-1", "3", "user-1");
        let json = serde_json::to_value(&seat).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "3",
                "eventId": "evt-1",
                "status": "held",
                "userId": "user-1"
            })
        );

        let available = serde_json::to_value(Seat::available("evt-1", "4")).unwrap();
        assert_eq!(available["status"], "available");
        assert!(available["userId"].is_null());
    }

    #[test]
    fn test_hold_time_serialization() {
        assert_eq!(serde_json::to_string(&HoldTime::Remaining(42)).unwrap(), "42");
        assert_eq!(serde_json::to_string(&HoldTime::Persisted).unwrap(), "\"PERSISTED\"");
        assert_eq!(serde_json::to_string(&HoldTime::Absent).unwrap(), "null");
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("User ID", "user-42").is_ok());
        assert!(validate_id("User ID", "").is_err());
        assert!(validate_id("User ID", "a:b").is_err());
        assert!(validate_id("User ID", "a*").is_err());
        assert!(validate_id("User ID", "a b").is_err());
        assert!(validate_id("User ID", &"x".repeat(129)).is_err());
    }
}
