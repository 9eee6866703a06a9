use std::sync::Arc;
use tracing::info;

use crate::models::{validate_id, Event};
use crate::repository::SeatStore;
use crate::{CoreError, CoreResult};

/// Allowed seat capacity of a new event, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatLimits {
    pub min_seats: u32,
    pub max_seats: u32,
}

impl Default for SeatLimits {
    fn default() -> Self {
        Self { min_seats: 10, max_seats: 1000 }
    }
}

/// Keyed store of immutable event records (`event:{id}`).
#[derive(Clone)]
pub struct EventRegistry {
    store: Arc<dyn SeatStore>,
    limits: SeatLimits,
}

impl EventRegistry {
    pub fn new(store: Arc<dyn SeatStore>, limits: SeatLimits) -> Self {
        Self { store, limits }
    }

    fn key(event_id: &str) -> String {
        format!("event:{}", event_id)
    }

    pub async fn create(&self, total_seats: i64) -> CoreResult<Event> {
        let SeatLimits { min_seats, max_seats } = self.limits;
        let total_seats = u32::try_from(total_seats)
            .ok()
            .filter(|n| (min_seats..=max_seats).contains(n))
            .ok_or_else(|| {
                CoreError::ValidationError(format!(
                    "Total seats must be between {} and {}",
                    min_seats, max_seats
                ))
            })?;

        let event = Event::new(total_seats);
        let encoded = serde_json::to_string(&event)?;
        self.store.set(&Self::key(&event.id), &encoded).await?;

        info!("Event created: {} with {} seats", event.id, event.total_seats);
        Ok(event)
    }

    pub async fn find(&self, event_id: &str) -> CoreResult<Option<Event>> {
        validate_id("Event ID", event_id)?;
        match self.store.get(&Self::key(event_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Like [`find`](Self::find) but a missing event is an error.
    pub async fn require(&self, event_id: &str) -> CoreResult<Event> {
        self.find(event_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Event {}", event_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn registry() -> EventRegistry {
        EventRegistry::new(Arc::new(MemoryStore::new()), SeatLimits::default())
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let registry = registry();
        let event = registry.create(20).await.unwrap();
        assert_eq!(event.total_seats, 20);

        let found = registry.find(&event.id).await.unwrap();
        assert_eq!(found, Some(event.clone()));
        assert_eq!(registry.require(&event.id).await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_seat_bounds() {
        let registry = registry();
        assert!(registry.create(10).await.is_ok());
        assert!(registry.create(1000).await.is_ok());
        for bad in [9, 1001, 0, -5] {
            assert!(matches!(
                registry.create(bad).await,
                Err(CoreError::ValidationError(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_missing_event() {
        let registry = registry();
        assert_eq!(registry.find("nope").await.unwrap(), None);
        assert!(matches!(registry.require("nope").await, Err(CoreError::NotFound(_))));
    }
}
