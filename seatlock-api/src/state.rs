use std::sync::Arc;
use seatlock_core::{EventRegistry, HoldEngine, HoldPolicy, SeatIndex, SeatLimits, SeatStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SeatStore>,
    pub events: EventRegistry,
    pub engine: HoldEngine,
}

impl AppState {
    pub fn new(store: Arc<dyn SeatStore>, policy: HoldPolicy, limits: SeatLimits, scan_count: usize) -> Self {
        let index = SeatIndex::new(store.clone()).with_scan_count(scan_count);
        Self {
            events: EventRegistry::new(store.clone(), limits),
            engine: HoldEngine::new(index, policy),
            store,
        }
    }
}
