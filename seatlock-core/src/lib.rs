pub mod models;
pub mod repository;
pub mod memory;
pub mod index;
pub mod engine;
pub mod registry;

pub use engine::{HoldEngine, HoldOutcome, HoldPolicy, RefreshOutcome, ReserveOutcome, SeatHold, MAX_HOLD_SECONDS};
pub use index::SeatIndex;
pub use memory::MemoryStore;
pub use models::{Event, HoldTime, Seat, SeatStatus};
pub use registry::{EventRegistry, SeatLimits};
pub use repository::{KeyTtl, SeatStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => CoreError::StoreUnavailable(msg),
            StoreError::Command(msg) => CoreError::InternalError(msg),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::InternalError(format!("Record encoding failed: {}", err))
    }
}
