use async_trait::async_trait;

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store rejected command: {0}")]
    Command(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of a remaining-lifetime query on a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    Expires(u64),
    NoExpiry,
    Missing,
}

/// Key-value store with expiring keys, as required by the seat index.
///
/// Point operations are strongly consistent. `scan` is weakly consistent:
/// keys written or expired while a scan is in progress may or may not be
/// reported, but keys present for the whole scan always are. A cursor of `0`
/// starts a scan and, when returned, ends it.
#[async_trait]
pub trait SeatStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Unconditional overwrite; clears any expiry.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> StoreResult<()>;

    /// Create the key only if it does not exist. Returns whether it was created.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> StoreResult<bool>;

    /// Replace the value only if it currently equals `expected`.
    /// `ttl_seconds = None` leaves the key without expiry.
    async fn compare_and_set(
        &self,
        key: &str,
        expected: &str,
        value: &str,
        ttl_seconds: Option<u64>,
    ) -> StoreResult<bool>;

    async fn delete_if_equals(&self, key: &str, expected: &str) -> StoreResult<bool>;

    /// Remove the expiry of a key. Returns false if the key is missing or had none.
    async fn persist(&self, key: &str) -> StoreResult<bool>;

    async fn ttl(&self, key: &str) -> StoreResult<KeyTtl>;

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> StoreResult<(u64, Vec<String>)>;

    async fn ping(&self) -> StoreResult<()>;
}
