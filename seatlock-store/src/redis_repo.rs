use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisError};
use seatlock_core::repository::{KeyTtl, SeatStore, StoreError, StoreResult};
use tracing::{error, info};

/// Redis-backed seat store. One multiplexed connection is opened at startup
/// and shared by every clone.
#[derive(Clone)]
pub struct RedisClient {
    conn: MultiplexedConnection,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, RedisError> {
        let client = redis::Client::open(connection_string)?;
        let conn = client.get_multiplexed_async_connection().await?;
        info!("Connected to Redis");
        Ok(Self { conn })
    }

    fn conn(&self) -> MultiplexedConnection {
        self.conn.clone()
    }
}

fn store_error(err: RedisError) -> StoreError {
    if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
        error!("Redis unavailable: {}", err);
        StoreError::Unavailable(err.to_string())
    } else {
        error!("Redis command failed: {}", err);
        StoreError::Command(err.to_string())
    }
}

#[async_trait]
impl SeatStore for RedisClient {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn();
        conn.get(key).await.map_err(store_error)
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut conn = self.conn();
        conn.set::<_, _, ()>(key, value).await.map_err(store_error)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> StoreResult<()> {
        let mut conn = self.conn();
        conn.set_ex::<_, _, ()>(key, value, ttl_seconds).await.map_err(store_error)
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> StoreResult<bool> {
        let mut conn = self.conn();

        // SET NX: Only set if key does not exist
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;

        Ok(result.is_some())
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: &str,
        value: &str,
        ttl_seconds: Option<u64>,
    ) -> StoreResult<bool> {
        let mut conn = self.conn();
        // Plain SET drops any expiry, SET EX re-arms it
        let script = redis::Script::new(r#"
            if redis.call("GET", KEYS[1]) ~= ARGV[1] then
                return 0
            end
            if ARGV[3] == "" then
                redis.call("SET", KEYS[1], ARGV[2])
            else
                redis.call("SET", KEYS[1], ARGV[2], "EX", ARGV[3])
            end
            return 1
        "#);

        let ttl = ttl_seconds.map(|t| t.to_string()).unwrap_or_default();
        let swapped: i64 = script
            .key(key)
            .arg(expected)
            .arg(value)
            .arg(ttl)
            .invoke_async(&mut conn)
            .await
            .map_err(store_error)?;

        Ok(swapped == 1)
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> StoreResult<bool> {
        let mut conn = self.conn();
        let script = redis::Script::new(r#"
            if redis.call("GET", KEYS[1]) == ARGV[1] then
                return redis.call("DEL", KEYS[1])
            end
            return 0
        "#);

        let deleted: i64 = script
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(store_error)?;

        Ok(deleted == 1)
    }

    async fn persist(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.conn();
        conn.persist(key).await.map_err(store_error)
    }

    async fn ttl(&self, key: &str) -> StoreResult<KeyTtl> {
        let mut conn = self.conn();
        let ttl: i64 = conn.ttl(key).await.map_err(store_error)?;
        Ok(match ttl {
            -2 => KeyTtl::Missing,
            -1 => KeyTtl::NoExpiry,
            secs if secs >= 0 => KeyTtl::Expires(secs as u64),
            other => return Err(StoreError::Command(format!("unexpected TTL reply {}", other))),
        })
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> StoreResult<(u64, Vec<String>)> {
        let mut conn = self.conn();
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;

        Ok((next, keys))
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(())
    }
}
