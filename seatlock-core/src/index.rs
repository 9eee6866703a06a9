//! Seat index: maps seats, claims and quota slots onto store keys.
//!
//! Key layout:
//!
//! ```text
//! event:{event}:seat:{seat}:user:{user}   -> Seat JSON (TTL while held, none once reserved)
//! claim:{event}:{seat}                    -> "held/{user}" | "reserved/{user}"
//! quota:{event}:{user}:{slot}             -> seat id, expires with the hold
//! ```
//!
//! The claim key is the single writer gate for a seat: it is only ever
//! created with create-if-absent and moved with compare-and-set. Occupancy
//! records are keyed by user so that `*:user:{user}` enumerates a user's seats.

use futures_util::stream::{self, BoxStream, StreamExt};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::warn;

use crate::models::{Event, Seat, SeatStatus};
use crate::repository::{KeyTtl, SeatStore};
use crate::CoreResult;

const DEFAULT_SCAN_COUNT: usize = 100;

/// Current owner of a seat, as recorded in its claim key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub user_id: String,
    pub status: SeatStatus,
}

impl Claim {
    fn held(user_id: &str) -> String {
        format!("held/{}", user_id)
    }

    fn reserved(user_id: &str) -> String {
        format!("reserved/{}", user_id)
    }

    fn decode(raw: &str) -> Option<Self> {
        let (state, user_id) = raw.split_once('/')?;
        let status = match state {
            "held" => SeatStatus::Held,
            "reserved" => SeatStatus::Reserved,
            _ => return None,
        };
        Some(Self { user_id: user_id.to_string(), status })
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

/// An occupancy record together with its stored encoding, so that
/// conditional writes compare against exactly what was read.
#[derive(Debug, Clone)]
pub struct SeatRecord {
    pub seat: Seat,
    encoded: String,
}

#[derive(Clone)]
pub struct SeatIndex {
    store: Arc<dyn SeatStore>,
    scan_count: usize,
}

impl SeatIndex {
    pub fn new(store: Arc<dyn SeatStore>) -> Self {
        Self { store, scan_count: DEFAULT_SCAN_COUNT }
    }

    /// Number of keys the store examines per scan round trip.
    pub fn with_scan_count(mut self, count: usize) -> Self {
        self.scan_count = count.max(1);
        self
    }

    pub fn key_for(event_id: &str, seat_id: &str, user_id: &str) -> String {
        format!("event:{}:seat:{}:user:{}", event_id, seat_id, user_id)
    }

    pub fn claim_key(event_id: &str, seat_id: &str) -> String {
        format!("claim:{}:{}", event_id, seat_id)
    }

    pub fn quota_key(event_id: &str, user_id: &str, slot: usize) -> String {
        format!("quota:{}:{}:{}", event_id, user_id, slot)
    }

    /// Split an occupancy key into `(event, seat, user)`.
    pub fn parse_key(key: &str) -> Option<(&str, &str, &str)> {
        let rest = key.strip_prefix("event:")?;
        let (event_id, rest) = rest.split_once(":seat:")?;
        let (seat_id, user_id) = rest.split_once(":user:")?;
        if event_id.contains(':') || seat_id.contains(':') || user_id.contains(':') {
            return None;
        }
        Some((event_id, seat_id, user_id))
    }

    // ---------------------------------------------------------------------
    // Occupancy records
    // ---------------------------------------------------------------------

    pub async fn record(&self, event_id: &str, seat_id: &str, user_id: &str) -> CoreResult<Option<SeatRecord>> {
        let key = Self::key_for(event_id, seat_id, user_id);
        let Some(encoded) = self.store.get(&key).await? else {
            return Ok(None);
        };
        let seat: Seat = serde_json::from_str(&encoded)?;
        Ok(Some(SeatRecord { seat, encoded }))
    }

    /// Write a record. `ttl_seconds = None` makes it permanent.
    pub async fn write_record(&self, seat: &Seat, ttl_seconds: Option<u64>) -> CoreResult<()> {
        let user_id = seat.user_id.as_deref().unwrap_or_default();
        let key = Self::key_for(&seat.event_id, &seat.id, user_id);
        let encoded = serde_json::to_string(seat)?;
        match ttl_seconds {
            Some(ttl) => self.store.set_ex(&key, &encoded, ttl).await?,
            None => self.store.set(&key, &encoded).await?,
        }
        Ok(())
    }

    /// Re-arm the expiry of a record, provided it is unchanged since it was read.
    pub async fn rearm_record(&self, record: &SeatRecord, ttl_seconds: u64) -> CoreResult<bool> {
        let user_id = record.seat.user_id.as_deref().unwrap_or_default();
        let key = Self::key_for(&record.seat.event_id, &record.seat.id, user_id);
        Ok(self
            .store
            .compare_and_set(&key, &record.encoded, &record.encoded, Some(ttl_seconds))
            .await?)
    }

    pub async fn record_ttl(&self, event_id: &str, seat_id: &str, user_id: &str) -> CoreResult<KeyTtl> {
        Ok(self.store.ttl(&Self::key_for(event_id, seat_id, user_id)).await?)
    }

    // ---------------------------------------------------------------------
    // Seat claims
    // ---------------------------------------------------------------------

    pub async fn claim(&self, event_id: &str, seat_id: &str) -> CoreResult<Option<Claim>> {
        let raw = self.store.get(&Self::claim_key(event_id, seat_id)).await?;
        Ok(raw.as_deref().and_then(|raw| {
            let claim = Claim::decode(raw);
            if claim.is_none() {
                warn!("Ignoring malformed claim on {}/{}: {}", event_id, seat_id, raw);
            }
            claim
        }))
    }

    /// Claim a free seat for `user_id`. Exactly one concurrent caller wins.
    pub async fn try_claim(&self, event_id: &str, seat_id: &str, user_id: &str, ttl_seconds: u64) -> CoreResult<bool> {
        let key = Self::claim_key(event_id, seat_id);
        Ok(self.store.set_nx_ex(&key, &Claim::held(user_id), ttl_seconds).await?)
    }

    /// Turn a live hold into a permanent reservation.
    pub async fn promote_claim(&self, event_id: &str, seat_id: &str, user_id: &str) -> CoreResult<bool> {
        let key = Self::claim_key(event_id, seat_id);
        Ok(self
            .store
            .compare_and_set(&key, &Claim::held(user_id), &Claim::reserved(user_id), None)
            .await?)
    }

    /// Extend a live hold. Fails once the claim is reserved, expired or taken.
    pub async fn rearm_claim(&self, event_id: &str, seat_id: &str, user_id: &str, ttl_seconds: u64) -> CoreResult<bool> {
        let key = Self::claim_key(event_id, seat_id);
        let held = Claim::held(user_id);
        Ok(self.store.compare_and_set(&key, &held, &held, Some(ttl_seconds)).await?)
    }

    pub async fn release_claim(&self, event_id: &str, seat_id: &str, user_id: &str) -> CoreResult<bool> {
        let key = Self::claim_key(event_id, seat_id);
        Ok(self.store.delete_if_equals(&key, &Claim::held(user_id)).await?)
    }

    // ---------------------------------------------------------------------
    // Quota slots
    // ---------------------------------------------------------------------

    /// Take one of `max_slots` expiring slots for this user and event.
    /// `None` means every slot is occupied by a live hold.
    pub async fn take_quota_slot(
        &self,
        event_id: &str,
        user_id: &str,
        seat_id: &str,
        ttl_seconds: u64,
        max_slots: usize,
    ) -> CoreResult<Option<usize>> {
        for slot in 0..max_slots {
            let key = Self::quota_key(event_id, user_id, slot);
            if self.store.set_nx_ex(&key, seat_id, ttl_seconds).await? {
                return Ok(Some(slot));
            }
        }
        Ok(None)
    }

    pub async fn drop_quota_slot(&self, event_id: &str, user_id: &str, slot: usize, seat_id: &str) -> CoreResult<bool> {
        let key = Self::quota_key(event_id, user_id, slot);
        Ok(self.store.delete_if_equals(&key, seat_id).await?)
    }

    async fn find_quota_slot(
        &self,
        event_id: &str,
        user_id: &str,
        seat_id: &str,
        max_slots: usize,
    ) -> CoreResult<Option<usize>> {
        for slot in 0..max_slots {
            let key = Self::quota_key(event_id, user_id, slot);
            if self.store.get(&key).await?.as_deref() == Some(seat_id) {
                return Ok(Some(slot));
            }
        }
        Ok(None)
    }

    pub async fn release_quota_slot(
        &self,
        event_id: &str,
        user_id: &str,
        seat_id: &str,
        max_slots: usize,
    ) -> CoreResult<bool> {
        match self.find_quota_slot(event_id, user_id, seat_id, max_slots).await? {
            Some(slot) => self.drop_quota_slot(event_id, user_id, slot, seat_id).await,
            None => Ok(false),
        }
    }

    /// Give the slot backing `seat_id` a fresh expiry, re-taking one if it already lapsed.
    pub async fn rearm_quota_slot(
        &self,
        event_id: &str,
        user_id: &str,
        seat_id: &str,
        ttl_seconds: u64,
        max_slots: usize,
    ) -> CoreResult<bool> {
        if let Some(slot) = self.find_quota_slot(event_id, user_id, seat_id, max_slots).await? {
            let key = Self::quota_key(event_id, user_id, slot);
            if self.store.compare_and_set(&key, seat_id, seat_id, Some(ttl_seconds)).await? {
                return Ok(true);
            }
        }
        let slot = self
            .take_quota_slot(event_id, user_id, seat_id, ttl_seconds, max_slots)
            .await?;
        Ok(slot.is_some())
    }

    // ---------------------------------------------------------------------
    // Scans
    // ---------------------------------------------------------------------

    /// Every occupancy record of `user_id`, across events.
    ///
    /// Lazy and restartable: each call starts a fresh cursor. Not a snapshot;
    /// records that expire between the scan and the fetch are skipped.
    pub fn scan_by_user(&self, user_id: &str) -> BoxStream<'static, CoreResult<Seat>> {
        let state = UserScan {
            store: self.store.clone(),
            pattern: format!("*:user:{}", user_id),
            count: self.scan_count,
            cursor: Some(0),
            pending: VecDeque::new(),
        };
        stream::try_unfold(state, next_user_seat).boxed()
    }

    /// Seat ids of `event_id` that currently carry a claim, held or reserved.
    pub async fn claimed_seats(&self, event_id: &str) -> CoreResult<HashSet<String>> {
        let prefix = format!("claim:{}:", event_id);
        let pattern = format!("{}*", prefix);
        let mut claimed = HashSet::new();
        let mut cursor = 0;
        loop {
            let (next, keys) = self.store.scan(cursor, &pattern, self.scan_count).await?;
            claimed.extend(
                keys.iter()
                    .filter_map(|key| key.strip_prefix(&prefix))
                    .map(str::to_string),
            );
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(claimed)
    }

    /// Seats of the event with no live claim.
    pub async fn find_available(&self, event: &Event) -> CoreResult<Vec<Seat>> {
        let claimed = self.claimed_seats(&event.id).await?;
        Ok(event
            .seat_ids()
            .filter(|seat_id| !claimed.contains(seat_id))
            .map(|seat_id| Seat::available(&event.id, &seat_id))
            .collect())
    }
}

struct UserScan {
    store: Arc<dyn SeatStore>,
    pattern: String,
    count: usize,
    cursor: Option<u64>,
    pending: VecDeque<String>,
}

async fn next_user_seat(mut scan: UserScan) -> CoreResult<Option<(Seat, UserScan)>> {
    loop {
        if let Some(key) = scan.pending.pop_front() {
            if SeatIndex::parse_key(&key).is_none() {
                continue;
            }
            let Some(raw) = scan.store.get(&key).await? else {
                continue;
            };
            match serde_json::from_str::<Seat>(&raw) {
                Ok(seat) => return Ok(Some((seat, scan))),
                Err(e) => {
                    warn!("Skipping undecodable seat record {}: {}", key, e);
                    continue;
                }
            }
        }

        let Some(cursor) = scan.cursor else {
            return Ok(None);
        };
        let (next, keys) = scan.store.scan(cursor, &scan.pattern, scan.count).await?;
        scan.pending.extend(keys);
        scan.cursor = (next != 0).then_some(next);
    }
}
