use chrono::{DateTime, Duration, Utc};
use futures_util::TryStreamExt;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::index::SeatIndex;
use crate::models::{validate_id, Event, HoldTime, Seat, SeatStatus};
use crate::repository::KeyTtl;
use crate::{CoreError, CoreResult};

pub const MAX_SEATS_PER_USER: usize = 5;
pub const DEFAULT_HOLD_SECONDS: u64 = 60;
/// Upper bound on any hold or refresh duration (one day).
pub const MAX_HOLD_SECONDS: u64 = 24 * 60 * 60;

/// Tunables of the hold lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldPolicy {
    pub hold_seconds: u64,
    pub refresh_seconds: u64,
    pub max_seats_per_user: usize,
}

impl Default for HoldPolicy {
    fn default() -> Self {
        Self {
            hold_seconds: DEFAULT_HOLD_SECONDS,
            refresh_seconds: DEFAULT_HOLD_SECONDS,
            max_seats_per_user: MAX_SEATS_PER_USER,
        }
    }
}

/// A successful hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatHold {
    pub seat_id: String,
    pub event_id: String,
    pub user_id: String,
    pub hold_seconds: u64,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoldOutcome {
    Held(SeatHold),
    SeatUnavailable,
    QuotaExceeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    Reserved,
    NoActiveHold,
    AlreadyReserved,
    HeldByAnotherUser,
}

impl ReserveOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ReserveOutcome::Reserved)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed { hold_seconds: u64 },
    NoActiveHold,
    AlreadyReserved,
}

impl RefreshOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RefreshOutcome::Refreshed { .. })
    }
}

/// Seat state machine: available -> held -> reserved, with holds lapsing by TTL.
///
/// Stateless apart from the index; every decision is made by an atomic
/// store write so concurrent callers cannot double-book a seat or exceed
/// the per-user quota.
#[derive(Clone)]
pub struct HoldEngine {
    index: SeatIndex,
    policy: HoldPolicy,
}

impl HoldEngine {
    pub fn new(index: SeatIndex, policy: HoldPolicy) -> Self {
        Self { index, policy }
    }

    pub fn policy(&self) -> &HoldPolicy {
        &self.policy
    }

    pub fn index(&self) -> &SeatIndex {
        &self.index
    }

    /// Hold `seat_id` for the default duration.
    pub async fn hold(&self, user_id: &str, event: &Event, seat_id: &str) -> CoreResult<HoldOutcome> {
        self.hold_for(user_id, event, seat_id, self.policy.hold_seconds).await
    }

    pub async fn hold_for(
        &self,
        user_id: &str,
        event: &Event,
        seat_id: &str,
        hold_seconds: u64,
    ) -> CoreResult<HoldOutcome> {
        validate_id("User ID", user_id)?;
        validate_id("Seat ID", seat_id)?;
        if !(1..=MAX_HOLD_SECONDS).contains(&hold_seconds) {
            return Err(CoreError::ValidationError(format!(
                "Hold duration must be between 1 and {} seconds",
                MAX_HOLD_SECONDS
            )));
        }
        if !event.has_seat(seat_id) {
            return Err(CoreError::NotFound(format!("Seat {} in event {}", seat_id, event.id)));
        }

        // Quota first: a user at the limit is refused whatever the seat state
        let max = self.policy.max_seats_per_user;
        let Some(slot) = self
            .index
            .take_quota_slot(&event.id, user_id, seat_id, hold_seconds, max)
            .await?
        else {
            info!("User {} already holds {} seats for event {}", user_id, max, event.id);
            return Ok(HoldOutcome::QuotaExceeded);
        };

        if !self.index.try_claim(&event.id, seat_id, user_id, hold_seconds).await? {
            self.index.drop_quota_slot(&event.id, user_id, slot, seat_id).await?;
            debug!("Seat {}/{} already claimed", event.id, seat_id);
            return Ok(HoldOutcome::SeatUnavailable);
        }

        let seat = Seat::held(&event.id, seat_id, user_id);
        self.index.write_record(&seat, Some(hold_seconds)).await?;

        info!("Seat held: {}/{} -> {} for {}s", event.id, seat_id, user_id, hold_seconds);
        Ok(HoldOutcome::Held(SeatHold {
            seat_id: seat_id.to_string(),
            event_id: event.id.clone(),
            user_id: user_id.to_string(),
            hold_seconds,
            expires_at: Utc::now() + Duration::seconds(hold_seconds as i64),
        }))
    }

    /// Hold the lowest-numbered free seat of the event.
    pub async fn hold_any(&self, user_id: &str, event: &Event) -> CoreResult<HoldOutcome> {
        validate_id("User ID", user_id)?;
        let claimed = self.index.claimed_seats(&event.id).await?;

        for seat_id in event.seat_ids().filter(|id| !claimed.contains(id)) {
            match self.hold(user_id, event, &seat_id).await? {
                // Lost the seat to a concurrent claimant, try the next one
                HoldOutcome::SeatUnavailable => continue,
                outcome => return Ok(outcome),
            }
        }

        if self.is_max_seats_held(user_id, &event.id).await? {
            return Ok(HoldOutcome::QuotaExceeded);
        }
        Ok(HoldOutcome::SeatUnavailable)
    }

    /// Promote a live hold to a permanent reservation.
    pub async fn reserve(&self, event_id: &str, seat_id: &str, user_id: &str) -> CoreResult<ReserveOutcome> {
        validate_id("Event ID", event_id)?;
        validate_id("Seat ID", seat_id)?;
        validate_id("User ID", user_id)?;

        let outcome = match self.index.claim(event_id, seat_id).await? {
            None => ReserveOutcome::NoActiveHold,
            Some(claim) if !claim.is_owned_by(user_id) => ReserveOutcome::HeldByAnotherUser,
            Some(claim) if claim.status == SeatStatus::Reserved => {
                self.settle_reservation(event_id, seat_id, user_id).await?
            }
            Some(_) => {
                if self.index.promote_claim(event_id, seat_id, user_id).await? {
                    self.complete_reservation(event_id, seat_id, user_id).await?;
                    ReserveOutcome::Reserved
                } else {
                    // Lost a race: either our own concurrent reserve or the hold lapsed
                    match self.index.claim(event_id, seat_id).await? {
                        Some(claim) if claim.is_owned_by(user_id) && claim.status == SeatStatus::Reserved => {
                            self.settle_reservation(event_id, seat_id, user_id).await?
                        }
                        Some(claim) if !claim.is_owned_by(user_id) => ReserveOutcome::HeldByAnotherUser,
                        _ => ReserveOutcome::NoActiveHold,
                    }
                }
            }
        };

        match outcome {
            ReserveOutcome::Reserved => info!("Seat reserved: {}/{} -> {}", event_id, seat_id, user_id),
            other => debug!("Reserve of {}/{} by {} rejected: {:?}", event_id, seat_id, user_id, other),
        }
        Ok(outcome)
    }

    /// The claim already says reserved for `user_id`. Finish the reservation if
    /// an earlier attempt stopped before the record was made permanent.
    async fn settle_reservation(&self, event_id: &str, seat_id: &str, user_id: &str) -> CoreResult<ReserveOutcome> {
        let record = self.index.record(event_id, seat_id, user_id).await?;
        if record.is_some_and(|r| r.seat.status == SeatStatus::Reserved) {
            return Ok(ReserveOutcome::AlreadyReserved);
        }
        warn!("Completing interrupted reservation of {}/{} by {}", event_id, seat_id, user_id);
        self.complete_reservation(event_id, seat_id, user_id).await?;
        Ok(ReserveOutcome::Reserved)
    }

    /// The claim decides ownership; the record follows it.
    async fn complete_reservation(&self, event_id: &str, seat_id: &str, user_id: &str) -> CoreResult<()> {
        let seat = Seat::reserved(event_id, seat_id, user_id);
        self.index.write_record(&seat, None).await?;
        self.index
            .release_quota_slot(event_id, user_id, seat_id, self.policy.max_seats_per_user)
            .await?;
        Ok(())
    }

    /// Give a live hold a fresh expiry. Reserved seats are terminal and refuse refresh.
    pub async fn refresh_hold(&self, event_id: &str, user_id: &str, seat_id: &str) -> CoreResult<RefreshOutcome> {
        validate_id("Event ID", event_id)?;
        validate_id("Seat ID", seat_id)?;
        validate_id("User ID", user_id)?;

        let ttl = self.policy.refresh_seconds;
        let Some(record) = self.index.record(event_id, seat_id, user_id).await? else {
            return Ok(RefreshOutcome::NoActiveHold);
        };
        if record.seat.status == SeatStatus::Reserved {
            return Ok(RefreshOutcome::AlreadyReserved);
        }

        if !self.index.rearm_claim(event_id, seat_id, user_id, ttl).await? {
            return Ok(self.refresh_rejection(event_id, seat_id, user_id).await?);
        }
        if !self.index.rearm_record(&record, ttl).await? {
            // The record lapsed after the claim was re-armed; the hold is gone
            if self.index.record(event_id, seat_id, user_id).await?.is_none() {
                self.index.release_claim(event_id, seat_id, user_id).await?;
            }
            return Ok(self.refresh_rejection(event_id, seat_id, user_id).await?);
        }
        if !self
            .index
            .rearm_quota_slot(event_id, user_id, seat_id, ttl, self.policy.max_seats_per_user)
            .await?
        {
            warn!("No quota slot left to back refreshed hold {}/{} of {}", event_id, seat_id, user_id);
        }

        info!("Hold refreshed: {}/{} -> {} for {}s", event_id, seat_id, user_id, ttl);
        Ok(RefreshOutcome::Refreshed { hold_seconds: ttl })
    }

    async fn refresh_rejection(&self, event_id: &str, seat_id: &str, user_id: &str) -> CoreResult<RefreshOutcome> {
        match self.index.claim(event_id, seat_id).await? {
            Some(claim) if claim.is_owned_by(user_id) && claim.status == SeatStatus::Reserved => {
                Ok(RefreshOutcome::AlreadyReserved)
            }
            _ => Ok(RefreshOutcome::NoActiveHold),
        }
    }

    pub async fn hold_time_remaining(&self, event_id: &str, user_id: &str, seat_id: &str) -> CoreResult<HoldTime> {
        validate_id("Event ID", event_id)?;
        validate_id("Seat ID", seat_id)?;
        validate_id("User ID", user_id)?;

        let remaining = match self.index.record_ttl(event_id, seat_id, user_id).await? {
            KeyTtl::Expires(secs) => HoldTime::Remaining(secs),
            KeyTtl::NoExpiry => HoldTime::Persisted,
            KeyTtl::Missing => HoldTime::Absent,
        };
        Ok(remaining)
    }

    pub async fn is_max_seats_held(&self, user_id: &str, event_id: &str) -> CoreResult<bool> {
        let held = self.list_held_by_user(event_id, user_id).await?;
        Ok(held.len() >= self.policy.max_seats_per_user)
    }

    /// Seats of `event_id` currently held (not reserved) by `user_id`.
    pub async fn list_held_by_user(&self, event_id: &str, user_id: &str) -> CoreResult<Vec<Seat>> {
        validate_id("Event ID", event_id)?;
        validate_id("User ID", user_id)?;

        let mut seats: Vec<Seat> = self
            .index
            .scan_by_user(user_id)
            .try_filter(|seat| futures_util::future::ready(seat.event_id == event_id && seat.is_held_by(user_id)))
            .try_collect()
            .await?;
        seats.sort_by_key(Seat::ordering_key);
        Ok(seats)
    }

    /// Reserved seats of `user_id` across all events.
    pub async fn list_reserved_by_user(&self, user_id: &str) -> CoreResult<Vec<Seat>> {
        validate_id("User ID", user_id)?;

        let mut seats: Vec<Seat> = self
            .index
            .scan_by_user(user_id)
            .try_filter(|seat| {
                futures_util::future::ready(
                    seat.status == SeatStatus::Reserved && seat.user_id.as_deref() == Some(user_id),
                )
            })
            .try_collect()
            .await?;
        seats.sort_by_key(Seat::ordering_key);
        Ok(seats)
    }
}
