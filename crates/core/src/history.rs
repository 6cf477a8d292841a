//! Lock lifecycle history: event records and aggregate statistics.
//!
//! A [`LockEvent`] is written once per lifecycle transition of a lease
//! (acquired, released, expired, force-released) and is never modified
//! afterwards. [`compute_statistics`] is pure so every history store can
//! share it.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::lock::HolderInfo;
use crate::types::{ResourceId, Timestamp, UserId};

// ---------------------------------------------------------------------------
// LockAction
// ---------------------------------------------------------------------------

/// The lifecycle transition recorded by a [`LockEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockAction {
    Acquired,
    Released,
    Expired,
    ForceReleased,
}

impl LockAction {
    pub const ALL: [LockAction; 4] = [
        LockAction::Acquired,
        LockAction::Released,
        LockAction::Expired,
        LockAction::ForceReleased,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LockAction::Acquired => "acquired",
            LockAction::Released => "released",
            LockAction::Expired => "expired",
            LockAction::ForceReleased => "force_released",
        }
    }

    /// Whether this action closes a lease opened by [`LockAction::Acquired`].
    pub fn ends_lease(&self) -> bool {
        !matches!(self, LockAction::Acquired)
    }
}

impl fmt::Display for LockAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LockAction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LockAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown lock action '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// LockEvent
// ---------------------------------------------------------------------------

/// An immutable history record.
///
/// Built with [`LockEvent::new`] and the `with_*` builder methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockEvent {
    pub id: Uuid,
    pub resource_id: ResourceId,
    pub actor_id: UserId,
    pub actor_name: String,
    pub actor_email: String,
    pub action: LockAction,
    pub timestamp: Timestamp,
    pub duration_seconds: Option<i64>,
    pub released_by: Option<UserId>,
    pub related_lock_id: Option<Uuid>,
    pub metadata: serde_json::Value,
}

impl LockEvent {
    pub fn new(
        action: LockAction,
        resource_id: impl Into<ResourceId>,
        actor_id: impl Into<UserId>,
        actor: &HolderInfo,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            resource_id: resource_id.into(),
            actor_id: actor_id.into(),
            actor_name: actor.name.clone(),
            actor_email: actor.email.clone(),
            action,
            timestamp,
            duration_seconds: None,
            released_by: None,
            related_lock_id: None,
            metadata: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn with_duration(mut self, seconds: i64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn with_released_by(mut self, user_id: impl Into<UserId>) -> Self {
        self.released_by = Some(user_id.into());
        self
    }

    pub fn with_related_lock(mut self, lock_id: Uuid) -> Self {
        self.related_lock_id = Some(lock_id);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Aggregate counters over the full history of one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockStatistics {
    pub resource_id: ResourceId,
    pub total_events: u64,
    pub acquired_count: u64,
    pub released_count: u64,
    pub expired_count: u64,
    pub force_released_count: u64,
    /// Leases for which both the opening and closing event were found.
    pub completed_leases: u64,
    /// Mean of the paired lease durations, `None` when nothing is paired.
    pub average_held_seconds: Option<f64>,
    pub distinct_holders: u64,
}

/// Compute [`LockStatistics`] for `resource_id` from its events.
///
/// Durations pair each `Acquired` event with the next closing event
/// (`Released`, `Expired`, or `ForceReleased`) carrying the same
/// `related_lock_id`. Events without a lock id are counted but not paired.
/// Input order does not matter.
pub fn compute_statistics(resource_id: &str, events: &[LockEvent]) -> LockStatistics {
    let mut ordered: Vec<&LockEvent> = events
        .iter()
        .filter(|e| e.resource_id == resource_id)
        .collect();
    ordered.sort_by_key(|e| (e.timestamp, e.id));

    let mut stats = LockStatistics {
        resource_id: resource_id.to_string(),
        total_events: ordered.len() as u64,
        acquired_count: 0,
        released_count: 0,
        expired_count: 0,
        force_released_count: 0,
        completed_leases: 0,
        average_held_seconds: None,
        distinct_holders: 0,
    };

    let mut open: HashMap<Uuid, Timestamp> = HashMap::new();
    let mut holders: HashSet<&str> = HashSet::new();
    let mut total_millis: i64 = 0;

    for event in ordered {
        match event.action {
            LockAction::Acquired => stats.acquired_count += 1,
            LockAction::Released => stats.released_count += 1,
            LockAction::Expired => stats.expired_count += 1,
            LockAction::ForceReleased => stats.force_released_count += 1,
        }

        if event.action == LockAction::Acquired {
            holders.insert(event.actor_id.as_str());
        }

        let Some(lock_id) = event.related_lock_id else {
            continue;
        };

        if event.action.ends_lease() {
            if let Some(started) = open.remove(&lock_id) {
                total_millis += (event.timestamp - started).num_milliseconds().max(0);
                stats.completed_leases += 1;
            }
        } else {
            open.entry(lock_id).or_insert(event.timestamp);
        }
    }

    stats.distinct_holders = holders.len() as u64;
    if stats.completed_leases > 0 {
        stats.average_held_seconds =
            Some(total_millis as f64 / 1000.0 / stats.completed_leases as f64);
    }
    stats
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_800_000_000 + secs, 0).unwrap()
    }

    fn event(action: LockAction, actor: &str, lock_id: Uuid, secs: i64) -> LockEvent {
        LockEvent::new(action, "A1", actor, &HolderInfo::new(actor, ""), at(secs))
            .with_related_lock(lock_id)
    }

    #[test]
    fn action_string_round_trip() {
        for action in LockAction::ALL {
            assert_eq!(action.as_str().parse::<LockAction>().unwrap(), action);
        }
        assert!("stolen".parse::<LockAction>().is_err());
    }

    #[test]
    fn action_serializes_snake_case() {
        let json = serde_json::to_string(&LockAction::ForceReleased).unwrap();
        assert_eq!(json, r#""force_released""#);
    }

    #[test]
    fn builder_sets_optional_fields() {
        let lock_id = Uuid::now_v7();
        let e = LockEvent::new(
            LockAction::ForceReleased,
            "A1",
            "u1",
            &HolderInfo::new("Ada", "ada@example.com"),
            at(0),
        )
        .with_duration(42)
        .with_released_by("admin")
        .with_related_lock(lock_id)
        .with_metadata(serde_json::json!({"reason": "takeover"}));

        assert_eq!(e.actor_name, "Ada");
        assert_eq!(e.duration_seconds, Some(42));
        assert_eq!(e.released_by.as_deref(), Some("admin"));
        assert_eq!(e.related_lock_id, Some(lock_id));
        assert_eq!(e.metadata["reason"], "takeover");
    }

    #[test]
    fn statistics_on_empty_history() {
        let stats = compute_statistics("A1", &[]);
        assert_eq!(stats.total_events, 0);
        assert_eq!(stats.average_held_seconds, None);
        assert_eq!(stats.distinct_holders, 0);
    }

    #[test]
    fn statistics_pair_leases_by_lock_id() {
        let l1 = Uuid::now_v7();
        let l2 = Uuid::now_v7();
        let l3 = Uuid::now_v7();
        // Deliberately out of order.
        let events = vec![
            event(LockAction::Released, "u1", l1, 60),
            event(LockAction::Acquired, "u1", l1, 0),
            event(LockAction::Acquired, "u2", l2, 100),
            event(LockAction::Expired, "u2", l2, 400),
            event(LockAction::Acquired, "u1", l3, 500),
        ];

        let stats = compute_statistics("A1", &events);

        assert_eq!(stats.total_events, 5);
        assert_eq!(stats.acquired_count, 3);
        assert_eq!(stats.released_count, 1);
        assert_eq!(stats.expired_count, 1);
        assert_eq!(stats.force_released_count, 0);
        assert_eq!(stats.completed_leases, 2);
        assert_eq!(stats.average_held_seconds, Some(180.0));
        assert_eq!(stats.distinct_holders, 2);
    }

    #[test]
    fn statistics_ignore_other_resources_and_unpaired_closers() {
        let l1 = Uuid::now_v7();
        let mut foreign = event(LockAction::Acquired, "u9", Uuid::now_v7(), 0);
        foreign.resource_id = "B2".into();
        let events = vec![
            foreign,
            event(LockAction::ForceReleased, "admin", l1, 10),
        ];

        let stats = compute_statistics("A1", &events);
        assert_eq!(stats.total_events, 1);
        assert_eq!(stats.force_released_count, 1);
        assert_eq!(stats.completed_leases, 0);
        assert_eq!(stats.distinct_holders, 0);
    }

    #[test]
    fn statistics_average_uses_sub_second_precision() {
        let l1 = Uuid::now_v7();
        let start = event(LockAction::Acquired, "u1", l1, 0);
        let mut end = event(LockAction::Released, "u1", l1, 0);
        end.timestamp = start.timestamp + Duration::milliseconds(1500);

        let stats = compute_statistics("A1", &[start, end]);
        assert_eq!(stats.average_held_seconds, Some(1.5));
    }
}
