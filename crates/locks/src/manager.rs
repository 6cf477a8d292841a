//! The lock manager: acquire, release, heartbeat, force-release, takeover,
//! and expiry.
//!
//! Every operation follows the same shape:
//!
//! 1. Enter the resource's section (one waiter at a time per resource).
//! 2. Read the record; if the lease has elapsed, commit the expiry first.
//! 3. Decide the outcome from the record.
//! 4. If the outcome changes state, commit it with one compare-and-swap and
//!    publish its room event before leaving the section.
//! 5. Leave the section, then write history.
//!
//! Publishing inside the section costs one non-blocking channel send and
//! keeps per-resource event order equal to commit order. Fan-out to sockets
//! happens in the room router, outside any section.

use std::sync::Arc;

use chrono::{Duration, Utc};
use coedit_core::history::{LockAction, LockEvent};
use coedit_core::lock::{HolderInfo, ResourceLock, DEFAULT_LOCK_TTL_SECS};
use coedit_core::protocol::ServerMessage;
use coedit_core::types::{Timestamp, UserId};
use coedit_db::{LockStore, StoreError};
use coedit_events::{EventBus, RoomEvent};
use serde_json::json;

use crate::history::HistoryRecorder;
use crate::sections::KeyedSections;

/// How many read/decide/swap rounds an operation attempts before giving up.
///
/// Swaps only fail when another process wrote the same record, which the
/// in-process section cannot see.
const MAX_CAS_ATTEMPTS: usize = 5;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LockManagerConfig {
    /// Lease length granted by acquire, self-refresh, and heartbeat.
    pub ttl: Duration,
}

impl Default for LockManagerConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::seconds(DEFAULT_LOCK_TTL_SECS),
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs and outcomes
// ---------------------------------------------------------------------------

/// The identity asking for a lock, as vouched for by the identity
/// collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub user_id: UserId,
    pub info: HolderInfo,
}

impl Requester {
    pub fn new(user_id: impl Into<UserId>, info: HolderInfo) -> Self {
        Self {
            user_id: user_id.into(),
            info,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AcquireOutcome {
    /// The requester holds the lock. `refreshed` is true when they already
    /// held it and the call only extended the lease.
    Locked { lock: ResourceLock, refreshed: bool },
    /// Somebody else holds a valid lease.
    HolderConflict { current: ResourceLock },
    /// Somebody else holds a valid lease and the caller's cached version is
    /// stale; the caller must resync before retrying.
    VersionConflict {
        current: ResourceLock,
        expected_version: i64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReleaseOutcome {
    /// The lease ended. Carries the inactive record left behind.
    Released { lock: ResourceLock },
    /// The caller does not hold a valid lease. Carries the current holder's
    /// lease, if there is one.
    NotHolder { current: Option<ResourceLock> },
    /// The caller holds the lease but presented a different version.
    VersionMismatch {
        current: ResourceLock,
        expected_version: i64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum HeartbeatOutcome {
    Refreshed { lock: ResourceLock },
    NotHolder { current: Option<ResourceLock> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForceReleaseOutcome {
    /// The lease was cleared. Carries the lease as it was before.
    Released { previous: ResourceLock },
    /// No valid lease existed.
    NotFound,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TakeoverOutcome {
    pub lock: ResourceLock,
    /// The lease that was force-released on the way, if any.
    pub previous: Option<ResourceLock>,
}

/// Snapshot returned by [`LockManager::status`].
#[derive(Debug, Clone, PartialEq)]
pub struct LockStatus {
    pub lock: Option<ResourceLock>,
    pub remaining_seconds: Option<i64>,
}

impl LockStatus {
    /// Version a client should have cached: the held lease's version, or
    /// `0` when the resource is unlocked.
    pub fn current_version(&self) -> i64 {
        self.lock.as_ref().map_or(0, |l| l.version)
    }

    /// Whether a client-cached version no longer matches.
    pub fn is_stale(&self, cached_version: i64) -> bool {
        cached_version != self.current_version()
    }
}

// ---------------------------------------------------------------------------
// Internal decision plumbing
// ---------------------------------------------------------------------------

/// A state change to commit: the new record, the room message announcing
/// it, and the history rows describing it.
struct Commit {
    record: ResourceLock,
    message: ServerMessage,
    history: Vec<LockEvent>,
}

struct Decision<T> {
    outcome: T,
    commit: Option<Commit>,
}

impl<T> Decision<T> {
    fn unchanged(outcome: T) -> Self {
        Self {
            outcome,
            commit: None,
        }
    }

    fn commit(outcome: T, commit: Commit) -> Self {
        Self {
            outcome,
            commit: Some(commit),
        }
    }
}

// ---------------------------------------------------------------------------
// LockManager
// ---------------------------------------------------------------------------

pub struct LockManager {
    store: Arc<dyn LockStore>,
    recorder: HistoryRecorder,
    bus: Arc<EventBus>,
    sections: KeyedSections,
    config: LockManagerConfig,
}

impl LockManager {
    pub fn new(
        store: Arc<dyn LockStore>,
        recorder: HistoryRecorder,
        bus: Arc<EventBus>,
        config: LockManagerConfig,
    ) -> Self {
        Self {
            store,
            recorder,
            bus,
            sections: KeyedSections::new(),
            config,
        }
    }

    pub fn config(&self) -> &LockManagerConfig {
        &self.config
    }

    pub fn recorder(&self) -> &HistoryRecorder {
        &self.recorder
    }

    /// Reachability of the underlying lock store.
    pub async fn store_health(&self) -> Result<(), StoreError> {
        self.store.ping().await
    }

    /// Current valid lease of a resource, if any.
    pub async fn status(&self, resource_id: &str) -> Result<LockStatus, StoreError> {
        self.run(resource_id, |current, now| {
            let lock = current.filter(|l| l.is_held_at(now)).cloned();
            let remaining_seconds = lock.as_ref().map(|l| l.remaining_seconds(now));
            Decision::unchanged(LockStatus {
                lock,
                remaining_seconds,
            })
        })
        .await
    }

    /// Acquire the lock or refresh it if the requester already holds it.
    pub async fn acquire(
        &self,
        resource_id: &str,
        requester: &Requester,
        expected_version: Option<i64>,
    ) -> Result<AcquireOutcome, StoreError> {
        let ttl = self.config.ttl;
        let outcome = self
            .run(resource_id, |current, now| {
                match current.filter(|l| l.is_held_at(now)) {
                    None => {
                        let version = current.map_or(0, |l| l.version) + 1;
                        let lock = ResourceLock::new(
                            resource_id,
                            requester.user_id.clone(),
                            requester.info.clone(),
                            version,
                            now,
                            ttl,
                        );
                        let history = LockEvent::new(
                            LockAction::Acquired,
                            resource_id,
                            requester.user_id.clone(),
                            &requester.info,
                            now,
                        )
                        .with_related_lock(lock.lock_id)
                        .with_metadata(json!({ "version": version }));
                        Decision::commit(
                            AcquireOutcome::Locked {
                                lock: lock.clone(),
                                refreshed: false,
                            },
                            Commit {
                                message: ServerMessage::LockAcquired {
                                    resource_id: resource_id.to_string(),
                                    lock: lock.clone(),
                                },
                                record: lock,
                                history: vec![history],
                            },
                        )
                    }
                    // A refresh continues the same lease, so it is announced
                    // but not written to history.
                    Some(held) if held.is_held_by(&requester.user_id) => {
                        let mut lock = held.refreshed(now, ttl);
                        lock.holder_info = requester.info.clone();
                        Decision::commit(
                            AcquireOutcome::Locked {
                                lock: lock.clone(),
                                refreshed: true,
                            },
                            Commit {
                                message: ServerMessage::LockUpdated {
                                    resource_id: resource_id.to_string(),
                                    lock: lock.clone(),
                                },
                                record: lock,
                                history: Vec::new(),
                            },
                        )
                    }
                    Some(held) => match expected_version {
                        Some(expected) if expected != held.version => {
                            Decision::unchanged(AcquireOutcome::VersionConflict {
                                current: held.clone(),
                                expected_version: expected,
                            })
                        }
                        _ => Decision::unchanged(AcquireOutcome::HolderConflict {
                            current: held.clone(),
                        }),
                    },
                }
            })
            .await?;

        match &outcome {
            AcquireOutcome::Locked { lock, refreshed } => tracing::info!(
                resource_id,
                user_id = %requester.user_id,
                version = lock.version,
                refreshed,
                "Lock acquired"
            ),
            AcquireOutcome::HolderConflict { current } => tracing::debug!(
                resource_id,
                user_id = %requester.user_id,
                holder_id = %current.holder_id,
                "Lock acquire denied: held by another user"
            ),
            AcquireOutcome::VersionConflict {
                current,
                expected_version,
            } => tracing::debug!(
                resource_id,
                user_id = %requester.user_id,
                current_version = current.version,
                expected_version,
                "Lock acquire denied: stale version"
            ),
        }
        Ok(outcome)
    }

    /// Release a lease held by `requester_id` at `expected_version`.
    pub async fn release(
        &self,
        resource_id: &str,
        requester_id: &str,
        expected_version: i64,
    ) -> Result<ReleaseOutcome, StoreError> {
        let outcome = self
            .run(resource_id, |current, now| {
                match current.filter(|l| l.is_held_at(now)) {
                    Some(held) if held.is_held_by(requester_id) => {
                        if held.version != expected_version {
                            return Decision::unchanged(ReleaseOutcome::VersionMismatch {
                                current: held.clone(),
                                expected_version,
                            });
                        }
                        let ended = held.ended(now);
                        let history = end_event(LockAction::Released, held, now)
                            .with_released_by(requester_id);
                        Decision::commit(
                            ReleaseOutcome::Released {
                                lock: ended.clone(),
                            },
                            Commit {
                                message: ServerMessage::LockReleased {
                                    resource_id: resource_id.to_string(),
                                    lock_id: held.lock_id,
                                    version: held.version,
                                    previous_holder: held.holder_id.clone(),
                                    released_by: requester_id.to_string(),
                                    forced: false,
                                },
                                record: ended,
                                history: vec![history],
                            },
                        )
                    }
                    other => Decision::unchanged(ReleaseOutcome::NotHolder {
                        current: other.cloned(),
                    }),
                }
            })
            .await?;

        if matches!(outcome, ReleaseOutcome::Released { .. }) {
            tracing::info!(resource_id, user_id = requester_id, "Lock released");
        }
        Ok(outcome)
    }

    /// Extend the lease of the current holder. The version is left alone so
    /// that other clients' cached versions stay valid.
    pub async fn heartbeat(
        &self,
        resource_id: &str,
        requester_id: &str,
    ) -> Result<HeartbeatOutcome, StoreError> {
        let ttl = self.config.ttl;
        let outcome = self
            .run(resource_id, |current, now| {
                match current.filter(|l| l.is_held_at(now)) {
                    Some(held) if held.is_held_by(requester_id) => {
                        let lock = held.extended(now, ttl);
                        Decision::commit(
                            HeartbeatOutcome::Refreshed { lock: lock.clone() },
                            Commit {
                                message: ServerMessage::LockUpdated {
                                    resource_id: resource_id.to_string(),
                                    lock: lock.clone(),
                                },
                                record: lock,
                                history: Vec::new(),
                            },
                        )
                    }
                    other => Decision::unchanged(HeartbeatOutcome::NotHolder {
                        current: other.cloned(),
                    }),
                }
            })
            .await?;

        if let HeartbeatOutcome::Refreshed { lock } = &outcome {
            tracing::debug!(
                resource_id,
                user_id = requester_id,
                expires_at = %lock.expires_at,
                "Lock heartbeat"
            );
        }
        Ok(outcome)
    }

    /// Clear any valid lease regardless of who holds it.
    pub async fn force_release(
        &self,
        resource_id: &str,
        admin_id: &str,
    ) -> Result<ForceReleaseOutcome, StoreError> {
        let outcome = self
            .run(resource_id, |current, now| {
                let Some(held) = current.filter(|l| l.is_held_at(now)) else {
                    return Decision::unchanged(ForceReleaseOutcome::NotFound);
                };
                let history = end_event(LockAction::ForceReleased, held, now)
                    .with_released_by(admin_id);
                Decision::commit(
                    ForceReleaseOutcome::Released {
                        previous: held.clone(),
                    },
                    Commit {
                        message: ServerMessage::LockReleased {
                            resource_id: resource_id.to_string(),
                            lock_id: held.lock_id,
                            version: held.version,
                            previous_holder: held.holder_id.clone(),
                            released_by: admin_id.to_string(),
                            forced: true,
                        },
                        record: held.ended(now),
                        history: vec![history],
                    },
                )
            })
            .await?;

        if let ForceReleaseOutcome::Released { previous } = &outcome {
            tracing::warn!(
                resource_id,
                admin_id,
                previous_holder = %previous.holder_id,
                "Lock force-released"
            );
        }
        Ok(outcome)
    }

    /// Force-release and re-acquire for `admin` in one swap, so the resource
    /// is never observably unlocked in between.
    pub async fn admin_takeover(
        &self,
        resource_id: &str,
        admin: &Requester,
    ) -> Result<TakeoverOutcome, StoreError> {
        let ttl = self.config.ttl;
        let outcome = self
            .run(resource_id, |current, now| {
                let previous = current.filter(|l| l.is_held_at(now));
                let version = current.map_or(0, |l| l.version) + 1;
                let lock = ResourceLock::new(
                    resource_id,
                    admin.user_id.clone(),
                    admin.info.clone(),
                    version,
                    now,
                    ttl,
                );

                let mut history = Vec::with_capacity(2);
                if let Some(held) = previous {
                    history.push(
                        end_event(LockAction::ForceReleased, held, now)
                            .with_released_by(admin.user_id.clone())
                            .with_metadata(json!({
                                "version": held.version,
                                "reason": "admin_takeover",
                            })),
                    );
                }
                history.push(
                    LockEvent::new(
                        LockAction::Acquired,
                        resource_id,
                        admin.user_id.clone(),
                        &admin.info,
                        now,
                    )
                    .with_related_lock(lock.lock_id)
                    .with_metadata(json!({
                        "version": version,
                        "takeover": true,
                        "previous_holder": previous.map(|p| p.holder_id.clone()),
                    })),
                );

                Decision::commit(
                    TakeoverOutcome {
                        lock: lock.clone(),
                        previous: previous.cloned(),
                    },
                    Commit {
                        message: ServerMessage::AdminTakeover {
                            resource_id: resource_id.to_string(),
                            lock: lock.clone(),
                            previous_holder: previous.map(|p| p.holder_id.clone()),
                        },
                        record: lock,
                        history,
                    },
                )
            })
            .await?;

        tracing::warn!(
            resource_id,
            admin_id = %admin.user_id,
            previous_holder = ?outcome.previous.as_ref().map(|p| &p.holder_id),
            version = outcome.lock.version,
            "Lock taken over by admin"
        );
        Ok(outcome)
    }

    /// Expire the lease of `resource_id` if it has elapsed. Returns whether
    /// this call performed the expiry.
    pub async fn expire_if_elapsed(&self, resource_id: &str) -> Result<bool, StoreError> {
        let mut history = Vec::new();
        let result = self
            .run_in_section(resource_id, |_, _| Decision::unchanged(()), &mut history)
            .await;
        let expired = history.iter().any(|e| e.action == LockAction::Expired);
        self.record(history).await;
        result.map(|()| expired)
    }

    /// Sweep every elapsed lease. Returns the number of leases expired by
    /// this sweep. A store failure on one resource is logged and the sweep
    /// moves on to the next.
    pub async fn expire_elapsed(&self) -> Result<usize, StoreError> {
        let elapsed = self.store.list_elapsed(Utc::now()).await?;
        let mut expired = 0;
        for lock in elapsed {
            match self.expire_if_elapsed(&lock.resource_id).await {
                Ok(true) => expired += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(
                    resource_id = %lock.resource_id,
                    error = %e,
                    "Failed to expire lock, will retry next sweep"
                ),
            }
        }
        let pruned = self.sections.prune().await;
        if expired > 0 || pruned > 0 {
            tracing::debug!(expired, pruned, "Lock expiry sweep finished");
        }
        Ok(expired)
    }

    // -----------------------------------------------------------------------
    // Critical section
    // -----------------------------------------------------------------------

    /// Run `decide` for `resource_id` inside its section, then write the
    /// collected history once the section is released.
    async fn run<T, F>(&self, resource_id: &str, decide: F) -> Result<T, StoreError>
    where
        F: Fn(Option<&ResourceLock>, Timestamp) -> Decision<T>,
    {
        let mut history = Vec::new();
        let result = self.run_in_section(resource_id, decide, &mut history).await;
        // Expiries committed before a store failure still get recorded.
        self.record(history).await;
        result
    }

    /// The section body. Every committed transition appends its history rows
    /// to `history`.
    async fn run_in_section<T, F>(
        &self,
        resource_id: &str,
        decide: F,
        history: &mut Vec<LockEvent>,
    ) -> Result<T, StoreError>
    where
        F: Fn(Option<&ResourceLock>, Timestamp) -> Decision<T>,
    {
        let _section = self.sections.enter(resource_id).await;

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let now = Utc::now();
            let mut current = self.store.get(resource_id).await?;

            if let Some(stale) = current.as_ref().filter(|l| l.is_elapsed_at(now)) {
                let ended = stale.ended(now);
                if !self
                    .store
                    .compare_and_swap(resource_id, Some(stale), &ended)
                    .await?
                {
                    tracing::debug!(resource_id, attempt, "Expiry swap lost, retrying");
                    continue;
                }
                tracing::info!(
                    resource_id,
                    holder_id = %stale.holder_id,
                    version = stale.version,
                    "Lock expired"
                );
                history.push(end_event(LockAction::Expired, stale, now));
                self.publish(
                    resource_id,
                    ServerMessage::LockExpired {
                        resource_id: resource_id.to_string(),
                        lock_id: stale.lock_id,
                        version: stale.version,
                        previous_holder: stale.holder_id.clone(),
                    },
                );
                current = Some(ended);
            }

            let Decision { outcome, commit } = decide(current.as_ref(), now);
            let Some(commit) = commit else {
                return Ok(outcome);
            };

            if self
                .store
                .compare_and_swap(resource_id, current.as_ref(), &commit.record)
                .await?
            {
                self.publish(resource_id, commit.message);
                history.extend(commit.history);
                return Ok(outcome);
            }
            tracing::debug!(resource_id, attempt, "Lock swap lost, retrying");
        }

        tracing::error!(
            resource_id,
            attempts = MAX_CAS_ATTEMPTS,
            "Lock record kept changing underneath the manager"
        );
        Err(StoreError::Unavailable(format!(
            "lock record for '{resource_id}' changed concurrently {MAX_CAS_ATTEMPTS} times"
        )))
    }

    fn publish(&self, resource_id: &str, message: ServerMessage) {
        self.bus.publish(RoomEvent::new(resource_id, message));
    }

    async fn record(&self, history: Vec<LockEvent>) {
        for event in history {
            self.recorder.record(event).await;
        }
    }
}

/// History row for the end of `lock`'s lease.
///
/// The actor is the holder whose lease ended; who ended it goes in
/// `released_by`.
fn end_event(action: LockAction, lock: &ResourceLock, now: Timestamp) -> LockEvent {
    LockEvent::new(
        action,
        lock.resource_id.clone(),
        lock.holder_id.clone(),
        &lock.holder_info,
        now,
    )
    .with_duration(lock.held_seconds(now))
    .with_related_lock(lock.lock_id)
    .with_metadata(json!({ "version": lock.version }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(version: Option<i64>) -> LockStatus {
        let now = Utc::now();
        let lock = version.map(|v| {
            ResourceLock::new("A1", "u1", HolderInfo::default(), v, now, Duration::seconds(300))
        });
        LockStatus {
            remaining_seconds: lock.as_ref().map(|l| l.remaining_seconds(now)),
            lock,
        }
    }

    #[test]
    fn unlocked_resource_reports_version_zero() {
        let free = status(None);
        assert_eq!(free.current_version(), 0);
        assert!(!free.is_stale(0));
        assert!(free.is_stale(1));
    }

    #[test]
    fn held_resource_compares_against_lease_version() {
        let held = status(Some(3));
        assert_eq!(held.current_version(), 3);
        assert!(!held.is_stale(3));
        assert!(held.is_stale(0));
    }
}
