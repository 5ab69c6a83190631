//! Fleet-wide tracking of a dispatched action.
//!
//! `ExtendedAction` is the serializable envelope. `ActionTracker` owns one
//! behind a mutex so result reports arriving from many agents update the
//! counters atomically and readers always see a consistent snapshot.
//!
//! Transitions: `Pending → Inflight → Done`. `Done` is entered once, either
//! when every sent command has resolved or when the action's validity window
//! closes; outstanding commands are then counted as timed out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use crate::action::{unset_time, Action};
use crate::error::TrackerError;

// ---------------------------------------------------------------------------
// TrackingStatus
// ---------------------------------------------------------------------------

/// Lifecycle state, serialized as `"pending"`, `"inflight"` or `"done"`.
///
/// The set is closed: an envelope carrying any other status string fails to
/// decode rather than being tracked under a guessed state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingStatus {
    #[default]
    Pending,
    Inflight,
    Done,
}

impl TrackingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TrackingStatus::Pending => "pending",
            TrackingStatus::Inflight => "inflight",
            TrackingStatus::Done => "done",
        }
    }
}

impl std::fmt::Display for TrackingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub sent: u64,
    pub completed: u64,
    pub succeeded: u64,
    pub cancelled: u64,
    pub failed: u64,
    #[serde(rename = "timeout")]
    pub timed_out: u64,
}

impl Counters {
    /// `completed` equals the sum of the outcome counters and never exceeds `sent`.
    pub fn is_consistent(&self) -> bool {
        self.completed == self.succeeded + self.cancelled + self.failed + self.timed_out
            && self.sent >= self.completed
    }

    pub fn outstanding(&self) -> u64 {
        self.sent.saturating_sub(self.completed)
    }
}

/// Final state of one command sent to an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandOutcome {
    Succeeded,
    Cancelled,
    Failed,
    TimedOut,
}

// ---------------------------------------------------------------------------
// ExtendedAction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedAction {
    pub action: Action,
    #[serde(default)]
    pub status: TrackingStatus,
    #[serde(rename = "starttime", default = "unset_time")]
    pub start_time: DateTime<Utc>,
    #[serde(rename = "finishtime", default = "unset_time")]
    pub finish_time: DateTime<Utc>,
    #[serde(rename = "lastupdatetime", default = "unset_time")]
    pub last_update_time: DateTime<Utc>,
    #[serde(rename = "commandids", default)]
    pub command_ids: Vec<u64>,
    #[serde(default)]
    pub counters: Counters,
}

impl ExtendedAction {
    pub fn new(action: Action) -> Self {
        let now = Utc::now();
        Self {
            action,
            status: TrackingStatus::Pending,
            start_time: now,
            finish_time: unset_time(),
            last_update_time: now,
            command_ids: Vec::new(),
            counters: Counters::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// ActionTracker
// ---------------------------------------------------------------------------

struct Tracked {
    envelope: ExtendedAction,
    resolved: HashSet<u64>,
}

impl Tracked {
    fn ensure_open(&self) -> Result<(), TrackerError> {
        if self.envelope.status == TrackingStatus::Done {
            return Err(TrackerError::Finalized(self.envelope.action.id));
        }
        Ok(())
    }

    fn finalize(&mut self, now: DateTime<Utc>) {
        self.envelope.status = TrackingStatus::Done;
        self.envelope.finish_time = now;
        let c = &self.envelope.counters;
        info!(
            action_id = self.envelope.action.id,
            sent = c.sent,
            succeeded = c.succeeded,
            failed = c.failed,
            cancelled = c.cancelled,
            timed_out = c.timed_out,
            "action finalized"
        );
    }
}

/// Single mutual-exclusion domain around one `ExtendedAction`.
pub struct ActionTracker {
    inner: Mutex<Tracked>,
}

impl ActionTracker {
    pub fn new(action: Action) -> Self {
        Self::from_envelope(ExtendedAction::new(action))
    }

    /// Resume tracking a previously serialized envelope. Commands already
    /// counted as completed cannot be matched to IDs, so a first report for
    /// any known command is accepted until the counters are full. A second
    /// report for the same command is still rejected.
    pub fn from_envelope(envelope: ExtendedAction) -> Self {
        Self {
            inner: Mutex::new(Tracked {
                envelope,
                resolved: HashSet::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tracked> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a command sent to one agent.
    pub fn dispatch(&self, command_id: u64) -> Result<(), TrackerError> {
        let mut t = self.lock();
        t.ensure_open()?;
        if t.envelope.command_ids.contains(&command_id) {
            return Err(TrackerError::DuplicateCommand(command_id));
        }
        t.envelope.command_ids.push(command_id);
        t.envelope.counters.sent += 1;
        t.envelope.status = TrackingStatus::Inflight;
        t.envelope.last_update_time = Utc::now();
        debug!(
            action_id = t.envelope.action.id,
            command_id,
            sent = t.envelope.counters.sent,
            "command dispatched"
        );
        Ok(())
    }

    /// Apply one agent's result. Returns the status after the update.
    pub fn record(
        &self,
        command_id: u64,
        outcome: CommandOutcome,
    ) -> Result<TrackingStatus, TrackerError> {
        let mut t = self.lock();
        t.ensure_open()?;
        if !t.envelope.command_ids.contains(&command_id) {
            return Err(TrackerError::UnknownCommand(command_id));
        }
        if t.resolved.contains(&command_id) || t.envelope.counters.outstanding() == 0 {
            return Err(TrackerError::AlreadyResolved(command_id));
        }
        t.resolved.insert(command_id);

        let now = Utc::now();
        let counters = &mut t.envelope.counters;
        match outcome {
            CommandOutcome::Succeeded => counters.succeeded += 1,
            CommandOutcome::Cancelled => counters.cancelled += 1,
            CommandOutcome::Failed => counters.failed += 1,
            CommandOutcome::TimedOut => counters.timed_out += 1,
        }
        counters.completed += 1;
        let outstanding = counters.outstanding();
        t.envelope.last_update_time = now;
        debug!(
            action_id = t.envelope.action.id,
            command_id,
            ?outcome,
            outstanding,
            "command resolved"
        );

        if outstanding == 0 {
            t.finalize(now);
        }
        Ok(t.envelope.status)
    }

    /// Close the envelope if `now` is past the action's `expire_after`.
    ///
    /// Outstanding commands are counted as timed out. Returns whether this
    /// call finalized the envelope.
    pub fn expire(&self, now: DateTime<Utc>) -> bool {
        let mut t = self.lock();
        if t.envelope.status == TrackingStatus::Done || now <= t.envelope.action.expire_after {
            return false;
        }
        let counters = &mut t.envelope.counters;
        let outstanding = counters.outstanding();
        counters.timed_out += outstanding;
        counters.completed += outstanding;
        t.envelope.last_update_time = now;
        t.finalize(now);
        true
    }

    pub fn status(&self) -> TrackingStatus {
        self.lock().envelope.status
    }

    pub fn counters(&self) -> Counters {
        self.lock().envelope.counters
    }

    /// Consistent copy of the envelope.
    pub fn snapshot(&self) -> ExtendedAction {
        self.lock().envelope.clone()
    }
}
