#![forbid(unsafe_code)]

//! In-memory progress store polled by clients.
//!
//! The tracker is owned by the service instance and handed to whoever needs
//! it; nothing here is process-global. Each write replaces a whole record, so
//! readers see either the previous or the next state, never a mix.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Preparing,
    Downloading,
    Finished,
    Error,
    Cancelled,
    Unknown,
}

impl ProgressStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Error | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Preparing => "preparing",
            Self::Downloading => "downloading",
            Self::Finished => "finished",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }
}

/// Snapshot returned to polling clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressState {
    pub percent: String,
    pub speed: String,
    pub eta: String,
    pub downloaded: String,
    pub total: String,
    pub status: ProgressStatus,
}

impl ProgressState {
    pub fn unknown() -> Self {
        Self::filled("0%", "N/A", "N/A", "N/A", ProgressStatus::Unknown)
    }

    pub fn preparing() -> Self {
        Self::filled("0%", "Preparing...", "0", "Unknown", ProgressStatus::Preparing)
    }

    pub fn finished() -> Self {
        Self::filled("100%", "Complete", "Complete", "Complete", ProgressStatus::Finished)
    }

    pub fn failed() -> Self {
        Self::filled("0%", "Failed", "Error", "Error", ProgressStatus::Error)
    }

    fn filled(percent: &str, eta: &str, downloaded: &str, total: &str, status: ProgressStatus) -> Self {
        Self {
            percent: percent.into(),
            speed: "N/A".into(),
            eta: eta.into(),
            downloaded: downloaded.into(),
            total: total.into(),
            status,
        }
    }
}

/// Events reported by the extractor while a transfer runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Downloading {
        percent: String,
        speed: String,
        eta: String,
        downloaded: String,
        total: String,
    },
    Finished,
    Error {
        message: String,
    },
}

impl ProgressEvent {
    fn into_state(self) -> ProgressState {
        match self {
            Self::Downloading {
                percent,
                speed,
                eta,
                downloaded,
                total,
            } => ProgressState {
                percent,
                speed,
                eta,
                downloaded,
                total,
                status: ProgressStatus::Downloading,
            },
            Self::Finished => ProgressState::finished(),
            Self::Error { .. } => ProgressState::failed(),
        }
    }
}

/// Receives progress for a specific download identifier.
pub trait ProgressSink: Send + Sync {
    fn on_event(&self, id: &str, event: ProgressEvent);
}

/// Result of a cancellation request against a known identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    AlreadyTerminal(ProgressStatus),
}

struct Entry {
    state: ProgressState,
    updated_at: Instant,
}

pub struct ProgressTracker {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: Option<Duration>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ProgressTracker {
    /// `ttl` of `None` keeps every entry for the lifetime of the tracker.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Returns the current state, or the `unknown` placeholder.
    pub fn get(&self, id: &str) -> ProgressState {
        self.entries
            .read()
            .get(id)
            .map(|entry| entry.state.clone())
            .unwrap_or_else(ProgressState::unknown)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.read().contains_key(id)
    }

    /// Replaces the state for `id` unconditionally.
    pub fn set(&self, id: &str, state: ProgressState) {
        self.entries.write().insert(
            id.to_owned(),
            Entry {
                state,
                updated_at: Instant::now(),
            },
        );
    }

    /// Starts a new lifecycle for `id` in the preparing state.
    ///
    /// Fails when a previous download under the same identifier has not
    /// reached a terminal state yet.
    pub fn begin(&self, id: &str) -> Result<()> {
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get(id)
            && !entry.state.status.is_terminal()
        {
            return Err(Error::Conflict(format!("download {id} already in progress")));
        }
        entries.insert(
            id.to_owned(),
            Entry {
                state: ProgressState::preparing(),
                updated_at: Instant::now(),
            },
        );
        Ok(())
    }

    /// Applies an extractor event. Returns `false` when the entry is missing
    /// or already terminal, in which case nothing changes.
    pub fn apply(&self, id: &str, event: ProgressEvent) -> bool {
        let mut entries = self.entries.write();
        let Some(entry) = entries.get_mut(id) else {
            return false;
        };
        if entry.state.status.is_terminal() {
            debug!(id, status = entry.state.status.as_str(), "ignoring event for finished download");
            return false;
        }
        entry.state = event.into_state();
        entry.updated_at = Instant::now();
        true
    }

    /// Marks a running download as cancelled. Advisory only: the transfer
    /// itself keeps going, later events for it are dropped.
    pub fn cancel(&self, id: &str) -> Result<CancelOutcome> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| Error::not_found("Download not found"))?;
        if entry.state.status.is_terminal() {
            return Ok(CancelOutcome::AlreadyTerminal(entry.state.status));
        }
        entry.state.status = ProgressStatus::Cancelled;
        entry.updated_at = Instant::now();
        Ok(CancelOutcome::Cancelled)
    }

    /// Drops terminal entries whose last update is older than the TTL.
    pub fn evict_expired(&self, now: Instant) -> usize {
        let Some(ttl) = self.ttl else {
            return 0;
        };
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| {
            !entry.state.status.is_terminal() || now.saturating_duration_since(entry.updated_at) < ttl
        });
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn snapshot(&self) -> Vec<(String, ProgressState)> {
        let mut items: Vec<_> = self
            .entries
            .read()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.state.clone()))
            .collect();
        items.sort_by(|a, b| a.0.cmp(&b.0));
        items
    }
}

impl ProgressSink for ProgressTracker {
    fn on_event(&self, id: &str, event: ProgressEvent) {
        self.apply(id, event);
    }
}
