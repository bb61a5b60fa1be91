//! Tamper-evident audit log for registry mutations
//!
//! Every mutation attempt against a service container or logger registry,
//! including the ones rejected because the registry is frozen, appends one
//! [`RegistryEvent`]. The log is append-only, guarded by its own mutex and
//! independent of any registry lock. Reads are never recorded.
//!
//! A process-wide log is available through [`AuditLog::global`]; registries
//! use it unless they are built with an explicit log, which is how tests
//! keep their streams apart.

mod chain;
mod event;

pub use chain::{verify_events, AuditIntegrityError};
pub use event::{AuditOutcome, RegistryAction, RegistryEvent};

use crate::source_location::SourceLocation;
use chain::{chain_digest, ChainDigest, ChainInput, GENESIS};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::warn;

struct AuditState {
    events: Vec<RegistryEvent>,
    head: ChainDigest,
}

/// Append-only, hash-chained record of registry mutations
// TODO: add an optional capacity with oldest-first eviction (chain anchored
// at the first retained digest); the log currently grows without bound.
pub struct AuditLog {
    enabled: AtomicBool,
    state: Mutex<AuditState>,
}

impl AuditLog {
    /// Create an empty, enabled log
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            state: Mutex::new(AuditState {
                events: Vec::new(),
                head: GENESIS,
            }),
        }
    }

    /// The process-wide log shared by default-constructed registries
    pub fn global() -> Arc<AuditLog> {
        static INSTANCE: OnceLock<Arc<AuditLog>> = OnceLock::new();
        Arc::clone(INSTANCE.get_or_init(|| Arc::new(AuditLog::new())))
    }

    /// Append an event. Returns its sequence number, or `None` when
    /// logging is disabled.
    pub fn record(
        &self,
        action: RegistryAction,
        target_name: impl Into<String>,
        location: SourceLocation,
        outcome: AuditOutcome,
    ) -> Option<u64> {
        if !self.is_enabled() {
            return None;
        }

        let target_name = target_name.into();
        let (success, error_message) = match outcome {
            AuditOutcome::Success => (true, None),
            AuditOutcome::Failure(message) => (false, Some(message)),
        };

        let mut state = self.state.lock();
        let sequence = state.events.len() as u64;
        let timestamp = Utc::now();
        let digest = chain_digest(
            &state.head,
            &ChainInput {
                sequence,
                action,
                target_name: &target_name,
                location: &location,
                timestamp: &timestamp,
                success,
                error_message: error_message.as_deref(),
            },
        );
        state.head = digest;
        state.events.push(RegistryEvent {
            sequence,
            action,
            target_name,
            location,
            timestamp,
            success,
            error_message,
            digest: hex::encode(digest),
        });
        Some(sequence)
    }

    /// Snapshot of every recorded event in append order
    pub fn events(&self) -> Vec<RegistryEvent> {
        self.state.lock().events.clone()
    }

    /// Events with the given action, in append order
    pub fn events_by_action(&self, action: RegistryAction) -> Vec<RegistryEvent> {
        self.state
            .lock()
            .events
            .iter()
            .filter(|event| event.action == action)
            .cloned()
            .collect()
    }

    /// Events whose timestamp lies in `[start, end]`
    pub fn events_in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<RegistryEvent> {
        self.state
            .lock()
            .events
            .iter()
            .filter(|event| event.timestamp >= start && event.timestamp <= end)
            .cloned()
            .collect()
    }

    pub fn event_count(&self) -> usize {
        self.state.lock().events.len()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Enable or disable recording. Events already in the log are kept.
    pub fn set_enabled(&self, enabled: bool) {
        let previous = self.enabled.swap(enabled, Ordering::AcqRel);
        if previous && !enabled {
            warn!("registry audit logging disabled");
        }
    }

    /// Drop all history and restart the chain
    pub fn clear(&self) {
        let mut state = self.state.lock();
        if !state.events.is_empty() {
            warn!(discarded = state.events.len(), "registry audit log cleared");
        }
        state.events.clear();
        state.head = GENESIS;
    }

    /// Recompute the digest chain over the stored events
    pub fn verify_chain(&self) -> Result<(), AuditIntegrityError> {
        let state = self.state.lock();
        verify_events(&state.events)
    }

    /// Serialize the stream as a JSON array
    pub fn export_json(&self) -> serde_json::Result<String> {
        let state = self.state.lock();
        serde_json::to_string_pretty(&state.events)
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("enabled", &self.is_enabled())
            .field("events", &self.event_count())
            .finish()
    }
}
