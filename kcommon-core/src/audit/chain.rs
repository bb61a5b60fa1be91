//! Digest chain over audit records
//!
//! Every record hashes the previous record's digest together with its own
//! fields, so dropping, reordering or editing a record breaks every digest
//! after it.

use super::event::{RegistryAction, RegistryEvent};
use crate::source_location::SourceLocation;
use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub(crate) type ChainDigest = [u8; 32];

pub(crate) const GENESIS: ChainDigest = [0u8; 32];

/// Integrity violation found while verifying an audit stream
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuditIntegrityError {
    #[error("audit sequence gap: expected #{expected}, found #{found}")]
    SequenceGap { expected: u64, found: u64 },

    #[error("audit digest mismatch at #{sequence}")]
    DigestMismatch { sequence: u64 },

    #[error("malformed audit digest at #{sequence}")]
    MalformedDigest { sequence: u64 },
}

pub(crate) struct ChainInput<'a> {
    pub sequence: u64,
    pub action: RegistryAction,
    pub target_name: &'a str,
    pub location: &'a SourceLocation,
    pub timestamp: &'a DateTime<Utc>,
    pub success: bool,
    pub error_message: Option<&'a str>,
}

impl<'a> From<&'a RegistryEvent> for ChainInput<'a> {
    fn from(event: &'a RegistryEvent) -> Self {
        Self {
            sequence: event.sequence,
            action: event.action,
            target_name: &event.target_name,
            location: &event.location,
            timestamp: &event.timestamp,
            success: event.success,
            error_message: event.error_message.as_deref(),
        }
    }
}

pub(crate) fn chain_digest(previous: &ChainDigest, input: &ChainInput<'_>) -> ChainDigest {
    let mut hasher = Sha256::new();
    hasher.update(previous);
    hasher.update(input.sequence.to_le_bytes());
    hasher.update(input.action.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(input.target_name.as_bytes());
    hasher.update([0u8]);
    hasher.update(input.location.file.as_bytes());
    hasher.update([0u8]);
    hasher.update(input.location.line.to_le_bytes());
    hasher.update(input.location.column.to_le_bytes());
    hasher.update(input.location.function.as_bytes());
    hasher.update([0u8]);
    hasher.update(
        input
            .timestamp
            .to_rfc3339_opts(SecondsFormat::Nanos, true)
            .as_bytes(),
    );
    hasher.update([input.success as u8]);
    match input.error_message {
        Some(message) => {
            hasher.update([1u8]);
            hasher.update(message.as_bytes());
        }
        None => hasher.update([0u8]),
    }
    let mut digest = GENESIS;
    digest.copy_from_slice(&hasher.finalize());
    digest
}

/// Verify a complete audit stream, as returned by
/// [`AuditLog::events`](super::AuditLog::events) or parsed back from
/// [`AuditLog::export_json`](super::AuditLog::export_json)
pub fn verify_events(events: &[RegistryEvent]) -> Result<(), AuditIntegrityError> {
    let mut previous = GENESIS;
    for (expected, event) in (0u64..).zip(events) {
        if event.sequence != expected {
            return Err(AuditIntegrityError::SequenceGap {
                expected,
                found: event.sequence,
            });
        }
        let recorded = decode_digest(event)?;
        let computed = chain_digest(&previous, &ChainInput::from(event));
        if recorded != computed {
            return Err(AuditIntegrityError::DigestMismatch {
                sequence: event.sequence,
            });
        }
        previous = computed;
    }
    Ok(())
}

fn decode_digest(event: &RegistryEvent) -> Result<ChainDigest, AuditIntegrityError> {
    let malformed = || AuditIntegrityError::MalformedDigest {
        sequence: event.sequence,
    };
    let bytes = hex::decode(&event.digest).map_err(|_| malformed())?;
    bytes.try_into().map_err(|_| malformed())
}
