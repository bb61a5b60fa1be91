//! Core runtime primitives shared by the kcommon crates
//!
//! This crate provides the building blocks every registry relies on:
//! - the [`ErrorInfo`]/[`Result`] error primitive and common error codes
//! - [`SourceLocation`] call-site capture
//! - the one-way [`FreezeGuard`]
//! - the tamper-evident registry [`AuditLog`]

pub mod audit;
pub mod error;
pub mod freeze;
pub mod source_location;

pub use audit::{
    verify_events, AuditIntegrityError, AuditLog, AuditOutcome, RegistryAction, RegistryEvent,
};
pub use error::{codes, make_error, ErrorInfo, Result, VoidResult};
pub use freeze::FreezeGuard;
pub use source_location::SourceLocation;
