//! The audit trail: every file action the reconciler performs is recorded,
//! in order, to an append-only log file and mirrored to the console.

mod audit_log;
mod record;

pub use audit_log::{AuditError, AuditLog};
pub use record::{ActionKind, ActionRecord, EntityKind};
