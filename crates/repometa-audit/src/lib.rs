//! RepoMeta Audit - Outbound query trail
//!
//! An `AuditLogger` keeps a bounded FIFO of `AuditEntry` records and
//! persists them to an append-only text file, either as each entry is added
//! or in batches when the buffer fills up.

pub mod entry;
pub mod logger;

pub use entry::AuditEntry;
pub use logger::{AuditLogger, AuditPolicy};
