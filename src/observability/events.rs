//! Observable events emitted by storr

use std::fmt;

use super::logger::Severity;

/// Observable events.
///
/// Covers store lifecycle, record persistence, and the soft-fail
/// diagnostics produced by type checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// A store root was opened
    StoreOpened,
    /// A repository was created
    RepositoryCreated,
    /// A repository and all of its buckets were deleted
    RepositoryDeleted,
    /// A bucket was created
    BucketCreated,
    /// A bucket and its records were deleted
    BucketDeleted,

    // Records
    /// A record was written to a bucket
    RecordPersisted,

    // Types
    /// A reference type was registered
    TypeRegistered,
    /// A type descriptor did not name a scalar or a registered type
    UnknownTypeDescriptor,
    /// A record did not satisfy a reference type
    StructuralCheckFailed,
    /// A record written to an enforcing bucket did not satisfy its type
    EnforcedTypeViolation,
}

impl Event {
    /// Returns the event name as written in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::StoreOpened => "STORE_OPENED",
            Event::RepositoryCreated => "REPOSITORY_CREATED",
            Event::RepositoryDeleted => "REPOSITORY_DELETED",
            Event::BucketCreated => "BUCKET_CREATED",
            Event::BucketDeleted => "BUCKET_DELETED",
            Event::RecordPersisted => "RECORD_PERSISTED",
            Event::TypeRegistered => "TYPE_REGISTERED",
            Event::UnknownTypeDescriptor => "UNKNOWN_TYPE_DESCRIPTOR",
            Event::StructuralCheckFailed => "STRUCTURAL_CHECK_FAILED",
            Event::EnforcedTypeViolation => "ENFORCED_TYPE_VIOLATION",
        }
    }

    /// Returns the severity this event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::RecordPersisted => Severity::Trace,
            Event::StructuralCheckFailed | Event::EnforcedTypeViolation => Severity::Warn,
            Event::UnknownTypeDescriptor => Severity::Error,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
