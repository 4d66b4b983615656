//! Pass errors and outcomes.

use thiserror::Error;

use crate::driver::PassReport;
use crate::store::{ObjectKey, StoreError};

/// Errors that abort a reconciliation pass.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconcileError {
    /// A record-store call failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A composite record references a parent that does not exist (yet).
    #[error("parent {kind} {key} not found")]
    ParentNotFound { kind: String, key: ObjectKey },

    /// The record itself cannot be reconciled until it is corrected.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// A rollout was requested for a workload that is not there.
    #[error("workload {0} missing during rollout")]
    MissingWorkload(ObjectKey),

    /// A payload could not be rendered.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Whether a failed pass is worth re-running on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Transient; re-run the whole pass after a backoff.
    Retry,

    /// Terminal until the record changes.
    Fatal,
}

impl ReconcileError {
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::Store(err) => match err {
                StoreError::Invalid(_) | StoreError::Serialization(_) => Disposition::Fatal,
                StoreError::NotFound { .. }
                | StoreError::Conflict { .. }
                | StoreError::PermissionDenied(_)
                | StoreError::Unavailable(_) => Disposition::Retry,
            },
            Self::ParentNotFound { .. } | Self::MissingWorkload(_) => Disposition::Retry,
            Self::MalformedRecord(_) | Self::Serialization(_) => Disposition::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.disposition() == Disposition::Retry
    }
}

/// Result of one invocation of the reconcile entry point.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The pass ran to completion.
    Done(PassReport),

    /// The record no longer exists; cleanup is left to cascade deletion.
    Absent,

    /// The pass was aborted by a transient error.
    Retry(ReconcileError),

    /// The pass was aborted by an error that will not clear on its own.
    Fatal(ReconcileError),
}

impl Outcome {
    /// Classify the result of a pass.
    pub fn from_pass(result: Result<PassReport, ReconcileError>) -> Self {
        match result {
            Ok(report) => Self::Done(report),
            Err(err) => match err.disposition() {
                Disposition::Retry => Self::Retry(err),
                Disposition::Fatal => Self::Fatal(err),
            },
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    pub fn report(&self) -> Option<&PassReport> {
        match self {
            Self::Done(report) => Some(report),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ReconcileError> {
        match self {
            Self::Retry(err) | Self::Fatal(err) => Some(err),
            Self::Done(_) | Self::Absent => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn key() -> ObjectKey {
        ObjectKey::new("matrix", "hs")
    }

    #[rstest]
    #[case::conflict(
        ReconcileError::Store(StoreError::Conflict { kind: "Deployment".into(), key: key(), message: "stale".into() }),
        Disposition::Retry
    )]
    #[case::unavailable(ReconcileError::Store(StoreError::Unavailable("timeout".into())), Disposition::Retry)]
    #[case::forbidden(ReconcileError::Store(StoreError::PermissionDenied("rbac".into())), Disposition::Retry)]
    #[case::invalid(ReconcileError::Store(StoreError::Invalid("bad port".into())), Disposition::Fatal)]
    #[case::parent(ReconcileError::ParentNotFound { kind: "Synapse".into(), key: key() }, Disposition::Retry)]
    #[case::missing_workload(ReconcileError::MissingWorkload(key()), Disposition::Retry)]
    #[case::malformed(ReconcileError::MalformedRecord("empty parent".into()), Disposition::Fatal)]
    #[case::serialization(ReconcileError::Serialization("yaml".into()), Disposition::Fatal)]
    fn test_disposition(#[case] err: ReconcileError, #[case] expected: Disposition) {
        assert_eq!(err.disposition(), expected);
    }

    #[test]
    fn test_outcome_from_pass() {
        let done = Outcome::from_pass(Ok(PassReport::default()));
        assert!(done.is_done());
        assert!(done.error().is_none());

        let retry = Outcome::from_pass(Err(ReconcileError::MissingWorkload(key())));
        assert!(matches!(retry, Outcome::Retry(_)));

        let fatal = Outcome::from_pass(Err(ReconcileError::MalformedRecord("x".into())));
        assert!(matches!(fatal, Outcome::Fatal(_)));
        assert!(fatal.report().is_none());
    }

    #[test]
    fn test_store_error_display_passes_through() {
        let err: ReconcileError = StoreError::Unavailable("connection reset".into()).into();
        assert_eq!(err.to_string(), "store unavailable: connection reset");
    }
}
