use crate::{Identity, ObjectKind};
use thiserror::Error;

/// A snapshot is inconsistent, or lacks a field a requested DDL shape needs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{kind} {identity}: {reason}")]
    Invalid {
        kind: ObjectKind,
        identity: Identity,
        reason: String,
    },

    #[error("{kind} {identity} appears more than once in the snapshot")]
    DuplicateIdentity { kind: ObjectKind, identity: Identity },

    #[error("{kind} {identity} references {missing}, which is not in the snapshot")]
    MissingReference {
        kind: ObjectKind,
        identity: Identity,
        missing: Identity,
    },
}

impl ValidationError {
    pub fn invalid(kind: ObjectKind, identity: Identity, reason: impl Into<String>) -> Self {
        ValidationError::Invalid {
            kind,
            identity,
            reason: reason.into(),
        }
    }
}
