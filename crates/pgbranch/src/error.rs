use pgbranch_catalog::{Identity, ObjectKind, ValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid snapshot: {0}")]
    Validation(#[from] ValidationError),

    #[error("{kind} {identity}: no ALTER or REPLACE strategy for a change to {attribute}")]
    UnsupportedChange {
        kind: ObjectKind,
        identity: Identity,
        attribute: String,
    },

    #[error("postgres error: {0}")]
    Extraction(#[from] tokio_postgres::Error),

    #[error("unexpected {column} value {value:?} while extracting {kind}s")]
    UnexpectedValue {
        kind: ObjectKind,
        column: &'static str,
        value: String,
    },

    #[error("could not check out a connection: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("dependency cycle detected, cannot order: {}", changes.join(" -> "))]
    CycleDetected { changes: Vec<String> },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
