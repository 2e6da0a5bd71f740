//! Diff two Postgres catalog snapshots into an ordered DDL script.
//!
//! The pipeline has three synchronous stages over already-extracted snapshots:
//!
//! 1. [`diff`] compares `main` against `branch` kind by kind and emits
//!    [`Change`]s (create, drop, alter, replace);
//! 2. [`CatalogDiff::order`] sorts them so every statement can run;
//! 3. [`OrderedChanges::to_script`] renders the [`Script`].
//!
//! ```ignore
//! let main = pgbranch::extract_catalog(&main_conn, &options).await?;
//! let branch = pgbranch::extract_catalog(&branch_conn, &options).await?;
//! let script = pgbranch::generate_script(&main, &branch)?;
//! print!("{script}");
//! ```
//!
//! Every stage is all-or-nothing: an error anywhere means no script at all.
//! The script carries no transaction wrapping.
//!
//! # Environment-dependent options
//!
//! Foreign servers and user mappings carry `key=value` options whose values
//! (hosts, credentials) are expected to differ between databases. Only keys
//! appearing or disappearing count as a change.

mod change;
mod diff;
mod error;
mod extract;
mod script;
mod solver;
mod sql;
mod traced;

pub use pgbranch_catalog::*;

pub use change::{
    Action, Change, CompositeTypeChange, ConstraintChange, DomainAlteration, DomainChange,
    IndexChange, ObjectChange, RlsPolicyChange, SchemaChange, SequenceAlteration, SequenceChange,
    SequenceDefaults, ServerAlteration, ServerChange, TableAlteration, TableChange,
    TypeAlteration, UserMappingChange,
};
pub use diff::{CatalogDiff, KindDiff, diff};
pub use error::{Error, Result};
pub use extract::{
    ExtractOptions, extract_catalog, extract_composite_types, extract_constraints,
    extract_domains, extract_from_pool, extract_indexes, extract_rls_policies, extract_schemas,
    extract_sequences, extract_servers, extract_tables, extract_user_mappings,
};
pub use script::Script;
pub use solver::OrderedChanges;
pub use sql::{Ident, Lit, quote_ident};
pub use traced::{Connection, ConnectionExt, TracedConn};

/// Diff, order and render in one go.
pub fn generate_script(main: &Catalog, branch: &Catalog) -> Result<Script> {
    diff(main, branch)?.order()?.to_script()
}
