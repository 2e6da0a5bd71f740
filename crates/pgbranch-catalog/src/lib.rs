//! Catalog snapshot types for pgbranch.
//!
//! A [`Catalog`] is a point-in-time collection of catalog objects extracted
//! from one database. Every object is keyed by its [`Identity`], which is how
//! "the same" object is matched across two snapshots (`main` and `branch`).
//!
//! Snapshot values are plain data: they carry no behavior beyond accessors and
//! structural equality. Consistency checks run when a [`Catalog`] is built, so
//! a catalog that exists is one whose objects were all validated. Fields are
//! public, so a snapshot built by hand skips those checks until something
//! calls [`CatalogObject::validate`] on it; rendering a change does.

mod catalog;
mod error;
mod identity;
mod objects;
mod options;

pub use catalog::{Catalog, CatalogBuilder, ObjectMap};
pub use error::ValidationError;
pub use identity::{CatalogObject, Identity, ObjectKind, ObjectRef};
pub use objects::*;
pub use options::{OptionChange, filter_env_dependent, option_changes, parse_options};
