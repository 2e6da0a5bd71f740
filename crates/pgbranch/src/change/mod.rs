//! Change variants, one closed enum per object kind.
//!
//! Every variant wraps the snapshot(s) it was computed from: a `Create` wraps
//! the branch object, a `Drop` wraps the main object, and alterations and
//! replacements wrap both. Rendering depends on nothing else, so
//! [`ObjectChange::to_sql`] is pure.
//!
//! Display follows the usual diff notation:
//!
//! ```text
//! + table public.post
//! - constraint post_author_fkey on public.post
//! ~ schema app: owner alice -> bob
//! ```

mod composite_type;
mod constraint;
mod domain;
mod index;
mod policy;
mod schema;
mod sequence;
mod server;
mod table;

pub use composite_type::{CompositeTypeChange, TypeAlteration};
pub use constraint::ConstraintChange;
pub use domain::{DomainAlteration, DomainChange};
pub use index::IndexChange;
pub use policy::RlsPolicyChange;
pub use schema::SchemaChange;
pub use sequence::{SequenceAlteration, SequenceChange, SequenceDefaults};
pub use server::{ServerAlteration, ServerChange, UserMappingChange};
pub use table::{TableAlteration, TableChange};

use pgbranch_catalog::{
    CatalogObject, Identity, ObjectKind, ObjectRef, OptionChange, ValidationError,
};
use std::fmt;

/// What a change does to its object.
///
/// The declaration order is the tie-break order for changes to the same object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    Drop,
    Alter,
    Replace,
    Create,
}

impl Action {
    /// True for changes that bring an object into existence (the create half
    /// of a replace counts).
    pub fn creates(&self) -> bool {
        matches!(self, Action::Create | Action::Replace)
    }

    /// True for changes that remove an object (the drop half of a replace counts).
    pub fn drops(&self) -> bool {
        matches!(self, Action::Drop | Action::Replace)
    }
}

/// Shared capability of every per-kind change enum.
pub trait ObjectChange: fmt::Display {
    type Object: CatalogObject;

    fn action(&self) -> Action;

    /// The object as it exists in main, if it does.
    fn before(&self) -> Option<&Self::Object>;

    /// The object as it should exist in the branch, if it should.
    fn after(&self) -> Option<&Self::Object>;

    /// The snapshot that names this change: `after` unless the object is dropped.
    fn subject(&self) -> &Self::Object;

    /// Render executable DDL, without a trailing semicolon.
    fn to_sql(&self) -> Result<String, ValidationError>;
}

/// A single catalog change.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Schema(SchemaChange),
    Sequence(SequenceChange),
    Domain(DomainChange),
    CompositeType(CompositeTypeChange),
    Table(TableChange),
    Constraint(ConstraintChange),
    Index(IndexChange),
    RlsPolicy(RlsPolicyChange),
    Server(ServerChange),
    UserMapping(UserMappingChange),
}

macro_rules! each_kind {
    ($self:expr, $c:ident => $body:expr) => {
        match $self {
            Change::Schema($c) => $body,
            Change::Sequence($c) => $body,
            Change::Domain($c) => $body,
            Change::CompositeType($c) => $body,
            Change::Table($c) => $body,
            Change::Constraint($c) => $body,
            Change::Index($c) => $body,
            Change::RlsPolicy($c) => $body,
            Change::Server($c) => $body,
            Change::UserMapping($c) => $body,
        }
    };
}

impl Change {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Change::Schema(_) => ObjectKind::Schema,
            Change::Sequence(_) => ObjectKind::Sequence,
            Change::Domain(_) => ObjectKind::Domain,
            Change::CompositeType(_) => ObjectKind::CompositeType,
            Change::Table(_) => ObjectKind::Table,
            Change::Constraint(_) => ObjectKind::Constraint,
            Change::Index(_) => ObjectKind::Index,
            Change::RlsPolicy(_) => ObjectKind::RlsPolicy,
            Change::Server(_) => ObjectKind::ForeignServer,
            Change::UserMapping(_) => ObjectKind::UserMapping,
        }
    }

    pub fn action(&self) -> Action {
        each_kind!(self, c => c.action())
    }

    pub fn identity(&self) -> Identity {
        each_kind!(self, c => c.subject().identity())
    }

    pub fn object_ref(&self) -> ObjectRef {
        each_kind!(self, c => c.subject().object_ref())
    }

    /// The object the changed object lives in.
    pub fn container(&self) -> Option<ObjectRef> {
        each_kind!(self, c => c.subject().container())
    }

    /// Render executable DDL for this change, without a trailing semicolon.
    ///
    /// The wrapped snapshots are validated first: a change can be built by
    /// hand, not only from a catalog that went through the builder.
    pub fn to_sql(&self) -> Result<String, ValidationError> {
        each_kind!(self, c => {
            for snapshot in c.before().into_iter().chain(c.after()) {
                snapshot.validate()?;
            }
            c.to_sql()
        })
    }

    /// The drop and create a replace is made of; `None` for other changes.
    pub fn replace_halves(&self) -> Option<(Change, Change)> {
        macro_rules! halves {
            ($variant:ident, $change:ident, $from:expr, $to:expr) => {
                Some((
                    Change::$variant($change::Drop($from.clone())),
                    Change::$variant($change::Create($to.clone())),
                ))
            };
        }
        match self {
            Change::Schema(SchemaChange::Replace { from, to }) => {
                halves!(Schema, SchemaChange, from, to)
            }
            Change::Domain(DomainChange::Replace { from, to }) => {
                halves!(Domain, DomainChange, from, to)
            }
            Change::CompositeType(CompositeTypeChange::Replace { from, to }) => {
                halves!(CompositeType, CompositeTypeChange, from, to)
            }
            Change::Constraint(ConstraintChange::Replace { from, to }) => {
                halves!(Constraint, ConstraintChange, from, to)
            }
            Change::Index(IndexChange::Replace { from, to }) => {
                halves!(Index, IndexChange, from, to)
            }
            Change::RlsPolicy(RlsPolicyChange::Replace { from, to }) => {
                halves!(RlsPolicy, RlsPolicyChange, from, to)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        each_kind!(self, c => fmt::Display::fmt(c, f))
    }
}

/// Shared Display for the four basic shapes.
pub(crate) fn describe(
    f: &mut fmt::Formatter<'_>,
    action: Action,
    object: &impl CatalogObject,
    detail: Option<&dyn fmt::Display>,
) -> fmt::Result {
    let kind = object.object_ref().kind;
    let identity = object.identity();
    match (action, detail) {
        (Action::Create, _) => write!(f, "+ {} {}", kind, identity),
        (Action::Drop, _) => write!(f, "- {} {}", kind, identity),
        (Action::Replace, _) => write!(f, "~ {} {}: replace", kind, identity),
        (Action::Alter, Some(detail)) => write!(f, "~ {} {}: {}", kind, identity, detail),
        (Action::Alter, None) => write!(f, "~ {} {}", kind, identity),
    }
}

/// `DROP x;\nCREATE x`, the two statements of a replace.
pub(crate) fn replace_sql(drop: String, create: String) -> String {
    format!("{};\n{}", drop, create)
}

/// `OPTIONS (k 'v', ...)` for creates; empty when there are no options.
pub(crate) fn create_options<'a>(
    options: impl IntoIterator<Item = (&'a String, &'a String)>,
) -> String {
    let rendered: Vec<String> = options
        .into_iter()
        .map(|(key, value)| format!("{} {}", crate::Ident(key), crate::Lit(value)))
        .collect();
    if rendered.is_empty() {
        String::new()
    } else {
        format!(" OPTIONS ({})", rendered.join(", "))
    }
}

/// `OPTIONS (ADD k 'v', DROP k)` for alters. `Set` entries never reach here;
/// they are removed by the environment filter first, and rendered as `SET`
/// should a caller pass one anyway.
pub(crate) fn alter_options(changes: &[OptionChange]) -> String {
    let rendered: Vec<String> = changes
        .iter()
        .map(|change| match change {
            OptionChange::Add { key, value } => {
                format!("ADD {} {}", crate::Ident(key), crate::Lit(value))
            }
            OptionChange::Set { key, value } => {
                format!("SET {} {}", crate::Ident(key), crate::Lit(value))
            }
            OptionChange::Drop { key, .. } => format!("DROP {}", crate::Ident(key)),
        })
        .collect();
    format!("OPTIONS ({})", rendered.join(", "))
}

/// Short human form of an option-change list, for Display.
pub(crate) fn option_summary(changes: &[OptionChange]) -> String {
    changes
        .iter()
        .map(|change| match change {
            OptionChange::Add { key, .. } => format!("+{}", key),
            OptionChange::Set { key, .. } => format!("~{}", key),
            OptionChange::Drop { key, .. } => format!("-{}", key),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
pub(crate) mod fixtures;
