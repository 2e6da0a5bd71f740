use crate::ValidationError;
use std::fmt;

/// The kinds of catalog objects pgbranch tracks.
///
/// The declaration order is the tie-break order used when two changes have no
/// dependency between them, so it doubles as a rough "containers first" order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKind {
    Schema,
    Sequence,
    Domain,
    CompositeType,
    Table,
    Constraint,
    Index,
    RlsPolicy,
    ForeignServer,
    UserMapping,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::Schema => "schema",
            ObjectKind::Sequence => "sequence",
            ObjectKind::Domain => "domain",
            ObjectKind::CompositeType => "composite type",
            ObjectKind::Table => "table",
            ObjectKind::Constraint => "constraint",
            ObjectKind::Index => "index",
            ObjectKind::RlsPolicy => "policy",
            ObjectKind::ForeignServer => "server",
            ObjectKind::UserMapping => "user mapping",
        };
        f.write_str(name)
    }
}

/// The stable key used to match an object across two snapshots.
///
/// Identity is never derived from position in an extraction result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Identity {
    /// Database-global objects: schemas, foreign servers.
    Global { name: String },
    /// Objects living in a schema: sequences, domains, types, tables.
    Namespaced { schema: String, name: String },
    /// Objects owned by a table: constraints, policies, indexes.
    TableOwned {
        table_schema: String,
        table_name: String,
        name: String,
    },
    /// A user mapping is identified by its server and the mapped role.
    UserMapping { server: String, user: String },
}

impl Identity {
    pub fn global(name: impl Into<String>) -> Self {
        Identity::Global { name: name.into() }
    }

    pub fn namespaced(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Identity::Namespaced {
            schema: schema.into(),
            name: name.into(),
        }
    }

    pub fn table_owned(
        table_schema: impl Into<String>,
        table_name: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Identity::TableOwned {
            table_schema: table_schema.into(),
            table_name: table_name.into(),
            name: name.into(),
        }
    }

    /// The schema this object lives in, if it lives in one.
    pub fn schema(&self) -> Option<&str> {
        match self {
            Identity::Global { .. } | Identity::UserMapping { .. } => None,
            Identity::Namespaced { schema, .. } => Some(schema),
            Identity::TableOwned { table_schema, .. } => Some(table_schema),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Identity::Global { name }
            | Identity::Namespaced { name, .. }
            | Identity::TableOwned { name, .. } => name,
            Identity::UserMapping { user, .. } => user,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Global { name } => write!(f, "{}", name),
            Identity::Namespaced { schema, name } => write!(f, "{}.{}", schema, name),
            Identity::TableOwned {
                table_schema,
                table_name,
                name,
            } => write!(f, "{} on {}.{}", name, table_schema, table_name),
            Identity::UserMapping { server, user } => write!(f, "{} for {}", server, user),
        }
    }
}

/// A kind-qualified identity. Two objects of different kinds may share an
/// identity (a schema and a server both named `app`), never an `ObjectRef`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    pub kind: ObjectKind,
    pub identity: Identity,
}

impl ObjectRef {
    pub fn new(kind: ObjectKind, identity: Identity) -> Self {
        Self { kind, identity }
    }

    pub fn schema(name: impl Into<String>) -> Self {
        Self::new(ObjectKind::Schema, Identity::global(name))
    }

    pub fn table(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(ObjectKind::Table, Identity::namespaced(schema, name))
    }

    pub fn server(name: impl Into<String>) -> Self {
        Self::new(ObjectKind::ForeignServer, Identity::global(name))
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.identity)
    }
}

/// Behavior shared by every snapshot type.
pub trait CatalogObject: Clone + PartialEq {
    const KIND: ObjectKind;

    fn identity(&self) -> Identity;

    /// The object this one cannot exist without: a schema for namespaced
    /// objects, a table for table-owned objects, a server for user mappings.
    fn container(&self) -> Option<ObjectRef>;

    /// Check that fields are mutually consistent for this kind.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(Self::KIND, self.identity())
    }

    fn invalid(&self, reason: impl Into<String>) -> ValidationError {
        ValidationError::invalid(Self::KIND, self.identity(), reason)
    }
}
