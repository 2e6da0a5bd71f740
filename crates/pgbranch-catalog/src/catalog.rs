use crate::{
    CatalogObject, CompositeType, Constraint, Domain, ForeignServer, Identity, Index, ObjectRef,
    RlsPolicy, Schema, Sequence, Table, UserMapping, ValidationError,
};
use indexmap::IndexMap;

/// Objects of one kind, keyed by identity and sorted by it.
pub type ObjectMap<T> = IndexMap<Identity, T>;

/// A complete, validated snapshot of one database's catalog.
///
/// Built with [`Catalog::builder`]; immutable afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    schemas: ObjectMap<Schema>,
    sequences: ObjectMap<Sequence>,
    composite_types: ObjectMap<CompositeType>,
    constraints: ObjectMap<Constraint>,
    domains: ObjectMap<Domain>,
    rls_policies: ObjectMap<RlsPolicy>,
    tables: ObjectMap<Table>,
    indexes: ObjectMap<Index>,
    servers: ObjectMap<ForeignServer>,
    user_mappings: ObjectMap<UserMapping>,
}

impl Catalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    pub fn schemas(&self) -> &ObjectMap<Schema> {
        &self.schemas
    }

    pub fn sequences(&self) -> &ObjectMap<Sequence> {
        &self.sequences
    }

    pub fn composite_types(&self) -> &ObjectMap<CompositeType> {
        &self.composite_types
    }

    pub fn constraints(&self) -> &ObjectMap<Constraint> {
        &self.constraints
    }

    pub fn domains(&self) -> &ObjectMap<Domain> {
        &self.domains
    }

    pub fn rls_policies(&self) -> &ObjectMap<RlsPolicy> {
        &self.rls_policies
    }

    pub fn tables(&self) -> &ObjectMap<Table> {
        &self.tables
    }

    pub fn indexes(&self) -> &ObjectMap<Index> {
        &self.indexes
    }

    pub fn servers(&self) -> &ObjectMap<ForeignServer> {
        &self.servers
    }

    pub fn user_mappings(&self) -> &ObjectMap<UserMapping> {
        &self.user_mappings
    }

    /// Total number of objects across all kinds.
    pub fn len(&self) -> usize {
        self.schemas.len()
            + self.sequences.len()
            + self.composite_types.len()
            + self.constraints.len()
            + self.domains.len()
            + self.rls_policies.len()
            + self.tables.len()
            + self.indexes.len()
            + self.servers.len()
            + self.user_mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Collects extraction output, in any order, into a [`Catalog`].
#[derive(Debug, Clone, Default)]
pub struct CatalogBuilder {
    schemas: Vec<Schema>,
    sequences: Vec<Sequence>,
    composite_types: Vec<CompositeType>,
    constraints: Vec<Constraint>,
    domains: Vec<Domain>,
    rls_policies: Vec<RlsPolicy>,
    tables: Vec<Table>,
    indexes: Vec<Index>,
    servers: Vec<ForeignServer>,
    user_mappings: Vec<UserMapping>,
}

macro_rules! builder_setters {
    ($($field:ident: $ty:ty),* $(,)?) => {
        $(
            pub fn $field(mut self, items: impl IntoIterator<Item = $ty>) -> Self {
                self.$field.extend(items);
                self
            }
        )*
    };
}

impl CatalogBuilder {
    builder_setters! {
        schemas: Schema,
        sequences: Sequence,
        composite_types: CompositeType,
        constraints: Constraint,
        domains: Domain,
        rls_policies: RlsPolicy,
        tables: Table,
        indexes: Index,
        servers: ForeignServer,
        user_mappings: UserMapping,
    }

    /// Validate every object, key it by identity, and check that table-owned
    /// objects and user mappings point at something in the same snapshot.
    pub fn build(self) -> Result<Catalog, ValidationError> {
        let catalog = Catalog {
            schemas: keyed(self.schemas)?,
            sequences: keyed(self.sequences)?,
            composite_types: keyed(self.composite_types)?,
            constraints: keyed(self.constraints)?,
            domains: keyed(self.domains)?,
            rls_policies: keyed(self.rls_policies)?,
            tables: keyed(self.tables)?,
            indexes: keyed(self.indexes)?,
            servers: keyed(self.servers)?,
            user_mappings: keyed(self.user_mappings)?,
        };

        check_containers(&catalog, catalog.constraints.values())?;
        check_containers(&catalog, catalog.rls_policies.values())?;
        check_containers(&catalog, catalog.indexes.values())?;
        check_containers(&catalog, catalog.user_mappings.values())?;

        Ok(catalog)
    }
}

fn keyed<T: CatalogObject>(items: Vec<T>) -> Result<ObjectMap<T>, ValidationError> {
    let mut map = ObjectMap::with_capacity(items.len());
    for item in items {
        item.validate()?;
        let identity = item.identity();
        if map.contains_key(&identity) {
            return Err(ValidationError::DuplicateIdentity {
                kind: T::KIND,
                identity,
            });
        }
        map.insert(identity, item);
    }
    map.sort_keys();
    Ok(map)
}

fn check_containers<'a, T: CatalogObject + 'a>(
    catalog: &Catalog,
    items: impl Iterator<Item = &'a T>,
) -> Result<(), ValidationError> {
    for item in items {
        let Some(container) = item.container() else {
            continue;
        };
        if !contains(catalog, &container) {
            return Err(ValidationError::MissingReference {
                kind: T::KIND,
                identity: item.identity(),
                missing: container.identity,
            });
        }
    }
    Ok(())
}

fn contains(catalog: &Catalog, object: &ObjectRef) -> bool {
    use crate::ObjectKind;
    let id = &object.identity;
    match object.kind {
        ObjectKind::Schema => catalog.schemas.contains_key(id),
        ObjectKind::Sequence => catalog.sequences.contains_key(id),
        ObjectKind::Domain => catalog.domains.contains_key(id),
        ObjectKind::CompositeType => catalog.composite_types.contains_key(id),
        ObjectKind::Table => catalog.tables.contains_key(id),
        ObjectKind::Constraint => catalog.constraints.contains_key(id),
        ObjectKind::Index => catalog.indexes.contains_key(id),
        ObjectKind::RlsPolicy => catalog.rls_policies.contains_key(id),
        ObjectKind::ForeignServer => catalog.servers.contains_key(id),
        ObjectKind::UserMapping => catalog.user_mappings.contains_key(id),
    }
}
