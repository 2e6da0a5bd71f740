//! Catalog diffing - compare a main snapshot against a branch snapshot.
//!
//! Every kind is diffed independently. Identities present only in main become
//! drops, identities present only in the branch become creates, and identities
//! present in both are compared attribute by attribute:
//!
//! - an attribute with an in-place path becomes a narrow alteration (owner,
//!   column default, sequence options, ...);
//! - an attribute without one turns the whole object into a replace;
//! - an attribute with neither is an [`Error::UnsupportedChange`].
//!
//! A sequence owned by a column (`serial`) is created bare and attached to its
//! column by a separate `OWNED BY` change. Its drop is left out when the
//! owning column goes away, since the column takes the sequence with it.
//!
//! Option lists on servers and user mappings go through
//! [`filter_env_dependent`] first, so a password or hostname that differs
//! between environments never shows up as a change.
//!
//! The result is unordered; see [`CatalogDiff::order`].

use crate::change::*;
use crate::sql::names_type;
use crate::{Error, OrderedChanges, Result};
use indexmap::IndexMap;
use pgbranch_catalog::*;
use tracing::debug;

/// The changes between two snapshots, grouped by kind.
#[derive(Debug, Clone, Default)]
pub struct CatalogDiff {
    /// Only kinds with at least one change are present.
    pub kind_diffs: Vec<KindDiff>,
}

/// Changes for a single object kind.
#[derive(Debug, Clone)]
pub struct KindDiff {
    pub kind: ObjectKind,
    pub changes: Vec<Change>,
}

impl CatalogDiff {
    /// Returns true if there are no differences.
    pub fn is_empty(&self) -> bool {
        self.kind_diffs.is_empty()
    }

    pub fn change_count(&self) -> usize {
        self.kind_diffs.iter().map(|k| k.changes.len()).sum()
    }

    /// All changes, grouped by kind, in no meaningful order.
    pub fn changes(&self) -> impl Iterator<Item = &Change> {
        self.kind_diffs.iter().flat_map(|k| k.changes.iter())
    }

    /// Changes for one kind; empty if the kind did not change.
    pub fn changes_of(&self, kind: ObjectKind) -> &[Change] {
        self.kind_diffs
            .iter()
            .find(|k| k.kind == kind)
            .map(|k| k.changes.as_slice())
            .unwrap_or_default()
    }

    /// Order the changes so every one of them can execute.
    pub fn order(&self) -> Result<OrderedChanges> {
        crate::solver::order_changes(self)
    }

    fn push(&mut self, kind: ObjectKind, changes: Vec<Change>) {
        if !changes.is_empty() {
            self.kind_diffs.push(KindDiff { kind, changes });
        }
    }
}

impl std::fmt::Display for CatalogDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            writeln!(f, "No changes detected.")?;
        } else {
            writeln!(f, "Changes detected:\n")?;
            for kind_diff in &self.kind_diffs {
                writeln!(f, "  {}:", kind_diff.kind)?;
                for change in &kind_diff.changes {
                    writeln!(f, "    {}", change)?;
                }
            }
        }
        Ok(())
    }
}

/// Compute the changes that turn `main` into `branch`.
pub fn diff(main: &Catalog, branch: &Catalog) -> Result<CatalogDiff> {
    let mut diff = CatalogDiff::default();

    diff.push(
        ObjectKind::Schema,
        diff_kind(
            main.schemas(),
            branch.schemas(),
            |s| Change::Schema(SchemaChange::Create(s)),
            |s| Change::Schema(SchemaChange::Drop(s)),
            alter_schema,
        )?,
    );
    let sequences = diff_kind(
        main.sequences(),
        branch.sequences(),
        |s| Change::Sequence(SequenceChange::Create(s)),
        |s| Change::Sequence(SequenceChange::Drop(s)),
        alter_sequence,
    )?;
    diff.push(ObjectKind::Sequence, owned_sequences(sequences, branch));
    diff.push(
        ObjectKind::Domain,
        diff_kind(
            main.domains(),
            branch.domains(),
            |d| Change::Domain(DomainChange::Create(d)),
            |d| Change::Domain(DomainChange::Drop(d)),
            alter_domain,
        )?,
    );
    diff.push(
        ObjectKind::CompositeType,
        diff_kind(
            main.composite_types(),
            branch.composite_types(),
            |t| Change::CompositeType(CompositeTypeChange::Create(t)),
            |t| Change::CompositeType(CompositeTypeChange::Drop(t)),
            alter_composite_type,
        )?,
    );
    diff.push(
        ObjectKind::Table,
        diff_kind(
            main.tables(),
            branch.tables(),
            |t| Change::Table(TableChange::Create(t)),
            |t| Change::Table(TableChange::Drop(t)),
            alter_table,
        )?,
    );
    diff.push(
        ObjectKind::Constraint,
        diff_kind(
            main.constraints(),
            branch.constraints(),
            |c| Change::Constraint(ConstraintChange::Create(c)),
            |c| Change::Constraint(ConstraintChange::Drop(c)),
            alter_constraint,
        )?,
    );
    diff.push(
        ObjectKind::Index,
        diff_kind(
            main.indexes(),
            branch.indexes(),
            |i| Change::Index(IndexChange::Create(i)),
            |i| Change::Index(IndexChange::Drop(i)),
            alter_index,
        )?,
    );
    diff.push(
        ObjectKind::RlsPolicy,
        diff_kind(
            main.rls_policies(),
            branch.rls_policies(),
            |p| Change::RlsPolicy(RlsPolicyChange::Create(p)),
            |p| Change::RlsPolicy(RlsPolicyChange::Drop(p)),
            alter_policy,
        )?,
    );
    diff.push(
        ObjectKind::ForeignServer,
        diff_kind(
            main.servers(),
            branch.servers(),
            |s| Change::Server(ServerChange::Create(s)),
            |s| Change::Server(ServerChange::Drop(s)),
            alter_server,
        )?,
    );
    diff.push(
        ObjectKind::UserMapping,
        diff_kind(
            main.user_mappings(),
            branch.user_mappings(),
            |m| Change::UserMapping(UserMappingChange::Create(m)),
            |m| Change::UserMapping(UserMappingChange::Drop(m)),
            alter_user_mapping,
        )?,
    );

    check_replaced_types(&diff, main, branch)?;
    Ok(diff)
}

/// Attach created sequences to their column, and leave out drops the owning
/// column already takes care of.
fn owned_sequences(changes: Vec<Change>, branch: &Catalog) -> Vec<Change> {
    let mut result = Vec::with_capacity(changes.len());
    for change in changes {
        match &change {
            Change::Sequence(SequenceChange::Create(to)) => {
                let attach = to.owned_by.clone().map(|owner| {
                    Change::Sequence(SequenceChange::Alter {
                        from: Sequence {
                            owned_by: None,
                            ..to.clone()
                        },
                        to: to.clone(),
                        alteration: SequenceAlteration::SetOwnedBy(Some(owner)),
                    })
                });
                result.push(change);
                result.extend(attach);
            }
            Change::Sequence(SequenceChange::Drop(from)) => {
                let column_survives = from.owned_by.as_ref().is_none_or(|owner| {
                    branch
                        .tables()
                        .get(&owner.table_ref().identity)
                        .is_some_and(|t| t.columns.iter().any(|c| c.name == owner.column))
                });
                if column_survives {
                    result.push(change);
                } else {
                    debug!(change = %change, "dropped with its owning column");
                }
            }
            _ => result.push(change),
        }
    }
    result
}

/// Objects that can be declared with a domain or composite type, with the
/// type names they mention.
fn type_users(catalog: &Catalog) -> Vec<(ObjectRef, Vec<&str>)> {
    let mut users: Vec<(ObjectRef, Vec<&str>)> = Vec::new();
    for table in catalog.tables().values() {
        let types = table.columns.iter().map(|c| c.data_type.as_str()).collect();
        users.push((table.object_ref(), types));
    }
    for ty in catalog.composite_types().values() {
        let types = ty.attributes.iter().map(|a| a.data_type.as_str()).collect();
        users.push((ty.object_ref(), types));
    }
    for domain in catalog.domains().values() {
        users.push((domain.object_ref(), vec![domain.base_type.as_str()]));
    }
    users
}

/// A domain or composite type cannot be dropped and re-created while an
/// object that survives the migration is declared with it on both sides.
fn check_replaced_types(diff: &CatalogDiff, main: &Catalog, branch: &Catalog) -> Result<()> {
    let replaced: Vec<ObjectRef> = diff
        .changes()
        .filter(|change| {
            matches!(
                change,
                Change::Domain(DomainChange::Replace { .. })
                    | Change::CompositeType(CompositeTypeChange::Replace { .. })
            )
        })
        .map(|change| change.object_ref())
        .collect();
    if replaced.is_empty() {
        return Ok(());
    }

    let before = type_users(main);
    let after = type_users(branch);
    let uses = |types: &[&str], ty: &ObjectRef| {
        let schema = ty.identity.schema().unwrap_or_default();
        types.iter().any(|t| names_type(t, schema, ty.identity.name()))
    };
    for ty in replaced {
        for (user, types) in &before {
            if *user == ty || !uses(types, &ty) {
                continue;
            }
            let still_used = after
                .iter()
                .any(|(other, types)| other == user && uses(types, &ty));
            if still_used {
                return Err(Error::UnsupportedChange {
                    kind: ty.kind,
                    identity: ty.identity.clone(),
                    attribute: format!("definition while {} uses it", user),
                });
            }
        }
    }
    Ok(())
}

/// Three-way partition of one kind's identities.
fn diff_kind<T: CatalogObject>(
    from: &ObjectMap<T>,
    to: &ObjectMap<T>,
    create: impl Fn(T) -> Change,
    drop: impl Fn(T) -> Change,
    alter: impl Fn(&T, &T) -> Result<Vec<Change>>,
) -> Result<Vec<Change>> {
    let mut changes = Vec::new();

    for (identity, old) in from {
        match to.get(identity) {
            None => changes.push(drop(old.clone())),
            Some(new) if new != old => changes.extend(alter(old, new)?),
            Some(_) => {}
        }
    }

    for (identity, new) in to {
        if !from.contains_key(identity) {
            changes.push(create(new.clone()));
        }
    }

    for change in &changes {
        debug!(kind = %T::KIND, change = %change, "diff");
    }
    Ok(changes)
}

fn unsupported<T: CatalogObject>(object: &T, attribute: &str) -> Error {
    Error::UnsupportedChange {
        kind: T::KIND,
        identity: object.identity(),
        attribute: attribute.to_string(),
    }
}

fn alter_schema(from: &Schema, to: &Schema) -> Result<Vec<Change>> {
    let mut changes = Vec::new();
    if from.owner != to.owner {
        changes.push(Change::Schema(SchemaChange::ChangeOwner {
            from: from.clone(),
            to: to.clone(),
        }));
    }
    Ok(changes)
}

fn alter_sequence(from: &Sequence, to: &Sequence) -> Result<Vec<Change>> {
    let alter = |alteration| {
        Change::Sequence(SequenceChange::Alter {
            from: from.clone(),
            to: to.clone(),
            alteration,
        })
    };

    let mut changes = Vec::new();
    let options_changed = from.data_type != to.data_type
        || from.start_value != to.start_value
        || from.minimum_value != to.minimum_value
        || from.maximum_value != to.maximum_value
        || from.increment != to.increment
        || from.cycle_option != to.cycle_option
        || from.cache_size != to.cache_size;
    if options_changed {
        changes.push(alter(SequenceAlteration::Options));
    }
    if from.persistence != to.persistence {
        if to.persistence == Persistence::Temporary {
            return Err(unsupported(to, "persistence"));
        }
        changes.push(alter(SequenceAlteration::SetPersistence(to.persistence)));
    }
    if from.owner != to.owner {
        changes.push(alter(SequenceAlteration::ChangeOwner(to.owner.clone())));
    }
    if from.owned_by != to.owned_by {
        changes.push(alter(SequenceAlteration::SetOwnedBy(to.owned_by.clone())));
    }
    Ok(changes)
}

fn alter_domain(from: &Domain, to: &Domain) -> Result<Vec<Change>> {
    if !from.same_base(to) {
        return Ok(vec![Change::Domain(DomainChange::Replace {
            from: from.clone(),
            to: to.clone(),
        })]);
    }

    let alter = |alteration| {
        Change::Domain(DomainChange::Alter {
            from: from.clone(),
            to: to.clone(),
            alteration,
        })
    };

    let mut changes = Vec::new();
    // The binary form follows the textual one; comparing it would only
    // surface catalog-internal noise.
    if from.default_value != to.default_value {
        changes.push(alter(match &to.default_value {
            Some(value) => DomainAlteration::SetDefault(value.clone()),
            None => DomainAlteration::DropDefault,
        }));
    }
    if from.not_null != to.not_null {
        changes.push(alter(if to.not_null {
            DomainAlteration::SetNotNull
        } else {
            DomainAlteration::DropNotNull
        }));
    }
    if from.owner != to.owner {
        changes.push(alter(DomainAlteration::ChangeOwner(to.owner.clone())));
    }
    Ok(changes)
}

fn alter_composite_type(from: &CompositeType, to: &CompositeType) -> Result<Vec<Change>> {
    let replace = || {
        Ok(vec![Change::CompositeType(CompositeTypeChange::Replace {
            from: from.clone(),
            to: to.clone(),
        })])
    };
    if !from.same_structure(to) {
        return replace();
    }

    let mut alterations = Vec::new();
    for attr in &from.attributes {
        if !to.attributes.iter().any(|a| a.name == attr.name) {
            alterations.push(TypeAlteration::DropAttribute(attr.name.clone()));
        }
    }
    for attr in &to.attributes {
        match from.attributes.iter().find(|a| a.name == attr.name) {
            None => alterations.push(TypeAlteration::AddAttribute(attr.clone())),
            Some(old) if old.collation != attr.collation => return replace(),
            Some(old) if old.data_type != attr.data_type => {
                alterations.push(TypeAlteration::AlterAttributeType(attr.clone()));
            }
            Some(_) => {}
        }
    }

    let names = |t: &CompositeType| -> Vec<String> {
        t.attributes.iter().map(|a| a.name.clone()).collect()
    };
    if !order_preserved(&names(from), &names(to)) {
        return replace();
    }

    if from.owner != to.owner {
        alterations.push(TypeAlteration::ChangeOwner(to.owner.clone()));
    }

    Ok(alterations
        .into_iter()
        .map(|alteration| {
            Change::CompositeType(CompositeTypeChange::Alter {
                from: from.clone(),
                to: to.clone(),
                alteration,
            })
        })
        .collect())
}

fn alter_table(from: &Table, to: &Table) -> Result<Vec<Change>> {
    if from.is_partition != to.is_partition || from.partition_bound != to.partition_bound {
        return Err(unsupported(to, "partition bound"));
    }
    if from.persistence != to.persistence && to.persistence == Persistence::Temporary {
        return Err(unsupported(to, "persistence"));
    }

    let names = |t: &Table| -> Vec<String> {
        let mut columns: Vec<&Column> = t.columns.iter().collect();
        columns.sort_by_key(|c| c.position);
        columns.into_iter().map(|c| c.name.clone()).collect()
    };
    if !order_preserved(&names(from), &names(to)) {
        return Err(unsupported(to, "column order"));
    }

    let mut alterations = diff_columns(&to.columns, &from.columns);

    let from_options = parse_options(&from.options);
    let to_options = parse_options(&to.options);
    let set: Vec<String> = to_options
        .iter()
        .filter(|(key, value)| from_options.get(*key) != Some(*value))
        .map(|(key, value)| match value.as_str() {
            "" => key.clone(),
            _ => format!("{}={}", key, value),
        })
        .collect();
    let reset: Vec<String> = from_options
        .keys()
        .filter(|key| !to_options.contains_key(*key))
        .cloned()
        .collect();
    if !reset.is_empty() {
        alterations.push(TableAlteration::ResetOptions(reset));
    }
    if !set.is_empty() {
        alterations.push(TableAlteration::SetOptions(set));
    }

    if from.row_security != to.row_security {
        alterations.push(TableAlteration::SetRowSecurity(to.row_security));
    }
    if from.persistence != to.persistence {
        alterations.push(TableAlteration::SetPersistence(to.persistence));
    }
    if from.owner != to.owner {
        alterations.push(TableAlteration::ChangeOwner(to.owner.clone()));
    }

    Ok(alterations
        .into_iter()
        .map(|alteration| {
            Change::Table(TableChange::Alter {
                from: from.clone(),
                to: to.clone(),
                alteration,
            })
        })
        .collect())
}

/// Whether `to` is `from` with some names removed and new ones appended.
/// Added columns and attributes always land at the end.
fn order_preserved(from: &[String], to: &[String]) -> bool {
    let mut resulting: Vec<&String> = from.iter().filter(|name| to.contains(name)).collect();
    resulting.extend(to.iter().filter(|name| !from.contains(name)));
    resulting.into_iter().eq(to.iter())
}

/// Column-level alterations: drops first, then adds, then in-place changes.
///
/// An identity is removed before a default takes its place, and added only
/// once the old default is gone and the column is `NOT NULL`.
fn diff_columns(desired: &[Column], current: &[Column]) -> Vec<TableAlteration> {
    let mut changes = Vec::new();

    // Columns to drop
    for col in current {
        if !desired.iter().any(|c| c.name == col.name) {
            changes.push(TableAlteration::DropColumn(col.name.clone()));
        }
    }

    // Columns to add, in position order
    let mut added: Vec<&Column> = desired
        .iter()
        .filter(|col| !current.iter().any(|c| c.name == col.name))
        .collect();
    added.sort_by_key(|c| c.position);
    changes.extend(added.into_iter().cloned().map(TableAlteration::AddColumn));

    // Columns in both - check for changes
    for desired_col in desired {
        let Some(current_col) = current.iter().find(|c| c.name == desired_col.name) else {
            continue;
        };
        let identity = (desired_col.identity != current_col.identity).then(|| {
            TableAlteration::AlterColumnIdentity {
                name: desired_col.name.clone(),
                from: current_col.identity,
                to: desired_col.identity,
            }
        });
        let (identity_first, identity_last) = match desired_col.identity {
            None => (identity, None),
            Some(_) => (None, identity),
        };
        changes.extend(identity_first);

        if desired_col.data_type != current_col.data_type {
            changes.push(TableAlteration::AlterColumnType {
                name: desired_col.name.clone(),
                from: current_col.data_type.clone(),
                to: desired_col.data_type.clone(),
            });
        }

        if desired_col.not_null != current_col.not_null {
            changes.push(TableAlteration::AlterColumnNullable {
                name: desired_col.name.clone(),
                from: current_col.not_null,
                to: desired_col.not_null,
            });
        }

        if desired_col.default != current_col.default {
            changes.push(TableAlteration::AlterColumnDefault {
                name: desired_col.name.clone(),
                from: current_col.default.clone(),
                to: desired_col.default.clone(),
            });
        }

        changes.extend(identity_last);
    }

    changes
}

fn alter_constraint(from: &Constraint, to: &Constraint) -> Result<Vec<Change>> {
    if from.same_definition(to) {
        return Ok(Vec::new());
    }
    Ok(vec![Change::Constraint(ConstraintChange::Replace {
        from: from.clone(),
        to: to.clone(),
    })])
}

fn alter_index(from: &Index, to: &Index) -> Result<Vec<Change>> {
    // Index ownership follows the table.
    if from.definition == to.definition && from.is_unique == to.is_unique {
        return Ok(Vec::new());
    }
    Ok(vec![Change::Index(IndexChange::Replace {
        from: from.clone(),
        to: to.clone(),
    })])
}

fn alter_policy(from: &RlsPolicy, to: &RlsPolicy) -> Result<Vec<Change>> {
    let same_clauses = from.roles == to.roles
        && from.using_expression == to.using_expression
        && from.with_check_expression == to.with_check_expression;
    if same_clauses && from.command == to.command && from.permissive == to.permissive {
        return Ok(Vec::new());
    }

    let (from, to) = (from.clone(), to.clone());
    let change = if RlsPolicyChange::can_alter(&from, &to) {
        RlsPolicyChange::Alter { from, to }
    } else {
        RlsPolicyChange::Replace { from, to }
    };
    Ok(vec![Change::RlsPolicy(change)])
}

fn structural_options(
    from: &IndexMap<String, String>,
    to: &IndexMap<String, String>,
) -> Vec<OptionChange> {
    filter_env_dependent(option_changes(from, to))
}

fn alter_server(from: &ForeignServer, to: &ForeignServer) -> Result<Vec<Change>> {
    if from.foreign_data_wrapper != to.foreign_data_wrapper {
        return Err(unsupported(to, "foreign data wrapper"));
    }
    if from.server_type != to.server_type {
        return Err(unsupported(to, "server type"));
    }

    let alter = |alteration| {
        Change::Server(ServerChange::Alter {
            from: from.clone(),
            to: to.clone(),
            alteration,
        })
    };

    let mut changes = Vec::new();
    if from.server_version != to.server_version {
        match &to.server_version {
            Some(version) => changes.push(alter(ServerAlteration::SetVersion(version.clone()))),
            None => return Err(unsupported(to, "server version")),
        }
    }
    let options = structural_options(&from.options, &to.options);
    if !options.is_empty() {
        changes.push(alter(ServerAlteration::Options(options)));
    }
    if from.owner != to.owner {
        changes.push(alter(ServerAlteration::ChangeOwner(to.owner.clone())));
    }
    Ok(changes)
}

fn alter_user_mapping(from: &UserMapping, to: &UserMapping) -> Result<Vec<Change>> {
    let options = structural_options(&from.options, &to.options);
    if options.is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![Change::UserMapping(UserMappingChange::AlterOptions {
        from: from.clone(),
        to: to.clone(),
        options,
    })])
}
