//! Change ordering - turns an unordered diff into an executable sequence.
//!
//! Changes go into an arena and "must run before" edges are derived pairwise:
//!
//! ```text
//! CREATE SCHEMA app                          -- containers are created first
//! CREATE SEQUENCE app.post_id_seq AS integer -- before the default drawing from it
//! CREATE TABLE app.author (...)
//! CREATE TABLE app.post (...)
//! ALTER SEQUENCE app.post_id_seq OWNED BY app.post.id
//! ALTER TABLE app . author ADD CONSTRAINT author_pkey PRIMARY KEY (id)
//! ALTER TABLE app . post ADD CONSTRAINT post_author_fkey ...  -- after the key it references
//! ```
//!
//! Drops run the other way round: a constraint is dropped before its table, a
//! table before its schema, a foreign key before the key it references.
//!
//! A replace enters the graph as its drop and its create, so each half is
//! placed on its own. Halves that end up next to each other are joined back
//! into the replace.
//!
//! The graph is then sorted topologically. Whenever several changes are ready
//! at once, the smallest `(kind, schema, name, action)` goes first, so
//! identical diffs always produce identical scripts.

use crate::change::{
    Action, Change, ObjectChange, SequenceAlteration, SequenceChange, TableAlteration, TableChange,
};
use crate::sql::{default_uses_sequence, names_type};
use crate::{CatalogDiff, Error, Result, Script};
use pgbranch_catalog::{ConstraintType, Identity, ObjectKind, ObjectRef};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use tracing::{debug, info};

/// Changes in an order in which every one of them can execute.
#[derive(Debug, Clone, Default)]
pub struct OrderedChanges {
    pub changes: Vec<Change>,
}

impl OrderedChanges {
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }

    /// Render the whole sequence; fails on the first change that cannot be
    /// rendered, so a partial script is never returned.
    pub fn to_script(&self) -> Result<Script> {
        Script::from_changes(&self.changes)
    }
}

const BEFORE: usize = 0;
const AFTER: usize = 1;

/// One change plus the facts the edge rules look at. Index 0 describes the
/// object before the change, index 1 after it.
struct Node<'a> {
    change: &'a Change,
    /// Position of the diff change this node came from. The two halves of a
    /// replace share it; nothing else does.
    origin: usize,
    kind: ObjectKind,
    identity: Identity,
    object: ObjectRef,
    action: Action,
    /// Direct container first, then its schema for table-owned objects.
    ancestors: Vec<ObjectRef>,
    /// Table referenced by a foreign key.
    references: [Option<ObjectRef>; 2],
    /// Table carrying a primary key or unique constraint.
    key_of: [Option<ObjectRef>; 2],
    /// Types named by table columns, composite attributes, or a domain's base.
    used_types: [Vec<&'a str>; 2],
    /// Column defaults of a table.
    defaults: [Vec<&'a str>; 2],
    /// Table and column of an `OWNED BY` change.
    owner: [Option<(ObjectRef, &'a str)>; 2],
}

impl<'a> Node<'a> {
    fn new(change: &'a Change, origin: usize) -> Self {
        let mut ancestors = Vec::new();
        if let Some(container) = change.container() {
            let schema = match container.kind {
                ObjectKind::Table => container.identity.schema().map(ObjectRef::schema),
                _ => None,
            };
            ancestors.push(container);
            ancestors.extend(schema);
        }

        let mut node = Node {
            change,
            origin,
            kind: change.kind(),
            identity: change.identity(),
            object: change.object_ref(),
            action: change.action(),
            ancestors,
            references: [None, None],
            key_of: [None, None],
            used_types: [Vec::new(), Vec::new()],
            defaults: [Vec::new(), Vec::new()],
            owner: [None, None],
        };

        match change {
            Change::Constraint(c) => {
                for (side, constraint) in [c.before(), c.after()].into_iter().enumerate() {
                    let Some(constraint) = constraint else { continue };
                    node.references[side] =
                        constraint.foreign_key.as_ref().map(|fk| fk.table_ref());
                    if matches!(
                        constraint.constraint_type,
                        ConstraintType::PrimaryKey | ConstraintType::Unique
                    ) {
                        node.key_of[side] = Some(constraint.table_ref());
                    }
                }
            }
            Change::Table(c) => {
                for (side, table) in [c.before(), c.after()].into_iter().enumerate() {
                    let Some(table) = table else { continue };
                    node.used_types[side] =
                        table.columns.iter().map(|col| col.data_type.as_str()).collect();
                    node.defaults[side] =
                        table.columns.iter().filter_map(|col| col.default.as_deref()).collect();
                }
            }
            Change::CompositeType(c) => {
                for (side, ty) in [c.before(), c.after()].into_iter().enumerate() {
                    let Some(ty) = ty else { continue };
                    node.used_types[side] =
                        ty.attributes.iter().map(|a| a.data_type.as_str()).collect();
                }
            }
            Change::Domain(c) => {
                for (side, domain) in [c.before(), c.after()].into_iter().enumerate() {
                    let Some(domain) = domain else { continue };
                    node.used_types[side] = vec![domain.base_type.as_str()];
                }
            }
            Change::Sequence(SequenceChange::Alter {
                from,
                to,
                alteration: SequenceAlteration::SetOwnedBy(_),
            }) => {
                for (side, sequence) in [from, to].into_iter().enumerate() {
                    node.owner[side] = sequence
                        .owned_by
                        .as_ref()
                        .map(|owner| (owner.table_ref(), owner.column.as_str()));
                }
            }
            _ => {}
        }

        node
    }

    /// Tie-break among changes that are ready at the same time.
    fn sort_key(&self) -> (ObjectKind, &str, &str, &Identity, Action) {
        (
            self.kind,
            self.identity.schema().unwrap_or_default(),
            self.identity.name(),
            &self.identity,
            self.action,
        )
    }

    fn is_type(&self) -> bool {
        matches!(self.kind, ObjectKind::Domain | ObjectKind::CompositeType)
    }

    fn can_use_types(&self) -> bool {
        matches!(
            self.kind,
            ObjectKind::Table | ObjectKind::CompositeType | ObjectKind::Domain
        )
    }

    /// True if this object is declared with the type `ty` on `side`.
    fn uses_type(&self, ty: &Node<'_>, side: usize) -> bool {
        let (Some(schema), name) = (ty.identity.schema(), ty.identity.name()) else {
            return false;
        };
        self.object != ty.object
            && self.used_types[side]
                .iter()
                .any(|data_type| names_type(data_type, schema, name))
    }

    /// True if a column default of this table draws from `sequence` on `side`.
    fn draws_from(&self, sequence: &Node<'_>, side: usize) -> bool {
        let (Some(schema), name) = (sequence.identity.schema(), sequence.identity.name()) else {
            return false;
        };
        self.defaults[side]
            .iter()
            .any(|default| default_uses_sequence(default, schema, name))
    }

    /// True if this table change brings `column` of `table` into existence.
    fn adds_column(&self, (table, column): &(ObjectRef, &str)) -> bool {
        if self.object != *table {
            return false;
        }
        match self.change {
            Change::Table(TableChange::Create(_)) => true,
            Change::Table(TableChange::Alter {
                alteration: TableAlteration::AddColumn(col),
                ..
            }) => col.name == *column,
            _ => false,
        }
    }

    /// True if this table change takes `column` of `table` away.
    fn removes_column(&self, (table, column): &(ObjectRef, &str)) -> bool {
        if self.object != *table {
            return false;
        }
        match self.change {
            Change::Table(TableChange::Drop(_)) => true,
            Change::Table(TableChange::Alter {
                alteration: TableAlteration::DropColumn(name),
                ..
            }) => name == column,
            _ => false,
        }
    }
}

/// True if `first` has to execute before `then`.
fn must_precede(first: &Node<'_>, then: &Node<'_>) -> bool {
    // The drop half of a replace runs before its create half.
    if first.origin == then.origin && first.action == Action::Drop {
        return true;
    }
    // An object is created before it is altered.
    if first.object == then.object
        && first.action == Action::Create
        && then.action == Action::Alter
    {
        return true;
    }

    // Containers exist before their contents.
    if first.action == Action::Create
        && then.action == Action::Create
        && then.ancestors.contains(&first.object)
    {
        return true;
    }
    // Contents go away before their container.
    if first.action == Action::Drop
        && then.action == Action::Drop
        && first.ancestors.contains(&then.object)
    {
        return true;
    }

    // Table alterations sit between drops and creates of what the table owns.
    if then.kind == ObjectKind::Table
        && then.action == Action::Alter
        && first.action == Action::Drop
        && first.ancestors.first() == Some(&then.object)
    {
        return true;
    }
    if first.kind == ObjectKind::Table
        && first.action == Action::Alter
        && then.action == Action::Create
        && then.ancestors.first() == Some(&first.object)
    {
        return true;
    }

    // A foreign key needs the referenced table and its key in place.
    if let Some(target) = then.references[AFTER]
        .as_ref()
        .filter(|_| then.action == Action::Create)
    {
        if first.object == *target && matches!(first.action, Action::Create | Action::Alter) {
            return true;
        }
        if first.action == Action::Create && first.key_of[AFTER].as_ref() == Some(target) {
            return true;
        }
    }
    // ... and is dropped before either goes away.
    if let Some(target) = first.references[BEFORE]
        .as_ref()
        .filter(|_| first.action == Action::Drop && then.action == Action::Drop)
    {
        if then.object == *target || then.key_of[BEFORE].as_ref() == Some(target) {
            return true;
        }
    }

    // Types exist before the columns, attributes, and domains declared with
    // them, and outlive them.
    if first.is_type()
        && first.action == Action::Create
        && then.can_use_types()
        && matches!(then.action, Action::Create | Action::Alter)
        && then.uses_type(first, AFTER)
    {
        return true;
    }
    if then.is_type()
        && then.action == Action::Drop
        && first.can_use_types()
        && matches!(first.action, Action::Drop | Action::Alter)
        && first.uses_type(then, BEFORE)
    {
        return true;
    }

    // Sequences exist before the defaults drawing from them, and outlive them.
    if first.kind == ObjectKind::Sequence
        && first.action == Action::Create
        && then.kind == ObjectKind::Table
        && matches!(then.action, Action::Create | Action::Alter)
        && then.draws_from(first, AFTER)
    {
        return true;
    }
    if then.kind == ObjectKind::Sequence
        && then.action == Action::Drop
        && first.kind == ObjectKind::Table
        && matches!(first.action, Action::Drop | Action::Alter)
        && first.draws_from(then, BEFORE)
    {
        return true;
    }

    // `OWNED BY` points at a column that exists.
    if let Some(owner) = &then.owner[AFTER] {
        if first.adds_column(owner) {
            return true;
        }
    }
    if let Some(owner) = &first.owner[BEFORE] {
        if then.removes_column(owner) {
            return true;
        }
    }

    false
}

/// Order every change in `diff`.
pub fn order_changes(diff: &CatalogDiff) -> Result<OrderedChanges> {
    let originals: Vec<&Change> = diff.changes().collect();

    let mut units: Vec<(Change, usize)> = Vec::with_capacity(originals.len());
    for (origin, change) in originals.iter().enumerate() {
        match change.replace_halves() {
            Some((drop, create)) => {
                units.push((drop, origin));
                units.push((create, origin));
            }
            None => units.push(((*change).clone(), origin)),
        }
    }
    let nodes: Vec<Node<'_>> = units
        .iter()
        .map(|(change, origin)| Node::new(change, *origin))
        .collect();

    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut in_degree = vec![0usize; nodes.len()];
    for (i, first) in nodes.iter().enumerate() {
        for (j, then) in nodes.iter().enumerate() {
            if i != j && must_precede(first, then) {
                debug!(first = %first.change, then = %then.change, "ordering edge");
                successors[i].push(j);
                in_degree[j] += 1;
            }
        }
    }

    let key = |i: usize| Reverse((nodes[i].sort_key(), i));
    let mut ready: BinaryHeap<_> = (0..nodes.len())
        .filter(|&i| in_degree[i] == 0)
        .map(key)
        .collect();

    let mut sorted = Vec::with_capacity(nodes.len());
    while let Some(Reverse((_, i))) = ready.pop() {
        sorted.push(i);
        for &j in &successors[i] {
            in_degree[j] -= 1;
            if in_degree[j] == 0 {
                ready.push(key(j));
            }
        }
    }

    if sorted.len() < nodes.len() {
        let mut stuck: Vec<usize> = (0..nodes.len()).filter(|&i| in_degree[i] > 0).collect();
        stuck.sort_by_key(|&i| key(i).0);
        return Err(Error::CycleDetected {
            changes: stuck.into_iter().map(|i| nodes[i].change.to_string()).collect(),
        });
    }

    let mut ordered = Vec::with_capacity(originals.len());
    let mut at = 0;
    while at < sorted.len() {
        let node = &nodes[sorted[at]];
        let joined = sorted
            .get(at + 1)
            .is_some_and(|&next| nodes[next].origin == node.origin);
        if joined {
            ordered.push(originals[node.origin].clone());
            at += 2;
        } else {
            ordered.push(node.change.clone());
            at += 1;
        }
    }

    info!(changes = ordered.len(), "ordered changes");
    Ok(OrderedChanges { changes: ordered })
}
