use super::{Action, ObjectChange, describe};
use crate::sql::qualified;
use crate::Ident;
use pgbranch_catalog::{CatalogObject, Persistence, Sequence, SequenceOwner, ValidationError};
use std::fmt;

/// The values `CREATE SEQUENCE` picks when a clause is omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceDefaults {
    pub minimum_value: i64,
    pub maximum_value: i64,
    pub start_value: i64,
    pub increment: i64,
    pub cache_size: i64,
    pub cycle_option: bool,
}

impl SequenceDefaults {
    /// Defaults for `sequence`'s data type and direction.
    ///
    /// The default start follows the sequence's own bounds, not the type's.
    pub fn for_sequence(sequence: &Sequence) -> Result<Self, ValidationError> {
        let (type_min, type_max) = type_bounds(&sequence.data_type).ok_or_else(|| {
            sequence.invalid(format!("unsupported sequence type `{}`", sequence.data_type))
        })?;
        let ascending = sequence.increment > 0;
        Ok(SequenceDefaults {
            minimum_value: if ascending { 1 } else { type_min },
            maximum_value: if ascending { type_max } else { -1 },
            start_value: if ascending {
                sequence.minimum_value
            } else {
                sequence.maximum_value
            },
            increment: 1,
            cache_size: 1,
            cycle_option: false,
        })
    }
}

fn type_bounds(data_type: &str) -> Option<(i64, i64)> {
    match data_type {
        "smallint" | "int2" => Some((i16::MIN as i64, i16::MAX as i64)),
        "integer" | "int" | "int4" => Some((i32::MIN as i64, i32::MAX as i64)),
        "bigint" | "int8" => Some((i64::MIN, i64::MAX)),
        _ => None,
    }
}

/// An in-place change to an existing sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum SequenceAlteration {
    /// Any of type, increment, bounds, start, cache, or cycle.
    Options,
    SetPersistence(Persistence),
    ChangeOwner(String),
    /// The column the sequence goes away with; `None` detaches it.
    SetOwnedBy(Option<SequenceOwner>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SequenceChange {
    Create(Sequence),
    Drop(Sequence),
    Alter {
        from: Sequence,
        to: Sequence,
        alteration: SequenceAlteration,
    },
}

fn persistence_prefix(sequence: &Sequence) -> &'static str {
    match sequence.persistence {
        Persistence::Permanent => "",
        Persistence::Unlogged => "UNLOGGED ",
        Persistence::Temporary => "TEMPORARY ",
    }
}

fn create_sql(sequence: &Sequence) -> Result<String, ValidationError> {
    let defaults = SequenceDefaults::for_sequence(sequence)?;
    let mut sql = format!(
        "CREATE {}SEQUENCE {} AS {}",
        persistence_prefix(sequence),
        qualified(&sequence.schema, &sequence.name),
        sequence.data_type
    );
    if sequence.start_value != defaults.start_value {
        sql.push_str(&format!(" START WITH {}", sequence.start_value));
    }
    if sequence.increment != defaults.increment {
        sql.push_str(&format!(" INCREMENT BY {}", sequence.increment));
    }
    if sequence.minimum_value != defaults.minimum_value {
        sql.push_str(&format!(" MINVALUE {}", sequence.minimum_value));
    }
    if sequence.maximum_value != defaults.maximum_value {
        sql.push_str(&format!(" MAXVALUE {}", sequence.maximum_value));
    }
    if sequence.cache_size != defaults.cache_size {
        sql.push_str(&format!(" CACHE {}", sequence.cache_size));
    }
    if sequence.cycle_option != defaults.cycle_option {
        sql.push_str(" CYCLE");
    }
    Ok(sql)
}

fn alter_options_sql(from: &Sequence, to: &Sequence) -> Result<String, ValidationError> {
    type_bounds(&to.data_type)
        .ok_or_else(|| to.invalid(format!("unsupported sequence type `{}`", to.data_type)))?;

    let type_changed = from.data_type != to.data_type;
    let mut clauses = Vec::new();
    if type_changed {
        clauses.push(format!("AS {}", to.data_type));
    }
    if from.increment != to.increment {
        clauses.push(format!("INCREMENT BY {}", to.increment));
    }
    // A type change resets bounds that sat at the old type's limits.
    if type_changed || from.minimum_value != to.minimum_value {
        clauses.push(format!("MINVALUE {}", to.minimum_value));
    }
    if type_changed || from.maximum_value != to.maximum_value {
        clauses.push(format!("MAXVALUE {}", to.maximum_value));
    }
    if from.start_value != to.start_value {
        clauses.push(format!("START WITH {}", to.start_value));
    }
    if from.cache_size != to.cache_size {
        clauses.push(format!("CACHE {}", to.cache_size));
    }
    if from.cycle_option != to.cycle_option {
        clauses.push(if to.cycle_option { "CYCLE" } else { "NO CYCLE" }.to_string());
    }
    Ok(format!(
        "ALTER SEQUENCE {} {}",
        qualified(&to.schema, &to.name),
        clauses.join(" ")
    ))
}

impl ObjectChange for SequenceChange {
    type Object = Sequence;

    fn action(&self) -> Action {
        match self {
            SequenceChange::Create(_) => Action::Create,
            SequenceChange::Drop(_) => Action::Drop,
            SequenceChange::Alter { .. } => Action::Alter,
        }
    }

    fn before(&self) -> Option<&Sequence> {
        match self {
            SequenceChange::Create(_) => None,
            SequenceChange::Drop(s) | SequenceChange::Alter { from: s, .. } => Some(s),
        }
    }

    fn after(&self) -> Option<&Sequence> {
        match self {
            SequenceChange::Drop(_) => None,
            SequenceChange::Create(s) | SequenceChange::Alter { to: s, .. } => Some(s),
        }
    }

    fn subject(&self) -> &Sequence {
        match self {
            SequenceChange::Create(s) | SequenceChange::Drop(s) => s,
            SequenceChange::Alter { to, .. } => to,
        }
    }

    fn to_sql(&self) -> Result<String, ValidationError> {
        match self {
            SequenceChange::Create(s) => create_sql(s),
            SequenceChange::Drop(s) => Ok(format!("DROP SEQUENCE {}", qualified(&s.schema, &s.name))),
            SequenceChange::Alter {
                from,
                to,
                alteration,
            } => {
                let name = qualified(&to.schema, &to.name);
                match alteration {
                    SequenceAlteration::Options => alter_options_sql(from, to),
                    SequenceAlteration::SetPersistence(Persistence::Permanent) => {
                        Ok(format!("ALTER SEQUENCE {} SET LOGGED", name))
                    }
                    SequenceAlteration::SetPersistence(Persistence::Unlogged) => {
                        Ok(format!("ALTER SEQUENCE {} SET UNLOGGED", name))
                    }
                    SequenceAlteration::SetPersistence(Persistence::Temporary) => {
                        Err(to.invalid("a sequence cannot be made temporary after creation"))
                    }
                    SequenceAlteration::ChangeOwner(owner) => {
                        Ok(format!("ALTER SEQUENCE {} OWNER TO {}", name, Ident(owner)))
                    }
                    SequenceAlteration::SetOwnedBy(Some(owner)) => Ok(format!(
                        "ALTER SEQUENCE {} OWNED BY {}.{}",
                        name,
                        qualified(&owner.table_schema, &owner.table_name),
                        Ident(&owner.column)
                    )),
                    SequenceAlteration::SetOwnedBy(None) => {
                        Ok(format!("ALTER SEQUENCE {} OWNED BY NONE", name))
                    }
                }
            }
        }
    }
}

impl fmt::Display for SequenceChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceChange::Alter {
                from,
                to,
                alteration,
            } => {
                let detail = match alteration {
                    SequenceAlteration::Options => "options".to_string(),
                    SequenceAlteration::SetPersistence(p) => {
                        format!("persistence {} -> {}", from.persistence.code(), p.code())
                    }
                    SequenceAlteration::ChangeOwner(owner) => {
                        format!("owner {} -> {}", from.owner, owner)
                    }
                    SequenceAlteration::SetOwnedBy(Some(owner)) => format!(
                        "owned by -> {}.{}.{}",
                        owner.table_schema, owner.table_name, owner.column
                    ),
                    SequenceAlteration::SetOwnedBy(None) => "owned by -> none".to_string(),
                };
                describe(f, Action::Alter, to, Some(&detail))
            }
            _ => describe(f, self.action(), self.subject(), None),
        }
    }
}
