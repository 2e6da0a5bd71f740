use super::{Action, ObjectChange, describe, replace_sql};
use crate::Ident;
use pgbranch_catalog::{Schema, ValidationError};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaChange {
    Create(Schema),
    Drop(Schema),
    ChangeOwner { from: Schema, to: Schema },
    /// Drop and re-create; the owner is not carried over.
    Replace { from: Schema, to: Schema },
}

impl SchemaChange {
    fn create_sql(schema: &Schema) -> String {
        format!("CREATE SCHEMA {}", Ident(&schema.name))
    }

    fn drop_sql(schema: &Schema) -> String {
        format!("DROP SCHEMA {}", Ident(&schema.name))
    }
}

impl ObjectChange for SchemaChange {
    type Object = Schema;

    fn action(&self) -> Action {
        match self {
            SchemaChange::Create(_) => Action::Create,
            SchemaChange::Drop(_) => Action::Drop,
            SchemaChange::ChangeOwner { .. } => Action::Alter,
            SchemaChange::Replace { .. } => Action::Replace,
        }
    }

    fn before(&self) -> Option<&Schema> {
        match self {
            SchemaChange::Create(_) => None,
            SchemaChange::Drop(s) => Some(s),
            SchemaChange::ChangeOwner { from, .. } | SchemaChange::Replace { from, .. } => {
                Some(from)
            }
        }
    }

    fn after(&self) -> Option<&Schema> {
        match self {
            SchemaChange::Create(s) => Some(s),
            SchemaChange::Drop(_) => None,
            SchemaChange::ChangeOwner { to, .. } | SchemaChange::Replace { to, .. } => Some(to),
        }
    }

    fn subject(&self) -> &Schema {
        match self {
            SchemaChange::Create(s) | SchemaChange::Drop(s) => s,
            SchemaChange::ChangeOwner { to, .. } | SchemaChange::Replace { to, .. } => to,
        }
    }

    fn to_sql(&self) -> Result<String, ValidationError> {
        Ok(match self {
            SchemaChange::Create(s) => Self::create_sql(s),
            SchemaChange::Drop(s) => Self::drop_sql(s),
            SchemaChange::ChangeOwner { to, .. } => {
                format!("ALTER SCHEMA {} OWNER TO {}", Ident(&to.name), Ident(&to.owner))
            }
            SchemaChange::Replace { from, to } => {
                replace_sql(Self::drop_sql(from), Self::create_sql(to))
            }
        })
    }
}

impl fmt::Display for SchemaChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaChange::ChangeOwner { from, to } => {
                let detail = format!("owner {} -> {}", from.owner, to.owner);
                describe(f, self.action(), to, Some(&detail))
            }
            _ => describe(f, self.action(), self.subject(), None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::fixtures::schema;

    #[test]
    fn test_create_and_drop() {
        let s = schema("app", "postgres");
        assert_eq!(SchemaChange::Create(s.clone()).to_sql().unwrap(), "CREATE SCHEMA app");
        assert_eq!(SchemaChange::Drop(s).to_sql().unwrap(), "DROP SCHEMA app");
    }

    #[test]
    fn test_owner_change() {
        let change = SchemaChange::ChangeOwner {
            from: schema("test_schema", "old_owner"),
            to: schema("test_schema", "new_owner"),
        };
        assert_eq!(
            change.to_sql().unwrap(),
            "ALTER SCHEMA test_schema OWNER TO new_owner"
        );
        assert_eq!(change.to_string(), "~ schema test_schema: owner old_owner -> new_owner");
    }

    #[test]
    fn test_forced_replace_keeps_internal_separator() {
        let s = schema("test_schema", "same_owner");
        let change = SchemaChange::Replace {
            from: s.clone(),
            to: s,
        };
        assert_eq!(
            change.to_sql().unwrap(),
            "DROP SCHEMA test_schema;\nCREATE SCHEMA test_schema"
        );
        assert_eq!(change.action(), Action::Replace);
    }

    #[test]
    fn test_quotes_unusual_names() {
        let change = SchemaChange::Create(schema("Tenant One", "postgres"));
        assert_eq!(change.to_sql().unwrap(), "CREATE SCHEMA \"Tenant One\"");
        assert_eq!(change.to_string(), "+ schema Tenant One");
    }
}
