use super::{Action, ObjectChange, describe, replace_sql};
use crate::Ident;
use crate::sql::qualified;
use pgbranch_catalog::{Domain, ValidationError};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum DomainAlteration {
    SetDefault(String),
    DropDefault,
    SetNotNull,
    DropNotNull,
    ChangeOwner(String),
}

impl fmt::Display for DomainAlteration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainAlteration::SetDefault(value) => write!(f, "default {}", value),
            DomainAlteration::DropDefault => write!(f, "drop default"),
            DomainAlteration::SetNotNull => write!(f, "not null"),
            DomainAlteration::DropNotNull => write!(f, "nullable"),
            DomainAlteration::ChangeOwner(owner) => write!(f, "owner -> {}", owner),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DomainChange {
    Create(Domain),
    Drop(Domain),
    Alter {
        from: Domain,
        to: Domain,
        alteration: DomainAlteration,
    },
    /// Base type, type modifier, array dimensions, or collation changed.
    Replace { from: Domain, to: Domain },
}

fn create_sql(domain: &Domain) -> String {
    let mut sql = format!(
        "CREATE DOMAIN {} AS {}",
        qualified(&domain.schema, &domain.name),
        domain.base_type
    );
    if let Some(collation) = &domain.collation {
        sql.push_str(&format!(" COLLATE {}", Ident(collation)));
    }
    if let Some(default) = &domain.default_value {
        sql.push_str(&format!(" DEFAULT {}", default));
    }
    if domain.not_null {
        sql.push_str(" NOT NULL");
    }
    sql
}

fn drop_sql(domain: &Domain) -> String {
    format!("DROP DOMAIN {}", qualified(&domain.schema, &domain.name))
}

impl ObjectChange for DomainChange {
    type Object = Domain;

    fn action(&self) -> Action {
        match self {
            DomainChange::Create(_) => Action::Create,
            DomainChange::Drop(_) => Action::Drop,
            DomainChange::Alter { .. } => Action::Alter,
            DomainChange::Replace { .. } => Action::Replace,
        }
    }

    fn before(&self) -> Option<&Domain> {
        match self {
            DomainChange::Create(_) => None,
            DomainChange::Drop(d)
            | DomainChange::Alter { from: d, .. }
            | DomainChange::Replace { from: d, .. } => Some(d),
        }
    }

    fn after(&self) -> Option<&Domain> {
        match self {
            DomainChange::Drop(_) => None,
            DomainChange::Create(d)
            | DomainChange::Alter { to: d, .. }
            | DomainChange::Replace { to: d, .. } => Some(d),
        }
    }

    fn subject(&self) -> &Domain {
        match self {
            DomainChange::Create(d) | DomainChange::Drop(d) => d,
            DomainChange::Alter { to, .. } | DomainChange::Replace { to, .. } => to,
        }
    }

    fn to_sql(&self) -> Result<String, ValidationError> {
        Ok(match self {
            DomainChange::Create(d) => create_sql(d),
            DomainChange::Drop(d) => drop_sql(d),
            DomainChange::Replace { from, to } => replace_sql(drop_sql(from), create_sql(to)),
            DomainChange::Alter { to, alteration, .. } => {
                let name = qualified(&to.schema, &to.name);
                match alteration {
                    DomainAlteration::SetDefault(value) => {
                        format!("ALTER DOMAIN {} SET DEFAULT {}", name, value)
                    }
                    DomainAlteration::DropDefault => format!("ALTER DOMAIN {} DROP DEFAULT", name),
                    DomainAlteration::SetNotNull => format!("ALTER DOMAIN {} SET NOT NULL", name),
                    DomainAlteration::DropNotNull => {
                        format!("ALTER DOMAIN {} DROP NOT NULL", name)
                    }
                    DomainAlteration::ChangeOwner(owner) => {
                        format!("ALTER DOMAIN {} OWNER TO {}", name, Ident(owner))
                    }
                }
            }
        })
    }
}

impl fmt::Display for DomainChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainChange::Alter { to, alteration, .. } => {
                describe(f, Action::Alter, to, Some(alteration))
            }
            _ => describe(f, self.action(), self.subject(), None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::fixtures::domain;

    #[test]
    fn test_create_minimal() {
        let change = DomainChange::Create(domain("public", "email"));
        assert_eq!(change.to_sql().unwrap(), "CREATE DOMAIN public.email AS text");
    }

    #[test]
    fn test_create_with_all_clauses() {
        let d = Domain {
            collation: Some("C".to_string()),
            default_bin: Some("{CONST ...}".to_string()),
            default_value: Some("'nobody@example.com'::text".to_string()),
            not_null: true,
            ..domain("public", "email")
        };
        assert_eq!(
            DomainChange::Create(d).to_sql().unwrap(),
            "CREATE DOMAIN public.email AS text COLLATE \"C\" \
             DEFAULT 'nobody@example.com'::text NOT NULL"
        );
    }

    #[test]
    fn test_alterations() {
        let from = domain("app", "positive");
        let to = from.clone();
        let render = |alteration| {
            DomainChange::Alter {
                from: from.clone(),
                to: to.clone(),
                alteration,
            }
            .to_sql()
            .unwrap()
        };
        assert_eq!(
            render(DomainAlteration::SetDefault("1".to_string())),
            "ALTER DOMAIN app.positive SET DEFAULT 1"
        );
        assert_eq!(
            render(DomainAlteration::DropDefault),
            "ALTER DOMAIN app.positive DROP DEFAULT"
        );
        assert_eq!(
            render(DomainAlteration::SetNotNull),
            "ALTER DOMAIN app.positive SET NOT NULL"
        );
        assert_eq!(
            render(DomainAlteration::DropNotNull),
            "ALTER DOMAIN app.positive DROP NOT NULL"
        );
        assert_eq!(
            render(DomainAlteration::ChangeOwner("app_owner".to_string())),
            "ALTER DOMAIN app.positive OWNER TO app_owner"
        );
    }

    #[test]
    fn test_replace() {
        let from = domain("public", "code");
        let to = Domain {
            base_type: "character varying(8)".to_string(),
            type_modifier: 12,
            ..from.clone()
        };
        assert_eq!(
            DomainChange::Replace { from, to }.to_sql().unwrap(),
            "DROP DOMAIN public.code;\nCREATE DOMAIN public.code AS character varying(8)"
        );
    }
}
