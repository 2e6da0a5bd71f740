use super::{Action, ObjectChange, describe, replace_sql};
use crate::Ident;
use crate::sql::{qualified, spaced_qualified};
use pgbranch_catalog::{CompositeType, TypeAttribute, ValidationError};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TypeAlteration {
    AddAttribute(TypeAttribute),
    DropAttribute(String),
    AlterAttributeType(TypeAttribute),
    ChangeOwner(String),
}

impl fmt::Display for TypeAlteration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeAlteration::AddAttribute(attr) => write!(f, "+ {}: {}", attr.name, attr.data_type),
            TypeAlteration::DropAttribute(name) => write!(f, "- {}", name),
            TypeAlteration::AlterAttributeType(attr) => {
                write!(f, "{} -> {}", attr.name, attr.data_type)
            }
            TypeAlteration::ChangeOwner(owner) => write!(f, "owner -> {}", owner),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompositeTypeChange {
    Create(CompositeType),
    Drop(CompositeType),
    Alter {
        from: CompositeType,
        to: CompositeType,
        alteration: TypeAlteration,
    },
    /// Structural flags, options, or partition bound changed.
    Replace {
        from: CompositeType,
        to: CompositeType,
    },
}

fn attribute_sql(attr: &TypeAttribute) -> String {
    match &attr.collation {
        Some(collation) => format!(
            "{} {} COLLATE {}",
            Ident(&attr.name),
            attr.data_type,
            Ident(collation)
        ),
        None => format!("{} {}", Ident(&attr.name), attr.data_type),
    }
}

fn create_sql(ty: &CompositeType) -> String {
    let attributes: Vec<String> = ty.attributes.iter().map(attribute_sql).collect();
    format!(
        "CREATE TYPE {} AS ({})",
        spaced_qualified(&ty.schema, &ty.name),
        attributes.join(", ")
    )
}

fn drop_sql(ty: &CompositeType) -> String {
    format!("DROP TYPE {}", qualified(&ty.schema, &ty.name))
}

impl ObjectChange for CompositeTypeChange {
    type Object = CompositeType;

    fn action(&self) -> Action {
        match self {
            CompositeTypeChange::Create(_) => Action::Create,
            CompositeTypeChange::Drop(_) => Action::Drop,
            CompositeTypeChange::Alter { .. } => Action::Alter,
            CompositeTypeChange::Replace { .. } => Action::Replace,
        }
    }

    fn before(&self) -> Option<&CompositeType> {
        match self {
            CompositeTypeChange::Create(_) => None,
            CompositeTypeChange::Drop(t)
            | CompositeTypeChange::Alter { from: t, .. }
            | CompositeTypeChange::Replace { from: t, .. } => Some(t),
        }
    }

    fn after(&self) -> Option<&CompositeType> {
        match self {
            CompositeTypeChange::Drop(_) => None,
            CompositeTypeChange::Create(t)
            | CompositeTypeChange::Alter { to: t, .. }
            | CompositeTypeChange::Replace { to: t, .. } => Some(t),
        }
    }

    fn subject(&self) -> &CompositeType {
        match self {
            CompositeTypeChange::Create(t) | CompositeTypeChange::Drop(t) => t,
            CompositeTypeChange::Alter { to, .. } | CompositeTypeChange::Replace { to, .. } => to,
        }
    }

    fn to_sql(&self) -> Result<String, ValidationError> {
        Ok(match self {
            CompositeTypeChange::Create(t) => create_sql(t),
            CompositeTypeChange::Drop(t) => drop_sql(t),
            CompositeTypeChange::Replace { from, to } => {
                replace_sql(drop_sql(from), create_sql(to))
            }
            CompositeTypeChange::Alter { to, alteration, .. } => {
                let name = qualified(&to.schema, &to.name);
                match alteration {
                    TypeAlteration::AddAttribute(attr) => {
                        format!("ALTER TYPE {} ADD ATTRIBUTE {}", name, attribute_sql(attr))
                    }
                    TypeAlteration::DropAttribute(attr) => {
                        format!("ALTER TYPE {} DROP ATTRIBUTE {}", name, Ident(attr))
                    }
                    TypeAlteration::AlterAttributeType(attr) => format!(
                        "ALTER TYPE {} ALTER ATTRIBUTE {} TYPE {}",
                        name,
                        Ident(&attr.name),
                        attr.data_type
                    ),
                    TypeAlteration::ChangeOwner(owner) => {
                        format!("ALTER TYPE {} OWNER TO {}", name, Ident(owner))
                    }
                }
            }
        })
    }
}

impl fmt::Display for CompositeTypeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompositeTypeChange::Alter { to, alteration, .. } => {
                describe(f, Action::Alter, to, Some(alteration))
            }
            _ => describe(f, self.action(), self.subject(), None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::fixtures::composite_type;

    #[test]
    fn test_create_uses_spaced_name() {
        let change = CompositeTypeChange::Create(composite_type("public", "address"));
        assert_eq!(
            change.to_sql().unwrap(),
            "CREATE TYPE public . address AS (street text, zip integer)"
        );
    }

    #[test]
    fn test_create_without_attributes() {
        let ty = CompositeType {
            attributes: Vec::new(),
            ..composite_type("s", "n")
        };
        assert_eq!(
            CompositeTypeChange::Create(ty).to_sql().unwrap(),
            "CREATE TYPE s . n AS ()"
        );
    }

    #[test]
    fn test_attribute_collation() {
        let mut ty = composite_type("public", "label");
        ty.attributes = vec![TypeAttribute {
            name: "text".to_string(),
            data_type: "text".to_string(),
            collation: Some("C".to_string()),
        }];
        assert_eq!(
            CompositeTypeChange::Create(ty).to_sql().unwrap(),
            "CREATE TYPE public . label AS (text text COLLATE \"C\")"
        );
    }

    #[test]
    fn test_attribute_alterations() {
        let from = composite_type("public", "address");
        let to = from.clone();
        let render = |alteration| {
            CompositeTypeChange::Alter {
                from: from.clone(),
                to: to.clone(),
                alteration,
            }
            .to_sql()
            .unwrap()
        };
        assert_eq!(
            render(TypeAlteration::AddAttribute(TypeAttribute {
                name: "city".to_string(),
                data_type: "text".to_string(),
                collation: None,
            })),
            "ALTER TYPE public.address ADD ATTRIBUTE city text"
        );
        assert_eq!(
            render(TypeAlteration::DropAttribute("zip".to_string())),
            "ALTER TYPE public.address DROP ATTRIBUTE zip"
        );
        assert_eq!(
            render(TypeAlteration::AlterAttributeType(TypeAttribute {
                name: "zip".to_string(),
                data_type: "bigint".to_string(),
                collation: None,
            })),
            "ALTER TYPE public.address ALTER ATTRIBUTE zip TYPE bigint"
        );
    }

    #[test]
    fn test_drop_display() {
        let change = CompositeTypeChange::Drop(composite_type("public", "address"));
        assert_eq!(change.to_sql().unwrap(), "DROP TYPE public.address");
        assert_eq!(change.to_string(), "- composite type public.address");
    }
}
