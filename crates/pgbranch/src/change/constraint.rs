use super::{Action, ObjectChange, describe, replace_sql};
use crate::Ident;
use crate::sql::{ident_list, qualified, spaced_qualified};
use pgbranch_catalog::{
    CatalogObject, ColumnRef, Constraint, ConstraintType, ForeignKeyAction, MatchType,
    ValidationError,
};
use std::fmt;

/// Constraints have no ALTER path for their definition: any difference other
/// than the owner is a replace.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintChange {
    Create(Constraint),
    Drop(Constraint),
    Replace { from: Constraint, to: Constraint },
}

fn column_names(columns: &[ColumnRef]) -> String {
    ident_list(columns.iter().map(|c| c.name.as_str()))
}

fn body_sql(c: &Constraint) -> Result<String, ValidationError> {
    let needs_keys = || {
        if c.key_columns.is_empty() {
            Err(c.invalid("constraint has no key columns"))
        } else {
            Ok(column_names(&c.key_columns))
        }
    };

    let mut sql = match c.constraint_type {
        ConstraintType::Check => {
            let expr = c
                .check_expression
                .as_deref()
                .ok_or_else(|| c.invalid("check constraint has no expression"))?;
            let mut sql = format!("CHECK ({})", expr);
            if c.no_inherit {
                sql.push_str(" NO INHERIT");
            }
            sql
        }
        ConstraintType::PrimaryKey => format!("PRIMARY KEY ({})", needs_keys()?),
        ConstraintType::Unique => format!("UNIQUE ({})", needs_keys()?),
        ConstraintType::ForeignKey => {
            let keys = needs_keys()?;
            let target = c
                .foreign_key
                .as_ref()
                .ok_or_else(|| c.invalid("foreign key has no target"))?;
            if target.columns.is_empty() {
                return Err(c.invalid("foreign key has no referenced columns"));
            }
            let mut sql = format!(
                "FOREIGN KEY ({}) REFERENCES {} ({})",
                keys,
                qualified(&target.schema, &target.table),
                column_names(&target.columns)
            );
            match target.match_type {
                MatchType::Simple => {}
                MatchType::Full => sql.push_str(" MATCH FULL"),
                MatchType::Partial => sql.push_str(" MATCH PARTIAL"),
            }
            if target.on_update != ForeignKeyAction::NoAction {
                sql.push_str(&format!(" ON UPDATE {}", target.on_update.to_sql()));
            }
            if target.on_delete != ForeignKeyAction::NoAction {
                sql.push_str(&format!(" ON DELETE {}", target.on_delete.to_sql()));
            }
            sql
        }
        ConstraintType::Exclusion => {
            return Err(c.invalid("exclusion constraints carry no operator list to render"));
        }
    };

    if c.deferrable {
        sql.push_str(" DEFERRABLE");
        if c.initially_deferred {
            sql.push_str(" INITIALLY DEFERRED");
        }
    }
    if !c.validated {
        sql.push_str(" NOT VALID");
    }
    Ok(sql)
}

fn create_sql(c: &Constraint) -> Result<String, ValidationError> {
    Ok(format!(
        "ALTER TABLE {} ADD CONSTRAINT {} {}",
        spaced_qualified(&c.table_schema, &c.table_name),
        Ident(&c.name),
        body_sql(c)?
    ))
}

fn drop_sql(c: &Constraint) -> String {
    format!(
        "ALTER TABLE {} DROP CONSTRAINT {}",
        spaced_qualified(&c.table_schema, &c.table_name),
        Ident(&c.name)
    )
}

impl ObjectChange for ConstraintChange {
    type Object = Constraint;

    fn action(&self) -> Action {
        match self {
            ConstraintChange::Create(_) => Action::Create,
            ConstraintChange::Drop(_) => Action::Drop,
            ConstraintChange::Replace { .. } => Action::Replace,
        }
    }

    fn before(&self) -> Option<&Constraint> {
        match self {
            ConstraintChange::Create(_) => None,
            ConstraintChange::Drop(c) | ConstraintChange::Replace { from: c, .. } => Some(c),
        }
    }

    fn after(&self) -> Option<&Constraint> {
        match self {
            ConstraintChange::Drop(_) => None,
            ConstraintChange::Create(c) | ConstraintChange::Replace { to: c, .. } => Some(c),
        }
    }

    fn subject(&self) -> &Constraint {
        match self {
            ConstraintChange::Create(c) | ConstraintChange::Drop(c) => c,
            ConstraintChange::Replace { to, .. } => to,
        }
    }

    fn to_sql(&self) -> Result<String, ValidationError> {
        match self {
            ConstraintChange::Create(c) => create_sql(c),
            ConstraintChange::Drop(c) => Ok(drop_sql(c)),
            ConstraintChange::Replace { from, to } => {
                Ok(replace_sql(drop_sql(from), create_sql(to)?))
            }
        }
    }
}

impl fmt::Display for ConstraintChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        describe(f, self.action(), self.subject(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::fixtures::{check_constraint, foreign_key, primary_key};

    #[test]
    fn test_drop_uses_spaced_table_name() {
        let change = ConstraintChange::Drop(check_constraint(
            "public",
            "test_table",
            "test_constraint",
        ));
        assert_eq!(
            change.to_sql().unwrap(),
            "ALTER TABLE public . test_table DROP CONSTRAINT test_constraint"
        );
        assert_eq!(
            change.to_string(),
            "- constraint test_constraint on public.test_table"
        );
    }

    #[test]
    fn test_create_check() {
        let mut c = check_constraint("public", "t", "positive_id");
        c.no_inherit = true;
        c.validated = false;
        assert_eq!(
            ConstraintChange::Create(c).to_sql().unwrap(),
            "ALTER TABLE public . t ADD CONSTRAINT positive_id CHECK ((id > 0)) NO INHERIT NOT VALID"
        );
    }

    #[test]
    fn test_create_primary_key_and_unique() {
        let mut pk = primary_key("public", "post");
        pk.key_columns = vec![ColumnRef::new(1, "id"), ColumnRef::new(3, "tenant")];
        assert_eq!(
            ConstraintChange::Create(pk).to_sql().unwrap(),
            "ALTER TABLE public . post ADD CONSTRAINT post_pkey PRIMARY KEY (id, tenant)"
        );

        let unique = Constraint {
            name: "post_slug_key".to_string(),
            constraint_type: ConstraintType::Unique,
            key_columns: vec![ColumnRef::new(2, "slug")],
            deferrable: true,
            initially_deferred: true,
            ..primary_key("public", "post")
        };
        assert_eq!(
            ConstraintChange::Create(unique).to_sql().unwrap(),
            "ALTER TABLE public . post ADD CONSTRAINT post_slug_key UNIQUE (slug) \
             DEFERRABLE INITIALLY DEFERRED"
        );
    }

    #[test]
    fn test_create_foreign_key() {
        let mut fk = foreign_key("public", "comment", "comment_post_fkey", "public", "post");
        if let Some(target) = fk.foreign_key.as_mut() {
            target.on_delete = ForeignKeyAction::Cascade;
            target.match_type = MatchType::Full;
        }
        assert_eq!(
            ConstraintChange::Create(fk).to_sql().unwrap(),
            "ALTER TABLE public . comment ADD CONSTRAINT comment_post_fkey \
             FOREIGN KEY (parent_id) REFERENCES public.post (id) MATCH FULL ON DELETE CASCADE"
        );
    }

    #[test]
    fn test_missing_fields_are_validation_errors() {
        let mut check = check_constraint("public", "t", "c");
        check.check_expression = None;
        assert!(ConstraintChange::Create(check).to_sql().is_err());

        let mut pk = primary_key("public", "t");
        pk.key_columns.clear();
        let err = ConstraintChange::Create(pk).to_sql().unwrap_err();
        assert!(err.to_string().contains("no key columns"));

        let exclusion = Constraint {
            constraint_type: ConstraintType::Exclusion,
            ..primary_key("public", "t")
        };
        assert!(ConstraintChange::Create(exclusion).to_sql().is_err());
    }

    #[test]
    fn test_replace_is_atomic_on_error() {
        let from = check_constraint("public", "t", "c");
        let mut to = from.clone();
        to.check_expression = None;
        assert!(ConstraintChange::Replace { from, to }.to_sql().is_err());
    }
}
