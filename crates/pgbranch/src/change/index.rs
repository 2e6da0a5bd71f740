use super::{Action, ObjectChange, describe, replace_sql};
use crate::sql::qualified;
use pgbranch_catalog::{CatalogObject, Index, ValidationError};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum IndexChange {
    Create(Index),
    Drop(Index),
    Replace { from: Index, to: Index },
}

fn create_sql(index: &Index) -> Result<String, ValidationError> {
    let definition = index.definition.trim().trim_end_matches(';');
    if definition.is_empty() {
        return Err(index.invalid("index has no definition"));
    }
    Ok(definition.to_string())
}

fn drop_sql(index: &Index) -> String {
    format!("DROP INDEX {}", qualified(&index.schema, &index.name))
}

impl ObjectChange for IndexChange {
    type Object = Index;

    fn action(&self) -> Action {
        match self {
            IndexChange::Create(_) => Action::Create,
            IndexChange::Drop(_) => Action::Drop,
            IndexChange::Replace { .. } => Action::Replace,
        }
    }

    fn before(&self) -> Option<&Index> {
        match self {
            IndexChange::Create(_) => None,
            IndexChange::Drop(i) | IndexChange::Replace { from: i, .. } => Some(i),
        }
    }

    fn after(&self) -> Option<&Index> {
        match self {
            IndexChange::Drop(_) => None,
            IndexChange::Create(i) | IndexChange::Replace { to: i, .. } => Some(i),
        }
    }

    fn subject(&self) -> &Index {
        match self {
            IndexChange::Create(i) | IndexChange::Drop(i) => i,
            IndexChange::Replace { to, .. } => to,
        }
    }

    fn to_sql(&self) -> Result<String, ValidationError> {
        match self {
            IndexChange::Create(i) => create_sql(i),
            IndexChange::Drop(i) => Ok(drop_sql(i)),
            IndexChange::Replace { from, to } => Ok(replace_sql(drop_sql(from), create_sql(to)?)),
        }
    }
}

impl fmt::Display for IndexChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        describe(f, self.action(), self.subject(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::fixtures::index;

    #[test]
    fn test_create_renders_definition() {
        let change = IndexChange::Create(index("public", "post", "post_created_idx"));
        assert_eq!(
            change.to_sql().unwrap(),
            "CREATE INDEX post_created_idx ON public.post USING btree (id)"
        );
        assert_eq!(change.to_string(), "+ index post_created_idx on public.post");
    }

    #[test]
    fn test_drop_and_replace() {
        let from = index("public", "post", "post_idx");
        let to = Index {
            definition: "CREATE UNIQUE INDEX post_idx ON public.post USING btree (id)".to_string(),
            is_unique: true,
            ..from.clone()
        };
        assert_eq!(
            IndexChange::Drop(from.clone()).to_sql().unwrap(),
            "DROP INDEX public.post_idx"
        );
        assert_eq!(
            IndexChange::Replace { from, to }.to_sql().unwrap(),
            "DROP INDEX public.post_idx;\n\
             CREATE UNIQUE INDEX post_idx ON public.post USING btree (id)"
        );
    }

    #[test]
    fn test_empty_definition_is_validation_error() {
        let mut i = index("public", "post", "post_idx");
        i.definition = "  ".to_string();
        assert!(IndexChange::Create(i).to_sql().is_err());
    }
}
