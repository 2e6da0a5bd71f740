use super::{Action, ObjectChange, describe};
use crate::Ident;
use crate::sql::qualified;
use pgbranch_catalog::{
    CatalogObject, Column, ColumnIdentity, Persistence, Table, ValidationError,
};
use std::fmt;

/// An in-place change to an existing table.
#[derive(Debug, Clone, PartialEq)]
pub enum TableAlteration {
    AddColumn(Column),
    DropColumn(String),
    AlterColumnType {
        name: String,
        from: String,
        to: String,
    },
    /// `from`/`to` are the `NOT NULL` flags.
    AlterColumnNullable { name: String, from: bool, to: bool },
    AlterColumnDefault {
        name: String,
        from: Option<String>,
        to: Option<String>,
    },
    AlterColumnIdentity {
        name: String,
        from: Option<ColumnIdentity>,
        to: Option<ColumnIdentity>,
    },
    /// Storage parameters to set, as `key=value`.
    SetOptions(Vec<String>),
    /// Storage parameter keys to reset.
    ResetOptions(Vec<String>),
    SetRowSecurity(bool),
    SetPersistence(Persistence),
    ChangeOwner(String),
}

impl fmt::Display for TableAlteration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableAlteration::AddColumn(col) => {
                let not_null = if col.not_null { " (not null)" } else { "" };
                write!(f, "+ {}: {}{}", col.name, col.data_type, not_null)
            }
            TableAlteration::DropColumn(name) => write!(f, "- {}", name),
            TableAlteration::AlterColumnType { name, from, to } => {
                write!(f, "~ {}: {} -> {}", name, from, to)
            }
            TableAlteration::AlterColumnNullable { name, from, to } => {
                let label = |not_null: bool| if not_null { "not null" } else { "nullable" };
                write!(f, "~ {}: {} -> {}", name, label(*from), label(*to))
            }
            TableAlteration::AlterColumnDefault { name, from, to } => {
                let from = from.as_deref().unwrap_or("(none)");
                let to = to.as_deref().unwrap_or("(none)");
                write!(f, "~ {} default: {} -> {}", name, from, to)
            }
            TableAlteration::AlterColumnIdentity { name, from, to } => {
                let label = |identity: &Option<ColumnIdentity>| {
                    identity.map(|i| i.keyword()).unwrap_or("(none)")
                };
                write!(f, "~ {} identity: {} -> {}", name, label(from), label(to))
            }
            TableAlteration::SetOptions(options) => write!(f, "set ({})", options.join(", ")),
            TableAlteration::ResetOptions(keys) => write!(f, "reset ({})", keys.join(", ")),
            TableAlteration::SetRowSecurity(enabled) => {
                write!(f, "row security {}", if *enabled { "on" } else { "off" })
            }
            TableAlteration::SetPersistence(p) => write!(f, "persistence -> {}", p.code()),
            TableAlteration::ChangeOwner(owner) => write!(f, "owner -> {}", owner),
        }
    }
}

/// Tables are never replaced: a drop would take the data with it.
#[derive(Debug, Clone, PartialEq)]
pub enum TableChange {
    Create(Table),
    Drop(Table),
    Alter {
        from: Table,
        to: Table,
        alteration: TableAlteration,
    },
}

fn column_sql(col: &Column) -> String {
    let not_null = if col.not_null { " NOT NULL" } else { "" };
    let default = col
        .default
        .as_ref()
        .map(|d| format!(" DEFAULT {}", d))
        .unwrap_or_default();
    let identity = col
        .identity
        .map(|i| format!(" GENERATED {} AS IDENTITY", i.keyword()))
        .unwrap_or_default();
    format!(
        "{} {}{}{}{}",
        Ident(&col.name),
        col.data_type,
        not_null,
        default,
        identity
    )
}

fn create_sql(table: &Table) -> Result<String, ValidationError> {
    if table.is_partition {
        return Err(table.invalid("partitions are created with their parent"));
    }
    let prefix = match table.persistence {
        Persistence::Permanent => "",
        Persistence::Unlogged => "UNLOGGED ",
        Persistence::Temporary => {
            return Err(table.invalid("temporary tables are not part of a schema"));
        }
    };
    let name = qualified(&table.schema, &table.name);

    let mut columns: Vec<&Column> = table.columns.iter().collect();
    columns.sort_by_key(|c| c.position);
    let columns: Vec<String> = columns.into_iter().map(column_sql).collect();

    let mut sql = format!("CREATE {}TABLE {} ({})", prefix, name, columns.join(", "));
    if !table.options.is_empty() {
        sql.push_str(&format!(" WITH ({})", table.options.join(", ")));
    }
    if table.row_security {
        sql.push_str(&format!(";\nALTER TABLE {} ENABLE ROW LEVEL SECURITY", name));
    }
    Ok(sql)
}

fn alter_sql(table: &Table, alteration: &TableAlteration) -> Result<String, ValidationError> {
    let table_name = qualified(&table.schema, &table.name);
    let action = match alteration {
        TableAlteration::AddColumn(col) => format!("ADD COLUMN {}", column_sql(col)),
        TableAlteration::DropColumn(column) => format!("DROP COLUMN {}", Ident(column)),
        TableAlteration::AlterColumnType { name, to, .. } => format!(
            "ALTER COLUMN {} TYPE {} USING {}::{}",
            Ident(name),
            to,
            Ident(name),
            to
        ),
        TableAlteration::AlterColumnNullable { name, to, .. } => {
            if *to {
                format!("ALTER COLUMN {} SET NOT NULL", Ident(name))
            } else {
                format!("ALTER COLUMN {} DROP NOT NULL", Ident(name))
            }
        }
        TableAlteration::AlterColumnDefault { name, to, .. } => match to {
            Some(default) => format!("ALTER COLUMN {} SET DEFAULT {}", Ident(name), default),
            None => format!("ALTER COLUMN {} DROP DEFAULT", Ident(name)),
        },
        TableAlteration::AlterColumnIdentity { name, from, to } => match (from, to) {
            (_, None) => format!("ALTER COLUMN {} DROP IDENTITY", Ident(name)),
            (None, Some(identity)) => format!(
                "ALTER COLUMN {} ADD GENERATED {} AS IDENTITY",
                Ident(name),
                identity.keyword()
            ),
            (Some(_), Some(identity)) => {
                format!("ALTER COLUMN {} SET GENERATED {}", Ident(name), identity.keyword())
            }
        },
        TableAlteration::SetOptions(options) => format!("SET ({})", options.join(", ")),
        TableAlteration::ResetOptions(keys) => format!("RESET ({})", keys.join(", ")),
        TableAlteration::SetRowSecurity(true) => "ENABLE ROW LEVEL SECURITY".to_string(),
        TableAlteration::SetRowSecurity(false) => "DISABLE ROW LEVEL SECURITY".to_string(),
        TableAlteration::SetPersistence(Persistence::Permanent) => "SET LOGGED".to_string(),
        TableAlteration::SetPersistence(Persistence::Unlogged) => "SET UNLOGGED".to_string(),
        TableAlteration::SetPersistence(Persistence::Temporary) => {
            return Err(table.invalid("a table cannot be made temporary after creation"));
        }
        TableAlteration::ChangeOwner(owner) => format!("OWNER TO {}", Ident(owner)),
    };
    Ok(format!("ALTER TABLE {} {}", table_name, action))
}

impl ObjectChange for TableChange {
    type Object = Table;

    fn action(&self) -> Action {
        match self {
            TableChange::Create(_) => Action::Create,
            TableChange::Drop(_) => Action::Drop,
            TableChange::Alter { .. } => Action::Alter,
        }
    }

    fn before(&self) -> Option<&Table> {
        match self {
            TableChange::Create(_) => None,
            TableChange::Drop(t) | TableChange::Alter { from: t, .. } => Some(t),
        }
    }

    fn after(&self) -> Option<&Table> {
        match self {
            TableChange::Drop(_) => None,
            TableChange::Create(t) | TableChange::Alter { to: t, .. } => Some(t),
        }
    }

    fn subject(&self) -> &Table {
        match self {
            TableChange::Create(t) | TableChange::Drop(t) => t,
            TableChange::Alter { to, .. } => to,
        }
    }

    fn to_sql(&self) -> Result<String, ValidationError> {
        match self {
            TableChange::Create(t) => create_sql(t),
            TableChange::Drop(t) => Ok(format!("DROP TABLE {}", qualified(&t.schema, &t.name))),
            TableChange::Alter { to, alteration, .. } => alter_sql(to, alteration),
        }
    }
}

impl fmt::Display for TableChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableChange::Alter { to, alteration, .. } => {
                describe(f, Action::Alter, to, Some(alteration))
            }
            _ => describe(f, self.action(), self.subject(), None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::fixtures::{column, table};

    fn alter(alteration: TableAlteration) -> TableChange {
        let t = table("public", "post");
        TableChange::Alter {
            from: t.clone(),
            to: t,
            alteration,
        }
    }

    // ==================== Create / Drop ====================

    #[test]
    fn test_create_table() {
        let mut t = table("public", "post");
        t.columns.push(Column {
            default: Some("'draft'::text".to_string()),
            not_null: true,
            ..column("status", 3, "text")
        });
        t.columns.push(column("title", 2, "character varying(200)"));
        assert_eq!(
            TableChange::Create(t).to_sql().unwrap(),
            "CREATE TABLE public.post (id bigint NOT NULL, title character varying(200), \
             status text NOT NULL DEFAULT 'draft'::text)"
        );
    }

    #[test]
    fn test_create_unlogged_with_options_and_rls() {
        let mut t = table("app", "session");
        t.persistence = Persistence::Unlogged;
        t.options = vec!["fillfactor=70".to_string()];
        t.row_security = true;
        assert_eq!(
            TableChange::Create(t).to_sql().unwrap(),
            "CREATE UNLOGGED TABLE app.session (id bigint NOT NULL) WITH (fillfactor=70);\n\
             ALTER TABLE app.session ENABLE ROW LEVEL SECURITY"
        );
    }

    #[test]
    fn test_create_partition_is_validation_error() {
        let mut t = table("public", "events_2024");
        t.is_partition = true;
        t.partition_bound = Some("FOR VALUES FROM ('2024-01-01') TO ('2025-01-01')".to_string());
        assert!(TableChange::Create(t).to_sql().is_err());
    }

    #[test]
    fn test_drop_table() {
        let change = TableChange::Drop(table("public", "post"));
        assert_eq!(change.to_sql().unwrap(), "DROP TABLE public.post");
        assert_eq!(change.to_string(), "- table public.post");
    }

    // ==================== Column alterations ====================

    #[test]
    fn test_add_and_drop_column() {
        let add = alter(TableAlteration::AddColumn(Column {
            not_null: true,
            default: Some("now()".to_string()),
            ..column("created_at", 2, "timestamp with time zone")
        }));
        assert_eq!(
            add.to_sql().unwrap(),
            "ALTER TABLE public.post ADD COLUMN created_at timestamp with time zone \
             NOT NULL DEFAULT now()"
        );
        assert_eq!(
            add.to_string(),
            "~ table public.post: + created_at: timestamp with time zone (not null)"
        );

        let drop = alter(TableAlteration::DropColumn("order".to_string()));
        assert_eq!(drop.to_sql().unwrap(), "ALTER TABLE public.post DROP COLUMN \"order\"");
    }

    #[test]
    fn test_alter_column_type_nullability_default() {
        let ty = alter(TableAlteration::AlterColumnType {
            name: "views".to_string(),
            from: "integer".to_string(),
            to: "bigint".to_string(),
        });
        assert_eq!(
            ty.to_sql().unwrap(),
            "ALTER TABLE public.post ALTER COLUMN views TYPE bigint USING views::bigint"
        );

        let nullable = alter(TableAlteration::AlterColumnNullable {
            name: "title".to_string(),
            from: true,
            to: false,
        });
        assert_eq!(
            nullable.to_sql().unwrap(),
            "ALTER TABLE public.post ALTER COLUMN title DROP NOT NULL"
        );
        assert_eq!(
            nullable.to_string(),
            "~ table public.post: ~ title: not null -> nullable"
        );

        let default = alter(TableAlteration::AlterColumnDefault {
            name: "title".to_string(),
            from: Some("''::text".to_string()),
            to: None,
        });
        assert_eq!(
            default.to_sql().unwrap(),
            "ALTER TABLE public.post ALTER COLUMN title DROP DEFAULT"
        );
    }

    #[test]
    fn test_identity_columns() {
        let mut t = table("public", "event");
        t.columns[0].identity = Some(ColumnIdentity::Always);
        assert_eq!(
            TableChange::Create(t).to_sql().unwrap(),
            "CREATE TABLE public.event (id bigint NOT NULL GENERATED ALWAYS AS IDENTITY)"
        );

        let identity = |from, to| {
            alter(TableAlteration::AlterColumnIdentity {
                name: "id".to_string(),
                from,
                to,
            })
        };
        let add = identity(None, Some(ColumnIdentity::ByDefault));
        assert_eq!(
            add.to_sql().unwrap(),
            "ALTER TABLE public.post ALTER COLUMN id ADD GENERATED BY DEFAULT AS IDENTITY"
        );
        assert_eq!(
            add.to_string(),
            "~ table public.post: ~ id identity: (none) -> BY DEFAULT"
        );
        assert_eq!(
            identity(Some(ColumnIdentity::ByDefault), Some(ColumnIdentity::Always))
                .to_sql()
                .unwrap(),
            "ALTER TABLE public.post ALTER COLUMN id SET GENERATED ALWAYS"
        );
        assert_eq!(
            identity(Some(ColumnIdentity::Always), None).to_sql().unwrap(),
            "ALTER TABLE public.post ALTER COLUMN id DROP IDENTITY"
        );
    }

    #[test]
    fn test_reserved_column_names_are_quoted() {
        let mut t = table("shop", "item");
        t.columns.push(column("left", 2, "text"));
        t.columns.push(column("inner", 3, "integer"));
        assert_eq!(
            TableChange::Create(t).to_sql().unwrap(),
            "CREATE TABLE shop.item (id bigint NOT NULL, \"left\" text, \"inner\" integer)"
        );
    }

    // ==================== Table-level alterations ====================

    #[test]
    fn test_table_level_alterations() {
        assert_eq!(
            alter(TableAlteration::SetOptions(vec!["fillfactor=50".to_string()]))
                .to_sql()
                .unwrap(),
            "ALTER TABLE public.post SET (fillfactor=50)"
        );
        assert_eq!(
            alter(TableAlteration::ResetOptions(vec![
                "fillfactor".to_string(),
                "autovacuum_enabled".to_string()
            ]))
            .to_sql()
            .unwrap(),
            "ALTER TABLE public.post RESET (fillfactor, autovacuum_enabled)"
        );
        assert_eq!(
            alter(TableAlteration::SetRowSecurity(false)).to_sql().unwrap(),
            "ALTER TABLE public.post DISABLE ROW LEVEL SECURITY"
        );
        assert_eq!(
            alter(TableAlteration::SetPersistence(Persistence::Unlogged))
                .to_sql()
                .unwrap(),
            "ALTER TABLE public.post SET UNLOGGED"
        );
        assert_eq!(
            alter(TableAlteration::ChangeOwner("blog".to_string()))
                .to_sql()
                .unwrap(),
            "ALTER TABLE public.post OWNER TO blog"
        );
    }
}
