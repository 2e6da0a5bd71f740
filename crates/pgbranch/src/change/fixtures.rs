//! Snapshot builders shared by the unit tests.

use indexmap::IndexMap;
use pgbranch_catalog::*;

pub fn schema(name: &str, owner: &str) -> Schema {
    Schema {
        name: name.to_string(),
        owner: owner.to_string(),
    }
}

pub fn sequence(schema: &str, name: &str) -> Sequence {
    Sequence {
        schema: schema.to_string(),
        name: name.to_string(),
        data_type: "integer".to_string(),
        start_value: 1,
        minimum_value: 1,
        maximum_value: 2147483647,
        increment: 1,
        cycle_option: false,
        cache_size: 1,
        persistence: Persistence::Permanent,
        owner: "postgres".to_string(),
        owned_by: None,
    }
}

pub fn column(name: &str, position: i16, data_type: &str) -> Column {
    Column {
        name: name.to_string(),
        position,
        data_type: data_type.to_string(),
        not_null: false,
        default: None,
        identity: None,
    }
}

pub fn table(schema: &str, name: &str) -> Table {
    Table {
        schema: schema.to_string(),
        name: name.to_string(),
        persistence: Persistence::Permanent,
        row_security: false,
        columns: vec![Column {
            not_null: true,
            ..column("id", 1, "bigint")
        }],
        options: Vec::new(),
        is_partition: false,
        partition_bound: None,
        owner: "postgres".to_string(),
    }
}

pub fn check_constraint(table_schema: &str, table_name: &str, name: &str) -> Constraint {
    Constraint {
        schema: table_schema.to_string(),
        name: name.to_string(),
        table_schema: table_schema.to_string(),
        table_name: table_name.to_string(),
        constraint_type: ConstraintType::Check,
        deferrable: false,
        initially_deferred: false,
        validated: true,
        is_local: true,
        no_inherit: false,
        key_columns: vec![ColumnRef::new(1, "id")],
        foreign_key: None,
        check_expression: Some("(id > 0)".to_string()),
        owner: "postgres".to_string(),
    }
}

pub fn primary_key(table_schema: &str, table_name: &str) -> Constraint {
    Constraint {
        name: format!("{}_pkey", table_name),
        constraint_type: ConstraintType::PrimaryKey,
        check_expression: None,
        ..check_constraint(table_schema, table_name, "unused")
    }
}

pub fn foreign_key(
    table_schema: &str,
    table_name: &str,
    name: &str,
    target_schema: &str,
    target_table: &str,
) -> Constraint {
    Constraint {
        constraint_type: ConstraintType::ForeignKey,
        key_columns: vec![ColumnRef::new(2, "parent_id")],
        foreign_key: Some(ForeignKeyTarget {
            schema: target_schema.to_string(),
            table: target_table.to_string(),
            columns: vec![ColumnRef::new(1, "id")],
            on_update: ForeignKeyAction::NoAction,
            on_delete: ForeignKeyAction::NoAction,
            match_type: MatchType::Simple,
        }),
        check_expression: None,
        ..check_constraint(table_schema, table_name, name)
    }
}

pub fn domain(schema: &str, name: &str) -> Domain {
    Domain {
        schema: schema.to_string(),
        name: name.to_string(),
        base_type: "text".to_string(),
        base_type_schema: "pg_catalog".to_string(),
        not_null: false,
        type_modifier: -1,
        array_dimensions: 0,
        collation: None,
        default_bin: None,
        default_value: None,
        owner: "postgres".to_string(),
    }
}

pub fn composite_type(schema: &str, name: &str) -> CompositeType {
    CompositeType {
        schema: schema.to_string(),
        name: name.to_string(),
        row_security: false,
        has_indexes: false,
        has_rules: false,
        has_triggers: false,
        has_subclasses: false,
        is_populated: true,
        replica_identity: ReplicaIdentity::Nothing,
        is_partition: false,
        options: Vec::new(),
        partition_bound: None,
        attributes: vec![
            TypeAttribute {
                name: "street".to_string(),
                data_type: "text".to_string(),
                collation: None,
            },
            TypeAttribute {
                name: "zip".to_string(),
                data_type: "integer".to_string(),
                collation: None,
            },
        ],
        owner: "postgres".to_string(),
    }
}

pub fn policy(command: PolicyCommand) -> RlsPolicy {
    RlsPolicy {
        schema: "public".to_string(),
        name: "test_policy".to_string(),
        table_schema: "public".to_string(),
        table_name: "test_table".to_string(),
        command,
        permissive: true,
        roles: vec!["public".to_string()],
        using_expression: None,
        with_check_expression: None,
        owner: "postgres".to_string(),
    }
}

pub fn index(table_schema: &str, table_name: &str, name: &str) -> Index {
    Index {
        schema: table_schema.to_string(),
        name: name.to_string(),
        table_schema: table_schema.to_string(),
        table_name: table_name.to_string(),
        definition: format!(
            "CREATE INDEX {} ON {}.{} USING btree (id)",
            name, table_schema, table_name
        ),
        is_unique: false,
        owner: "postgres".to_string(),
    }
}

pub fn options(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn server(name: &str) -> ForeignServer {
    ForeignServer {
        name: name.to_string(),
        foreign_data_wrapper: "postgres_fdw".to_string(),
        server_type: None,
        server_version: None,
        options: options(&[("host", "db.internal"), ("dbname", "app")]),
        owner: "postgres".to_string(),
    }
}

pub fn user_mapping(server: &str, user: &str) -> UserMapping {
    UserMapping {
        server: server.to_string(),
        user: user.to_string(),
        options: options(&[("user", "app"), ("password", "secret")]),
    }
}
