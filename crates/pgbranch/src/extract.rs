//! Catalog extraction.
//!
//! One query per object kind, straight against `pg_catalog`. Names are cast to
//! `text` and single-character codes to `text` as well, so rows decode into
//! plain `String`s. Column positions are renumbered over live columns, which
//! keeps two databases with a different history of dropped columns comparable.
//!
//! System schemas, schemas listed in [`ExtractOptions::exclude_schemas`] and
//! objects owned by extensions are skipped. Identity-column sequences are
//! skipped as well: the column's `attidentity` stands for them. A `serial`
//! sequence is kept, with the column it is owned by.

use crate::{Connection, ConnectionExt, Error, Result};
use pgbranch_catalog::*;
use tokio_postgres::Row;
use tracing::info;

/// What to leave out of a snapshot.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Schemas skipped in addition to the system ones.
    pub exclude_schemas: Vec<String>,
}

/// `WHERE` fragment selecting user schemas; `$1` is the exclusion list.
macro_rules! user_schema {
    ($col:literal) => {
        concat!(
            $col, " NOT LIKE 'pg\\_%' AND ",
            $col, " <> 'information_schema' AND ",
            $col, " <> ALL($1::text[])"
        )
    };
}

/// `WHERE` fragment rejecting objects an extension created.
macro_rules! not_from_extension {
    ($oid:literal) => {
        concat!(
            "NOT EXISTS (SELECT 1 FROM pg_depend dep WHERE dep.objid = ",
            $oid,
            " AND dep.deptype = 'e')"
        )
    };
}

/// Live columns of relation `$rel`, in attribute order, selecting `$expr`.
macro_rules! live_columns {
    ($rel:literal, $expr:literal) => {
        concat!(
            "ARRAY(SELECT ", $expr,
            " FROM pg_attribute a",
            " LEFT JOIN pg_attrdef ad ON ad.adrelid = a.attrelid AND ad.adnum = a.attnum",
            " WHERE a.attrelid = ", $rel, " AND a.attnum > 0 AND NOT a.attisdropped",
            " ORDER BY a.attnum)"
        )
    };
}

/// Names and live positions of the columns `$keys` of relation `$rel`.
macro_rules! key_columns {
    ($rel:literal, $keys:literal, $prefix:literal) => {
        concat!(
            "ARRAY(SELECT a.attname::text",
            " FROM unnest(", $keys, ") WITH ORDINALITY AS k(attnum, ord)",
            " JOIN pg_attribute a ON a.attrelid = ", $rel, " AND a.attnum = k.attnum",
            " ORDER BY k.ord) AS ", $prefix, "_names, ",
            "ARRAY(SELECT (SELECT count(*) FROM pg_attribute a2",
            " WHERE a2.attrelid = ", $rel,
            " AND a2.attnum > 0 AND NOT a2.attisdropped AND a2.attnum <= k.attnum)::int2",
            " FROM unnest(", $keys, ") WITH ORDINALITY AS k(attnum, ord)",
            " ORDER BY k.ord) AS ", $prefix, "_positions"
        )
    };
}

const SCHEMAS: &str = concat!(
    "SELECT n.nspname::text AS name, pg_get_userbyid(n.nspowner)::text AS owner
     FROM pg_namespace n
     WHERE ",
    user_schema!("n.nspname"),
    " AND ",
    not_from_extension!("n.oid"),
);

const SEQUENCES: &str = concat!(
    "SELECT n.nspname::text AS schema, c.relname::text AS name,
            format_type(s.seqtypid, NULL) AS data_type,
            s.seqstart AS start_value, s.seqmin AS minimum_value, s.seqmax AS maximum_value,
            s.seqincrement AS increment, s.seqcycle AS cycle_option, s.seqcache AS cache_size,
            c.relpersistence::text AS persistence,
            pg_get_userbyid(c.relowner)::text AS owner,
            otn.nspname::text AS owned_by_schema, otc.relname::text AS owned_by_table,
            ota.attname::text AS owned_by_column
     FROM pg_sequence s
     JOIN pg_class c ON c.oid = s.seqrelid
     JOIN pg_namespace n ON n.oid = c.relnamespace
     LEFT JOIN pg_depend od ON od.classid = 'pg_class'::regclass AND od.objid = c.oid
                           AND od.refclassid = 'pg_class'::regclass AND od.deptype = 'a'
     LEFT JOIN pg_class otc ON otc.oid = od.refobjid
     LEFT JOIN pg_namespace otn ON otn.oid = otc.relnamespace
     LEFT JOIN pg_attribute ota ON ota.attrelid = od.refobjid AND ota.attnum = od.refobjsubid
     WHERE ",
    user_schema!("n.nspname"),
    " AND NOT EXISTS (SELECT 1 FROM pg_depend dep
                      WHERE dep.classid = 'pg_class'::regclass AND dep.objid = c.oid
                        AND dep.deptype IN ('i', 'e'))",
);

const COMPOSITE_TYPES: &str = concat!(
    "SELECT n.nspname::text AS schema, t.typname::text AS name,
            c.relrowsecurity AS row_security, c.relhasindex AS has_indexes,
            c.relhasrules AS has_rules, c.relhastriggers AS has_triggers,
            c.relhassubclass AS has_subclasses, c.relispopulated AS is_populated,
            c.relreplident::text AS replica_identity, c.relispartition AS is_partition,
            coalesce(c.reloptions, '{}')::text[] AS options,
            pg_get_expr(c.relpartbound, c.oid) AS partition_bound,
            pg_get_userbyid(t.typowner)::text AS owner, ",
    live_columns!("c.oid", "a.attname::text"),
    " AS attribute_names, ",
    live_columns!("c.oid", "format_type(a.atttypid, a.atttypmod)"),
    " AS attribute_types, ",
    live_columns!(
        "c.oid",
        "(SELECT co.collname::text FROM pg_collation co, pg_type aty
          WHERE co.oid = a.attcollation AND aty.oid = a.atttypid
            AND a.attcollation <> aty.typcollation)"
    ),
    " AS attribute_collations
     FROM pg_type t
     JOIN pg_class c ON c.oid = t.typrelid AND c.relkind = 'c'
     JOIN pg_namespace n ON n.oid = t.typnamespace
     WHERE ",
    user_schema!("n.nspname"),
    " AND ",
    not_from_extension!("t.oid"),
);

const TABLES: &str = concat!(
    "SELECT n.nspname::text AS schema, c.relname::text AS name,
            c.relpersistence::text AS persistence, c.relrowsecurity AS row_security,
            coalesce(c.reloptions, '{}')::text[] AS options,
            c.relispartition AS is_partition,
            pg_get_expr(c.relpartbound, c.oid) AS partition_bound,
            pg_get_userbyid(c.relowner)::text AS owner, ",
    live_columns!("c.oid", "a.attname::text"),
    " AS column_names, ",
    live_columns!("c.oid", "format_type(a.atttypid, a.atttypmod)"),
    " AS column_types, ",
    live_columns!("c.oid", "a.attnotnull"),
    " AS column_not_null, ",
    live_columns!("c.oid", "pg_get_expr(ad.adbin, ad.adrelid)"),
    " AS column_defaults, ",
    live_columns!("c.oid", "a.attidentity::text"),
    " AS column_identities
     FROM pg_class c
     JOIN pg_namespace n ON n.oid = c.relnamespace
     WHERE c.relkind IN ('r', 'p') AND ",
    user_schema!("n.nspname"),
    " AND ",
    not_from_extension!("c.oid"),
);

const CONSTRAINTS: &str = concat!(
    "SELECT n.nspname::text AS schema, con.conname::text AS name,
            tn.nspname::text AS table_schema, tc.relname::text AS table_name,
            con.contype::text AS constraint_type,
            con.condeferrable AS deferrable, con.condeferred AS initially_deferred,
            con.convalidated AS validated, con.conislocal AS is_local,
            con.connoinherit AS no_inherit, ",
    key_columns!("con.conrelid", "con.conkey", "key"),
    ", fn.nspname::text AS foreign_schema, fc.relname::text AS foreign_table, ",
    key_columns!("con.confrelid", "con.confkey", "foreign"),
    ", con.confupdtype::text AS on_update, con.confdeltype::text AS on_delete,
            con.confmatchtype::text AS match_type,
            pg_get_expr(con.conbin, con.conrelid) AS check_expression,
            pg_get_userbyid(tc.relowner)::text AS owner
     FROM pg_constraint con
     JOIN pg_namespace n ON n.oid = con.connamespace
     JOIN pg_class tc ON tc.oid = con.conrelid
     JOIN pg_namespace tn ON tn.oid = tc.relnamespace
     LEFT JOIN pg_class fc ON fc.oid = con.confrelid
     LEFT JOIN pg_namespace fn ON fn.oid = fc.relnamespace
     WHERE con.contype IN ('c', 'f', 'p', 'u', 'x') AND tc.relkind IN ('r', 'p') AND ",
    user_schema!("tn.nspname"),
    " AND ",
    not_from_extension!("tc.oid"),
);

const DOMAINS: &str = concat!(
    "SELECT n.nspname::text AS schema, t.typname::text AS name,
            format_type(t.typbasetype, t.typtypmod) AS base_type,
            bn.nspname::text AS base_type_schema,
            t.typnotnull AS not_null, t.typtypmod AS type_modifier, t.typndims AS array_dimensions,
            CASE WHEN t.typcollation <> bt.typcollation THEN co.collname::text END AS collation,
            t.typdefaultbin::text AS default_bin, t.typdefault AS default_value,
            pg_get_userbyid(t.typowner)::text AS owner
     FROM pg_type t
     JOIN pg_namespace n ON n.oid = t.typnamespace
     JOIN pg_type bt ON bt.oid = t.typbasetype
     JOIN pg_namespace bn ON bn.oid = bt.typnamespace
     LEFT JOIN pg_collation co ON co.oid = t.typcollation
     WHERE t.typtype = 'd' AND ",
    user_schema!("n.nspname"),
    " AND ",
    not_from_extension!("t.oid"),
);

const RLS_POLICIES: &str = concat!(
    "SELECT n.nspname::text AS schema, p.polname::text AS name,
            n.nspname::text AS table_schema, c.relname::text AS table_name,
            p.polcmd::text AS command, p.polpermissive AS permissive,
            ARRAY(SELECT CASE WHEN r.role_oid = 0 THEN 'public'
                              ELSE pg_get_userbyid(r.role_oid)::text END
                  FROM unnest(p.polroles) AS r(role_oid)
                  ORDER BY 1) AS roles,
            pg_get_expr(p.polqual, p.polrelid) AS using_expression,
            pg_get_expr(p.polwithcheck, p.polrelid) AS with_check_expression,
            pg_get_userbyid(c.relowner)::text AS owner
     FROM pg_policy p
     JOIN pg_class c ON c.oid = p.polrelid
     JOIN pg_namespace n ON n.oid = c.relnamespace
     WHERE ",
    user_schema!("n.nspname"),
);

const INDEXES: &str = concat!(
    "SELECT n.nspname::text AS schema, ic.relname::text AS name,
            tn.nspname::text AS table_schema, tc.relname::text AS table_name,
            pg_get_indexdef(i.indexrelid) AS definition, i.indisunique AS is_unique,
            pg_get_userbyid(ic.relowner)::text AS owner
     FROM pg_index i
     JOIN pg_class ic ON ic.oid = i.indexrelid
     JOIN pg_namespace n ON n.oid = ic.relnamespace
     JOIN pg_class tc ON tc.oid = i.indrelid
     JOIN pg_namespace tn ON tn.oid = tc.relnamespace
     WHERE tc.relkind IN ('r', 'p') AND ",
    user_schema!("tn.nspname"),
    " AND ",
    not_from_extension!("tc.oid"),
    " AND NOT EXISTS (SELECT 1 FROM pg_constraint con
                      WHERE con.conrelid = i.indrelid AND con.conindid = i.indexrelid
                        AND con.contype IN ('p', 'u', 'x'))",
);

const SERVERS: &str = "
    SELECT s.srvname::text AS name, w.fdwname::text AS foreign_data_wrapper,
           s.srvtype AS server_type, s.srvversion AS server_version,
           coalesce(s.srvoptions, '{}')::text[] AS options,
           pg_get_userbyid(s.srvowner)::text AS owner
    FROM pg_foreign_server s
    JOIN pg_foreign_data_wrapper w ON w.oid = s.srvfdw";

const USER_MAPPINGS: &str = "
    SELECT um.srvname::text AS server, um.usename::text AS user_name,
           coalesce(um.umoptions, '{}')::text[] AS options
    FROM pg_user_mappings um";

/// Decode a single-character catalog code.
fn code<T>(
    row: &Row,
    kind: ObjectKind,
    column: &'static str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T> {
    let value: String = row.try_get(column)?;
    match parse(&value) {
        Some(parsed) => Ok(parsed),
        None => Err(Error::UnexpectedValue {
            kind,
            column,
            value,
        }),
    }
}

/// Zip a name array with a position array into column references.
fn column_refs(row: &Row, prefix: &str) -> Result<Vec<ColumnRef>> {
    let names: Vec<String> = row.try_get(format!("{}_names", prefix).as_str())?;
    let positions: Vec<i16> = row.try_get(format!("{}_positions", prefix).as_str())?;
    Ok(positions
        .into_iter()
        .zip(names)
        .map(|(position, name)| ColumnRef::new(position, name))
        .collect())
}

pub async fn extract_schemas<C: Connection>(
    conn: &C,
    options: &ExtractOptions,
) -> Result<Vec<Schema>> {
    let rows = conn.traced().query(SCHEMAS, &[&options.exclude_schemas]).await?;
    rows.iter()
        .map(|row| -> Result<Schema> {
            Ok(Schema {
                name: row.try_get("name")?,
                owner: row.try_get("owner")?,
            })
        })
        .collect()
}

pub async fn extract_sequences<C: Connection>(
    conn: &C,
    options: &ExtractOptions,
) -> Result<Vec<Sequence>> {
    let rows = conn.traced().query(SEQUENCES, &[&options.exclude_schemas]).await?;
    rows.iter()
        .map(|row| -> Result<Sequence> {
            let owned_by_schema: Option<String> = row.try_get("owned_by_schema")?;
            let owned_by_table: Option<String> = row.try_get("owned_by_table")?;
            let owned_by_column: Option<String> = row.try_get("owned_by_column")?;
            let owned_by = match (owned_by_schema, owned_by_table, owned_by_column) {
                (Some(table_schema), Some(table_name), Some(column)) => Some(SequenceOwner {
                    table_schema,
                    table_name,
                    column,
                }),
                _ => None,
            };

            Ok(Sequence {
                schema: row.try_get("schema")?,
                name: row.try_get("name")?,
                data_type: row.try_get("data_type")?,
                start_value: row.try_get("start_value")?,
                minimum_value: row.try_get("minimum_value")?,
                maximum_value: row.try_get("maximum_value")?,
                increment: row.try_get("increment")?,
                cycle_option: row.try_get("cycle_option")?,
                cache_size: row.try_get("cache_size")?,
                persistence: code(row, ObjectKind::Sequence, "persistence", Persistence::from_code)?,
                owner: row.try_get("owner")?,
                owned_by,
            })
        })
        .collect()
}

pub async fn extract_composite_types<C: Connection>(
    conn: &C,
    options: &ExtractOptions,
) -> Result<Vec<CompositeType>> {
    let rows = conn
        .traced()
        .query(COMPOSITE_TYPES, &[&options.exclude_schemas])
        .await?;
    rows.iter()
        .map(|row| -> Result<CompositeType> {
            let names: Vec<String> = row.try_get("attribute_names")?;
            let types: Vec<String> = row.try_get("attribute_types")?;
            let collations: Vec<Option<String>> = row.try_get("attribute_collations")?;
            let attributes = names
                .into_iter()
                .zip(types)
                .zip(collations)
                .map(|((name, data_type), collation)| TypeAttribute {
                    name,
                    data_type,
                    collation,
                })
                .collect();

            Ok(CompositeType {
                schema: row.try_get("schema")?,
                name: row.try_get("name")?,
                row_security: row.try_get("row_security")?,
                has_indexes: row.try_get("has_indexes")?,
                has_rules: row.try_get("has_rules")?,
                has_triggers: row.try_get("has_triggers")?,
                has_subclasses: row.try_get("has_subclasses")?,
                is_populated: row.try_get("is_populated")?,
                replica_identity: code(
                    row,
                    ObjectKind::CompositeType,
                    "replica_identity",
                    ReplicaIdentity::from_code,
                )?,
                is_partition: row.try_get("is_partition")?,
                options: row.try_get("options")?,
                partition_bound: row.try_get("partition_bound")?,
                attributes,
                owner: row.try_get("owner")?,
            })
        })
        .collect()
}

pub async fn extract_tables<C: Connection>(
    conn: &C,
    options: &ExtractOptions,
) -> Result<Vec<Table>> {
    let rows = conn.traced().query(TABLES, &[&options.exclude_schemas]).await?;
    rows.iter()
        .map(|row| -> Result<Table> {
            let names: Vec<String> = row.try_get("column_names")?;
            let types: Vec<String> = row.try_get("column_types")?;
            let not_null: Vec<bool> = row.try_get("column_not_null")?;
            let defaults: Vec<Option<String>> = row.try_get("column_defaults")?;
            let identities: Vec<String> = row.try_get("column_identities")?;
            let identities = identities
                .into_iter()
                .map(|value| match ColumnIdentity::from_code(&value) {
                    Some(identity) => Ok(identity),
                    None => Err(Error::UnexpectedValue {
                        kind: ObjectKind::Table,
                        column: "column_identities",
                        value,
                    }),
                })
                .collect::<Result<Vec<_>>>()?;
            let columns = names
                .into_iter()
                .zip(types)
                .zip(not_null)
                .zip(defaults)
                .zip(identities)
                .zip(1i16..)
                .map(
                    |(((((name, data_type), not_null), default), identity), position)| Column {
                        name,
                        position,
                        data_type,
                        not_null,
                        default,
                        identity,
                    },
                )
                .collect();

            Ok(Table {
                schema: row.try_get("schema")?,
                name: row.try_get("name")?,
                persistence: code(row, ObjectKind::Table, "persistence", Persistence::from_code)?,
                row_security: row.try_get("row_security")?,
                columns,
                options: row.try_get("options")?,
                is_partition: row.try_get("is_partition")?,
                partition_bound: row.try_get("partition_bound")?,
                owner: row.try_get("owner")?,
            })
        })
        .collect()
}

pub async fn extract_constraints<C: Connection>(
    conn: &C,
    options: &ExtractOptions,
) -> Result<Vec<Constraint>> {
    let rows = conn
        .traced()
        .query(CONSTRAINTS, &[&options.exclude_schemas])
        .await?;
    rows.iter()
        .map(|row| -> Result<Constraint> {
            let kind = ObjectKind::Constraint;
            let constraint_type = code(row, kind, "constraint_type", ConstraintType::from_code)?;
            let foreign_key = match constraint_type {
                ConstraintType::ForeignKey => Some(ForeignKeyTarget {
                    schema: row.try_get("foreign_schema")?,
                    table: row.try_get("foreign_table")?,
                    columns: column_refs(row, "foreign")?,
                    on_update: code(row, kind, "on_update", ForeignKeyAction::from_code)?,
                    on_delete: code(row, kind, "on_delete", ForeignKeyAction::from_code)?,
                    match_type: code(row, kind, "match_type", MatchType::from_code)?,
                }),
                _ => None,
            };

            Ok(Constraint {
                schema: row.try_get("schema")?,
                name: row.try_get("name")?,
                table_schema: row.try_get("table_schema")?,
                table_name: row.try_get("table_name")?,
                constraint_type,
                deferrable: row.try_get("deferrable")?,
                initially_deferred: row.try_get("initially_deferred")?,
                validated: row.try_get("validated")?,
                is_local: row.try_get("is_local")?,
                no_inherit: row.try_get("no_inherit")?,
                key_columns: column_refs(row, "key")?,
                foreign_key,
                check_expression: row.try_get("check_expression")?,
                owner: row.try_get("owner")?,
            })
        })
        .collect()
}

pub async fn extract_domains<C: Connection>(
    conn: &C,
    options: &ExtractOptions,
) -> Result<Vec<Domain>> {
    let rows = conn.traced().query(DOMAINS, &[&options.exclude_schemas]).await?;
    rows.iter()
        .map(|row| -> Result<Domain> {
            Ok(Domain {
                schema: row.try_get("schema")?,
                name: row.try_get("name")?,
                base_type: row.try_get("base_type")?,
                base_type_schema: row.try_get("base_type_schema")?,
                not_null: row.try_get("not_null")?,
                type_modifier: row.try_get("type_modifier")?,
                array_dimensions: row.try_get("array_dimensions")?,
                collation: row.try_get("collation")?,
                default_bin: row.try_get("default_bin")?,
                default_value: row.try_get("default_value")?,
                owner: row.try_get("owner")?,
            })
        })
        .collect()
}

pub async fn extract_rls_policies<C: Connection>(
    conn: &C,
    options: &ExtractOptions,
) -> Result<Vec<RlsPolicy>> {
    let rows = conn
        .traced()
        .query(RLS_POLICIES, &[&options.exclude_schemas])
        .await?;
    rows.iter()
        .map(|row| -> Result<RlsPolicy> {
            Ok(RlsPolicy {
                schema: row.try_get("schema")?,
                name: row.try_get("name")?,
                table_schema: row.try_get("table_schema")?,
                table_name: row.try_get("table_name")?,
                command: code(row, ObjectKind::RlsPolicy, "command", PolicyCommand::from_code)?,
                permissive: row.try_get("permissive")?,
                roles: row.try_get("roles")?,
                using_expression: row.try_get("using_expression")?,
                with_check_expression: row.try_get("with_check_expression")?,
                owner: row.try_get("owner")?,
            })
        })
        .collect()
}

pub async fn extract_indexes<C: Connection>(
    conn: &C,
    options: &ExtractOptions,
) -> Result<Vec<Index>> {
    let rows = conn.traced().query(INDEXES, &[&options.exclude_schemas]).await?;
    rows.iter()
        .map(|row| -> Result<Index> {
            Ok(Index {
                schema: row.try_get("schema")?,
                name: row.try_get("name")?,
                table_schema: row.try_get("table_schema")?,
                table_name: row.try_get("table_name")?,
                definition: row.try_get("definition")?,
                is_unique: row.try_get("is_unique")?,
                owner: row.try_get("owner")?,
            })
        })
        .collect()
}

pub async fn extract_servers<C: Connection>(conn: &C) -> Result<Vec<ForeignServer>> {
    let rows = conn.traced().query(SERVERS, &[]).await?;
    rows.iter()
        .map(|row| -> Result<ForeignServer> {
            let options: Vec<String> = row.try_get("options")?;
            Ok(ForeignServer {
                name: row.try_get("name")?,
                foreign_data_wrapper: row.try_get("foreign_data_wrapper")?,
                server_type: row.try_get("server_type")?,
                server_version: row.try_get("server_version")?,
                options: parse_options(&options),
                owner: row.try_get("owner")?,
            })
        })
        .collect()
}

pub async fn extract_user_mappings<C: Connection>(conn: &C) -> Result<Vec<UserMapping>> {
    let rows = conn.traced().query(USER_MAPPINGS, &[]).await?;
    rows.iter()
        .map(|row| -> Result<UserMapping> {
            let options: Vec<String> = row.try_get("options")?;
            Ok(UserMapping {
                server: row.try_get("server")?,
                user: row.try_get("user_name")?,
                options: parse_options(&options),
            })
        })
        .collect()
}

/// Extract every supported kind into a validated snapshot.
pub async fn extract_catalog<C: Connection>(conn: &C, options: &ExtractOptions) -> Result<Catalog> {
    let catalog = Catalog::builder()
        .schemas(extract_schemas(conn, options).await?)
        .sequences(extract_sequences(conn, options).await?)
        .composite_types(extract_composite_types(conn, options).await?)
        .tables(extract_tables(conn, options).await?)
        .constraints(extract_constraints(conn, options).await?)
        .domains(extract_domains(conn, options).await?)
        .rls_policies(extract_rls_policies(conn, options).await?)
        .indexes(extract_indexes(conn, options).await?)
        .servers(extract_servers(conn).await?)
        .user_mappings(extract_user_mappings(conn).await?)
        .build()?;

    info!(objects = catalog.len(), "extracted catalog");
    Ok(catalog)
}

/// Check out a connection from `pool` and extract through it.
pub async fn extract_from_pool(
    pool: &deadpool_postgres::Pool,
    options: &ExtractOptions,
) -> Result<Catalog> {
    let conn = pool.get().await?;
    extract_catalog(&conn, options).await
}
