//! Snapshot types, one per catalog object kind.
//!
//! Single-character codes mirror the engine's catalog columns (`relpersistence`,
//! `contype`, `polcmd`, ...) and are parsed into enums at the extraction
//! boundary, so the rest of the system never sees a raw code.

use crate::{CatalogObject, Identity, ObjectKind, ObjectRef, ValidationError};
use indexmap::IndexMap;

/// `relpersistence`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Persistence {
    #[default]
    Permanent,
    Unlogged,
    Temporary,
}

impl Persistence {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "p" => Some(Persistence::Permanent),
            "u" => Some(Persistence::Unlogged),
            "t" => Some(Persistence::Temporary),
            _ => None,
        }
    }

    pub fn code(&self) -> char {
        match self {
            Persistence::Permanent => 'p',
            Persistence::Unlogged => 'u',
            Persistence::Temporary => 't',
        }
    }
}

/// `relreplident`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReplicaIdentity {
    #[default]
    Default,
    Nothing,
    Full,
    Index,
}

impl ReplicaIdentity {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "d" => Some(ReplicaIdentity::Default),
            "n" => Some(ReplicaIdentity::Nothing),
            "f" => Some(ReplicaIdentity::Full),
            "i" => Some(ReplicaIdentity::Index),
            _ => None,
        }
    }
}

/// `contype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintType {
    Check,
    PrimaryKey,
    ForeignKey,
    Unique,
    Exclusion,
}

impl ConstraintType {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "c" => Some(ConstraintType::Check),
            "p" => Some(ConstraintType::PrimaryKey),
            "f" => Some(ConstraintType::ForeignKey),
            "u" => Some(ConstraintType::Unique),
            "x" => Some(ConstraintType::Exclusion),
            _ => None,
        }
    }
}

/// `confupdtype` / `confdeltype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ForeignKeyAction {
    #[default]
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ForeignKeyAction {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "a" => Some(ForeignKeyAction::NoAction),
            "r" => Some(ForeignKeyAction::Restrict),
            "c" => Some(ForeignKeyAction::Cascade),
            "n" => Some(ForeignKeyAction::SetNull),
            "d" => Some(ForeignKeyAction::SetDefault),
            _ => None,
        }
    }

    pub fn to_sql(&self) -> &'static str {
        match self {
            ForeignKeyAction::NoAction => "NO ACTION",
            ForeignKeyAction::Restrict => "RESTRICT",
            ForeignKeyAction::Cascade => "CASCADE",
            ForeignKeyAction::SetNull => "SET NULL",
            ForeignKeyAction::SetDefault => "SET DEFAULT",
        }
    }
}

/// `confmatchtype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MatchType {
    #[default]
    Simple,
    Full,
    Partial,
}

impl MatchType {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "s" => Some(MatchType::Simple),
            "f" => Some(MatchType::Full),
            "p" => Some(MatchType::Partial),
            _ => None,
        }
    }
}

/// `polcmd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyCommand {
    Select,
    Update,
    Insert,
    Delete,
    All,
}

impl PolicyCommand {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "r" => Some(PolicyCommand::Select),
            "w" => Some(PolicyCommand::Update),
            "a" => Some(PolicyCommand::Insert),
            "d" => Some(PolicyCommand::Delete),
            "*" => Some(PolicyCommand::All),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            PolicyCommand::Select => "SELECT",
            PolicyCommand::Update => "UPDATE",
            PolicyCommand::Insert => "INSERT",
            PolicyCommand::Delete => "DELETE",
            PolicyCommand::All => "ALL",
        }
    }

    /// Whether the engine accepts a `USING` clause for this command.
    pub fn accepts_using(&self) -> bool {
        !matches!(self, PolicyCommand::Insert)
    }

    /// Whether the engine accepts a `WITH CHECK` clause for this command.
    pub fn accepts_with_check(&self) -> bool {
        !matches!(self, PolicyCommand::Select | PolicyCommand::Delete)
    }
}

/// `attidentity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnIdentity {
    Always,
    ByDefault,
}

impl ColumnIdentity {
    /// Parse `attidentity`; the empty code means the column is not an identity.
    pub fn from_code(code: &str) -> Option<Option<Self>> {
        match code {
            "" => Some(None),
            "a" => Some(Some(ColumnIdentity::Always)),
            "d" => Some(Some(ColumnIdentity::ByDefault)),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            ColumnIdentity::Always => "ALWAYS",
            ColumnIdentity::ByDefault => "BY DEFAULT",
        }
    }
}

/// A schema (namespace).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub name: String,
    pub owner: String,
}

impl CatalogObject for Schema {
    const KIND: ObjectKind = ObjectKind::Schema;

    fn identity(&self) -> Identity {
        Identity::global(&self.name)
    }

    fn container(&self) -> Option<ObjectRef> {
        None
    }
}

/// The column a sequence belongs to (`OWNED BY`), as set up by `serial`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SequenceOwner {
    pub table_schema: String,
    pub table_name: String,
    pub column: String,
}

impl SequenceOwner {
    pub fn table_ref(&self) -> ObjectRef {
        ObjectRef::table(&self.table_schema, &self.table_name)
    }
}

/// A sequence. Bounds are 64-bit: `bigint` sequences use the full range.
///
/// Identity-column sequences are part of their column and never appear here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    pub schema: String,
    pub name: String,
    pub data_type: String,
    pub start_value: i64,
    pub minimum_value: i64,
    pub maximum_value: i64,
    pub increment: i64,
    pub cycle_option: bool,
    pub cache_size: i64,
    pub persistence: Persistence,
    pub owner: String,
    pub owned_by: Option<SequenceOwner>,
}

impl CatalogObject for Sequence {
    const KIND: ObjectKind = ObjectKind::Sequence;

    fn identity(&self) -> Identity {
        Identity::namespaced(&self.schema, &self.name)
    }

    fn container(&self) -> Option<ObjectRef> {
        Some(ObjectRef::schema(&self.schema))
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.increment == 0 {
            return Err(self.invalid("increment must not be zero"));
        }
        if self.minimum_value > self.maximum_value {
            return Err(self.invalid(format!(
                "minimum value {} exceeds maximum value {}",
                self.minimum_value, self.maximum_value
            )));
        }
        if self.start_value < self.minimum_value || self.start_value > self.maximum_value {
            return Err(self.invalid(format!(
                "start value {} is outside [{}, {}]",
                self.start_value, self.minimum_value, self.maximum_value
            )));
        }
        if self.cache_size < 1 {
            return Err(self.invalid("cache size must be at least 1"));
        }
        Ok(())
    }
}

/// One attribute of a composite type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeAttribute {
    pub name: String,
    pub data_type: String,
    /// Only set when it differs from the data type's default collation.
    pub collation: Option<String>,
}

/// A composite type, with the structural flags of its backing relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeType {
    pub schema: String,
    pub name: String,
    pub row_security: bool,
    pub has_indexes: bool,
    pub has_rules: bool,
    pub has_triggers: bool,
    pub has_subclasses: bool,
    pub is_populated: bool,
    pub replica_identity: ReplicaIdentity,
    pub is_partition: bool,
    pub options: Vec<String>,
    pub partition_bound: Option<String>,
    pub attributes: Vec<TypeAttribute>,
    pub owner: String,
}

impl CompositeType {
    /// Everything except attributes and owner, which have ALTER paths.
    pub fn same_structure(&self, other: &CompositeType) -> bool {
        self.row_security == other.row_security
            && self.has_indexes == other.has_indexes
            && self.has_rules == other.has_rules
            && self.has_triggers == other.has_triggers
            && self.has_subclasses == other.has_subclasses
            && self.is_populated == other.is_populated
            && self.replica_identity == other.replica_identity
            && self.is_partition == other.is_partition
            && self.options == other.options
            && self.partition_bound == other.partition_bound
    }
}

impl CatalogObject for CompositeType {
    const KIND: ObjectKind = ObjectKind::CompositeType;

    fn identity(&self) -> Identity {
        Identity::namespaced(&self.schema, &self.name)
    }

    fn container(&self) -> Option<ObjectRef> {
        Some(ObjectRef::schema(&self.schema))
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.is_partition != self.partition_bound.is_some() {
            return Err(self.invalid("partition bound must be present exactly when is_partition"));
        }
        for (i, attr) in self.attributes.iter().enumerate() {
            if self.attributes[..i].iter().any(|a| a.name == attr.name) {
                return Err(self.invalid(format!("duplicate attribute `{}`", attr.name)));
            }
        }
        Ok(())
    }
}

/// A column by position and name. Positions are 1-based and count live
/// columns only, so dropped columns leave no gaps.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub position: i16,
    pub name: String,
}

impl ColumnRef {
    pub fn new(position: i16, name: impl Into<String>) -> Self {
        Self {
            position,
            name: name.into(),
        }
    }
}

/// The target side of a foreign key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyTarget {
    pub schema: String,
    pub table: String,
    pub columns: Vec<ColumnRef>,
    pub on_update: ForeignKeyAction,
    pub on_delete: ForeignKeyAction,
    pub match_type: MatchType,
}

impl ForeignKeyTarget {
    pub fn table_ref(&self) -> ObjectRef {
        ObjectRef::table(&self.schema, &self.table)
    }
}

/// A table constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub schema: String,
    pub name: String,
    pub table_schema: String,
    pub table_name: String,
    pub constraint_type: ConstraintType,
    pub deferrable: bool,
    pub initially_deferred: bool,
    pub validated: bool,
    pub is_local: bool,
    pub no_inherit: bool,
    pub key_columns: Vec<ColumnRef>,
    pub foreign_key: Option<ForeignKeyTarget>,
    pub check_expression: Option<String>,
    pub owner: String,
}

impl Constraint {
    pub fn table_ref(&self) -> ObjectRef {
        ObjectRef::table(&self.table_schema, &self.table_name)
    }

    /// Structural equality, ignoring the owner (which follows the table's).
    pub fn same_definition(&self, other: &Constraint) -> bool {
        Constraint {
            owner: String::new(),
            ..self.clone()
        } == Constraint {
            owner: String::new(),
            ..other.clone()
        }
    }
}

impl CatalogObject for Constraint {
    const KIND: ObjectKind = ObjectKind::Constraint;

    fn identity(&self) -> Identity {
        Identity::table_owned(&self.table_schema, &self.table_name, &self.name)
    }

    fn container(&self) -> Option<ObjectRef> {
        Some(self.table_ref())
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let is_fk = self.constraint_type == ConstraintType::ForeignKey;
        if is_fk != self.foreign_key.is_some() {
            return Err(self.invalid("foreign key target must be present exactly for foreign keys"));
        }
        if self.check_expression.is_some() && self.constraint_type != ConstraintType::Check {
            return Err(self.invalid("only check constraints carry a check expression"));
        }
        if self.initially_deferred && !self.deferrable {
            return Err(self.invalid("initially deferred requires deferrable"));
        }
        Ok(())
    }
}

/// A domain over a base type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    pub schema: String,
    pub name: String,
    /// The base type as the engine formats it, modifiers included.
    pub base_type: String,
    pub base_type_schema: String,
    pub not_null: bool,
    pub type_modifier: i32,
    pub array_dimensions: i32,
    pub collation: Option<String>,
    /// Serialized expression tree of the default.
    pub default_bin: Option<String>,
    /// Textual form of the default.
    pub default_value: Option<String>,
    pub owner: String,
}

impl Domain {
    /// Attributes that can only change through a drop and re-create.
    pub fn same_base(&self, other: &Domain) -> bool {
        self.base_type == other.base_type
            && self.base_type_schema == other.base_type_schema
            && self.type_modifier == other.type_modifier
            && self.array_dimensions == other.array_dimensions
            && self.collation == other.collation
    }
}

impl CatalogObject for Domain {
    const KIND: ObjectKind = ObjectKind::Domain;

    fn identity(&self) -> Identity {
        Identity::namespaced(&self.schema, &self.name)
    }

    fn container(&self) -> Option<ObjectRef> {
        Some(ObjectRef::schema(&self.schema))
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.default_bin.is_some() != self.default_value.is_some() {
            return Err(self.invalid("default must have both binary and textual forms"));
        }
        if self.array_dimensions < 0 {
            return Err(self.invalid("array dimensions must not be negative"));
        }
        Ok(())
    }
}

/// A row-level security policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RlsPolicy {
    pub schema: String,
    pub name: String,
    pub table_schema: String,
    pub table_name: String,
    pub command: PolicyCommand,
    pub permissive: bool,
    /// Role names, sorted; the pseudo-role is `public`.
    pub roles: Vec<String>,
    pub using_expression: Option<String>,
    pub with_check_expression: Option<String>,
    pub owner: String,
}

impl RlsPolicy {
    pub fn table_ref(&self) -> ObjectRef {
        ObjectRef::table(&self.table_schema, &self.table_name)
    }

    /// True when the role set is exactly `{public}`.
    pub fn applies_to_public(&self) -> bool {
        self.roles.len() == 1 && self.roles[0].eq_ignore_ascii_case("public")
    }
}

impl CatalogObject for RlsPolicy {
    const KIND: ObjectKind = ObjectKind::RlsPolicy;

    fn identity(&self) -> Identity {
        Identity::table_owned(&self.table_schema, &self.table_name, &self.name)
    }

    fn container(&self) -> Option<ObjectRef> {
        Some(self.table_ref())
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.roles.is_empty() {
            return Err(self.invalid("policy must apply to at least one role"));
        }
        if self.with_check_expression.is_some() && !self.command.accepts_with_check() {
            return Err(self.invalid(format!(
                "FOR {} policies cannot have a WITH CHECK expression",
                self.command.keyword()
            )));
        }
        if self.using_expression.is_some() && !self.command.accepts_using() {
            return Err(self.invalid(format!(
                "FOR {} policies cannot have a USING expression",
                self.command.keyword()
            )));
        }
        Ok(())
    }
}

/// A table column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub position: i16,
    pub data_type: String,
    pub not_null: bool,
    pub default: Option<String>,
    pub identity: Option<ColumnIdentity>,
}

/// A table (ordinary or partitioned).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub schema: String,
    pub name: String,
    pub persistence: Persistence,
    pub row_security: bool,
    pub columns: Vec<Column>,
    /// Storage parameters as `key=value`.
    pub options: Vec<String>,
    pub is_partition: bool,
    pub partition_bound: Option<String>,
    pub owner: String,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

impl CatalogObject for Table {
    const KIND: ObjectKind = ObjectKind::Table;

    fn identity(&self) -> Identity {
        Identity::namespaced(&self.schema, &self.name)
    }

    fn container(&self) -> Option<ObjectRef> {
        Some(ObjectRef::schema(&self.schema))
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.is_partition != self.partition_bound.is_some() {
            return Err(self.invalid("partition bound must be present exactly when is_partition"));
        }
        for (i, col) in self.columns.iter().enumerate() {
            if self.columns[..i].iter().any(|c| c.name == col.name) {
                return Err(self.invalid(format!("duplicate column `{}`", col.name)));
            }
            if col.identity.is_some() && (col.default.is_some() || !col.not_null) {
                return Err(self.invalid(format!(
                    "identity column `{}` must be NOT NULL without a default",
                    col.name
                )));
            }
        }
        Ok(())
    }
}

/// A secondary index. Indexes backing a constraint belong to the constraint
/// and are not extracted separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub schema: String,
    pub name: String,
    pub table_schema: String,
    pub table_name: String,
    /// The complete `CREATE INDEX` statement as the engine reports it.
    pub definition: String,
    pub is_unique: bool,
    pub owner: String,
}

impl Index {
    pub fn table_ref(&self) -> ObjectRef {
        ObjectRef::table(&self.table_schema, &self.table_name)
    }
}

impl CatalogObject for Index {
    const KIND: ObjectKind = ObjectKind::Index;

    fn identity(&self) -> Identity {
        Identity::table_owned(&self.table_schema, &self.table_name, &self.name)
    }

    fn container(&self) -> Option<ObjectRef> {
        Some(self.table_ref())
    }
}

/// A foreign server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignServer {
    pub name: String,
    pub foreign_data_wrapper: String,
    pub server_type: Option<String>,
    pub server_version: Option<String>,
    pub options: IndexMap<String, String>,
    pub owner: String,
}

impl CatalogObject for ForeignServer {
    const KIND: ObjectKind = ObjectKind::ForeignServer;

    fn identity(&self) -> Identity {
        Identity::global(&self.name)
    }

    fn container(&self) -> Option<ObjectRef> {
        None
    }
}

/// A user mapping on a foreign server. `user` is `public` for the pseudo-role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMapping {
    pub server: String,
    pub user: String,
    pub options: IndexMap<String, String>,
}

impl CatalogObject for UserMapping {
    const KIND: ObjectKind = ObjectKind::UserMapping;

    fn identity(&self) -> Identity {
        Identity::UserMapping {
            server: self.server.clone(),
            user: self.user.clone(),
        }
    }

    fn container(&self) -> Option<ObjectRef> {
        Some(ObjectRef::server(&self.server))
    }
}
