//! Identifier and literal rendering.

use std::fmt;

/// Keywords that cannot appear as a bare identifier.
const RESERVED: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric", "authorization",
    "binary", "both", "case", "cast", "check", "collate", "collation", "column", "concurrently",
    "constraint", "create", "cross", "current_catalog", "current_date", "current_role",
    "current_schema", "current_time", "current_timestamp", "current_user", "default", "deferrable",
    "desc", "distinct", "do", "else", "end", "except", "false", "fetch", "for", "foreign",
    "freeze", "from", "full", "grant", "group", "having", "ilike", "in", "initially", "inner",
    "intersect", "into", "is", "isnull", "join", "lateral", "leading", "left", "like", "limit",
    "localtime", "localtimestamp", "natural", "not", "notnull", "null", "offset", "on", "only",
    "or", "order", "outer", "overlaps", "placing", "primary", "references", "returning", "right",
    "select", "session_user", "similar", "some", "symmetric", "system_user", "table",
    "tablesample", "then", "to", "trailing", "true", "union", "unique", "user", "using",
    "variadic", "verbose", "when", "where", "window", "with",
];

/// A PostgreSQL identifier wrapper.
///
/// Display writes the name bare when the engine would read it back unchanged
/// (lowercase, starts with a letter or underscore, not a reserved keyword) and
/// double-quoted with embedded quotes doubled otherwise.
///
/// # Example
/// ```
/// use pgbranch::Ident;
/// assert_eq!(format!("{}", Ident("test_table")), "test_table");
/// assert_eq!(format!("{}", Ident("user")), "\"user\"");
/// assert_eq!(format!("{}", Ident("Mixed\"Case")), "\"Mixed\"\"Case\"");
/// ```
pub struct Ident<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> Ident<T> {
    fn needs_quotes(&self) -> bool {
        let name = self.0.as_ref();
        let mut chars = name.chars();
        let Some(first) = chars.next() else {
            return true;
        };
        if !(first.is_ascii_lowercase() || first == '_') {
            return true;
        }
        if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '$') {
            return true;
        }
        RESERVED.binary_search(&name).is_ok()
    }
}

impl<T: AsRef<str>> fmt::Display for Ident<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.needs_quotes() {
            return f.write_str(self.0.as_ref());
        }
        write!(f, "\"")?;
        for c in self.0.as_ref().chars() {
            if c == '"' {
                write!(f, "\"\"")?;
            } else {
                write!(f, "{}", c)?;
            }
        }
        write!(f, "\"")
    }
}

/// A PostgreSQL string literal wrapper.
///
/// # Example
/// ```
/// use pgbranch::Lit;
/// assert_eq!(format!("{}", Lit("it's")), "'it''s'");
/// ```
pub struct Lit<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> fmt::Display for Lit<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'")?;
        for c in self.0.as_ref().chars() {
            if c == '\'' {
                write!(f, "''")?;
            } else {
                write!(f, "{}", c)?;
            }
        }
        write!(f, "'")
    }
}

pub fn quote_ident(name: &str) -> String {
    Ident(name).to_string()
}

/// `schema.name`
pub fn qualified(schema: &str, name: &str) -> String {
    format!("{}.{}", Ident(schema), Ident(name))
}

/// `schema . name`, the spaced form used by `ALTER TABLE` constraint
/// statements and `CREATE TYPE`.
pub fn spaced_qualified(schema: &str, name: &str) -> String {
    format!("{} . {}", Ident(schema), Ident(name))
}

/// A role name; the `public` pseudo-role renders as the keyword.
pub fn role(name: &str) -> String {
    if name.eq_ignore_ascii_case("public") {
        "public".to_string()
    } else {
        quote_ident(name)
    }
}

/// Whether `text` spells the object `schema.name`, qualified or not, quoted or not.
pub(crate) fn names_object(text: &str, schema: &str, name: &str) -> bool {
    text == name
        || text == quote_ident(name)
        || text == qualified(schema, name)
        || text == format!("{}.{}", schema, name)
}

/// Whether a column's `data_type` text refers to the type `schema.name`.
pub(crate) fn names_type(data_type: &str, schema: &str, name: &str) -> bool {
    let mut base = data_type.trim();
    while let Some(stripped) = base.strip_suffix("[]") {
        base = stripped.trim_end();
    }
    names_object(base, schema, name)
}

/// Whether a column default draws from the sequence `schema.name`, as in
/// `nextval('app.post_id_seq'::regclass)`.
pub(crate) fn default_uses_sequence(default: &str, schema: &str, name: &str) -> bool {
    default.match_indices("nextval('").any(|(start, prefix)| {
        let literal = &default[start + prefix.len()..];
        literal
            .find("'::regclass")
            .is_some_and(|end| names_object(&literal[..end].replace("''", "'"), schema, name))
    })
}

/// Comma-separated identifiers.
pub fn ident_list<S: AsRef<str>>(names: impl IntoIterator<Item = S>) -> String {
    names
        .into_iter()
        .map(|n| quote_ident(n.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_list_is_sorted() {
        let mut sorted = RESERVED.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, RESERVED);
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("public"), "public");
        assert_eq!(quote_ident("test_table2"), "test_table2");
        assert_eq!(quote_ident("order"), "\"order\"");
        assert_eq!(quote_ident("left"), "\"left\"");
        assert_eq!(quote_ident("inner"), "\"inner\"");
        assert_eq!(quote_ident("authorization"), "\"authorization\"");
        assert_eq!(quote_ident("tablesample"), "\"tablesample\"");
        assert_eq!(quote_ident("verbose"), "\"verbose\"");
        assert_eq!(quote_ident("lefty"), "lefty");
        assert_eq!(quote_ident("CamelCase"), "\"CamelCase\"");
        assert_eq!(quote_ident("has space"), "\"has space\"");
        assert_eq!(quote_ident("9lives"), "\"9lives\"");
        assert_eq!(quote_ident(""), "\"\"");
    }

    #[test]
    fn test_qualified_forms() {
        assert_eq!(qualified("public", "t"), "public.t");
        assert_eq!(spaced_qualified("public", "t"), "public . t");
        assert_eq!(qualified("App", "user"), "\"App\".\"user\"");
    }

    #[test]
    fn test_names_type_forms() {
        assert!(names_type("email", "app", "email"));
        assert!(names_type("app.email", "app", "email"));
        assert!(names_type("app.email[][]", "app", "email"));
        assert!(names_type("\"Mixed\"", "app", "Mixed"));
        assert!(!names_type("emails", "app", "email"));
        assert!(!names_type("other.email", "app", "email"));
    }

    #[test]
    fn test_default_uses_sequence() {
        let default = "nextval('shop.item_id_seq'::regclass)";
        assert!(default_uses_sequence(default, "shop", "item_id_seq"));
        assert!(!default_uses_sequence(default, "shop", "item_id"));
        assert!(!default_uses_sequence(default, "other", "item_id_seq"));
        assert!(default_uses_sequence(
            "nextval('item_id_seq'::regclass)",
            "shop",
            "item_id_seq"
        ));
        assert!(default_uses_sequence(
            "nextval('\"Shop\".\"Item''s\"'::regclass)",
            "Shop",
            "Item's"
        ));
        assert!(!default_uses_sequence("'nextval'::text", "shop", "nextval"));
        assert!(!default_uses_sequence("now()", "shop", "item_id_seq"));
    }

    #[test]
    fn test_role() {
        assert_eq!(role("public"), "public");
        assert_eq!(role("PUBLIC"), "public");
        assert_eq!(role("app_reader"), "app_reader");
        assert_eq!(role("Admin"), "\"Admin\"");
    }
}
