use crate::{Change, Result};
use std::fmt;

/// A complete DDL script: one statement per line, each terminated by `;`.
///
/// No transaction wrapping is added; callers decide whether to run it inside one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script(String);

impl Script {
    /// Serialize changes in the given order.
    ///
    /// A replace renders as its drop and create statements on two lines.
    pub fn from_changes<'a>(changes: impl IntoIterator<Item = &'a Change>) -> Result<Self> {
        let mut script = String::new();
        for change in changes {
            script.push_str(&change.to_sql()?);
            script.push_str(";\n");
        }
        Ok(Script(script))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Statements, without their terminating `;`.
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        self.0.lines().map(|line| line.trim_end_matches(';'))
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Script {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use crate::change::fixtures::*;
    use crate::*;
    use insta::assert_snapshot;

    fn blog() -> Catalog {
        let mut post = table("blog", "post");
        post.columns.push(Column {
            not_null: true,
            ..column("title", 2, "text")
        });
        post.columns.push(column("author_id", 3, "bigint"));

        Catalog::builder()
            .schemas([schema("blog", "postgres")])
            .sequences([sequence("blog", "post_no")])
            .tables([post, table("blog", "author")])
            .constraints([
                primary_key("blog", "author"),
                primary_key("blog", "post"),
                Constraint {
                    key_columns: vec![ColumnRef::new(3, "author_id")],
                    ..foreign_key("blog", "post", "post_author_fkey", "blog", "author")
                },
            ])
            .indexes([index("blog", "post", "post_title_idx")])
            .build()
            .unwrap()
    }

    #[test]
    fn test_script_from_empty() {
        let script = generate_script(&Catalog::default(), &blog()).unwrap();
        assert_snapshot!(script, @r"
        CREATE SCHEMA blog;
        CREATE SEQUENCE blog.post_no AS integer;
        CREATE TABLE blog.author (id bigint NOT NULL);
        CREATE TABLE blog.post (id bigint NOT NULL, title text NOT NULL, author_id bigint);
        ALTER TABLE blog . author ADD CONSTRAINT author_pkey PRIMARY KEY (id);
        ALTER TABLE blog . post ADD CONSTRAINT post_author_fkey FOREIGN KEY (author_id) REFERENCES blog.author (id);
        ALTER TABLE blog . post ADD CONSTRAINT post_pkey PRIMARY KEY (id);
        CREATE INDEX post_title_idx ON blog.post USING btree (id);
        ");
    }

    #[test]
    fn test_script_to_empty() {
        let script = generate_script(&blog(), &Catalog::default()).unwrap();
        assert_snapshot!(script, @r"
        DROP SEQUENCE blog.post_no;
        ALTER TABLE blog . post DROP CONSTRAINT post_author_fkey;
        ALTER TABLE blog . author DROP CONSTRAINT author_pkey;
        DROP TABLE blog.author;
        ALTER TABLE blog . post DROP CONSTRAINT post_pkey;
        DROP INDEX blog.post_title_idx;
        DROP TABLE blog.post;
        DROP SCHEMA blog;
        ");
    }

    #[test]
    fn test_replace_keeps_both_statements() {
        let main = Catalog::builder()
            .domains([domain("public", "code")])
            .schemas([schema("public", "postgres")])
            .build()
            .unwrap();
        let branch = Catalog::builder()
            .domains([Domain {
                base_type: "character varying(8)".to_string(),
                ..domain("public", "code")
            }])
            .schemas([schema("public", "postgres")])
            .build()
            .unwrap();
        let script = generate_script(&main, &branch).unwrap();
        assert_snapshot!(script, @r"
        DROP DOMAIN public.code;
        CREATE DOMAIN public.code AS character varying(8);
        ");
        assert_eq!(script.statements().count(), 2);
    }

    #[test]
    fn test_no_changes_is_empty_script() {
        let script = generate_script(&blog(), &blog()).unwrap();
        assert!(script.is_empty());
    }
}
