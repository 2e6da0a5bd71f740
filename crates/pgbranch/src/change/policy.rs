use super::{Action, ObjectChange, describe, replace_sql};
use crate::Ident;
use crate::sql::{qualified, role};
use pgbranch_catalog::{CatalogObject, RlsPolicy, ValidationError};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum RlsPolicyChange {
    Create(RlsPolicy),
    Drop(RlsPolicy),
    /// Roles, `USING`, or `WITH CHECK` changed, and no expression was removed.
    Alter { from: RlsPolicy, to: RlsPolicy },
    /// Command or permissiveness changed, or an expression was removed.
    Replace { from: RlsPolicy, to: RlsPolicy },
}

impl RlsPolicyChange {
    /// Whether `ALTER POLICY` can turn `from` into `to`.
    pub fn can_alter(from: &RlsPolicy, to: &RlsPolicy) -> bool {
        from.command == to.command
            && from.permissive == to.permissive
            && !(from.using_expression.is_some() && to.using_expression.is_none())
            && !(from.with_check_expression.is_some() && to.with_check_expression.is_none())
    }
}

fn roles_sql(policy: &RlsPolicy) -> String {
    if policy.applies_to_public() {
        return "public".to_string();
    }
    policy
        .roles
        .iter()
        .map(|r| role(r))
        .collect::<Vec<_>>()
        .join(", ")
}

fn create_sql(policy: &RlsPolicy) -> String {
    let mut sql = format!(
        "CREATE POLICY {} ON {}",
        qualified(&policy.schema, &policy.name),
        qualified(&policy.table_schema, &policy.table_name)
    );
    if !policy.permissive {
        sql.push_str(" AS RESTRICTIVE");
    }
    sql.push_str(&format!(
        " FOR {} TO {}",
        policy.command.keyword(),
        roles_sql(policy)
    ));
    if let Some(using) = &policy.using_expression {
        sql.push_str(&format!(" USING ({})", using));
    }
    if let Some(check) = &policy.with_check_expression {
        sql.push_str(&format!(" WITH CHECK ({})", check));
    }
    sql
}

fn drop_sql(policy: &RlsPolicy) -> String {
    format!(
        "DROP POLICY {} ON {}",
        Ident(&policy.name),
        qualified(&policy.table_schema, &policy.table_name)
    )
}

fn alter_sql(from: &RlsPolicy, to: &RlsPolicy) -> Result<String, ValidationError> {
    if !RlsPolicyChange::can_alter(from, to) {
        return Err(to.invalid("policy change has no ALTER POLICY form"));
    }
    let mut sql = format!(
        "ALTER POLICY {} ON {}",
        Ident(&to.name),
        qualified(&to.table_schema, &to.table_name)
    );
    if from.roles != to.roles {
        sql.push_str(&format!(" TO {}", roles_sql(to)));
    }
    if from.using_expression != to.using_expression {
        if let Some(using) = &to.using_expression {
            sql.push_str(&format!(" USING ({})", using));
        }
    }
    if from.with_check_expression != to.with_check_expression {
        if let Some(check) = &to.with_check_expression {
            sql.push_str(&format!(" WITH CHECK ({})", check));
        }
    }
    Ok(sql)
}

impl ObjectChange for RlsPolicyChange {
    type Object = RlsPolicy;

    fn action(&self) -> Action {
        match self {
            RlsPolicyChange::Create(_) => Action::Create,
            RlsPolicyChange::Drop(_) => Action::Drop,
            RlsPolicyChange::Alter { .. } => Action::Alter,
            RlsPolicyChange::Replace { .. } => Action::Replace,
        }
    }

    fn before(&self) -> Option<&RlsPolicy> {
        match self {
            RlsPolicyChange::Create(_) => None,
            RlsPolicyChange::Drop(p)
            | RlsPolicyChange::Alter { from: p, .. }
            | RlsPolicyChange::Replace { from: p, .. } => Some(p),
        }
    }

    fn after(&self) -> Option<&RlsPolicy> {
        match self {
            RlsPolicyChange::Drop(_) => None,
            RlsPolicyChange::Create(p)
            | RlsPolicyChange::Alter { to: p, .. }
            | RlsPolicyChange::Replace { to: p, .. } => Some(p),
        }
    }

    fn subject(&self) -> &RlsPolicy {
        match self {
            RlsPolicyChange::Create(p) | RlsPolicyChange::Drop(p) => p,
            RlsPolicyChange::Alter { to, .. } | RlsPolicyChange::Replace { to, .. } => to,
        }
    }

    fn to_sql(&self) -> Result<String, ValidationError> {
        match self {
            RlsPolicyChange::Create(p) => Ok(create_sql(p)),
            RlsPolicyChange::Drop(p) => Ok(drop_sql(p)),
            RlsPolicyChange::Alter { from, to } => alter_sql(from, to),
            RlsPolicyChange::Replace { from, to } => {
                Ok(replace_sql(drop_sql(from), create_sql(to)))
            }
        }
    }
}

impl fmt::Display for RlsPolicyChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RlsPolicyChange::Alter { from, to } => {
                let mut parts = Vec::new();
                if from.roles != to.roles {
                    parts.push(format!(
                        "roles {} -> {}",
                        from.roles.join(","),
                        to.roles.join(",")
                    ));
                }
                if from.using_expression != to.using_expression {
                    parts.push("using".to_string());
                }
                if from.with_check_expression != to.with_check_expression {
                    parts.push("with check".to_string());
                }
                describe(f, Action::Alter, to, Some(&parts.join(", ")))
            }
            _ => describe(f, self.action(), self.subject(), None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::fixtures::policy;
    use pgbranch_catalog::PolicyCommand;

    #[test]
    fn test_create_select_policy_for_public() {
        let mut p = policy(PolicyCommand::Select);
        p.using_expression = Some("user_id = current_user_id()".to_string());
        assert_eq!(
            RlsPolicyChange::Create(p).to_sql().unwrap(),
            "CREATE POLICY public.test_policy ON public.test_table FOR SELECT TO public \
             USING (user_id = current_user_id())"
        );
    }

    #[test]
    fn test_create_restrictive_with_check() {
        let mut p = policy(PolicyCommand::Update);
        p.permissive = false;
        p.roles = vec!["app_writer".to_string(), "Auditor".to_string()];
        p.using_expression = Some("owner_id = current_user_id()".to_string());
        p.with_check_expression = Some("owner_id = current_user_id()".to_string());
        assert_eq!(
            RlsPolicyChange::Create(p).to_sql().unwrap(),
            "CREATE POLICY public.test_policy ON public.test_table AS RESTRICTIVE FOR UPDATE \
             TO app_writer, \"Auditor\" USING (owner_id = current_user_id()) \
             WITH CHECK (owner_id = current_user_id())"
        );
    }

    #[test]
    fn test_command_keywords() {
        for (code, keyword) in [
            ("r", "SELECT"),
            ("w", "UPDATE"),
            ("a", "INSERT"),
            ("d", "DELETE"),
            ("*", "ALL"),
        ] {
            let command = PolicyCommand::from_code(code).unwrap();
            let sql = RlsPolicyChange::Create(policy(command)).to_sql().unwrap();
            assert!(sql.contains(&format!(" FOR {} TO public", keyword)), "{}", sql);
        }
    }

    #[test]
    fn test_drop() {
        let change = RlsPolicyChange::Drop(policy(PolicyCommand::All));
        assert_eq!(
            change.to_sql().unwrap(),
            "DROP POLICY test_policy ON public.test_table"
        );
    }

    #[test]
    fn test_alter_renders_changed_parts_only() {
        let from = RlsPolicy {
            using_expression: Some("true".to_string()),
            ..policy(PolicyCommand::All)
        };
        let to = RlsPolicy {
            roles: vec!["app".to_string()],
            ..from.clone()
        };
        let change = RlsPolicyChange::Alter { from, to };
        assert_eq!(
            change.to_sql().unwrap(),
            "ALTER POLICY test_policy ON public.test_table TO app"
        );
        assert_eq!(
            change.to_string(),
            "~ policy test_policy on public.test_table: roles public -> app"
        );
    }

    #[test]
    fn test_removed_expression_cannot_be_altered() {
        let from = RlsPolicy {
            using_expression: Some("true".to_string()),
            ..policy(PolicyCommand::Select)
        };
        let to = policy(PolicyCommand::Select);
        assert!(!RlsPolicyChange::can_alter(&from, &to));
        assert!(RlsPolicyChange::Alter { from, to }.to_sql().is_err());
    }
}
