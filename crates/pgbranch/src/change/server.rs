//! Foreign servers and user mappings, the two option-bearing kinds.

use super::{Action, ObjectChange, alter_options, create_options, describe, option_summary};
use crate::{Ident, Lit};
use pgbranch_catalog::{ForeignServer, OptionChange, UserMapping, ValidationError};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ServerAlteration {
    /// Already passed through the environment filter.
    Options(Vec<OptionChange>),
    SetVersion(String),
    ChangeOwner(String),
}

impl fmt::Display for ServerAlteration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerAlteration::Options(changes) => write!(f, "options {}", option_summary(changes)),
            ServerAlteration::SetVersion(version) => write!(f, "version -> {}", version),
            ServerAlteration::ChangeOwner(owner) => write!(f, "owner -> {}", owner),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerChange {
    Create(ForeignServer),
    Drop(ForeignServer),
    Alter {
        from: ForeignServer,
        to: ForeignServer,
        alteration: ServerAlteration,
    },
}

fn create_server_sql(server: &ForeignServer) -> String {
    let mut sql = format!("CREATE SERVER {}", Ident(&server.name));
    if let Some(server_type) = &server.server_type {
        sql.push_str(&format!(" TYPE {}", Lit(server_type)));
    }
    if let Some(version) = &server.server_version {
        sql.push_str(&format!(" VERSION {}", Lit(version)));
    }
    sql.push_str(&format!(
        " FOREIGN DATA WRAPPER {}",
        Ident(&server.foreign_data_wrapper)
    ));
    sql.push_str(&create_options(&server.options));
    sql
}

impl ObjectChange for ServerChange {
    type Object = ForeignServer;

    fn action(&self) -> Action {
        match self {
            ServerChange::Create(_) => Action::Create,
            ServerChange::Drop(_) => Action::Drop,
            ServerChange::Alter { .. } => Action::Alter,
        }
    }

    fn before(&self) -> Option<&ForeignServer> {
        match self {
            ServerChange::Create(_) => None,
            ServerChange::Drop(s) | ServerChange::Alter { from: s, .. } => Some(s),
        }
    }

    fn after(&self) -> Option<&ForeignServer> {
        match self {
            ServerChange::Drop(_) => None,
            ServerChange::Create(s) | ServerChange::Alter { to: s, .. } => Some(s),
        }
    }

    fn subject(&self) -> &ForeignServer {
        match self {
            ServerChange::Create(s) | ServerChange::Drop(s) => s,
            ServerChange::Alter { to, .. } => to,
        }
    }

    fn to_sql(&self) -> Result<String, ValidationError> {
        Ok(match self {
            ServerChange::Create(s) => create_server_sql(s),
            ServerChange::Drop(s) => format!("DROP SERVER {}", Ident(&s.name)),
            ServerChange::Alter { to, alteration, .. } => {
                let name = Ident(&to.name);
                match alteration {
                    ServerAlteration::Options(changes) => {
                        format!("ALTER SERVER {} {}", name, alter_options(changes))
                    }
                    ServerAlteration::SetVersion(version) => {
                        format!("ALTER SERVER {} VERSION {}", name, Lit(version))
                    }
                    ServerAlteration::ChangeOwner(owner) => {
                        format!("ALTER SERVER {} OWNER TO {}", name, Ident(owner))
                    }
                }
            }
        })
    }
}

impl fmt::Display for ServerChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerChange::Alter { to, alteration, .. } => {
                describe(f, Action::Alter, to, Some(alteration))
            }
            _ => describe(f, self.action(), self.subject(), None),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UserMappingChange {
    Create(UserMapping),
    Drop(UserMapping),
    AlterOptions {
        from: UserMapping,
        to: UserMapping,
        /// Already passed through the environment filter.
        options: Vec<OptionChange>,
    },
}

/// `FOR user SERVER server`
fn mapping_target(mapping: &UserMapping) -> String {
    let user = if mapping.user.eq_ignore_ascii_case("public") {
        "PUBLIC".to_string()
    } else {
        Ident(&mapping.user).to_string()
    };
    format!("FOR {} SERVER {}", user, Ident(&mapping.server))
}

impl ObjectChange for UserMappingChange {
    type Object = UserMapping;

    fn action(&self) -> Action {
        match self {
            UserMappingChange::Create(_) => Action::Create,
            UserMappingChange::Drop(_) => Action::Drop,
            UserMappingChange::AlterOptions { .. } => Action::Alter,
        }
    }

    fn before(&self) -> Option<&UserMapping> {
        match self {
            UserMappingChange::Create(_) => None,
            UserMappingChange::Drop(m) | UserMappingChange::AlterOptions { from: m, .. } => {
                Some(m)
            }
        }
    }

    fn after(&self) -> Option<&UserMapping> {
        match self {
            UserMappingChange::Drop(_) => None,
            UserMappingChange::Create(m) | UserMappingChange::AlterOptions { to: m, .. } => {
                Some(m)
            }
        }
    }

    fn subject(&self) -> &UserMapping {
        match self {
            UserMappingChange::Create(m) | UserMappingChange::Drop(m) => m,
            UserMappingChange::AlterOptions { to, .. } => to,
        }
    }

    fn to_sql(&self) -> Result<String, ValidationError> {
        Ok(match self {
            UserMappingChange::Create(m) => format!(
                "CREATE USER MAPPING {}{}",
                mapping_target(m),
                create_options(&m.options)
            ),
            UserMappingChange::Drop(m) => format!("DROP USER MAPPING {}", mapping_target(m)),
            UserMappingChange::AlterOptions { to, options, .. } => format!(
                "ALTER USER MAPPING {} {}",
                mapping_target(to),
                alter_options(options)
            ),
        })
    }
}

impl fmt::Display for UserMappingChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserMappingChange::AlterOptions { to, options, .. } => {
                let detail = format!("options {}", option_summary(options));
                describe(f, Action::Alter, to, Some(&detail))
            }
            _ => describe(f, self.action(), self.subject(), None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::fixtures::{options, server, user_mapping};

    #[test]
    fn test_create_server() {
        let mut s = server("warehouse");
        s.server_type = Some("oltp".to_string());
        s.server_version = Some("16".to_string());
        assert_eq!(
            ServerChange::Create(s).to_sql().unwrap(),
            "CREATE SERVER warehouse TYPE 'oltp' VERSION '16' FOREIGN DATA WRAPPER postgres_fdw \
             OPTIONS (host 'db.internal', dbname 'app')"
        );
    }

    #[test]
    fn test_create_server_without_options() {
        let mut s = server("bare");
        s.options = options(&[]);
        assert_eq!(
            ServerChange::Create(s).to_sql().unwrap(),
            "CREATE SERVER bare FOREIGN DATA WRAPPER postgres_fdw"
        );
    }

    #[test]
    fn test_alter_server() {
        let from = server("warehouse");
        let to = from.clone();
        let change = ServerChange::Alter {
            from: from.clone(),
            to: to.clone(),
            alteration: ServerAlteration::Options(vec![
                OptionChange::Add {
                    key: "port".to_string(),
                    value: "6432".to_string(),
                },
                OptionChange::Drop {
                    key: "dbname".to_string(),
                    value: "app".to_string(),
                },
            ]),
        };
        assert_eq!(
            change.to_sql().unwrap(),
            "ALTER SERVER warehouse OPTIONS (ADD port '6432', DROP dbname)"
        );
        assert_eq!(change.to_string(), "~ server warehouse: options +port -dbname");

        let version = ServerChange::Alter {
            from,
            to,
            alteration: ServerAlteration::SetVersion("17".to_string()),
        };
        assert_eq!(version.to_sql().unwrap(), "ALTER SERVER warehouse VERSION '17'");
    }

    #[test]
    fn test_user_mappings() {
        let public = user_mapping("warehouse", "public");
        assert_eq!(
            UserMappingChange::Create(public.clone()).to_sql().unwrap(),
            "CREATE USER MAPPING FOR PUBLIC SERVER warehouse \
             OPTIONS (\"user\" 'app', password 'secret')"
        );
        assert_eq!(
            UserMappingChange::Drop(public).to_sql().unwrap(),
            "DROP USER MAPPING FOR PUBLIC SERVER warehouse"
        );

        let reporting = user_mapping("warehouse", "reporting");
        let change = UserMappingChange::AlterOptions {
            from: reporting.clone(),
            to: reporting,
            options: vec![OptionChange::Drop {
                key: "password".to_string(),
                value: "secret".to_string(),
            }],
        };
        assert_eq!(
            change.to_sql().unwrap(),
            "ALTER USER MAPPING FOR reporting SERVER warehouse OPTIONS (DROP password)"
        );
        assert_eq!(change.to_string(), "~ user mapping warehouse for reporting: options -password");
    }

    #[test]
    fn test_literal_escaping_in_options() {
        let mut s = server("quoted");
        s.options = options(&[("application_name", "o'brien")]);
        assert_eq!(
            ServerChange::Create(s).to_sql().unwrap(),
            "CREATE SERVER quoted FOREIGN DATA WRAPPER postgres_fdw \
             OPTIONS (application_name 'o''brien')"
        );
    }
}
