//! Configuration file handling for pgbranch.
//!
//! Looks for `.config/pgbranch.styx` in the current directory or any parent
//! directory. `PGBRANCH_MAIN_URL` and `PGBRANCH_BRANCH_URL` override the URLs
//! found there.

pub use pgbranch_config::Config;

use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = ".config/pgbranch.styx";

const MAIN_URL_VAR: &str = "PGBRANCH_MAIN_URL";
const BRANCH_URL_VAR: &str = "PGBRANCH_BRANCH_URL";

/// Load configuration from `.config/pgbranch.styx`, searching up the directory tree.
pub fn load() -> Result<(Config, PathBuf), ConfigError> {
    let cwd = std::env::current_dir().map_err(|e| ConfigError::Io(e.to_string()))?;
    let (mut config, path) = load_from(&cwd)?;
    apply_overrides(&mut config, |var| std::env::var(var).ok());
    Ok((config, path))
}

/// Load configuration starting from a specific directory.
pub fn load_from(start: &Path) -> Result<(Config, PathBuf), ConfigError> {
    let config_path = find_config_file(start)?;
    let content =
        std::fs::read_to_string(&config_path).map_err(|e| ConfigError::Io(e.to_string()))?;

    let config: Config =
        facet_styx::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

    Ok((config, config_path))
}

/// Replace URLs with the ones `lookup` finds for the override variables.
fn apply_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup(MAIN_URL_VAR) {
        config.main.url = url;
    }
    if let Some(url) = lookup(BRANCH_URL_VAR) {
        config.branch.url = url;
    }
}

/// Find `.config/pgbranch.styx` by searching up the directory tree.
fn find_config_file(start: &Path) -> Result<PathBuf, ConfigError> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_FILE);
        if config_path.exists() {
            return Ok(config_path);
        }

        if !current.pop() {
            return Err(ConfigError::NotFound);
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// No `.config/pgbranch.styx` found in any parent directory
    NotFound,
    /// I/O error reading the file
    Io(String),
    /// Parse error in the Styx file
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound => {
                write!(f, "No {CONFIG_FILE} found in current directory or any parent")
            }
            ConfigError::Io(e) => write!(f, "Failed to read {CONFIG_FILE}: {e}"),
            ConfigError::Parse(e) => write!(f, "Failed to parse {CONFIG_FILE}: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use pgbranch_config::DatabaseConfig;

    fn config() -> Config {
        Config {
            main: DatabaseConfig {
                url: "postgres://localhost/app".to_string(),
            },
            branch: DatabaseConfig {
                url: "postgres://localhost/app_feature".to_string(),
            },
            exclude_schemas: vec![],
        }
    }

    #[test]
    fn test_overrides_replace_only_what_is_set() {
        let mut config = config();
        apply_overrides(&mut config, |var| {
            (var == BRANCH_URL_VAR).then(|| "postgres://ci/branch".to_string())
        });
        assert_eq!(config.main.url, "postgres://localhost/app");
        assert_eq!(config.branch.url, "postgres://ci/branch");
    }

    #[test]
    fn test_no_overrides() {
        let mut config = config();
        apply_overrides(&mut config, |_| None);
        assert_eq!(config.main.url, "postgres://localhost/app");
        assert_eq!(config.branch.url, "postgres://localhost/app_feature");
    }

    #[test]
    fn test_not_found_at_root() {
        let err = find_config_file(Path::new("/")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound), "{err}");
    }

    #[test]
    fn test_found_in_parent() {
        let root = std::env::temp_dir().join(format!("pgbranch-config-{}", std::process::id()));
        let nested = root.join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::create_dir_all(root.join(".config")).unwrap();
        std::fs::write(root.join(CONFIG_FILE), "").unwrap();

        let found = find_config_file(&nested).unwrap();
        assert_eq!(found, root.join(CONFIG_FILE));

        std::fs::remove_dir_all(&root).unwrap();
    }
}
