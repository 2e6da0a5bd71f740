mod config;

use config::ConfigError;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use facet::Facet;
use facet_args as args;
use owo_colors::OwoColorize;
use pgbranch::ExtractOptions;
use tokio_postgres::NoTls;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Diff a branch database against main and print the DDL that brings main in line.
#[derive(Facet, Debug)]
struct Cli {
    /// Show version information
    #[facet(args::named, args::short = 'V')]
    version: bool,

    /// Print the list of changes instead of the script
    #[facet(args::named, args::short = 's')]
    summary: bool,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid database url {url}: {source}")]
    Url {
        url: String,
        source: tokio_postgres::Error,
    },

    #[error("failed to build connection pool: {0}")]
    Pool(#[from] deadpool_postgres::BuildError),

    #[error(transparent)]
    Pgbranch(#[from] pgbranch::Error),
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let args_ref: Vec<&str> = args.iter().map(|s| s.as_str()).collect();

    let result: Result<Cli, _> = args::from_slice(&args_ref);

    let cli = match result {
        Ok(cli) => cli,
        Err(err) if err.is_help_request() => {
            print!("{}", err.help_text().unwrap_or(""));
            return;
        }
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    };

    if cli.version {
        println!("pgbranch {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    // stdout carries the script, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli).await {
        eprintln!("{} {}", "error:".red().bold(), err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let (config, path) = config::load()?;
    info!(config = %path.display(), "loaded configuration");

    let options = ExtractOptions {
        exclude_schemas: config.exclude_schemas.clone(),
    };
    let main_pool = connect(&config.main.url)?;
    let branch_pool = connect(&config.branch.url)?;

    let (main, branch) = tokio::try_join!(
        pgbranch::extract_from_pool(&main_pool, &options),
        pgbranch::extract_from_pool(&branch_pool, &options),
    )?;

    let diff = pgbranch::diff(&main, &branch)?;
    if cli.summary {
        print!("{diff}");
        return Ok(());
    }

    let script = diff.order()?.to_script()?;
    if script.is_empty() {
        eprintln!("{}", "No changes detected.".green());
    } else {
        print!("{script}");
    }
    Ok(())
}

/// Build a small pool for one database.
fn connect(url: &str) -> Result<Pool, CliError> {
    let pg_config: tokio_postgres::Config = url.parse().map_err(|source| CliError::Url {
        url: mask_password(url),
        source,
    })?;
    info!(database = %mask_password(url), "connecting");

    let manager = Manager::from_config(
        pg_config,
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );
    Ok(Pool::builder(manager).max_size(2).build()?)
}

/// Mask password in database URL for display
fn mask_password(url: &str) -> String {
    let Some(start) = url.find("://") else {
        return url.to_string();
    };
    let Some(at) = url.rfind('@') else {
        return url.to_string();
    };
    if at < start {
        return url.to_string();
    }
    match url[start + 3..at].find(':') {
        Some(colon) => {
            let user = &url[start + 3..start + 3 + colon];
            format!("{}{}:***{}", &url[..start + 3], user, &url[at..])
        }
        None => url.to_string(),
    }
}
