use clap::Parser;
use color_eyre::Result;
use tasker::{Config, Database, Profile, cli::Cli};
use tracing_subscriber::EnvFilter;

/// Used until the config file has been read
const BOOTSTRAP_LOG_FILTER: &str = "info";

// RUST_LOG wins over the given filter; logs go to stderr so stdout stays JSON
fn subscriber(default_filter: &str) -> impl tracing::Subscriber + Send + Sync + 'static {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish()
}

fn main() -> Result<()> {
    // Set up error reporting with color-eyre
    color_eyre::install()?;

    let cli = Cli::parse();

    // --dev flag enables dev mode, otherwise use prod
    let profile = if cli.dev { Profile::Dev } else { Profile::Prod };

    let config = tracing::subscriber::with_default(subscriber(BOOTSTRAP_LOG_FILTER), || {
        Config::load(cli.config.as_deref(), profile)
    })?;
    tracing::subscriber::set_global_default(subscriber(&config.log_filter))?;

    let db_path = config.get_database_path();
    tracing::debug!(path = %db_path.display(), ?profile, "opening database");
    let mut db = Database::open(&db_path)?;

    tasker::cli::run(cli.command, cli.token, &config, &mut db)?;

    Ok(())
}
