mod commands;

use clap::{Parser, Subcommand};
use commands::migrate;
use std::path::PathBuf;
use strata_core::{init_logging, AppConfigTrait, LoggingConfig, StrataConfig};

#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(version, about = "Apply and roll back file-based SQL migrations")]
struct Cli {
    /// Migrations directory [env: STRATA_MIGRATIONS_DIR, default: migrations]
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Database URL, e.g. sqlite://app.db [env: DATABASE_URL]
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Ledger table name [env: STRATA_MIGRATIONS_TABLE, default: migrations]
    #[arg(long, global = true)]
    table: Option<String>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Create the migrations directory, a sample migration and the ledger table
    Init,

    /// Create a new migration
    Create {
        /// Migration name
        name: String,
    },

    /// Run pending migrations
    Migrate,

    /// Rollback the last migration
    Rollback,

    /// Show migration status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Environment configuration with command line flags applied on top
    fn config(&self) -> anyhow::Result<StrataConfig> {
        let mut config = StrataConfig::from_env()?;

        if let Some(dir) = &self.dir {
            config = config.with_migrations_dir(dir);
        }
        if let Some(url) = &self.database_url {
            config = config.with_database_url(url);
        }
        if let Some(table) = &self.table {
            config = config.with_migrations_table(table);
        }
        if self.verbose {
            config = config.with_log_level("debug");
        }

        config.validate()?;
        Ok(config)
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config()?;

    let logging = if cli.verbose {
        LoggingConfig::verbose()
    } else {
        LoggingConfig::with_level(config.log_level.clone())
    };
    init_logging(logging).map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    for (field, source) in config.config_sources() {
        tracing::debug!(field = %field, source = %source, "Configuration");
    }

    match &cli.command {
        Commands::Init => {
            migrate::init(&config).await?;
        }
        Commands::Create { name } => {
            migrate::create(&config, name)?;
        }
        Commands::Migrate => {
            migrate::run(&config).await?;
        }
        Commands::Rollback => {
            migrate::rollback(&config).await?;
        }
        Commands::Status { json } => {
            migrate::status(&config, *json).await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!(error = %format!("{:#}", e), "Command failed");
        return Err(e);
    }
    Ok(())
}
