use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use strata_core::StrataConfig;
use strata_migrate::{
    connect, DatabasePool, MigrationConfig, MigrationRollback, MigrationRunResult, MigrationRunner,
    MigrationState, RollbackResult,
};

fn runner(config: &StrataConfig) -> anyhow::Result<MigrationRunner> {
    let migration_config =
        MigrationConfig::new(&config.migrations_dir).with_table(config.migrations_table.clone());
    Ok(MigrationRunner::new(migration_config)?)
}

async fn open_database(config: &StrataConfig) -> anyhow::Result<Arc<dyn DatabasePool>> {
    let url = config.require_database_url()?;
    let db = connect(url)
        .await
        .with_context(|| format!("Could not open database {}", url))?;
    Ok(db)
}

pub async fn init(config: &StrataConfig) -> anyhow::Result<PathBuf> {
    let runner = runner(config)?;
    let db = open_database(config).await?;

    let outcome = runner.init(db.as_ref()).await;
    db.close().await;
    let sample = outcome?;

    println!("Created migrations directory: {}", config.migrations_dir.display());
    println!("Created sample migration: {}", sample.display());
    println!("Created ledger table: {}", config.migrations_table);
    Ok(sample)
}

pub fn create(config: &StrataConfig, name: &str) -> anyhow::Result<PathBuf> {
    let path = runner(config)?.manager().create_migration(name, None)?;
    println!("Created migration: {}", path.display());
    Ok(path)
}

pub async fn run(config: &StrataConfig) -> anyhow::Result<MigrationRunResult> {
    let runner = runner(config)?;
    let db = open_database(config).await?;

    let outcome = runner.migrate(db.as_ref()).await;
    db.close().await;
    let result = outcome?;

    if result.is_up_to_date() {
        println!("Nothing to migrate");
    } else {
        for name in &result.applied_migrations {
            println!("Applied: {}", name);
        }
        println!(
            "Applied {} migration(s) in {}ms",
            result.applied_count(),
            result.execution_time_ms
        );
    }
    Ok(result)
}

pub async fn rollback(config: &StrataConfig) -> anyhow::Result<RollbackResult> {
    let runner = runner(config)?;
    let db = open_database(config).await?;

    let outcome = runner.rollback(db.as_ref()).await;
    db.close().await;
    let result = outcome?;

    match &result.rolled_back {
        Some(name) if result.executed_sql => println!("Rolled back: {}", name),
        Some(name) => println!("Rolled back: {} (no down section, ledger entry removed)", name),
        None => println!("Nothing to roll back"),
    }
    Ok(result)
}

pub async fn status(config: &StrataConfig, json: bool) -> anyhow::Result<Vec<MigrationState>> {
    let runner = runner(config)?;
    let db = open_database(config).await?;

    let outcome = runner.status(db.as_ref()).await;
    db.close().await;
    let states = outcome?;

    if json {
        println!("{}", serde_json::to_string_pretty(&states)?);
    } else {
        print!("{}", render_status(&states));
    }
    Ok(states)
}

fn render_status(states: &[MigrationState]) -> String {
    if states.is_empty() {
        return "No migrations found\n".to_string();
    }

    let mut out = String::from("Migration Status:\n================\n");
    for state in states {
        let line = match state.applied_at {
            Some(applied_at) => format!(
                "  applied  {}  {}{}\n",
                applied_at.format("%Y-%m-%d %H:%M:%S"),
                state.name,
                if state.file_present { "" } else { "  (file missing)" }
            ),
            None => format!("  pending  {:19}  {}\n", "", state.name),
        };
        out.push_str(&line);
    }

    let pending = states.iter().filter(|s| !s.is_applied()).count();
    out.push_str(&format!("\n{} applied, {} pending\n", states.len() - pending, pending));
    out
}
