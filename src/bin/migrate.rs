//! Thin CLI front end for the migration core (base spec §6). Parses
//! arguments, loads the profile, drives the orchestrator, and reports.

use anyhow::{Context, Result};
use clap::Parser;
use wikibase_migrator::orchestrator::MigrationOrchestrator;
use wikibase_migrator::profile::MigrationProfile;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "migrate", about = "Copy Wikibase entities between instances")]
struct Args {
    /// Path to the migration profile YAML.
    #[arg(long)]
    config: String,

    /// Edit summary recorded on the target wiki.
    #[arg(long)]
    summary: Option<String>,

    /// Source entity IDs to migrate; may be repeated.
    #[arg(long = "entity")]
    entities: Vec<String>,

    /// SPARQL query selecting source entity IDs via `?item`.
    #[arg(long)]
    query: Option<String>,

    /// File containing a SPARQL query, as an alternative to `--query`.
    #[arg(long = "query-file")]
    query_file: Option<String>,

    /// Print the per-entity translation details before writing.
    #[arg(long)]
    show_details: bool,

    /// Skip the interactive confirmation prompt.
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    match run().await {
        Ok(code) => code,
        Err(e) => {
            log::error!("migrate: {e}");
            ExitCode::from(1)
        }
    }
}

async fn run() -> Result<ExitCode> {
    let args = Args::parse();

    let profile = MigrationProfile::load(&args.config).context("loading profile")?;
    profile.validate().context("validating profile")?;

    let ids = resolve_entity_ids(&args, &profile).await?;
    if ids.is_empty() {
        log::warn!("no entity IDs given; nothing to do");
        return Ok(ExitCode::from(1));
    }

    if !args.force && !confirm(&ids) {
        log::info!("aborted by user");
        return Ok(ExitCode::from(1));
    }

    let mut orchestrator = MigrationOrchestrator::new(profile).await?;
    orchestrator.summary = args.summary;

    let batch = orchestrator.run(&ids).await;

    if args.show_details {
        for id in batch.source_ids() {
            let result = &batch.results[&id];
            println!("{id}: created={:?} errors={:?}", result.created_entity.as_ref().map(|e| &e.id), result.errors);
        }
    }

    let failed = batch.failed_source_ids();
    println!(
        "migrated {} of {} entities, {} failed",
        batch.target_ids().len(),
        batch.results.len(),
        failed.len()
    );
    if failed.is_empty() { Ok(ExitCode::SUCCESS) } else { Ok(ExitCode::from(1)) }
}

async fn resolve_entity_ids(args: &Args, profile: &MigrationProfile) -> Result<Vec<String>> {
    if !args.entities.is_empty() {
        return Ok(args.entities.clone());
    }
    let query = match (&args.query, &args.query_file) {
        (Some(q), _) => q.clone(),
        (None, Some(path)) => std::fs::read_to_string(path).context("reading --query-file")?,
        (None, None) => return Ok(Vec::new()),
    };
    let gateway = wikibase_migrator::gateway::Gateway::new(&profile.source).await?;
    let rows = gateway.execute_select(&query).await;
    Ok(rows.into_iter().filter_map(|row| row.get("item").cloned()).collect())
}

fn confirm(ids: &[String]) -> bool {
    use std::io::Write;
    print!("About to migrate {} entities. Continue? [y/N] ", ids.len());
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    if std::io::stdin().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim().to_lowercase().as_str(), "y" | "yes")
}
