use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use gitdash_analysis::{MetricsEngine, MetricsQuery};
use gitdash_config::EngineConfig;
use gitdash_core::{CommitFact, GroupBy, Weight};
use gitdash_store::{FactWriter, SqliteStore};
use serde::Serialize;
use serde_json::json;

use crate::cli::Commands;
use crate::ingest::{IngestOptions, ingest_repository, repository_name_for};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Success,
    /// `verify-paths` found groups outside the tolerance.
    PathsDisagree,
}

impl CommandStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::PathsDisagree => 1,
        }
    }
}

pub fn run_command(
    command: Commands,
    store: SqliteStore,
    engine_config: EngineConfig,
    out: &mut dyn Write,
) -> Result<CommandStatus> {
    let engine = MetricsEngine::new(store, engine_config);
    let store = engine.accessor();

    match command {
        Commands::Ingest(args) => {
            let repo = args
                .repo
                .canonicalize()
                .with_context(|| format!("failed to resolve repository {}", args.repo.display()))?;
            let repository = args
                .name
                .clone()
                .unwrap_or_else(|| repository_name_for(&repo));
            let options = IngestOptions {
                conventional_categories: args.conventional_categories,
            };
            let outcome = ingest_repository(store, &repo, &repository, &options)?;
            let refresh = if args.no_refresh {
                None
            } else {
                Some(store.refresh_aggregates()?)
            };
            write_json(out, &json!({ "ingest": outcome, "refresh": refresh }))?;
        }
        Commands::Import(args) => {
            let count = import_facts(store, &args.file)?;
            let refresh = if args.no_refresh {
                None
            } else {
                Some(store.refresh_aggregates()?)
            };
            write_json(out, &json!({ "commits_imported": count, "refresh": refresh }))?;
        }
        Commands::Refresh => {
            let state = store.refresh_aggregates()?;
            write_json(out, &state)?;
        }
        Commands::Metrics(args) => {
            let response = engine.metrics(MetricsQuery {
                group_by: args.group_by,
                filter: args.filter.to_filter(),
                sort: args.sort,
                limit: args.limit,
            })?;
            write_json(out, &response)?;
        }
        Commands::Efficiency(args) => {
            let report = engine.efficiency(args.group_by, &args.filter.to_filter())?;
            write_json(out, &report)?;
        }
        Commands::Summary(args) => {
            let filter = args.to_filter();
            filter.validate()?;
            let summary = engine.summary(&filter)?;
            write_json(out, &summary)?;
        }
        Commands::VerifyPaths(args) => {
            let dimensions = match args.group_by {
                Some(group_by) => vec![group_by],
                None => GroupBy::ALL.to_vec(),
            };
            let mut agreements = Vec::with_capacity(dimensions.len());
            for group_by in dimensions {
                let Some(agreement) = engine.verify_paths(group_by)? else {
                    bail!("no materialized aggregate yet; run `gitdashd refresh` first");
                };
                agreements.push(agreement);
            }
            let consistent = agreements.iter().all(|agreement| agreement.is_consistent());
            write_json(
                out,
                &json!({ "consistent": consistent, "dimensions": agreements }),
            )?;
            if !consistent {
                return Ok(CommandStatus::PathsDisagree);
            }
        }
        Commands::SetCommitWeight(args) => {
            if !store.set_commit_weight(
                &args.commit_hash,
                args.repository.as_deref(),
                args.weight,
            )? {
                bail!("unknown commit {}", args.commit_hash);
            }
            write_json(
                out,
                &json!({
                    "commit_hash": args.commit_hash,
                    "repository": args.repository,
                    "weight": args.weight,
                }),
            )?;
        }
        Commands::SetCategory(args) => {
            if !store.set_commit_category(
                &args.commit_hash,
                args.repository.as_deref(),
                args.category.as_deref(),
            )? {
                bail!("unknown commit {}", args.commit_hash);
            }
            write_json(
                out,
                &json!({
                    "commit_hash": args.commit_hash,
                    "repository": args.repository,
                    "category": args.category,
                }),
            )?;
        }
        Commands::SetCategoryWeight(args) => {
            store.set_category_weight(&args.category, args.weight)?;
            write_json(
                out,
                &json!({ "category": args.category.trim(), "weight": args.weight }),
            )?;
        }
        Commands::Categories => {
            let categories = store.list_category_weights()?;
            write_json(out, &categories)?;
        }
    }

    Ok(CommandStatus::Success)
}

/// Reads a JSON array of commit facts and upserts them in one transaction.
/// The whole file is parsed before anything is written.
pub fn import_facts(writer: &impl FactWriter, path: &Path) -> Result<usize> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let facts: Vec<CommitFact> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse commit facts from {}", path.display()))?;

    if let Some(fact) = facts
        .iter()
        .find(|fact| fact.commit_hash.trim().is_empty() || fact.repository.trim().is_empty())
    {
        bail!(
            "commit fact with an empty hash or repository in {}: {:?}",
            path.display(),
            fact.commit_hash
        );
    }

    writer
        .upsert_commits(&facts)
        .with_context(|| format!("failed to store commit facts from {}", path.display()))?;
    tracing::info!(commits = facts.len(), path = %path.display(), "imported commit facts");
    Ok(facts.len())
}

fn write_json(out: &mut dyn Write, value: &impl Serialize) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value).context("failed to serialize JSON output")?;
    writeln!(out).context("failed to write trailing newline")?;
    Ok(())
}
