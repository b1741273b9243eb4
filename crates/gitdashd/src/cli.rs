use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use gitdash_config::LogFormat;
use gitdash_core::{FactFilter, GroupBy, RepositoryFilter, SortOrder, Weight, parse_date};

#[derive(Debug, Clone, PartialEq, Eq, Args, Default)]
pub struct FilterArgs {
    #[arg(long, help = "Repository name, or `all`")]
    pub repository: Option<String>,

    #[arg(long, value_parser = parse_date_arg, help = "Inclusive start date (YYYY-MM-DD)")]
    pub from: Option<NaiveDate>,

    #[arg(long, value_parser = parse_date_arg, help = "Inclusive end date (YYYY-MM-DD)")]
    pub to: Option<NaiveDate>,

    #[arg(long, help = "Only commits by this author")]
    pub author: Option<String>,
}

impl FilterArgs {
    pub fn to_filter(&self) -> FactFilter {
        let mut filter = FactFilter::new();
        if let Some(repository) = self.repository.as_deref() {
            filter.repository = RepositoryFilter::parse(repository);
        }
        filter.date_from = self.from;
        filter.date_to = self.to;
        if let Some(author) = self.author.as_deref() {
            filter = filter.with_author(author);
        }
        filter
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct IngestArgs {
    #[arg(long, help = "Path to the git repository to ingest")]
    pub repo: PathBuf,

    #[arg(long, help = "Repository name to record (defaults to the directory name)")]
    pub name: Option<String>,

    #[arg(
        long,
        help = "Derive categories from conventional-commit subjects (feat:, fix(scope):, ...)"
    )]
    pub conventional_categories: bool,

    #[arg(long, help = "Skip refreshing the materialized aggregate afterwards")]
    pub no_refresh: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct ImportArgs {
    #[arg(long, help = "JSON file holding an array of commit facts")]
    pub file: PathBuf,

    #[arg(long, help = "Skip refreshing the materialized aggregate afterwards")]
    pub no_refresh: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct MetricsArgs {
    #[arg(long, value_parser = parse_group_by, help = "month, contributor, category or repository")]
    pub group_by: GroupBy,

    #[command(flatten)]
    pub filter: FilterArgs,

    #[arg(
        long,
        default_value = "total_commits",
        value_parser = parse_sort_order,
        help = "Sort: total_commits, effective_commits, weighted_lines_changed or group_key"
    )]
    pub sort: SortOrder,

    #[arg(long, help = "Display cutoff (0 shows every group; defaults to engine.display_top_n)")]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct EfficiencyArgs {
    #[arg(long, value_parser = parse_group_by, help = "month, contributor, category or repository")]
    pub group_by: GroupBy,

    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Debug, Clone, PartialEq, Eq, Args, Default)]
pub struct VerifyPathsArgs {
    #[arg(long, value_parser = parse_group_by, help = "Dimension to check (defaults to all)")]
    pub group_by: Option<GroupBy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct SetCommitWeightArgs {
    pub commit_hash: String,
    #[arg(value_parser = parse_weight)]
    pub weight: Weight,
    #[arg(long, help = "Repository holding the commit; required when the hash is in several")]
    pub repository: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct SetCategoryArgs {
    pub commit_hash: String,
    #[arg(help = "Category to assign; omit to clear")]
    pub category: Option<String>,
    #[arg(long, help = "Repository holding the commit; required when the hash is in several")]
    pub repository: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct SetCategoryWeightArgs {
    pub category: String,
    #[arg(value_parser = parse_weight)]
    pub weight: Weight,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Ingest commit facts from a local git repository
    Ingest(IngestArgs),
    /// Import commit facts from a JSON file
    Import(ImportArgs),
    /// Rebuild the materialized aggregate from current facts
    Refresh,
    /// Aggregate weighted metrics by one dimension
    Metrics(MetricsArgs),
    /// Efficiency report over the full filtered fact set
    Efficiency(EfficiencyArgs),
    /// Dashboard totals for the filtered fact set
    Summary(FilterArgs),
    /// Compare the materialized and on-the-fly aggregation paths
    VerifyPaths(VerifyPathsArgs),
    /// Set the de-prioritization weight of one commit
    SetCommitWeight(SetCommitWeightArgs),
    /// Assign or clear the category of one commit
    SetCategory(SetCategoryArgs),
    /// Set the weight applied to every commit in a category
    SetCategoryWeight(SetCategoryWeightArgs),
    /// List category weights
    Categories,
}

#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "Weighted git-history metrics")]
pub struct Cli {
    #[arg(
        long,
        global = true,
        default_value = ".",
        help = "Workspace root holding .gitdash/"
    )]
    pub workspace: PathBuf,

    #[arg(
        long,
        global = true,
        value_parser = parse_log_format,
        help = "Log format override: human or json"
    )]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

pub fn parse_date_arg(value: &str) -> Result<NaiveDate, String> {
    parse_date(value).map_err(|err| format!("invalid date '{value}', expected YYYY-MM-DD: {err}"))
}

pub fn parse_group_by(value: &str) -> Result<GroupBy, String> {
    value.parse().map_err(|err: gitdash_core::EngineError| err.to_string())
}

pub fn parse_sort_order(value: &str) -> Result<SortOrder, String> {
    value.parse()
}

pub fn parse_weight(value: &str) -> Result<Weight, String> {
    value.parse().map_err(|err: gitdash_core::EngineError| err.to_string())
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    value.parse()
}
