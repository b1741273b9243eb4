use std::collections::BTreeSet;
use std::path::Path;

use chrono::NaiveDate;
use gitdash_config::{EngineConfig, effective_tolerance, load_workspace_config, store_path};
use gitdash_core::{
    AggregateMetricRecord, CategoryWeight, FactFilter, GroupBy, SortOrder, efficiency_pct,
};
use gitdash_store::{FactAccessor, SqliteStore, StoreError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregator::{AggregateInput, PathAgreement, aggregate, compare_paths};
use crate::reporter::{EfficiencyReport, deprioritized_categories, report};
use crate::resolver::{WEIGHT_PRODUCT_SCALE, resolve};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("config error: {0}")]
    Config(#[from] gitdash_config::ConfigError),
    #[error("store error: {0}")]
    Store(StoreError),
    #[error(transparent)]
    Engine(#[from] gitdash_core::EngineError),
}

/// Validation failures raised inside the store surface as the same
/// `Engine`/`Config` variants the engine raises itself.
impl From<StoreError> for AnalysisError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Engine(err) => Self::Engine(err),
            StoreError::Config(err) => Self::Config(err),
            other => Self::Store(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPath {
    Precomputed,
    Raw,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsQuery {
    pub group_by: GroupBy,
    #[serde(default)]
    pub filter: FactFilter,
    #[serde(default)]
    pub sort: SortOrder,
    /// Display cutoff; `None` uses the configured top-N, `Some(0)` shows all.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl MetricsQuery {
    pub fn new(group_by: GroupBy) -> Self {
        Self {
            group_by,
            filter: FactFilter::default(),
            sort: SortOrder::default(),
            limit: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub group_by: GroupBy,
    pub path: AggregationPath,
    /// Number of groups before the display cutoff.
    pub total_groups: usize,
    pub records: Vec<AggregateMetricRecord>,
    /// Computed over every group, not only the displayed ones.
    pub efficiency: EfficiencyReport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_agreement: Option<PathAgreement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_commits: u64,
    pub effective_commits: f64,
    pub overall_efficiency_pct: Option<f64>,
    pub weighted_lines_changed: f64,
    pub lines_changed: u64,
    pub contributors: usize,
    pub repositories: usize,
    pub categories: usize,
    pub first_commit_date: Option<NaiveDate>,
    pub last_commit_date: Option<NaiveDate>,
    pub deprioritized_categories: Vec<CategoryWeight>,
}

/// Per-request metrics computation over a [`FactAccessor`].
///
/// Category weights are loaded from the accessor on every call and never
/// kept between calls. The two read paths are not isolated from concurrent
/// weight edits: a weight changed between two accessor reads of one request
/// can leave the figures in one response slightly inconsistent with each
/// other.
#[derive(Debug)]
pub struct MetricsEngine<A> {
    accessor: A,
    config: EngineConfig,
}

impl MetricsEngine<SqliteStore> {
    pub fn open_workspace(workspace: impl AsRef<Path>) -> Result<Self, AnalysisError> {
        let workspace = workspace.as_ref();
        let config = load_workspace_config(workspace)?;
        let store = SqliteStore::open(store_path(workspace, &config))?;
        Ok(Self::new(store, config.engine))
    }
}

impl<A: FactAccessor> MetricsEngine<A> {
    pub fn new(accessor: A, config: EngineConfig) -> Self {
        Self { accessor, config }
    }

    pub fn accessor(&self) -> &A {
        &self.accessor
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self, query: MetricsQuery) -> Result<MetricsResponse, AnalysisError> {
        query.filter.validate()?;

        let precomputed = if self.config.prefer_precomputed {
            self.materialized_records(query.group_by, &query.filter, query.sort)?
        } else {
            None
        };

        let (path, mut records, path_agreement) = match precomputed {
            Some((stale_records, true)) => {
                let raw = self.aggregate_raw(query.group_by, &query.filter, query.sort)?;
                let agreement = compare_paths(
                    query.group_by,
                    &raw,
                    &stale_records,
                    effective_tolerance(&self.config),
                );
                tracing::warn!(
                    group_by = query.group_by.as_str(),
                    mismatches = agreement.mismatches.len(),
                    "materialized aggregate is stale, answering from raw facts"
                );
                (AggregationPath::Raw, raw, Some(agreement))
            }
            Some((records, false)) => {
                let agreement = if self.config.verify_paths {
                    let raw = self.aggregate_raw(query.group_by, &query.filter, query.sort)?;
                    Some(compare_paths(
                        query.group_by,
                        &raw,
                        &records,
                        effective_tolerance(&self.config),
                    ))
                } else {
                    None
                };
                (AggregationPath::Precomputed, records, agreement)
            }
            None => (
                AggregationPath::Raw,
                self.aggregate_raw(query.group_by, &query.filter, query.sort)?,
                None,
            ),
        };
        tracing::debug!(
            group_by = query.group_by.as_str(),
            path = ?path,
            groups = records.len(),
            "aggregated commit metrics"
        );

        let efficiency = report(&records);
        let total_groups = records.len();
        let limit = query
            .limit
            .unwrap_or(self.config.display_top_n as usize);
        if limit > 0 {
            records.truncate(limit);
        }

        Ok(MetricsResponse {
            group_by: query.group_by,
            path,
            total_groups,
            records,
            efficiency,
            path_agreement,
        })
    }

    /// On-the-fly path: weights every filtered fact and folds per group.
    pub fn aggregate_raw(
        &self,
        group_by: GroupBy,
        filter: &FactFilter,
        sort: SortOrder,
    ) -> Result<Vec<AggregateMetricRecord>, AnalysisError> {
        filter.validate()?;
        let facts = self.accessor.fetch_facts(filter)?;
        let weights = self.accessor.fetch_category_weights()?;
        let records = aggregate(
            AggregateInput::RawFacts {
                facts: &facts,
                lookup: &weights,
            },
            group_by,
            sort,
        )?;
        Ok(records)
    }

    /// Materialized path; `None` when the filter narrows the default window
    /// or nothing has been materialized yet. Stale rows are returned as-is.
    pub fn aggregate_precomputed(
        &self,
        group_by: GroupBy,
        filter: &FactFilter,
        sort: SortOrder,
    ) -> Result<Option<Vec<AggregateMetricRecord>>, AnalysisError> {
        Ok(self
            .materialized_records(group_by, filter, sort)?
            .map(|(records, _)| records))
    }

    /// Materialized records plus whether they predate the latest mutation.
    fn materialized_records(
        &self,
        group_by: GroupBy,
        filter: &FactFilter,
        sort: SortOrder,
    ) -> Result<Option<(Vec<AggregateMetricRecord>, bool)>, AnalysisError> {
        let Some(materialized) = self.accessor.fetch_precomputed_aggregate(group_by, filter)?
        else {
            return Ok(None);
        };
        let records = aggregate(
            AggregateInput::Precomputed(&materialized.rows),
            group_by,
            sort,
        )?;
        Ok(Some((records, materialized.stale)))
    }

    /// Efficiency over the full filtered fact set.
    pub fn efficiency(
        &self,
        group_by: GroupBy,
        filter: &FactFilter,
    ) -> Result<EfficiencyReport, AnalysisError> {
        let response = self.metrics(MetricsQuery {
            group_by,
            filter: filter.clone(),
            sort: SortOrder::default(),
            limit: Some(0),
        })?;
        Ok(response.efficiency)
    }

    /// Runs both paths over the default window and compares them. `None`
    /// when nothing has been materialized.
    pub fn verify_paths(&self, group_by: GroupBy) -> Result<Option<PathAgreement>, AnalysisError> {
        let filter = FactFilter::default();
        let Some(precomputed) = self.aggregate_precomputed(group_by, &filter, SortOrder::GroupKeyAsc)?
        else {
            return Ok(None);
        };
        let raw = self.aggregate_raw(group_by, &filter, SortOrder::GroupKeyAsc)?;
        Ok(Some(compare_paths(
            group_by,
            &raw,
            &precomputed,
            effective_tolerance(&self.config),
        )))
    }

    pub fn summary(&self, filter: &FactFilter) -> Result<DashboardSummary, AnalysisError> {
        filter.validate()?;
        let facts = self.accessor.fetch_facts(filter)?;
        let weights = self.accessor.fetch_category_weights()?;

        let mut weight_product_sum = 0u128;
        let mut weighted_lines_sum = 0u128;
        let mut lines_changed = 0u64;
        let mut contributors = BTreeSet::new();
        let mut repositories = BTreeSet::new();
        let mut categories = BTreeSet::new();
        for fact in &facts {
            let contribution = resolve(fact, &weights);
            weight_product_sum += u128::from(contribution.weight_product);
            weighted_lines_sum +=
                u128::from(fact.lines_changed()) * u128::from(contribution.weight_product);
            lines_changed += fact.lines_changed();
            contributors.insert(fact.author.as_str());
            repositories.insert(fact.repository.as_str());
            categories.insert(fact.category_key());
        }

        let total_commits = facts.len() as u64;
        let scale = f64::from(WEIGHT_PRODUCT_SCALE);
        let effective_commits = weight_product_sum as f64 / scale;

        Ok(DashboardSummary {
            total_commits,
            effective_commits,
            overall_efficiency_pct: efficiency_pct(effective_commits, total_commits),
            weighted_lines_changed: weighted_lines_sum as f64 / scale,
            lines_changed,
            contributors: contributors.len(),
            repositories: repositories.len(),
            categories: categories.len(),
            first_commit_date: facts.iter().map(|fact| fact.commit_date).min(),
            last_commit_date: facts.iter().map(|fact| fact.commit_date).max(),
            deprioritized_categories: deprioritized_categories(&weights),
        })
    }
}
