use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use gitdash_core::{
    AggregateMetricRecord, CommitFact, EngineError, GroupBy, PrecomputedAggregateRow, SortOrder,
    efficiency_pct,
};
use serde::{Deserialize, Serialize};

use crate::resolver::{CategoryWeightLookup, WEIGHT_PRODUCT_SCALE, resolve};

/// Either raw facts to be weighted on the fly, or rows of the materialized
/// aggregate that already carry group-level weighted sums.
#[derive(Clone, Copy)]
pub enum AggregateInput<'a> {
    RawFacts {
        facts: &'a [CommitFact],
        lookup: &'a dyn CategoryWeightLookup,
    },
    Precomputed(&'a [PrecomputedAggregateRow]),
}

#[derive(Debug, Default)]
struct GroupAccumulator {
    total_commits: u64,
    weight_product_sum: u128,
    weighted_added_sum: u128,
    weighted_deleted_sum: u128,
    lines_added: u64,
    lines_deleted: u64,
}

impl GroupAccumulator {
    fn add(&mut self, fact: &CommitFact, weight_product: u32) {
        let weight_product = u128::from(weight_product);
        self.total_commits += 1;
        self.weight_product_sum += weight_product;
        self.weighted_added_sum += u128::from(fact.lines_added) * weight_product;
        self.weighted_deleted_sum += u128::from(fact.lines_deleted) * weight_product;
        self.lines_added += fact.lines_added;
        self.lines_deleted += fact.lines_deleted;
    }

    fn finish(self, group_by: GroupBy, group_key: String) -> AggregateMetricRecord {
        let scale = f64::from(WEIGHT_PRODUCT_SCALE);
        let effective_commits = self.weight_product_sum as f64 / scale;
        let efficiency = efficiency_pct(effective_commits, self.total_commits);

        AggregateMetricRecord {
            group_by,
            group_key,
            total_commits: self.total_commits,
            effective_commits,
            avg_weight: efficiency,
            weight_efficiency_pct: efficiency,
            weighted_lines_changed: (self.weighted_added_sum + self.weighted_deleted_sum) as f64
                / scale,
            weighted_lines_added: self.weighted_added_sum as f64 / scale,
            weighted_lines_deleted: self.weighted_deleted_sum as f64 / scale,
            lines_changed: self.lines_added + self.lines_deleted,
            lines_added: self.lines_added,
            lines_deleted: self.lines_deleted,
        }
    }
}

/// Folds `input` into one record per distinct group key, sorted by `sort`.
///
/// Precomputed rows pass through unchanged except that `avg_weight` and
/// `weight_efficiency_pct` are recomputed from `effective_commits` and
/// `total_commits`; the stored efficiency column goes stale when weights are
/// edited without a refresh.
pub fn aggregate(
    input: AggregateInput<'_>,
    group_by: GroupBy,
    sort: SortOrder,
) -> Result<Vec<AggregateMetricRecord>, EngineError> {
    let mut records = match input {
        AggregateInput::RawFacts { facts, lookup } => aggregate_raw(facts, lookup, group_by),
        AggregateInput::Precomputed(rows) => aggregate_precomputed(rows, group_by)?,
    };
    sort_records(&mut records, sort);
    Ok(records)
}

fn aggregate_raw(
    facts: &[CommitFact],
    lookup: &dyn CategoryWeightLookup,
    group_by: GroupBy,
) -> Vec<AggregateMetricRecord> {
    let mut groups = BTreeMap::<String, GroupAccumulator>::new();
    for fact in facts {
        let contribution = resolve(fact, lookup);
        groups
            .entry(group_by.key_for(fact))
            .or_default()
            .add(fact, contribution.weight_product);
    }

    groups
        .into_iter()
        .map(|(group_key, accumulator)| accumulator.finish(group_by, group_key))
        .collect()
}

fn aggregate_precomputed(
    rows: &[PrecomputedAggregateRow],
    group_by: GroupBy,
) -> Result<Vec<AggregateMetricRecord>, EngineError> {
    rows.iter()
        .map(|row| {
            if row.group_by != group_by {
                return Err(EngineError::UnsupportedGroupBy(format!(
                    "{} (materialized row '{}' belongs to {})",
                    group_by.as_str(),
                    row.group_key,
                    row.group_by.as_str()
                )));
            }

            let efficiency = efficiency_pct(row.effective_commits, row.total_commits);
            Ok(AggregateMetricRecord {
                group_by,
                group_key: row.group_key.clone(),
                total_commits: row.total_commits,
                effective_commits: row.effective_commits,
                avg_weight: efficiency,
                weight_efficiency_pct: efficiency,
                weighted_lines_changed: row.weighted_lines_changed,
                weighted_lines_added: row.weighted_lines_added,
                weighted_lines_deleted: row.weighted_lines_deleted,
                lines_changed: row.lines_changed,
                lines_added: row.lines_added,
                lines_deleted: row.lines_deleted,
            })
        })
        .collect()
}

/// Orders records by `sort`; ties fall back to ascending group key so
/// output is deterministic.
pub fn sort_records(records: &mut [AggregateMetricRecord], sort: SortOrder) {
    records.sort_by(|left, right| {
        let primary = match sort {
            SortOrder::TotalCommitsDesc => right.total_commits.cmp(&left.total_commits),
            SortOrder::EffectiveCommitsDesc => {
                right.effective_commits.total_cmp(&left.effective_commits)
            }
            SortOrder::WeightedLinesChangedDesc => right
                .weighted_lines_changed
                .total_cmp(&left.weighted_lines_changed),
            SortOrder::GroupKeyAsc => Ordering::Equal,
        };
        primary.then_with(|| left.group_key.cmp(&right.group_key))
    });
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathMismatch {
    pub group_key: String,
    pub raw_effective_commits: f64,
    pub precomputed_effective_commits: f64,
    pub difference: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathAgreement {
    pub group_by: GroupBy,
    pub tolerance: f64,
    pub compared_groups: usize,
    pub mismatches: Vec<PathMismatch>,
}

impl PathAgreement {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Compares `effective_commits` per group between the two paths. A group
/// missing on one side counts as zero there. Every mismatch beyond
/// `tolerance` is logged.
pub fn compare_paths(
    group_by: GroupBy,
    raw: &[AggregateMetricRecord],
    precomputed: &[AggregateMetricRecord],
    tolerance: f64,
) -> PathAgreement {
    let raw_by_key = raw
        .iter()
        .map(|record| (record.group_key.as_str(), record.effective_commits))
        .collect::<BTreeMap<_, _>>();
    let precomputed_by_key = precomputed
        .iter()
        .map(|record| (record.group_key.as_str(), record.effective_commits))
        .collect::<BTreeMap<_, _>>();
    let keys = raw_by_key
        .keys()
        .chain(precomputed_by_key.keys())
        .copied()
        .collect::<BTreeSet<_>>();

    let mut mismatches = Vec::new();
    for key in &keys {
        let raw_value = raw_by_key.get(key).copied().unwrap_or(0.0);
        let precomputed_value = precomputed_by_key.get(key).copied().unwrap_or(0.0);
        let difference = (raw_value - precomputed_value).abs();
        if difference > tolerance {
            tracing::warn!(
                group_by = group_by.as_str(),
                group_key = *key,
                raw_effective_commits = raw_value,
                precomputed_effective_commits = precomputed_value,
                difference,
                tolerance,
                "aggregation paths disagree on effective_commits"
            );
            mismatches.push(PathMismatch {
                group_key: (*key).to_owned(),
                raw_effective_commits: raw_value,
                precomputed_effective_commits: precomputed_value,
                difference,
            });
        }
    }

    PathAgreement {
        group_by,
        tolerance,
        compared_groups: keys.len(),
        mismatches,
    }
}

#[cfg(test)]
mod tests {
    use gitdash_core::{CategoryWeights, CommitFact, Weight, parse_date};

    use super::*;

    fn fact(hash: &str, author: &str, day: &str, weight: i64, category: Option<&str>) -> CommitFact {
        CommitFact {
            commit_hash: hash.to_owned(),
            repository: "web".to_owned(),
            author: author.to_owned(),
            commit_date: parse_date(day).expect("date"),
            lines_added: 10,
            lines_deleted: 2,
            weight: Weight::new(weight).expect("weight"),
            category: category.map(str::to_owned),
        }
    }

    fn raw<'a>(facts: &'a [CommitFact], lookup: &'a CategoryWeights) -> AggregateInput<'a> {
        AggregateInput::RawFacts { facts, lookup }
    }

    #[test]
    fn three_commits_with_mixed_weights_average_to_half() {
        let facts = vec![
            fact("c1", "ada", "2024-01-01", 100, None),
            fact("c2", "ada", "2024-01-02", 50, None),
            fact("c3", "ada", "2024-01-03", 0, None),
        ];
        let weights = CategoryWeights::new();

        let records = aggregate(
            raw(&facts, &weights),
            GroupBy::Contributor,
            SortOrder::default(),
        )
        .expect("aggregate");

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.total_commits, 3);
        assert_eq!(record.effective_commits, 1.5);
        assert_eq!(record.weight_efficiency_pct, Some(50.0));
        assert_eq!(record.avg_weight, record.weight_efficiency_pct);
        assert_eq!(record.weighted_lines_changed, 12.0 * 1.5);
        assert_eq!(record.lines_changed, 36);
    }

    #[test]
    fn effective_commits_equal_total_only_when_fully_weighted() {
        let facts = vec![
            fact("c1", "ada", "2024-01-01", 100, None),
            fact("c2", "ada", "2024-01-02", 100, Some("feature")),
            fact("c3", "grace", "2024-01-03", 100, Some("chore")),
            fact("c4", "grace", "2024-01-04", 100, None),
        ];
        let mut weights = CategoryWeights::new();
        weights.insert("chore", Weight::new(99).expect("weight"));

        let records = aggregate(
            raw(&facts, &weights),
            GroupBy::Contributor,
            SortOrder::GroupKeyAsc,
        )
        .expect("aggregate");

        let ada = &records[0];
        assert_eq!(ada.effective_commits, ada.total_commits as f64);
        assert_eq!(ada.weight_efficiency_pct, Some(100.0));
        assert!(ada.is_fully_weighted());

        let grace = &records[1];
        assert!(grace.effective_commits < grace.total_commits as f64);
        assert!(grace.is_deprioritized());
    }

    #[test]
    fn groups_by_month_and_sorts_by_total_then_key() {
        let facts = vec![
            fact("c1", "ada", "2024-01-05", 100, None),
            fact("c2", "ada", "2024-02-05", 100, None),
            fact("c3", "ada", "2024-02-06", 100, None),
            fact("c4", "ada", "2024-03-07", 100, None),
        ];
        let weights = CategoryWeights::new();

        let records = aggregate(raw(&facts, &weights), GroupBy::Month, SortOrder::default())
            .expect("aggregate");
        let keys = records
            .iter()
            .map(|record| record.group_key.as_str())
            .collect::<Vec<_>>();
        assert_eq!(keys, vec!["2024-02", "2024-01", "2024-03"]);
    }

    #[test]
    fn precomputed_rows_get_fresh_efficiency_instead_of_stored_value() {
        let rows = vec![PrecomputedAggregateRow {
            group_by: GroupBy::Category,
            group_key: "chore".to_owned(),
            total_commits: 4,
            effective_commits: 1.0,
            weighted_lines_changed: 8.0,
            weighted_lines_added: 6.0,
            weighted_lines_deleted: 2.0,
            lines_changed: 32,
            lines_added: 24,
            lines_deleted: 8,
            stored_efficiency_pct: Some(100.0),
            refreshed_at: 1_700_000_000_000,
        }];

        let records = aggregate(
            AggregateInput::Precomputed(&rows),
            GroupBy::Category,
            SortOrder::default(),
        )
        .expect("aggregate");

        assert_eq!(records[0].weight_efficiency_pct, Some(25.0));
        assert_eq!(records[0].avg_weight, Some(25.0));
        assert_eq!(records[0].weighted_lines_changed, 8.0);
    }

    #[test]
    fn precomputed_rows_for_another_dimension_fail_loudly() {
        let rows = vec![PrecomputedAggregateRow {
            group_by: GroupBy::Month,
            group_key: "2024-01".to_owned(),
            total_commits: 1,
            effective_commits: 1.0,
            weighted_lines_changed: 0.0,
            weighted_lines_added: 0.0,
            weighted_lines_deleted: 0.0,
            lines_changed: 0,
            lines_added: 0,
            lines_deleted: 0,
            stored_efficiency_pct: None,
            refreshed_at: 0,
        }];

        let err = aggregate(
            AggregateInput::Precomputed(&rows),
            GroupBy::Repository,
            SortOrder::default(),
        )
        .expect_err("dimension mismatch");
        assert!(matches!(err, EngineError::UnsupportedGroupBy(_)));
    }

    #[test]
    fn aggregating_twice_is_idempotent() {
        let facts = vec![
            fact("c1", "ada", "2024-01-01", 70, Some("chore")),
            fact("c2", "grace", "2024-01-02", 20, None),
        ];
        let mut weights = CategoryWeights::new();
        weights.insert("chore", Weight::new(40).expect("weight"));

        let first = aggregate(raw(&facts, &weights), GroupBy::Category, SortOrder::default())
            .expect("first");
        let second = aggregate(raw(&facts, &weights), GroupBy::Category, SortOrder::default())
            .expect("second");
        assert_eq!(first, second);
    }

    #[test]
    fn empty_input_yields_no_records() {
        let weights = CategoryWeights::new();
        let records = aggregate(raw(&[], &weights), GroupBy::Month, SortOrder::default())
            .expect("aggregate");
        assert!(records.is_empty());
    }

    #[test]
    fn compare_paths_reports_missing_and_diverging_groups() {
        let facts = vec![
            fact("c1", "ada", "2024-01-01", 100, None),
            fact("c2", "grace", "2024-01-02", 100, None),
        ];
        let weights = CategoryWeights::new();
        let raw_records = aggregate(
            raw(&facts, &weights),
            GroupBy::Contributor,
            SortOrder::default(),
        )
        .expect("aggregate");

        let mut stale = raw_records.clone();
        stale[0].effective_commits -= 0.04;
        let agreement = compare_paths(GroupBy::Contributor, &raw_records, &stale, 0.05);
        assert!(agreement.is_consistent());
        assert_eq!(agreement.compared_groups, 2);

        stale.pop();
        let agreement = compare_paths(GroupBy::Contributor, &raw_records, &stale, 0.05);
        assert!(!agreement.is_consistent());
        assert_eq!(agreement.mismatches.len(), 1);
        assert_eq!(agreement.mismatches[0].group_key, "grace");
        assert_eq!(agreement.mismatches[0].precomputed_effective_commits, 0.0);
    }
}
