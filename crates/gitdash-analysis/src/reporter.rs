use gitdash_core::{
    AggregateMetricRecord, CategoryWeight, CategoryWeights, FULL_WEIGHT, GroupBy, efficiency_pct,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeprioritizedGroup {
    pub group_by: GroupBy,
    pub group: String,
    pub weight_efficiency_pct: f64,
    pub total_commits: u64,
    pub effective_commits: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyReport {
    /// `100 × Σeffective / Σtotal`; `None` when there are no commits.
    pub overall_efficiency_pct: Option<f64>,
    pub total_commits: u64,
    pub effective_commits: f64,
    pub groups_considered: usize,
    pub deprioritized: Vec<DeprioritizedGroup>,
}

/// Derives efficiency figures from aggregator output.
///
/// `records` must be the full record set for the request. Passing a list
/// already truncated for display drops low-volume groups from
/// `deprioritized` and skews the overall figure.
pub fn report(records: &[AggregateMetricRecord]) -> EfficiencyReport {
    let total_commits = records.iter().map(|record| record.total_commits).sum::<u64>();
    let effective_commits = records
        .iter()
        .map(|record| record.effective_commits)
        .sum::<f64>();

    let mut deprioritized = records
        .iter()
        .filter_map(|record| {
            let pct = efficiency_pct(record.effective_commits, record.total_commits)?;
            (pct < f64::from(FULL_WEIGHT)).then(|| DeprioritizedGroup {
                group_by: record.group_by,
                group: record.group_key.clone(),
                weight_efficiency_pct: pct,
                total_commits: record.total_commits,
                effective_commits: record.effective_commits,
            })
        })
        .collect::<Vec<_>>();
    deprioritized.sort_by(|left, right| {
        right
            .total_commits
            .cmp(&left.total_commits)
            .then_with(|| left.group.cmp(&right.group))
    });

    EfficiencyReport {
        overall_efficiency_pct: efficiency_pct(effective_commits, total_commits),
        total_commits,
        effective_commits,
        groups_considered: records.len(),
        deprioritized,
    }
}

/// Configured categories below full weight, lowest weight first.
pub fn deprioritized_categories(weights: &CategoryWeights) -> Vec<CategoryWeight> {
    let mut categories = weights
        .iter()
        .filter(|entry| !entry.weight.is_full())
        .collect::<Vec<_>>();
    categories.sort_by(|left, right| {
        left.weight
            .cmp(&right.weight)
            .then_with(|| left.category.cmp(&right.category))
    });
    categories
}
