mod filter;
mod weight;

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use filter::{ALL_REPOSITORIES, FactFilter, RepositoryFilter};
pub use weight::{FULL_WEIGHT, Weight};

pub const UNCATEGORIZED: &str = "uncategorized";
pub const MONTH_KEY_FORMAT: &str = "%Y-%m";
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const MAX_COMMIT_YEAR: i32 = 9999;

/// Largest allowed disagreement on `effective_commits` between the
/// materialized and the on-the-fly aggregation paths.
pub const CONSISTENCY_TOLERANCE: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid filter: date_from {from} is after date_to {to}")]
    InvalidFilter { from: NaiveDate, to: NaiveDate },
    #[error("invalid weight {value}: expected an integer in 0..=100")]
    InvalidWeight { value: i64 },
    #[error("malformed weight '{0}': expected an integer in 0..=100")]
    MalformedWeight(String),
    #[error(
        "unsupported group-by dimension '{0}', expected one of: month, contributor, category, repository"
    )]
    UnsupportedGroupBy(String),
    #[error("commit date {date} is outside years 0000..=9999")]
    DateOutOfRange { date: NaiveDate },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    Month,
    Contributor,
    Category,
    Repository,
}

impl GroupBy {
    pub const ALL: [Self; 4] = [
        Self::Month,
        Self::Contributor,
        Self::Category,
        Self::Repository,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Month => "month",
            Self::Contributor => "contributor",
            Self::Category => "category",
            Self::Repository => "repository",
        }
    }

    /// Group key of a fact under this dimension. Must stay in sync with the
    /// SQL that materializes aggregates.
    pub fn key_for(self, fact: &CommitFact) -> String {
        match self {
            Self::Month => fact.month_key(),
            Self::Contributor => fact.author.clone(),
            Self::Category => fact.category_key().to_owned(),
            Self::Repository => fact.repository.clone(),
        }
    }
}

impl std::str::FromStr for GroupBy {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "month" => Ok(Self::Month),
            "contributor" | "author" => Ok(Self::Contributor),
            "category" => Ok(Self::Category),
            "repository" | "repo" => Ok(Self::Repository),
            other => Err(EngineError::UnsupportedGroupBy(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    TotalCommitsDesc,
    EffectiveCommitsDesc,
    WeightedLinesChangedDesc,
    GroupKeyAsc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TotalCommitsDesc => "total_commits",
            Self::EffectiveCommitsDesc => "effective_commits",
            Self::WeightedLinesChangedDesc => "weighted_lines_changed",
            Self::GroupKeyAsc => "group_key",
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "total_commits" => Ok(Self::TotalCommitsDesc),
            "effective_commits" => Ok(Self::EffectiveCommitsDesc),
            "weighted_lines_changed" => Ok(Self::WeightedLinesChangedDesc),
            "group_key" => Ok(Self::GroupKeyAsc),
            other => Err(format!(
                "invalid sort '{other}', expected one of: total_commits, effective_commits, weighted_lines_changed, group_key"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitFact {
    pub commit_hash: String,
    pub repository: String,
    pub author: String,
    pub commit_date: NaiveDate,
    pub lines_added: u64,
    pub lines_deleted: u64,
    #[serde(default)]
    pub weight: Weight,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl CommitFact {
    pub fn lines_changed(&self) -> u64 {
        self.lines_added + self.lines_deleted
    }

    pub fn month_key(&self) -> String {
        self.commit_date.format(MONTH_KEY_FORMAT).to_string()
    }

    pub fn category_key(&self) -> &str {
        self.category.as_deref().unwrap_or(UNCATEGORIZED)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryWeight {
    pub category: String,
    #[serde(default)]
    pub weight: Weight,
}

/// Snapshot of the category weight table for one request. Categories that
/// are unset or missing from the table weigh 100.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoryWeights {
    weights: BTreeMap<String, Weight>,
}

impl CategoryWeights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, category: impl Into<String>, weight: Weight) {
        self.weights.insert(category.into(), weight);
    }

    pub fn weight_for(&self, category: Option<&str>) -> Weight {
        category
            .and_then(|name| self.weights.get(name))
            .copied()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = CategoryWeight> + '_ {
        self.weights.iter().map(|(category, weight)| CategoryWeight {
            category: category.clone(),
            weight: *weight,
        })
    }
}

impl FromIterator<CategoryWeight> for CategoryWeights {
    fn from_iter<T: IntoIterator<Item = CategoryWeight>>(iter: T) -> Self {
        Self {
            weights: iter
                .into_iter()
                .map(|entry| (entry.category, entry.weight))
                .collect(),
        }
    }
}

/// One aggregation group as handed to callers. Both aggregation paths
/// produce this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetricRecord {
    pub group_by: GroupBy,
    pub group_key: String,
    pub total_commits: u64,
    pub effective_commits: f64,
    pub avg_weight: Option<f64>,
    pub weight_efficiency_pct: Option<f64>,
    pub weighted_lines_changed: f64,
    pub weighted_lines_added: f64,
    pub weighted_lines_deleted: f64,
    pub lines_changed: u64,
    pub lines_added: u64,
    pub lines_deleted: u64,
}

impl AggregateMetricRecord {
    /// Every commit in the group carried a combined weight of 100. Callers
    /// use this to decide whether the efficiency fields are worth showing.
    pub fn is_fully_weighted(&self) -> bool {
        self.weight_efficiency_pct
            .is_none_or(|pct| pct >= f64::from(FULL_WEIGHT))
    }

    pub fn is_deprioritized(&self) -> bool {
        self.weight_efficiency_pct
            .is_some_and(|pct| pct < f64::from(FULL_WEIGHT))
    }
}

/// A row of the materialized aggregate as stored. `stored_efficiency_pct`
/// is whatever the last refresh wrote and is never trusted for output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecomputedAggregateRow {
    pub group_by: GroupBy,
    pub group_key: String,
    pub total_commits: u64,
    pub effective_commits: f64,
    pub weighted_lines_changed: f64,
    pub weighted_lines_added: f64,
    pub weighted_lines_deleted: f64,
    pub lines_changed: u64,
    pub lines_added: u64,
    pub lines_deleted: u64,
    pub stored_efficiency_pct: Option<f64>,
    pub refreshed_at: i64,
}

/// `100 × effective / total`, undefined for an empty group.
pub fn efficiency_pct(effective_commits: f64, total_commits: u64) -> Option<f64> {
    if total_commits == 0 {
        return None;
    }
    Some(100.0 * effective_commits / total_commits as f64)
}

/// Empty or whitespace-only categories mean "uncategorized".
pub fn normalize_category(category: Option<String>) -> Option<String> {
    category
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
}

/// Stored dates are fixed-width `YYYY-MM-DD` text, so only four-digit years
/// are accepted.
pub fn check_commit_date(date: NaiveDate) -> Result<NaiveDate, EngineError> {
    if (0..=MAX_COMMIT_YEAR).contains(&date.year()) {
        Ok(date)
    } else {
        Err(EngineError::DateOutOfRange { date })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fact(category: Option<&str>) -> CommitFact {
        CommitFact {
            commit_hash: "abc123".to_owned(),
            repository: "web".to_owned(),
            author: "ada".to_owned(),
            commit_date: parse_date("2024-02-29").expect("date"),
            lines_added: 12,
            lines_deleted: 3,
            weight: Weight::FULL,
            category: category.map(str::to_owned),
        }
    }

    #[test]
    fn group_keys_follow_each_dimension() {
        let fact = sample_fact(Some("refactor"));

        assert_eq!(GroupBy::Month.key_for(&fact), "2024-02");
        assert_eq!(GroupBy::Contributor.key_for(&fact), "ada");
        assert_eq!(GroupBy::Category.key_for(&fact), "refactor");
        assert_eq!(GroupBy::Repository.key_for(&fact), "web");
        assert_eq!(GroupBy::Category.key_for(&sample_fact(None)), UNCATEGORIZED);
    }

    #[test]
    fn group_by_parsing_rejects_unknown_dimensions() {
        assert_eq!("month".parse::<GroupBy>(), Ok(GroupBy::Month));
        assert_eq!("author".parse::<GroupBy>(), Ok(GroupBy::Contributor));
        assert_eq!("repo".parse::<GroupBy>(), Ok(GroupBy::Repository));
        assert_eq!(
            "weekday".parse::<GroupBy>(),
            Err(EngineError::UnsupportedGroupBy("weekday".to_owned()))
        );
    }

    #[test]
    fn efficiency_is_undefined_for_empty_groups() {
        assert_eq!(efficiency_pct(0.0, 0), None);
        assert_eq!(efficiency_pct(1.5, 3), Some(50.0));
        assert_eq!(efficiency_pct(4.0, 4), Some(100.0));
    }

    #[test]
    fn category_weights_default_to_full_for_unset_or_unknown() {
        let weights: CategoryWeights = [CategoryWeight {
            category: "chore".to_owned(),
            weight: Weight::new(30).expect("weight"),
        }]
        .into_iter()
        .collect();

        assert_eq!(weights.weight_for(Some("chore")).get(), 30);
        assert_eq!(weights.weight_for(Some("feature")), Weight::FULL);
        assert_eq!(weights.weight_for(None), Weight::FULL);
        assert_eq!(weights.len(), 1);
    }

    #[test]
    fn commit_dates_need_four_digit_years() {
        let ok = NaiveDate::from_ymd_opt(9999, 12, 31).expect("date");
        assert_eq!(check_commit_date(ok), Ok(ok));
        let epoch = NaiveDate::from_ymd_opt(0, 1, 1).expect("date");
        assert_eq!(epoch.format(DATE_FORMAT).to_string(), "0000-01-01");
        assert_eq!(check_commit_date(epoch), Ok(epoch));

        for date in [
            NaiveDate::from_ymd_opt(10000, 3, 1).expect("date"),
            NaiveDate::from_ymd_opt(-1, 3, 1).expect("date"),
        ] {
            assert_eq!(
                check_commit_date(date),
                Err(EngineError::DateOutOfRange { date })
            );
        }
    }

    #[test]
    fn lines_changed_sums_added_and_deleted() {
        assert_eq!(sample_fact(None).lines_changed(), 15);
    }

    #[test]
    fn blank_categories_normalize_to_none() {
        assert_eq!(normalize_category(Some("  ".to_owned())), None);
        assert_eq!(
            normalize_category(Some(" docs ".to_owned())),
            Some("docs".to_owned())
        );
        assert_eq!(normalize_category(None), None);
    }
}
