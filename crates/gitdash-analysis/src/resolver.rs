use std::collections::{BTreeMap, HashMap};

use gitdash_core::{CategoryWeights, CommitFact, FULL_WEIGHT, Weight};
use serde::{Deserialize, Serialize};

/// Scale of `commit.weight × category.weight`.
pub const WEIGHT_PRODUCT_SCALE: u32 = (FULL_WEIGHT as u32) * (FULL_WEIGHT as u32);

/// Category weight source for one request. Unset or unknown categories must
/// resolve to [`Weight::FULL`].
pub trait CategoryWeightLookup {
    fn category_weight(&self, category: Option<&str>) -> Weight;
}

impl CategoryWeightLookup for CategoryWeights {
    fn category_weight(&self, category: Option<&str>) -> Weight {
        self.weight_for(category)
    }
}

impl CategoryWeightLookup for HashMap<String, Weight> {
    fn category_weight(&self, category: Option<&str>) -> Weight {
        category
            .and_then(|name| self.get(name))
            .copied()
            .unwrap_or_default()
    }
}

impl CategoryWeightLookup for BTreeMap<String, Weight> {
    fn category_weight(&self, category: Option<&str>) -> Weight {
        category
            .and_then(|name| self.get(name))
            .copied()
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectiveContribution {
    pub commit_weight: Weight,
    pub category_weight: Weight,
    /// Exact `commit.weight × category.weight`, in `0..=10000`.
    pub weight_product: u32,
    pub combined_weight: f64,
    pub effective_commit: f64,
    pub weighted_lines_changed: f64,
    pub weighted_lines_added: f64,
    pub weighted_lines_deleted: f64,
}

impl EffectiveContribution {
    pub fn is_fully_weighted(&self) -> bool {
        self.weight_product == WEIGHT_PRODUCT_SCALE
    }
}

/// Effective contribution of one fact. Weights are combined multiplicatively
/// for every grouping dimension.
pub fn resolve(fact: &CommitFact, lookup: &dyn CategoryWeightLookup) -> EffectiveContribution {
    let commit_weight = fact.weight;
    let category_weight = lookup.category_weight(fact.category.as_deref());
    let weight_product = u32::from(commit_weight.get()) * u32::from(category_weight.get());
    let scale = f64::from(WEIGHT_PRODUCT_SCALE);

    EffectiveContribution {
        commit_weight,
        category_weight,
        weight_product,
        combined_weight: f64::from(weight_product) / f64::from(FULL_WEIGHT),
        effective_commit: f64::from(weight_product) / scale,
        weighted_lines_changed: weighted_lines(fact.lines_changed(), weight_product),
        weighted_lines_added: weighted_lines(fact.lines_added, weight_product),
        weighted_lines_deleted: weighted_lines(fact.lines_deleted, weight_product),
    }
}

fn weighted_lines(lines: u64, weight_product: u32) -> f64 {
    (u128::from(lines) * u128::from(weight_product)) as f64 / f64::from(WEIGHT_PRODUCT_SCALE)
}
