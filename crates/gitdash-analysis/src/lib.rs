mod aggregator;
mod engine;
mod reporter;
mod resolver;

pub use aggregator::{
    AggregateInput, PathAgreement, PathMismatch, aggregate, compare_paths, sort_records,
};
pub use engine::{
    AggregationPath, AnalysisError, DashboardSummary, MetricsEngine, MetricsQuery,
    MetricsResponse,
};
pub use reporter::{DeprioritizedGroup, EfficiencyReport, deprioritized_categories, report};
pub use resolver::{CategoryWeightLookup, EffectiveContribution, WEIGHT_PRODUCT_SCALE, resolve};
