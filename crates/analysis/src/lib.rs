pub mod aggregate;
pub mod categorize;
pub mod enrich;
pub mod metrics;
pub mod outliers;
pub mod summary;

pub use aggregate::{
    contributor_activity, merge_activity, summarize_issues, summarize_pull_requests,
    ContributorCounts, IssueSummary, PullRequestSummary, RepositoryActivity,
};
pub use categorize::{is_stale, ActivityCategory, SizeCategory};
pub use enrich::{enrich_repositories, EnrichedRepository};
pub use metrics::{with_merge_times, with_resolution_times, RatioMetrics};
pub use outliers::{apply_outlier_rules, handle_outliers};
pub use summary::{RunSummary, TopRepository};
