use chrono::{DateTime, Utc};
use common::config::PipelineConfig;
use normalizer::{Issue, PullRequest, Repository};
use serde::{Deserialize, Serialize};

use crate::aggregate::{merge_activity, RepositoryActivity};
use crate::categorize::{days_since_update, is_stale, ActivityCategory, SizeCategory};
use crate::metrics::{age_days, RatioMetrics};

/// A cleaned repository together with every column the pipeline derives for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRepository {
    #[serde(flatten)]
    pub repository: Repository,
    pub age_days: f64,
    pub days_since_update: f64,
    pub activity_category: ActivityCategory,
    #[serde(flatten)]
    pub activity: RepositoryActivity,
    #[serde(flatten)]
    pub ratios: RatioMetrics,
    pub stale: bool,
    pub size_category: SizeCategory,
}

impl EnrichedRepository {
    pub fn new(
        repository: Repository,
        activity: RepositoryActivity,
        config: &PipelineConfig,
        now: DateTime<Utc>,
    ) -> Self {
        let age = age_days(repository.created_at, now);
        let since_update = days_since_update(repository.updated_at, now);
        let ratios = RatioMetrics::compute(&repository, activity.contributors.total_contributors, age);
        Self {
            age_days: age,
            days_since_update: since_update,
            activity_category: ActivityCategory::from_days_since_update(since_update),
            stale: is_stale(repository.updated_at, now, config.stale_after_days),
            size_category: SizeCategory::from_stars(repository.stars, &config.size_bins),
            activity,
            ratios,
            repository,
        }
    }
}

/// Aggregates issue and pull-request activity onto each repository, then
/// categorizes and derives the ratio columns. Rows keep their input order.
pub fn enrich_repositories(
    repos: Vec<Repository>,
    issues: Option<&[Issue]>,
    prs: Option<&[PullRequest]>,
    config: &PipelineConfig,
    now: DateTime<Utc>,
) -> Vec<EnrichedRepository> {
    merge_activity(repos, issues, prs)
        .into_iter()
        .map(|(repo, activity)| EnrichedRepository::new(repo, activity, config, now))
        .collect()
}
