use chrono::{DateTime, Duration, Utc};
use normalizer::{Issue, PullRequest};
use serde::{Deserialize, Serialize};

use crate::enrich::EnrichedRepository;

const NEW_REPOSITORY_WINDOW_DAYS: i64 = 30;
const SIGNIFICANT_GROWTH_SHARE: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopRepository {
    pub full_name: String,
    pub stars: f64,
}

/// Headline numbers over one run's output tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_repositories: usize,
    pub total_stars: f64,
    pub total_forks: f64,
    pub total_issues: usize,
    pub total_pull_requests: usize,
    pub avg_issue_resolution_days: Option<f64>,
    pub avg_pr_merge_time_days: Option<f64>,
    pub top_repository: Option<TopRepository>,
    pub new_repositories: usize,
    pub significant_growth: bool,
}

fn non_negative_mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .filter(|v| *v >= 0.0)
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

impl RunSummary {
    pub fn compute(
        repos: &[EnrichedRepository],
        issues: &[Issue],
        prs: &[PullRequest],
        now: DateTime<Utc>,
    ) -> Self {
        let top_repository = repos
            .iter()
            .filter(|row| !row.repository.stars.is_nan())
            .fold(None::<&EnrichedRepository>, |best, row| match best {
                Some(current) if current.repository.stars >= row.repository.stars => Some(current),
                _ => Some(row),
            })
            .map(|row| TopRepository {
                full_name: row.repository.full_name.clone(),
                stars: row.repository.stars,
            });

        let window_start = now - Duration::days(NEW_REPOSITORY_WINDOW_DAYS);
        let new_repositories = repos
            .iter()
            .filter(|row| {
                row.repository
                    .created_at
                    .map_or(false, |created| created >= window_start)
            })
            .count();
        let significant_growth = !repos.is_empty()
            && new_repositories as f64 > repos.len() as f64 * SIGNIFICANT_GROWTH_SHARE;

        Self {
            total_repositories: repos.len(),
            total_stars: repos.iter().map(|row| row.repository.stars).sum(),
            total_forks: repos.iter().map(|row| row.repository.forks).sum(),
            total_issues: issues.len(),
            total_pull_requests: prs.len(),
            avg_issue_resolution_days: non_negative_mean(
                issues.iter().map(|issue| issue.resolution_time_days),
            ),
            avg_pr_merge_time_days: non_negative_mean(prs.iter().map(|pr| pr.merge_time_days)),
            top_repository,
            new_repositories,
            significant_growth,
        }
    }
}
