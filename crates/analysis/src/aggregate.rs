use std::collections::{HashMap, HashSet};

use normalizer::{
    Issue, IssueState, PullRequest, PullRequestState, Repository, RepositoryScoped,
    MISSING_DURATION,
};
use serde::{Deserialize, Serialize};

use crate::metrics::duration_days;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IssueSummary {
    pub issue_count: u64,
    pub open_issue_fraction: f64,
    pub avg_issue_resolution_days: f64,
}

impl Default for IssueSummary {
    fn default() -> Self {
        Self {
            issue_count: 0,
            open_issue_fraction: 0.0,
            avg_issue_resolution_days: MISSING_DURATION,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PullRequestSummary {
    pub pr_count: u64,
    pub merge_rate: f64,
    pub avg_pr_close_days: f64,
    pub avg_pr_merge_time_days: f64,
}

impl Default for PullRequestSummary {
    fn default() -> Self {
        Self {
            pr_count: 0,
            merge_rate: 0.0,
            avg_pr_close_days: MISSING_DURATION,
            avg_pr_merge_time_days: MISSING_DURATION,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributorCounts {
    pub issue_contributors: u64,
    pub pr_contributors: u64,
    pub total_contributors: u64,
}

/// Everything the aggregator knows about one repository's activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryActivity {
    #[serde(flatten)]
    pub issues: IssueSummary,
    #[serde(flatten)]
    pub pull_requests: PullRequestSummary,
    #[serde(flatten)]
    pub contributors: ContributorCounts,
}

#[derive(Default)]
struct Mean {
    sum: f64,
    count: u64,
}

impl Mean {
    fn push(&mut self, value: Option<f64>) {
        if let Some(value) = value {
            self.sum += value;
            self.count += 1;
        }
    }

    fn value(&self) -> f64 {
        if self.count == 0 {
            MISSING_DURATION
        } else {
            self.sum / self.count as f64
        }
    }
}

fn fraction(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

pub fn summarize_issues(issues: &[Issue]) -> HashMap<String, IssueSummary> {
    #[derive(Default)]
    struct Acc {
        total: u64,
        open: u64,
        resolution: Mean,
    }

    let mut groups: HashMap<&str, Acc> = HashMap::new();
    for issue in issues {
        let acc = groups.entry(issue.repository.as_str()).or_default();
        acc.total += 1;
        if issue.state == IssueState::Open {
            acc.open += 1;
        }
        acc.resolution
            .push(duration_days(issue.created_at, issue.closed_at));
    }

    groups
        .into_iter()
        .map(|(repo, acc)| {
            (
                repo.to_string(),
                IssueSummary {
                    issue_count: acc.total,
                    open_issue_fraction: fraction(acc.open, acc.total),
                    avg_issue_resolution_days: acc.resolution.value(),
                },
            )
        })
        .collect()
}

pub fn summarize_pull_requests(prs: &[PullRequest]) -> HashMap<String, PullRequestSummary> {
    #[derive(Default)]
    struct Acc {
        total: u64,
        merged: u64,
        close: Mean,
        merge: Mean,
    }

    let mut groups: HashMap<&str, Acc> = HashMap::new();
    for pr in prs {
        let acc = groups.entry(pr.repository.as_str()).or_default();
        acc.total += 1;
        if pr.state == PullRequestState::Merged {
            acc.merged += 1;
        }
        if pr.state.is_finished() {
            acc.close
                .push(duration_days(pr.created_at, pr.closed_at.or(pr.merged_at)));
        }
        acc.merge.push(duration_days(pr.created_at, pr.merged_at));
    }

    groups
        .into_iter()
        .map(|(repo, acc)| {
            (
                repo.to_string(),
                PullRequestSummary {
                    pr_count: acc.total,
                    merge_rate: fraction(acc.merged, acc.total),
                    avg_pr_close_days: acc.close.value(),
                    avg_pr_merge_time_days: acc.merge.value(),
                },
            )
        })
        .collect()
}

fn distinct_users<T: RepositoryScoped>(rows: &[T]) -> HashMap<&str, u64> {
    let mut users: HashMap<&str, HashSet<&str>> = HashMap::new();
    for row in rows {
        let entry = users.entry(row.repository()).or_default();
        if let Some(user) = row.user() {
            entry.insert(user);
        }
    }
    users
        .into_iter()
        .map(|(repo, set)| (repo, set.len() as u64))
        .collect()
}

/// Distinct contributors per repository from each source, outer-merged so a
/// repository present in only one source still gets a count.
pub fn contributor_activity(
    issues: Option<&[Issue]>,
    prs: Option<&[PullRequest]>,
) -> HashMap<String, ContributorCounts> {
    let from_issues = issues.map(distinct_users).unwrap_or_default();
    let from_prs = prs.map(distinct_users).unwrap_or_default();

    let repos: HashSet<&str> = from_issues.keys().chain(from_prs.keys()).copied().collect();
    repos
        .into_iter()
        .map(|repo| {
            let issue_contributors = from_issues.get(repo).copied().unwrap_or(0);
            let pr_contributors = from_prs.get(repo).copied().unwrap_or(0);
            (
                repo.to_string(),
                ContributorCounts {
                    issue_contributors,
                    pr_contributors,
                    total_contributors: issue_contributors + pr_contributors,
                },
            )
        })
        .collect()
}

/// Left-merges activity onto the repository table by `id`. A missing issue or
/// pull-request table means zero activity, never a missing value.
pub fn merge_activity(
    repos: Vec<Repository>,
    issues: Option<&[Issue]>,
    prs: Option<&[PullRequest]>,
) -> Vec<(Repository, RepositoryActivity)> {
    let issue_summaries = issues.map(summarize_issues).unwrap_or_default();
    let pr_summaries = prs.map(summarize_pull_requests).unwrap_or_default();
    let contributors = contributor_activity(issues, prs);

    repos
        .into_iter()
        .map(|repo| {
            let activity = RepositoryActivity {
                issues: issue_summaries.get(&repo.id).copied().unwrap_or_default(),
                pull_requests: pr_summaries.get(&repo.id).copied().unwrap_or_default(),
                contributors: contributors.get(&repo.id).copied().unwrap_or_default(),
            };
            (repo, activity)
        })
        .collect()
}
