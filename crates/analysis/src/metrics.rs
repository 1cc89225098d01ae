use chrono::{DateTime, Utc};
use normalizer::{Issue, PullRequest, Repository, MISSING_DURATION};
use serde::{Deserialize, Serialize};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Fractional days from `start` to `end` when both are known. Negative spans
/// (end before start) come back as computed.
pub fn duration_days(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Option<f64> {
    let span = end? - start?;
    Some(span.num_milliseconds() as f64 / MILLIS_PER_DAY)
}

pub fn resolution_time_days(issue: &Issue) -> f64 {
    duration_days(issue.created_at, issue.closed_at).unwrap_or(MISSING_DURATION)
}

pub fn merge_time_days(pr: &PullRequest) -> f64 {
    duration_days(pr.created_at, pr.merged_at).unwrap_or(MISSING_DURATION)
}

pub fn close_time_days(pr: &PullRequest) -> f64 {
    duration_days(pr.created_at, pr.closed_at.or(pr.merged_at)).unwrap_or(MISSING_DURATION)
}

pub fn with_resolution_times(mut issues: Vec<Issue>) -> Vec<Issue> {
    for issue in &mut issues {
        issue.resolution_time_days = resolution_time_days(issue);
    }
    issues
}

pub fn with_merge_times(mut prs: Vec<PullRequest>) -> Vec<PullRequest> {
    for pr in &mut prs {
        pr.merge_time_days = merge_time_days(pr);
        pr.close_time_days = close_time_days(pr);
    }
    prs
}

/// Days since `created_at`, floored at zero; `MISSING_DURATION` when unknown.
pub fn age_days(created_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    duration_days(created_at, Some(now))
        .map(|days| days.max(0.0))
        .unwrap_or(MISSING_DURATION)
}

/// Division where a zero denominator counts as one.
pub fn guarded_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        numerator
    } else {
        numerator / denominator
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatioMetrics {
    pub stars_per_fork: f64,
    pub stars_per_issue: f64,
    pub contributor_per_star: f64,
    pub stars_per_day: f64,
}

impl RatioMetrics {
    pub fn compute(repo: &Repository, total_contributors: u64, age_days: f64) -> Self {
        Self {
            stars_per_fork: guarded_ratio(repo.stars, repo.forks),
            stars_per_issue: guarded_ratio(repo.stars, repo.open_issues),
            contributor_per_star: guarded_ratio(total_contributors as f64, repo.stars),
            stars_per_day: guarded_ratio(repo.stars, age_days.max(0.0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use normalizer::{IssueState, PullRequestState};

    fn at(day: u32, hour: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2023, 1, day, hour, 0, 0).unwrap())
    }

    fn issue(created: Option<DateTime<Utc>>, closed: Option<DateTime<Utc>>) -> Issue {
        Issue {
            id: "1".into(),
            repository: "r".into(),
            number: Some(1),
            title: String::new(),
            state: IssueState::Closed,
            user: None,
            created_at: created,
            updated_at: None,
            closed_at: closed,
            resolution_time_days: MISSING_DURATION,
            observed_at: None,
        }
    }

    fn pr(closed: Option<DateTime<Utc>>, merged: Option<DateTime<Utc>>) -> PullRequest {
        PullRequest {
            id: "1".into(),
            repository: "r".into(),
            number: Some(1),
            title: String::new(),
            state: PullRequestState::Closed,
            user: None,
            created_at: at(1, 0),
            updated_at: None,
            closed_at: closed,
            merged_at: merged,
            merge_time_days: MISSING_DURATION,
            close_time_days: MISSING_DURATION,
            observed_at: None,
        }
    }

    #[test]
    fn resolution_time_is_fractional_days() {
        let resolved = issue(at(1, 0), at(5, 12));
        assert_eq!(resolution_time_days(&resolved), 4.5);
    }

    #[test]
    fn unresolved_issue_gets_sentinel() {
        assert_eq!(resolution_time_days(&issue(at(1, 0), None)), MISSING_DURATION);
        assert_eq!(resolution_time_days(&issue(None, at(2, 0))), MISSING_DURATION);
    }

    #[test]
    fn negative_resolution_is_preserved() {
        let backwards = issue(at(5, 0), at(3, 0));
        assert_eq!(resolution_time_days(&backwards), -2.0);
    }

    #[test]
    fn closed_without_merge_has_no_merge_time() {
        let rows = with_merge_times(vec![pr(at(3, 0), None), pr(at(6, 0), at(6, 0))]);
        assert_eq!(rows[0].merge_time_days, MISSING_DURATION);
        assert_eq!(rows[0].close_time_days, 2.0);
        assert_eq!(rows[1].merge_time_days, 5.0);
        assert_eq!(rows[1].close_time_days, 5.0);
    }

    #[test]
    fn age_never_negative() {
        let now = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(age_days(Some(now + Duration::days(3)), now), 0.0);
        assert_eq!(age_days(Some(now - Duration::days(10)), now), 10.0);
        assert_eq!(age_days(None, now), MISSING_DURATION);
    }

    #[test]
    fn zero_denominator_yields_numerator() {
        assert_eq!(guarded_ratio(42.0, 0.0), 42.0);
        assert_eq!(guarded_ratio(42.0, 2.0), 21.0);
    }
}
