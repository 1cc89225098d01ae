use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Value stored in a duration column when the duration cannot be computed.
pub const MISSING_DURATION: f64 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Repositories,
    Issues,
    PullRequests,
}

impl TableKind {
    pub const ALL: [TableKind; 3] = [Self::Repositories, Self::Issues, Self::PullRequests];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Repositories => "repositories",
            Self::Issues => "issues",
            Self::PullRequests => "pull_requests",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
    Unknown,
}

impl IssueState {
    /// `None` means the raw value is outside the allowed set.
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "open" => Some(Self::Open),
            "closed" => Some(Self::Closed),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullRequestState {
    Open,
    Closed,
    Merged,
    Unknown,
}

impl PullRequestState {
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "open" => Some(Self::Open),
            "closed" => Some(Self::Closed),
            "merged" => Some(Self::Merged),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Closed | Self::Merged)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Repository {
    pub id: String,
    pub name: String,
    pub full_name: String,
    pub description: String,
    pub stars: f64,
    pub forks: f64,
    pub open_issues: f64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub observed_at: Option<DateTime<Utc>>,
}

impl Repository {
    pub fn count(&self, column: &str) -> Option<f64> {
        match column {
            "stars" => Some(self.stars),
            "forks" => Some(self.forks),
            "open_issues" => Some(self.open_issues),
            _ => None,
        }
    }

    pub fn count_mut(&mut self, column: &str) -> Option<&mut f64> {
        match column {
            "stars" => Some(&mut self.stars),
            "forks" => Some(&mut self.forks),
            "open_issues" => Some(&mut self.open_issues),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Issue {
    pub id: String,
    pub repository: String,
    pub number: Option<i64>,
    pub title: String,
    pub state: IssueState,
    pub user: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub resolution_time_days: f64,
    #[serde(skip)]
    pub observed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PullRequest {
    pub id: String,
    pub repository: String,
    pub number: Option<i64>,
    pub title: String,
    pub state: PullRequestState,
    pub user: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    pub merge_time_days: f64,
    pub close_time_days: f64,
    #[serde(skip)]
    pub observed_at: Option<DateTime<Utc>>,
}

/// Issue and pull-request rows point at a repository by identifier.
pub trait RepositoryScoped {
    fn repository(&self) -> &str;
    fn set_repository(&mut self, id: String);
    fn user(&self) -> Option<&str>;
}

impl RepositoryScoped for Issue {
    fn repository(&self) -> &str {
        &self.repository
    }

    fn set_repository(&mut self, id: String) {
        self.repository = id;
    }

    fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }
}

impl RepositoryScoped for PullRequest {
    fn repository(&self) -> &str {
        &self.repository
    }

    fn set_repository(&mut self, id: String) {
        self.repository = id;
    }

    fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }
}
