pub mod dedup;
pub mod errors;
pub mod models;
pub mod payloads;
pub mod transform;

pub use dedup::{deduplicate, Keyed};
pub use errors::TableError;
pub use models::{
    Issue, IssueState, PullRequest, PullRequestState, Repository, RepositoryScoped, TableKind,
    MISSING_DURATION,
};
pub use payloads::{RawRecord, RawTable};
pub use transform::{
    normalize_issues, normalize_pull_requests, normalize_repositories, NormalizedTable,
};
