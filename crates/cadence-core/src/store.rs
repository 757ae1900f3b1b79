//! Storage capabilities the generators consume.
//!
//! Split by concern so a generator only asks for what it touches. All calls
//! are synchronous and assumed fast; a failure aborts the calling stage.

use crate::error::StoreError;
use crate::seed::{Developer, Repository};
use crate::types::{Commit, PullRequest, ReviewComment};
use time::OffsetDateTime;

pub trait CommitStore {
    fn add_commit(&self, commit: Commit) -> Result<(), StoreError>;

    /// Commits with `from <= commit_ts <= to`, sorted by timestamp.
    fn commits_in_range(
        &self,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Result<Vec<Commit>, StoreError>;
}

pub trait PullRequestStore {
    /// Fails with `DuplicatePullRequest` if `(repo, number)` is taken.
    fn add_pull_request(&self, pr: PullRequest) -> Result<(), StoreError>;

    fn get_pull_request(&self, repo: &str, number: u32)
        -> Result<Option<PullRequest>, StoreError>;

    /// Pull requests in one repository, ordered by number.
    fn pull_requests_in_repo(&self, repo: &str) -> Result<Vec<PullRequest>, StoreError>;

    /// Replaces the stored record; fails with `PullRequestNotFound` if absent.
    fn update_pull_request(&self, pr: PullRequest) -> Result<(), StoreError>;
}

pub trait ReviewStore {
    fn add_review_comment(&self, comment: ReviewComment) -> Result<(), StoreError>;

    /// Comments on one PR in insertion order.
    fn review_comments(&self, repo: &str, pr_number: u32)
        -> Result<Vec<ReviewComment>, StoreError>;
}

/// Read-only seed lookups.
pub trait Directory {
    fn developer_by_id(&self, user_id: &str) -> Option<Developer>;

    fn developers(&self) -> Vec<Developer>;

    /// Names of every repository known to the store, sorted. Fails when the
    /// store cannot read the repositories it has observed.
    fn repositories(&self) -> Result<Vec<String>, StoreError>;

    fn repository(&self, repo_name: &str) -> Option<Repository>;
}
