//! In-memory implementation of every Cadence storage capability.
//!
//! Commits are kept sorted by timestamp so range queries are a binary search.
//! Pull requests and review comments are keyed by `(repo, number)`.

use cadence_core::{
    Commit, CommitStore, Developer, Directory, PullRequest, PullRequestStore, Repository,
    ReviewComment, ReviewStore, SeedData, StoreError,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use time::OffsetDateTime;

type PrKey = (String, u32);

#[derive(Default)]
struct Tables {
    commits: Vec<Commit>,
    pull_requests: BTreeMap<PrKey, PullRequest>,
    review_comments: BTreeMap<PrKey, Vec<ReviewComment>>,
}

pub struct MemoryStore {
    seed: SeedData,
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new(seed: SeedData) -> Self {
        Self {
            seed,
            tables: RwLock::new(Tables::default()),
        }
    }

    pub fn seed(&self) -> &SeedData {
        &self.seed
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables.write().map_err(|_| StoreError::Poisoned)
    }

    /// Every stored commit, in timestamp order.
    pub fn all_commits(&self) -> Result<Vec<Commit>, StoreError> {
        Ok(self.read()?.commits.clone())
    }

    /// Every stored pull request, ordered by repository then number.
    pub fn all_pull_requests(&self) -> Result<Vec<PullRequest>, StoreError> {
        Ok(self.read()?.pull_requests.values().cloned().collect())
    }

    /// Every review comment, ordered by repository, PR number, then insertion.
    pub fn all_review_comments(&self) -> Result<Vec<ReviewComment>, StoreError> {
        Ok(self
            .read()?
            .review_comments
            .values()
            .flatten()
            .cloned()
            .collect())
    }

    pub fn commit_count(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.commits.len())
    }
}

impl CommitStore for MemoryStore {
    fn add_commit(&self, commit: Commit) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        // Insert after any commit with the same timestamp to keep arrival order stable.
        let at = tables
            .commits
            .partition_point(|c| c.commit_ts <= commit.commit_ts);
        tables.commits.insert(at, commit);
        Ok(())
    }

    fn commits_in_range(
        &self,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Result<Vec<Commit>, StoreError> {
        if from > to {
            return Ok(Vec::new());
        }
        let tables = self.read()?;
        let start = tables.commits.partition_point(|c| c.commit_ts < from);
        let end = tables.commits.partition_point(|c| c.commit_ts <= to);
        Ok(tables.commits[start..end].to_vec())
    }
}

impl PullRequestStore for MemoryStore {
    fn add_pull_request(&self, pr: PullRequest) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let key = (pr.repo_name.clone(), pr.number);
        if tables.pull_requests.contains_key(&key) {
            return Err(StoreError::DuplicatePullRequest {
                repo: key.0,
                number: key.1,
            });
        }
        tables.pull_requests.insert(key, pr);
        Ok(())
    }

    fn get_pull_request(
        &self,
        repo: &str,
        number: u32,
    ) -> Result<Option<PullRequest>, StoreError> {
        let tables = self.read()?;
        Ok(tables.pull_requests.get(&(repo.to_string(), number)).cloned())
    }

    fn pull_requests_in_repo(&self, repo: &str) -> Result<Vec<PullRequest>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .pull_requests
            .range((repo.to_string(), 0)..=(repo.to_string(), u32::MAX))
            .map(|(_, pr)| pr.clone())
            .collect())
    }

    fn update_pull_request(&self, pr: PullRequest) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        match tables.pull_requests.get_mut(&(pr.repo_name.clone(), pr.number)) {
            Some(slot) => {
                *slot = pr;
                Ok(())
            }
            None => Err(StoreError::PullRequestNotFound {
                repo: pr.repo_name,
                number: pr.number,
            }),
        }
    }
}

impl ReviewStore for MemoryStore {
    fn add_review_comment(&self, comment: ReviewComment) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        tables
            .review_comments
            .entry((comment.repo_name.clone(), comment.pr_number))
            .or_default()
            .push(comment);
        Ok(())
    }

    fn review_comments(
        &self,
        repo: &str,
        pr_number: u32,
    ) -> Result<Vec<ReviewComment>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .review_comments
            .get(&(repo.to_string(), pr_number))
            .cloned()
            .unwrap_or_default())
    }
}

impl Directory for MemoryStore {
    fn developer_by_id(&self, user_id: &str) -> Option<Developer> {
        self.seed.developer(user_id).cloned()
    }

    fn developers(&self) -> Vec<Developer> {
        self.seed.developers.clone()
    }

    /// Seeded repositories plus any repository that has received a PR.
    fn repositories(&self) -> Result<Vec<String>, StoreError> {
        let mut names: BTreeSet<String> = self
            .seed
            .repositories
            .iter()
            .map(|r| r.repo_name.clone())
            .collect();
        names.extend(self.read()?.pull_requests.keys().map(|(repo, _)| repo.clone()));
        Ok(names.into_iter().collect())
    }

    fn repository(&self, repo_name: &str) -> Option<Repository> {
        self.seed.repository(repo_name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{PrState, ReviewState};
    use time::macros::datetime;
    use time::Duration;

    fn seed() -> SeedData {
        cadence_core::parse_seed(
            r#"
developers:
  - { user_id: u1, email: a@x.io, seniority: senior }
repositories:
  - { repo_name: acme/web }
"#,
            cadence_core::SeedFormat::Yaml,
        )
        .unwrap()
    }

    fn commit(hash: &str, ts: OffsetDateTime) -> Commit {
        Commit {
            commit_hash: hash.into(),
            user_id: "u1".into(),
            user_email: "a@x.io".into(),
            user_name: String::new(),
            repo_name: "acme/web".into(),
            branch_name: "main".into(),
            is_primary_branch: true,
            total_lines_added: 10,
            total_lines_deleted: 1,
            tab_lines_added: 0,
            tab_lines_deleted: 0,
            composer_lines_added: 0,
            composer_lines_deleted: 0,
            non_ai_lines_added: 10,
            non_ai_lines_deleted: 1,
            message: "m".into(),
            commit_ts: ts,
        }
    }

    fn pr(repo: &str, number: u32) -> PullRequest {
        let ts = datetime!(2026-03-01 09:00 UTC);
        PullRequest {
            number,
            title: "t".into(),
            body: String::new(),
            state: PrState::Open,
            author_id: "u1".into(),
            author_email: "a@x.io".into(),
            author_name: String::new(),
            repo_name: repo.into(),
            base_branch: "main".into(),
            head_branch: "feature/task-1".into(),
            reviewers: vec![],
            labels: vec![],
            additions: 10,
            deletions: 0,
            initial_additions: 10,
            changed_files: 1,
            commit_count: 1,
            commit_ids: vec!["c1".into()],
            ai_ratio: 0.0,
            tab_lines: 0,
            composer_lines: 0,
            created_at: ts,
            updated_at: ts,
            merged_at: None,
            closed_at: None,
            first_review_at: None,
            first_commit_at: ts,
            last_commit_at: ts,
            review_iterations: 0,
            was_reverted: false,
            is_bug_fix: false,
        }
    }

    #[test]
    fn commits_sorted_and_range_inclusive() {
        let store = MemoryStore::new(seed());
        let t0 = datetime!(2026-03-01 10:00 UTC);
        store.add_commit(commit("c2", t0 + Duration::hours(2))).unwrap();
        store.add_commit(commit("c0", t0)).unwrap();
        store.add_commit(commit("c1", t0 + Duration::hours(1))).unwrap();

        let all = store.all_commits().unwrap();
        let hashes: Vec<_> = all.iter().map(|c| c.commit_hash.as_str()).collect();
        assert_eq!(hashes, ["c0", "c1", "c2"]);

        let mid = store
            .commits_in_range(t0, t0 + Duration::hours(1))
            .unwrap();
        assert_eq!(mid.len(), 2);
        assert!(store
            .commits_in_range(t0 + Duration::hours(3), t0)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn equal_timestamps_keep_arrival_order() {
        let store = MemoryStore::new(seed());
        let t0 = datetime!(2026-03-01 10:00 UTC);
        store.add_commit(commit("first", t0)).unwrap();
        store.add_commit(commit("second", t0)).unwrap();
        let all = store.all_commits().unwrap();
        assert_eq!(all[0].commit_hash, "first");
        assert_eq!(all[1].commit_hash, "second");
    }

    #[test]
    fn duplicate_pull_request_rejected() {
        let store = MemoryStore::new(seed());
        store.add_pull_request(pr("acme/web", 1)).unwrap();
        let err = store.add_pull_request(pr("acme/web", 1)).unwrap_err();
        assert!(matches!(err, StoreError::DuplicatePullRequest { number: 1, .. }));
        // Same number in another repo is fine.
        store.add_pull_request(pr("acme/api", 1)).unwrap();
    }

    #[test]
    fn update_missing_pull_request_fails() {
        let store = MemoryStore::new(seed());
        let err = store.update_pull_request(pr("acme/web", 9)).unwrap_err();
        assert!(matches!(err, StoreError::PullRequestNotFound { number: 9, .. }));
    }

    #[test]
    fn update_replaces_record() {
        let store = MemoryStore::new(seed());
        store.add_pull_request(pr("acme/web", 1)).unwrap();
        let mut updated = pr("acme/web", 1);
        updated.was_reverted = true;
        store.update_pull_request(updated).unwrap();
        let got = store.get_pull_request("acme/web", 1).unwrap().unwrap();
        assert!(got.was_reverted);
        assert!(store.get_pull_request("acme/web", 2).unwrap().is_none());
    }

    #[test]
    fn pull_requests_scoped_to_repo_and_ordered() {
        let store = MemoryStore::new(seed());
        store.add_pull_request(pr("acme/web", 3)).unwrap();
        store.add_pull_request(pr("acme/web", 1)).unwrap();
        store.add_pull_request(pr("acme/webapp", 2)).unwrap();
        let numbers: Vec<u32> = store
            .pull_requests_in_repo("acme/web")
            .unwrap()
            .iter()
            .map(|p| p.number)
            .collect();
        assert_eq!(numbers, [1, 3]);
    }

    #[test]
    fn repositories_include_seeded_and_observed() {
        let store = MemoryStore::new(seed());
        store.add_pull_request(pr("default/repo", 1)).unwrap();
        assert_eq!(store.repositories().unwrap(), ["acme/web", "default/repo"]);
    }

    #[test]
    fn poisoned_lock_surfaces_as_error() {
        let store = std::sync::Arc::new(MemoryStore::new(seed()));
        let held = std::sync::Arc::clone(&store);
        let joined = std::thread::spawn(move || {
            let _guard = held.tables.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();
        assert!(joined.is_err());

        assert!(matches!(store.repositories(), Err(StoreError::Poisoned)));
        assert!(matches!(store.all_commits(), Err(StoreError::Poisoned)));
        // Seed lookups do not touch the tables.
        assert_eq!(store.developers().len(), 1);
    }

    #[test]
    fn review_comments_keyed_by_pr() {
        let store = MemoryStore::new(seed());
        let comment = ReviewComment {
            id: 1,
            pr_number: 4,
            repo_name: "acme/web".into(),
            author_id: "u1".into(),
            body: "LGTM".into(),
            state: ReviewState::Approved,
            created_at: datetime!(2026-03-01 12:00 UTC),
        };
        store.add_review_comment(comment.clone()).unwrap();
        assert_eq!(store.review_comments("acme/web", 4).unwrap(), vec![comment]);
        assert!(store.review_comments("acme/web", 5).unwrap().is_empty());
    }

    #[test]
    fn directory_lookups() {
        let store = MemoryStore::new(seed());
        assert!(store.developer_by_id("u1").is_some());
        assert!(store.developer_by_id("nobody").is_none());
        assert_eq!(store.repository("acme/web").unwrap().default_branch, "main");
    }
}
