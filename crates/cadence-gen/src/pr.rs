//! Pull-request generation: cluster stored commits into sessions and turn each
//! closed session into a stored PR envelope.

use crate::error::{SimError, SimResult, StoreContext};
use crate::lifecycle::LifecyclePolicy;
use crate::rng::SimRng;
use crate::session::{cluster_commits, group_commits, Session};
use cadence_core::{
    ai_ratio, Commit, CommitStore, Developer, PullRequest, PullRequestStore, Repository, SeedData,
};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const BRANCH_LABELS: [(&str, &str); 5] = [
    ("feature/", "feature"),
    ("bugfix/", "bug"),
    ("hotfix/", "hotfix"),
    ("refactor/", "refactor"),
    ("chore/", "chore"),
];

pub struct PrGenerator<'a, S> {
    seed: &'a SeedData,
    store: &'a S,
    rng: SimRng,
    policy: LifecyclePolicy,
    next_number: u32,
}

impl<'a, S: CommitStore + PullRequestStore> PrGenerator<'a, S> {
    pub fn new(seed: &'a SeedData, store: &'a S, rng_seed: u64) -> Self {
        Self {
            seed,
            store,
            rng: SimRng::seeded(rng_seed),
            policy: LifecyclePolicy::from_seed(&seed.pr_lifecycle),
            next_number: 1,
        }
    }

    /// Cluster every commit in `[from, to]` and store the resulting PRs.
    pub fn generate_from_commits(
        &mut self,
        from: OffsetDateTime,
        to: OffsetDateTime,
        cancel: &CancellationToken,
    ) -> SimResult<usize> {
        let commits = self
            .store
            .commits_in_range(from, to)
            .store_op("commits_in_range", || format!("{from}..{to}"))?;
        let prs = self.group_into_pull_requests(&commits, cancel)?;
        let count = prs.len();
        for pr in prs {
            let key = format!("{}#{}", pr.repo_name, pr.number);
            self.store
                .add_pull_request(pr)
                .store_op("add_pull_request", || key)?;
        }
        info!(commits = commits.len(), pull_requests = count, "pull requests generated");
        Ok(count)
    }

    /// Group by (repo, branch, author) in key order and cluster each group.
    /// PR numbers continue across calls on the same generator.
    pub fn group_into_pull_requests(
        &mut self,
        commits: &[Commit],
        cancel: &CancellationToken,
    ) -> SimResult<Vec<PullRequest>> {
        let mut prs = Vec::new();
        for (key, group) in group_commits(commits) {
            if cancel.is_cancelled() {
                return Err(SimError::Cancelled);
            }
            let developer = self.seed.developer_or_default(&key.user_id);
            let repo = self.seed.repository_or_default(&key.repo_name);

            let next_number = &mut self.next_number;
            let policy = &self.policy;
            let clustered = cluster_commits(&group, &developer, &mut self.rng, |session, _, rng| {
                let number = *next_number;
                *next_number += 1;
                finalize_pr(session, number, &developer, &repo, policy, rng)
            });
            debug!(
                repo = %key.repo_name,
                branch = %key.branch_name,
                author = %key.user_id,
                commits = group.len(),
                pull_requests = clustered.len(),
                "group clustered"
            );
            prs.extend(clustered);
        }
        Ok(prs)
    }
}

/// Build the PR envelope for one closed session.
///
/// Callers pass non-empty sessions; `cluster_commits` only closes a session
/// after appending a commit to it.
pub fn finalize_pr(
    session: Session,
    number: u32,
    developer: &Developer,
    repo: &Repository,
    policy: &LifecyclePolicy,
    rng: &mut SimRng,
) -> PullRequest {
    let commits = session.commits;
    let additions: u32 = commits.iter().map(|c| c.total_lines_added).sum();
    let deletions: u32 = commits.iter().map(|c| c.total_lines_deleted).sum();
    let tab_lines: u32 = commits.iter().map(|c| c.tab_lines_added).sum();
    let composer_lines: u32 = commits.iter().map(|c| c.composer_lines_added).sum();

    let (first_commit_at, last_commit_at, branch) = match (commits.first(), commits.last()) {
        (Some(first), Some(last)) => (first.commit_ts, last.commit_ts, first.branch_name.clone()),
        _ => (
            OffsetDateTime::UNIX_EPOCH,
            OffsetDateTime::UNIX_EPOCH,
            repo.default_branch.clone(),
        ),
    };
    let initial_additions = commits.first().map_or(0, |c| c.total_lines_added);
    // Unknown authors fall back to the identity recorded on their commits.
    let (author_email, author_name) = match commits.first() {
        Some(first) if developer.email.is_empty() => {
            (first.user_email.clone(), first.user_name.clone())
        }
        _ => (developer.email.clone(), developer.name.clone()),
    };

    let lifecycle = policy.assign(first_commit_at, rng);

    PullRequest {
        number,
        title: pr_title(&branch, &commits),
        body: format!("Auto-generated PR from {} commits", commits.len()),
        state: lifecycle.state,
        author_id: developer.user_id.clone(),
        author_email,
        author_name,
        repo_name: repo.repo_name.clone(),
        base_branch: repo.default_branch.clone(),
        labels: branch_labels(&branch),
        head_branch: branch,
        reviewers: Vec::new(),
        additions,
        deletions,
        initial_additions,
        changed_files: estimate_changed_files(developer, additions),
        commit_count: commits.len() as u32,
        commit_ids: commits.iter().map(|c| c.commit_hash.clone()).collect(),
        ai_ratio: ai_ratio(tab_lines + composer_lines, additions),
        tab_lines,
        composer_lines,
        created_at: lifecycle.created_at,
        updated_at: last_commit_at,
        merged_at: lifecycle.merged_at,
        closed_at: lifecycle.closed_at,
        first_review_at: None,
        first_commit_at,
        last_commit_at,
        review_iterations: 0,
        was_reverted: false,
        is_bug_fix: false,
    }
}

/// First commit's message, else "Implement <branch suffix>".
pub fn pr_title(branch: &str, commits: &[Commit]) -> String {
    if let Some(first) = commits.first() {
        if !first.message.is_empty() {
            return first.message.clone();
        }
    }
    let feature = match branch.split_once('/') {
        Some((_, rest)) if !rest.is_empty() => rest.replace(['-', '_'], " "),
        _ => branch.to_string(),
    };
    format!("Implement {feature}")
}

pub fn branch_labels(branch: &str) -> Vec<String> {
    BRANCH_LABELS
        .iter()
        .filter(|(prefix, _)| branch.starts_with(prefix))
        .map(|(_, label)| label.to_string())
        .collect()
}

/// Author's typical file count scaled by how this PR compares to their
/// typical size; at least 1.
fn estimate_changed_files(developer: &Developer, additions: u32) -> u32 {
    let avg_files = f64::from(developer.pr_behavior.avg_files_per_pr.max(1));
    let avg_size = f64::from(developer.pr_behavior.avg_pr_size_loc);
    if avg_size <= 0.0 {
        return avg_files as u32;
    }
    ((avg_files * f64::from(additions) / avg_size).round() as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionParams;
    use cadence_core::Seniority;
    use time::macros::datetime;
    use time::Duration;

    fn commit(hash: &str, ts: OffsetDateTime, added: u32, tab: u32, composer: u32) -> Commit {
        Commit {
            commit_hash: hash.into(),
            user_id: "user_001".into(),
            user_email: "a@example.com".into(),
            user_name: "Alice".into(),
            repo_name: "acme/api".into(),
            branch_name: "feature/auth".into(),
            is_primary_branch: false,
            total_lines_added: added,
            total_lines_deleted: 2,
            tab_lines_added: tab,
            tab_lines_deleted: 0,
            composer_lines_added: composer,
            composer_lines_deleted: 0,
            non_ai_lines_added: added - tab - composer,
            non_ai_lines_deleted: 2,
            message: format!("feat: step {hash}"),
            commit_ts: ts,
        }
    }

    const T: OffsetDateTime = datetime!(2026-01-10 10:00 UTC);

    fn session(commits: Vec<Commit>) -> Session {
        let mut rng = SimRng::seeded(0);
        Session {
            params: SessionParams::sample(Seniority::Senior, &mut rng),
            commits,
        }
    }

    #[test]
    fn finalize_sums_session_metrics() {
        let mut dev = Developer::fallback("user_001");
        dev.email = "a@example.com".into();
        let repo = Repository::fallback("acme/api");
        let s = session(vec![
            commit("a", T, 100, 30, 20),
            commit("b", T + Duration::minutes(10), 50, 10, 5),
        ]);
        let mut rng = SimRng::seeded(4);
        let pr = finalize_pr(s, 7, &dev, &repo, &LifecyclePolicy::default(), &mut rng);

        assert_eq!(pr.number, 7);
        assert_eq!(pr.additions, 150);
        assert_eq!(pr.deletions, 4);
        assert_eq!(pr.tab_lines, 40);
        assert_eq!(pr.composer_lines, 25);
        assert!((pr.ai_ratio - 65.0 / 150.0).abs() < 1e-12);
        assert_eq!(pr.initial_additions, 100);
        assert_eq!(pr.commit_ids, ["a", "b"]);
        assert_eq!(pr.title, "feat: step a");
        assert_eq!(pr.body, "Auto-generated PR from 2 commits");
        assert_eq!(pr.base_branch, "main");
        assert_eq!(pr.head_branch, "feature/auth");
        assert_eq!(pr.labels, ["feature"]);
        assert_eq!(pr.updated_at, T + Duration::minutes(10));
        assert!(pr.created_at <= T);
    }

    #[test]
    fn title_falls_back_to_branch() {
        let mut c = commit("a", T, 10, 0, 0);
        c.message.clear();
        assert_eq!(pr_title("feature/user-login_flow", &[c]), "Implement user login flow");
        assert_eq!(pr_title("main", &[]), "Implement main");
    }

    #[test]
    fn labels_from_branch_prefix() {
        assert_eq!(branch_labels("bugfix/task-12"), ["bug"]);
        assert!(branch_labels("main").is_empty());
    }

    #[test]
    fn changed_files_scale_with_size() {
        let dev = Developer::fallback("x");
        assert_eq!(estimate_changed_files(&dev, 200), 5);
        assert_eq!(estimate_changed_files(&dev, 400), 10);
        assert_eq!(estimate_changed_files(&dev, 1), 1);
    }

    #[test]
    fn numbers_are_sequential_across_groups() {
        let seed = cadence_core::parse_seed(
            "developers:\n  - { user_id: user_001, email: a@example.com }\n",
            cadence_core::SeedFormat::Yaml,
        )
        .unwrap();
        let store = cadence_store::MemoryStore::new(seed.clone());
        let mut other = commit("z", T, 10, 0, 0);
        other.branch_name = "bugfix/task-1".into();
        let commits = vec![
            commit("a", T, 10, 0, 0),
            commit("b", T + Duration::hours(5), 10, 0, 0),
            other,
        ];
        let mut generator = PrGenerator::new(&seed, &store, 9);
        let prs = generator
            .group_into_pull_requests(&commits, &CancellationToken::new())
            .unwrap();
        let numbers: Vec<u32> = prs.iter().map(|p| p.number).collect();
        assert_eq!(numbers, [1, 2, 3]);
        // bugfix group sorts before feature group
        assert_eq!(prs[0].head_branch, "bugfix/task-1");
        assert_eq!(prs[0].labels, ["bug"]);
    }
}
