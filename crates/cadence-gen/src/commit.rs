//! Commit stream: Poisson-timed, lognormal-sized commits per developer.

use crate::error::{SimError, SimResult, StoreContext};
use crate::rng::SimRng;
use crate::velocity::Velocity;
use cadence_core::hash::commit_hash;
use cadence_core::{Commit, CommitStore, Developer, Repository, SeedData};
use time::{Duration, OffsetDateTime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const DEFAULT_REPO: &str = "default/repo";
const DEFAULT_BRANCH: &str = "main";
const PRIMARY_BRANCH_CHANCE: f64 = 0.3;
const BRANCH_PREFIXES: [&str; 4] = ["feature", "bugfix", "refactor", "chore"];
const FALLBACK_MESSAGE: &str = "Update code";

pub struct CommitGenerator<'a, S> {
    seed: &'a SeedData,
    store: &'a S,
    velocity: Velocity,
    rng: SimRng,
    /// Global cap across all developers; 0 means unbounded.
    max_commits: usize,
}

impl<'a, S: CommitStore> CommitGenerator<'a, S> {
    pub fn new(seed: &'a SeedData, store: &'a S, velocity: Velocity, rng_seed: u64) -> Self {
        Self {
            seed,
            store,
            velocity,
            rng: SimRng::seeded(rng_seed),
            max_commits: 0,
        }
    }

    pub fn with_max_commits(mut self, max_commits: usize) -> Self {
        self.max_commits = max_commits;
        self
    }

    /// Generate `days` of history ending at `now`, developer by developer.
    ///
    /// Returns the number of commits written. Stops early, without error, once
    /// the commit cap is reached.
    pub fn generate(
        &mut self,
        now: OffsetDateTime,
        days: u32,
        cancel: &CancellationToken,
    ) -> SimResult<usize> {
        let start = history_start(now, days)?;
        let mut written = 0usize;
        let seed = self.seed;

        for dev in &seed.developers {
            if cancel.is_cancelled() {
                return Err(SimError::Cancelled);
            }
            if self.cap_reached(written) {
                break;
            }
            let before = written;
            self.generate_for_developer(dev, start, now, &mut written, cancel)?;
            debug!(user_id = %dev.user_id, commits = written - before, "developer commits generated");
        }

        info!(commits = written, days, velocity = %self.velocity, "commit stream generated");
        Ok(written)
    }

    fn cap_reached(&self, written: usize) -> bool {
        self.max_commits > 0 && written >= self.max_commits
    }

    fn generate_for_developer(
        &mut self,
        dev: &Developer,
        start: OffsetDateTime,
        now: OffsetDateTime,
        written: &mut usize,
        cancel: &CancellationToken,
    ) -> SimResult<()> {
        let rate = self.velocity.commits_per_hour(dev.pr_behavior.prs_per_week);
        if rate <= 0.0 {
            return Ok(());
        }

        let mut cursor = start;
        let mut day = 0;
        while !self.cap_reached(*written) {
            let gap_hours = self.rng.exponential_hours(rate);
            let remaining_hours = (now - cursor).as_seconds_f64() / 3600.0;
            if gap_hours > remaining_hours {
                break;
            }
            cursor += Duration::seconds_f64(gap_hours * 3600.0);

            let elapsed_days = (cursor - start).whole_days();
            if elapsed_days != day {
                day = elapsed_days;
                if cancel.is_cancelled() {
                    return Err(SimError::Cancelled);
                }
            }

            let commit = self.build_commit(dev, cursor);
            let hash = commit.commit_hash.clone();
            self.store
                .add_commit(commit)
                .store_op("add_commit", || hash)?;
            *written += 1;
        }
        Ok(())
    }

    /// Draw order: size, tab ratio, deletion ratio, repository, branch,
    /// message, hash salt.
    fn build_commit(&mut self, dev: &Developer, ts: OffsetDateTime) -> Commit {
        let mean_size = f64::from(dev.pr_behavior.avg_pr_size_loc) / 3.0;
        let added = self.rng.lognormal_magnitude(mean_size, mean_size * 0.5);

        let acceptance = dev.acceptance_rate.clamp(0.0, 1.0);
        let tab_ratio = 0.6 + self.rng.uniform() * 0.2;
        let deletion_ratio = 0.1 + self.rng.uniform() * 0.2;

        let (tab_added, composer_added, non_ai_added) = split_lines(added, acceptance, tab_ratio);
        let deleted = (f64::from(added) * deletion_ratio) as u32;
        let (tab_deleted, composer_deleted, non_ai_deleted) =
            split_lines(deleted, acceptance, tab_ratio);

        let repo = self.select_repository(dev);
        let branch = self.select_branch(&repo);
        let message = self.select_message();
        let salt = self.rng.salt();

        Commit {
            commit_hash: commit_hash(&dev.user_id, &dev.email, ts.unix_timestamp(), salt),
            user_id: dev.user_id.clone(),
            user_email: dev.email.clone(),
            user_name: dev.name.clone(),
            is_primary_branch: branch == repo.default_branch,
            repo_name: repo.repo_name,
            branch_name: branch,
            total_lines_added: added,
            total_lines_deleted: deleted,
            tab_lines_added: tab_added,
            tab_lines_deleted: tab_deleted,
            composer_lines_added: composer_added,
            composer_lines_deleted: composer_deleted,
            non_ai_lines_added: non_ai_added,
            non_ai_lines_deleted: non_ai_deleted,
            message,
            commit_ts: ts,
        }
    }

    /// First repository owned by the developer's team, else a random one.
    fn select_repository(&mut self, dev: &Developer) -> Repository {
        let seed = self.seed;
        let repos = &seed.repositories;
        if repos.is_empty() {
            let mut repo = Repository::fallback(DEFAULT_REPO);
            repo.default_branch = DEFAULT_BRANCH.to_string();
            return repo;
        }
        if !dev.team.is_empty() {
            if let Some(repo) = repos.iter().find(|r| r.teams.contains(&dev.team)) {
                return repo.clone();
            }
        }
        match self.rng.pick(repos) {
            Some(repo) => repo.clone(),
            None => Repository::fallback(DEFAULT_REPO),
        }
    }

    fn select_branch(&mut self, repo: &Repository) -> String {
        if self.rng.chance(PRIMARY_BRANCH_CHANCE) {
            return if repo.default_branch.is_empty() {
                DEFAULT_BRANCH.to_string()
            } else {
                repo.default_branch.clone()
            };
        }
        let prefix = BRANCH_PREFIXES[self.rng.below(BRANCH_PREFIXES.len() as u32) as usize];
        format!("{prefix}/task-{}", self.rng.below(1000))
    }

    fn select_message(&mut self) -> String {
        let seed = self.seed;
        let messages = &seed.text_templates.commit_messages;
        let categories = [
            &messages.feature,
            &messages.bugfix,
            &messages.refactor,
            &messages.chore,
        ];
        if categories.iter().all(|c| c.is_empty()) {
            return FALLBACK_MESSAGE.to_string();
        }
        let category = categories[self.rng.below(categories.len() as u32) as usize];
        self.rng
            .pick(category)
            .cloned()
            .unwrap_or_else(|| FALLBACK_MESSAGE.to_string())
    }
}

/// First instant of a `days`-long window ending at `now`.
pub fn history_start(now: OffsetDateTime, days: u32) -> SimResult<OffsetDateTime> {
    now.checked_sub(Duration::days(i64::from(days)))
        .ok_or(SimError::WindowOutOfRange { days })
}

/// Split `total` lines into (tab, composer, human). The AI share is
/// `floor(total * acceptance)`, of which tab takes `floor(ai * tab_ratio)`.
pub fn split_lines(total: u32, acceptance: f64, tab_ratio: f64) -> (u32, u32, u32) {
    let ai = ((f64::from(total) * acceptance) as u32).min(total);
    let tab = ((f64::from(ai) * tab_ratio) as u32).min(ai);
    (tab, ai - tab, total - ai)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{parse_seed, SeedFormat};
    use std::sync::Mutex;
    use time::macros::datetime;

    #[derive(Default)]
    struct VecStore(Mutex<Vec<Commit>>);

    impl CommitStore for VecStore {
        fn add_commit(&self, commit: Commit) -> Result<(), cadence_core::StoreError> {
            self.0.lock().unwrap().push(commit);
            Ok(())
        }

        fn commits_in_range(
            &self,
            _from: OffsetDateTime,
            _to: OffsetDateTime,
        ) -> Result<Vec<Commit>, cadence_core::StoreError> {
            Ok(self.0.lock().unwrap().clone())
        }
    }

    fn seed() -> SeedData {
        parse_seed(
            r#"
developers:
  - user_id: user_001
    email: alice@example.com
    team: platform
    acceptance_rate: 0.6
    pr_behavior: { prs_per_week: 7, avg_pr_size_loc: 150 }
  - user_id: user_002
    email: bob@example.com
    team: mobile
    pr_behavior: { prs_per_week: 3 }
repositories:
  - { repo_name: acme/api, teams: [platform], default_branch: trunk }
  - { repo_name: acme/app, teams: [web] }
text_templates:
  commit_messages:
    feature: ["feat: add endpoint"]
    bugfix: ["fix: null check"]
"#,
            SeedFormat::Yaml,
        )
        .unwrap()
    }

    const NOW: OffsetDateTime = datetime!(2026-03-01 00:00 UTC);

    #[test]
    fn commits_conserve_lines_and_stay_in_window() {
        let seed = seed();
        let store = VecStore::default();
        let mut generator = CommitGenerator::new(&seed, &store, Velocity::Medium, 42);
        let n = generator.generate(NOW, 30, &CancellationToken::new()).unwrap();
        let commits = store.0.into_inner().unwrap();
        assert_eq!(n, commits.len());
        assert!(n > 0);
        for c in &commits {
            assert!(c.is_conserved(), "{c:?}");
            assert!(c.total_lines_added >= 1);
            assert!(c.commit_ts > NOW - Duration::days(30) && c.commit_ts <= NOW);
        }
    }

    #[test]
    fn commits_per_developer_are_time_ordered() {
        let seed = seed();
        let store = VecStore::default();
        CommitGenerator::new(&seed, &store, Velocity::High, 1)
            .generate(NOW, 14, &CancellationToken::new())
            .unwrap();
        let commits = store.0.into_inner().unwrap();
        for user in ["user_001", "user_002"] {
            let ts: Vec<_> = commits
                .iter()
                .filter(|c| c.user_id == user)
                .map(|c| c.commit_ts)
                .collect();
            assert!(ts.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn team_repository_preferred() {
        let seed = seed();
        let store = VecStore::default();
        CommitGenerator::new(&seed, &store, Velocity::Medium, 5)
            .generate(NOW, 14, &CancellationToken::new())
            .unwrap();
        let commits = store.0.into_inner().unwrap();
        for c in commits.iter().filter(|c| c.user_id == "user_001") {
            assert_eq!(c.repo_name, "acme/api");
            assert_eq!(c.is_primary_branch, c.branch_name == "trunk");
        }
    }

    #[test]
    fn branch_names_follow_prefix_pattern() {
        let seed = seed();
        let store = VecStore::default();
        CommitGenerator::new(&seed, &store, Velocity::High, 8)
            .generate(NOW, 30, &CancellationToken::new())
            .unwrap();
        for c in store.0.into_inner().unwrap() {
            if c.is_primary_branch {
                continue;
            }
            let (prefix, task) = c.branch_name.split_once("/task-").unwrap();
            assert!(BRANCH_PREFIXES.contains(&prefix));
            assert!(task.parse::<u32>().unwrap() < 1000);
        }
    }

    #[test]
    fn cap_is_global_and_exact() {
        let seed = seed();
        let store = VecStore::default();
        let n = CommitGenerator::new(&seed, &store, Velocity::High, 42)
            .with_max_commits(7)
            .generate(NOW, 90, &CancellationToken::new())
            .unwrap();
        assert_eq!(n, 7);
        assert_eq!(store.0.into_inner().unwrap().len(), 7);
    }

    #[test]
    fn cancelled_before_start() {
        let seed = seed();
        let store = VecStore::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = CommitGenerator::new(&seed, &store, Velocity::Medium, 1)
            .generate(NOW, 10, &cancel)
            .unwrap_err();
        assert!(matches!(err, SimError::Cancelled));
    }

    #[test]
    fn window_past_earliest_date_is_an_error() {
        let seed = seed();
        let store = VecStore::default();
        let err = CommitGenerator::new(&seed, &store, Velocity::Medium, 1)
            .generate(NOW, u32::MAX, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, SimError::WindowOutOfRange { days: u32::MAX }));
        assert!(store.0.into_inner().unwrap().is_empty());
        assert_eq!(
            history_start(NOW, 2).unwrap(),
            datetime!(2026-02-27 00:00 UTC)
        );
    }

    #[test]
    fn messages_come_from_templates() {
        let seed = seed();
        let store = VecStore::default();
        CommitGenerator::new(&seed, &store, Velocity::Medium, 3)
            .generate(NOW, 30, &CancellationToken::new())
            .unwrap();
        for c in store.0.into_inner().unwrap() {
            assert!(
                ["feat: add endpoint", "fix: null check", FALLBACK_MESSAGE]
                    .contains(&c.message.as_str()),
                "{}",
                c.message
            );
        }
    }

    #[test]
    fn split_lines_floors_ai_share() {
        assert_eq!(split_lines(100, 0.7, 0.6), (42, 28, 30));
        assert_eq!(split_lines(0, 0.7, 0.6), (0, 0, 0));
        assert_eq!(split_lines(10, 1.0, 0.8), (8, 2, 0));
        assert_eq!(split_lines(10, 0.0, 0.8), (0, 0, 10));
    }
}
