//! End-to-end run: commits, then PRs, reviews, and quality outcomes, each
//! stage with its own seed derived from the run seed.

use crate::commit::{history_start, CommitGenerator};
use crate::error::{SimResult, StoreContext};
use crate::pr::PrGenerator;
use crate::quality::QualityEngine;
use crate::research::ResearchGenerator;
use crate::review::ReviewGenerator;
use crate::rng::wall_clock_seed;
use crate::velocity::Velocity;
use cadence_core::{
    CommitStore, Directory, PullRequestStore, ResearchDataPoint, ReviewStore, SeedData,
};
use serde::Serialize;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::info;

const COMMIT_STAGE: u64 = 0;
const PR_STAGE: u64 = 1;
const REVIEW_STAGE: u64 = 2;
const QUALITY_STAGE: u64 = 3;
const RESEARCH_STAGE: u64 = 4;

/// Run parameters.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub days: u32,
    /// `None` derives a seed from the wall clock.
    pub seed: Option<u64>,
    pub velocity: Velocity,
    /// 0 means unbounded.
    pub max_commits: usize,
    /// End of the simulated window.
    pub now: OffsetDateTime,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            days: 90,
            seed: None,
            velocity: Velocity::Medium,
            max_commits: 0,
            now: OffsetDateTime::now_utc(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub rng_seed: u64,
    pub commits: usize,
    pub pull_requests: usize,
    pub review_comments: usize,
    pub quality_processed: usize,
    pub reverted: usize,
}

pub struct Simulation<'a> {
    seed: &'a SeedData,
    config: SimConfig,
    rng_seed: u64,
}

impl<'a> Simulation<'a> {
    pub fn new(seed: &'a SeedData, config: SimConfig) -> Self {
        let rng_seed = config.seed.unwrap_or_else(wall_clock_seed);
        Self {
            seed,
            config,
            rng_seed,
        }
    }

    pub fn rng_seed(&self) -> u64 {
        self.rng_seed
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// First instant of the simulated window.
    pub fn window_start(&self) -> SimResult<OffsetDateTime> {
        history_start(self.config.now, self.config.days)
    }

    fn stage_seed(&self, stage: u64) -> u64 {
        self.rng_seed.wrapping_add(stage)
    }

    /// Populate `store` with a full history. Records written before a
    /// cancellation or store failure stay in the store.
    pub fn run<S>(&self, store: &S, cancel: &CancellationToken) -> SimResult<RunSummary>
    where
        S: CommitStore + PullRequestStore + ReviewStore + Directory,
    {
        let cfg = &self.config;
        info!(
            rng_seed = self.rng_seed,
            days = cfg.days,
            velocity = %cfg.velocity,
            max_commits = cfg.max_commits,
            developers = self.seed.developers.len(),
            "simulation started"
        );

        let commits = CommitGenerator::new(
            self.seed,
            store,
            cfg.velocity,
            self.stage_seed(COMMIT_STAGE),
        )
        .with_max_commits(cfg.max_commits)
        .generate(cfg.now, cfg.days, cancel)?;

        let pull_requests = PrGenerator::new(self.seed, store, self.stage_seed(PR_STAGE))
            .generate_from_commits(self.window_start()?, cfg.now, cancel)?;

        let reviews = ReviewGenerator::new(self.seed, store, self.stage_seed(REVIEW_STAGE))
            .generate(cancel)?;

        let mut quality = QualityEngine::new(self.seed, store, self.stage_seed(QUALITY_STAGE));
        let mut quality_processed = 0;
        let mut reverted = 0;
        let repos = store
            .repositories()
            .store_op("repositories", String::new)?;
        for repo in repos {
            let report = quality.apply_quality_outcomes(&repo, cancel)?;
            quality_processed += report.processed;
            reverted += report.reverted;
        }

        let summary = RunSummary {
            rng_seed: self.rng_seed,
            commits,
            pull_requests,
            review_comments: reviews.comments,
            quality_processed,
            reverted,
        };
        info!(
            commits = summary.commits,
            pull_requests = summary.pull_requests,
            review_comments = summary.review_comments,
            reverted = summary.reverted,
            "simulation finished"
        );
        Ok(summary)
    }

    /// Research rows for every commit in the simulated window.
    pub fn dataset<S>(
        &self,
        store: &S,
        cancel: &CancellationToken,
    ) -> SimResult<Vec<ResearchDataPoint>>
    where
        S: CommitStore + PullRequestStore + ReviewStore + Directory,
    {
        ResearchGenerator::new(store, self.stage_seed(RESEARCH_STAGE), self.config.now)
            .generate_dataset(self.window_start()?, self.config.now, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;
    use cadence_core::{parse_seed, SeedFormat};
    use cadence_store::MemoryStore;
    use time::macros::datetime;

    fn seed() -> SeedData {
        parse_seed(
            r#"
developers:
  - { user_id: u1, email: a@x.io, team: core, seniority: senior }
  - { user_id: u2, email: b@x.io, team: core, seniority: junior }
  - { user_id: u3, email: c@x.io, team: web }
repositories:
  - { repo_name: acme/api, teams: [core] }
  - { repo_name: acme/web, teams: [web] }
"#,
            SeedFormat::Yaml,
        )
        .unwrap()
    }

    fn config() -> SimConfig {
        SimConfig {
            days: 30,
            seed: Some(11),
            velocity: Velocity::Medium,
            max_commits: 0,
            now: datetime!(2026-03-01 00:00 UTC),
        }
    }

    #[test]
    fn run_populates_every_stage() {
        let seed = seed();
        let store = MemoryStore::new(seed.clone());
        let sim = Simulation::new(&seed, config());
        let summary = sim.run(&store, &CancellationToken::new()).unwrap();

        assert_eq!(summary.rng_seed, 11);
        assert!(summary.commits > 0);
        assert!(summary.pull_requests > 0);
        assert!(summary.pull_requests <= summary.commits);
        assert_eq!(summary.commits, store.commit_count().unwrap());
        assert_eq!(summary.pull_requests, store.all_pull_requests().unwrap().len());
        assert_eq!(summary.review_comments, store.all_review_comments().unwrap().len());

        let rows = sim.dataset(&store, &CancellationToken::new()).unwrap();
        assert_eq!(rows.len(), summary.commits);
        assert!(rows.iter().all(|r| r.pr_number.is_some()));
    }

    #[test]
    fn explicit_seed_is_kept() {
        let seed = seed();
        let sim = Simulation::new(&seed, config());
        assert_eq!(sim.rng_seed(), 11);
        assert_eq!(sim.window_start().unwrap(), datetime!(2026-01-30 00:00 UTC));
    }

    #[test]
    fn cancelled_run_stops() {
        let seed = seed();
        let store = MemoryStore::new(seed.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = Simulation::new(&seed, config()).run(&store, &cancel).unwrap_err();
        assert!(matches!(err, SimError::Cancelled));
    }
}
