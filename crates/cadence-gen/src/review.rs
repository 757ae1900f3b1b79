//! Review generator: reviewer selection, review iterations, and review
//! comments for every stored PR.

use crate::error::{SimError, SimResult, StoreContext};
use crate::rng::SimRng;
use cadence_core::seed::{ReviewPatterns, ReviewTemplates};
use cadence_core::{
    Directory, PullRequest, PullRequestStore, ReviewComment, ReviewState, ReviewStore, SeedData,
};
use time::{Duration, OffsetDateTime};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Review window for PRs that never merged or closed.
const OPEN_REVIEW_WINDOW: Duration = Duration::days(7);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReviewReport {
    pub pull_requests: usize,
    pub comments: usize,
}

pub struct ReviewGenerator<'a, S> {
    store: &'a S,
    rng: SimRng,
    patterns: ReviewPatterns,
    templates: ReviewTemplates,
    next_id: u64,
}

impl<'a, S: PullRequestStore + ReviewStore + Directory> ReviewGenerator<'a, S> {
    pub fn new(seed: &SeedData, store: &'a S, rng_seed: u64) -> Self {
        Self {
            store,
            rng: SimRng::seeded(rng_seed),
            patterns: seed.pr_lifecycle.review_patterns,
            templates: seed.text_templates.review_comments.clone(),
            next_id: 1,
        }
    }

    /// Review every PR of every repository, repositories in name order.
    pub fn generate(&mut self, cancel: &CancellationToken) -> SimResult<ReviewReport> {
        let mut total = ReviewReport::default();
        let repos = self
            .store
            .repositories()
            .store_op("repositories", String::new)?;
        for repo in repos {
            let report = self.generate_for_repo(&repo, cancel)?;
            total.pull_requests += report.pull_requests;
            total.comments += report.comments;
        }
        info!(
            pull_requests = total.pull_requests,
            comments = total.comments,
            "reviews generated"
        );
        Ok(total)
    }

    pub fn generate_for_repo(
        &mut self,
        repo: &str,
        cancel: &CancellationToken,
    ) -> SimResult<ReviewReport> {
        let prs = self
            .store
            .pull_requests_in_repo(repo)
            .store_op("pull_requests_in_repo", || repo.to_string())?;

        let mut report = ReviewReport::default();
        for pr in prs {
            if cancel.is_cancelled() {
                return Err(SimError::Cancelled);
            }
            let comments = self.review_pull_request(pr)?;
            report.pull_requests += 1;
            report.comments += comments;
        }
        Ok(report)
    }

    /// Pick reviewers other than the author: same team first, then everyone
    /// else. Each pool is sorted, then shuffled.
    pub fn select_reviewers(&mut self, author_id: &str, author_team: &str) -> Vec<String> {
        let mut same_team = Vec::new();
        let mut other_team = Vec::new();
        for dev in self.store.developers() {
            if dev.user_id == author_id {
                continue;
            }
            if !author_team.is_empty() && dev.team == author_team {
                same_team.push(dev.user_id);
            } else {
                other_team.push(dev.user_id);
            }
        }
        same_team.sort();
        other_team.sort();

        let wanted = self.patterns.reviewer_count.max(1) as usize;
        self.rng.shuffle(&mut same_team);
        let mut reviewers: Vec<String> = same_team.into_iter().take(wanted).collect();
        if reviewers.len() < wanted {
            self.rng.shuffle(&mut other_team);
            let missing = wanted - reviewers.len();
            reviewers.extend(other_team.into_iter().take(missing));
        }
        reviewers
    }

    /// Starts at one round; each further round up to the cap happens with
    /// probability `λ / (i + λ)`.
    pub fn simulate_iterations(&mut self) -> u32 {
        let lambda = self.patterns.iterations_lambda;
        let mut iterations = 1;
        for i in 1..self.patterns.max_iterations.max(1) {
            if self.rng.chance(lambda / (f64::from(i) + lambda)) {
                iterations += 1;
            }
        }
        iterations
    }

    fn review_pull_request(&mut self, mut pr: PullRequest) -> SimResult<usize> {
        let team = self
            .store
            .developer_by_id(&pr.author_id)
            .map(|d| d.team)
            .unwrap_or_default();
        let reviewers = self.select_reviewers(&pr.author_id, &team);
        if reviewers.is_empty() {
            return Ok(0);
        }
        let iterations = self.simulate_iterations();

        let start = pr.created_at;
        let end = pr
            .merged_at
            .or(pr.closed_at)
            .unwrap_or(start + OPEN_REVIEW_WINDOW);
        let window = (end - start).max(Duration::minutes(1));
        let round_len = window / iterations;

        let mut first_review_at: Option<OffsetDateTime> = None;
        let mut written = 0;
        for round in 0..iterations {
            let last_round = round + 1 == iterations;
            let state = match (last_round, pr.is_merged()) {
                (false, _) => ReviewState::ChangesRequested,
                (true, true) => ReviewState::Approved,
                (true, false) => ReviewState::Pending,
            };
            let round_start = start + round_len * round;
            for reviewer in &reviewers {
                let created_at = round_start + round_len * self.rng.uniform();
                let comment = ReviewComment {
                    id: self.next_id,
                    pr_number: pr.number,
                    repo_name: pr.repo_name.clone(),
                    author_id: reviewer.clone(),
                    body: self.comment_body(state),
                    state,
                    created_at,
                };
                self.next_id += 1;
                first_review_at = Some(first_review_at.map_or(created_at, |t| t.min(created_at)));
                let key = format!("{}#{}", pr.repo_name, pr.number);
                self.store
                    .add_review_comment(comment)
                    .store_op("add_review_comment", || key)?;
                written += 1;
            }
        }

        pr.reviewers = reviewers;
        pr.review_iterations = iterations;
        pr.first_review_at = first_review_at;
        let key = format!("{}#{}", pr.repo_name, pr.number);
        self.store
            .update_pull_request(pr)
            .store_op("update_pull_request", || key)?;
        Ok(written)
    }

    fn comment_body(&mut self, state: ReviewState) -> String {
        let t = &self.templates;
        let (pool, fallback): (Vec<&String>, &str) = match state {
            ReviewState::Approved => (t.approval.iter().collect(), "LGTM"),
            ReviewState::ChangesRequested => (
                t.style.iter().chain(&t.logic).chain(&t.suggestion).collect(),
                "Please address the comments before merging.",
            ),
            ReviewState::Pending => (
                t.suggestion.iter().chain(&t.style).collect(),
                "Left a few comments.",
            ),
        };
        match self.rng.pick(&pool) {
            Some(body) => (*body).clone(),
            None => fallback.to_string(),
        }
    }
}
