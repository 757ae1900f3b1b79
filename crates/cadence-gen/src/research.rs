//! Research dataset: one flat row per commit, joined with its owning PR,
//! review activity, quality outcomes, and control variables.

use crate::error::{SimError, SimResult, StoreContext};
use crate::rng::SimRng;
use cadence_core::seed::RepoMaturity;
use cadence_core::{
    Commit, CommitStore, Directory, PullRequest, PullRequestStore, ResearchDataPoint,
    ReviewComment, ReviewState, ReviewStore,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use time::{Duration, OffsetDateTime};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const CODING_LOOKBACK: Duration = Duration::days(7);
const HOTFIX_WINDOW: Duration = Duration::hours(48);
const SURVIVAL_WINDOW: Duration = Duration::days(30);
const GREENFIELD_THRESHOLD: f64 = 0.8;
const UNKNOWN: &str = "unknown";

type PrKey = (String, u32);

/// Commit → PR lookup. Commit hashes recorded on a PR win; otherwise the
/// most recently created PR on the same repo and branch (ties go to the
/// higher number).
#[derive(Debug, Default)]
pub struct PrIndex {
    prs: BTreeMap<PrKey, PullRequest>,
    by_hash: HashMap<String, PrKey>,
    by_branch: HashMap<(String, String), PrKey>,
}

impl PrIndex {
    pub fn build(prs: impl IntoIterator<Item = PullRequest>) -> Self {
        let mut index = PrIndex::default();
        for pr in prs {
            let key = (pr.repo_name.clone(), pr.number);
            for hash in &pr.commit_ids {
                index.by_hash.insert(hash.clone(), key.clone());
            }
            let branch_key = (pr.repo_name.clone(), pr.head_branch.clone());
            let replace = match index.by_branch.get(&branch_key).and_then(|k| index.prs.get(k)) {
                Some(existing) => (pr.created_at, pr.number) > (existing.created_at, existing.number),
                None => true,
            };
            if replace {
                index.by_branch.insert(branch_key, key.clone());
            }
            index.prs.insert(key, pr);
        }
        index
    }

    pub fn owning_pr(&self, commit: &Commit) -> Option<&PullRequest> {
        let key = self.by_hash.get(&commit.commit_hash).or_else(|| {
            self.by_branch
                .get(&(commit.repo_name.clone(), commit.branch_name.clone()))
        })?;
        self.prs.get(key)
    }

    /// Merged PRs of one repository, by number.
    pub fn merged_in_repo<'a>(&'a self, repo: &'a str) -> impl Iterator<Item = &'a PullRequest> + 'a {
        self.prs
            .range((repo.to_string(), 0)..=(repo.to_string(), u32::MAX))
            .map(|(_, pr)| pr)
            .filter(|pr| pr.is_merged())
    }
}

/// PR-level fields shared by every row that joins the same PR.
#[derive(Debug, Clone, PartialEq)]
struct PrMetrics {
    coding_lead_time_hours: f64,
    review_lead_time_hours: f64,
    pickup_time_hours: f64,
    review_density: f64,
    review_iterations: u32,
    reviewer_count: u32,
    rework_ratio: f64,
    scope_creep: f64,
    has_hotfix_followup: bool,
    is_greenfield: bool,
    greenfield_index: f64,
}

pub struct ResearchGenerator<'a, S> {
    store: &'a S,
    rng: SimRng,
    now: OffsetDateTime,
}

impl<'a, S> ResearchGenerator<'a, S>
where
    S: CommitStore + PullRequestStore + ReviewStore + Directory,
{
    /// `now` anchors the 30-day survival check.
    pub fn new(store: &'a S, rng_seed: u64, now: OffsetDateTime) -> Self {
        Self {
            store,
            rng: SimRng::seeded(rng_seed),
            now,
        }
    }

    /// Join every commit in `[from, to]` into a research row.
    ///
    /// Rows failing validation are logged and dropped. Draws one survival
    /// jitter per row whose PR is merged, unreverted, and old enough.
    pub fn generate_dataset(
        &mut self,
        from: OffsetDateTime,
        to: OffsetDateTime,
        cancel: &CancellationToken,
    ) -> SimResult<Vec<ResearchDataPoint>> {
        let commits = self
            .store
            .commits_in_range(from, to)
            .store_op("commits_in_range", || format!("{from}..{to}"))?;
        if commits.is_empty() {
            return Ok(Vec::new());
        }

        let index = self.build_index()?;
        let mut metrics: HashMap<PrKey, PrMetrics> = HashMap::new();
        let mut rows = Vec::with_capacity(commits.len());

        for commit in &commits {
            if cancel.is_cancelled() {
                return Err(SimError::Cancelled);
            }
            let mut row = base_row(commit);
            if let Some(pr) = index.owning_pr(commit) {
                let key = (pr.repo_name.clone(), pr.number);
                let pr_metrics = match metrics.get(&key) {
                    Some(m) => m.clone(),
                    None => {
                        let m = self.pr_metrics(pr, &index)?;
                        metrics.insert(key, m.clone());
                        m
                    }
                };
                self.apply_pr(&mut row, pr, pr_metrics);
            }
            self.apply_controls(&mut row);

            match row.validate() {
                Ok(()) => rows.push(row),
                Err(reason) => warn!(commit = %row.commit_hash, %reason, "research row dropped"),
            }
        }

        info!(commits = commits.len(), rows = rows.len(), pull_requests = metrics.len(), "research dataset built");
        Ok(rows)
    }

    fn build_index(&self) -> SimResult<PrIndex> {
        let mut prs = Vec::new();
        let repos = self
            .store
            .repositories()
            .store_op("repositories", String::new)?;
        for repo in repos {
            prs.extend(
                self.store
                    .pull_requests_in_repo(&repo)
                    .store_op("pull_requests_in_repo", || repo.clone())?,
            );
        }
        Ok(PrIndex::build(prs))
    }

    fn pr_metrics(&self, pr: &PullRequest, index: &PrIndex) -> SimResult<PrMetrics> {
        let end = pr.merged_at.unwrap_or(pr.created_at);
        let window = self
            .store
            .commits_in_range(pr.created_at - CODING_LOOKBACK, end)
            .store_op("commits_in_range", || format!("{}#{}", pr.repo_name, pr.number))?;
        let branch_commits: Vec<Commit> = window
            .into_iter()
            .filter(|c| c.repo_name == pr.repo_name && c.branch_name == pr.head_branch)
            .collect();

        let reviews = self
            .store
            .review_comments(&pr.repo_name, pr.number)
            .store_op("review_comments", || format!("{}#{}", pr.repo_name, pr.number))?;

        Ok(PrMetrics {
            coding_lead_time_hours: coding_lead_time_hours(&branch_commits),
            review_lead_time_hours: review_lead_time_hours(pr),
            pickup_time_hours: pickup_time_hours(pr),
            review_density: review_density(reviews.len(), pr.additions + pr.deletions),
            review_iterations: count_review_iterations(&reviews),
            reviewer_count: count_unique_reviewers(&reviews),
            rework_ratio: rework_ratio(pr),
            scope_creep: scope_creep(pr),
            has_hotfix_followup: has_hotfix_followup(pr, index.merged_in_repo(&pr.repo_name)),
            is_greenfield: is_greenfield(pr),
            greenfield_index: greenfield_index(pr),
        })
    }

    fn apply_pr(&mut self, row: &mut ResearchDataPoint, pr: &PullRequest, m: PrMetrics) {
        row.pr_number = Some(pr.number);
        row.ai_ratio = pr.ai_ratio;
        row.files_changed = pr.changed_files;
        row.pr_scatter = pr.changed_files;
        row.pr_volume = pr.additions + pr.deletions;
        row.coding_lead_time_hours = m.coding_lead_time_hours;
        row.review_lead_time_hours = m.review_lead_time_hours;
        row.pickup_time_hours = m.pickup_time_hours;
        row.review_density = m.review_density;
        row.review_iterations = m.review_iterations;
        row.reviewer_count = m.reviewer_count;
        row.rework_ratio = m.rework_ratio;
        row.scope_creep = m.scope_creep;
        row.was_reverted = pr.was_reverted;
        row.required_hotfix = pr.is_bug_fix && pr.was_reverted;
        row.has_hotfix_followup = m.has_hotfix_followup;
        row.is_greenfield = m.is_greenfield;
        row.greenfield_index = m.greenfield_index;
        row.survival_rate_30d = self.survival_rate_30d(pr);
    }

    /// 0 until 30 days after merge and for reverted PRs; otherwise
    /// `1 - 0.3 × ai_ratio` with ±10% jitter, clamped to [0, 1].
    pub fn survival_rate_30d(&mut self, pr: &PullRequest) -> f64 {
        let Some(merged_at) = pr.merged_at else {
            return 0.0;
        };
        if self.now < merged_at + SURVIVAL_WINDOW || pr.was_reverted {
            return 0.0;
        }
        let base = 1.0 - pr.ai_ratio * 0.3;
        let jitter = (self.rng.uniform() - 0.5) * 0.2;
        (base + jitter).clamp(0.0, 1.0)
    }

    fn apply_controls(&self, row: &mut ResearchDataPoint) {
        row.author_seniority = self
            .store
            .developer_by_id(&row.author_id)
            .map_or_else(|| UNKNOWN.to_string(), |d| d.seniority.as_str().to_string());

        match self.store.repository(&row.repo_name) {
            Some(repo) => {
                row.repo_maturity = RepoMaturity::from_age_days(repo.maturity.age_days)
                    .as_str()
                    .to_string();
                row.repo_age_days = repo.maturity.age_days;
                row.primary_language = if repo.primary_language.is_empty() {
                    UNKNOWN.to_string()
                } else {
                    repo.primary_language
                };
            }
            None => {
                row.repo_maturity = UNKNOWN.to_string();
                row.repo_age_days = 0;
                row.primary_language = UNKNOWN.to_string();
            }
        }
    }
}

/// Row populated from the commit alone.
fn base_row(commit: &Commit) -> ResearchDataPoint {
    ResearchDataPoint {
        commit_hash: commit.commit_hash.clone(),
        pr_number: None,
        author_id: commit.user_id.clone(),
        author_email: commit.user_email.clone(),
        repo_name: commit.repo_name.clone(),
        ai_ratio: commit.ai_ratio(),
        ai_lines_added: commit.ai_lines_added(),
        ai_lines_deleted: commit.tab_lines_deleted + commit.composer_lines_deleted,
        non_ai_lines_added: commit.non_ai_lines_added,
        tab_lines: commit.tab_lines_added,
        composer_lines: commit.composer_lines_added,
        additions: commit.total_lines_added,
        deletions: commit.total_lines_deleted,
        pr_volume: commit.total_lines_added + commit.total_lines_deleted,
        pr_scatter: 0,
        files_changed: 0,
        coding_lead_time_hours: 0.0,
        review_lead_time_hours: 0.0,
        pickup_time_hours: 0.0,
        review_density: 0.0,
        review_iterations: 0,
        reviewer_count: 0,
        rework_ratio: 0.0,
        scope_creep: 0.0,
        was_reverted: false,
        required_hotfix: false,
        has_hotfix_followup: false,
        is_greenfield: false,
        greenfield_index: 0.0,
        survival_rate_30d: 0.0,
        author_seniority: UNKNOWN.to_string(),
        repo_maturity: UNKNOWN.to_string(),
        repo_age_days: 0,
        primary_language: UNKNOWN.to_string(),
        timestamp: commit.commit_ts,
    }
}

fn hours(d: Duration) -> f64 {
    d.as_seconds_f64() / 3600.0
}

/// Span between the earliest and latest commit; 0 with fewer than two.
pub fn coding_lead_time_hours(commits: &[Commit]) -> f64 {
    if commits.len() < 2 {
        return 0.0;
    }
    let first = commits.iter().map(|c| c.commit_ts).min();
    let last = commits.iter().map(|c| c.commit_ts).max();
    match (first, last) {
        (Some(first), Some(last)) => hours(last - first),
        _ => 0.0,
    }
}

pub fn review_lead_time_hours(pr: &PullRequest) -> f64 {
    pr.merged_at.map_or(0.0, |m| hours(m - pr.created_at))
}

pub fn pickup_time_hours(pr: &PullRequest) -> f64 {
    pr.first_review_at.map_or(0.0, |r| hours(r - pr.created_at))
}

pub fn review_density(comment_count: usize, pr_volume: u32) -> f64 {
    if pr_volume == 0 {
        return 0.0;
    }
    comment_count as f64 / f64::from(pr_volume)
}

pub fn count_unique_reviewers(reviews: &[ReviewComment]) -> u32 {
    reviews
        .iter()
        .map(|r| r.author_id.as_str())
        .collect::<BTreeSet<_>>()
        .len() as u32
}

/// Change-request rounds: the most change requests any single reviewer made.
pub fn count_review_iterations(reviews: &[ReviewComment]) -> u32 {
    let mut per_reviewer: BTreeMap<&str, u32> = BTreeMap::new();
    for r in reviews {
        if r.state == ReviewState::ChangesRequested {
            *per_reviewer.entry(r.author_id.as_str()).or_default() += 1;
        }
    }
    per_reviewer.values().copied().max().unwrap_or(0)
}

/// `|final − initial| / initial`; 0 without an initial size.
pub fn rework_ratio(pr: &PullRequest) -> f64 {
    if pr.initial_additions == 0 {
        return 0.0;
    }
    f64::from(pr.additions.abs_diff(pr.initial_additions)) / f64::from(pr.initial_additions)
}

/// `(final − initial) / final`; negative when the PR shrank.
pub fn scope_creep(pr: &PullRequest) -> f64 {
    if pr.additions == 0 {
        return 0.0;
    }
    (f64::from(pr.additions) - f64::from(pr.initial_additions)) / f64::from(pr.additions)
}

/// More than 80% of changed lines are additions. No additions is never
/// greenfield; additions without deletions always is.
pub fn is_greenfield(pr: &PullRequest) -> bool {
    if pr.additions == 0 {
        return false;
    }
    if pr.deletions == 0 {
        return true;
    }
    addition_share(pr) > GREENFIELD_THRESHOLD
}

/// Addition share above the threshold, halved otherwise.
pub fn greenfield_index(pr: &PullRequest) -> f64 {
    if pr.additions == 0 {
        return 0.0;
    }
    let share = addition_share(pr);
    if share > GREENFIELD_THRESHOLD {
        share
    } else {
        share * 0.5
    }
}

fn addition_share(pr: &PullRequest) -> f64 {
    let total = u64::from(pr.additions) + u64::from(pr.deletions);
    if total == 0 {
        return 0.0;
    }
    f64::from(pr.additions) / total as f64
}

/// Another merged bug-fix PR landed within 48 hours after this one merged.
pub fn has_hotfix_followup<'a>(
    pr: &PullRequest,
    merged_in_repo: impl IntoIterator<Item = &'a PullRequest>,
) -> bool {
    let Some(merged_at) = pr.merged_at else {
        return false;
    };
    let window_end = merged_at + HOTFIX_WINDOW;
    merged_in_repo.into_iter().any(|other| {
        other.number != pr.number
            && other.is_bug_fix
            && other
                .merged_at
                .is_some_and(|t| t > merged_at && t < window_end)
    })
}
