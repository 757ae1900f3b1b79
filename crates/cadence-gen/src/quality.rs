//! Quality signals: AI-ratio bands, revert and hotfix probabilities, and the
//! pass that marks merged PRs as reverted.

use crate::error::{SimError, SimResult, StoreContext};
use crate::rng::SimRng;
use cadence_core::seed::AiRatioBands;
use cadence_core::{AiRatioBand, PullRequest, PullRequestStore, SeedData};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub const DEFAULT_REVERT_BASE: f64 = 0.05;
pub const DEFAULT_HOTFIX_BASE: f64 = 0.10;

const BUG_LABELS: [&str; 3] = ["bug", "bugfix", "hotfix"];
const BUG_TITLE_PREFIXES: [&str; 6] = ["fix:", "fix(", "bugfix:", "bugfix(", "hotfix:", "hotfix("];

/// Probability model built from seed correlations, with built-in defaults
/// for anything the seed leaves out.
#[derive(Debug, Clone)]
pub struct QualityModel {
    bands: AiRatioBands,
    revert_base: f64,
    revert_modifiers: BTreeMap<AiRatioBand, f64>,
    hotfix_base: f64,
}

impl Default for QualityModel {
    fn default() -> Self {
        Self {
            bands: AiRatioBands::default(),
            revert_base: DEFAULT_REVERT_BASE,
            revert_modifiers: default_revert_modifiers(),
            hotfix_base: DEFAULT_HOTFIX_BASE,
        }
    }
}

fn default_revert_modifiers() -> BTreeMap<AiRatioBand, f64> {
    BTreeMap::from([
        (AiRatioBand::Low, 0.8),
        (AiRatioBand::Medium, 1.0),
        (AiRatioBand::High, 1.5),
    ])
}

impl QualityModel {
    pub fn from_seed(seed: &SeedData) -> Self {
        let outcomes = &seed.pr_lifecycle.quality_outcomes;
        let configured = outcomes.revert_probability.ai_ratio_modifiers();
        let revert_modifiers = if configured.is_empty() {
            default_revert_modifiers()
        } else {
            [AiRatioBand::Low, AiRatioBand::Medium, AiRatioBand::High]
                .into_iter()
                .map(|band| (band, configured.get(band.as_str()).copied().unwrap_or(1.0)))
                .collect()
        };
        Self {
            bands: seed.ai_ratio_bands(),
            revert_base: outcomes.revert_probability.base.unwrap_or(DEFAULT_REVERT_BASE),
            revert_modifiers,
            hotfix_base: outcomes.hotfix_probability.base.unwrap_or(DEFAULT_HOTFIX_BASE),
        }
    }

    pub fn bands(&self) -> &AiRatioBands {
        &self.bands
    }

    pub fn categorize(&self, ai_ratio: f64) -> AiRatioBand {
        self.bands.categorize(ai_ratio)
    }

    pub fn band_modifier(&self, band: AiRatioBand) -> f64 {
        self.revert_modifiers.get(&band).copied().unwrap_or(1.0)
    }

    /// `base × band modifier × iteration discount`.
    pub fn revert_probability(&self, ai_ratio: f64, review_iterations: u32) -> f64 {
        self.revert_base
            * self.band_modifier(self.categorize(ai_ratio))
            * iteration_discount(review_iterations)
    }

    /// Base rate compounded by ×1.3 for bug fixes, ×1.2 above 0.7 AI ratio,
    /// and ×1.5 above 500 additions.
    pub fn hotfix_probability(&self, pr: &PullRequest) -> f64 {
        let mut p = self.hotfix_base;
        if pr.is_bug_fix {
            p *= 1.3;
        }
        if pr.ai_ratio > 0.7 {
            p *= 1.2;
        }
        if pr.additions > 500 {
            p *= 1.5;
        }
        p
    }
}

/// 10% off per review iteration beyond the first, never below half.
pub fn iteration_discount(review_iterations: u32) -> f64 {
    if review_iterations <= 1 {
        return 1.0;
    }
    (1.0 - f64::from(review_iterations - 1) * 0.1).max(0.5)
}

pub fn is_bug_fix(pr: &PullRequest) -> bool {
    if pr
        .labels
        .iter()
        .any(|l| BUG_LABELS.contains(&l.to_lowercase().as_str()))
    {
        return true;
    }
    let title = pr.title.to_lowercase();
    BUG_TITLE_PREFIXES.iter().any(|p| title.starts_with(p))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QualityReport {
    pub processed: usize,
    pub reverted: usize,
}

pub struct QualityEngine<'a, S> {
    model: QualityModel,
    store: &'a S,
    rng: SimRng,
}

impl<'a, S: PullRequestStore> QualityEngine<'a, S> {
    pub fn new(seed: &SeedData, store: &'a S, rng_seed: u64) -> Self {
        Self {
            model: QualityModel::from_seed(seed),
            store,
            rng: SimRng::seeded(rng_seed),
        }
    }

    pub fn model(&self) -> &QualityModel {
        &self.model
    }

    /// Recompute `is_bug_fix` and draw `was_reverted` for every merged PR in
    /// `repo` not already reverted, persisting each one.
    ///
    /// One draw per processed PR, in PR-number order.
    pub fn apply_quality_outcomes(
        &mut self,
        repo: &str,
        cancel: &CancellationToken,
    ) -> SimResult<QualityReport> {
        if cancel.is_cancelled() {
            return Err(SimError::Cancelled);
        }
        let prs = self
            .store
            .pull_requests_in_repo(repo)
            .store_op("pull_requests_in_repo", || repo.to_string())?;

        let mut report = QualityReport::default();
        for mut pr in prs {
            if !pr.is_merged() || pr.was_reverted {
                continue;
            }
            pr.is_bug_fix = is_bug_fix(&pr);
            let p = self.model.revert_probability(pr.ai_ratio, pr.review_iterations);
            if self.rng.chance(p) {
                pr.was_reverted = true;
                report.reverted += 1;
            }
            let key = format!("{}#{}", pr.repo_name, pr.number);
            self.store
                .update_pull_request(pr)
                .store_op("update_pull_request", || key)?;
            report.processed += 1;
        }

        info!(repo, processed = report.processed, reverted = report.reverted, "quality outcomes applied");
        Ok(report)
    }
}
