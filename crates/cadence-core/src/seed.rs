//! Seed data: the developers, repositories, and tuning knobs a simulation run
//! is built from. Loaded once, read-only during generation.

use crate::error::SeedError;
use crate::types::AiRatioBand;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

// ── Developers ──

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Seniority {
    Junior,
    #[default]
    Mid,
    Senior,
}

impl Seniority {
    pub fn as_str(self) -> &'static str {
        match self {
            Seniority::Junior => "junior",
            Seniority::Mid => "mid",
            Seniority::Senior => "senior",
        }
    }
}

/// Local working-hours window, in hours of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHours {
    pub start: u8,
    pub end: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak: Option<u8>,
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self {
            start: 9,
            end: 18,
            peak: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrBehavior {
    #[serde(default = "default_prs_per_week")]
    pub prs_per_week: f64,
    #[serde(default = "default_avg_pr_size")]
    pub avg_pr_size_loc: u32,
    #[serde(default = "default_avg_files")]
    pub avg_files_per_pr: u32,
}

impl Default for PrBehavior {
    fn default() -> Self {
        Self {
            prs_per_week: default_prs_per_week(),
            avg_pr_size_loc: default_avg_pr_size(),
            avg_files_per_pr: default_avg_files(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Developer {
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub seniority: Seniority,
    #[serde(default = "default_acceptance_rate")]
    pub acceptance_rate: f64,
    #[serde(default)]
    pub pr_behavior: PrBehavior,
    #[serde(default)]
    pub working_hours: WorkingHours,
}

impl Developer {
    /// Stand-in for an author id the seed does not know about.
    pub fn fallback(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            email: String::new(),
            name: String::new(),
            team: String::new(),
            seniority: Seniority::Mid,
            acceptance_rate: default_acceptance_rate(),
            pr_behavior: PrBehavior::default(),
            working_hours: WorkingHours::default(),
        }
    }
}

// ── Repositories ──

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Maturity {
    #[serde(default)]
    pub age_days: u32,
}

/// Age class of a repository, used as a research control variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoMaturity {
    Greenfield,
    Developing,
    Mature,
}

impl RepoMaturity {
    pub fn from_age_days(age_days: u32) -> Self {
        match age_days {
            0..=89 => RepoMaturity::Greenfield,
            90..=179 => RepoMaturity::Developing,
            _ => RepoMaturity::Mature,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RepoMaturity::Greenfield => "greenfield",
            RepoMaturity::Developing => "developing",
            RepoMaturity::Mature => "mature",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub repo_name: String,
    #[serde(default = "default_branch")]
    pub default_branch: String,
    #[serde(default)]
    pub teams: Vec<String>,
    #[serde(default)]
    pub primary_language: String,
    #[serde(default)]
    pub maturity: Maturity,
}

impl Repository {
    /// Stand-in for a repository name the seed does not know about.
    pub fn fallback(repo_name: &str) -> Self {
        Self {
            repo_name: repo_name.to_string(),
            default_branch: default_branch(),
            teams: Vec::new(),
            primary_language: String::new(),
            maturity: Maturity::default(),
        }
    }

    pub fn maturity_class(&self) -> RepoMaturity {
        RepoMaturity::from_age_days(self.maturity.age_days)
    }
}

// ── Correlations ──

/// Half-open `[min, max)` interval of AI ratios.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandRange {
    pub min: f64,
    pub max: f64,
}

impl BandRange {
    fn contains(&self, ratio: f64) -> bool {
        ratio >= self.min && ratio < self.max
    }
}

/// Boundaries of the low/medium/high AI-ratio bands. `high` is closed at 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AiRatioBands {
    pub low: BandRange,
    pub medium: BandRange,
    pub high: BandRange,
}

impl Default for AiRatioBands {
    fn default() -> Self {
        Self {
            low: BandRange { min: 0.0, max: 0.3 },
            medium: BandRange { min: 0.3, max: 0.7 },
            high: BandRange { min: 0.7, max: 1.0 },
        }
    }
}

impl AiRatioBands {
    pub fn categorize(&self, ratio: f64) -> AiRatioBand {
        if self.low.contains(ratio) {
            AiRatioBand::Low
        } else if self.medium.contains(ratio) {
            AiRatioBand::Medium
        } else {
            AiRatioBand::High
        }
    }

    /// Bands must tile [0, 1] in order with no gap and no overlap.
    pub fn validate(&self) -> Result<(), SeedError> {
        let ordered = [self.low, self.medium, self.high];
        if self.low.min != 0.0 || self.high.max != 1.0 {
            return Err(SeedError::Invalid(format!(
                "ai_ratio_bands must span [0, 1], got [{}, {}]",
                self.low.min, self.high.max
            )));
        }
        for band in &ordered {
            if band.min > band.max {
                return Err(SeedError::Invalid(format!(
                    "ai_ratio_bands: min {} exceeds max {}",
                    band.min, band.max
                )));
            }
        }
        for pair in ordered.windows(2) {
            if pair[0].max != pair[1].min {
                return Err(SeedError::Invalid(format!(
                    "ai_ratio_bands: boundary mismatch {} vs {}",
                    pair[0].max, pair[1].min
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Correlations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_ratio_bands: Option<AiRatioBands>,
}

// ── PR lifecycle ──

/// Base probability plus per-band multipliers keyed by band name.
/// An absent `base` falls back to the built-in rate.
///
/// Band multipliers may sit directly under the probability or nested under
/// `modifiers`; a flat entry wins over a nested one for the same band.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub by_ai_ratio: BTreeMap<String, f64>,
    #[serde(default)]
    pub modifiers: OutcomeModifiers,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeModifiers {
    #[serde(default)]
    pub by_ai_ratio: BTreeMap<String, f64>,
}

impl ProbabilityConfig {
    /// Per-band multipliers from both spellings, flat entries last.
    pub fn ai_ratio_modifiers(&self) -> BTreeMap<String, f64> {
        let mut merged = self.modifiers.by_ai_ratio.clone();
        merged.extend(self.by_ai_ratio.iter().map(|(k, v)| (k.clone(), *v)));
        merged
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityOutcomes {
    #[serde(default)]
    pub revert_probability: ProbabilityConfig,
    #[serde(default)]
    pub hotfix_probability: ProbabilityConfig,
}

/// Longest review lead time a seed may configure, mean or spread.
pub const MAX_LEAD_TIME_HOURS: f64 = 24.0 * 365.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationParams {
    pub mean_hours: f64,
    pub std_hours: f64,
}

impl Default for DurationParams {
    fn default() -> Self {
        Self {
            mean_hours: 8.0,
            std_hours: 4.0,
        }
    }
}

/// Terminal PR state weights; need not sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateWeights {
    pub merged: f64,
    pub closed: f64,
    pub open: f64,
}

impl Default for StateWeights {
    fn default() -> Self {
        Self {
            merged: 0.85,
            closed: 0.10,
            open: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReviewPatterns {
    #[serde(default = "default_reviewer_count")]
    pub reviewer_count: u32,
    #[serde(default = "default_iterations_lambda")]
    pub iterations_lambda: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

impl Default for ReviewPatterns {
    fn default() -> Self {
        Self {
            reviewer_count: default_reviewer_count(),
            iterations_lambda: default_iterations_lambda(),
            max_iterations: default_max_iterations(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrLifecycle {
    #[serde(default)]
    pub state_weights: StateWeights,
    #[serde(default)]
    pub review_lead_time: DurationParams,
    #[serde(default)]
    pub quality_outcomes: QualityOutcomes,
    #[serde(default)]
    pub review_patterns: ReviewPatterns,
}

// ── Text templates ──

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitMessages {
    #[serde(default)]
    pub feature: Vec<String>,
    #[serde(default)]
    pub bugfix: Vec<String>,
    #[serde(default)]
    pub refactor: Vec<String>,
    #[serde(default)]
    pub chore: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewTemplates {
    #[serde(default)]
    pub style: Vec<String>,
    #[serde(default)]
    pub logic: Vec<String>,
    #[serde(default)]
    pub suggestion: Vec<String>,
    #[serde(default)]
    pub approval: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextTemplates {
    #[serde(default)]
    pub commit_messages: CommitMessages,
    #[serde(default)]
    pub review_comments: ReviewTemplates,
}

// ── Seed root ──

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeedData {
    pub developers: Vec<Developer>,
    #[serde(default)]
    pub repositories: Vec<Repository>,
    #[serde(default)]
    pub correlations: Correlations,
    #[serde(default)]
    pub pr_lifecycle: PrLifecycle,
    #[serde(default)]
    pub text_templates: TextTemplates,
}

impl SeedData {
    pub fn developer(&self, user_id: &str) -> Option<&Developer> {
        self.developers.iter().find(|d| d.user_id == user_id)
    }

    /// Developer by id, or a mid-seniority stand-in with standard hours.
    pub fn developer_or_default(&self, user_id: &str) -> Developer {
        self.developer(user_id)
            .cloned()
            .unwrap_or_else(|| Developer::fallback(user_id))
    }

    pub fn repository(&self, repo_name: &str) -> Option<&Repository> {
        self.repositories.iter().find(|r| r.repo_name == repo_name)
    }

    /// Repository by name, or a stand-in whose default branch is `main`.
    pub fn repository_or_default(&self, repo_name: &str) -> Repository {
        self.repository(repo_name)
            .cloned()
            .unwrap_or_else(|| Repository::fallback(repo_name))
    }

    pub fn ai_ratio_bands(&self) -> AiRatioBands {
        self.correlations.ai_ratio_bands.unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), SeedError> {
        if self.developers.is_empty() {
            return Err(SeedError::Invalid(
                "must have at least one developer".into(),
            ));
        }

        let mut ids = HashSet::new();
        let mut emails = HashSet::new();
        for (i, dev) in self.developers.iter().enumerate() {
            validate_developer(dev, i)?;
            if !ids.insert(dev.user_id.as_str()) {
                return Err(SeedError::Invalid(format!(
                    "developers[{i}]: duplicate user_id {:?}",
                    dev.user_id
                )));
            }
            if !emails.insert(dev.email.as_str()) {
                return Err(SeedError::Invalid(format!(
                    "developers[{i}]: duplicate email {:?}",
                    dev.email
                )));
            }
        }

        for (i, repo) in self.repositories.iter().enumerate() {
            if repo.repo_name.trim().is_empty() {
                return Err(SeedError::Invalid(format!(
                    "repositories[{i}]: repo_name is required"
                )));
            }
        }

        if let Some(bands) = &self.correlations.ai_ratio_bands {
            bands.validate()?;
        }

        let outcomes = &self.pr_lifecycle.quality_outcomes;
        for (name, config) in [
            ("revert_probability", &outcomes.revert_probability),
            ("hotfix_probability", &outcomes.hotfix_probability),
        ] {
            if let Some(base) = config.base {
                if !(0.0..=1.0).contains(&base) {
                    return Err(SeedError::Invalid(format!(
                        "{name}.base must be between 0 and 1, got {base}"
                    )));
                }
            }
        }

        let lead = &self.pr_lifecycle.review_lead_time;
        if !lead.mean_hours.is_finite()
            || lead.mean_hours <= 0.0
            || lead.mean_hours > MAX_LEAD_TIME_HOURS
        {
            return Err(SeedError::Invalid(format!(
                "review_lead_time.mean_hours must be in (0, {MAX_LEAD_TIME_HOURS}], got {}",
                lead.mean_hours
            )));
        }
        if !lead.std_hours.is_finite()
            || lead.std_hours < 0.0
            || lead.std_hours > MAX_LEAD_TIME_HOURS
        {
            return Err(SeedError::Invalid(format!(
                "review_lead_time.std_hours must be in [0, {MAX_LEAD_TIME_HOURS}], got {}",
                lead.std_hours
            )));
        }

        let w = &self.pr_lifecycle.state_weights;
        if w.merged < 0.0 || w.closed < 0.0 || w.open < 0.0 {
            return Err(SeedError::Invalid(
                "state_weights must not be negative".into(),
            ));
        }
        Ok(())
    }
}

fn validate_developer(dev: &Developer, index: usize) -> Result<(), SeedError> {
    if dev.user_id.trim().is_empty() {
        return Err(SeedError::Invalid(format!(
            "developers[{index}]: user_id is required"
        )));
    }
    if !is_valid_email(&dev.email) {
        return Err(SeedError::Invalid(format!(
            "developers[{index}]: invalid email {:?}",
            dev.email
        )));
    }
    if !(0.0..=1.0).contains(&dev.acceptance_rate) {
        return Err(SeedError::Invalid(format!(
            "developers[{index}]: acceptance_rate must be between 0 and 1, got {}",
            dev.acceptance_rate
        )));
    }
    if dev.pr_behavior.prs_per_week < 0.0 {
        return Err(SeedError::Invalid(format!(
            "developers[{index}]: prs_per_week must not be negative"
        )));
    }
    Ok(())
}

fn is_valid_email(email: &str) -> bool {
    if email.contains(' ') {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.contains('@')
        }
        None => false,
    }
}

// ── Loading ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedFormat {
    Json,
    Yaml,
}

impl SeedFormat {
    pub fn from_path(path: &Path) -> Result<Self, SeedError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        match ext {
            "json" => Ok(SeedFormat::Json),
            "yaml" | "yml" => Ok(SeedFormat::Yaml),
            other => Err(SeedError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Load and validate a seed file; the format follows the file extension.
pub fn load_seed(path: &Path) -> Result<SeedData, SeedError> {
    let format = SeedFormat::from_path(path)?;
    let content = std::fs::read_to_string(path).map_err(|source| SeedError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_seed(&content, format)
}

/// Parse and validate seed text.
pub fn parse_seed(content: &str, format: SeedFormat) -> Result<SeedData, SeedError> {
    let seed: SeedData = match format {
        SeedFormat::Json => serde_json::from_str(content)?,
        SeedFormat::Yaml => serde_yaml::from_str(content)?,
    };
    seed.validate()?;
    Ok(seed)
}

fn default_prs_per_week() -> f64 {
    2.0
}
fn default_avg_pr_size() -> u32 {
    200
}
fn default_avg_files() -> u32 {
    5
}
fn default_acceptance_rate() -> f64 {
    0.7
}
fn default_branch() -> String {
    "main".to_string()
}
fn default_reviewer_count() -> u32 {
    2
}
fn default_iterations_lambda() -> f64 {
    1.5
}
fn default_max_iterations() -> u32 {
    3
}
