use crate::seed::AiRatioBands;
use crate::types::AiRatioBand;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One flattened row of the research dataset: a commit joined with its owning
/// pull request, review activity, and control variables.
///
/// Field names are snake_case so the JSON export loads directly into
/// dataframe tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchDataPoint {
    // Identifiers
    pub commit_hash: String,
    pub pr_number: Option<u32>,
    pub author_id: String,
    pub author_email: String,
    pub repo_name: String,

    // AI attribution
    pub ai_ratio: f64,
    pub ai_lines_added: u32,
    pub ai_lines_deleted: u32,
    pub non_ai_lines_added: u32,
    pub tab_lines: u32,
    pub composer_lines: u32,

    // Size
    pub additions: u32,
    pub deletions: u32,
    pub pr_volume: u32,
    pub pr_scatter: u32,
    pub files_changed: u32,

    // Cycle times
    pub coding_lead_time_hours: f64,
    pub review_lead_time_hours: f64,
    pub pickup_time_hours: f64,

    // Review cost
    pub review_density: f64,
    pub review_iterations: u32,
    pub reviewer_count: u32,
    pub rework_ratio: f64,
    pub scope_creep: f64,

    // Quality
    pub was_reverted: bool,
    pub required_hotfix: bool,
    pub has_hotfix_followup: bool,
    pub is_greenfield: bool,
    pub greenfield_index: f64,
    pub survival_rate_30d: f64,

    // Controls
    pub author_seniority: String,
    pub repo_maturity: String,
    pub repo_age_days: u32,
    pub primary_language: String,

    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl ResearchDataPoint {
    /// Band of this row's AI ratio under the given boundaries.
    pub fn ai_ratio_band(&self, bands: &AiRatioBands) -> AiRatioBand {
        bands.categorize(self.ai_ratio)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.commit_hash.is_empty() {
            return Err("commit_hash is required".into());
        }
        if self.author_id.is_empty() {
            return Err("author_id is required".into());
        }
        if self.repo_name.is_empty() {
            return Err("repo_name is required".into());
        }
        if !(0.0..=1.0).contains(&self.ai_ratio) {
            return Err(format!("ai_ratio must be between 0 and 1, got {}", self.ai_ratio));
        }
        if !(0.0..=1.0).contains(&self.survival_rate_30d) {
            return Err(format!(
                "survival_rate_30d must be between 0 and 1, got {}",
                self.survival_rate_30d
            ));
        }
        Ok(())
    }
}
