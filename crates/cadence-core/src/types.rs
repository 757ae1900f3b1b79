use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A commit with its lines attributed to Tab completion, Composer, or a human.
///
/// Produced once by the commit stream and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub commit_hash: String,
    pub user_id: String,
    pub user_email: String,
    pub user_name: String,
    pub repo_name: String,
    pub branch_name: String,
    pub is_primary_branch: bool,
    pub total_lines_added: u32,
    pub total_lines_deleted: u32,
    pub tab_lines_added: u32,
    pub tab_lines_deleted: u32,
    pub composer_lines_added: u32,
    pub composer_lines_deleted: u32,
    pub non_ai_lines_added: u32,
    pub non_ai_lines_deleted: u32,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub commit_ts: OffsetDateTime,
}

impl Commit {
    /// Lines added by either AI channel.
    pub fn ai_lines_added(&self) -> u32 {
        self.tab_lines_added + self.composer_lines_added
    }

    /// Fraction of added lines that came from AI channels; 0 when nothing was added.
    pub fn ai_ratio(&self) -> f64 {
        ai_ratio(self.ai_lines_added(), self.total_lines_added)
    }

    /// Whether the per-channel counts sum to the totals.
    pub fn is_conserved(&self) -> bool {
        self.total_lines_added
            == self.tab_lines_added + self.composer_lines_added + self.non_ai_lines_added
            && self.total_lines_deleted
                == self.tab_lines_deleted + self.composer_lines_deleted + self.non_ai_lines_deleted
    }
}

/// `ai / total`, defined as 0 when `total` is 0.
pub fn ai_ratio(ai_lines: u32, total_lines: u32) -> f64 {
    if total_lines == 0 {
        0.0
    } else {
        f64::from(ai_lines) / f64::from(total_lines)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrState {
    Open,
    Closed,
    Merged,
}

impl PrState {
    pub fn as_str(self) -> &'static str {
        match self {
            PrState::Open => "open",
            PrState::Closed => "closed",
            PrState::Merged => "merged",
        }
    }
}

/// A pull request envelope aggregated from one clustering session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u32,
    pub title: String,
    pub body: String,
    pub state: PrState,
    pub author_id: String,
    pub author_email: String,
    pub author_name: String,
    pub repo_name: String,
    pub base_branch: String,
    pub head_branch: String,
    #[serde(default)]
    pub reviewers: Vec<String>,
    #[serde(default)]
    pub labels: Vec<String>,

    pub additions: u32,
    pub deletions: u32,
    /// Additions of the first commit; baseline for rework and scope creep.
    pub initial_additions: u32,
    pub changed_files: u32,
    pub commit_count: u32,
    pub commit_ids: Vec<String>,

    pub ai_ratio: f64,
    pub tab_lines: u32,
    pub composer_lines: u32,

    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub merged_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub closed_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub first_review_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub first_commit_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_commit_at: OffsetDateTime,

    #[serde(default)]
    pub review_iterations: u32,
    #[serde(default)]
    pub was_reverted: bool,
    #[serde(default)]
    pub is_bug_fix: bool,
}

impl PullRequest {
    pub fn is_merged(&self) -> bool {
        self.state == PrState::Merged
    }

    pub fn ai_lines(&self) -> u32 {
        self.tab_lines + self.composer_lines
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    Pending,
    Approved,
    ChangesRequested,
}

/// One reviewer's comment on a pull request, keyed by repository and PR number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewComment {
    pub id: u64,
    pub pr_number: u32,
    pub repo_name: String,
    pub author_id: String,
    pub body: String,
    pub state: ReviewState,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Categorical bucket of a PR's AI ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiRatioBand {
    Low,
    Medium,
    High,
}

impl AiRatioBand {
    pub fn as_str(self) -> &'static str {
        match self {
            AiRatioBand::Low => "low",
            AiRatioBand::Medium => "medium",
            AiRatioBand::High => "high",
        }
    }
}
