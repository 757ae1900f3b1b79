use serde::{Deserialize, Serialize};
use std::fmt;

/// Activity preset scaling every developer's baseline commit rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Velocity {
    Low,
    #[default]
    Medium,
    High,
}

/// Commits per PR assumed when deriving a commit rate from a PR rate.
const COMMITS_PER_PR: f64 = 3.0;

impl Velocity {
    /// Parse a preset name; unknown names fall back to `Medium`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "low" => Velocity::Low,
            "high" => Velocity::High,
            _ => Velocity::Medium,
        }
    }

    pub fn multiplier(self) -> f64 {
        match self {
            Velocity::Low => 0.5,
            Velocity::Medium => 1.0,
            Velocity::High => 2.0,
        }
    }

    pub fn commits_per_day(self, prs_per_week: f64) -> f64 {
        prs_per_week * COMMITS_PER_PR / 7.0 * self.multiplier()
    }

    pub fn commits_per_hour(self, prs_per_week: f64) -> f64 {
        self.commits_per_day(prs_per_week) / 24.0
    }
}

impl fmt::Display for Velocity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Velocity::Low => "low",
            Velocity::Medium => "medium",
            Velocity::High => "high",
        };
        f.write_str(name)
    }
}
