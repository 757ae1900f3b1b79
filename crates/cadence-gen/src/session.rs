//! Session-based clustering of commits into pull-request envelopes.
//!
//! A session is the open work period of one author on one branch. It is
//! created by the first commit of a cluster and consumed the moment it closes,
//! yielding exactly one PR.

use crate::rng::SimRng;
use cadence_core::{Commit, Developer, Seniority};
use std::collections::BTreeMap;
use time::{Duration, OffsetDateTime};

/// Chance of closing early once a session holds enough commits.
const EARLY_CLOSE_CHANCE: f64 = 0.01;
const EARLY_CLOSE_MIN_COMMITS: usize = 3;

/// Thresholds sampled when a session opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionParams {
    pub max_commits: u32,
    pub target_loc: u32,
    pub inactivity_gap: Duration,
}

impl SessionParams {
    /// Draw order: max commits, target LoC, inactivity gap.
    pub fn sample(seniority: Seniority, rng: &mut SimRng) -> Self {
        let max_commits = match seniority {
            Seniority::Junior => rng.between(2, 5),
            Seniority::Mid => rng.between(4, 8),
            Seniority::Senior => rng.between(5, 12),
        };
        let target_loc = match seniority {
            Seniority::Junior => rng.between(50, 150),
            Seniority::Mid => rng.between(100, 300),
            Seniority::Senior => rng.between(150, 500),
        };
        let inactivity_gap = Duration::minutes(i64::from(rng.between(15, 60)));
        Self {
            max_commits,
            target_loc,
            inactivity_gap,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    MaxCommits,
    InactivityGap,
    EarlyClose,
    EndOfStream,
}

#[derive(Debug)]
pub struct Session {
    pub params: SessionParams,
    pub commits: Vec<Commit>,
}

impl Session {
    fn open(params: SessionParams) -> Self {
        Self {
            params,
            commits: Vec::new(),
        }
    }

    /// Close check after a commit was appended, given the next commit's time.
    ///
    /// Draws from `rng` only when the first two rules pass and the session is
    /// large enough for an early close.
    fn should_close(&self, next_ts: OffsetDateTime, rng: &mut SimRng) -> Option<CloseReason> {
        let count = self.commits.len();
        if count >= self.params.max_commits as usize {
            return Some(CloseReason::MaxCommits);
        }
        if let Some(last) = self.commits.last() {
            if next_ts - last.commit_ts > self.params.inactivity_gap {
                return Some(CloseReason::InactivityGap);
            }
        }
        if count >= EARLY_CLOSE_MIN_COMMITS && rng.chance(EARLY_CLOSE_CHANCE) {
            return Some(CloseReason::EarlyClose);
        }
        None
    }
}

/// Identity of one clustering stream. Ordering fixes the processing order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct GroupKey {
    pub repo_name: String,
    pub branch_name: String,
    pub user_id: String,
}

/// Group commits by (repo, branch, author), each group sorted by timestamp.
pub fn group_commits(commits: &[Commit]) -> BTreeMap<GroupKey, Vec<Commit>> {
    let mut groups: BTreeMap<GroupKey, Vec<Commit>> = BTreeMap::new();
    for commit in commits {
        let key = GroupKey {
            repo_name: commit.repo_name.clone(),
            branch_name: commit.branch_name.clone(),
            user_id: commit.user_id.clone(),
        };
        groups.entry(key).or_default().push(commit.clone());
    }
    for group in groups.values_mut() {
        group.sort_by_key(|c| c.commit_ts);
    }
    groups
}

/// Fold one time-ordered group into sessions, handing each closed session to
/// `finalize` as soon as it closes.
///
/// `finalize` shares `rng` with the fold, so its draws interleave with the
/// session draws in close order.
pub fn cluster_commits<T>(
    commits: &[Commit],
    developer: &Developer,
    rng: &mut SimRng,
    mut finalize: impl FnMut(Session, CloseReason, &mut SimRng) -> T,
) -> Vec<T> {
    let mut out = Vec::new();
    let mut current: Option<Session> = None;

    for (i, commit) in commits.iter().enumerate() {
        let session = current.get_or_insert_with(|| {
            Session::open(SessionParams::sample(developer.seniority, rng))
        });
        session.commits.push(commit.clone());

        let reason = match commits.get(i + 1) {
            Some(next) => session.should_close(next.commit_ts, rng),
            None => Some(CloseReason::EndOfStream),
        };

        if let Some(reason) = reason {
            if let Some(done) = current.take() {
                out.push(finalize(done, reason, rng));
            }
        }
    }
    out
}
