//! Labeling session state machine
//!
//! A session is a bounded run of `task_limit` tasks:
//! OPEN(n) → OPEN(n+1) per accepted label, OPEN → COMPLETED when n reaches
//! the limit, OPEN → EXPIRED when idle past the TTL. COMPLETED and EXPIRED
//! are absorbing.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::TaskType;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Open,
    Completed,
    Expired,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Open => "open",
            SessionState::Completed => "completed",
            SessionState::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionState::Open)
    }
}

impl FromStr for SessionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(SessionState::Open),
            "completed" => Ok(SessionState::Completed),
            "expired" => Ok(SessionState::Expired),
            other => Err(format!("Unknown session state: {}", other)),
        }
    }
}

/// Outcome of scoring one label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Gold item, label matched the correct answer
    Correct,
    /// Gold item, label did not match
    Incorrect,
    /// No gold truth; awaiting consensus across labelers
    Pending,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Correct => "correct",
            Verdict::Incorrect => "incorrect",
            Verdict::Pending => "pending",
        }
    }

    /// Pending labels count as correct for streak purposes
    pub fn counts_as_correct(&self) -> bool {
        !matches!(self, Verdict::Incorrect)
    }

    pub fn is_graded(&self) -> bool {
        !matches!(self, Verdict::Pending)
    }
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "correct" => Ok(Verdict::Correct),
            "incorrect" => Ok(Verdict::Incorrect),
            "pending" => Ok(Verdict::Pending),
            other => Err(format!("Unknown verdict: {}", other)),
        }
    }
}

/// Server-owned labeling session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    pub user_id: String,
    pub dataset: String,
    pub task_type: TaskType,
    pub state: SessionState,
    pub task_limit: u32,
    /// Index into the dataset's item sequence where this session begins
    pub start_offset: u64,
    pub tasks_completed: u32,
    pub correct_count: u32,
    pub gold_answered: u32,
    pub gold_correct: u32,
    pub streak: u32,
    pub elo_delta_accum: i64,
    /// Cents
    pub earned_accum: i64,
    /// Optimistic concurrency counter, bumped on every persisted update
    pub version: i64,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(
        user_id: impl Into<String>,
        dataset: impl Into<String>,
        task_type: TaskType,
        task_limit: u32,
        start_offset: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            user_id: user_id.into(),
            dataset: dataset.into(),
            task_type,
            state: SessionState::Open,
            task_limit,
            start_offset,
            tasks_completed: 0,
            correct_count: 0,
            gold_answered: 0,
            gold_correct: 0,
            streak: 0,
            elo_delta_accum: 0,
            earned_accum: 0,
            version: 0,
            started_at: now,
            last_activity_at: now,
            ended_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Open and untouched for longer than `ttl`
    pub fn is_idle(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.state == SessionState::Open && now - self.last_activity_at > ttl
    }

    /// Position of the expected item in a dataset of `item_count` items
    pub fn expected_index(&self, item_count: usize) -> Option<usize> {
        if item_count == 0 {
            return None;
        }
        let position = self.start_offset + u64::from(self.tasks_completed);
        Some((position % item_count as u64) as usize)
    }

    /// Apply one scored label
    ///
    /// Caller must have checked the session is open. Returns true when this
    /// label closed the session.
    pub fn record(&mut self, verdict: Verdict, elo_delta: i64, reward: i64, now: DateTime<Utc>) -> bool {
        debug_assert!(!self.is_terminal(), "record() on terminal session");

        self.tasks_completed += 1;
        if verdict.counts_as_correct() {
            self.correct_count += 1;
            self.streak += 1;
        } else {
            self.streak = 0;
        }
        if verdict.is_graded() {
            self.gold_answered += 1;
            if verdict == Verdict::Correct {
                self.gold_correct += 1;
            }
        }
        self.elo_delta_accum += elo_delta;
        self.earned_accum += reward;
        self.last_activity_at = now;

        if self.tasks_completed >= self.task_limit {
            self.state = SessionState::Completed;
            self.ended_at = Some(now);
            true
        } else {
            false
        }
    }

    pub fn expire(&mut self, now: DateTime<Utc>) {
        self.state = SessionState::Expired;
        self.ended_at = Some(now);
    }
}

/// Result of `submit_label`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub is_correct: bool,
    pub verdict: Verdict,
    pub elo_delta: i64,
    pub new_streak: u32,
    /// Cents
    pub reward: i64,
    pub session_terminal: bool,
    pub tasks_completed: u32,
    pub task_limit: u32,
}

/// The item a session expects next, as shown to the labeler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskView {
    pub session_id: Uuid,
    pub dataset: String,
    pub task_type: TaskType,
    /// 1-based position within the session
    pub position: u32,
    pub task_limit: u32,
    pub item_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub categories: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(limit: u32) -> Session {
        Session::new("user-1", "muffin-vs-chihuahua", TaskType::Binary, limit, 0)
    }

    #[test]
    fn test_record_updates_streak_and_counters() {
        let mut s = session(10);
        let now = Utc::now();

        s.record(Verdict::Correct, 4, 5, now);
        s.record(Verdict::Pending, 0, 5, now);
        assert_eq!(s.streak, 2);
        assert_eq!(s.correct_count, 2);
        assert_eq!(s.gold_answered, 1);

        s.record(Verdict::Incorrect, -3, 5, now);
        assert_eq!(s.streak, 0);
        assert_eq!(s.gold_answered, 2);
        assert_eq!(s.gold_correct, 1);
        assert_eq!(s.elo_delta_accum, 1);
        assert_eq!(s.earned_accum, 15);
    }

    #[test]
    fn test_reaching_limit_completes() {
        let mut s = session(2);
        let now = Utc::now();
        assert!(!s.record(Verdict::Pending, 0, 5, now));
        assert!(s.record(Verdict::Pending, 0, 5, now));
        assert_eq!(s.state, SessionState::Completed);
        assert!(s.ended_at.is_some());
    }

    #[test]
    fn test_expected_index_wraps() {
        let mut s = Session::new("u", "d", TaskType::Binary, 10, 3);
        assert_eq!(s.expected_index(4), Some(3));
        s.record(Verdict::Pending, 0, 1, Utc::now());
        assert_eq!(s.expected_index(4), Some(0));
        assert_eq!(s.expected_index(0), None);
    }

    #[test]
    fn test_idle_detection() {
        let mut s = session(10);
        let now = Utc::now();
        s.last_activity_at = now - Duration::seconds(120);
        assert!(s.is_idle(now, Duration::seconds(60)));
        assert!(!s.is_idle(now, Duration::seconds(300)));

        s.expire(now);
        assert!(!s.is_idle(now, Duration::seconds(60)));
        assert!(s.is_terminal());
    }
}
