//! Labeler profile and standings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Session;

/// Accumulated labeler stats, mutated only when a session is flushed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub elo: i64,
    pub total_tasks_completed: u64,
    pub current_streak: u32,
    pub best_streak: u32,
    pub gold_answered: u64,
    pub gold_correct: u64,
    /// Cents
    pub wallet_balance: i64,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>, default_elo: i64) -> Self {
        Self {
            user_id: user_id.into(),
            elo: default_elo,
            total_tasks_completed: 0,
            current_streak: 0,
            best_streak: 0,
            gold_answered: 0,
            gold_correct: 0,
            wallet_balance: 0,
            updated_at: Utc::now(),
        }
    }

    /// Gold-standard accuracy in percent; `None` before any gold answer
    pub fn accuracy(&self) -> Option<f64> {
        if self.gold_answered == 0 {
            None
        } else {
            Some(self.gold_correct as f64 / self.gold_answered as f64 * 100.0)
        }
    }

    /// Fold a closed session's accumulators into the profile
    pub fn apply_session(&mut self, session: &Session, elo_floor: i64) {
        self.elo = (self.elo + session.elo_delta_accum).max(elo_floor);
        self.total_tasks_completed += u64::from(session.tasks_completed);
        self.current_streak = session.streak;
        self.best_streak = self.best_streak.max(session.streak);
        self.gold_answered += u64::from(session.gold_answered);
        self.gold_correct += u64::from(session.gold_correct);
        self.wallet_balance += session.earned_accum;
        self.updated_at = session.ended_at.unwrap_or_else(Utc::now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TaskType, Verdict};

    #[test]
    fn test_apply_session_clamps_to_floor() {
        let mut profile = UserProfile::new("u", 105);
        let mut session = Session::new("u", "d", TaskType::Binary, 2, 0);
        session.record(Verdict::Incorrect, -10, 5, Utc::now());
        session.record(Verdict::Correct, 2, 5, Utc::now());

        profile.apply_session(&session, 100);

        assert_eq!(profile.elo, 100);
        assert_eq!(profile.total_tasks_completed, 2);
        assert_eq!(profile.current_streak, 1);
        assert_eq!(profile.wallet_balance, 10);
        assert_eq!(profile.accuracy(), Some(50.0));
    }

    #[test]
    fn test_accuracy_absent_without_gold() {
        let profile = UserProfile::new("u", 1500);
        assert_eq!(profile.accuracy(), None);
    }
}
