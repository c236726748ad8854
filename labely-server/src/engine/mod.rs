//! Session Accounting Engine
//!
//! Owns the session lifecycle: start (or resume) a bounded run of tasks,
//! hand out the expected item, score each label against gold truth, and
//! flush accumulated ELO, streak and earnings into the labeler's profile
//! when the run closes.
//!
//! Concurrency:
//! - one in-flight submission per session (try-lock, overlapping calls fail
//!   with a retryable conflict)
//! - the `version` column guards every session update
//! - profile flushes are serialized per user and commit in the same
//!   transaction as the session update that closed the run

use chrono::{DateTime, Duration, Utc};
use labely_common::api::LeaderboardEntry;
use labely_common::config::{LabelingConfig, RewardConfig, TomlConfig};
use labely_common::events::{EventBus, LabelyEvent};
use labely_common::models::{Label, ScoreResult, Session, TaskView, UserProfile, Verdict};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::submissions::NewSubmission;
use crate::db::{profiles, retry_on_lock, sessions, submissions};
use crate::error::{Error, Result};
use crate::registry::{Content, DatasetRegistry};
use crate::validation::RuleSet;

pub mod elo;
pub mod locks;

use locks::KeyedLocks;

/// User id recorded for direct submissions that carry none
pub const ANONYMOUS_USER: &str = "anonymous";

/// Engine tunables, taken from the `[session]`, `[rewards]` and
/// `[labeling]` config sections
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub task_limit: u32,
    pub idle_ttl: Duration,
    pub max_lock_wait_ms: u64,
    pub rewards: RewardConfig,
    pub labeling: LabelingConfig,
}

impl EngineConfig {
    pub fn from_toml(config: &TomlConfig) -> Self {
        Self {
            task_limit: config.session.task_limit,
            idle_ttl: config.session.idle_ttl(),
            max_lock_wait_ms: config.session.max_lock_wait_ms,
            rewards: config.rewards.clone(),
            labeling: config.labeling.clone(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_toml(&TomlConfig::default())
    }
}

pub struct SessionEngine {
    db: SqlitePool,
    registry: Arc<DatasetRegistry>,
    rules: RuleSet,
    config: EngineConfig,
    event_bus: EventBus,
    session_locks: KeyedLocks<Uuid>,
    user_locks: KeyedLocks<String>,
}

impl SessionEngine {
    pub fn new(
        db: SqlitePool,
        registry: Arc<DatasetRegistry>,
        config: EngineConfig,
        event_bus: EventBus,
    ) -> Self {
        Self {
            rules: RuleSet::new(&config.labeling),
            db,
            registry,
            config,
            event_bus,
            session_locks: KeyedLocks::new(),
            user_locks: KeyedLocks::new(),
        }
    }

    pub fn registry(&self) -> &DatasetRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resume the user's open session on `dataset`, or open a new one
    ///
    /// An open session that has sat idle past the TTL is expired (and
    /// flushed) first. New sessions start at the user's lifetime task count
    /// modulo the dataset size so consecutive runs walk the whole dataset.
    pub async fn start_session(
        &self,
        user_id: &str,
        dataset: &str,
        task_limit: Option<u32>,
    ) -> Result<Session> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(Error::BadRequest("user_id is required".to_string()));
        }
        let task_limit = task_limit.unwrap_or(self.config.task_limit);
        if task_limit == 0 {
            return Err(Error::BadRequest("task_limit must be at least 1".to_string()));
        }

        let dataset = self.registry.get(dataset)?;
        if dataset.items.is_empty() {
            return Err(Error::BadRequest(format!("dataset '{}' has no items", dataset.name)));
        }

        let _user_guard = self.user_locks.lock(&user_id.to_string()).await;
        let now = Utc::now();

        if let Some(existing) = sessions::find_open(&self.db, user_id, &dataset.name).await? {
            if !existing.is_idle(now, self.config.idle_ttl) {
                debug!(session_id = %existing.session_id, user_id, "Resuming open session");
                return Ok(existing);
            }

            // A submission holding the session lock means it is not idle after all
            let Some(_session_guard) = self.session_locks.try_lock(&existing.session_id) else {
                return Ok(existing);
            };
            let existing_id = existing.session_id;
            if !self.expire_locked(existing, now).await? {
                return self.get_session(existing_id).await;
            }
        }

        let profile = profiles::get_or_default(&self.db, user_id, self.config.labeling.default_elo).await?;
        if profile.elo < dataset.elo_threshold {
            return Err(Error::EloBelowThreshold {
                elo: profile.elo,
                required: dataset.elo_threshold,
            });
        }

        let start_offset = profile.total_tasks_completed % dataset.items.len() as u64;
        let session = Session::new(user_id, &dataset.name, dataset.task_type, task_limit, start_offset);

        retry_on_lock("insert session", self.config.max_lock_wait_ms, || async {
            let mut conn = self.db.acquire().await?;
            sessions::insert(&mut conn, &session).await
        })
        .await?;

        info!(
            session_id = %session.session_id,
            user_id,
            dataset = %session.dataset,
            task_limit,
            start_offset,
            "Session started"
        );

        self.event_bus.emit_lossy(LabelyEvent::SessionStarted {
            session_id: session.session_id,
            user_id: session.user_id.clone(),
            dataset: session.dataset.clone(),
            task_limit,
            timestamp: now,
        });

        Ok(session)
    }

    pub async fn get_session(&self, session_id: Uuid) -> Result<Session> {
        sessions::load(&self.db, session_id)
            .await?
            .ok_or(Error::SessionNotFound(session_id))
    }

    /// Load a session that can still accept work
    ///
    /// Expires it on the spot when idle past the TTL.
    async fn load_open(&self, session_id: Uuid, now: DateTime<Utc>) -> Result<Session> {
        let session = self.get_session(session_id).await?;
        if session.is_terminal() {
            return Err(Error::SessionTerminal(session_id));
        }
        if session.is_idle(now, self.config.idle_ttl) {
            let _user_guard = self.user_locks.lock(&session.user_id).await;
            self.expire_locked(session, now).await?;
            return Err(Error::SessionTerminal(session_id));
        }
        Ok(session)
    }

    /// The item the session expects next; never reveals the correct answer
    pub async fn next_task(&self, session_id: Uuid) -> Result<TaskView> {
        let session = self.load_open(session_id, Utc::now()).await?;
        let dataset = self.registry.get(&session.dataset)?;
        let index = session
            .expected_index(dataset.items.len())
            .ok_or_else(|| Error::Internal(format!("dataset '{}' has no items", dataset.name)))?;
        let item = &dataset.items[index];

        let (image_url, text) = match &item.content {
            Content::Image { .. } => (
                Some(format!("/dataset/getimg?name={}&id={}", dataset.name, item.id)),
                None,
            ),
            Content::Text { text } => (None, Some(text.clone())),
        };

        Ok(TaskView {
            session_id,
            dataset: dataset.name.clone(),
            task_type: dataset.task_type,
            position: session.tasks_completed + 1,
            task_limit: session.task_limit,
            item_id: item.id,
            image_url,
            text,
            categories: dataset.category_names(),
        })
    }

    /// Score one label and advance the session
    pub async fn submit_label(&self, session_id: Uuid, item_id: u64, label: Label) -> Result<ScoreResult> {
        let Some(_session_guard) = self.session_locks.try_lock(&session_id) else {
            return Err(Error::ConcurrentModification(format!(
                "another submission for session {} is in flight",
                session_id
            )));
        };

        let now = Utc::now();
        let mut session = self.load_open(session_id, now).await?;
        let dataset = self.registry.get(&session.dataset)?;

        let index = session
            .expected_index(dataset.items.len())
            .ok_or_else(|| Error::Internal(format!("dataset '{}' has no items", dataset.name)))?;
        let expected = &dataset.items[index];
        if expected.id != item_id {
            return Err(Error::OutOfSequence {
                expected: expected.id,
                submitted: item_id,
            });
        }

        self.rules.validate(&dataset, &label)?;

        let verdict = match expected.correct_answer.as_deref().and_then(|answer| label.matches_answer(answer)) {
            Some(true) => Verdict::Correct,
            Some(false) => Verdict::Incorrect,
            None => Verdict::Pending,
        };
        let elo_delta = elo::elo_delta(session_id, item_id, verdict.is_graded());
        let reward = self.config.rewards.reward_for(dataset.task_type);

        let expected_version = session.version;
        let terminal = session.record(verdict, elo_delta, reward, now);

        let _user_guard = if terminal {
            Some(self.user_locks.lock(&session.user_id).await)
        } else {
            None
        };

        let submission = NewSubmission {
            session_id: Some(session_id),
            position: Some(session.tasks_completed),
            dataset: &dataset.name,
            item_id,
            user_id: &session.user_id,
            label: &label,
            verdict,
        };
        let labeling = &self.config.labeling;

        let profile = retry_on_lock("submit label", self.config.max_lock_wait_ms, || async {
            let mut tx = self.db.begin().await?;
            submissions::insert(&mut tx, &submission, now).await?;
            if !sessions::update(&mut tx, &session, expected_version).await? {
                return Err(Error::ConcurrentModification(format!(
                    "session {} changed during submission",
                    session_id
                )));
            }
            let profile = if terminal {
                Some(profiles::flush_session(&mut tx, &session, labeling.default_elo, labeling.elo_floor).await?)
            } else {
                None
            };
            tx.commit().await?;
            Ok(profile)
        })
        .await?;

        debug!(
            session_id = %session_id,
            item_id,
            verdict = verdict.as_str(),
            elo_delta,
            streak = session.streak,
            "Label scored"
        );

        self.event_bus.emit_lossy(LabelyEvent::LabelSubmitted {
            session_id: Some(session_id),
            user_id: session.user_id.clone(),
            dataset: session.dataset.clone(),
            item_id,
            verdict,
            timestamp: now,
        });

        if let Some(profile) = profile {
            info!(
                session_id = %session_id,
                user_id = %session.user_id,
                elo_delta = session.elo_delta_accum,
                earned = session.earned_accum,
                elo = profile.elo,
                "Session completed"
            );
            self.event_bus.emit_lossy(LabelyEvent::SessionCompleted {
                session_id,
                user_id: session.user_id.clone(),
                elo_delta: session.elo_delta_accum,
                earned: session.earned_accum,
                timestamp: now,
            });
        }

        Ok(ScoreResult {
            is_correct: verdict.counts_as_correct(),
            verdict,
            elo_delta,
            new_streak: session.streak,
            reward,
            session_terminal: terminal,
            tasks_completed: session.tasks_completed,
            task_limit: session.task_limit,
        })
    }

    /// Record a label outside any session (`/dataset/setcat`,
    /// `/textdataset/setlabel`)
    ///
    /// Validated like a session label but never scored; it only feeds the
    /// item's consensus label.
    pub async fn submit_direct(
        &self,
        dataset: &str,
        item_id: u64,
        label: &str,
        user_id: Option<&str>,
    ) -> Result<()> {
        let dataset = self.registry.get(dataset)?;
        if dataset.item(item_id).is_none() {
            return Err(Error::NotFound(format!("item {} in dataset '{}'", item_id, dataset.name)));
        }

        let label = Label::choice(label);
        self.rules.validate(&dataset, &label)?;

        let user_id = user_id
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(ANONYMOUS_USER);
        let now = Utc::now();
        let submission = NewSubmission {
            session_id: None,
            position: None,
            dataset: &dataset.name,
            item_id,
            user_id,
            label: &label,
            verdict: Verdict::Pending,
        };

        retry_on_lock("direct label", self.config.max_lock_wait_ms, || async {
            let mut conn = self.db.acquire().await?;
            submissions::insert(&mut conn, &submission, now).await
        })
        .await?;

        debug!(dataset = %dataset.name, item_id, user_id, "Direct label recorded");

        self.event_bus.emit_lossy(LabelyEvent::LabelSubmitted {
            session_id: None,
            user_id: user_id.to_string(),
            dataset: dataset.name.clone(),
            item_id,
            verdict: Verdict::Pending,
            timestamp: now,
        });

        Ok(())
    }

    /// Expire every open session idle longer than the TTL at `now`
    ///
    /// Partial accumulators are flushed into the profile. Sessions with a
    /// submission in flight are left for the next pass.
    pub async fn expire_idle_sessions(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let open = sessions::list_open(&self.db).await?;
        let mut expired = Vec::new();

        for session in open.into_iter().filter(|s| s.is_idle(now, self.config.idle_ttl)) {
            let session_id = session.session_id;
            let Some(_session_guard) = self.session_locks.try_lock(&session_id) else {
                debug!(session_id = %session_id, "Submission in flight, skipping expiry");
                continue;
            };

            let _user_guard = self.user_locks.lock(&session.user_id).await;
            match self.expire_locked(session, now).await {
                Ok(true) => expired.push(session_id),
                Ok(false) => {}
                Err(e) => warn!(session_id = %session_id, error = %e, "Failed to expire session"),
            }
        }

        Ok(expired)
    }

    /// Mark an open session expired and flush it, unless it never took a label
    ///
    /// Caller holds the owner's user lock. Returns false when the stored
    /// session moved on since it was loaded.
    async fn expire_locked(&self, mut session: Session, now: DateTime<Utc>) -> Result<bool> {
        let expected_version = session.version;
        session.expire(now);
        let labeling = &self.config.labeling;

        let flushed = retry_on_lock("expire session", self.config.max_lock_wait_ms, || async {
            let mut tx = self.db.begin().await?;
            if !sessions::update(&mut tx, &session, expected_version).await? {
                return Ok(false);
            }
            // An untouched session has nothing to pay out
            if session.tasks_completed > 0 {
                profiles::flush_session(&mut tx, &session, labeling.default_elo, labeling.elo_floor)
                    .await?;
            }
            tx.commit().await?;
            Ok::<_, Error>(true)
        })
        .await?;

        if flushed {
            info!(
                session_id = %session.session_id,
                user_id = %session.user_id,
                tasks_completed = session.tasks_completed,
                "Session expired"
            );
            self.event_bus.emit_lossy(LabelyEvent::SessionExpired {
                session_id: session.session_id,
                user_id: session.user_id.clone(),
                tasks_completed: session.tasks_completed,
                timestamp: now,
            });
        }

        Ok(flushed)
    }

    /// Stored profile, or the default profile for unknown users
    pub async fn profile(&self, user_id: &str) -> Result<UserProfile> {
        profiles::get_or_default(&self.db, user_id, self.config.labeling.default_elo).await
    }

    pub async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>> {
        let ranked = profiles::leaderboard(&self.db, limit).await?;
        Ok(ranked
            .into_iter()
            .enumerate()
            .map(|(i, profile)| LeaderboardEntry {
                rank: i as u32 + 1,
                accuracy: profile.accuracy(),
                user_id: profile.user_id,
                elo: profile.elo,
                tasks_completed: profile.total_tasks_completed,
            })
            .collect())
    }
}
