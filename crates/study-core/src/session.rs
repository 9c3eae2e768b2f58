//! Per-session state and the session registry.
//!
//! A [`Session`] holds everything one client's visit accumulates: whether the
//! main action ran, and the quiz. [`QuizState`] keeps questions and answers
//! in lockstep; selections can only name generated questions and offered
//! options.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, StudyError};
use crate::quiz::{QuizItem, Verdict};

// ============================================================================
// QuizKey
// ============================================================================

/// Stable identifier of a quiz question, rendered as `quiz_{index}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QuizKey(usize);

impl QuizKey {
    /// Creates the key for the question at `index`.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Index of the question this key names.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for QuizKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "quiz_{}", self.0)
    }
}

impl FromStr for QuizKey {
    type Err = StudyError;

    /// Accepts only the canonical form, so each question has exactly one key.
    fn from_str(s: &str) -> Result<Self> {
        s.strip_prefix("quiz_")
            .and_then(|index| index.parse().ok())
            .map(Self)
            .filter(|key| key.to_string() == s)
            .ok_or_else(|| StudyError::unknown_quiz_key(s))
    }
}

impl Serialize for QuizKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for QuizKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// QuizState
// ============================================================================

/// Quiz lifecycle phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizPhase {
    /// No quiz has been generated yet.
    #[default]
    Empty,
    /// Questions exist; selections and checks are allowed.
    Generated,
}

impl fmt::Display for QuizPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty"),
            Self::Generated => write!(f, "generated"),
        }
    }
}

/// A generated question as the user sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizQuestion {
    /// Question text.
    pub text: String,
    /// Options in display order.
    pub options: Vec<String>,
}

/// Quiz questions, answers and selections of one session.
///
/// Fields are private so `questions` and `answers` can only change together.
#[derive(Debug, Clone, Default)]
pub struct QuizState {
    phase: QuizPhase,
    questions: Vec<QuizQuestion>,
    answers: Vec<String>,
    selected: BTreeMap<QuizKey, String>,
}

impl QuizState {
    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> QuizPhase {
        self.phase
    }

    /// Returns `true` once questions have been generated.
    #[must_use]
    pub const fn is_generated(&self) -> bool {
        matches!(self.phase, QuizPhase::Generated)
    }

    /// Generated questions in order.
    #[must_use]
    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    /// Correct answers, index-aligned with [`Self::questions`].
    #[must_use]
    pub fn answers(&self) -> &[String] {
        &self.answers
    }

    /// Current selections.
    #[must_use]
    pub const fn selections(&self) -> &BTreeMap<QuizKey, String> {
        &self.selected
    }

    /// Selected option for `key`, if any.
    #[must_use]
    pub fn selection(&self, key: QuizKey) -> Option<&str> {
        self.selected.get(&key).map(String::as_str)
    }

    /// Keys of all generated questions.
    pub fn keys(&self) -> impl Iterator<Item = QuizKey> + '_ {
        (0..self.questions.len()).map(QuizKey::new)
    }

    /// Stores generated questions and moves to `Generated`.
    ///
    /// All items are appended together, so a failure elsewhere can never
    /// leave a partial quiz behind.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` if the quiz was already generated,
    /// and `MalformedGenerationOutput` if `items` is empty or an answer is
    /// not among its question's options.
    pub fn populate(&mut self, items: Vec<QuizItem>) -> Result<()> {
        if self.is_generated() {
            return Err(StudyError::invalid_transition(
                QuizPhase::Generated,
                QuizPhase::Generated,
            ));
        }
        if items.is_empty() {
            return Err(StudyError::malformed_output("quiz has no questions"));
        }
        if let Some(item) = items.iter().find(|i| !i.options.contains(&i.answer)) {
            return Err(StudyError::malformed_output(format!(
                "answer '{}' is not an option of '{}'",
                item.answer, item.question
            )));
        }

        let (questions, answers) = items
            .into_iter()
            .map(|item| {
                (
                    QuizQuestion {
                        text: item.question,
                        options: item.options,
                    },
                    item.answer,
                )
            })
            .unzip();
        self.questions = questions;
        self.answers = answers;
        self.phase = QuizPhase::Generated;
        Ok(())
    }

    fn question(&self, key: QuizKey) -> Result<&QuizQuestion> {
        self.questions
            .get(key.index())
            .ok_or_else(|| StudyError::unknown_quiz_key(key))
    }

    /// Records `option` as the selection for `key`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownQuizKey` if `key` names no question, and
    /// `OptionNotOffered` if `option` is not one of its options.
    pub fn select(&mut self, key: QuizKey, option: &str) -> Result<()> {
        let question = self.question(key)?;
        if !question.options.iter().any(|o| o == option) {
            return Err(StudyError::option_not_offered(key, option));
        }
        self.selected.insert(key, option.to_string());
        Ok(())
    }

    /// Compares the selection for `key` with its correct answer.
    ///
    /// # Errors
    ///
    /// Returns `UnknownQuizKey` if `key` names no question, and
    /// `NoSelection` if nothing was selected for it.
    pub fn check(&self, key: QuizKey) -> Result<Verdict> {
        self.question(key)?;
        let selected = self
            .selection(key)
            .ok_or_else(|| StudyError::no_selection(key))?;
        let answer = self
            .answers
            .get(key.index())
            .ok_or_else(|| StudyError::unknown_quiz_key(key))?;
        Ok(Verdict::judge(selected, answer))
    }
}

// ============================================================================
// Session
// ============================================================================

/// State of one client session.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    /// Whether the main action was triggered at least once.
    pub button_clicked: bool,
    /// Quiz state.
    pub quiz: QuizState,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session last changed.
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Creates a session in its initial state.
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            button_clicked: false,
            quiz: QuizState::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Session identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the session to its initial state, keeping its id.
    pub fn reset(&mut self) {
        self.button_clicked = false;
        self.quiz = QuizState::default();
        self.touch();
    }

    /// Updates the `updated_at` timestamp to the current time.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Returns `true` if the session has not changed for at least `max_idle`
    /// as of `now`.
    #[must_use]
    pub fn is_idle(&self, now: DateTime<Utc>, max_idle: Duration) -> bool {
        now.signed_duration_since(self.updated_at)
            .to_std()
            .is_ok_and(|elapsed| elapsed >= max_idle)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SessionStore
// ============================================================================

/// Handle to one session; holding the lock serializes that session's actions.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Process-wide registry of live sessions.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
}

impl SessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates and registers a new session, returning its id.
    pub async fn create(&self) -> Uuid {
        let session = Session::new();
        let id = session.id();
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(session)));
        debug!(session = %id, "Session created");
        id
    }

    /// Looks up a session.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` if no session has this id.
    pub async fn get(&self, id: Uuid) -> Result<SessionHandle> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StudyError::session_not_found(id))
    }

    /// Removes a session.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` if no session has this id.
    pub async fn remove(&self, id: Uuid) -> Result<()> {
        self.sessions
            .write()
            .await
            .remove(&id)
            .map(|_| debug!(session = %id, "Session removed"))
            .ok_or_else(|| StudyError::session_not_found(id))
    }

    /// Drops every session that has been idle for at least `max_idle`,
    /// returning how many were dropped.
    ///
    /// A session whose lock is held is in use and always kept.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, handle| {
            let keep = !handle
                .try_lock()
                .is_ok_and(|session| session.is_idle(now, max_idle));
            if !keep {
                debug!(session = %id, "Idle session dropped");
            }
            keep
        });
        before - sessions.len()
    }

    /// Spawns a task that calls [`Self::evict_idle`] every `period` until
    /// the returned handle is aborted.
    pub fn spawn_idle_sweep(
        self: &Arc<Self>,
        max_idle: Duration,
        period: Duration,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = store.evict_idle(max_idle).await;
                if evicted > 0 {
                    let remaining = store.len().await;
                    info!(evicted, remaining, "Swept idle sessions");
                }
            }
        })
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns `true` if no session is live.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
