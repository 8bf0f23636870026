//! Review-mode bridge and end-of-session commit.
//!
//! [`ReviewBridge`] keeps a review session's in-memory pool and the persisted
//! ledger in step: each remediation removes the word from both at once.

use crate::engine::{AnswerOutcome, EngineConfig, Selection, Session, SessionMode, SessionSummary};
use crate::error::{EngineError, StoreError};
use crate::ledger::Ledger;
use crate::model::VocabItem;
use crate::progress::{load_progress, save_progress, UserProgress};
use crate::store::KeyValueStore;

/// A review session tied to one user's ledger.
pub struct ReviewBridge<'a, S> {
    ledger: &'a Ledger<S>,
    user: String,
    session: Session,
}

impl<'a, S: KeyValueStore> ReviewBridge<'a, S> {
    /// Snapshot the user's ledger into a new review session.
    pub fn start(ledger: &'a Ledger<S>, user: &str, config: EngineConfig) -> Result<Self, EngineError> {
        let pool = ledger.list(user);
        if pool.is_empty() {
            return Err(EngineError::EmptyReviewPool);
        }
        tracing::info!("reviewing {} ledger word(s) for '{user}'", pool.len());
        Ok(Self {
            ledger,
            user: user.to_string(),
            session: Session::review(pool, config),
        })
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.session = self.session.with_seed(seed);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Words still in the pool.
    pub fn remaining(&self) -> usize {
        self.session.state().review_pool.len()
    }

    pub fn select_next_word(&mut self) -> Selection {
        self.session.select_next_word()
    }

    pub fn current_options(&self) -> &[String] {
        self.session.current_options()
    }

    pub fn current_word(&self) -> Option<&VocabItem> {
        self.session.current_word()
    }

    /// Score an answer; a remediated word is also taken out of the ledger.
    pub fn submit_answer(&mut self, selected: &str) -> Result<AnswerOutcome, StoreError> {
        let word = self.session.current_word().cloned();
        let outcome = self.session.submit_answer(selected);
        if let (AnswerOutcome::Correct { remediated: true, .. }, Some(word)) = (&outcome, word) {
            self.ledger.record_remediation(&self.user, &word)?;
        }
        Ok(outcome)
    }

    /// Start the round again from a fresh ledger snapshot.
    pub fn restart(&mut self) -> Result<(), EngineError> {
        let pool = self.ledger.list(&self.user);
        if pool.is_empty() {
            return Err(EngineError::EmptyReviewPool);
        }
        self.session.restart();
        self.session.set_review_pool(pool)
    }

    /// End the session. Review sessions never add to the ledger.
    pub fn finish(self) -> SessionSummary {
        self.session.finish()
    }
}

/// Persist what a finished session leaves behind.
///
/// Normal sessions record their missed words (when `save_wrong_words`), each
/// at the level it was missed on, and save the user's progress: the level is
/// replaced, the answer totals are added to the saved ones. Review sessions
/// persist nothing here. Returns the number of misses recorded.
pub fn commit_session<S: KeyValueStore>(
    summary: &SessionSummary,
    ledger: &Ledger<S>,
    store: &dyn KeyValueStore,
    user: &str,
    save_wrong_words: bool,
) -> Result<usize, StoreError> {
    if summary.mode == SessionMode::Review {
        return Ok(0);
    }

    let mut recorded = 0;
    if save_wrong_words && ledger.policy().auto_save {
        ledger.record_misses(user, &summary.wrong_words)?;
        recorded = summary.wrong_words.len();
    }
    let saved = load_progress(store, ledger.keys(), user);
    let progress = UserProgress {
        level: summary.progress.level,
        total_answered: saved
            .total_answered
            .saturating_add(summary.progress.total_answered),
        total_correct: saved
            .total_correct
            .saturating_add(summary.progress.total_correct),
    };
    save_progress(store, ledger.keys(), user, &progress)?;
    tracing::info!(
        "committed session for '{user}': level {}, {recorded} miss(es) recorded",
        summary.progress.level
    );
    Ok(recorded)
}
