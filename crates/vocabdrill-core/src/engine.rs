//! Progression engine.
//!
//! A [`Session`] owns all state for one play session: which level the learner
//! is on, which word is on screen, streak counters and the words answered so
//! far. Callers drive it with [`Session::select_next_word`] and
//! [`Session::submit_answer`]; every decision comes back as a return value,
//! so the presentation layer controls pacing and never has to be called back.

use std::collections::HashSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::ledger::ReviewWord;
use crate::model::{Catalog, Direction, VocabItem};
use crate::progress::UserProgress;

/// Thresholds and bounds for level movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rules {
    /// Correct answers within one level needed to move up.
    pub correct_to_level_up: u32,
    /// Consecutive wrong answers that move the learner down.
    pub streak_to_level_down: u32,
    pub min_level: u32,
    pub max_level: u32,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            correct_to_level_up: 10,
            streak_to_level_down: 3,
            min_level: 0,
            max_level: 10,
        }
    }
}

impl Rules {
    pub fn clamp(&self, level: u32) -> u32 {
        level.clamp(self.min_level, self.max_level.max(self.min_level))
    }

    pub fn contains(&self, level: u32) -> bool {
        (self.min_level..=self.max_level).contains(&level)
    }

    /// Narrow the level bounds to the levels a catalog actually has.
    pub fn restricted_to(mut self, catalog: &Catalog) -> Self {
        if let Some(range) = catalog.level_range() {
            self.min_level = self.min_level.max(*range.start());
            self.max_level = self.max_level.min(*range.end()).max(self.min_level);
        }
        self
    }
}

/// Read-only configuration handed to each session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub rules: Rules,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Draw from the catalog, level by level.
    Normal,
    /// Draw only from the learner's wrong-word ledger.
    Review,
}

/// Everything a session tracks. Read through [`Session::state`].
#[derive(Debug, Clone)]
pub struct SessionState {
    pub mode: SessionMode,
    pub current_level: u32,
    pub current_word: Option<VocabItem>,
    /// A word is on screen and has not been answered yet.
    pub awaiting_answer: bool,
    pub correct_streak: u32,
    pub wrong_streak: u32,
    pub level_correct_count: u32,
    pub total_answered: u64,
    pub total_correct: u64,
    /// Missed words, in order, candidates for the ledger at session end.
    pub session_wrong_words: Vec<MissedWord>,
    /// Ids answered correctly; excluded from normal-mode selection.
    pub session_correct_words: HashSet<String>,
    /// Remaining ledger words, review mode only.
    pub review_pool: Vec<ReviewWord>,
}

impl SessionState {
    fn new(mode: SessionMode, level: u32) -> Self {
        Self {
            mode,
            current_level: level,
            current_word: None,
            awaiting_answer: false,
            correct_streak: 0,
            wrong_streak: 0,
            level_correct_count: 0,
            total_answered: 0,
            total_correct: 0,
            session_wrong_words: Vec::new(),
            session_correct_words: HashSet::new(),
            review_pool: Vec::new(),
        }
    }
}

/// Result of asking for the next question.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// A word to show. `cleared_levels` lists levels that ran out of words
    /// and were advanced past while looking for it.
    Word {
        word: VocabItem,
        cleared_levels: Vec<u32>,
    },
    /// Every word up to the top level has been answered correctly.
    CatalogComplete,
    /// The review pool is empty.
    ReviewExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelTransition {
    Up { from: u32, to: u32 },
    Down { from: u32, to: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    /// No word was awaiting an answer; nothing changed.
    Ignored,
    Correct {
        transition: Option<LevelTransition>,
        /// The word left the review pool.
        remediated: bool,
    },
    Incorrect {
        correct_answer: String,
        transition: Option<LevelTransition>,
    },
}

impl AnswerOutcome {
    pub fn is_correct(&self) -> bool {
        matches!(self, AnswerOutcome::Correct { .. })
    }

    pub fn transition(&self) -> Option<LevelTransition> {
        match self {
            AnswerOutcome::Correct { transition, .. }
            | AnswerOutcome::Incorrect { transition, .. } => *transition,
            AnswerOutcome::Ignored => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub answered: u64,
    pub correct: u64,
    pub wrong: u64,
}

/// A word answered wrongly, with the level it was asked at.
#[derive(Debug, Clone, PartialEq)]
pub struct MissedWord {
    pub word: VocabItem,
    pub level: u32,
}

/// What a finished session leaves behind for persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub mode: SessionMode,
    pub progress: UserProgress,
    pub wrong_words: Vec<MissedWord>,
}

/// Build the shuffled option list for a word.
///
/// Returns an empty list when the word has no answer for `direction`; that
/// is a data gap the caller should skip past.
pub fn build_options(word: &VocabItem, direction: Direction, rng: &mut impl Rng) -> Vec<String> {
    let Some(answer) = direction.answer(word) else {
        tracing::warn!(word = %word.id, "no answer for direction {direction}, skipping options");
        return Vec::new();
    };

    let mut options = vec![answer.to_string()];
    for distractor in direction.distractors(word) {
        if !distractor.is_empty() && !options.contains(distractor) {
            options.push(distractor.clone());
        }
    }

    for i in (1..options.len()).rev() {
        let j = rng.gen_range(0..=i);
        options.swap(i, j);
    }
    options
}

/// One play session.
pub struct Session {
    catalog: Option<Arc<Catalog>>,
    config: EngineConfig,
    state: SessionState,
    options: Vec<String>,
    rng: StdRng,
}

impl Session {
    /// Start a catalog session at `start_level`, clamped to the rules.
    pub fn normal(catalog: Arc<Catalog>, config: EngineConfig, start_level: u32) -> Self {
        let level = config.rules.clamp(start_level);
        tracing::debug!(level, direction = %config.direction, "starting normal session");
        Self {
            catalog: Some(catalog),
            config,
            state: SessionState::new(SessionMode::Normal, level),
            options: Vec::new(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Start a review session over a snapshot of ledger words.
    ///
    /// Ledger words carry no definitions, so definition mode falls back to
    /// source-to-target.
    pub fn review(pool: Vec<ReviewWord>, mut config: EngineConfig) -> Self {
        if config.direction.requires_definition() {
            tracing::warn!("review words have no definitions, using en-zh instead");
            config.direction = Direction::SourceToTarget;
        }
        tracing::debug!(pool = pool.len(), "starting review session");
        let mut state = SessionState::new(SessionMode::Review, config.rules.min_level);
        state.review_pool = pool;
        Self {
            catalog: None,
            config,
            state,
            options: Vec::new(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Use a fixed seed for selection and shuffling.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn mode(&self) -> SessionMode {
        self.state.mode
    }

    pub fn current_word(&self) -> Option<&VocabItem> {
        self.state.current_word.as_ref()
    }

    /// Options for the word on screen, in display order.
    pub fn current_options(&self) -> &[String] {
        &self.options
    }

    /// Pick the next question.
    ///
    /// While the current word is still awaiting an answer this returns that
    /// same word again.
    pub fn select_next_word(&mut self) -> Selection {
        if self.state.awaiting_answer {
            if let Some(word) = &self.state.current_word {
                return Selection::Word {
                    word: word.clone(),
                    cleared_levels: Vec::new(),
                };
            }
        }

        let (word, cleared_levels) = match self.state.mode {
            SessionMode::Review => match self.draw_review_word() {
                Some(word) => (word, Vec::new()),
                None => {
                    self.state.current_word = None;
                    return Selection::ReviewExhausted;
                }
            },
            SessionMode::Normal => match self.draw_catalog_word() {
                Some(found) => found,
                None => {
                    self.state.current_word = None;
                    tracing::info!("catalog complete at level {}", self.state.current_level);
                    return Selection::CatalogComplete;
                }
            },
        };

        self.options = build_options(&word, self.config.direction, &mut self.rng);
        tracing::debug!(word = %word.id, level = self.state.current_level, "selected word");
        self.state.current_word = Some(word.clone());
        self.state.awaiting_answer = true;
        Selection::Word {
            word,
            cleared_levels,
        }
    }

    /// Uniform draw with replacement; entries only leave on a correct answer.
    fn draw_review_word(&mut self) -> Option<VocabItem> {
        if self.state.review_pool.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..self.state.review_pool.len());
        Some(self.state.review_pool[index].item.clone())
    }

    fn draw_catalog_word(&mut self) -> Option<(VocabItem, Vec<u32>)> {
        let catalog = Arc::clone(self.catalog.as_ref()?);
        let needs_definition = self.config.direction.requires_definition();
        let mut cleared = Vec::new();

        loop {
            let level = self.state.current_level;
            let available: Vec<&VocabItem> = catalog
                .words_at(level)
                .iter()
                .filter(|w| !self.state.session_correct_words.contains(&w.id))
                .filter(|w| !needs_definition || w.definition.is_some())
                .collect();

            if !available.is_empty() {
                let index = self.rng.gen_range(0..available.len());
                return Some((available[index].clone(), cleared));
            }

            if level >= self.config.rules.max_level {
                return None;
            }
            tracing::info!("level {level} exhausted, advancing to {}", level + 1);
            cleared.push(level);
            self.state.current_level = level + 1;
            self.state.correct_streak = 0;
            self.state.level_correct_count = 0;
        }
    }

    /// Score an answer for the word on screen.
    ///
    /// Only the first submission per word counts; later ones are `Ignored`.
    pub fn submit_answer(&mut self, selected: &str) -> AnswerOutcome {
        if !self.state.awaiting_answer {
            return AnswerOutcome::Ignored;
        }
        let Some(word) = self.state.current_word.clone() else {
            return AnswerOutcome::Ignored;
        };
        self.state.awaiting_answer = false;

        let correct_answer = self
            .config
            .direction
            .answer(&word)
            .unwrap_or_default()
            .to_string();
        let is_correct = !correct_answer.is_empty() && selected == correct_answer;
        self.state.total_answered += 1;

        if is_correct {
            self.state.total_correct += 1;
            self.state.session_correct_words.insert(word.id.clone());
            match self.state.mode {
                SessionMode::Review => {
                    self.state.review_pool.retain(|w| w.item.id != word.id);
                    tracing::debug!(word = %word.id, remaining = self.state.review_pool.len(), "remediated");
                    AnswerOutcome::Correct {
                        transition: None,
                        remediated: true,
                    }
                }
                SessionMode::Normal => {
                    self.state.correct_streak += 1;
                    self.state.wrong_streak = 0;
                    self.state.level_correct_count += 1;
                    AnswerOutcome::Correct {
                        transition: self.maybe_level_up(),
                        remediated: false,
                    }
                }
            }
        } else {
            let transition = match self.state.mode {
                SessionMode::Review => None,
                SessionMode::Normal => {
                    self.state.session_wrong_words.push(MissedWord {
                        word: word.clone(),
                        level: self.state.current_level,
                    });
                    self.state.wrong_streak += 1;
                    self.state.correct_streak = 0;
                    self.maybe_level_down()
                }
            };
            tracing::debug!(word = %word.id, "incorrect answer '{selected}'");
            AnswerOutcome::Incorrect {
                correct_answer,
                transition,
            }
        }
    }

    fn maybe_level_up(&mut self) -> Option<LevelTransition> {
        let rules = &self.config.rules;
        let from = self.state.current_level;
        if self.state.level_correct_count < rules.correct_to_level_up || from >= rules.max_level {
            return None;
        }
        self.state.current_level = from + 1;
        self.state.level_correct_count = 0;
        self.state.correct_streak = 0;
        tracing::info!("level up: {from} -> {}", from + 1);
        Some(LevelTransition::Up { from, to: from + 1 })
    }

    fn maybe_level_down(&mut self) -> Option<LevelTransition> {
        let rules = &self.config.rules;
        let from = self.state.current_level;
        if self.state.wrong_streak < rules.streak_to_level_down || from <= rules.min_level {
            return None;
        }
        self.state.current_level = from - 1;
        self.state.wrong_streak = 0;
        self.state.level_correct_count = 0;
        tracing::info!("level down: {from} -> {}", from - 1);
        Some(LevelTransition::Down { from, to: from - 1 })
    }

    /// Jump to a level by hand. Clears streaks and the exclusion set.
    pub fn change_level(&mut self, level: u32) -> Result<(), EngineError> {
        if self.state.mode == SessionMode::Review {
            return Err(EngineError::ReviewMode);
        }
        let rules = &self.config.rules;
        if !rules.contains(level) {
            return Err(EngineError::LevelOutOfRange {
                level,
                min: rules.min_level,
                max: rules.max_level,
            });
        }
        self.state.current_level = level;
        self.state.correct_streak = 0;
        self.state.wrong_streak = 0;
        self.state.level_correct_count = 0;
        self.state.session_correct_words.clear();
        self.clear_current();
        Ok(())
    }

    /// Reset counters and exclusions, keeping the level.
    pub fn restart(&mut self) {
        let level = self.state.current_level;
        let pool = std::mem::take(&mut self.state.review_pool);
        self.state = SessionState::new(self.state.mode, level);
        self.state.review_pool = pool;
        self.options.clear();
    }

    /// Replace the review pool, e.g. with a fresh ledger snapshot on restart.
    pub fn set_review_pool(&mut self, pool: Vec<ReviewWord>) -> Result<(), EngineError> {
        if self.state.mode != SessionMode::Review {
            return Err(EngineError::ReviewMode);
        }
        self.state.review_pool = pool;
        self.clear_current();
        Ok(())
    }

    /// Start over from the lowest level, typically after the catalog is complete.
    pub fn restart_from_level_zero(&mut self) {
        self.restart();
        self.state.current_level = self.config.rules.min_level;
    }

    fn clear_current(&mut self) {
        self.state.current_word = None;
        self.state.awaiting_answer = false;
        self.options.clear();
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            answered: self.state.total_answered,
            correct: self.state.total_correct,
            wrong: self.state.total_answered - self.state.total_correct,
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            mode: self.state.mode,
            progress: UserProgress {
                level: self.state.current_level,
                total_answered: self.state.total_answered,
                total_correct: self.state.total_correct,
            },
            wrong_words: self.state.session_wrong_words.clone(),
        }
    }

    pub fn finish(self) -> SessionSummary {
        SessionSummary {
            mode: self.state.mode,
            progress: UserProgress {
                level: self.state.current_level,
                total_answered: self.state.total_answered,
                total_correct: self.state.total_correct,
            },
            wrong_words: self.state.session_wrong_words,
        }
    }
}
