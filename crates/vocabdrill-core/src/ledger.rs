//! Wrong-word ledger.
//!
//! A durable, per-user record of missed words with error/success counters.
//! Each user's ledger is a single versioned JSON document per catalog:
//!
//! ```text
//! { "version": "2.0", "lastUpdated": "...", "words": [ LedgerEntry, ... ] }
//! ```
//!
//! Reads never fail because of what is stored: an unparseable document is
//! logged and treated as empty, and the next write replaces it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::engine::MissedWord;
use crate::error::StoreError;
use crate::model::{Distractors, VocabItem};
use crate::store::{KeyValueStore, StorageKeys};

/// Version tag written into every ledger document.
pub const LEDGER_VERSION: &str = "2.0";
/// Largest batch `import_batch` accepts.
pub const MAX_IMPORT_ENTRIES: usize = 10_000;

const MAX_TERM_CHARS: usize = 200;
const MAX_ICON_CHARS: usize = 10;
const MAX_EXAMPLE_CHARS: usize = 500;
const MAX_NOTE_CHARS: usize = 500;
const MAX_TAGS: usize = 10;
const MAX_TAG_CHARS: usize = 50;
const MAX_DISTRACTORS: usize = 10;

/// The persisted ledger document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerDocument {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub words: Vec<LedgerEntry>,
}

fn default_version() -> String {
    LEDGER_VERSION.to_string()
}

impl LedgerDocument {
    pub fn empty() -> Self {
        Self {
            version: default_version(),
            last_updated: Utc::now(),
            words: Vec::new(),
        }
    }

    /// Index of the entry for a word: by id first, then by primary term.
    fn position(&self, word_id: &str, source: &str) -> Option<usize> {
        self.words
            .iter()
            .position(|e| e.word_id == word_id)
            .or_else(|| self.words.iter().position(|e| e.word.source == source))
    }
}

/// One missed word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub word_id: String,
    /// Display fields captured at the first miss, so the entry outlives
    /// catalog changes.
    pub word: WordSnapshot,
    pub stats: WordStats,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub note: String,
    #[serde(default = "Utc::now")]
    pub added_time: DateTime<Utc>,
    /// Level the word was missed at.
    #[serde(default)]
    pub level: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordSnapshot {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub wrong_options: Distractors,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub example: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordStats {
    #[serde(default)]
    pub error_count: u32,
    #[serde(default)]
    pub correct_count: u32,
    #[serde(default)]
    pub last_error_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_correct_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_practice_time: Option<DateTime<Utc>>,
}

impl LedgerEntry {
    fn first_miss(word: &VocabItem, level: u32, now: DateTime<Utc>) -> Self {
        Self {
            word_id: word.id.clone(),
            word: WordSnapshot {
                source: word.source.clone(),
                target: word.target.clone(),
                wrong_options: word.distractors.clone(),
                icon: word.icon.clone(),
                example: word.example.clone(),
            },
            stats: WordStats {
                error_count: 1,
                correct_count: 0,
                last_error_time: Some(now),
                last_correct_time: None,
                last_practice_time: Some(now),
            },
            tags: Vec::new(),
            note: String::new(),
            added_time: now,
            level,
        }
    }

    /// The word-shaped view the review session draws from.
    pub fn to_review_word(&self) -> ReviewWord {
        let mut item = VocabItem::new(&self.word_id, &self.word.source, &self.word.target);
        item.distractors = self.word.wrong_options.clone();
        item.icon = self.word.icon.clone();
        item.example = self.word.example.clone();
        ReviewWord {
            item,
            level: self.level,
            stats: self.stats.clone(),
        }
    }
}

/// A ledger entry as a playable word.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewWord {
    pub item: VocabItem,
    pub level: u32,
    pub stats: WordStats,
}

/// Ledger switches; deletion and stat tracking are independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerPolicy {
    /// Record misses at all.
    pub auto_save: bool,
    /// Drop an entry once it is answered correctly in review.
    pub remove_on_correct: bool,
    /// Count correct answers and timestamps.
    pub track_stats: bool,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            auto_save: true,
            remove_on_correct: true,
            track_stats: true,
        }
    }
}

/// What `record_remediation` did.
#[derive(Debug, Clone, PartialEq)]
pub enum Remediation {
    /// No entry for that word.
    Absent,
    /// The entry was deleted; carries its final state.
    Removed(LedgerEntry),
    /// Stats were updated and the entry kept.
    Updated(LedgerEntry),
    /// Both switches are off; nothing changed.
    Unchanged,
}

/// Hook called with an entry's final state right before it is deleted.
pub trait LedgerObserver: Send + Sync {
    fn before_remove(&self, user: &str, entry: &LedgerEntry);
}

/// Outcome of `import_batch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub success: bool,
    pub message: String,
    pub imported_count: usize,
    pub supplied_count: usize,
}

impl ImportReport {
    fn rejected(message: impl Into<String>, supplied_count: usize) -> Self {
        Self {
            success: false,
            message: message.into(),
            imported_count: 0,
            supplied_count,
        }
    }
}

/// The wrong-word ledger over some key-value store.
pub struct Ledger<S> {
    store: S,
    keys: StorageKeys,
    catalog_id: String,
    policy: LedgerPolicy,
    observer: Option<Arc<dyn LedgerObserver>>,
}

impl<S: KeyValueStore> Ledger<S> {
    pub fn new(store: S, catalog_id: impl Into<String>) -> Self {
        Self {
            store,
            keys: StorageKeys::default(),
            catalog_id: catalog_id.into(),
            policy: LedgerPolicy::default(),
            observer: None,
        }
    }

    pub fn with_policy(mut self, policy: LedgerPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_keys(mut self, keys: StorageKeys) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn LedgerObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn policy(&self) -> LedgerPolicy {
        self.policy
    }

    pub fn catalog_id(&self) -> &str {
        &self.catalog_id
    }

    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn key(&self, user: &str) -> String {
        self.keys.ledger(user, &self.catalog_id)
    }

    /// Load a user's document. Never fails: anything unreadable is empty.
    pub fn load(&self, user: &str) -> LedgerDocument {
        let raw = match self.store.get(&self.key(user)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return LedgerDocument::empty(),
            Err(e) => {
                tracing::warn!("failed to read ledger for '{user}': {e}");
                return LedgerDocument::empty();
            }
        };

        let value: Value = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("ledger for '{user}' is not valid JSON, treating as empty: {e}");
                return LedgerDocument::empty();
            }
        };

        if let Value::Array(legacy) = value {
            let doc = migrate_legacy(&legacy);
            tracing::info!(
                "migrated {} legacy ledger entries for '{user}'",
                doc.words.len()
            );
            if let Err(e) = self.save(user, doc.clone()) {
                tracing::warn!("failed to write migrated ledger for '{user}': {e}");
            }
            return doc;
        }

        serde_json::from_value(value).unwrap_or_else(|e| {
            tracing::warn!("ledger for '{user}' has an unexpected shape, treating as empty: {e}");
            LedgerDocument::empty()
        })
    }

    fn save(&self, user: &str, mut doc: LedgerDocument) -> Result<(), StoreError> {
        doc.last_updated = Utc::now();
        let json = serde_json::to_string(&doc)?;
        self.store.set(&self.key(user), &json)
    }

    /// Record a miss: bump the existing entry or create one with `errorCount = 1`.
    pub fn record_miss(&self, user: &str, word: &VocabItem, level: u32) -> Result<(), StoreError> {
        let miss = MissedWord {
            word: word.clone(),
            level,
        };
        self.record_misses(user, std::slice::from_ref(&miss))
    }

    /// Record several misses with a single write. A new entry keeps the
    /// level its miss happened at.
    pub fn record_misses(&self, user: &str, misses: &[MissedWord]) -> Result<(), StoreError> {
        if !self.policy.auto_save || misses.is_empty() {
            return Ok(());
        }

        let mut doc = self.load(user);
        let now = Utc::now();
        for MissedWord { word, level } in misses {
            match doc.position(&word.id, &word.source) {
                Some(i) => {
                    let stats = &mut doc.words[i].stats;
                    stats.error_count = stats.error_count.saturating_add(1);
                    stats.last_error_time = Some(now);
                    stats.last_practice_time = Some(now);
                }
                None => doc.words.push(LedgerEntry::first_miss(word, *level, now)),
            }
        }
        tracing::debug!("recorded {} miss(es) for '{user}'", misses.len());
        self.save(user, doc)
    }

    /// Record that a ledger word was answered correctly in review.
    ///
    /// Stats tracking and removal are applied independently according to the
    /// policy. Calling this for a word with no entry does nothing.
    pub fn record_remediation(
        &self,
        user: &str,
        word: &VocabItem,
    ) -> Result<Remediation, StoreError> {
        let mut doc = self.load(user);
        let Some(index) = doc.position(&word.id, &word.source) else {
            return Ok(Remediation::Absent);
        };
        if !self.policy.track_stats && !self.policy.remove_on_correct {
            return Ok(Remediation::Unchanged);
        }

        if self.policy.track_stats {
            let now = Utc::now();
            let stats = &mut doc.words[index].stats;
            stats.correct_count = stats.correct_count.saturating_add(1);
            stats.last_correct_time = Some(now);
            stats.last_practice_time = Some(now);
        }

        let outcome = if self.policy.remove_on_correct {
            let entry = doc.words.remove(index);
            if let Some(observer) = &self.observer {
                observer.before_remove(user, &entry);
            }
            tracing::info!("removed '{}' from {user}'s ledger", entry.word.source);
            Remediation::Removed(entry)
        } else {
            Remediation::Updated(doc.words[index].clone())
        };

        self.save(user, doc)?;
        Ok(outcome)
    }

    /// Update counters for a ledger word without removing it.
    pub fn update_stats(
        &self,
        user: &str,
        word: &VocabItem,
        correct: bool,
    ) -> Result<bool, StoreError> {
        if !self.policy.track_stats {
            return Ok(false);
        }
        let mut doc = self.load(user);
        let Some(index) = doc.position(&word.id, &word.source) else {
            return Ok(false);
        };

        let now = Utc::now();
        let stats = &mut doc.words[index].stats;
        if correct {
            stats.correct_count = stats.correct_count.saturating_add(1);
            stats.last_correct_time = Some(now);
        } else {
            stats.error_count = stats.error_count.saturating_add(1);
            stats.last_error_time = Some(now);
        }
        stats.last_practice_time = Some(now);
        self.save(user, doc)?;
        Ok(true)
    }

    /// Delete one entry by id regardless of policy. Returns whether it existed.
    pub fn remove(&self, user: &str, word_id: &str) -> Result<bool, StoreError> {
        let mut doc = self.load(user);
        let before = doc.words.len();
        doc.words.retain(|e| e.word_id != word_id);
        if doc.words.len() == before {
            return Ok(false);
        }
        self.save(user, doc)?;
        Ok(true)
    }

    /// All entries as playable words.
    pub fn list(&self, user: &str) -> Vec<ReviewWord> {
        self.load(user)
            .words
            .iter()
            .map(LedgerEntry::to_review_word)
            .collect()
    }

    /// All entries with their full bookkeeping.
    pub fn entries(&self, user: &str) -> Vec<LedgerEntry> {
        self.load(user).words
    }

    pub fn count(&self, user: &str) -> usize {
        self.load(user).words.len()
    }

    pub fn clear(&self, user: &str) -> Result<(), StoreError> {
        self.store.remove(&self.key(user))
    }

    /// Pretty-printed ledger document, suitable for `import_batch`.
    pub fn export(&self, user: &str) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(&self.load(user))?)
    }

    /// Replace a user's ledger with the valid entries of an exported document.
    ///
    /// The whole batch is rejected when the outer shape is wrong or it is too
    /// large; otherwise invalid entries are dropped one by one and the rest
    /// are committed.
    pub fn import_batch(&self, user: &str, raw: &str) -> ImportReport {
        let value: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => return ImportReport::rejected(format!("failed to parse JSON: {e}"), 0),
        };
        self.import_value(user, &value)
    }

    /// Same as `import_batch`, for an already-parsed document.
    pub fn import_value(&self, user: &str, value: &Value) -> ImportReport {
        let Some(object) = value.as_object() else {
            return ImportReport::rejected("invalid document: expected a JSON object", 0);
        };
        let Some(words) = object.get("words").and_then(Value::as_array) else {
            return ImportReport::rejected("invalid document: missing words array", 0);
        };
        let supplied = words.len();
        if supplied > MAX_IMPORT_ENTRIES {
            return ImportReport::rejected(
                format!("too many entries: {supplied} (max {MAX_IMPORT_ENTRIES})"),
                supplied,
            );
        }

        let now = Utc::now();
        let mut doc = LedgerDocument {
            version: default_version(),
            last_updated: now,
            words: Vec::new(),
        };
        let mut duplicates = 0;
        for entry in words.iter().filter_map(|item| sanitize_entry(item, now)) {
            // One entry per word: later copies of an id or term are dropped.
            if doc.position(&entry.word_id, &entry.word.source).is_some() {
                duplicates += 1;
                continue;
            }
            doc.words.push(entry);
        }

        if doc.words.is_empty() {
            return ImportReport::rejected("no valid entries to import", supplied);
        }

        let imported = doc.words.len();
        if let Err(e) = self.save(user, doc) {
            tracing::error!("failed to write imported ledger for '{user}': {e}");
            return ImportReport::rejected(format!("failed to save ledger: {e}"), supplied);
        }

        tracing::info!("imported {imported} of {supplied} ledger entries for '{user}'");
        let mut message = format!("imported {imported} of {supplied} entries");
        if duplicates > 0 {
            message.push_str(&format!(" ({duplicates} duplicate(s) dropped)"));
        }
        ImportReport {
            success: true,
            message,
            imported_count: imported,
            supplied_count: supplied,
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn non_empty_str<'a>(value: Option<&'a Value>) -> Option<&'a str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Anything number-like becomes a non-negative count, everything else 0.
fn coerce_count(value: Option<&Value>) -> u32 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|n| n.is_finite() && *n > 0.0)
        .map(|n| n.trunc().min(u32::MAX as f64) as u32)
        .unwrap_or(0)
}

fn coerce_time(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn sanitize_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .take(MAX_DISTRACTORS)
                .map(|s| truncate_chars(s, MAX_TERM_CHARS))
                .collect()
        })
        .unwrap_or_default()
}

fn sanitize_distractors(value: Option<&Value>) -> Distractors {
    match value {
        Some(Value::Array(_)) => Distractors {
            target: sanitize_list(value),
            source: Vec::new(),
        },
        Some(Value::Object(map)) => Distractors {
            target: sanitize_list(map.get("target")),
            source: sanitize_list(map.get("source")),
        },
        _ => Distractors::default(),
    }
}

/// Validate one imported entry and bound every field.
fn sanitize_entry(item: &Value, now: DateTime<Utc>) -> Option<LedgerEntry> {
    let word = item.get("word")?.as_object()?;
    let source = non_empty_str(word.get("source"))?;
    let target = non_empty_str(word.get("target"))?;

    let word_id = match item.get("wordId") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => format!("imported-{}", Uuid::new_v4()),
    };

    let stats = item.get("stats");
    let stat = |name: &str| stats.and_then(|s| s.get(name));

    Some(LedgerEntry {
        word_id: truncate_chars(&word_id, MAX_TERM_CHARS),
        word: WordSnapshot {
            source: truncate_chars(source, MAX_TERM_CHARS),
            target: truncate_chars(target, MAX_TERM_CHARS),
            wrong_options: sanitize_distractors(word.get("wrongOptions")),
            icon: non_empty_str(word.get("icon")).map(|s| truncate_chars(s, MAX_ICON_CHARS)),
            example: non_empty_str(word.get("example"))
                .map(|s| truncate_chars(s, MAX_EXAMPLE_CHARS)),
        },
        stats: WordStats {
            error_count: coerce_count(stat("errorCount")),
            correct_count: coerce_count(stat("correctCount")),
            last_error_time: coerce_time(stat("lastErrorTime")),
            last_correct_time: coerce_time(stat("lastCorrectTime")),
            last_practice_time: coerce_time(stat("lastPracticeTime")),
        },
        tags: item
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .take(MAX_TAGS)
                    .map(|t| truncate_chars(&value_to_text(t), MAX_TAG_CHARS))
                    .collect()
            })
            .unwrap_or_default(),
        note: item
            .get("note")
            .filter(|n| !n.is_null())
            .map(|n| truncate_chars(&value_to_text(n), MAX_NOTE_CHARS))
            .unwrap_or_default(),
        added_time: coerce_time(item.get("addedTime")).unwrap_or(now),
        level: coerce_count(item.get("level")),
    })
}

/// Convert the pre-versioned format (a bare array of words) to a document.
fn migrate_legacy(items: &[Value]) -> LedgerDocument {
    let now = Utc::now();
    let words = items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let source = non_empty_str(item.get("english").or_else(|| item.get("source")))?;
            let target = non_empty_str(item.get("chinese").or_else(|| item.get("target")))?;
            Some(LedgerEntry {
                word_id: format!("migrated-{index}"),
                word: WordSnapshot {
                    source: source.to_string(),
                    target: target.to_string(),
                    wrong_options: sanitize_distractors(item.get("wrongOptions")),
                    icon: non_empty_str(item.get("icon")).map(str::to_string),
                    example: None,
                },
                stats: WordStats {
                    error_count: 1,
                    correct_count: 0,
                    last_error_time: Some(now),
                    last_correct_time: None,
                    last_practice_time: Some(now),
                },
                tags: Vec::new(),
                note: String::new(),
                added_time: now,
                level: coerce_count(item.get("level")),
            })
        })
        .collect();

    LedgerDocument {
        version: default_version(),
        last_updated: now,
        words,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Mutex;

    fn word(id: &str, source: &str, target: &str) -> VocabItem {
        let mut w = VocabItem::new(id, source, target);
        w.distractors.target = vec!["x".into(), "y".into()];
        w
    }

    fn ledger() -> Ledger<MemoryStore> {
        Ledger::new(MemoryStore::new(), "en-zh")
    }

    #[derive(Default)]
    struct Spy {
        seen: Mutex<Vec<LedgerEntry>>,
    }

    impl LedgerObserver for Spy {
        fn before_remove(&self, _user: &str, entry: &LedgerEntry) {
            self.seen.lock().unwrap().push(entry.clone());
        }
    }

    #[test]
    fn first_miss_creates_entry_repeat_miss_bumps_it() {
        let ledger = ledger();
        let cat = word("c", "cat", "猫");
        ledger.record_miss("amy", &cat, 2).unwrap();
        ledger.record_miss("amy", &cat, 5).unwrap();

        let entries = ledger.entries("amy");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].stats.error_count, 2);
        assert_eq!(entries[0].level, 2);
        assert_eq!(entries[0].word.wrong_options.target, vec!["x", "y"]);
        assert!(entries[0].stats.last_error_time.is_some());
    }

    #[test]
    fn miss_matches_by_source_when_id_differs() {
        let ledger = ledger();
        ledger.record_miss("amy", &word("c", "cat", "猫"), 0).unwrap();
        ledger
            .record_miss("amy", &word("other-id", "cat", "猫"), 0)
            .unwrap();
        assert_eq!(ledger.count("amy"), 1);
    }

    #[test]
    fn auto_save_off_records_nothing() {
        let ledger = ledger().with_policy(LedgerPolicy {
            auto_save: false,
            ..Default::default()
        });
        ledger.record_miss("amy", &word("c", "cat", "猫"), 0).unwrap();
        assert_eq!(ledger.count("amy"), 0);
    }

    #[test]
    fn ledgers_are_per_user_and_per_catalog() {
        let store = Arc::new(MemoryStore::new());
        let en = Ledger::new(Arc::clone(&store), "en-zh");
        let ko = Ledger::new(Arc::clone(&store), "ko-zh");
        en.record_miss("amy", &word("c", "cat", "猫"), 0).unwrap();
        assert_eq!(en.count("amy"), 1);
        assert_eq!(en.count("bob"), 0);
        assert_eq!(ko.count("amy"), 0);
    }

    #[test]
    fn remediation_observed_before_removal() {
        let spy = Arc::new(Spy::default());
        let ledger = ledger().with_observer(spy.clone());
        let cat = word("c", "cat", "猫");
        ledger.record_miss("amy", &cat, 0).unwrap();
        ledger.record_miss("amy", &cat, 0).unwrap();

        let outcome = ledger.record_remediation("amy", &cat).unwrap();
        assert!(matches!(outcome, Remediation::Removed(_)));
        assert!(ledger.list("amy").is_empty());

        let seen = spy.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].stats.error_count, 2);
        assert_eq!(seen[0].stats.correct_count, 1);
    }

    #[test]
    fn remediation_of_absent_word_is_a_noop_twice() {
        let ledger = ledger();
        let cat = word("c", "cat", "猫");
        assert_eq!(
            ledger.record_remediation("amy", &cat).unwrap(),
            Remediation::Absent
        );
        assert_eq!(
            ledger.record_remediation("amy", &cat).unwrap(),
            Remediation::Absent
        );
        assert_eq!(ledger.count("amy"), 0);
        assert!(ledger.store().is_empty());
    }

    #[test]
    fn stats_and_removal_toggle_independently() {
        let keep = ledger().with_policy(LedgerPolicy {
            remove_on_correct: false,
            ..Default::default()
        });
        let cat = word("c", "cat", "猫");
        keep.record_miss("amy", &cat, 0).unwrap();
        match keep.record_remediation("amy", &cat).unwrap() {
            Remediation::Updated(entry) => assert_eq!(entry.stats.correct_count, 1),
            other => panic!("expected Updated, got {other:?}"),
        }
        assert_eq!(keep.count("amy"), 1);

        let silent = ledger().with_policy(LedgerPolicy {
            track_stats: false,
            ..Default::default()
        });
        silent.record_miss("amy", &cat, 0).unwrap();
        match silent.record_remediation("amy", &cat).unwrap() {
            Remediation::Removed(entry) => assert_eq!(entry.stats.correct_count, 0),
            other => panic!("expected Removed, got {other:?}"),
        }
    }

    #[test]
    fn corrupt_document_reads_empty_and_heals_on_write() {
        let ledger = ledger();
        let key = StorageKeys::default().ledger("amy", "en-zh");
        ledger.store().set(&key, "{ definitely not json").unwrap();

        assert!(ledger.list("amy").is_empty());
        assert_eq!(ledger.count("amy"), 0);

        ledger.record_miss("amy", &word("c", "cat", "猫"), 0).unwrap();
        assert_eq!(ledger.count("amy"), 1);
        let raw = ledger.store().get(&key).unwrap().unwrap();
        assert!(serde_json::from_str::<LedgerDocument>(&raw).is_ok());
    }

    #[test]
    fn legacy_array_is_migrated() {
        let ledger = ledger();
        let key = StorageKeys::default().ledger("amy", "en-zh");
        let legacy = r#"[{"english":"dog","chinese":"狗","wrongOptions":["猫","鱼"],"level":3}]"#;
        ledger.store().set(&key, legacy).unwrap();

        let entries = ledger.entries("amy");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].word_id, "migrated-0");
        assert_eq!(entries[0].word.wrong_options.target, vec!["猫", "鱼"]);
        assert_eq!(entries[0].level, 3);

        let raw = ledger.store().get(&key).unwrap().unwrap();
        assert!(raw.starts_with('{'));
    }

    #[test]
    fn import_drops_invalid_entries_individually() {
        let ledger = ledger();
        let report = ledger.import_batch(
            "amy",
            r#"{"words":[{"word":{"source":"cat","target":"猫"}},{"word":{"source":""}}]}"#,
        );
        assert!(report.success);
        assert_eq!(report.imported_count, 1);
        assert_eq!(report.supplied_count, 2);
        assert_eq!(ledger.count("amy"), 1);
        assert!(ledger.entries("amy")[0].word_id.starts_with("imported-"));
    }

    #[test]
    fn import_keeps_one_entry_per_word() {
        let ledger = ledger();
        let report = ledger.import_batch(
            "amy",
            r#"{"words":[
                {"wordId":"c","word":{"source":"cat","target":"猫"},"stats":{"errorCount":4}},
                {"wordId":"c","word":{"source":"cat","target":"猫"}},
                {"wordId":"c2","word":{"source":"cat","target":"猫"}},
                {"wordId":"d","word":{"source":"dog","target":"狗"}}
            ]}"#,
        );
        assert!(report.success);
        assert_eq!(report.imported_count, 2);
        assert_eq!(report.supplied_count, 4);
        assert!(report.message.contains("2 duplicate(s) dropped"));

        let entries = ledger.entries("amy");
        let ids: Vec<_> = entries.iter().map(|e| e.word_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "d"]);
        assert_eq!(entries[0].stats.error_count, 4);
    }

    #[test]
    fn batch_misses_keep_their_own_levels() {
        let ledger = ledger();
        let misses = [
            MissedWord {
                word: word("c", "cat", "猫"),
                level: 3,
            },
            MissedWord {
                word: word("d", "dog", "狗"),
                level: 2,
            },
        ];
        ledger.record_misses("amy", &misses).unwrap();
        let levels: Vec<_> = ledger.entries("amy").iter().map(|e| e.level).collect();
        assert_eq!(levels, vec![3, 2]);
    }

    #[test]
    fn import_rejects_bad_outer_shape_without_touching_ledger() {
        let ledger = ledger();
        ledger.record_miss("amy", &word("c", "cat", "猫"), 0).unwrap();

        for raw in ["[1,2,3]", r#"{"entries":[]}"#, "not json", r#"{"words":[{}]}"#] {
            let report = ledger.import_batch("amy", raw);
            assert!(!report.success, "should reject {raw}");
            assert_eq!(report.imported_count, 0);
        }
        assert_eq!(ledger.count("amy"), 1);
    }

    #[test]
    fn import_rejects_oversized_batch() {
        let ledger = ledger();
        let words: Vec<Value> = (0..=MAX_IMPORT_ENTRIES)
            .map(|i| serde_json::json!({"word": {"source": format!("w{i}"), "target": "t"}}))
            .collect();
        let report = ledger.import_value("amy", &serde_json::json!({ "words": words }));
        assert!(!report.success);
        assert!(report.message.contains("too many"));
        assert_eq!(ledger.count("amy"), 0);
    }

    #[test]
    fn import_caps_field_lengths() {
        let ledger = ledger();
        let long = "a".repeat(1000);
        let tags: Vec<String> = (0..20).map(|i| format!("tag{i}")).collect();
        let doc = serde_json::json!({
            "words": [{
                "wordId": 42,
                "word": {"source": long, "target": "长", "icon": "🍎🍎🍎🍎🍎🍎🍎🍎🍎🍎🍎🍎"},
                "stats": {"errorCount": "3", "correctCount": -2},
                "tags": tags,
                "note": long,
                "level": "7"
            }]
        });
        let report = ledger.import_value("amy", &doc);
        assert!(report.success);

        let entry = &ledger.entries("amy")[0];
        assert_eq!(entry.word_id, "42");
        assert_eq!(entry.word.source.chars().count(), 200);
        assert_eq!(entry.word.icon.as_ref().unwrap().chars().count(), 10);
        assert_eq!(entry.note.chars().count(), 500);
        assert_eq!(entry.tags.len(), 10);
        assert_eq!(entry.stats.error_count, 3);
        assert_eq!(entry.stats.correct_count, 0);
        assert_eq!(entry.level, 7);
    }

    #[test]
    fn export_then_import_restores_ledger() {
        let ledger = ledger();
        let mut cat = word("c", "cat", "猫");
        cat.example = Some("The cat sat.".into());
        ledger.record_miss("amy", &cat, 1).unwrap();
        ledger.record_miss("amy", &word("d", "dog", "狗"), 2).unwrap();
        let before = ledger.entries("amy");

        let exported = ledger.export("amy").unwrap();
        assert!(exported.contains("\"version\": \"2.0\""));
        ledger.clear("amy").unwrap();
        assert_eq!(ledger.count("amy"), 0);

        let report = ledger.import_batch("amy", &exported);
        assert!(report.success);
        assert_eq!(report.imported_count, 2);
        assert_eq!(ledger.entries("amy"), before);
    }

    #[test]
    fn manual_remove_and_update_stats() {
        let ledger = ledger();
        let cat = word("c", "cat", "猫");
        ledger.record_miss("amy", &cat, 0).unwrap();
        assert!(ledger.update_stats("amy", &cat, false).unwrap());
        assert_eq!(ledger.entries("amy")[0].stats.error_count, 2);

        assert!(!ledger.remove("amy", "missing").unwrap());
        assert!(ledger.remove("amy", "c").unwrap());
        assert_eq!(ledger.count("amy"), 0);
    }

    #[test]
    fn list_yields_playable_words() {
        let ledger = ledger();
        ledger.record_miss("amy", &word("c", "cat", "猫"), 4).unwrap();
        let list = ledger.list("amy");
        assert_eq!(list[0].item.id, "c");
        assert_eq!(list[0].item.target, "猫");
        assert_eq!(list[0].level, 4);
        assert_eq!(list[0].stats.error_count, 1);
    }
}
