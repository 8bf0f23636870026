//! Core data model types for vocabdrill.
//!
//! A [`Catalog`] is a read-only table of [`VocabItem`]s grouped by level.
//! Items are normalized once when the catalog is loaded (see
//! [`crate::catalog`]) and never mutated afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A single vocabulary entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabItem {
    /// Stable identifier, unique within a catalog.
    pub id: String,
    /// Primary term in the source language (e.g. "apple").
    pub source: String,
    /// Translated term in the target language (e.g. "苹果").
    pub target: String,
    /// Wrong-answer pools, one per direction.
    #[serde(default, rename = "wrongOptions")]
    pub distractors: Distractors,
    /// Source-language definition, used only in definition mode.
    #[serde(default)]
    pub definition: Option<String>,
    /// Wrong definitions offered alongside `definition`.
    #[serde(default)]
    pub wrong_definitions: Vec<String>,
    /// One example sentence in the source language.
    #[serde(default)]
    pub example: Option<String>,
    /// Optional emoji or short icon.
    #[serde(default)]
    pub icon: Option<String>,
    /// Morphology, etymology and friends, present on advanced levels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rich: Option<RichMetadata>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl VocabItem {
    /// Build a bare item with no distractors or metadata.
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            distractors: Distractors::default(),
            definition: None,
            wrong_definitions: Vec::new(),
            example: None,
            icon: None,
            rich: None,
            tags: Vec::new(),
        }
    }

    /// Whether the item carries anything worth a detail panel.
    pub fn has_rich_metadata(&self) -> bool {
        self.rich.as_ref().is_some_and(|r| !r.is_empty())
    }
}

/// Direction-specific pools of distractors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distractors {
    /// Wrong translations, shown when the answer is `target`.
    #[serde(default)]
    pub target: Vec<String>,
    /// Wrong primary terms, shown when the answer is `source`.
    #[serde(default)]
    pub source: Vec<String>,
}

/// Extra word detail shown after answering on advanced levels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichMetadata {
    #[serde(default)]
    pub morphology: Option<Morphology>,
    #[serde(default)]
    pub etymology: Option<Etymology>,
    #[serde(default)]
    pub examples: Vec<ExampleSentence>,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub antonyms: Vec<String>,
}

impl RichMetadata {
    pub fn is_empty(&self) -> bool {
        self.morphology.is_none()
            && self.etymology.is_none()
            && self.examples.is_empty()
            && self.synonyms.is_empty()
            && self.antonyms.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Morphology {
    /// Human-readable split, e.g. "un- + believe + -able".
    pub breakdown: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Etymology {
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub meaning: Option<String>,
    #[serde(default)]
    pub evolution: Option<String>,
}

impl fmt::Display for Etymology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(origin) = &self.origin {
            parts.push(origin.clone());
        }
        if let Some(root) = &self.root {
            parts.push(root.clone());
        }
        if let Some(meaning) = &self.meaning {
            parts.push(format!("({meaning})"));
        }
        write!(f, "{}", parts.join(" "))?;
        if let Some(evolution) = &self.evolution {
            write!(f, "\n{evolution}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleSentence {
    pub sentence: String,
    #[serde(default)]
    pub translation: String,
}

/// Which field is shown as the prompt and which one is the answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Show the source term, pick the translation.
    #[default]
    #[serde(rename = "en-zh")]
    SourceToTarget,
    /// Show the translation, pick the source term.
    #[serde(rename = "zh-en")]
    TargetToSource,
    /// Show the source term, pick its definition.
    #[serde(rename = "en-en")]
    SourceToDefinition,
}

impl Direction {
    pub const ALL: [Direction; 3] = [
        Direction::SourceToTarget,
        Direction::TargetToSource,
        Direction::SourceToDefinition,
    ];

    /// The text shown as the question.
    pub fn prompt<'a>(&self, word: &'a VocabItem) -> &'a str {
        match self {
            Direction::TargetToSource => &word.target,
            Direction::SourceToTarget | Direction::SourceToDefinition => &word.source,
        }
    }

    /// The correct answer, or `None` when the item has no answer for this direction.
    pub fn answer<'a>(&self, word: &'a VocabItem) -> Option<&'a str> {
        let answer = match self {
            Direction::SourceToTarget => Some(word.target.as_str()),
            Direction::TargetToSource => Some(word.source.as_str()),
            Direction::SourceToDefinition => word.definition.as_deref(),
        };
        answer.filter(|a| !a.is_empty())
    }

    /// The distractor pool matching this direction.
    pub fn distractors<'a>(&self, word: &'a VocabItem) -> &'a [String] {
        match self {
            Direction::SourceToTarget => &word.distractors.target,
            Direction::TargetToSource => &word.distractors.source,
            Direction::SourceToDefinition => &word.wrong_definitions,
        }
    }

    pub fn requires_definition(&self) -> bool {
        matches!(self, Direction::SourceToDefinition)
    }

    /// Whether the prompt is in the target language.
    pub fn is_reverse(&self) -> bool {
        matches!(self, Direction::TargetToSource)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Direction::SourceToTarget => "English → Chinese",
            Direction::TargetToSource => "Chinese → English",
            Direction::SourceToDefinition => "English → English definition",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::SourceToTarget => write!(f, "en-zh"),
            Direction::TargetToSource => write!(f, "zh-en"),
            Direction::SourceToDefinition => write!(f, "en-en"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "en-zh" | "forward" => Ok(Direction::SourceToTarget),
            "zh-en" | "reverse" => Ok(Direction::TargetToSource),
            "en-en" | "definition" => Ok(Direction::SourceToDefinition),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}

/// Language descriptor carried in catalog metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageInfo {
    /// Short code used for speech voices ("en", "zh").
    pub code: String,
    #[serde(default)]
    pub name: String,
}

/// Catalog header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogMeta {
    /// Identifier used to namespace ledgers, e.g. "en-zh".
    pub id: String,
    pub name: String,
    pub source_language: LanguageInfo,
    pub target_language: LanguageInfo,
    #[serde(default)]
    pub version: String,
}

/// The full static word set, organised by level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub meta: CatalogMeta,
    pub levels: BTreeMap<u32, Vec<VocabItem>>,
}

impl Catalog {
    /// Words at a level, or an empty slice when the level does not exist.
    pub fn words_at(&self, level: u32) -> &[VocabItem] {
        self.levels.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Lowest and highest level present, if any.
    pub fn level_range(&self) -> Option<RangeInclusive<u32>> {
        let min = *self.levels.keys().next()?;
        let max = *self.levels.keys().next_back()?;
        Some(min..=max)
    }

    pub fn total_words(&self) -> usize {
        self.levels.values().map(Vec::len).sum()
    }

    /// Find an item by id across all levels.
    pub fn get(&self, id: &str) -> Option<&VocabItem> {
        self.levels.values().flatten().find(|w| w.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apple() -> VocabItem {
        let mut item = VocabItem::new("en-zh-0-0000", "apple", "苹果");
        item.distractors.target = vec!["香蕉".into(), "橙子".into()];
        item.distractors.source = vec!["pear".into()];
        item
    }

    #[test]
    fn direction_display_and_parse() {
        for d in Direction::ALL {
            assert_eq!(d.to_string().parse::<Direction>().unwrap(), d);
        }
        assert_eq!("reverse".parse::<Direction>().unwrap(), Direction::TargetToSource);
        assert!("ko-zh".parse::<Direction>().is_err());
    }

    #[test]
    fn direction_picks_prompt_answer_and_pool() {
        let word = apple();
        assert_eq!(Direction::SourceToTarget.prompt(&word), "apple");
        assert_eq!(Direction::SourceToTarget.answer(&word), Some("苹果"));
        assert_eq!(Direction::SourceToTarget.distractors(&word).len(), 2);

        assert_eq!(Direction::TargetToSource.prompt(&word), "苹果");
        assert_eq!(Direction::TargetToSource.answer(&word), Some("apple"));
        assert_eq!(Direction::TargetToSource.distractors(&word), ["pear"]);
    }

    #[test]
    fn definition_mode_without_definition_has_no_answer() {
        let mut word = apple();
        assert_eq!(Direction::SourceToDefinition.answer(&word), None);
        word.definition = Some("a round fruit".into());
        assert_eq!(
            Direction::SourceToDefinition.answer(&word),
            Some("a round fruit")
        );
    }

    #[test]
    fn direction_serde_uses_mode_ids() {
        let json = serde_json::to_string(&Direction::TargetToSource).unwrap();
        assert_eq!(json, "\"zh-en\"");
    }

    #[test]
    fn catalog_lookup_and_range() {
        let mut levels = BTreeMap::new();
        levels.insert(0, vec![apple()]);
        levels.insert(3, vec![VocabItem::new("b", "book", "书")]);
        let catalog = Catalog {
            meta: CatalogMeta {
                id: "en-zh".into(),
                name: "test".into(),
                source_language: LanguageInfo {
                    code: "en".into(),
                    name: String::new(),
                },
                target_language: LanguageInfo {
                    code: "zh".into(),
                    name: String::new(),
                },
                version: "2.0".into(),
            },
            levels,
        };
        assert_eq!(catalog.level_range(), Some(0..=3));
        assert_eq!(catalog.total_words(), 2);
        assert!(catalog.words_at(1).is_empty());
        assert_eq!(catalog.get("b").map(|w| w.source.as_str()), Some("book"));
    }

    #[test]
    fn etymology_display() {
        let e = Etymology {
            origin: Some("Latin".into()),
            root: Some("bene".into()),
            meaning: Some("well".into()),
            evolution: None,
        };
        assert_eq!(e.to_string(), "Latin bene (well)");
    }
}
