//! Catalog loader.
//!
//! Loads word catalogs from JSON or TOML files, normalizes legacy word shapes
//! once at load time, and validates the result.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};

use crate::model::{
    Catalog, CatalogMeta, Direction, Distractors, Etymology, ExampleSentence, LanguageInfo,
    Morphology, RichMetadata, VocabItem,
};

/// How many reverse distractors are synthesized for words that ship without any.
const SYNTHESIZED_SOURCE_DISTRACTORS: usize = 2;

/// On-disk catalog encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogFormat {
    Json,
    Toml,
}

impl CatalogFormat {
    /// Pick a format from a file extension (defaults to JSON).
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => CatalogFormat::Toml,
            _ => CatalogFormat::Json,
        }
    }
}

/// Intermediate structure for parsing catalog files.
#[derive(Debug, Deserialize)]
struct RawCatalog {
    #[serde(default)]
    meta: Option<RawMeta>,
    #[serde(default)]
    levels: BTreeMap<String, Vec<RawWord>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMeta {
    #[serde(default = "default_catalog_id")]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    source_language: Option<LanguageInfo>,
    #[serde(default)]
    target_language: Option<LanguageInfo>,
    #[serde(default)]
    version: String,
}

fn default_catalog_id() -> String {
    "en-zh".to_string()
}

/// A word as it may appear on disk, including legacy field names.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWord {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, alias = "english")]
    source: Option<String>,
    #[serde(default, alias = "chinese")]
    target: Option<String>,
    #[serde(default)]
    wrong_options: Option<RawWrongOptions>,
    #[serde(default)]
    definition: Option<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    wrong_definitions: Vec<String>,
    #[serde(default)]
    example: Option<String>,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    morphology: Option<Morphology>,
    #[serde(default)]
    etymology: Option<Etymology>,
    #[serde(default, deserialize_with = "nullable_vec")]
    examples: Vec<ExampleSentence>,
    #[serde(default, deserialize_with = "nullable_vec")]
    synonyms: Vec<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    antonyms: Vec<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    tags: Vec<String>,
}

/// Older catalogs stored forward distractors as a flat list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawWrongOptions {
    Flat(Vec<String>),
    Split(Distractors),
}

fn nullable_vec<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parse a catalog file, choosing the format from its extension.
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog file: {}", path.display()))?;

    parse_catalog_str(&content, CatalogFormat::from_path(path))
        .with_context(|| format!("failed to load catalog: {}", path.display()))
}

/// Parse catalog text (useful for testing).
pub fn parse_catalog_str(content: &str, format: CatalogFormat) -> Result<Catalog> {
    let raw: RawCatalog = match format {
        CatalogFormat::Json => serde_json::from_str(content).context("failed to parse JSON")?,
        CatalogFormat::Toml => toml::from_str(content).context("failed to parse TOML")?,
    };

    let meta = match raw.meta {
        Some(m) => CatalogMeta {
            id: m.id,
            name: m.name,
            source_language: m.source_language.unwrap_or_else(|| language("en", "English")),
            target_language: m.target_language.unwrap_or_else(|| language("zh", "Chinese")),
            version: m.version,
        },
        None => CatalogMeta {
            id: default_catalog_id(),
            name: String::new(),
            source_language: language("en", "English"),
            target_language: language("zh", "Chinese"),
            version: String::new(),
        },
    };

    let mut levels = BTreeMap::new();
    for (key, words) in raw.levels {
        let level: u32 = key
            .trim()
            .parse()
            .with_context(|| format!("level key is not a non-negative integer: '{key}'"))?;
        levels.insert(level, normalize_level(&meta.id, level, words));
    }

    Ok(Catalog { meta, levels })
}

fn language(code: &str, name: &str) -> LanguageInfo {
    LanguageInfo {
        code: code.to_string(),
        name: name.to_string(),
    }
}

/// Turn raw words into catalog items, dropping entries without both terms.
fn normalize_level(catalog_id: &str, level: u32, words: Vec<RawWord>) -> Vec<VocabItem> {
    let mut items: Vec<VocabItem> = Vec::with_capacity(words.len());

    for (index, raw) in words.into_iter().enumerate() {
        let (Some(source), Some(target)) = (raw.source, raw.target) else {
            tracing::warn!("level {level} word #{index} has no source or target, skipping");
            continue;
        };
        if source.trim().is_empty() || target.trim().is_empty() {
            tracing::warn!("level {level} word #{index} has an empty term, skipping");
            continue;
        }

        let distractors = match raw.wrong_options {
            Some(RawWrongOptions::Flat(target)) => Distractors {
                target,
                source: Vec::new(),
            },
            Some(RawWrongOptions::Split(d)) => d,
            None => Distractors::default(),
        };

        let rich = RichMetadata {
            morphology: raw.morphology,
            etymology: raw.etymology,
            examples: raw.examples,
            synonyms: raw.synonyms,
            antonyms: raw.antonyms,
        };

        items.push(VocabItem {
            id: raw
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| format!("{catalog_id}-{level}-{index:04}")),
            source,
            target,
            distractors,
            definition: raw.definition.filter(|d| !d.trim().is_empty()),
            wrong_definitions: raw.wrong_definitions,
            example: raw.example.filter(|e| !e.trim().is_empty()),
            icon: raw.icon.filter(|i| !i.trim().is_empty()),
            rich: (!rich.is_empty()).then_some(rich),
            tags: raw.tags,
        });
    }

    fill_source_distractors(&mut items);
    items
}

/// Give words without reverse distractors a few primary terms from their level.
///
/// Picks the following words in level order (wrapping), so loading the same
/// file twice yields the same catalog.
fn fill_source_distractors(items: &mut [VocabItem]) {
    let sources: Vec<String> = items.iter().map(|w| w.source.clone()).collect();
    let n = sources.len();

    for (i, item) in items.iter_mut().enumerate() {
        if !item.distractors.source.is_empty() {
            continue;
        }
        let mut picked = Vec::new();
        for offset in 1..n {
            let candidate = &sources[(i + offset) % n];
            if candidate != &item.source && !picked.contains(candidate) {
                picked.push(candidate.clone());
            }
            if picked.len() == SYNTHESIZED_SOURCE_DISTRACTORS {
                break;
            }
        }
        item.distractors.source = picked;
    }
}

/// A warning from catalog validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The level the warning refers to (if applicable).
    pub level: Option<u32>,
    /// The word ID (if applicable).
    pub word_id: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Validate a catalog for common data gaps.
pub fn validate_catalog(catalog: &Catalog) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if catalog.levels.is_empty() {
        warnings.push(ValidationWarning {
            level: None,
            word_id: None,
            message: "catalog has no levels".into(),
        });
    }

    let mut seen_ids = HashSet::new();
    for (&level, words) in &catalog.levels {
        if words.is_empty() {
            warnings.push(ValidationWarning {
                level: Some(level),
                word_id: None,
                message: "level has no words".into(),
            });
        }

        let mut missing_definitions = 0usize;
        for word in words {
            let warn = |message: String| ValidationWarning {
                level: Some(level),
                word_id: Some(word.id.clone()),
                message,
            };

            if !seen_ids.insert(word.id.as_str()) {
                warnings.push(warn(format!("duplicate word ID: {}", word.id)));
            }

            for direction in [Direction::SourceToTarget, Direction::TargetToSource] {
                let pool = direction.distractors(word);
                if pool.is_empty() {
                    warnings.push(warn(format!("no distractors for {direction}")));
                }
                if let Some(answer) = direction.answer(word) {
                    if pool.iter().any(|d| d == answer) {
                        warnings.push(warn(format!(
                            "distractor for {direction} equals the correct answer '{answer}'"
                        )));
                    }
                }
            }

            if word.definition.is_none() {
                missing_definitions += 1;
            } else if word.wrong_definitions.is_empty() {
                warnings.push(warn("definition present but no wrong definitions".into()));
            }
        }

        if missing_definitions > 0 && missing_definitions < words.len() {
            warnings.push(ValidationWarning {
                level: Some(level),
                word_id: None,
                message: format!(
                    "{missing_definitions} of {} words lack a definition and are skipped in en-en mode",
                    words.len()
                ),
            });
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_JSON: &str = r#"{
  "meta": {
    "id": "en-zh",
    "name": "English-Chinese",
    "sourceLanguage": { "code": "en", "name": "English" },
    "targetLanguage": { "code": "zh", "name": "Chinese" },
    "version": "2.0"
  },
  "levels": {
    "0": [
      { "id": "a", "source": "apple", "target": "苹果",
        "wrongOptions": { "target": ["香蕉", "橙子"], "source": ["pear"] },
        "example": "She took a bite of the apple.", "icon": "🍎" },
      { "id": "c", "source": "cat", "target": "猫",
        "wrongOptions": { "target": ["狗", "鱼"], "source": ["dog"] } }
    ],
    "1": [
      { "english": "book", "chinese": "书", "wrongOptions": ["笔", "桌子"] },
      { "english": "desk", "chinese": "桌子", "wrongOptions": ["书", "笔"] },
      { "english": "pen", "chinese": "笔", "wrongOptions": ["书", "桌子"],
        "synonyms": null, "morphology": { "breakdown": "pen" } }
    ]
  }
}"#;

    #[test]
    fn parse_valid_json() {
        let catalog = parse_catalog_str(VALID_JSON, CatalogFormat::Json).unwrap();
        assert_eq!(catalog.meta.id, "en-zh");
        assert_eq!(catalog.total_words(), 5);
        let apple = &catalog.words_at(0)[0];
        assert_eq!(apple.distractors.target, vec!["香蕉", "橙子"]);
        assert_eq!(apple.icon.as_deref(), Some("🍎"));
        assert!(apple.rich.is_none());
    }

    #[test]
    fn legacy_words_are_normalized() {
        let catalog = parse_catalog_str(VALID_JSON, CatalogFormat::Json).unwrap();
        let book = &catalog.words_at(1)[0];
        assert_eq!(book.id, "en-zh-1-0000");
        assert_eq!(book.source, "book");
        assert_eq!(book.target, "书");
        assert_eq!(book.distractors.target, vec!["笔", "桌子"]);
        // synthesized from the following words in the level
        assert_eq!(book.distractors.source, vec!["desk", "pen"]);
        let pen = &catalog.words_at(1)[2];
        assert_eq!(pen.distractors.source, vec!["book", "desk"]);
        assert!(pen.has_rich_metadata());
    }

    #[test]
    fn words_missing_terms_are_dropped() {
        let json = r#"{ "levels": { "0": [
            { "source": "ok", "target": "好" },
            { "source": "", "target": "空" },
            { "target": "无" }
        ] } }"#;
        let catalog = parse_catalog_str(json, CatalogFormat::Json).unwrap();
        assert_eq!(catalog.words_at(0).len(), 1);
        assert_eq!(catalog.meta.source_language.code, "en");
    }

    #[test]
    fn parse_toml_catalog() {
        let toml = r#"
[meta]
id = "en-zh"
name = "Tiny"

[[levels.0]]
id = "sun"
source = "sun"
target = "太阳"
wrongOptions = { target = ["月亮"], source = ["moon"] }

[[levels.0]]
id = "moon"
source = "moon"
target = "月亮"
wrongOptions = { target = ["太阳"], source = ["sun"] }
"#;
        let catalog = parse_catalog_str(toml, CatalogFormat::Toml).unwrap();
        assert_eq!(catalog.words_at(0).len(), 2);
        assert_eq!(catalog.words_at(0)[1].distractors.source, vec!["sun"]);
    }

    #[test]
    fn non_numeric_level_key_is_an_error() {
        let json = r#"{ "levels": { "easy": [] } }"#;
        assert!(parse_catalog_str(json, CatalogFormat::Json).is_err());
    }

    #[test]
    fn malformed_input_is_an_error() {
        assert!(parse_catalog_str("{ not json", CatalogFormat::Json).is_err());
        assert!(parse_catalog_str("this is [not toml", CatalogFormat::Toml).is_err());
    }

    #[test]
    fn validate_flags_duplicates_and_bad_distractors() {
        let json = r#"{ "levels": { "0": [
            { "id": "x", "source": "red", "target": "红色",
              "wrongOptions": { "target": ["红色"], "source": ["blue"] } },
            { "id": "x", "source": "blue", "target": "蓝色",
              "wrongOptions": { "target": ["红色"], "source": ["red"] } }
        ] } }"#;
        let catalog = parse_catalog_str(json, CatalogFormat::Json).unwrap();
        let warnings = validate_catalog(&catalog);
        assert!(warnings.iter().any(|w| w.message.contains("duplicate")));
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("equals the correct answer")));
    }

    #[test]
    fn load_from_file_picks_format_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.json");
        std::fs::write(&path, VALID_JSON).unwrap();
        let catalog = load_catalog(&path).unwrap();
        assert_eq!(catalog.levels.len(), 2);

        assert!(load_catalog(&dir.path().join("missing.json")).is_err());
    }
}
