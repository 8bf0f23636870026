//! Speech planning.
//!
//! The engine never waits on audio. This module only decides *what* should be
//! spoken for a word and hands [`Utterance`]s to a [`Speaker`], which plays
//! them however it likes and never reports back.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{Direction, VocabItem};

/// Order in which a word and its example are read out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakOrder {
    #[default]
    WordThenExample,
    WordOnly,
    ExampleOnly,
}

/// Per-language voice parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// BCP-47 tag handed to the synthesizer, e.g. "en-US".
    pub lang: String,
    #[serde(default)]
    pub rate: Option<f32>,
    #[serde(default)]
    pub pitch: Option<f32>,
    #[serde(default)]
    pub volume: Option<f32>,
}

impl VoiceSettings {
    fn new(lang: &str, rate: f32, pitch: f32, volume: Option<f32>) -> Self {
        Self {
            lang: lang.to_string(),
            rate: Some(rate),
            pitch: Some(pitch),
            volume,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechSettings {
    pub speak_word: bool,
    pub speak_example: bool,
    pub order: SpeakOrder,
    /// Pause between the word and its example.
    pub pause_between_ms: u64,
    pub rate: f32,
    pub pitch: f32,
    /// Voices keyed by short language code ("en", "zh").
    pub voices: BTreeMap<String, VoiceSettings>,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        let mut voices = BTreeMap::new();
        voices.insert("en".into(), VoiceSettings::new("en-US", 0.8, 1.1, None));
        voices.insert("zh".into(), VoiceSettings::new("zh-CN", 0.75, 0.95, Some(0.9)));
        voices.insert("ko".into(), VoiceSettings::new("ko-KR", 0.8, 1.0, None));
        voices.insert("ja".into(), VoiceSettings::new("ja-JP", 0.8, 1.0, None));
        Self {
            speak_word: true,
            speak_example: true,
            order: SpeakOrder::WordThenExample,
            pause_between_ms: 500,
            rate: 0.8,
            pitch: 1.1,
            voices,
        }
    }
}

impl SpeechSettings {
    /// Voice for a language code, falling back to English.
    pub fn voice(&self, code: &str) -> VoiceSettings {
        self.voices
            .get(code)
            .or_else(|| self.voices.get("en"))
            .cloned()
            .unwrap_or_else(|| VoiceSettings::new("en-US", self.rate, self.pitch, None))
    }

    /// Build a single utterance in the given language.
    pub fn utterance(&self, text: &str, code: &str, pause_before_ms: u64) -> Utterance {
        let voice = self.voice(code);
        Utterance {
            text: text.to_string(),
            lang: voice.lang,
            rate: voice.rate.unwrap_or(self.rate),
            pitch: voice.pitch.unwrap_or(self.pitch),
            volume: voice.volume.unwrap_or(1.0),
            pause_before_ms,
        }
    }
}

/// One piece of text to be spoken.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub lang: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    /// Silence to insert before this utterance.
    pub pause_before_ms: u64,
}

/// Plan what to say when a word is shown.
///
/// The prompt side is read in its own language: the source language normally,
/// the target language in reverse direction. Examples are source-language
/// sentences and are only read when the prompt is in the source language.
pub fn plan_utterances(
    word: &VocabItem,
    direction: Direction,
    settings: &SpeechSettings,
    source_code: &str,
    target_code: &str,
) -> Vec<Utterance> {
    let reverse = direction.is_reverse();
    let word_text = direction.prompt(word);
    let word_lang = if reverse { target_code } else { source_code };
    let example = word
        .example
        .as_deref()
        .filter(|e| !e.is_empty() && !reverse && settings.speak_example);

    let mut plan = Vec::new();
    match settings.order {
        SpeakOrder::WordOnly => {
            if settings.speak_word {
                plan.push(settings.utterance(word_text, word_lang, 0));
            }
        }
        SpeakOrder::ExampleOnly => {
            if let Some(example) = example {
                plan.push(settings.utterance(example, source_code, 0));
            }
        }
        SpeakOrder::WordThenExample => {
            if settings.speak_word {
                plan.push(settings.utterance(word_text, word_lang, 0));
            }
            if let Some(example) = example {
                let pause = if plan.is_empty() {
                    0
                } else {
                    settings.pause_between_ms
                };
                plan.push(settings.utterance(example, source_code, pause));
            }
        }
    }
    plan
}

/// Something that can read text aloud. Fire-and-forget: implementations log
/// their own failures and never block the caller on playback.
pub trait Speaker: Send + Sync {
    fn speak(&self, utterance: &Utterance);

    /// Stop anything currently playing.
    fn cancel(&self) {}
}

/// A speaker that says nothing.
pub struct SilentSpeaker;

impl Speaker for SilentSpeaker {
    fn speak(&self, utterance: &Utterance) {
        tracing::debug!(lang = %utterance.lang, "silent speaker skipping '{}'", utterance.text);
    }
}

/// Split long text into paragraph-sized chunks so synthesizers do not time out.
pub fn chunk_paragraphs(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word() -> VocabItem {
        let mut w = VocabItem::new("a", "apple", "苹果");
        w.example = Some("She took a bite of the apple.".into());
        w
    }

    #[test]
    fn forward_reads_word_then_example() {
        let plan = plan_utterances(
            &word(),
            Direction::SourceToTarget,
            &SpeechSettings::default(),
            "en",
            "zh",
        );
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].text, "apple");
        assert_eq!(plan[0].lang, "en-US");
        assert_eq!(plan[0].pause_before_ms, 0);
        assert_eq!(plan[1].pause_before_ms, 500);
    }

    #[test]
    fn reverse_reads_translation_without_example() {
        let plan = plan_utterances(
            &word(),
            Direction::TargetToSource,
            &SpeechSettings::default(),
            "en",
            "zh",
        );
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].text, "苹果");
        assert_eq!(plan[0].lang, "zh-CN");
        assert!((plan[0].volume - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn order_and_toggles_are_honoured() {
        let mut settings = SpeechSettings {
            order: SpeakOrder::ExampleOnly,
            ..Default::default()
        };
        let plan = plan_utterances(&word(), Direction::SourceToTarget, &settings, "en", "zh");
        assert_eq!(plan.len(), 1);
        assert!(plan[0].text.starts_with("She"));

        settings.order = SpeakOrder::WordThenExample;
        settings.speak_word = false;
        let plan = plan_utterances(&word(), Direction::SourceToTarget, &settings, "en", "zh");
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].pause_before_ms, 0);
    }

    #[test]
    fn unknown_language_falls_back_to_english() {
        let settings = SpeechSettings::default();
        assert_eq!(settings.voice("xx").lang, "en-US");
    }

    #[test]
    fn paragraphs_are_chunked() {
        let chunks = chunk_paragraphs("One.\n\nTwo.\nThree.\n");
        assert_eq!(chunks, vec!["One.", "Two.", "Three."]);
    }
}
