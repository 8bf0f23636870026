//! Bilingual stories built from a learner's missed words.
//!
//! The flow is: sample words from the ledger, build a prompt for a style,
//! send it through an [`LlmProvider`], then split the reply into its English
//! story and Chinese translation. Parsing is permissive; a reply without a
//! separator still yields a story, just without a translation.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::StoryError;
use crate::ledger::ReviewWord;
use crate::speech::chunk_paragraphs;
use crate::traits::{GenerateRequest, LlmProvider};

/// Words sampled into one story by default.
pub const DEFAULT_MAX_WORDS: usize = 10;
pub const DEFAULT_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_STORY_MODEL: &str = "claude-sonnet-4-20250514";

/// System prompt sent with every story request.
pub const STORY_SYSTEM_PROMPT: &str = "You are a children's story writer who helps language learners. Follow the requested output format exactly.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryStyle {
    #[default]
    Peppa,
    HarryPotter,
    Disney,
    Adventure,
    Science,
    Funny,
}

impl StoryStyle {
    pub const ALL: [StoryStyle; 6] = [
        StoryStyle::Peppa,
        StoryStyle::HarryPotter,
        StoryStyle::Disney,
        StoryStyle::Adventure,
        StoryStyle::Science,
        StoryStyle::Funny,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            StoryStyle::Peppa => "peppa",
            StoryStyle::HarryPotter => "harry_potter",
            StoryStyle::Disney => "disney",
            StoryStyle::Adventure => "adventure",
            StoryStyle::Science => "science",
            StoryStyle::Funny => "funny",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StoryStyle::Peppa => "Peppa Pig",
            StoryStyle::HarryPotter => "Harry Potter",
            StoryStyle::Disney => "Disney",
            StoryStyle::Adventure => "Adventure",
            StoryStyle::Science => "Science fiction",
            StoryStyle::Funny => "Funny",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            StoryStyle::Peppa => "A warm family story for young children",
            StoryStyle::HarryPotter => "An adventure in a world of magic",
            StoryStyle::Disney => "A dreamy fairy tale",
            StoryStyle::Adventure => "Bravely exploring the unknown",
            StoryStyle::Science => "Future technology and space travel",
            StoryStyle::Funny => "A light, silly everyday story",
        }
    }

    /// Style direction included in the prompt.
    pub fn instruction(&self) -> &'static str {
        match self {
            StoryStyle::Peppa => "Write a warm, cute family story in the style of Peppa Pig, featuring Peppa, George, Mummy Pig and Daddy Pig.",
            StoryStyle::HarryPotter => "Write an adventure set in the wizarding world of Harry Potter at Hogwarts, with magic, spells and fantastic creatures.",
            StoryStyle::Disney => "Write a dreamy, romantic fairy tale in the style of Disney, full of hope and suitable for the whole family.",
            StoryStyle::Adventure => "Write an exciting adventure in which the hero overcomes obstacles, explores the unknown and grows along the way.",
            StoryStyle::Science => "Write a science-fiction story that may involve space exploration, future technology, robots or time travel.",
            StoryStyle::Funny => "Write a light-hearted, funny story that makes the reader laugh.",
        }
    }

    /// Look up a style by id, falling back to Peppa for anything unknown.
    pub fn from_id(id: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|s| s.id() == id)
            .unwrap_or_else(|| {
                tracing::warn!("unknown story style '{id}', using peppa");
                StoryStyle::Peppa
            })
    }
}

impl fmt::Display for StoryStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// A word to weave into a story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryWord {
    pub source: String,
    pub target: String,
}

/// Take up to `max` words from the ledger, sampled at random when there are more.
pub fn extract_words(list: &[ReviewWord], max: usize, rng: &mut impl Rng) -> Vec<StoryWord> {
    let mut words: Vec<StoryWord> = list
        .iter()
        .map(|w| StoryWord {
            source: w.item.source.clone(),
            target: w.item.target.clone(),
        })
        .collect();
    if words.len() > max {
        words.shuffle(rng);
        words.truncate(max);
    }
    words
}

/// Build the generation prompt for a set of words.
pub fn build_prompt(words: &[StoryWord], style: StoryStyle) -> String {
    let word_list = words
        .iter()
        .map(|w| format!("{} ({})", w.source, w.target))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "{instruction}

Write an English story of 300-500 words that naturally uses every one of these words:
{word_list}

Output format (follow it exactly):
1. First, the complete English story.
2. Then a line containing only \"---\" as a separator.
3. Finally, a complete Chinese translation, matching the English sentence by sentence where possible.
4. In both versions, mark each target word in bold as **word**.

Notes:
- Keep the story fun and positive.
- Use simple language suitable for learners of English.
- Every target word must appear in the story at least once.",
        instruction = style.instruction(),
    )
}

/// A generated story split into its two languages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Story {
    /// The full reply as received.
    pub raw: String,
    pub english: String,
    /// `None` when the reply had no separator or nothing after it.
    pub chinese: Option<String>,
}

fn is_separator(line: &str) -> bool {
    let line = line.trim();
    line.len() >= 3 && line.chars().all(|c| c == '-')
}

/// Split a reply on its first separator line (three or more dashes).
pub fn parse_story(text: &str) -> Story {
    let lines: Vec<&str> = text.lines().collect();
    let (english, chinese) = match lines.iter().position(|l| is_separator(l)) {
        Some(i) => {
            let chinese = lines[i + 1..].join("\n").trim().to_string();
            (
                lines[..i].join("\n").trim().to_string(),
                Some(chinese).filter(|c| !c.is_empty()),
            )
        }
        None => (text.trim().to_string(), None),
    };
    Story {
        raw: text.to_string(),
        english,
        chinese,
    }
}

impl Story {
    /// Bold-marked words in the English text, first occurrence order, no repeats.
    pub fn highlighted_words(&self) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        for (bold, is_bold) in split_bold(&self.english) {
            if is_bold && !found.iter().any(|w| w == bold) {
                found.push(bold.to_string());
            }
        }
        found
    }

    /// HTML fragment with both languages in their own sections.
    pub fn to_html(&self) -> String {
        let chinese = match &self.chinese {
            Some(text) => markdown_to_html(text),
            None => "<p>No translation available.</p>".to_string(),
        };
        format!(
            "<section class=\"story-en\">{}</section>\n<section class=\"story-zh\">{}</section>",
            markdown_to_html(&self.english),
            chinese
        )
    }

    /// English paragraphs with markup removed, ready for a speaker.
    pub fn speech_chunks(&self) -> Vec<String> {
        chunk_paragraphs(&strip_markup(&self.english))
    }

    /// Chinese paragraphs with markup removed, empty without a translation.
    pub fn translation_speech_chunks(&self) -> Vec<String> {
        self.chinese
            .as_deref()
            .map(|c| chunk_paragraphs(&strip_markup(c)))
            .unwrap_or_default()
    }
}

/// Remove bold markers.
pub fn strip_markup(text: &str) -> String {
    text.replace("**", "")
}

/// Split text into `(segment, is_bold)` pieces on `**` pairs.
/// An unmatched trailing `**` is kept as literal text.
fn split_bold(text: &str) -> Vec<(&str, bool)> {
    let mut parts = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("**") {
        let after = &rest[open + 2..];
        match after.find("**") {
            Some(close) if close > 0 => {
                parts.push((&rest[..open], false));
                parts.push((&after[..close], true));
                rest = &after[close + 2..];
            }
            _ => break,
        }
    }
    parts.push((rest, false));
    parts
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Minimal markdown to HTML: bold, `#` headings, paragraphs and line breaks.
pub fn markdown_to_html(md: &str) -> String {
    if md.is_empty() {
        return String::new();
    }

    let escaped = escape_html(md);
    let lines: Vec<String> = escaped
        .split('\n')
        .map(|line| {
            let mut html = String::new();
            for (segment, bold) in split_bold(line) {
                if bold {
                    html.push_str("<strong class=\"highlight-word\">");
                    html.push_str(segment);
                    html.push_str("</strong>");
                } else {
                    html.push_str(segment);
                }
            }
            if let Some(h) = html.strip_prefix("### ") {
                format!("<h4>{h}</h4>")
            } else if let Some(h) = html.strip_prefix("## ") {
                format!("<h3>{h}</h3>")
            } else if let Some(h) = html.strip_prefix("# ") {
                format!("<h2>{h}</h2>")
            } else {
                html
            }
        })
        .collect();

    let body = lines
        .join("\n")
        .replace("\n\n", "</p><p>")
        .replace('\n', "<br>");
    format!("<p>{body}</p>")
}

/// Releases the in-flight flag when a generation ends, however it ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Generates stories through a provider, one at a time.
pub struct StoryGenerator {
    provider: Arc<dyn LlmProvider>,
    max_tokens: u32,
    temperature: f64,
    busy: AtomicBool,
}

impl StoryGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: 1.0,
            busy: AtomicBool::new(false),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Generate a story. Fails fast, before any request, when another
    /// generation is running, there are no words, or credentials are missing.
    pub async fn generate(
        &self,
        words: &[StoryWord],
        style: StoryStyle,
        model: &str,
    ) -> Result<Story, StoryError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(StoryError::Busy);
        }
        let _guard = BusyGuard(&self.busy);

        if words.is_empty() {
            return Err(StoryError::NoWords);
        }
        if !self.provider.has_credentials() {
            return Err(StoryError::MissingApiKey(self.provider.name().to_string()));
        }

        let request = GenerateRequest {
            model: model.to_string(),
            prompt: build_prompt(words, style),
            system_prompt: Some(STORY_SYSTEM_PROMPT.to_string()),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        tracing::info!(
            provider = self.provider.name(),
            model,
            style = %style,
            words = words.len(),
            "generating story"
        );
        let response = self.provider.generate(&request).await?;
        tracing::debug!(
            latency_ms = response.latency_ms,
            tokens = response.token_usage.total_tokens,
            "story generated"
        );
        Ok(parse_story(&response.content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VocabItem;
    use crate::traits::{GenerateResponse, ModelInfo, TokenUsage};
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;
    use std::time::Duration;

    struct FakeProvider {
        reply: String,
        credentials: bool,
        delay: Option<Duration>,
        calls: AtomicU32,
        last_prompt: Mutex<Option<String>>,
    }

    impl FakeProvider {
        fn replying(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                credentials: true,
                delay: None,
                calls: AtomicU32::new(0),
                last_prompt: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for FakeProvider {
        fn name(&self) -> &str {
            "fake"
        }

        async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = Some(request.prompt.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.reply.is_empty() {
                anyhow::bail!("upstream exploded");
            }
            Ok(GenerateResponse {
                content: self.reply.clone(),
                model: request.model.clone(),
                token_usage: TokenUsage::default(),
                latency_ms: 1,
            })
        }

        fn available_models(&self) -> Vec<ModelInfo> {
            vec![]
        }

        fn has_credentials(&self) -> bool {
            self.credentials
        }
    }

    fn words() -> Vec<StoryWord> {
        vec![
            StoryWord {
                source: "apple".into(),
                target: "苹果".into(),
            },
            StoryWord {
                source: "brave".into(),
                target: "勇敢的".into(),
            },
        ]
    }

    const REPLY: &str = "# The **Apple**\n\nPeppa found an **apple**.\nShe was **brave**.\n---\n佩奇找到了一个**苹果**。";

    #[test]
    fn unknown_style_falls_back_to_peppa() {
        assert_eq!(StoryStyle::from_id("harry_potter"), StoryStyle::HarryPotter);
        assert_eq!(StoryStyle::from_id("noir"), StoryStyle::Peppa);
    }

    #[test]
    fn prompt_lists_words_and_format() {
        let prompt = build_prompt(&words(), StoryStyle::Science);
        assert!(prompt.contains("apple (苹果), brave (勇敢的)"));
        assert!(prompt.contains("300-500 words"));
        assert!(prompt.contains("\"---\""));
        assert!(prompt.contains("**word**"));
        assert!(prompt.contains("science-fiction"));
    }

    #[test]
    fn extract_samples_when_over_limit() {
        let list: Vec<ReviewWord> = (0..25)
            .map(|i| ReviewWord {
                item: VocabItem::new(format!("w{i}"), format!("s{i}"), format!("t{i}")),
                level: 0,
                stats: Default::default(),
            })
            .collect();
        let mut rng = StdRng::seed_from_u64(1);
        let sampled = extract_words(&list, 10, &mut rng);
        assert_eq!(sampled.len(), 10);
        let mut sources: Vec<_> = sampled.iter().map(|w| w.source.clone()).collect();
        sources.sort();
        sources.dedup();
        assert_eq!(sources.len(), 10);

        let few = extract_words(&list[..3], 10, &mut rng);
        assert_eq!(few.len(), 3);
        assert_eq!(few[0].source, "s0");
    }

    #[test]
    fn parse_splits_on_first_separator() {
        let story = parse_story(REPLY);
        assert!(story.english.ends_with("She was **brave**."));
        assert_eq!(story.chinese.as_deref(), Some("佩奇找到了一个**苹果**。"));

        let long_rule = parse_story("Hello\n  -----  \nWorld\n---\nmore");
        assert_eq!(long_rule.english, "Hello");
        assert_eq!(long_rule.chinese.as_deref(), Some("World\n---\nmore"));
    }

    #[test]
    fn missing_separator_means_no_translation() {
        let story = parse_story("Just an English story.");
        assert_eq!(story.english, "Just an English story.");
        assert_eq!(story.chinese, None);
        assert!(story.to_html().contains("No translation available."));
        assert!(story.translation_speech_chunks().is_empty());
    }

    #[test]
    fn highlighted_words_are_unique_in_order() {
        let story = parse_story(REPLY);
        assert_eq!(story.highlighted_words(), vec!["Apple", "apple", "brave"]);
    }

    #[test]
    fn html_escapes_and_formats() {
        let html = markdown_to_html("# Title\n\nA <b> & **word**\nnext");
        assert_eq!(
            html,
            "<p><h2>Title</h2></p><p>A &lt;b&gt; &amp; <strong class=\"highlight-word\">word</strong><br>next</p>"
        );
        assert_eq!(markdown_to_html(""), "");
        assert_eq!(markdown_to_html("odd ** marker"), "<p>odd ** marker</p>");
    }

    #[test]
    fn speech_chunks_strip_markup() {
        let story = parse_story(REPLY);
        let chunks = story.speech_chunks();
        assert_eq!(chunks[0], "# The Apple");
        assert_eq!(chunks[2], "She was brave.");
    }

    #[tokio::test]
    async fn generator_parses_reply() {
        let provider = Arc::new(FakeProvider::replying(REPLY));
        let generator = StoryGenerator::new(provider.clone());
        let story = generator
            .generate(&words(), StoryStyle::Funny, "m")
            .await
            .unwrap();
        assert!(story.chinese.is_some());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        let prompt = provider.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("funny"));
        assert!(!generator.is_busy());
    }

    #[tokio::test]
    async fn generator_rejects_before_calling_provider() {
        let provider = Arc::new(FakeProvider::replying(REPLY));
        let generator = StoryGenerator::new(provider.clone());
        assert!(matches!(
            generator.generate(&[], StoryStyle::Peppa, "m").await,
            Err(StoryError::NoWords)
        ));

        let keyless = Arc::new(FakeProvider {
            credentials: false,
            ..FakeProvider::replying(REPLY)
        });
        let generator = StoryGenerator::new(keyless.clone());
        assert!(matches!(
            generator.generate(&words(), StoryStyle::Peppa, "m").await,
            Err(StoryError::MissingApiKey(_))
        ));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(keyless.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn provider_failure_is_reported_and_clears_busy() {
        let generator = StoryGenerator::new(Arc::new(FakeProvider::replying("")));
        let err = generator
            .generate(&words(), StoryStyle::Peppa, "m")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("upstream exploded"));
        assert!(!generator.is_busy());
    }

    #[tokio::test]
    async fn concurrent_generation_is_busy() {
        let provider = Arc::new(FakeProvider {
            delay: Some(Duration::from_millis(50)),
            ..FakeProvider::replying(REPLY)
        });
        let generator = StoryGenerator::new(provider.clone());
        let words = words();
        let (first, second) = tokio::join!(
            generator.generate(&words, StoryStyle::Peppa, "m"),
            generator.generate(&words, StoryStyle::Peppa, "m"),
        );
        let busy = [&first, &second]
            .iter()
            .filter(|r| matches!(r, Err(StoryError::Busy)))
            .count();
        assert_eq!(busy, 1);
        assert!(first.is_ok() || second.is_ok());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}
