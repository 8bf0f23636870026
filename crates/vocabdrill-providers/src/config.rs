//! Application configuration and provider factory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use vocabdrill_core::engine::Rules;
use vocabdrill_core::ledger::LedgerPolicy;
use vocabdrill_core::model::Direction;
use vocabdrill_core::settings::DisplaySettings;
use vocabdrill_core::speech::SpeechSettings;
use vocabdrill_core::story::{StoryStyle, DEFAULT_MAX_TOKENS, DEFAULT_MAX_WORDS, DEFAULT_STORY_MODEL};
use vocabdrill_core::traits::LlmProvider;

use crate::anthropic::AnthropicProvider;
use crate::mock::MockProvider;
use crate::openai::OpenAiProvider;

/// Configuration for a single text-generation provider.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    Anthropic {
        #[serde(default)]
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
    },
    OpenAI {
        #[serde(default)]
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        org_id: Option<String>,
    },
    /// Offline provider answering with canned text.
    Mock {
        #[serde(default)]
        response: Option<String>,
    },
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::Anthropic { api_key, base_url } => f
                .debug_struct("Anthropic")
                .field("api_key", &mask_api_key(api_key))
                .field("base_url", base_url)
                .finish(),
            ProviderConfig::OpenAI {
                api_key,
                base_url,
                org_id,
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &mask_api_key(api_key))
                .field("base_url", base_url)
                .field("org_id", org_id)
                .finish(),
            ProviderConfig::Mock { response } => f
                .debug_struct("Mock")
                .field("response", &response.as_ref().map(|r| r.len()))
                .finish(),
        }
    }
}

impl ProviderConfig {
    /// Provider kind as written in the `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderConfig::Anthropic { .. } => "anthropic",
            ProviderConfig::OpenAI { .. } => "openai",
            ProviderConfig::Mock { .. } => "mock",
        }
    }
}

/// Shorten an API key for display: `sk-ant-...wxyz`.
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    match chars.len() {
        0 => String::new(),
        n if n <= 8 => "****".to_string(),
        n => {
            let head: String = chars[..7].iter().collect();
            let tail: String = chars[n - 4..].iter().collect();
            format!("{head}...{tail}")
        }
    }
}

/// Story generation defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryConfig {
    pub default_style: StoryStyle,
    pub default_model: String,
    /// Words sampled from the ledger per story.
    pub max_words: usize,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            default_style: StoryStyle::default(),
            default_model: DEFAULT_STORY_MODEL.to_string(),
            max_words: DEFAULT_MAX_WORDS,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: 1.0,
        }
    }
}

/// Top-level vocabdrill configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabdrillConfig {
    #[serde(default)]
    pub rules: Rules,
    #[serde(default)]
    pub ledger: LedgerPolicy,
    #[serde(default)]
    pub display: DisplaySettings,
    #[serde(default)]
    pub tts: SpeechSettings,
    #[serde(default)]
    pub story: StoryConfig,
    /// Provider configurations keyed by name.
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default = "default_provider")]
    pub default_provider: String,
    #[serde(default)]
    pub default_direction: Direction,
    /// Directory holding the per-user documents.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Catalog used when `--catalog` is not given.
    #[serde(default)]
    pub catalog: Option<PathBuf>,
    /// External command used to speak, e.g. `espeak -v {lang}`.
    #[serde(default)]
    pub speak_command: Option<String>,
}

fn default_provider() -> String {
    "anthropic".to_string()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./vocabdrill-data")
}

impl Default for VocabdrillConfig {
    fn default() -> Self {
        Self {
            rules: Rules::default(),
            ledger: LedgerPolicy::default(),
            display: DisplaySettings::default(),
            tts: SpeechSettings::default(),
            story: StoryConfig::default(),
            providers: HashMap::new(),
            default_provider: default_provider(),
            default_direction: Direction::default(),
            data_dir: default_data_dir(),
            catalog: None,
            speak_command: None,
        }
    }
}

impl VocabdrillConfig {
    /// Look up a provider by name.
    ///
    /// `anthropic` and `openai` are always available, with an empty key when
    /// not configured, so a missing key is reported by the story generator
    /// rather than as an unknown provider.
    pub fn resolve_provider(&self, name: &str) -> Result<ProviderConfig> {
        if let Some(config) = self.providers.get(name) {
            return Ok(config.clone());
        }
        match name {
            "anthropic" => Ok(ProviderConfig::Anthropic {
                api_key: String::new(),
                base_url: None,
            }),
            "openai" => Ok(ProviderConfig::OpenAI {
                api_key: String::new(),
                base_url: None,
                org_id: None,
            }),
            "mock" => Ok(ProviderConfig::Mock { response: None }),
            other => {
                let mut known: Vec<&str> = self.providers.keys().map(String::as_str).collect();
                known.sort_unstable();
                anyhow::bail!(
                    "unknown provider '{other}' (configured: {})",
                    if known.is_empty() {
                        "none".to_string()
                    } else {
                        known.join(", ")
                    }
                )
            }
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_provider_config(config: &ProviderConfig) -> ProviderConfig {
    match config {
        ProviderConfig::Anthropic { api_key, base_url } => ProviderConfig::Anthropic {
            api_key: resolve_env_vars(api_key),
            base_url: base_url.as_ref().map(|u| resolve_env_vars(u)),
        },
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            org_id,
        } => ProviderConfig::OpenAI {
            api_key: resolve_env_vars(api_key),
            base_url: base_url.as_ref().map(|u| resolve_env_vars(u)),
            org_id: org_id.as_ref().map(|o| resolve_env_vars(o)),
        },
        ProviderConfig::Mock { response } => ProviderConfig::Mock {
            response: response.clone(),
        },
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `vocabdrill.toml` in the current directory
/// 2. `~/.config/vocabdrill/config.toml`
///
/// Environment variable overrides: `VOCABDRILL_ANTHROPIC_KEY`, `VOCABDRILL_OPENAI_KEY`.
pub fn load_config() -> Result<VocabdrillConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<VocabdrillConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("vocabdrill.toml");
            if local.exists() {
                Some(local)
            } else {
                global_config_dir()
                    .map(|dir| dir.join("config.toml"))
                    .filter(|p| p.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!("loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<VocabdrillConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => VocabdrillConfig::default(),
    };

    if let Ok(key) = std::env::var("VOCABDRILL_ANTHROPIC_KEY") {
        let entry = config
            .providers
            .entry("anthropic".into())
            .or_insert(ProviderConfig::Anthropic {
                api_key: String::new(),
                base_url: None,
            });
        if let ProviderConfig::Anthropic { api_key, .. } = entry {
            *api_key = key;
        }
    }

    if let Ok(key) = std::env::var("VOCABDRILL_OPENAI_KEY") {
        let entry = config
            .providers
            .entry("openai".into())
            .or_insert(ProviderConfig::OpenAI {
                api_key: String::new(),
                base_url: None,
                org_id: None,
            });
        if let ProviderConfig::OpenAI { api_key, .. } = entry {
            *api_key = key;
        }
    }

    config.providers = config
        .providers
        .iter()
        .map(|(k, v)| (k.clone(), resolve_provider_config(v)))
        .collect();

    Ok(config)
}

fn global_config_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("vocabdrill"))
}

/// Create a provider instance from its configuration.
pub fn create_provider(config: &ProviderConfig) -> Result<Box<dyn LlmProvider>> {
    tracing::debug!(?config, "creating provider");
    match config {
        ProviderConfig::Anthropic { api_key, base_url } => {
            Ok(Box::new(AnthropicProvider::new(api_key, base_url.clone())))
        }
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            org_id,
        } => Ok(Box::new(OpenAiProvider::new(
            api_key,
            base_url.clone(),
            org_id.clone(),
        ))),
        ProviderConfig::Mock { response } => Ok(Box::new(match response {
            Some(text) => MockProvider::with_fixed_response(text),
            None => MockProvider::new(HashMap::new()),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_VOCABDRILL_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_VOCABDRILL_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_VOCABDRILL_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("no vars"), "no vars");
        assert_eq!(resolve_env_vars("${unterminated"), "${unterminated");
        std::env::remove_var("_VOCABDRILL_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = VocabdrillConfig::default();
        assert_eq!(config.default_provider, "anthropic");
        assert_eq!(config.default_direction, Direction::SourceToTarget);
        assert_eq!(config.rules.correct_to_level_up, 10);
        assert_eq!(config.rules.streak_to_level_down, 3);
        assert!(config.ledger.auto_save && config.ledger.remove_on_correct);
        assert_eq!(config.display.speak_delay_ms, 300);
        assert_eq!(config.story.max_words, 10);
        assert_eq!(config.story.max_tokens, 2048);
        assert_eq!(config.data_dir, PathBuf::from("./vocabdrill-data"));
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
default_provider = "openai"
default_direction = "zh-en"
data_dir = "/tmp/vd"
catalog = "catalogs/starter.json"
speak_command = "espeak -v {lang}"

[rules]
correct_to_level_up = 5

[ledger]
remove_on_correct = false

[display]
auto_speak = false

[story]
default_style = "harry_potter"
max_words = 6

[providers.anthropic]
type = "anthropic"
api_key = "sk-test"

[providers.openai]
type = "openai"
api_key = "sk-openai"
org_id = "org-1"

[providers.offline]
type = "mock"
response = "Tom ate an **apple**.\n---\n汤姆吃了一个**苹果**。"
"#;
        let config: VocabdrillConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.providers.len(), 3);
        assert_eq!(config.default_direction, Direction::TargetToSource);
        assert_eq!(config.rules.correct_to_level_up, 5);
        assert_eq!(config.rules.streak_to_level_down, 3);
        assert!(!config.ledger.remove_on_correct);
        assert!(config.ledger.auto_save);
        assert!(!config.display.auto_speak);
        assert_eq!(config.display.correct_display_ms, 1500);
        assert_eq!(config.story.default_style, StoryStyle::HarryPotter);
        assert_eq!(config.story.max_words, 6);
        assert_eq!(config.story.default_model, DEFAULT_STORY_MODEL);
        assert!(matches!(
            config.providers.get("offline"),
            Some(ProviderConfig::Mock { response: Some(_) })
        ));
    }

    #[test]
    fn debug_masks_api_keys() {
        let config = ProviderConfig::Anthropic {
            api_key: "sk-ant-REDACTED".into(),
            base_url: None,
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("secretsecret"));
        assert!(debug.contains("sk-ant-...abcd"));
    }

    #[test]
    fn mask_api_key_lengths() {
        assert_eq!(mask_api_key(""), "");
        assert_eq!(mask_api_key("short"), "****");
        assert_eq!(mask_api_key("12345678"), "****");
        assert_eq!(mask_api_key("sk-proj-1234567890"), "sk-proj...7890");
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let err = load_config_from(Some(Path::new("/nonexistent/vocabdrill.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn explicit_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "default_provider = \"mock\"\n[rules]\nmax_level = 4\n").unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.default_provider, "mock");
        assert_eq!(config.rules.max_level, 4);
    }

    #[test]
    fn unconfigured_builtin_providers_resolve_with_empty_keys() {
        let config = VocabdrillConfig::default();
        match config.resolve_provider("anthropic").unwrap() {
            ProviderConfig::Anthropic { api_key, .. } => assert!(api_key.is_empty()),
            other => panic!("unexpected provider: {other:?}"),
        }
        assert_eq!(config.resolve_provider("openai").unwrap().kind(), "openai");
        let err = config.resolve_provider("gemini").unwrap_err();
        assert!(err.to_string().contains("unknown provider 'gemini'"));
    }

    #[test]
    fn created_providers_report_credentials() {
        let empty = create_provider(&ProviderConfig::Anthropic {
            api_key: String::new(),
            base_url: None,
        })
        .unwrap();
        assert_eq!(empty.name(), "anthropic");
        assert!(!empty.has_credentials());

        let mock = create_provider(&ProviderConfig::Mock { response: None }).unwrap();
        assert_eq!(mock.name(), "mock");
        assert!(mock.has_credentials());
    }
}
