//! vocabdrill-providers: remote text generation and application config.
//!
//! Implements the `LlmProvider` trait for Anthropic and OpenAI-compatible
//! APIs (plus a mock for tests and offline demos), and loads the
//! `vocabdrill.toml` configuration that selects between them.

pub mod anthropic;
pub mod config;
pub mod error;
pub mod mock;
pub mod openai;

pub use config::{
    create_provider, load_config, load_config_from, mask_api_key, ProviderConfig, StoryConfig,
    VocabdrillConfig,
};
pub use error::ProviderError;
pub use mock::MockProvider;
