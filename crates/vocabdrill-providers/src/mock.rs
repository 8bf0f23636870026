//! Mock provider for tests and offline demos.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use vocabdrill_core::traits::{GenerateRequest, GenerateResponse, LlmProvider, ModelInfo, TokenUsage};

/// Canned story used when nothing else is configured.
pub const DEFAULT_MOCK_STORY: &str = "Peppa found a shiny **apple** in the garden.\n\"Look, George!\" she said.\n---\n佩奇在花园里找到了一个闪亮的**苹果**。\n“看，乔治！”她说。";

/// A provider that answers from fixed text without any network access.
///
/// Responses are chosen by prompt substring, falling back to a default.
pub struct MockProvider {
    /// Map of prompt substring → response text.
    responses: HashMap<String, String>,
    default_response: String,
    call_count: AtomicU32,
    last_request: Mutex<Option<GenerateRequest>>,
}

impl MockProvider {
    /// Create a new mock provider with the given prompt→response mappings.
    pub fn new(responses: HashMap<String, String>) -> Self {
        Self {
            responses,
            default_response: DEFAULT_MOCK_STORY.to_string(),
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Create a mock that always returns the same response.
    pub fn with_fixed_response(response: &str) -> Self {
        Self {
            default_response: response.to_string(),
            ..Self::new(HashMap::new())
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<GenerateRequest> {
        self.last_request.lock().ok().and_then(|r| r.clone())
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }

        let content = self
            .responses
            .iter()
            .find(|(key, _)| request.prompt.contains(key.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| self.default_response.clone());

        // Rough estimate
        let prompt_tokens = (request.prompt.len() / 4) as u32;
        let completion_tokens = (content.len() / 4) as u32;

        Ok(GenerateResponse {
            content,
            model: request.model.clone(),
            token_usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            latency_ms: 1,
        })
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![ModelInfo {
            id: "mock-model".into(),
            name: "Mock Model".into(),
            provider: "mock".into(),
            max_context: 100_000,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vocabdrill_core::story::{StoryGenerator, StoryStyle, StoryWord};

    fn request(prompt: &str) -> GenerateRequest {
        GenerateRequest {
            model: "mock-model".into(),
            prompt: prompt.into(),
            system_prompt: None,
            max_tokens: 100,
            temperature: 1.0,
        }
    }

    #[tokio::test]
    async fn fixed_response() {
        let provider = MockProvider::with_fixed_response("hello");
        let response = provider.generate(&request("anything")).await.unwrap();
        assert_eq!(response.content, "hello");
        assert_eq!(provider.call_count(), 1);
        assert_eq!(provider.last_request().unwrap().prompt, "anything");
    }

    #[tokio::test]
    async fn prompt_matching() {
        let mut responses = HashMap::new();
        responses.insert("Hogwarts".to_string(), "A wizard story.".to_string());
        let provider = MockProvider::new(responses);

        let matched = provider.generate(&request("set at Hogwarts")).await.unwrap();
        assert_eq!(matched.content, "A wizard story.");
        let fallback = provider.generate(&request("Peppa")).await.unwrap();
        assert_eq!(fallback.content, DEFAULT_MOCK_STORY);
    }

    #[tokio::test]
    async fn drives_the_story_generator() {
        let provider = Arc::new(MockProvider::new(HashMap::new()));
        let generator = StoryGenerator::new(provider.clone());
        let words = vec![StoryWord {
            source: "apple".into(),
            target: "苹果".into(),
        }];
        let story = generator
            .generate(&words, StoryStyle::Peppa, "mock-model")
            .await
            .unwrap();
        assert_eq!(story.highlighted_words(), vec!["apple"]);
        assert!(story.chinese.unwrap().contains("**苹果**"));
        let sent = provider.last_request().unwrap();
        assert!(sent.prompt.contains("apple (苹果)"));
        assert!(sent.system_prompt.is_some());
    }
}
