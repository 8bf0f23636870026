//! The `vocabdrill story` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use vocabdrill_core::speech::Speaker;
use vocabdrill_core::story::{extract_words, Story, StoryGenerator, StoryStyle};
use vocabdrill_providers::{create_provider, VocabdrillConfig};

use crate::speaker::CommandSpeaker;

pub struct StoryOptions {
    pub user: Option<String>,
    pub catalog: Option<PathBuf>,
    pub style: Option<StoryStyle>,
    pub model: Option<String>,
    pub provider: Option<String>,
    pub output: Option<PathBuf>,
    pub html: Option<PathBuf>,
    pub speak: bool,
}

pub async fn execute(global: &super::GlobalOpts, opts: StoryOptions) -> Result<()> {
    let config = global.load_config()?;
    let store = global.open_store(&config);
    let catalog_id = super::catalog_id(&config, opts.catalog)?;
    let ledger = super::open_ledger(store, &config, &catalog_id);
    let user = super::resolve_user(ledger.store(), ledger.keys(), opts.user)?;

    let review_words = ledger.list(&user);
    let words = extract_words(&review_words, config.story.max_words, &mut rand::thread_rng());
    if words.is_empty() {
        anyhow::bail!("the wrong-word ledger for '{user}' is empty; play a few rounds first");
    }

    let provider_name = opts
        .provider
        .unwrap_or_else(|| config.default_provider.clone());
    let provider = create_provider(&config.resolve_provider(&provider_name)?)?;
    let model = opts.model.unwrap_or_else(|| {
        let default = &config.story.default_model;
        let offered = provider.available_models();
        if offered.is_empty() || offered.iter().any(|m| &m.id == default) {
            default.clone()
        } else {
            offered[0].id.clone()
        }
    });
    let style = opts.style.unwrap_or(config.story.default_style);

    let generator = StoryGenerator::new(Arc::from(provider))
        .with_max_tokens(config.story.max_tokens)
        .with_temperature(config.story.temperature);

    println!(
        "Writing a {} story with {} word(s) using {}/{model}...",
        style.name(),
        words.len(),
        generator.provider_name()
    );
    let story = generator.generate(&words, style, &model).await?;

    println!("\n{}", story.english);
    println!("\n{}\n", "-".repeat(40));
    match &story.chinese {
        Some(chinese) => println!("{chinese}"),
        None => println!("(no translation available)"),
    }

    let highlighted = story.highlighted_words();
    let used = words
        .iter()
        .filter(|w| highlighted.iter().any(|h| h.eq_ignore_ascii_case(&w.source)))
        .count();
    println!("\n{used}/{} ledger word(s) highlighted in the story.", words.len());

    if let Some(path) = &opts.output {
        std::fs::write(path, &story.raw)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Story saved to {}", path.display());
    }
    if let Some(path) = &opts.html {
        std::fs::write(path, story.to_html())
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("HTML saved to {}", path.display());
    }

    if opts.speak {
        speak_story(&story, &config).await;
    }

    Ok(())
}

/// Queue the English paragraphs, then the translation, on the configured
/// speak command.
async fn speak_story(story: &Story, config: &VocabdrillConfig) {
    let Some(speaker) = config.speak_command.as_deref().and_then(CommandSpeaker::new) else {
        tracing::warn!("--speak given but no speak_command is configured");
        return;
    };
    let tts = &config.tts;
    let chunks = story
        .speech_chunks()
        .into_iter()
        .map(|c| (c, "en"))
        .chain(story.translation_speech_chunks().into_iter().map(|c| (c, "zh")));
    for (i, (chunk, lang)) in chunks.enumerate() {
        let pause = if i == 0 { 0 } else { tts.pause_between_ms };
        speaker.speak(&tts.utterance(&chunk, lang, pause));
    }
    speaker.wait().await;
}
