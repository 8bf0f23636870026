//! The `vocabdrill list-models` command.

use anyhow::Result;

use vocabdrill_providers::create_provider;

pub fn execute(global: &super::GlobalOpts, provider_filter: Option<String>) -> Result<()> {
    let config = global.load_config()?;

    let mut names: Vec<String> = match provider_filter {
        Some(name) => vec![name],
        None => {
            let mut names: Vec<String> = config.providers.keys().cloned().collect();
            if !names.contains(&config.default_provider) {
                names.push(config.default_provider.clone());
            }
            names
        }
    };
    names.sort();

    for name in &names {
        let provider_config = config.resolve_provider(name)?;
        let provider = create_provider(&provider_config)?;
        let credentials = if provider.has_credentials() {
            ""
        } else {
            " (no API key configured)"
        };

        println!("Provider: {name}{credentials}");
        for model in provider.available_models() {
            let marker = if model.id == config.story.default_model {
                " [default]"
            } else {
                ""
            };
            println!(
                "  {} — {} ({}K context){marker}",
                model.id,
                model.name,
                model.max_context / 1000,
            );
        }
        println!();
    }

    Ok(())
}
