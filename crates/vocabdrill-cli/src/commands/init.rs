//! The `vocabdrill init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    if Path::new("vocabdrill.toml").exists() {
        println!("vocabdrill.toml already exists, skipping.");
    } else {
        std::fs::write("vocabdrill.toml", SAMPLE_CONFIG)?;
        println!("Created vocabdrill.toml");
    }

    std::fs::create_dir_all("catalogs")?;
    let catalog_path = Path::new(super::DEFAULT_CATALOG_PATH);
    if catalog_path.exists() {
        println!("{} already exists, skipping.", catalog_path.display());
    } else {
        std::fs::write(catalog_path, STARTER_CATALOG)?;
        println!("Created {}", catalog_path.display());
    }

    println!("\nNext steps:");
    println!("  1. Run: vocabdrill validate --catalog catalogs/starter.json");
    println!("  2. Run: vocabdrill play --user <your-name>");
    println!("  3. Set ANTHROPIC_API_KEY and run: vocabdrill story");

    Ok(())
}

const STARTER_CATALOG: &str = include_str!("../../../../catalogs/starter.json");

const SAMPLE_CONFIG: &str = r#"# vocabdrill configuration

default_provider = "anthropic"
default_direction = "en-zh"
data_dir = "./vocabdrill-data"
catalog = "catalogs/starter.json"
# speak_command = "espeak -v {lang}"

[rules]
correct_to_level_up = 10
streak_to_level_down = 3
min_level = 0
max_level = 10

[ledger]
auto_save = true
remove_on_correct = true
track_stats = true

[display]
show_icon = true
show_example = true
auto_speak = true
speak_delay_ms = 300
correct_display_ms = 1500
wrong_display_ms = 2000

[story]
default_style = "peppa"
default_model = "claude-sonnet-4-20250514"
max_words = 10
max_tokens = 2048

[providers.anthropic]
type = "anthropic"
api_key = "${ANTHROPIC_API_KEY}"

[providers.openai]
type = "openai"
api_key = "${OPENAI_API_KEY}"

[providers.offline]
type = "mock"
"#;
