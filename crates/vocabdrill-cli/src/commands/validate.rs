//! The `vocabdrill validate` command.

use std::path::PathBuf;

use anyhow::Result;

use vocabdrill_core::catalog::validate_catalog;

pub fn execute(catalog_path: PathBuf) -> Result<()> {
    let catalog = super::open_catalog(&catalog_path)?;

    let levels = catalog
        .level_range()
        .map(|r| format!("levels {}-{}", r.start(), r.end()))
        .unwrap_or_else(|| "no levels".to_string());
    println!(
        "Catalog: {} [{}] ({} words, {levels})",
        catalog.meta.name,
        catalog.meta.id,
        catalog.total_words()
    );

    let warnings = validate_catalog(&catalog);
    for w in &warnings {
        let prefix = match (&w.level, &w.word_id) {
            (Some(level), Some(id)) => format!("  [L{level} {id}]"),
            (Some(level), None) => format!("  [L{level}]"),
            _ => "  ".to_string(),
        };
        println!("{prefix} WARNING: {}", w.message);
    }

    if warnings.is_empty() {
        println!("Catalog valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
