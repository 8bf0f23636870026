//! The `vocabdrill ledger` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{Cell, Table};

use vocabdrill_core::ledger::LedgerEntry;

#[derive(Subcommand)]
pub enum LedgerAction {
    /// Show every word in the ledger
    List,
    /// Print how many words are in the ledger
    Count,
    /// Remove every word from the ledger
    Clear,
    /// Write the ledger document as JSON
    Export {
        /// File to write (stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Replace the ledger with entries from an exported file
    Import {
        /// JSON file produced by `ledger export`
        file: PathBuf,
    },
    /// Remove one word by id
    Remove {
        word_id: String,
    },
}

pub fn execute(
    global: &super::GlobalOpts,
    user: Option<String>,
    catalog: Option<PathBuf>,
    action: LedgerAction,
) -> Result<()> {
    let config = global.load_config()?;
    let store = global.open_store(&config);
    let catalog_id = super::catalog_id(&config, catalog)?;
    let ledger = super::open_ledger(store, &config, &catalog_id);
    let user = super::resolve_user(ledger.store(), ledger.keys(), user)?;

    match action {
        LedgerAction::List => {
            let entries = ledger.entries(&user);
            if entries.is_empty() {
                println!("The ledger for '{user}' is empty.");
            } else {
                println!("{}", entries_table(&entries));
                println!("{} word(s).", entries.len());
            }
        }
        LedgerAction::Count => println!("{}", ledger.count(&user)),
        LedgerAction::Clear => {
            let count = ledger.count(&user);
            ledger.clear(&user)?;
            println!("Cleared {count} word(s) from the ledger for '{user}'.");
        }
        LedgerAction::Export { output } => {
            let doc = ledger.export(&user)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &doc)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!(
                        "Exported {} word(s) to {}",
                        ledger.count(&user),
                        path.display()
                    );
                }
                None => println!("{doc}"),
            }
        }
        LedgerAction::Import { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let report = ledger.import_batch(&user, &raw);
            if !report.success {
                anyhow::bail!("import failed: {}", report.message);
            }
            println!("{}", report.message);
            println!(
                "Imported {} of {} entries; the ledger now has {} word(s).",
                report.imported_count,
                report.supplied_count,
                ledger.count(&user)
            );
        }
        LedgerAction::Remove { word_id } => {
            if ledger.remove(&user, &word_id)? {
                println!("Removed {word_id}.");
            } else {
                anyhow::bail!("no ledger entry with id '{word_id}'");
            }
        }
    }

    Ok(())
}

fn entries_table(entries: &[LedgerEntry]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Word", "Translation", "Level", "Errors", "Correct", "Last error",
    ]);
    for entry in entries {
        let last_error = entry
            .stats
            .last_error_time
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(&entry.word_id),
            Cell::new(format!(
                "{}{}",
                entry.word.icon.as_deref().map(|i| format!("{i} ")).unwrap_or_default(),
                entry.word.source
            )),
            Cell::new(&entry.word.target),
            Cell::new(entry.level),
            Cell::new(entry.stats.error_count),
            Cell::new(entry.stats.correct_count),
            Cell::new(last_error),
        ]);
    }
    table
}
