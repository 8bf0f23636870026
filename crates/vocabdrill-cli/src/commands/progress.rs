//! The `vocabdrill progress` command.

use anyhow::Result;

use vocabdrill_core::progress::load_progress;
use vocabdrill_core::store::StorageKeys;

pub fn execute(global: &super::GlobalOpts, user: Option<String>) -> Result<()> {
    let config = global.load_config()?;
    let store = global.open_store(&config);
    let keys = StorageKeys::default();
    let user = super::resolve_user(&store, &keys, user)?;

    let progress = load_progress(&store, &keys, &user);
    println!("Learner: {user}");
    println!("Level: {}", progress.level);
    println!(
        "Answered: {} ({} correct, {:.1}%)",
        progress.total_answered,
        progress.total_correct,
        progress.accuracy() * 100.0
    );
    Ok(())
}
