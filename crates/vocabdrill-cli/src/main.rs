//! vocabdrill CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use vocabdrill_core::model::Direction;
use vocabdrill_core::story::StoryStyle;

mod commands;
mod speaker;

#[derive(Parser)]
#[command(name = "vocabdrill", version, about = "Levelled vocabulary flashcard trainer")]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for per-user data (overrides the config)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter config and catalog
    Init,

    /// Check a catalog for data gaps
    Validate {
        /// Path to a .json or .toml catalog
        #[arg(long)]
        catalog: PathBuf,
    },

    /// Practice interactively
    Play {
        /// Learner name (remembered for later runs)
        #[arg(long)]
        user: Option<String>,

        /// Catalog to practice from
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Practice direction: en-zh, zh-en or en-en
        #[arg(long)]
        direction: Option<Direction>,

        /// Start level (defaults to the saved level)
        #[arg(long)]
        level: Option<u32>,

        /// Practice the wrong-word ledger instead of the catalog
        #[arg(long)]
        review: bool,

        /// Seed for word selection and option order
        #[arg(long)]
        seed: Option<u64>,

        /// Do not add missed words to the ledger
        #[arg(long)]
        no_save: bool,

        /// Read words aloud with the configured speak command
        #[arg(long)]
        speak: bool,

        /// Pause after feedback using the display delays
        #[arg(long)]
        pace: bool,
    },

    /// Manage the wrong-word ledger
    Ledger {
        /// Learner name (defaults to the last active learner)
        #[arg(long, global = true)]
        user: Option<String>,

        /// Catalog whose ledger to manage
        #[arg(long, global = true)]
        catalog: Option<PathBuf>,

        #[command(subcommand)]
        action: commands::ledger::LedgerAction,
    },

    /// Show saved progress
    Progress {
        #[arg(long)]
        user: Option<String>,
    },

    /// Write a short story using words from the ledger
    Story {
        #[arg(long)]
        user: Option<String>,

        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Story style: peppa, harry_potter, disney, adventure, science, funny
        #[arg(long)]
        style: Option<String>,

        /// Model to use (defaults to the configured story model)
        #[arg(long)]
        model: Option<String>,

        /// Provider name from the config
        #[arg(long)]
        provider: Option<String>,

        /// Save the raw story text
        #[arg(long)]
        output: Option<PathBuf>,

        /// Save the story as an HTML fragment
        #[arg(long)]
        html: Option<PathBuf>,

        /// Read the story aloud with the configured speak command
        #[arg(long)]
        speak: bool,
    },

    /// List available models
    ListModels {
        /// Filter to specific provider
        #[arg(long)]
        provider: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match "vocabdrill=warn".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let global = commands::GlobalOpts {
        config: cli.config,
        data_dir: cli.data_dir,
    };

    let result = match cli.command {
        Commands::Init => commands::init::execute(),
        Commands::Validate { catalog } => commands::validate::execute(catalog),
        Commands::Play {
            user,
            catalog,
            direction,
            level,
            review,
            seed,
            no_save,
            speak,
            pace,
        } => commands::play::execute(
            &global,
            commands::play::PlayOptions {
                user,
                catalog,
                direction,
                level,
                review,
                seed,
                save_wrong_words: !no_save,
                speak,
                pace,
            },
        ),
        Commands::Ledger {
            user,
            catalog,
            action,
        } => commands::ledger::execute(&global, user, catalog, action),
        Commands::Progress { user } => commands::progress::execute(&global, user),
        Commands::Story {
            user,
            catalog,
            style,
            model,
            provider,
            output,
            html,
            speak,
        } => {
            commands::story::execute(
                &global,
                commands::story::StoryOptions {
                    user,
                    catalog,
                    style: style.as_deref().map(StoryStyle::from_id),
                    model,
                    provider,
                    output,
                    html,
                    speak,
                },
            )
            .await
        }
        Commands::ListModels { provider } => commands::list_models::execute(&global, provider),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
