//! The `vocabdrill play` command: an interactive session over stdin.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use vocabdrill_core::engine::{
    AnswerOutcome, EngineConfig, LevelTransition, Selection, Session, SessionStats,
};
use vocabdrill_core::error::EngineError;
use vocabdrill_core::model::{Direction, VocabItem};
use vocabdrill_core::progress::load_progress;
use vocabdrill_core::review::{commit_session, ReviewBridge};
use vocabdrill_core::settings::{load_user_settings, DisplaySettings};
use vocabdrill_core::speech::{plan_utterances, SilentSpeaker, Speaker, SpeechSettings};
use vocabdrill_core::store::{FileStore, StorageKeys};

use crate::speaker::CommandSpeaker;

pub struct PlayOptions {
    pub user: Option<String>,
    pub catalog: Option<PathBuf>,
    pub direction: Option<Direction>,
    pub level: Option<u32>,
    pub review: bool,
    pub seed: Option<u64>,
    pub save_wrong_words: bool,
    pub speak: bool,
    pub pace: bool,
}

pub fn execute(global: &super::GlobalOpts, opts: PlayOptions) -> Result<()> {
    let config = global.load_config()?;
    let store = global.open_store(&config);
    let keys = StorageKeys::default();
    let user = super::resolve_user(&store, &keys, opts.user)?;

    let catalog = Arc::new(super::open_catalog(&super::catalog_path(
        &config,
        opts.catalog,
    ))?);
    let direction = opts.direction.unwrap_or(config.default_direction);
    let engine_config = EngineConfig {
        rules: config.rules.restricted_to(&catalog),
        direction,
    };

    let (display, tts) = load_user_settings(&store, &keys, &user).resolve(&config.display, &config.tts);
    let speaker: Box<dyn Speaker> = match (opts.speak, config.speak_command.as_deref()) {
        (true, Some(template)) => match CommandSpeaker::new(template) {
            Some(speaker) => Box::new(speaker),
            None => Box::new(SilentSpeaker),
        },
        (true, None) => {
            tracing::warn!("--speak given but no speak_command is configured");
            Box::new(SilentSpeaker)
        }
        (false, _) => Box::new(SilentSpeaker),
    };

    let ledger = super::open_ledger(store.clone(), &config, &catalog.meta.id);
    let stdin = io::stdin();
    let mut term = Terminal {
        input: stdin.lock(),
        display,
        tts,
        speaker,
        pace: opts.pace,
        direction,
        source_code: catalog.meta.source_language.code.clone(),
        target_code: catalog.meta.target_language.code.clone(),
    };

    println!("Hello, {user}! {} ({})", catalog.meta.name, direction.label());
    println!("Answer with the option number or the word itself; `q` quits.");

    if opts.review {
        let bridge = match ReviewBridge::start(&ledger, &user, engine_config) {
            Ok(bridge) => bridge,
            Err(EngineError::EmptyReviewPool) => {
                anyhow::bail!("nothing to review: the wrong-word ledger for '{user}' is empty")
            }
            Err(e) => return Err(e.into()),
        };
        let mut bridge = match opts.seed {
            Some(seed) => bridge.with_seed(seed),
            None => bridge,
        };
        term.direction = bridge.session().config().direction;
        println!("Review mode: {} word(s) in your ledger.", bridge.remaining());
        let end = run(&mut bridge, &mut term)?;
        if end == LoopEnd::Exhausted {
            println!("\nEvery ledger word has been reviewed. Well done!");
        }
        let stats = bridge.session().stats();
        let remaining = ledger.count(&user);
        bridge.finish();
        print_stats(stats);
        println!("{remaining} word(s) left in your ledger.");
        return Ok(());
    }

    let start_level = match opts.level {
        Some(level) if !engine_config.rules.contains(level) => {
            return Err(EngineError::LevelOutOfRange {
                level,
                min: engine_config.rules.min_level,
                max: engine_config.rules.max_level,
            }
            .into())
        }
        Some(level) => level,
        None => load_progress(&store, &keys, &user).level,
    };
    let session = Session::normal(Arc::clone(&catalog), engine_config, start_level);
    let mut session = match opts.seed {
        Some(seed) => session.with_seed(seed),
        None => session,
    };
    println!("Starting at level {}.", session.state().current_level);

    loop {
        let end = run(&mut session, &mut term)?;
        let summary = session.summary();
        let stats = session.stats();
        let recorded = commit_session(&summary, &ledger, &store, &user, opts.save_wrong_words)
            .context("failed to save the session")?;
        print_stats(stats);
        println!(
            "Saved progress at level {}; {recorded} missed answer(s) added to your ledger.",
            summary.progress.level
        );

        if end == LoopEnd::Complete {
            println!("\nYou have cleared every level of this catalog!");
            if term.confirm("Start again from the lowest level? [y/N] ")? {
                session.restart_from_level_zero();
                continue;
            }
        }
        break;
    }
    Ok(())
}

/// Either kind of session, as seen by the prompt loop.
trait Drill {
    fn next(&mut self) -> Selection;
    fn options(&self) -> Vec<String>;
    fn answer(&mut self, selected: &str) -> Result<AnswerOutcome>;
    fn level(&self) -> Option<u32>;
    fn change_level(&mut self, level: u32) -> Result<()>;
    fn remaining(&self) -> Option<usize>;
}

impl Drill for Session {
    fn next(&mut self) -> Selection {
        self.select_next_word()
    }

    fn options(&self) -> Vec<String> {
        self.current_options().to_vec()
    }

    fn answer(&mut self, selected: &str) -> Result<AnswerOutcome> {
        Ok(self.submit_answer(selected))
    }

    fn level(&self) -> Option<u32> {
        Some(self.state().current_level)
    }

    fn change_level(&mut self, level: u32) -> Result<()> {
        Ok(Session::change_level(self, level)?)
    }

    fn remaining(&self) -> Option<usize> {
        None
    }
}

impl Drill for ReviewBridge<'_, FileStore> {
    fn next(&mut self) -> Selection {
        self.select_next_word()
    }

    fn options(&self) -> Vec<String> {
        self.current_options().to_vec()
    }

    fn answer(&mut self, selected: &str) -> Result<AnswerOutcome> {
        self.submit_answer(selected)
            .context("failed to update the ledger")
    }

    fn level(&self) -> Option<u32> {
        None
    }

    fn change_level(&mut self, _level: u32) -> Result<()> {
        Err(EngineError::ReviewMode.into())
    }

    fn remaining(&self) -> Option<usize> {
        Some(ReviewBridge::remaining(self))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopEnd {
    Quit,
    Complete,
    Exhausted,
}

fn run(drill: &mut dyn Drill, term: &mut Terminal<impl BufRead>) -> Result<LoopEnd> {
    loop {
        let word = match drill.next() {
            Selection::Word {
                word,
                cleared_levels,
            } => {
                for level in cleared_levels {
                    println!("\n★ Level {level} cleared, moving on.");
                }
                word
            }
            Selection::CatalogComplete => return Ok(LoopEnd::Complete),
            Selection::ReviewExhausted => return Ok(LoopEnd::Exhausted),
        };

        let options = drill.options();
        if options.is_empty() {
            anyhow::bail!("word '{}' has no answer for {}", word.id, term.direction);
        }
        term.ask(&word, &options, drill.level());

        let selected = loop {
            let Some(line) = term.read_line("> ")? else {
                return Ok(LoopEnd::Quit);
            };
            match parse_input(&line, &options) {
                Input::Quit => return Ok(LoopEnd::Quit),
                Input::Empty => continue,
                Input::Level(level) => match drill.change_level(level) {
                    Ok(()) => {
                        println!("Switched to level {level}.");
                        break None;
                    }
                    Err(e) => println!("{e}"),
                },
                Input::Answer(answer) => break Some(answer),
            }
        };
        let Some(selected) = selected else {
            continue;
        };

        let outcome = drill.answer(&selected)?;
        term.feedback(&word, &outcome, drill.remaining());
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Quit,
    Empty,
    Level(u32),
    Answer(String),
}

/// Numbers pick an option; text matching an option (ignoring case) picks
/// it; any other text is submitted as typed.
fn parse_input(line: &str, options: &[String]) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    if line.eq_ignore_ascii_case("q") || line.eq_ignore_ascii_case("quit") {
        return Input::Quit;
    }
    if let Some(level) = line.strip_prefix(":level") {
        if let Ok(level) = level.trim().parse() {
            return Input::Level(level);
        }
    }
    if let Ok(n) = line.parse::<usize>() {
        if (1..=options.len()).contains(&n) {
            return Input::Answer(options[n - 1].clone());
        }
    }
    let answer = options
        .iter()
        .find(|o| o.to_lowercase() == line.to_lowercase())
        .cloned()
        .unwrap_or_else(|| line.to_string());
    Input::Answer(answer)
}

struct Terminal<R> {
    input: R,
    display: DisplaySettings,
    tts: SpeechSettings,
    speaker: Box<dyn Speaker>,
    pace: bool,
    direction: Direction,
    source_code: String,
    target_code: String,
}

impl<R: BufRead> Terminal<R> {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        print!("{prompt}");
        io::stdout().flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }

    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        Ok(self
            .read_line(prompt)?
            .is_some_and(|l| l.trim().eq_ignore_ascii_case("y")))
    }

    fn pause(&self, ms: u64) {
        if self.pace && ms > 0 {
            std::thread::sleep(Duration::from_millis(ms));
        }
    }

    fn ask(&self, word: &VocabItem, options: &[String], level: Option<u32>) {
        let icon = match (&word.icon, self.display.show_icon) {
            (Some(icon), true) => format!("{icon} "),
            _ => String::new(),
        };
        let header = level.map(|l| format!("[L{l}] ")).unwrap_or_default();
        println!("\n{header}{icon}{}", self.direction.prompt(word));
        for (i, option) in options.iter().enumerate() {
            println!("  {}. {option}", i + 1);
        }

        if self.display.auto_speak {
            self.pause(self.display.speak_delay_ms);
            let plan = plan_utterances(
                word,
                self.direction,
                &self.tts,
                &self.source_code,
                &self.target_code,
            );
            self.speaker.cancel();
            for utterance in &plan {
                self.speaker.speak(utterance);
            }
        }
    }

    fn feedback(&self, word: &VocabItem, outcome: &AnswerOutcome, remaining: Option<usize>) {
        match outcome {
            AnswerOutcome::Ignored => return,
            AnswerOutcome::Correct { remediated, .. } => {
                println!("✓ Correct!");
                if *remediated {
                    if let Some(left) = remaining {
                        println!("  Removed from your ledger ({left} left).");
                    }
                }
            }
            AnswerOutcome::Incorrect { correct_answer, .. } => {
                println!("✗ Wrong. The answer is: {correct_answer}");
            }
        }

        if self.display.show_example {
            if let Some(example) = &word.example {
                println!("  e.g. {example}");
            }
        }
        print_rich(word);

        match outcome.transition() {
            Some(LevelTransition::Up { from, to }) => {
                println!("\n▲ Level up! {from} → {to}");
                self.pause(self.display.transition_display_ms);
            }
            Some(LevelTransition::Down { from, to }) => {
                println!("\n▼ Level down: {from} → {to}. Keep going!");
                self.pause(self.display.transition_display_ms);
            }
            None if outcome.is_correct() => self.pause(self.display.correct_display_ms),
            None => self.pause(self.display.wrong_display_ms),
        }
    }
}

fn print_rich(word: &VocabItem) {
    let Some(rich) = word.rich.as_ref().filter(|r| !r.is_empty()) else {
        return;
    };
    if let Some(morphology) = &rich.morphology {
        println!("  Word parts: {}", morphology.breakdown);
    }
    if let Some(etymology) = &rich.etymology {
        println!("  Origin: {etymology}");
    }
    for example in &rich.examples {
        if example.translation.is_empty() {
            println!("  • {}", example.sentence);
        } else {
            println!("  • {} ({})", example.sentence, example.translation);
        }
    }
    if !rich.synonyms.is_empty() {
        println!("  Synonyms: {}", rich.synonyms.join(", "));
    }
    if !rich.antonyms.is_empty() {
        println!("  Antonyms: {}", rich.antonyms.join(", "));
    }
}

fn print_stats(stats: SessionStats) {
    let accuracy = if stats.answered == 0 {
        0.0
    } else {
        stats.correct as f64 * 100.0 / stats.answered as f64
    };
    println!(
        "\nSession: {} answered, {} correct, {} wrong ({accuracy:.0}%).",
        stats.answered, stats.correct, stats.wrong
    );
}
