//! A [`Speaker`] that shells out to an external text-to-speech command.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::{mpsc, oneshot, watch};

use vocabdrill_core::speech::{Speaker, Utterance};

/// Runs a command template such as `espeak -v {lang}` once per utterance,
/// passing the text as the final argument.
///
/// `{lang}` expands to the voice's language tag and `{rate}` to its rate.
/// Utterances play in order on a background task; a failed spawn is logged
/// and the next utterance still plays. Must be created inside a tokio
/// runtime.
pub struct CommandSpeaker {
    template: Vec<String>,
    queue: mpsc::UnboundedSender<Message>,
    /// Bumped by `cancel`; queued jobs from older generations are dropped.
    generation: watch::Sender<u64>,
}

struct Job {
    command: Command,
    pause: Duration,
    generation: u64,
    text: String,
}

enum Message {
    Say(Job),
    Flush(oneshot::Sender<()>),
}

impl CommandSpeaker {
    /// Returns `None` for an empty template.
    pub fn new(template: &str) -> Option<Self> {
        let template: Vec<String> = template.split_whitespace().map(str::to_string).collect();
        if template.is_empty() {
            return None;
        }
        let (queue, rx) = mpsc::unbounded_channel();
        let (generation, cancelled) = watch::channel(0);
        tokio::spawn(worker(rx, cancelled));
        Some(Self {
            template,
            queue,
            generation,
        })
    }

    fn command_for(&self, utterance: &Utterance) -> Command {
        let expand = |arg: &str| {
            arg.replace("{lang}", &utterance.lang)
                .replace("{rate}", &utterance.rate.to_string())
        };
        let mut command = Command::new(expand(&self.template[0]));
        command
            .args(self.template[1..].iter().map(|a| expand(a)))
            .arg(&utterance.text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        command
    }

    /// Resolves once everything queued so far has finished or been dropped.
    pub async fn wait(&self) {
        let (done, finished) = oneshot::channel();
        if self.queue.send(Message::Flush(done)).is_ok() {
            let _ = finished.await;
        }
    }
}

async fn worker(mut rx: mpsc::UnboundedReceiver<Message>, mut cancelled: watch::Receiver<u64>) {
    while let Some(message) = rx.recv().await {
        match message {
            Message::Say(job) => play(job, &mut cancelled).await,
            Message::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

async fn play(mut job: Job, cancelled: &mut watch::Receiver<u64>) {
    // Marks the current generation as seen, so any later cancel wakes
    // `changed()` below.
    if *cancelled.borrow_and_update() != job.generation {
        return;
    }

    if !job.pause.is_zero() {
        tokio::select! {
            _ = tokio::time::sleep(job.pause) => {}
            _ = cancelled.changed() => return,
        }
    }

    let mut child = match job.command.spawn() {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!("speak command failed for '{}': {e}", job.text);
            return;
        }
    };

    tokio::select! {
        status = child.wait() => {
            if let Err(e) = status {
                tracing::warn!("speak command for '{}' did not finish: {e}", job.text);
            }
        }
        _ = cancelled.changed() => {
            if let Err(e) = child.kill().await {
                tracing::debug!("could not stop speak command: {e}");
            }
        }
    }
}

impl Speaker for CommandSpeaker {
    fn speak(&self, utterance: &Utterance) {
        let job = Job {
            command: self.command_for(utterance),
            pause: Duration::from_millis(utterance.pause_before_ms),
            generation: *self.generation.borrow(),
            text: utterance.text.clone(),
        };
        if self.queue.send(Message::Say(job)).is_err() {
            tracing::warn!("speech worker is gone, dropping '{}'", utterance.text);
        }
    }

    fn cancel(&self) {
        self.generation.send_modify(|g| *g += 1);
    }
}
