use std::{
    io::{self, BufRead},
    sync::Arc,
    thread,
};

use anyhow::{Context, Result};
use sync_core::PresentationDriver;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Next,
    Previous,
    Click,
    Quit,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "n" | "next" => Some(ConsoleCommand::Next),
            "p" | "prev" | "previous" => Some(ConsoleCommand::Previous),
            "c" | "click" => Some(ConsoleCommand::Click),
            "q" | "quit" | "exit" => Some(ConsoleCommand::Quit),
            _ => None,
        }
    }
}

/// Feeds stdin lines from a detached thread. A blocked read never holds up
/// runtime shutdown; the channel closes at end of input.
pub fn spawn_stdin_lines() -> Result<mpsc::Receiver<String>> {
    let (sender, receiver) = mpsc::channel(16);
    thread::Builder::new()
        .name("stdin-console".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if sender.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "console input failed");
                        break;
                    }
                }
            }
            debug!("console input closed");
        })
        .context("failed to start console reader")?;
    Ok(receiver)
}

/// Runs commands until `quit` or until the line source closes.
pub async fn run(
    mut lines: mpsc::Receiver<String>,
    presentation: Arc<dyn PresentationDriver>,
) {
    while let Some(line) = lines.recv().await {
        if line.trim().is_empty() {
            continue;
        }
        let Some(command) = ConsoleCommand::parse(&line) else {
            warn!(input = %line.trim(), "unknown command; use n, p, c or q");
            continue;
        };

        let result = match command {
            ConsoleCommand::Next => presentation.advance_next().await,
            ConsoleCommand::Previous => presentation.advance_previous().await,
            ConsoleCommand::Click => presentation.click_current().await,
            ConsoleCommand::Quit => {
                info!("quit requested");
                return;
            }
        };
        if let Err(err) = result {
            warn!(?command, error = %err, "presentation command failed");
        }
    }
}
