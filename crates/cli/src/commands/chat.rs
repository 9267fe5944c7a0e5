//! Chat command handler.
//!
//! Line-oriented support session over stdin. Slash commands control the
//! session; every other line is a query.

use super::open_session;
use clap::Args;
use std::io::Write;
use std::path::{Path, PathBuf};
use techassist_agents::{SupportSession, Transcript};
use techassist_core::{config::AppConfig, AppError, AppResult};
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "Commands: /reset  /save  /list  /history  /quit";

/// Interactive support session
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Continue a saved transcript, by path or by its number in `--list`
    #[arg(long)]
    pub load: Option<PathBuf>,

    /// List saved transcripts and exit
    #[arg(long)]
    pub list: bool,

    /// Corpus folder used when the knowledge base is not built yet
    #[arg(long)]
    pub data: Option<PathBuf>,
}

enum Step {
    Continue,
    Quit,
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chat command");

        if self.list {
            print_saved(&config.transcripts_dir())?;
            return Ok(());
        }

        let session = open_session(config, self.data.as_deref()).await?;

        if let Some(ref load) = self.load {
            let path = resolve_saved(&config.transcripts_dir(), load)?;
            let transcript = Transcript::load(&path)?;
            for message in transcript.messages() {
                println!("{}: {}", message.role, message.content);
            }
            session.resume(transcript).await;
        }

        println!("{} is ready. {}", config.agents.agent_name, HELP);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match self.step(config, &session, line).await? {
                Step::Continue => {}
                Step::Quit => break,
            }
        }

        session.close().await;
        Ok(())
    }

    async fn step(
        &self,
        config: &AppConfig,
        session: &SupportSession,
        line: &str,
    ) -> AppResult<Step> {
        match line {
            "/quit" | "/exit" => return Ok(Step::Quit),
            "/reset" => {
                session.reset().await;
                println!("Conversation reset.");
            }
            "/save" => match session.save_transcript(&config.transcripts_dir()).await {
                Ok(path) => println!("Saved to {}", path.display()),
                Err(e) => println!("Could not save: {}", e),
            },
            "/list" => {
                if let Err(e) = print_saved(&config.transcripts_dir()) {
                    println!("Could not list transcripts: {}", e);
                }
            }
            "/history" => {
                let history = session.history().await;
                if history.is_empty() {
                    println!("No turns yet.");
                }
                for (i, turn) in history.iter().enumerate() {
                    println!(
                        "{}. [{}] {:?} ({}, {}, confidence {:.2}): {}",
                        i + 1,
                        turn.timestamp.format("%H:%M:%S"),
                        turn.route,
                        turn.analysis.category,
                        turn.analysis.complexity,
                        turn.analysis.confidence,
                        turn.query
                    );
                }
            }
            "/help" => println!("{}", HELP),
            query => {
                let answer = session.handle(query).await;
                println!("{}\n", answer);
            }
        }
        Ok(Step::Continue)
    }
}

fn print_saved(dir: &Path) -> AppResult<()> {
    let saved = Transcript::list_saved(dir)?;
    if saved.is_empty() {
        println!("No saved transcripts in {}", dir.display());
    }
    for (i, path) in saved.iter().enumerate() {
        println!("{}. {}", i + 1, path.display());
    }
    Ok(())
}

/// A bare number picks from the saved list (1 = newest); anything else is a path.
fn resolve_saved(dir: &Path, load: &Path) -> AppResult<PathBuf> {
    let Some(number) = load.to_str().and_then(|s| s.parse::<usize>().ok()) else {
        return Ok(load.to_path_buf());
    };

    let saved = Transcript::list_saved(dir)?;
    number
        .checked_sub(1)
        .and_then(|i| saved.get(i).cloned())
        .ok_or_else(|| {
            AppError::Other(format!(
                "No saved transcript #{} ({} available)",
                number,
                saved.len()
            ))
        })
}
