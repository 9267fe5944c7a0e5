//! Ask command handler.
//!
//! Runs one query through a fresh support session.

use super::open_session;
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;
use techassist_agents::responder::SYNTHESIS_FAILURE_APOLOGY;
use techassist_core::{config::AppConfig, AppResult};

/// Ask a single support question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub query: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Give up after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Corpus folder used when the knowledge base is not built yet
    #[arg(long)]
    pub data: Option<PathBuf>,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");

        let session = open_session(config, self.data.as_deref()).await?;

        let answer = match self.timeout {
            Some(secs) => {
                let limit = Duration::from_secs(secs);
                match tokio::time::timeout(limit, session.handle(&self.query)).await {
                    Ok(answer) => answer,
                    Err(_) => {
                        tracing::error!("Query timed out after {}s", secs);
                        SYNTHESIS_FAILURE_APOLOGY.to_string()
                    }
                }
            }
            None => session.handle(&self.query).await,
        };

        if self.json {
            let turn = session.history().await.pop();
            let output = serde_json::json!({
                "sessionId": session.id(),
                "answer": answer,
                "route": turn.as_ref().map(|t| t.route),
                "analysis": turn.as_ref().map(|t| &t.analysis),
                "retrievalConfidence": session.specialist().last_confidence().await,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", answer);
        }

        session.close().await;
        Ok(())
    }
}
