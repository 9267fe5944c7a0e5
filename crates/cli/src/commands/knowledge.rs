//! Knowledge command handler.
//!
//! Builds, queries and inspects the persisted knowledge index.

use super::{data_folder, knowledge_index};
use clap::{Args, Subcommand};
use std::path::PathBuf;
use techassist_core::{config::AppConfig, AppResult};
use techassist_knowledge::rebuild_from_corpus;

/// Knowledge base management
#[derive(Args, Debug)]
pub struct KnowledgeCommand {
    #[command(subcommand)]
    pub action: KnowledgeAction,
}

#[derive(Subcommand, Debug)]
pub enum KnowledgeAction {
    /// Rebuild the index from the corpus folder
    Rebuild(KnowledgeRebuildCommand),
    /// Query the index
    Query(KnowledgeQueryCommand),
    /// Show index statistics
    Stats(KnowledgeStatsCommand),
}

/// Rebuild the index from the corpus folder
#[derive(Args, Debug)]
pub struct KnowledgeRebuildCommand {
    /// Corpus folder (default: the configured data folder)
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Knowledge base name (default: the configured one)
    #[arg(long)]
    pub base: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeRebuildCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let index = knowledge_index(config, self.base.as_deref())?;
        let folder = data_folder(config, self.data.as_deref());
        tracing::info!("Rebuilding '{}' from {:?}", index.name(), folder);

        let (report, stats) = rebuild_from_corpus(&index, &folder).await?;

        if self.json {
            let output = serde_json::json!({
                "base": index.name(),
                "generation": stats.generation,
                "unitsIndexed": stats.units_indexed,
                "duplicatesDropped": stats.duplicates_dropped,
                "filesRead": report.files_read,
                "skippedEntries": report.skipped_entries,
                "failures": report.failures,
                "durationSecs": stats.duration_secs,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!(
                "Indexed {} units from {} files into generation {} in {:.2}s",
                stats.units_indexed, report.files_read, stats.generation, stats.duration_secs
            );
            if report.skipped_entries > 0 {
                println!("  Skipped {} empty entries", report.skipped_entries);
            }
            for failure in &report.failures {
                println!("  Skipped {}: {}", failure.path.display(), failure.reason);
            }
        }

        Ok(())
    }
}

/// Query the index
#[derive(Args, Debug)]
pub struct KnowledgeQueryCommand {
    /// Query text
    pub text: String,

    /// Number of units to retrieve
    #[arg(short = 'k', long, default_value = "5")]
    pub top_k: usize,

    /// Knowledge base name (default: the configured one)
    #[arg(long)]
    pub base: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeQueryCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let index = knowledge_index(config, self.base.as_deref())?;
        tracing::info!("Querying '{}' (k={})", index.name(), self.top_k);

        // Surface the reason here instead of the silent empty list.
        let results = index.search(&self.text, self.top_k).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&results)?);
        } else if results.is_empty() {
            println!("No results.");
        } else {
            for (i, retrieved) in results.iter().enumerate() {
                println!(
                    "{}. [{:.3}] {} ({})",
                    i + 1,
                    retrieved.relevance_score.unwrap_or(0.0),
                    retrieved.unit.question,
                    retrieved.unit.source_id
                );
                println!("   {}", retrieved.unit.answer);
            }
        }

        Ok(())
    }
}

/// Show index statistics
#[derive(Args, Debug)]
pub struct KnowledgeStatsCommand {
    /// Knowledge base name (default: the configured one)
    #[arg(long)]
    pub base: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeStatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let index = knowledge_index(config, self.base.as_deref())?;
        let stats = index.stats().await;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            println!("Knowledge base: {}", stats.name);
            match stats.generation {
                Some(generation) => println!("  Generation: {}", generation),
                None => println!("  Generation: (not built)"),
            }
            println!("  Units: {}", stats.units);
            println!(
                "  Embeddings: {}/{} ({} dims)",
                stats.provider, stats.model, stats.dimensions
            );
            if let Some(built_at) = stats.built_at {
                println!("  Built at: {}", built_at.to_rfc3339());
            }
        }

        Ok(())
    }
}

impl KnowledgeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            KnowledgeAction::Rebuild(cmd) => cmd.execute(config).await,
            KnowledgeAction::Query(cmd) => cmd.execute(config).await,
            KnowledgeAction::Stats(cmd) => cmd.execute(config).await,
        }
    }
}
