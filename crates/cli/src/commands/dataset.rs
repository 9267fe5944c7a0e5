//! Dataset command handler.

use super::llm_client;
use clap::{Args, Subcommand};
use std::path::PathBuf;
use techassist_core::{config::AppConfig, AppResult};
use techassist_knowledge::DatasetGenerator;
use techassist_prompt::PromptCatalog;

/// Synthetic corpus generation
#[derive(Args, Debug)]
pub struct DatasetCommand {
    #[command(subcommand)]
    pub action: DatasetAction,
}

#[derive(Subcommand, Debug)]
pub enum DatasetAction {
    /// Generate bilingual Q&A files for every category
    Generate(DatasetGenerateCommand),
}

#[derive(Args, Debug)]
pub struct DatasetGenerateCommand {
    /// Output folder (default: the configured data folder)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Product the questions are about
    #[arg(long, default_value = "MyApp")]
    pub software: String,

    /// Question/answer pairs requested per file
    #[arg(long, default_value = "10")]
    pub count: usize,
}

impl DatasetGenerateCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let output = self.output.clone().unwrap_or_else(|| config.data_folder());
        tracing::info!("Generating dataset for {} into {:?}", self.software, output);

        let generator = DatasetGenerator::new(llm_client(config)?, &config.model)
            .with_software(&self.software)
            .with_pairs_per_file(self.count)
            .with_prompts(PromptCatalog::for_workspace(&config.workspace));

        let stats = generator.generate(&output).await?;
        println!(
            "Wrote {} files to {} ({} failed)",
            stats.files_written,
            output.display(),
            stats.failed
        );
        Ok(())
    }
}

impl DatasetCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            DatasetAction::Generate(cmd) => cmd.execute(config).await,
        }
    }
}
