//! TechAssist CLI
//!
//! Two-tier technical support from the terminal: a triage agent that answers
//! or escalates, backed by a retrieval-augmented specialist.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, ChatCommand, DatasetCommand, KnowledgeCommand};
use std::path::PathBuf;
use techassist_core::{config::AppConfig, logging, AppResult};

/// TechAssist - two-tier technical support agents
#[derive(Parser, Debug)]
#[command(name = "techassist")]
#[command(
    about = "Two-tier technical support agents with a local knowledge base",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "TECHASSIST_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "TECHASSIST_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider (ollama, openai)
    #[arg(short, long, global = true, env = "TECHASSIST_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "TECHASSIST_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a single support question
    Ask(AskCommand),

    /// Interactive support session
    Chat(ChatCommand),

    /// Knowledge base management
    Knowledge(KnowledgeCommand),

    /// Synthetic corpus generation
    Dataset(DatasetCommand),
}

/// Build the effective configuration: defaults, YAML, environment, then flags.
fn resolve_config(cli: &Cli) -> AppResult<AppConfig> {
    let mut config = AppConfig::load()?;

    // A workspace or config file given on the command line brings its own YAML.
    if cli.workspace.is_some() || cli.config.is_some() {
        let workspace = cli
            .workspace
            .clone()
            .unwrap_or_else(|| config.workspace.clone());
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| workspace.join(".techassist/config.yaml"));
        config.workspace = workspace;
        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }
    }

    Ok(config.with_overrides(
        cli.workspace.clone(),
        cli.config.clone(),
        cli.provider.clone(),
        cli.model.clone(),
        cli.log_level.clone(),
        cli.verbose,
        cli.no_color,
    ))
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    config.ensure_state_dir()?;
    let log_file = config.log_to_file.then(|| config.log_file_path());
    logging::init_logging(config.log_level.as_deref(), config.no_color, log_file.as_deref())?;

    tracing::info!("TechAssist CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Chat(_) => "chat",
        Commands::Knowledge(_) => "knowledge",
        Commands::Dataset(_) => "dataset",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Chat(cmd) => cmd.execute(&config).await,
        Commands::Knowledge(cmd) => cmd.execute(&config).await,
        Commands::Dataset(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
