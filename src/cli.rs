//! Command-line argument parsing.

use clap::Parser;
use std::path::PathBuf;

/// Conversational analytics over the conversations database.
#[derive(Parser, Debug)]
#[command(name = "convo-analyst")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the model configuration file
    #[arg(
        long,
        value_name = "PATH",
        env = "MODEL_CONFIG",
        default_value = "model_config.yaml"
    )]
    pub model_config: PathBuf,

    /// Env file with DB_* variables (defaults to ../.env, then ./.env)
    #[arg(long, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Handle a single message and exit instead of starting the prompt loop
    #[arg(short, long, value_name = "TEXT")]
    pub message: Option<String>,

    /// Use the in-memory mock database (for trying the flow offline)
    #[arg(long)]
    pub mock_db: bool,

    /// Log to a file under the state directory instead of stderr
    #[arg(long)]
    pub log_file: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
