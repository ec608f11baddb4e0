//! convo-analyst - conversational analytics over a conversations database.

mod cli;

use std::io::Write;
use std::sync::Arc;

use cli::Cli;
use convo_analyst::agent::{Orchestrator, StdoutSink};
use convo_analyst::config::{DbConfig, ModelConfig};
use convo_analyst::db::{DatabaseClient, MockDatabaseClient, PostgresClient};
use convo_analyst::error::{AnalystError, Result};
use convo_analyst::llm::{create_client, LlmClient};
use convo_analyst::logging;
use convo_analyst::query::QueryExecutor;
use tokio::io::AsyncBufReadExt;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    if cli.log_file {
        logging::init_file_logging();
    } else {
        logging::init_stderr_logging();
    }

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        eprintln!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let db_config = if cli.mock_db {
        DbConfig::default()
    } else {
        DbConfig::load(cli.env_file.as_deref()).map_err(|e| match e {
            AnalystError::Config(msg) => AnalystError::config(format!(
                "{msg} (recognized variables: {})",
                DbConfig::env_var_names().join(", ")
            )),
            other => other,
        })?
    };

    let model_config = ModelConfig::load_from_file(&cli.model_config)?;
    let llm = create_client(&model_config)?;
    info!(
        "Session start: provider {}, database {}",
        model_config.provider,
        db_config.display_string()
    );

    if cli.mock_db {
        run_session::<MockDatabaseClient>(llm, db_config, cli.message).await
    } else {
        run_session::<PostgresClient>(llm, db_config, cli.message).await
    }
}

async fn run_session<C: DatabaseClient>(
    llm: Arc<dyn LlmClient>,
    db_config: DbConfig,
    one_shot: Option<String>,
) -> Result<()> {
    let mut orchestrator = Orchestrator::new(llm, QueryExecutor::<C>::new(db_config));
    let mut sink = StdoutSink::new();

    if let Some(message) = one_shot {
        return orchestrator.handle_message(&message, &mut sink).await;
    }

    let cancel = orchestrator.cancellation_token();
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    loop {
        prompt()?;

        tokio::select! {
            line = lines.next_line() => {
                let line = line
                    .map_err(|e| AnalystError::internal(format!("Failed to read input: {e}")))?;
                let Some(line) = line else { break };

                let message = line.trim();
                if message.is_empty() {
                    continue;
                }
                if message == "exit" || message == "quit" {
                    break;
                }

                // A failed turn is reported and the session continues
                if let Err(e) = orchestrator.handle_message(message, &mut sink).await {
                    error!("Message handling failed: {}", e);
                    eprintln!("{}: {}", e.category(), e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                println!();
                break;
            }
        }
    }

    info!("Session ended");
    Ok(())
}

fn prompt() -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(b"> ")
        .and_then(|_| stdout.flush())
        .map_err(|e| AnalystError::internal(format!("Failed to write prompt: {e}")))
}
