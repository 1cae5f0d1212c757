//! chq - run ClickHouse queries in a pinned container.

mod cli;

use std::path::Path;
use std::sync::Arc;

use chq::client::Clickhouse;
use chq::config::Config;
use chq::error::{ChqError, Result};
use chq::logging;
use chq::pin;
use chq::runtime::DockerRuntime;
use chq::secrets::DefaultSecretStore;
use cli::{Cli, Command, CsvArgs, PinArgs};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    // Pick up CLICKHOUSE_* variables from a local .env, if any
    let dotenv = dotenvy::dotenv();

    if cli.quiet {
        logging::init_quiet_logging();
    } else {
        logging::init_stderr_logging();
    }

    match dotenv {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("Failed to load .env: {}", e),
    }

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    match &cli.command {
        Command::Csv(args) => run_csv(args, &config).await,
        Command::Pin(args) => run_pin(args, &config, &config_path).await,
    }
}

async fn run_csv(args: &CsvArgs, config: &Config) -> Result<()> {
    let connection = args.resolve_connection(config)?;
    let image = config.effective_image()?;
    let runtime = Arc::new(DockerRuntime::new(&config.runtime));

    let client = Clickhouse::connect(connection, image, &DefaultSecretStore::new(), runtime).await?;

    let query = match args.inline_query() {
        Some(query) => query.to_string(),
        None => read_stdin().await?,
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling query");
            on_interrupt.cancel();
        }
    });

    let result = client.csv(&query, &cancel).await?;
    deliver(&result, args.output.as_deref()).await
}

/// Moves the result file to `output`, or streams it to stdout.
///
/// The result file is unique to this run, so it never aliases `output`.
async fn deliver(result: &Path, output: Option<&Path>) -> Result<()> {
    match output {
        Some(output) => {
            if let Err(e) = tokio::fs::rename(result, output).await {
                // Crossing filesystems needs a copy.
                debug!("Rename to {} failed ({}), copying", output.display(), e);
                tokio::fs::copy(result, output).await.map_err(|e| {
                    ChqError::internal(format!("Failed to write {}: {e}", output.display()))
                })?;
                remove_result(result).await;
            }
            info!("Wrote {}", output.display());
        }
        None => {
            let content = tokio::fs::read(result)
                .await
                .map_err(|e| ChqError::internal(format!("Failed to read query output: {e}")))?;
            remove_result(result).await;
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&content).await.map_err(stdout_error)?;
            stdout.flush().await.map_err(stdout_error)?;
        }
    }
    Ok(())
}

async fn remove_result(result: &Path) {
    if let Err(e) = tokio::fs::remove_file(result).await {
        warn!("Failed to remove {}: {}", result.display(), e);
    }
}

fn stdout_error(e: std::io::Error) -> ChqError {
    ChqError::internal(format!("Failed to write to stdout: {e}"))
}

async fn read_stdin() -> Result<String> {
    let mut query = String::new();
    tokio::io::stdin()
        .read_to_string(&mut query)
        .await
        .map_err(|e| ChqError::config(format!("Failed to read query from stdin: {e}")))?;
    Ok(query)
}

async fn run_pin(args: &PinArgs, config: &Config, config_path: &Path) -> Result<()> {
    let repository = args
        .repository
        .as_deref()
        .unwrap_or(&config.image.repository);
    let runtime = DockerRuntime::new(&config.runtime);

    let pinned = pin::resolve_latest(&runtime, repository).await?;
    println!("{pinned}");

    if args.write {
        if pin::write_pin(config_path, &pinned)? {
            info!("Updated pin in {}", config_path.display());
        } else {
            info!("Pin in {} is already current", config_path.display());
        }
    }
    Ok(())
}
