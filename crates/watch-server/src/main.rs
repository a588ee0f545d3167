use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::{self, AsyncWriteExt, BufReader};
use watch_config::ConfigLoader;
use watch_logging::init_logging;
use watch_server::{ServerConfig, WatchApp};

#[derive(Parser, Debug)]
#[command(name = "chain-watch", author, version, about, long_about = None)]
struct Args {
    /// Directory containing chain-watch.toml
    #[arg(short, long, default_value = "config")]
    config_dir: PathBuf,

    /// Overrides logging.level from the config file
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collect observations (`name value [rfc3339]` per line) and print alert results
    Run {
        /// Input file, `-` reads stdin
        #[arg(short, long, default_value = "-")]
        input: String,

        /// Print Prometheus telemetry after the run
        #[arg(long)]
        telemetry: bool,
    },
    /// Load and validate configuration, then print the effective values
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let loader = ConfigLoader::new(&args.config_dir);
    let mut config = ServerConfig::load(&loader)?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    init_logging(&config.logging)?;

    tracing::info!("Starting chain-watch with config dir: {}", args.config_dir.display());

    match args.command {
        Command::CheckConfig => {
            print!("{}", config.to_toml()?);
        }
        Command::Run { input, telemetry } => {
            let app = WatchApp::build(&config).await?;
            let mut stdout = io::stdout();

            let summary = if input == "-" {
                app.run(BufReader::new(io::stdin()), &mut stdout).await?
            } else {
                let file = tokio::fs::File::open(&input)
                    .await
                    .with_context(|| format!("Failed to open input {}", input))?;
                app.run(BufReader::new(file), &mut stdout).await?
            };

            if telemetry {
                stdout.write_all(app.telemetry().export()?.as_bytes()).await?;
                stdout.flush().await?;
            }

            tracing::info!(
                collected = summary.collected,
                rejected = summary.rejected,
                malformed = summary.malformed,
                alerts_triggered = summary.alerts_triggered,
                "Run finished"
            );
        }
    }

    Ok(())
}
