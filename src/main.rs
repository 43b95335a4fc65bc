use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;

use tabula::agent::server::{ServerConfig, start_server};
use tabula::config::Config;
use tabula::pipeline::Pipeline;
use tabula::table::DataReference;

#[derive(Parser)]
#[command(name = "tabula")]
#[command(version, about = "Data summarization agent - turn a CSV/JSON reference into a sandboxed web report")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the chat adapter server
    Agent {
        /// Port to listen on
        #[arg(short, long, default_value = "8001")]
        port: u16,

        /// Enable dev mode (bind all interfaces, permissive CORS)
        #[arg(long)]
        dev: bool,

        /// Override the port reports are served on inside the sandbox
        #[arg(long)]
        report_port: Option<u16>,
    },
    /// Analyze one data reference and print the preview URL
    Analyze {
        /// URL, Google Sheets link, file path, or inline CSV/JSON.
        /// Prompts on stdin when omitted.
        reference: Option<String>,

        /// Override the port reports are served on inside the sandbox
        #[arg(long)]
        report_port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Agent {
            port,
            dev,
            report_port,
        } => {
            let config = Config::from_env(report_port)?;
            start_server(
                ServerConfig {
                    port,
                    dev_mode: dev,
                },
                config,
            )
            .await?;
        }
        Commands::Analyze {
            reference,
            report_port,
        } => {
            let raw = match reference {
                Some(raw) => raw,
                None => prompt_for_reference()?,
            };
            let config = Config::from_env(report_port)?;
            let pipeline = Pipeline::new(config).map_err(|e| anyhow::anyhow!(e.user_message()))?;
            let reference = DataReference::parse(&raw);
            match pipeline.run(&reference).await {
                Ok(outcome) => {
                    println!("{}", outcome.summary());
                    println!("Sandbox id: {}", outcome.sandbox_id);
                }
                Err(err) => anyhow::bail!(err.user_message()),
            }
        }
    }

    Ok(())
}

fn prompt_for_reference() -> Result<String> {
    print!("Enter a data reference (URL, file path, or inline CSV/JSON): ");
    std::io::stdout().flush().context("Failed to flush stdout")?;
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    let trimmed = line.trim().to_string();
    if trimmed.is_empty() {
        anyhow::bail!("No data reference provided");
    }
    Ok(trimmed)
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "tabula=debug" } else { "tabula=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
