use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;

use crate::config::Config;
use crate::document::parse_document_str;
use crate::logging;
use crate::registry::ComponentRegistry;
use crate::render::RenderSession;
use crate::value::val_to_json;

#[derive(Parser)]
#[command(name = "trellis")]
#[command(about = "Trellis - render JSON component trees with suspense", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render a JSON document and print the final tree
    Render {
        /// Document to render
        file: PathBuf,

        /// Print every emitted snapshot as a JSON line instead of only the final tree
        #[arg(long)]
        all: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        /// Give up after this many passes (overrides config)
        #[arg(long)]
        max_passes: Option<usize>,
    },

    /// Print the effective configuration as TOML
    Config,
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

async fn run_cli_with_args(cli: Cli) -> Result<()> {
    // Load config eagerly so config errors show before any output
    let config = Config::builder()
        .config_path(cli.config.map(PathBuf::from))
        .build()?;
    logging::init(&config.logging)?;

    let mut stdout = std::io::stdout();
    execute(cli.command, &config, &mut stdout).await
}

/// Execute one command, writing results to `out`
pub async fn execute(
    command: Commands,
    config: &Config,
    out: &mut (dyn Write + Send),
) -> Result<()> {
    match command {
        Commands::Render {
            file,
            all,
            pretty,
            max_passes,
        } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let root = parse_document_str(&text, &ComponentRegistry::builtin())
                .with_context(|| format!("Failed to parse {}", file.display()))?;

            let mut options = config.render.clone();
            if max_passes.is_some() {
                options.max_passes = max_passes;
            }
            // Nothing can request a rerender from the command line once the tree settles.
            options.watch = false;

            let session = RenderSession::new(root).options(options);
            if all {
                let mut snapshots = Box::pin(session.stream());
                while let Some(snapshot) = snapshots.next().await {
                    write_json(out, &snapshot?.to_json(), pretty)?;
                }
            } else {
                let tree = session.render_final().await?;
                write_json(out, &val_to_json(&tree), pretty)?;
            }
        }

        Commands::Config => {
            write!(out, "{}", config.to_toml()?)?;
        }
    }

    Ok(())
}

fn write_json(
    out: &mut (dyn Write + Send),
    json: &serde_json::Value,
    pretty: bool,
) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(json)?
    } else {
        serde_json::to_string(json)?
    };
    writeln!(out, "{text}")?;
    Ok(())
}
