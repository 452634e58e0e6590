//! merlin-bridge - drive the merlin analysis server from the command line.
//!
//! Reads one source file into an in-memory buffer, synchronizes it with a
//! freshly spawned server, runs a single query and prints the result. Logs
//! go to stderr (filtered by `RUST_LOG`); results go to stdout.

use std::fs;
use std::io::{Write, stderr, stdout};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use merlin_client::present::{completion_items, identifier_candidates, location_list};
use merlin_client::{
    BridgeConfig, BridgeError, EditorBuffer, EnclosingResult, MemoryBuffer, Presenter, Session,
    Supervisor, TextPresenter, describe_error,
};
use merlin_types::{BufferId, Position};

#[derive(Parser, Debug)]
#[command(name = "merlin-bridge")]
#[command(about = "Query the merlin analysis server about an OCaml source file")]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Extra server flag; may be repeated
    #[arg(long = "flag", global = true, allow_hyphen_values = true)]
    flags: Vec<String>,
    /// Leave warnings out of error listings
    #[arg(long, global = true)]
    ignore_warnings: bool,
    /// Source file to analyze
    file: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send the buffer (up to a position) and report what was sent
    Sync {
        #[arg(long)]
        at: Option<Position>,
    },
    /// Complete a prefix at a position
    Complete {
        at: Position,
        prefix: String,
        /// Complete in the environment at the position itself
        #[arg(long)]
        local: bool,
    },
    /// List identifiers in scope as "<kind>: <name>"
    Identifiers {
        at: Position,
        #[arg(default_value = "")]
        prefix: String,
    },
    /// Type of an expression (or of whatever is under the position)
    Type {
        at: Position,
        #[arg(long)]
        expr: Option<String>,
    },
    /// Enclosing scopes around a position, innermost first
    Enclosing {
        at: Position,
        #[arg(long)]
        expr: Option<String>,
        /// How many scopes to walk outward after the first
        #[arg(long, default_value_t = 0)]
        outward: usize,
    },
    /// Errors and warnings for the whole file
    Errors,
    /// Packages known to the server
    Packages,
    /// Load packages into the server
    Use { packages: Vec<String> },
    /// Find the source file for a module
    Which {
        name: String,
        #[arg(long)]
        ext: Option<String>,
    },
    /// List files with an extension
    WhichExt { ext: String },
    /// Span of whole phrases covering a range
    Phrase { first: Position, last: Position },
    /// Reload changed compiled interfaces
    Reload,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    // stdout carries results.
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(stderr),
        )
        .with(env_filter)
        .init();
}

fn load_config(cli: &Cli) -> Result<BridgeConfig> {
    let mut config = match &cli.config {
        Some(path) => BridgeConfig::load_from(path)?,
        None => BridgeConfig::load()?.unwrap_or_default(),
    };
    config.flags.extend(cli.flags.iter().cloned());
    config.ignore_warnings |= cli.ignore_warnings;
    Ok(config)
}

fn read_buffer(path: &Path) -> Result<MemoryBuffer> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(MemoryBuffer::new(
        BufferId::new(1),
        path.display().to_string(),
        &text,
    ))
}

fn bridge_error(err: BridgeError) -> anyhow::Error {
    anyhow!(describe_error(&err))
}

async fn run<W: Write>(cli: Cli, out: W) -> Result<()> {
    let config = load_config(&cli)?;
    let buffer = read_buffer(&cli.file)?;
    let mut session = Session::new(Supervisor::from_config(&config));
    let mut presenter = TextPresenter::new(out);

    let source_dir = fs::canonicalize(&cli.file)
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf));
    if let Some(dir) = source_dir {
        match session.load_project(&dir, config.project_search_depth).await {
            Ok(Some(path)) => tracing::debug!(path = %path.display(), "using project file"),
            Ok(None) => {}
            Err(err) => tracing::warn!("project load failed: {}", describe_error(&err)),
        }
    }

    let result = execute(&mut session, &buffer, &config, cli.command, &mut presenter).await;
    session.shutdown().await;
    result
}

async fn execute<W: Write>(
    session: &mut Session<Supervisor>,
    buffer: &MemoryBuffer,
    config: &BridgeConfig,
    command: Commands,
    presenter: &mut TextPresenter<W>,
) -> Result<()> {
    match command {
        Commands::Sync { at } => {
            let report = match at {
                Some(at) => session.sync_to(buffer, at).await,
                None => session.sync_full_buffer(buffer).await,
            }
            .map_err(bridge_error)?;
            presenter.message(&format!(
                "{:?} sync of {}: {} lines sent, server at {}",
                report.mode,
                buffer.basename(),
                report.lines_sent(),
                report.position
            ))?;
        }
        Commands::Complete { at, prefix, local } => {
            let entries = if local {
                session.complete_at(buffer, at, &prefix).await
            } else {
                session.complete(buffer, at, &prefix).await
            }
            .map_err(bridge_error)?;
            presenter.completions(&completion_items(&entries))?;
        }
        Commands::Identifiers { at, prefix } => {
            let entries = session
                .complete_at(buffer, at, &prefix)
                .await
                .map_err(bridge_error)?;
            presenter.identifiers(&identifier_candidates(&entries))?;
        }
        Commands::Type { at, expr } => {
            let info = session
                .type_at(buffer, at, expr.as_deref())
                .await
                .map_err(bridge_error)?;
            presenter.message(&info.to_string())?;
        }
        Commands::Enclosing { at, expr, outward } => {
            match session
                .type_enclosing(buffer, at, expr.as_deref())
                .await
                .map_err(bridge_error)?
            {
                EnclosingResult::Scope(view) => {
                    presenter.highlight(&view)?;
                    for _ in 0..outward {
                        let Some(view) = session.next_enclosing() else {
                            break;
                        };
                        presenter.highlight(&view)?;
                    }
                }
                EnclosingResult::Fallback(info) => presenter.message(&info.to_string())?,
            }
        }
        Commands::Errors => {
            session
                .sync_full_buffer(buffer)
                .await
                .map_err(bridge_error)?;
            let errors = session.errors().await.map_err(bridge_error)?;
            presenter.locations(&location_list(&errors, config.ignore_warnings))?;
        }
        Commands::Packages => {
            let packages = session.find_list().await.map_err(bridge_error)?;
            presenter.packages(&packages)?;
        }
        Commands::Use { packages } => {
            session.find_use(&packages).await.map_err(bridge_error)?;
        }
        Commands::Which { name, ext } => {
            let path = session
                .which_file(&name, ext.as_deref())
                .await
                .map_err(bridge_error)?;
            presenter.message(&path)?;
        }
        Commands::WhichExt { ext } => {
            let files = session.which_with_ext(&ext).await.map_err(bridge_error)?;
            presenter.packages(&files)?;
        }
        Commands::Phrase { first, last } => {
            match session
                .select_phrase(buffer, first, last)
                .await
                .map_err(bridge_error)?
            {
                Some(span) => presenter.message(&format!("{}-{}", span.start, span.end))?,
                None => presenter.message("no phrase")?,
            }
        }
        Commands::Reload => {
            session.refresh().await.map_err(bridge_error)?;
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run(cli, stdout().lock()).await
}
