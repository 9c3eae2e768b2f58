//! Study Buddy CLI
//!
//! Serves the study page and API, or runs a single task from the terminal.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use study_core::{
    create_router, error_document, AppState, CachedGateway, Config, HttpGateway,
    InferenceGateway, Session, StudyController, Task,
};
use study_render::MarkdownGenerator;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Smart Study Buddy - AI-Powered Learning Assistant
///
/// Summarizes text, explains concepts, generates study questions and runs
/// multiple-choice quizzes using a pretrained text-generation model.
#[derive(Parser, Debug)]
#[command(name = "study-buddy")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: study.json in current directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the study page and HTTP API
    Serve {
        /// Address to bind (overrides server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one task and print the result as Markdown
    Ask {
        /// Task to run: summarize, explain, generate_questions or quiz
        #[arg(short, long)]
        task: Task,

        /// Text to study (read from stdin when neither TEXT nor --file is given)
        #[arg(value_name = "TEXT", conflicts_with = "file")]
        text: Option<String>,

        /// Read the text from a file
        #[arg(short, long, value_name = "FILE")]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(config = ?args.config, "Config file");

    let result = match args.command {
        Command::Serve { host, port } => run_serve(args.config.as_deref(), host, port)
            .await
            .map(|()| ExitCode::SUCCESS),
        Command::Ask { task, text, file } => {
            run_ask(args.config.as_deref(), task, text, file.as_deref()).await
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Runs the HTTP server until Ctrl+C.
async fn run_serve(
    config_path: Option<&str>,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;

    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    // Re-validate after overrides
    config.validate()?;
    print_config(&config);

    let logo_path = config.logo_path();
    if !logo_path.exists() {
        tracing::warn!(path = %logo_path.display(), "Logo file not found, the page will show a broken image");
    }

    let addr = config.server.socket_addr()?;
    let gateway = build_gateway(&config)?;
    let idle = config.session.idle_timeout();
    let period = config.session.sweep_interval();
    let state = AppState::new(config, gateway);
    let sweep = state.sessions.spawn_idle_sweep(idle, period);
    let router = create_router(state);

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!();
    println!("Smart Study Buddy running on http://{addr}");
    println!("Press Ctrl+C to stop");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, shutting down");
            }
        })
        .await?;

    sweep.abort();
    Ok(())
}

/// Runs one task in a throwaway session and prints the outcome.
///
/// Study failures are rendered like the page renders them and yield a
/// failing exit code; setup failures propagate.
async fn run_ask(
    config_path: Option<&str>,
    task: Task,
    text: Option<String>,
    file: Option<&Path>,
) -> anyhow::Result<ExitCode> {
    let config = load_config(config_path)?;
    let text = read_input(text, file)?;

    let gateway = build_gateway(&config)?;
    let controller = StudyController::new(gateway, config.quiz.parsing);
    let mut session = Session::new();

    tracing::info!(%task, model = %config.gateway.model, "Asking the model");

    match controller.run(&mut session, &text, task).await {
        Ok(outcome) => {
            print!("{}", MarkdownGenerator::new(&outcome.to_document()).generate());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprint!("{}", MarkdownGenerator::new(&error_document(&e)).generate());
            Ok(ExitCode::from(1))
        }
    }
}

/// Builds the memoized HTTP gateway described by `config`.
fn build_gateway(config: &Config) -> anyhow::Result<Arc<dyn InferenceGateway>> {
    let http = HttpGateway::from_config(&config.gateway)?;
    tracing::debug!(url = %http.url(), "Gateway endpoint");
    Ok(Arc::new(CachedGateway::new(http, config.cache.capacity)))
}

/// Reads the study text from the argument, a file, or stdin.
fn read_input(text: Option<String>, file: Option<&Path>) -> anyhow::Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    if let Some(path) = file {
        return std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read input file '{}': {e}", path.display())
        });
    }

    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to read text from stdin: {e}"))?;
    Ok(buffer)
}

/// Loads configuration from the specified path or default location.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  Model: {}", config.gateway.model);
    println!("  Endpoint: {}", config.gateway.endpoint);
    println!("  Timeout: {}s", config.gateway.timeout_seconds);
    println!("  Cache capacity: {}", config.cache.capacity);
    println!("  Quiz parsing: {:?}", config.quiz.parsing);
    println!("  Session idle timeout: {}s", config.session.idle_seconds);
    println!("  Logo: {}", config.logo_path().display());
}
