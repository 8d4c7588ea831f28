mod app;
mod cache;
mod cli;
mod commands;
mod config;
mod event;
mod gate;
mod inventory;
mod naming;
mod query;
mod session;
mod spectrum;
mod store;
mod submission;
mod table;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "acbc")]
#[command(about = "A terminal dashboard for the AC/BC biochar inventory")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/acbc/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Name recorded on submissions and commits
  #[arg(short, long)]
  author: Option<String>,

  #[command(subcommand)]
  command: Option<cli::Command>,
}

fn env_filter() -> EnvFilter {
  EnvFilter::try_from_env("ACBC_LOG")
    .or_else(|_| EnvFilter::try_from_default_env())
    .unwrap_or_else(|_| EnvFilter::new("acbc=info"))
}

/// First candidate directory that exists or can be created.
fn create_log_dir(candidates: impl IntoIterator<Item = PathBuf>) -> Result<PathBuf, String> {
  let mut errors = Vec::new();
  for dir in candidates {
    match std::fs::create_dir_all(&dir) {
      Ok(()) => return Ok(dir),
      Err(e) => errors.push(format!("{}: {}", dir.display(), e)),
    }
  }
  Err(errors.join("; "))
}

/// Log to a daily file while the dashboard owns the terminal. Falls back to
/// the temp dir when the data dir is unavailable.
fn init_file_logging() -> Option<WorkerGuard> {
  let candidates = dirs::data_dir()
    .into_iter()
    .chain(std::iter::once(std::env::temp_dir()))
    .map(|base| base.join("acbc").join("logs"));

  match create_log_dir(candidates) {
    Ok(dir) => {
      let appender = tracing_appender::rolling::daily(dir, "acbc.log");
      let (writer, guard) = tracing_appender::non_blocking(appender);
      tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(writer)
        .with_ansi(false)
        .init();
      Some(guard)
    }
    Err(e) => {
      // The terminal is not in raw mode yet, so this is still readable.
      eprintln!("warning: logging disabled, no usable log directory ({})", e);
      None
    }
  }
}

fn init_stderr_logging() {
  tracing_subscriber::fmt()
    .with_env_filter(env_filter())
    .with_writer(std::io::stderr)
    .init();
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Checking a name needs neither config nor store.
  if let Some(cli::Command::CheckName { name }) = &args.command {
    return cli::check_name(&mut std::io::stdout(), name);
  }

  let _guard = match args.command {
    Some(_) => {
      init_stderr_logging();
      None
    }
    None => init_file_logging(),
  };

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  // Override author if specified on command line
  let config = if let Some(author) = args.author {
    config::Config {
      author: Some(author),
      ..config
    }
  } else {
    config
  };

  let store = store::AnyStore::connect(&config)?;
  let session = session::Session::new(config, store);

  match args.command {
    Some(command) => cli::run(command, &session).await,
    None => {
      let mut app = app::App::new(Arc::new(session))?;
      app.run().await
    }
  }
}
