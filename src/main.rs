mod git;
mod metadata;
mod queue;
mod session;
mod settings;
mod transcript;
mod types;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use git::Git2Provider;
use session::Session;
use settings::{ENV_TRANSCRIPT_PATH, Locations, Settings};
use std::env;
use std::io::{self, IsTerminal, Read, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;
use types::{HookInput, HookOutput};

const LOG_ENV: &str = "LEARNHOOK_LOG";

#[derive(Parser)]
#[command(
    name = "learnhook",
    version,
    about = "Session-end and pre-compaction hooks that feed the learning queue"
)]
struct Cli {
    /// Assistant state directory (default: ~/.claude)
    #[arg(long, global = true, value_name = "DIR")]
    claude_dir: Option<PathBuf>,

    /// Continuous-learning config file
    /// (default: <claude-dir>/skills/continuous-learning/config.json)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Hook to run; when omitted, taken from `hook_event_name` on stdin
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Session end (Stop): recommend a learning pass for long sessions
    EvaluateSession,
    /// Before context compaction: queue the transcript for learning
    PreCompact,
}

fn init_tracing() {
    // stdout carries hook output JSON, so logs go to stderr.
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .with_target(false)
        .without_time()
        .init();
}

/// Read the hook payload from stdin, if the host sent one.
fn read_payload() -> Result<Option<HookInput>> {
    let mut stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }
    let mut buffer = String::new();
    stdin.read_to_string(&mut buffer).context("reading stdin")?;
    if buffer.trim().is_empty() {
        return Ok(None);
    }
    let input = serde_json::from_str(&buffer).context("parsing hook input")?;
    Ok(Some(input))
}

/// An explicit hook with the transcript named in the environment needs
/// nothing from stdin, and the host may leave that pipe open.
fn needs_payload(cli: &Cli) -> bool {
    cli.command.is_none() || env::var_os(ENV_TRANSCRIPT_PATH).is_none_or(|v| v.is_empty())
}

fn run(cli: &Cli) -> Result<Option<HookOutput>> {
    let payload = if needs_payload(cli) {
        read_payload().unwrap_or_else(|err| {
            warn!("ignoring hook input: {err:#}");
            None
        })
    } else {
        debug!("{ENV_TRANSCRIPT_PATH} set, not reading stdin");
        None
    };

    let command = match (cli.command, &payload) {
        (Some(command), _) => command,
        (None, Some(HookInput::Stop(_))) => Command::EvaluateSession,
        (None, Some(HookInput::PreCompact(e))) => {
            debug!("compaction trigger: {:?}", e.trigger);
            Command::PreCompact
        }
        (None, _) => {
            debug!("no hook to run");
            return Ok(None);
        }
    };

    let locations = Locations {
        claude_dir: cli.claude_dir.clone(),
        config_file: cli.config.clone(),
    };
    let settings = Settings::from_process(payload.as_ref().and_then(HookInput::common), &locations)?;
    let session = Session::open(settings, &Git2Provider);

    match command {
        Command::EvaluateSession => session.handle_stop(),
        Command::PreCompact => session.handle_pre_compact(),
    }
}

fn emit(output: &HookOutput) -> Result<()> {
    let json = serde_json::to_string(output).context("serializing hook output")?;
    writeln!(io::stdout().lock(), "{json}").context("writing hook output")
}

fn main() {
    init_tracing();

    // Hooks must never break the host's hook chain: every path below exits 0.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return;
        }
    };

    let result = panic::catch_unwind(AssertUnwindSafe(|| run(&cli)));

    match result {
        Ok(Ok(Some(output))) => {
            if let Err(err) = emit(&output) {
                error!("{err:#}");
            }
        }
        Ok(Ok(None)) => {}
        Ok(Err(err)) => error!("{err:#}"),
        Err(_) => error!("hook panicked"),
    }
}
