//! termrc - remote control for terminal sessions
//!
//! ## Modes
//!
//! **Session** (`termrc run`): opens the configured windows, listens for
//! remote-control commands on a Unix socket and shows an interactive window
//! list.
//!
//! **Driver** (`termrc <verb> [options]`): encodes one remote-control command,
//! sends it to a running session and prints the response.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{CommandFactory, FromArgMatches, Parser as ClapParser, Subcommand};
use futures::StreamExt;
use termrc::{
    client::{Client, ClientError},
    config::{Config, ConfigError},
    protocol::RcResponse,
    rc::{registry::EncodeError, CommandRegistry, GlobalOptions},
    server::{self, SocketServer},
    terminal,
    tui::{EventLoop, GraphicsImageManager, HandlerError, LoopEvent, TermManager, WindowList},
    window::{WindowRegistry, WindowSpec},
};
use thiserror::Error;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// termrc - remote control for terminal sessions
#[derive(ClapParser, Debug)]
#[command(name = "termrc", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the session's Unix domain socket
    #[arg(long, env = "TERMRC_SOCKET", global = true)]
    socket: Option<PathBuf>,

    /// Path to the config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Window the command is sent from (used by --self)
    #[arg(long, env = "TERMRC_WINDOW_ID", global = true)]
    window_id: Option<u64>,

    /// Do not wait for a response
    #[arg(long, global = true)]
    no_response: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run an interactive session that accepts remote-control commands
    Run {
        /// Open a window with this title (repeatable)
        #[arg(long = "window", value_name = "TITLE")]
        windows: Vec<String>,
    },

    /// A remote-control command, e.g. `close-window --match title:vim`
    #[command(external_subcommand)]
    Remote(Vec<String>),
}

#[derive(Error, Debug)]
pub enum TermrcError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Client(#[from] ClientError),

    #[error("session error: {0}")]
    Handler(#[from] HandlerError),

    #[error("task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let commands = Arc::new(CommandRegistry::builtin());
    let matches = Cli::command()
        .after_help(format!("Remote control commands:\n{}", commands.summary()))
        .get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    init_tracing();

    let result = match cli.command {
        Commands::Run { ref windows } => run_session(&cli, windows, commands).await,
        Commands::Remote(ref argv) => run_remote(&cli, argv, &commands).await,
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("termrc: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Tracing always goes to stderr: stdout carries command output and the
/// full-screen UI.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "termrc=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn socket_path(cli: &Cli, config: &Config) -> PathBuf {
    cli.socket
        .clone()
        .or_else(|| config.listen_on.clone())
        .unwrap_or_else(server::default_socket_path)
}

// ── Driver mode ────────────────────────────────────────────────────

async fn run_remote(
    cli: &Cli,
    argv: &[String],
    commands: &CommandRegistry,
) -> Result<ExitCode, TermrcError> {
    let Some((verb, args)) = argv.split_first() else {
        return Ok(ExitCode::FAILURE);
    };
    let global = GlobalOptions {
        window_id: cli.window_id,
        no_response: cli.no_response,
    };
    let msg = match commands.encode(verb, args, &global) {
        Ok(msg) => msg,
        Err(EncodeError::Args(e)) => e.exit(),
        Err(EncodeError::Command(e)) => {
            eprintln!("termrc: {e}");
            eprintln!("Remote control commands:\n{}", commands.summary());
            return Ok(ExitCode::FAILURE);
        }
    };

    let config = Config::load_or_default(cli.config.as_deref())?;
    let socket = socket_path(cli, &config);
    tracing::debug!(cmd = %msg.cmd, socket = %socket.display(), "sending remote command");
    let mut client = Client::connect(&socket).await.map_err(|e| {
        std::io::Error::new(
            e.kind(),
            format!("cannot reach session at {}: {e}", socket.display()),
        )
    })?;

    match client.send(&msg).await {
        Ok(Some(serde_json::Value::String(text))) => println!("{text}"),
        Ok(Some(data)) => match serde_json::to_string_pretty(&data) {
            Ok(pretty) => println!("{pretty}"),
            Err(e) => tracing::warn!(error = %e, "failed to format response"),
        },
        Ok(None) => {}
        Err(ClientError::Remote { message, .. }) => {
            eprintln!("{message}");
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    }
    Ok(ExitCode::SUCCESS)
}

// ── Session mode ───────────────────────────────────────────────────

async fn run_session(
    cli: &Cli,
    titles: &[String],
    commands: Arc<CommandRegistry>,
) -> Result<ExitCode, TermrcError> {
    let config = Config::load_or_default(cli.config.as_deref())?;

    let boss = WindowRegistry::new();
    for spec in config.windows.iter().cloned() {
        boss.open(spec);
    }
    for title in titles {
        boss.open(WindowSpec {
            title: title.clone(),
            ..Default::default()
        });
    }
    if boss.is_empty() {
        let cwd = std::env::current_dir()?;
        boss.open(WindowSpec {
            title: "shell".to_string(),
            cwd: cwd.display().to_string(),
            ..Default::default()
        });
    }

    let (responses_tx, mut responses_rx) = mpsc::unbounded_channel::<RcResponse>();
    let (events_tx, events_rx) = mpsc::unbounded_channel::<LoopEvent>();

    // Bind before taking over the terminal; failing to listen is fatal.
    let cancel = CancellationToken::new();
    let server_handle = if config.allow_remote_control {
        let socket = socket_path(cli, &config);
        let listener = SocketServer::bind(&socket).await.map_err(|e| {
            std::io::Error::new(e.kind(), format!("cannot listen on {}: {e}", socket.display()))
        })?;
        let commands = commands.clone();
        let boss = boss.clone();
        let cancel = cancel.clone();
        let responses = Some(responses_tx.clone());
        Some(tokio::spawn(async move {
            if let Err(e) = listener.run(commands, boss, cancel, responses).await {
                tracing::error!(?e, "remote control socket error");
            }
        }))
    } else {
        tracing::info!("remote control disabled by config");
        None
    };

    // Remote-control responses become loop events
    let rc_tx = events_tx.clone();
    tokio::spawn(async move {
        while let Some(response) = responses_rx.recv().await {
            if rc_tx.send(LoopEvent::RcResponse(response)).is_err() {
                break;
            }
        }
    });

    let mut hangup = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        if hangup.recv().await.is_some() {
            tracing::info!("terminal hung up");
            let _ = events_tx.send(LoopEvent::Hangup);
        }
    });

    let size = terminal::terminal_size()?;
    let event_loop = EventLoop::new(TermManager::new(terminal::CrosstermModes::default()), size)
        .with_image_manager(GraphicsImageManager::new());
    let mut handler = WindowList::new(boss, commands, responses_tx);

    // Terminal input merged with hangups and remote-control responses; each
    // source keeps its own arrival order.
    let terminal_events = crossterm::event::EventStream::new().filter_map(|event| {
        std::future::ready(match event {
            // Resize notifications carry cells only; ask for pixels too.
            Ok(event) => match LoopEvent::from_crossterm(event) {
                Some(LoopEvent::Resize(size)) => Some(LoopEvent::Resize(
                    terminal::terminal_size().unwrap_or(size),
                )),
                other => other,
            },
            Err(e) => {
                tracing::warn!(?e, "terminal input failed");
                Some(LoopEvent::Hangup)
            }
        })
    });
    let events = Box::pin(futures::stream::select(
        terminal_events,
        UnboundedReceiverStream::new(events_rx),
    ));

    let mut stdout = tokio::io::stdout();
    let result = event_loop.run(&mut handler, events, &mut stdout).await;

    cancel.cancel();
    if let Some(handle) = server_handle {
        handle.await?;
    }

    let code = result?;
    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}
