//! Unix socket server for remote-control commands.
//!
//! Listens on a Unix domain socket. Each connection carries a sequence of
//! `Command` frames; every command is applied to the window container and
//! answered with a `Response` or `Error` frame unless it asked for no
//! response.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::protocol::*;
use crate::rc::CommandRegistry;
use crate::window::WindowRegistry;

/// How long a fresh connection may stay silent before it is dropped.
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared by every connection of one server.
#[derive(Clone)]
struct ServerState {
    commands: Arc<CommandRegistry>,
    boss: WindowRegistry,
    /// Copy of every response, for an interactive session to display.
    responses: Option<mpsc::UnboundedSender<RcResponse>>,
}

/// A bound remote-control socket that has not started accepting yet.
///
/// Binding is split from [`SocketServer::run`] so a session can fail before it
/// takes over the terminal. The socket file is removed when `run` returns,
/// unless something else has replaced it in the meantime.
pub struct SocketServer {
    listener: UnixListener,
    path: PathBuf,
    /// `(dev, ino)` of the socket file this server created.
    file_id: (u64, u64),
}

impl SocketServer {
    /// Bind `socket_path`, replacing a stale socket file.
    ///
    /// Fails with [`io::ErrorKind::AddrInUse`] when a live server already
    /// listens there; its socket file is left untouched.
    pub async fn bind(socket_path: &Path) -> io::Result<Self> {
        if socket_path.exists() {
            let path_owned = socket_path.to_path_buf();
            let is_active = tokio::time::timeout(
                Duration::from_secs(3),
                tokio::task::spawn_blocking(move || {
                    std::os::unix::net::UnixStream::connect(&path_owned).is_ok()
                }),
            )
            .await;

            match is_active {
                Ok(Ok(true)) => {
                    return Err(io::Error::new(
                        io::ErrorKind::AddrInUse,
                        format!(
                            "another session is already listening on {}",
                            socket_path.display()
                        ),
                    ));
                }
                _ => std::fs::remove_file(socket_path)?,
            }
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(socket_path)?;

        // Restrict socket permissions to owner only (0600)
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(Self {
            listener,
            path: socket_path.to_path_buf(),
            file_id: file_id(socket_path)?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept connections until `cancel` fires, then remove the socket file.
    ///
    /// When `responses` is set, every applied command's response is also
    /// forwarded there.
    pub async fn run(
        self,
        commands: Arc<CommandRegistry>,
        boss: WindowRegistry,
        cancel: CancellationToken,
        responses: Option<mpsc::UnboundedSender<RcResponse>>,
    ) -> io::Result<()> {
        tracing::info!(path = %self.path.display(), "remote control socket listening");

        let state = ServerState {
            commands,
            boss,
            responses,
        };
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("socket server received cancel signal, stopping accept loop");
                    break;
                }
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let state = state.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_client(stream, state).await {
                                    tracing::debug!(?e, "client connection ended");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!(?e, "failed to accept Unix socket connection");
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    }
                }
            }
        }

        self.remove_socket_file();
        Ok(())
    }

    fn remove_socket_file(&self) {
        let path = self.path.display();
        match file_id(&self.path) {
            Ok(id) if id == self.file_id => match std::fs::remove_file(&self.path) {
                Ok(()) => tracing::debug!(path = %path, "removed socket file"),
                Err(e) => tracing::warn!(path = %path, error = %e, "failed to remove socket file"),
            },
            Ok(_) => tracing::debug!(path = %path, "socket file replaced, leaving it"),
            Err(_) => {}
        }
    }
}

fn file_id(path: &Path) -> io::Result<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;
    let meta = std::fs::metadata(path)?;
    Ok((meta.dev(), meta.ino()))
}

/// Bind `socket_path` and serve until `cancel` fires.
///
/// See [`SocketServer::bind`] and [`SocketServer::run`].
pub async fn serve(
    commands: Arc<CommandRegistry>,
    boss: WindowRegistry,
    socket_path: &Path,
    cancel: CancellationToken,
    responses: Option<mpsc::UnboundedSender<RcResponse>>,
) -> io::Result<()> {
    SocketServer::bind(socket_path)
        .await?
        .run(commands, boss, cancel, responses)
        .await
}

/// Compute the default Unix socket path for this user.
pub fn default_socket_path() -> PathBuf {
    match std::env::var("XDG_RUNTIME_DIR") {
        Ok(dir) => PathBuf::from(dir).join("termrc.sock"),
        Err(_) => PathBuf::from(format!("/tmp/termrc-{}", whoami())).join("termrc.sock"),
    }
}

fn whoami() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Handle one client connection until it closes.
async fn handle_client<S: AsyncRead + AsyncWrite + Unpin>(
    mut stream: S,
    state: ServerState,
) -> io::Result<()> {
    let mut first = true;
    loop {
        let read = Frame::read_from(&mut stream);
        let frame = if first {
            first = false;
            tokio::time::timeout(FIRST_FRAME_TIMEOUT, read)
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "initial frame timeout"))?
        } else {
            read.await
        };
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        };

        if frame.frame_type != FrameType::Command {
            write_error(
                &mut stream,
                "invalid_frame",
                format!("expected Command, got {:?}", frame.frame_type),
            )
            .await?;
            continue;
        }
        let msg: RemoteCommandMsg = match frame.parse_json() {
            Ok(msg) => msg,
            Err(e) => {
                write_error(&mut stream, "invalid_message", e.to_string()).await?;
                continue;
            }
        };

        let (response, error) = state.commands.respond(&state.boss, &msg);
        if let Some(tx) = &state.responses {
            if tx.send(response.clone()).is_err() {
                tracing::debug!("response listener gone");
            }
        }
        if msg.no_response {
            continue;
        }
        match error {
            None => {
                Frame::json(FrameType::Response, &response)
                    .map_err(io::Error::other)?
                    .write_to(&mut stream)
                    .await?
            }
            Some(e) => write_error(&mut stream, e.code(), e.to_string()).await?,
        }
    }
}

async fn write_error<S: AsyncWrite + Unpin>(
    stream: &mut S,
    code: &str,
    message: String,
) -> io::Result<()> {
    let err = ErrorMsg {
        code: code.to_string(),
        message,
    };
    Frame::json(FrameType::Error, &err)
        .map_err(io::Error::other)?
        .write_to(stream)
        .await
}
