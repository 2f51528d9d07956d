//! Unix socket client for sending remote-control commands to a session.

use std::io;
use std::path::Path;

use serde_json::Value;
use tokio::net::UnixStream;

use crate::protocol::*;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
    #[error("unexpected response frame type: {0:?}")]
    UnexpectedFrame(FrameType),
    /// The session applied the command and reported a failure.
    #[error("{message}")]
    Remote { code: String, message: String },
}

/// A client connection to a session's remote-control socket.
pub struct Client {
    stream: UnixStream,
}

impl Client {
    /// Connect to the session's Unix domain socket.
    pub async fn connect(socket_path: &Path) -> io::Result<Self> {
        let stream = UnixStream::connect(socket_path).await?;
        Ok(Self { stream })
    }

    /// Send one command.
    ///
    /// Returns the command's response data, or `None` without waiting when the
    /// message asks for no response.
    pub async fn send(&mut self, msg: &RemoteCommandMsg) -> Result<Option<Value>, ClientError> {
        let frame = Frame::json(FrameType::Command, msg)?;
        frame.write_to(&mut self.stream).await?;
        if msg.no_response {
            return Ok(None);
        }

        let resp_frame = Frame::read_from(&mut self.stream).await?;
        match resp_frame.frame_type {
            FrameType::Response => {
                let resp: RcResponse = resp_frame.parse_json()?;
                Ok(resp.data)
            }
            FrameType::Error => {
                let err: ErrorMsg = resp_frame.parse_json()?;
                Err(ClientError::Remote {
                    code: err.code,
                    message: err.message,
                })
            }
            other => Err(ClientError::UnexpectedFrame(other)),
        }
    }
}
