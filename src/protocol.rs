//! Remote-control wire protocol.
//!
//! Socket wire format: `[type: u8][length: u32 big-endian][payload: bytes]`
//!
//! Every frame carries a JSON payload. A driver sends one `Command` frame per
//! remote-control request and, unless the request set `no_response`, reads back
//! either a `Response` or an `Error` frame.
//!
//! Commands written through a terminal instead of the socket use the in-band
//! DCS envelope in [`dcs`].

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::rc::Payload;

/// Version triple sent with every command.
pub const PROTOCOL_VERSION: [u32; 3] = [0, 1, 0];

/// Frame type byte values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    /// Driver → session: a [`RemoteCommandMsg`].
    Command = 0x01,
    /// Session → driver: a successful [`RcResponse`].
    Response = 0x02,
    /// Session → driver: an [`ErrorMsg`].
    Error = 0x03,
}

impl FrameType {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Command),
            0x02 => Some(Self::Response),
            0x03 => Some(Self::Error),
            _ => None,
        }
    }
}

/// Maximum frame payload size (16 MiB). Prevents OOM on malformed data.
const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

/// A protocol frame with a type tag and payload.
#[derive(Debug, Clone)]
pub struct Frame {
    pub frame_type: FrameType,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(frame_type: FrameType, payload: Bytes) -> Self {
        Self {
            frame_type,
            payload,
        }
    }

    /// Create a frame from a serializable message.
    pub fn json<T: Serialize>(frame_type: FrameType, msg: &T) -> Result<Self, serde_json::Error> {
        let payload = serde_json::to_vec(msg)?;
        Ok(Self::new(frame_type, Bytes::from(payload)))
    }

    /// Encode this frame into bytes.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(5 + self.payload.len());
        buf.put_u8(self.frame_type as u8);
        buf.put_u32(self.payload.len() as u32);
        buf.put(self.payload.as_ref());
        buf.freeze()
    }

    /// Write this frame to an async writer.
    pub async fn write_to<W: AsyncWriteExt + Unpin>(&self, writer: &mut W) -> io::Result<()> {
        let encoded = self.encode();
        writer.write_all(&encoded).await?;
        writer.flush().await
    }

    /// Read a frame from an async reader.
    pub async fn read_from<R: AsyncReadExt + Unpin>(reader: &mut R) -> io::Result<Self> {
        let type_byte = reader.read_u8().await?;
        let frame_type = FrameType::from_u8(type_byte).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown frame type: 0x{:02x}", type_byte),
            )
        })?;

        let length = reader.read_u32().await?;
        if length > MAX_PAYLOAD_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame payload too large: {} bytes", length),
            ));
        }

        let mut payload = vec![0u8; length as usize];
        reader.read_exact(&mut payload).await?;

        Ok(Self {
            frame_type,
            payload: Bytes::from(payload),
        })
    }

    /// Decode a frame from a byte buffer (synchronous, for testing).
    pub fn decode(mut data: &[u8]) -> io::Result<Self> {
        if data.len() < 5 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "frame too short",
            ));
        }

        let type_byte = data.get_u8();
        let frame_type = FrameType::from_u8(type_byte).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown frame type: 0x{:02x}", type_byte),
            )
        })?;

        let length = data.get_u32();
        if length > MAX_PAYLOAD_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame payload too large: {} bytes", length),
            ));
        }

        if data.remaining() < length as usize {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "incomplete frame payload",
            ));
        }

        let payload = Bytes::copy_from_slice(&data[..length as usize]);

        Ok(Self {
            frame_type,
            payload,
        })
    }

    /// Parse the payload as a JSON message.
    pub fn parse_json<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

// ── Message types ──────────────────────────────────────────────────

/// Driver → session: one remote-control request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCommandMsg {
    /// Verb of the command, e.g. `close-window`.
    pub cmd: String,
    #[serde(default = "default_version")]
    pub version: [u32; 3],
    /// When set the session applies the command without replying.
    #[serde(default)]
    pub no_response: bool,
    /// Window the driver runs in, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_id: Option<u64>,
    #[serde(default)]
    pub payload: Payload,
}

fn default_version() -> [u32; 3] {
    PROTOCOL_VERSION
}

impl RemoteCommandMsg {
    pub fn new(cmd: impl Into<String>, payload: Payload) -> Self {
        Self {
            cmd: cmd.into(),
            version: PROTOCOL_VERSION,
            no_response: false,
            window_id: None,
            payload,
        }
    }
}

/// Session → driver: outcome of a command.
///
/// Also delivered to an interactive session as an event when a command is
/// applied while the session is running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RcResponse {
    pub cmd: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RcResponse {
    pub fn success(cmd: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            cmd: cmd.into(),
            ok: true,
            data,
            error: None,
        }
    }

    pub fn failure(cmd: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Session → driver: error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMsg {
    pub code: String,
    pub message: String,
}

/// In-band envelope for commands written through a terminal.
///
/// `ESC P @kitty-cmd <json> ESC \`
pub mod dcs {
    use super::RemoteCommandMsg;

    const PREFIX: &[u8] = b"\x1bP@kitty-cmd";
    const SUFFIX: &[u8] = b"\x1b\\";

    pub fn encode(msg: &RemoteCommandMsg) -> Result<Vec<u8>, serde_json::Error> {
        let json = serde_json::to_vec(msg)?;
        let mut out = Vec::with_capacity(PREFIX.len() + json.len() + SUFFIX.len());
        out.extend_from_slice(PREFIX);
        out.extend_from_slice(&json);
        out.extend_from_slice(SUFFIX);
        Ok(out)
    }

    /// Decode one envelope. Returns `None` when `data` is not an RC envelope.
    pub fn decode(data: &[u8]) -> Option<Result<RemoteCommandMsg, serde_json::Error>> {
        let body = data.strip_prefix(PREFIX)?.strip_suffix(SUFFIX)?;
        Some(serde_json::from_slice(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_type_invalid_byte() {
        assert!(FrameType::from_u8(0xFF).is_none());
        assert!(FrameType::from_u8(0x00).is_none());
        assert!(FrameType::from_u8(0x04).is_none());
    }

    #[test]
    fn frame_encode_layout() {
        let frame = Frame::new(FrameType::Command, Bytes::from("{}"));
        let encoded = frame.encode();
        assert_eq!(encoded.as_ref(), b"\x01\x00\x00\x00\x02{}");
    }

    #[test]
    fn frame_decode_too_short() {
        let result = Frame::decode(&[0x01, 0x00, 0x00]);
        assert!(result.is_err());
    }

    #[test]
    fn frame_decode_invalid_type() {
        let data = [0xFF, 0x00, 0x00, 0x00, 0x00];
        let err = Frame::decode(&data).unwrap_err();
        assert!(err.to_string().contains("unknown frame type"));
    }

    #[test]
    fn frame_decode_incomplete_payload() {
        // Header says 10 bytes but only 3 provided
        let data = [0x02, 0x00, 0x00, 0x00, 0x0A, 0x01, 0x02, 0x03];
        assert!(Frame::decode(&data).is_err());
    }

    #[test]
    fn frame_decode_rejects_oversized_length() {
        let data = [0x01, 0xFF, 0xFF, 0xFF, 0xFF];
        let err = Frame::decode(&data).unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[tokio::test]
    async fn frame_async_read_eof() {
        let mut cursor = io::Cursor::new(Vec::<u8>::new());
        assert!(Frame::read_from(&mut cursor).await.is_err());
    }

    #[tokio::test]
    async fn command_frames_read_back_in_order() {
        let first = RemoteCommandMsg::new("close-window", Payload::new().with("self", true));
        let second = RemoteCommandMsg::new("ls", Payload::new());

        let mut buf = Vec::new();
        Frame::json(FrameType::Command, &first).unwrap().write_to(&mut buf).await.unwrap();
        Frame::json(FrameType::Command, &second).unwrap().write_to(&mut buf).await.unwrap();

        let mut cursor = io::Cursor::new(buf);
        let f1: RemoteCommandMsg = Frame::read_from(&mut cursor)
            .await
            .unwrap()
            .parse_json()
            .unwrap();
        let f2: RemoteCommandMsg = Frame::read_from(&mut cursor)
            .await
            .unwrap()
            .parse_json()
            .unwrap();
        assert_eq!(f1, first);
        assert_eq!(f2, second);
    }

    #[test]
    fn command_msg_defaults_when_fields_missing() {
        let msg: RemoteCommandMsg = serde_json::from_str(r#"{"cmd":"ls"}"#).unwrap();
        assert_eq!(msg.version, PROTOCOL_VERSION);
        assert!(!msg.no_response);
        assert_eq!(msg.window_id, None);
        assert!(msg.payload.is_empty());
    }

    #[test]
    fn response_omits_absent_fields() {
        let json = serde_json::to_string(&RcResponse::success("close-window", None)).unwrap();
        assert_eq!(json, r#"{"cmd":"close-window","ok":true}"#);
    }

    #[test]
    fn dcs_envelope_wraps_json() {
        let mut msg = RemoteCommandMsg::new("close-window", Payload::new().with("match", "id:3"));
        msg.window_id = Some(7);
        let encoded = dcs::encode(&msg).unwrap();
        assert!(encoded.starts_with(b"\x1bP@kitty-cmd{"));
        assert!(encoded.ends_with(b"}\x1b\\"));

        let decoded = dcs::decode(&encoded).unwrap().unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn dcs_decode_ignores_other_sequences() {
        assert!(dcs::decode(b"\x1bP+q544e\x1b\\").is_none());
        assert!(dcs::decode(b"\x1bP@kitty-cmd{}").is_none());
    }
}
