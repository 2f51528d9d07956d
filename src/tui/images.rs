//! Image subsystem of a session.
//!
//! Images are sent with the terminal graphics protocol. Everything a session
//! transmits is deleted again when the manager is deactivated, so no image
//! outlives the session that placed it.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::handler::WriteScheduler;

/// Size of one base64 chunk of a transmission.
const CHUNK_SIZE: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("image manager is not active")]
    Inactive,
    #[error("image data is empty")]
    Empty,
}

/// Image subsystem owned by a session while it is entered.
pub trait ImageManager: Send {
    /// Start using `writer` for graphics commands.
    fn activate(&mut self, writer: &WriteScheduler) -> Result<(), ImageError>;

    /// Release every image this manager created.
    fn deactivate(&mut self) -> Result<(), ImageError>;

    /// Transmit a PNG and display it at the cursor. Returns the image id.
    fn transmit_png(&mut self, png: &[u8]) -> Result<u32, ImageError>;
}

/// [`ImageManager`] speaking the terminal graphics protocol.
#[derive(Default)]
pub struct GraphicsImageManager {
    writer: Option<WriteScheduler>,
    next_id: u32,
    transmitted: Vec<u32>,
}

impl GraphicsImageManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transmitted(&self) -> &[u32] {
        &self.transmitted
    }
}

impl ImageManager for GraphicsImageManager {
    fn activate(&mut self, writer: &WriteScheduler) -> Result<(), ImageError> {
        self.writer = Some(writer.clone());
        Ok(())
    }

    fn deactivate(&mut self) -> Result<(), ImageError> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        for id in self.transmitted.drain(..) {
            writer.write(format!("\x1b_Ga=d,d=I,i={id}\x1b\\"));
        }
        Ok(())
    }

    fn transmit_png(&mut self, png: &[u8]) -> Result<u32, ImageError> {
        let writer = self.writer.as_ref().ok_or(ImageError::Inactive)?;
        if png.is_empty() {
            return Err(ImageError::Empty);
        }
        self.next_id += 1;
        let id = self.next_id;

        let encoded = STANDARD.encode(png);
        let chunks: Vec<&[u8]> = encoded.as_bytes().chunks(CHUNK_SIZE).collect();
        let last = chunks.len() - 1;
        let mut out = Vec::with_capacity(encoded.len() + chunks.len() * 32);
        for (i, chunk) in chunks.into_iter().enumerate() {
            let more = u8::from(i != last);
            if i == 0 {
                out.extend_from_slice(format!("\x1b_Ga=T,f=100,i={id},m={more};").as_bytes());
            } else {
                out.extend_from_slice(format!("\x1b_Gm={more};").as_bytes());
            }
            out.extend_from_slice(chunk);
            out.extend_from_slice(b"\x1b\\");
        }
        writer.write(out);
        self.transmitted.push(id);
        tracing::debug!(image = id, bytes = png.len(), "transmitted image");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<bytes::Bytes>) -> String {
        let mut out = Vec::new();
        while let Ok(chunk) = rx.try_recv() {
            out.extend_from_slice(&chunk);
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn transmit_requires_activation() {
        let mut images = GraphicsImageManager::new();
        assert!(matches!(images.transmit_png(b"png"), Err(ImageError::Inactive)));
    }

    #[test]
    fn small_image_is_one_chunk() {
        let (writer, mut rx) = WriteScheduler::channel();
        let mut images = GraphicsImageManager::new();
        images.activate(&writer).unwrap();
        let id = images.transmit_png(b"abc").unwrap();
        assert_eq!(id, 1);
        assert_eq!(drain(&mut rx), "\x1b_Ga=T,f=100,i=1,m=0;YWJj\x1b\\");
    }

    #[test]
    fn large_image_is_chunked() {
        let (writer, mut rx) = WriteScheduler::channel();
        let mut images = GraphicsImageManager::new();
        images.activate(&writer).unwrap();
        images.transmit_png(&vec![0u8; 4000]).unwrap();
        let out = drain(&mut rx);
        assert!(out.starts_with("\x1b_Ga=T,f=100,i=1,m=1;"));
        assert_eq!(out.matches("\x1b_Gm=1;").count(), 0);
        assert_eq!(out.matches("\x1b_Gm=0;").count(), 1);
        assert_eq!(out.matches("\x1b\\").count(), 2);
    }

    #[test]
    fn deactivate_deletes_every_image_once() {
        let (writer, mut rx) = WriteScheduler::channel();
        let mut images = GraphicsImageManager::new();
        images.activate(&writer).unwrap();
        images.transmit_png(b"a").unwrap();
        images.transmit_png(b"b").unwrap();
        drain(&mut rx);

        images.deactivate().unwrap();
        images.deactivate().unwrap();
        assert_eq!(
            drain(&mut rx),
            "\x1b_Ga=d,d=I,i=1\x1b\\\x1b_Ga=d,d=I,i=2\x1b\\"
        );
        assert!(images.transmitted().is_empty());
    }
}
