use std::fmt::Display;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::Mutex;

use super::handler::WriteScheduler;

/// Debug output for a running session.
///
/// While a session is entered, messages travel in-band to the terminal as a
/// `@kitty-print` escape so they show up in the terminal's own log instead of
/// on the full-screen UI. Otherwise they go to `tracing`.
#[derive(Clone, Default)]
pub struct DebugSink {
    target: Arc<Mutex<Option<WriteScheduler>>>,
}

impl DebugSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, writer: WriteScheduler) {
        *self.target.lock() = Some(writer);
    }

    pub fn detach(&self) {
        self.target.lock().take();
    }

    pub fn is_attached(&self) -> bool {
        self.target.lock().is_some()
    }

    /// Log the space-separated `parts`.
    pub fn debug<I>(&self, parts: I)
    where
        I: IntoIterator,
        I::Item: Display,
    {
        let msg = parts
            .into_iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        match self.target.lock().as_ref() {
            Some(writer) => writer.write(print_sequence(&msg)),
            None => tracing::debug!(target: "termrc::session", "{msg}"),
        }
    }
}

fn print_sequence(msg: &str) -> String {
    format!("\x1bP@kitty-print|{}\x1b\\", STANDARD.encode(msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attached_sink_writes_print_sequence() {
        let (writer, mut rx) = WriteScheduler::channel();
        let sink = DebugSink::new();
        sink.attach(writer);
        sink.debug(["selected", "3"]);
        let chunk = rx.try_recv().unwrap();
        assert_eq!(&chunk[..], b"\x1bP@kitty-print|c2VsZWN0ZWQgMw==\x1b\\");
    }

    #[test]
    fn detached_sink_writes_nothing() {
        let (writer, mut rx) = WriteScheduler::channel();
        let sink = DebugSink::new();
        sink.attach(writer);
        sink.detach();
        assert!(!sink.is_attached());
        sink.debug(["dropped"]);
        assert!(rx.try_recv().is_err());
    }
}
