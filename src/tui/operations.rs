use std::fmt::{self, Write as _};

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::style::{Attribute, Print, ResetColor, SetAttribute};
use crossterm::terminal::{Clear, ClearType, SetTitle};
use crossterm::Command;

use super::handler::WriteScheduler;
use crate::protocol::{dcs, RemoteCommandMsg};

/// Writes terminal control sequences through a session's write scheduler.
pub struct Commander<'a> {
    writer: &'a WriteScheduler,
}

impl<'a> Commander<'a> {
    pub fn new(writer: &'a WriteScheduler) -> Self {
        Self { writer }
    }

    fn emit(&self, command: impl Command) -> &Self {
        let mut buf = String::new();
        match command.write_ansi(&mut buf) {
            Ok(()) => self.writer.write(buf),
            Err(fmt::Error) => tracing::warn!("failed to encode terminal command"),
        }
        self
    }

    pub fn clear_screen(&self) -> &Self {
        self.emit(Clear(ClearType::All)).emit(MoveTo(0, 0))
    }

    pub fn set_cursor_visible(&self, visible: bool) -> &Self {
        if visible {
            self.emit(Show)
        } else {
            self.emit(Hide)
        }
    }

    /// Move to a zero-based cell.
    pub fn set_cursor_position(&self, x: u16, y: u16) -> &Self {
        self.emit(MoveTo(x, y))
    }

    pub fn set_window_title(&self, title: &str) -> &Self {
        self.emit(SetTitle(title))
    }

    pub fn print(&self, text: &str) -> &Self {
        self.emit(Print(text))
    }

    /// `text` in reverse video.
    pub fn print_highlighted(&self, text: &str) -> &Self {
        self.emit(SetAttribute(Attribute::Reverse))
            .emit(Print(text))
            .emit(SetAttribute(Attribute::Reset))
            .emit(ResetColor)
    }

    /// Ask the terminal for the clipboard (or primary selection) contents.
    ///
    /// The reply becomes a clipboard response event only when the event
    /// source passes raw replies through [`LoopEvent::from_terminal_reply`].
    /// crossterm's `EventStream`, which `termrc run` reads from, does not
    /// surface OSC 52 replies.
    ///
    /// [`LoopEvent::from_terminal_reply`]: super::events::LoopEvent::from_terminal_reply
    pub fn request_clipboard(&self, primary: bool) -> &Self {
        let which = if primary { 'p' } else { 'c' };
        self.writer.write(format!("\x1b]52;{which};?\x1b\\"));
        self
    }

    /// Query terminfo capabilities (XTGETTCAP).
    ///
    /// Same caveat as [`Commander::request_clipboard`]: answers are only
    /// delivered by event sources that parse raw terminal replies.
    pub fn query_capabilities(&self, names: &[&str]) -> &Self {
        let hex: Vec<String> = names.iter().map(|n| hex_encode(n)).collect();
        self.writer.write(format!("\x1bP+q{}\x1b\\", hex.join(";")));
        self
    }

    /// Send a remote-control command in-band to the terminal.
    pub fn send_rc_command(&self, msg: &RemoteCommandMsg) -> Result<&Self, serde_json::Error> {
        self.writer.write(dcs::encode(msg)?);
        Ok(self)
    }
}

pub(crate) fn hex_encode(text: &str) -> String {
    text.bytes().fold(String::with_capacity(text.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

pub(crate) fn hex_decode(hex: &str) -> Option<String> {
    if hex.len() % 2 != 0 {
        return None;
    }
    let bytes = (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect::<Option<Vec<u8>>>()?;
    String::from_utf8(bytes).ok()
}
