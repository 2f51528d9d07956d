//! Input events delivered to a session.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bitflags::bitflags;
use crossterm::event::{
    Event, KeyCode, KeyEvent as CtKeyEvent, KeyEventKind as CtKeyEventKind, KeyModifiers,
    MouseButton as CtMouseButton, MouseEvent as CtMouseEvent, MouseEventKind as CtMouseEventKind,
};

use super::operations::hex_decode;
use crate::protocol::RcResponse;

bitflags! {
    /// Modifier bitmask. Bit values follow the kitty keyboard protocol.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const ALT = 0b0010;
        const CTRL = 0b0100;
        const SUPER = 0b1000;
    }
}

impl From<KeyModifiers> for Modifiers {
    fn from(m: KeyModifiers) -> Self {
        let mut mods = Modifiers::empty();
        mods.set(Modifiers::SHIFT, m.contains(KeyModifiers::SHIFT));
        mods.set(Modifiers::ALT, m.contains(KeyModifiers::ALT));
        mods.set(Modifiers::CTRL, m.contains(KeyModifiers::CONTROL));
        mods.set(Modifiers::SUPER, m.contains(KeyModifiers::SUPER));
        mods
    }
}

/// Key codes. Text keys use their Unicode code point; functional keys use
/// the private-use codes of the kitty keyboard protocol.
pub mod keys {
    pub const TAB: u32 = 9;
    pub const ENTER: u32 = 13;
    pub const ESCAPE: u32 = 27;
    pub const BACKSPACE: u32 = 127;
    pub const INSERT: u32 = 57348;
    pub const DELETE: u32 = 57349;
    pub const LEFT: u32 = 57350;
    pub const RIGHT: u32 = 57351;
    pub const UP: u32 = 57352;
    pub const DOWN: u32 = 57353;
    pub const PAGE_UP: u32 = 57354;
    pub const PAGE_DOWN: u32 = 57355;
    pub const HOME: u32 = 57356;
    pub const END: u32 = 57357;
    pub const F1: u32 = 57364;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyEventKind {
    #[default]
    Press,
    Repeat,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: u32,
    pub mods: Modifiers,
    pub kind: KeyEventKind,
}

impl KeyEvent {
    pub fn new(key: u32, mods: Modifiers) -> Self {
        Self {
            key,
            mods,
            kind: KeyEventKind::Press,
        }
    }

    /// Convert a crossterm key event. Returns `None` for keys with no code here.
    pub fn from_crossterm(ev: &CtKeyEvent) -> Option<Self> {
        let key = match ev.code {
            KeyCode::Char(c) => c.to_ascii_lowercase() as u32,
            KeyCode::Tab | KeyCode::BackTab => keys::TAB,
            KeyCode::Enter => keys::ENTER,
            KeyCode::Esc => keys::ESCAPE,
            KeyCode::Backspace => keys::BACKSPACE,
            KeyCode::Insert => keys::INSERT,
            KeyCode::Delete => keys::DELETE,
            KeyCode::Left => keys::LEFT,
            KeyCode::Right => keys::RIGHT,
            KeyCode::Up => keys::UP,
            KeyCode::Down => keys::DOWN,
            KeyCode::PageUp => keys::PAGE_UP,
            KeyCode::PageDown => keys::PAGE_DOWN,
            KeyCode::Home => keys::HOME,
            KeyCode::End => keys::END,
            KeyCode::F(n @ 1..=35) => keys::F1 + u32::from(n) - 1,
            _ => return None,
        };
        let mut mods = Modifiers::from(ev.modifiers);
        if ev.code == KeyCode::BackTab {
            mods |= Modifiers::SHIFT;
        }
        let kind = match ev.kind {
            CtKeyEventKind::Press => KeyEventKind::Press,
            CtKeyEventKind::Repeat => KeyEventKind::Repeat,
            CtKeyEventKind::Release => KeyEventKind::Release,
        };
        Some(Self { key, mods, kind })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    WheelUp,
    WheelDown,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseEventKind {
    Press,
    Release,
    Move,
    Drag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    /// Zero-based cell coordinates.
    pub x: u16,
    pub y: u16,
    pub button: MouseButton,
    pub kind: MouseEventKind,
    pub mods: Modifiers,
}

impl MouseEvent {
    pub fn from_crossterm(ev: &CtMouseEvent) -> Option<Self> {
        let button = |b: CtMouseButton| match b {
            CtMouseButton::Left => MouseButton::Left,
            CtMouseButton::Middle => MouseButton::Middle,
            CtMouseButton::Right => MouseButton::Right,
        };
        let (button, kind) = match ev.kind {
            CtMouseEventKind::Down(b) => (button(b), MouseEventKind::Press),
            CtMouseEventKind::Up(b) => (button(b), MouseEventKind::Release),
            CtMouseEventKind::Drag(b) => (button(b), MouseEventKind::Drag),
            CtMouseEventKind::Moved => (MouseButton::None, MouseEventKind::Move),
            CtMouseEventKind::ScrollUp => (MouseButton::WheelUp, MouseEventKind::Press),
            CtMouseEventKind::ScrollDown => (MouseButton::WheelDown, MouseEventKind::Press),
            _ => return None,
        };
        Some(Self {
            x: ev.column,
            y: ev.row,
            button,
            kind,
            mods: Modifiers::from(ev.modifiers),
        })
    }
}

/// Size of the screen a session draws on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScreenSize {
    pub rows: u16,
    pub cols: u16,
    /// Pixel dimensions, zero when the terminal does not report them.
    pub width: u16,
    pub height: u16,
    pub cell_width: u16,
    pub cell_height: u16,
}

impl ScreenSize {
    pub fn new(rows: u16, cols: u16) -> Self {
        Self {
            rows,
            cols,
            ..Default::default()
        }
    }

    pub fn with_pixels(mut self, width: u16, height: u16) -> Self {
        self.width = width;
        self.height = height;
        self.cell_width = if self.cols > 0 { width / self.cols } else { 0 };
        self.cell_height = if self.rows > 0 { height / self.rows } else { 0 };
        self
    }

    /// Fill in pixel dimensions from `previous` when this size has none.
    ///
    /// Resize notifications usually only carry cells; the cell size stays
    /// the same across a resize.
    pub fn or_cells_of(mut self, previous: ScreenSize) -> Self {
        if self.cell_width == 0 && self.cell_height == 0 {
            self.cell_width = previous.cell_width;
            self.cell_height = previous.cell_height;
            self.width = self.cols.saturating_mul(self.cell_width);
            self.height = self.rows.saturating_mul(self.cell_height);
        }
        self
    }
}

/// One event for a session, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopEvent {
    Resize(ScreenSize),
    Key(KeyEvent),
    Mouse(MouseEvent),
    Text {
        text: String,
        in_bracketed_paste: bool,
    },
    Interrupt,
    /// End of transmission (Ctrl+D).
    Eot,
    /// The terminal hung up.
    Hangup,
    RcResponse(RcResponse),
    ClipboardResponse {
        text: String,
        from_primary: bool,
    },
    CapabilityResponse {
        name: String,
        value: String,
    },
}

impl LoopEvent {
    /// Translate a terminal event.
    ///
    /// Unmodified printable keys become text; Ctrl+C and Ctrl+D become
    /// `Interrupt` and `Eot`; pastes arrive as bracketed text.
    pub fn from_crossterm(event: Event) -> Option<Self> {
        match event {
            Event::Key(ev) => {
                if ev.kind == CtKeyEventKind::Release {
                    return None;
                }
                let ctrl = ev.modifiers.contains(KeyModifiers::CONTROL);
                match ev.code {
                    KeyCode::Char('c') if ctrl => Some(LoopEvent::Interrupt),
                    KeyCode::Char('d') if ctrl => Some(LoopEvent::Eot),
                    KeyCode::Char(c)
                        if !ev.modifiers.intersects(
                            KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER,
                        ) =>
                    {
                        Some(LoopEvent::Text {
                            text: c.to_string(),
                            in_bracketed_paste: false,
                        })
                    }
                    _ => KeyEvent::from_crossterm(&ev).map(LoopEvent::Key),
                }
            }
            Event::Mouse(ev) => MouseEvent::from_crossterm(&ev).map(LoopEvent::Mouse),
            Event::Paste(text) => Some(LoopEvent::Text {
                text,
                in_bracketed_paste: true,
            }),
            Event::Resize(cols, rows) => Some(LoopEvent::Resize(ScreenSize::new(rows, cols))),
            Event::FocusGained | Event::FocusLost => None,
        }
    }

    /// Parse one complete reply the terminal sent to an earlier request:
    /// an OSC 52 clipboard answer, an XTGETTCAP answer or an in-band
    /// remote-control response.
    ///
    /// For event sources that read raw terminal input. crossterm's
    /// `EventStream` consumes these sequences without reporting them.
    pub fn from_terminal_reply(reply: &[u8]) -> Option<Self> {
        let reply = std::str::from_utf8(reply).ok()?;
        let body = reply
            .strip_suffix("\x1b\\")
            .or_else(|| reply.strip_suffix('\x07'))?;

        if let Some(rest) = body.strip_prefix("\x1b]52;") {
            let (which, data) = rest.split_once(';')?;
            let decoded = STANDARD.decode(data).ok()?;
            return Some(LoopEvent::ClipboardResponse {
                text: String::from_utf8_lossy(&decoded).into_owned(),
                from_primary: which.contains('p'),
            });
        }
        if let Some(rest) = body.strip_prefix("\x1bP1+r") {
            let (name, value) = rest.split_once('=').unwrap_or((rest, ""));
            return Some(LoopEvent::CapabilityResponse {
                name: hex_decode(name)?,
                value: hex_decode(value)?,
            });
        }
        if let Some(json) = body.strip_prefix("\x1bP@kitty-cmd") {
            return match serde_json::from_str::<RcResponse>(json) {
                Ok(response) => Some(LoopEvent::RcResponse(response)),
                Err(e) => {
                    tracing::warn!(error = %e, "malformed remote control response");
                    None
                }
            };
        }
        None
    }
}
