use std::io::{self, Write};

use crossterm::event::{
    DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, size, window_size, EnterAlternateScreen,
    LeaveAlternateScreen,
};
use crossterm::{cursor, execute};

use crate::tui::ScreenSize;

/// Switches the controlling terminal between its normal line mode and the
/// interactive full-screen mode a session runs in.
pub trait TerminalModes: Send {
    fn enter_interactive(&mut self) -> io::Result<()>;
    fn leave_interactive(&mut self) -> io::Result<()>;
}

/// [`TerminalModes`] for the real terminal on stdout.
///
/// Interactive mode is raw mode plus the alternate screen, mouse reporting
/// and bracketed paste.
#[derive(Debug, Clone, Copy)]
pub struct CrosstermModes {
    pub alternate_screen: bool,
    pub mouse: bool,
}

impl Default for CrosstermModes {
    fn default() -> Self {
        Self {
            alternate_screen: true,
            mouse: true,
        }
    }
}

impl TerminalModes for CrosstermModes {
    fn enter_interactive(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut out = io::stdout();
        if self.alternate_screen {
            execute!(out, EnterAlternateScreen)?;
        }
        if self.mouse {
            execute!(out, EnableMouseCapture)?;
        }
        execute!(out, EnableBracketedPaste)?;
        out.flush()
    }

    fn leave_interactive(&mut self) -> io::Result<()> {
        let mut out = io::stdout();
        // Restore as much as possible even when one step fails.
        let mut result = execute!(out, DisableBracketedPaste, cursor::Show);
        if self.mouse {
            result = result.and(execute!(out, DisableMouseCapture));
        }
        if self.alternate_screen {
            result = result.and(execute!(out, LeaveAlternateScreen));
        }
        result.and(disable_raw_mode()).and(out.flush())
    }
}

/// Current size of the terminal on stdout, including pixel dimensions when the
/// terminal reports them.
pub fn terminal_size() -> io::Result<ScreenSize> {
    match window_size() {
        Ok(ws) => Ok(ScreenSize::new(ws.rows, ws.columns).with_pixels(ws.width, ws.height)),
        Err(_) => {
            // Note: crossterm::terminal::size() returns (cols, rows).
            let (cols, rows) = size()?;
            Ok(ScreenSize::new(rows, cols))
        }
    }
}
