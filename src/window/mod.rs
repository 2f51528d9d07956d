//! Window container.
//!
//! Remote-control commands only see windows through the [`Boss`] trait.
//! [`WindowRegistry`] is the in-process implementation: a shared, lock-protected
//! list of windows that broadcasts lifecycle events.

pub mod matcher;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::rc::result::InputType;

pub use matcher::{MatchExpr, MatchParseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// How to open a window. Also the `[[windows]]` entry of the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSpec {
    pub title: String,
    pub cwd: String,
    pub cmdline: Vec<String>,
    pub env: BTreeMap<String, String>,
}

/// Snapshot of one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Window {
    pub id: WindowId,
    pub title: String,
    pub cwd: String,
    pub pid: Option<u32>,
    pub cmdline: Vec<String>,
    pub env: BTreeMap<String, String>,
    /// Screen and scrollback text, possibly with SGR escapes.
    #[serde(skip)]
    pub contents: String,
    #[serde(skip)]
    pub selection: Option<String>,
}

impl Window {
    pub fn from_spec(id: WindowId, spec: WindowSpec) -> Self {
        Self {
            id,
            title: spec.title,
            cwd: spec.cwd,
            pid: None,
            cmdline: spec.cmdline,
            env: spec.env,
            contents: String::new(),
            selection: None,
        }
    }

    /// Window text in the form a result handler asked for.
    pub fn text_for(&self, input: InputType) -> Option<String> {
        match input {
            InputType::Selection => self.selection.clone(),
            InputType::Ansi | InputType::ScreenAnsi | InputType::AnsiHistory => {
                Some(self.contents.clone())
            }
            InputType::Text | InputType::Screen | InputType::History => {
                Some(strip_sgr(&self.contents))
            }
        }
    }
}

fn strip_sgr(text: &str) -> String {
    thread_local! {
        static SGR: Regex = Regex::new("\x1b\\[[0-9;:]*m").expect("static SGR pattern");
    }
    SGR.with(|re| re.replace_all(text, "").into_owned())
}

#[derive(Debug, thiserror::Error)]
pub enum BossError {
    #[error("window not found: {0}")]
    NotFound(WindowId),
    #[error("window {id} refused: {reason}")]
    Refused { id: WindowId, reason: String },
}

/// The window container as seen by remote-control commands.
///
/// Reads never mutate container state. Enumeration order is stable while the
/// container is unchanged.
pub trait Boss: Send + Sync {
    /// All windows, in enumeration order.
    fn windows(&self) -> Vec<Window>;

    fn active_window(&self) -> Option<Window>;

    fn close_window(&self, window: &Window) -> Result<(), BossError>;

    fn focus_window(&self, window: &Window) -> Result<(), BossError>;

    fn set_window_title(&self, window: &Window, title: &str) -> Result<(), BossError>;

    fn window(&self, id: WindowId) -> Option<Window> {
        self.windows().into_iter().find(|w| w.id == id)
    }

    /// Windows selected by `expression`, in enumeration order.
    ///
    /// An expression that does not parse selects nothing.
    fn match_windows(&self, expression: &str) -> Vec<Window> {
        let expr: MatchExpr = match expression.parse() {
            Ok(expr) => expr,
            Err(e) => {
                tracing::warn!(expression, error = %e, "invalid match expression");
                return Vec::new();
            }
        };
        let focused = self.active_window().map(|w| w.id);
        self.windows()
            .into_iter()
            .filter(|w| expr.matches(w, Some(w.id) == focused))
            .collect()
    }
}

/// Window lifecycle events.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowEvent {
    Opened { id: WindowId },
    Closed { id: WindowId },
    Focused { id: WindowId },
    Retitled { id: WindowId, title: String },
}

struct RegistryInner {
    windows: Vec<Window>,
    next_id: u64,
    focused: Option<WindowId>,
}

impl RegistryInner {
    fn position(&self, id: WindowId) -> Option<usize> {
        self.windows.iter().position(|w| w.id == id)
    }
}

/// Shared window container.
#[derive(Clone)]
pub struct WindowRegistry {
    inner: Arc<RwLock<RegistryInner>>,
    events_tx: broadcast::Sender<WindowEvent>,
}

impl Default for WindowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowRegistry {
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(RwLock::new(RegistryInner {
                windows: Vec::new(),
                next_id: 1,
                focused: None,
            })),
            events_tx,
        }
    }

    /// Open a window. The first window opened takes focus.
    pub fn open(&self, spec: WindowSpec) -> Window {
        let mut inner = self.inner.write();
        let id = WindowId(inner.next_id);
        inner.next_id += 1;
        let window = Window::from_spec(id, spec);
        inner.windows.push(window.clone());
        if inner.focused.is_none() {
            inner.focused = Some(id);
        }
        let _ = self.events_tx.send(WindowEvent::Opened { id });
        window
    }

    /// Replace the text a window shows, for result handlers that read it.
    pub fn set_contents(
        &self,
        id: WindowId,
        contents: String,
        selection: Option<String>,
    ) -> Result<(), BossError> {
        let mut inner = self.inner.write();
        let pos = inner.position(id).ok_or(BossError::NotFound(id))?;
        inner.windows[pos].contents = contents;
        inner.windows[pos].selection = selection;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.read().windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WindowEvent> {
        self.events_tx.subscribe()
    }
}

impl Boss for WindowRegistry {
    fn windows(&self) -> Vec<Window> {
        self.inner.read().windows.clone()
    }

    fn window(&self, id: WindowId) -> Option<Window> {
        let inner = self.inner.read();
        inner.position(id).map(|pos| inner.windows[pos].clone())
    }

    fn active_window(&self) -> Option<Window> {
        let inner = self.inner.read();
        let id = inner.focused?;
        inner.position(id).map(|pos| inner.windows[pos].clone())
    }

    /// Closing the focused window moves focus to the last remaining window.
    fn close_window(&self, window: &Window) -> Result<(), BossError> {
        let mut inner = self.inner.write();
        let pos = inner.position(window.id).ok_or(BossError::NotFound(window.id))?;
        inner.windows.remove(pos);
        if inner.focused == Some(window.id) {
            inner.focused = inner.windows.last().map(|w| w.id);
            if let Some(id) = inner.focused {
                let _ = self.events_tx.send(WindowEvent::Focused { id });
            }
        }
        let _ = self.events_tx.send(WindowEvent::Closed { id: window.id });
        tracing::debug!(window = %window.id, "window closed");
        Ok(())
    }

    fn focus_window(&self, window: &Window) -> Result<(), BossError> {
        let mut inner = self.inner.write();
        inner.position(window.id).ok_or(BossError::NotFound(window.id))?;
        inner.focused = Some(window.id);
        let _ = self.events_tx.send(WindowEvent::Focused { id: window.id });
        Ok(())
    }

    fn set_window_title(&self, window: &Window, title: &str) -> Result<(), BossError> {
        let mut inner = self.inner.write();
        let pos = inner.position(window.id).ok_or(BossError::NotFound(window.id))?;
        inner.windows[pos].title = title.to_string();
        let _ = self.events_tx.send(WindowEvent::Retitled {
            id: window.id,
            title: title.to_string(),
        });
        Ok(())
    }
}
