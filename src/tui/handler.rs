//! Session handler: lifecycle, hooks and the per-session context.
//!
//! A [`Handler`] implements the behaviour of one interactive full-screen
//! mode. Everything it may touch while running (output, shortcuts, the
//! image subsystem, the terminal) lives in its [`Context`], which the event
//! loop passes to every hook.

use std::collections::HashMap;
use std::fmt::Display;

use bytes::Bytes;
use tokio::sync::mpsc;

use super::debug::DebugSink;
use super::events::{KeyEvent, LoopEvent, Modifiers, MouseEvent, ScreenSize};
use super::images::{ImageError, ImageManager};
use super::operations::Commander;
use super::term_manager::TermManager;
use crate::protocol::RcResponse;

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("session setup failed: {0:#}")]
    Setup(anyhow::Error),
    #[error("session teardown failed: {0:#}")]
    Teardown(anyhow::Error),
    #[error("terminal I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image subsystem error: {0}")]
    Image(#[from] ImageError),
}

// ── Output ─────────────────────────────────────────────────────────

/// Queue of bytes bound for the terminal. Writes never block; the event
/// loop flushes the queue after every dispatched event.
#[derive(Clone, Debug)]
pub struct WriteScheduler {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl WriteScheduler {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn write(&self, data: impl AsRef<[u8]>) {
        let data = Bytes::copy_from_slice(data.as_ref());
        if self.tx.send(data).is_err() {
            tracing::debug!("output closed, dropping write");
        }
    }
}

// ── Shortcuts ──────────────────────────────────────────────────────

/// What fires a shortcut: literal text, or a key with its modifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Trigger {
    Text(String),
    Key { key: u32, mods: Modifiers },
}

impl From<&str> for Trigger {
    fn from(text: &str) -> Self {
        Trigger::Text(text.to_string())
    }
}

impl From<String> for Trigger {
    fn from(text: String) -> Self {
        Trigger::Text(text)
    }
}

/// A bare key code means "no modifiers".
impl From<u32> for Trigger {
    fn from(key: u32) -> Self {
        Trigger::Key {
            key,
            mods: Modifiers::empty(),
        }
    }
}

impl From<(u32, Modifiers)> for Trigger {
    fn from((key, mods): (u32, Modifiers)) -> Self {
        Trigger::Key { key, mods }
    }
}

/// Two independent tables: text → action and (key, mods) → action.
#[derive(Debug, Clone)]
pub struct Shortcuts<A> {
    text: HashMap<String, A>,
    keys: HashMap<(u32, Modifiers), A>,
}

impl<A> Default for Shortcuts<A> {
    fn default() -> Self {
        Self {
            text: HashMap::new(),
            keys: HashMap::new(),
        }
    }
}

impl<A: Clone> Shortcuts<A> {
    pub fn add(&mut self, action: A, trigger: Trigger) {
        match trigger {
            Trigger::Text(text) => {
                self.text.insert(text, action);
            }
            Trigger::Key { key, mods } => {
                self.keys.insert((key, mods), action);
            }
        }
    }

    pub fn for_text(&self, text: &str) -> Option<A> {
        self.text.get(text).cloned()
    }

    pub fn for_key(&self, event: &KeyEvent) -> Option<A> {
        self.keys.get(&(event.key, event.mods)).cloned()
    }
}

// ── Context ────────────────────────────────────────────────────────

/// Everything a handler may use while its session runs.
pub struct Context<A> {
    pub(crate) screen_size: ScreenSize,
    pub(crate) writer: WriteScheduler,
    pub(crate) term: TermManager,
    pub(crate) debug: DebugSink,
    pub(crate) image_manager: Option<Box<dyn ImageManager>>,
    shortcuts: Option<Shortcuts<A>>,
    keep_going: bool,
    return_code: i32,
}

impl<A: Clone> Context<A> {
    pub fn new(screen_size: ScreenSize, writer: WriteScheduler, term: TermManager) -> Self {
        Self {
            screen_size,
            writer,
            term,
            debug: DebugSink::new(),
            image_manager: None,
            shortcuts: None,
            keep_going: true,
            return_code: 0,
        }
    }

    pub fn with_image_manager(mut self, images: impl ImageManager + 'static) -> Self {
        self.image_manager = Some(Box::new(images));
        self
    }

    pub fn screen_size(&self) -> ScreenSize {
        self.screen_size
    }

    /// Queue raw bytes (or UTF-8 text) for the terminal.
    pub fn write(&self, data: impl AsRef<[u8]>) {
        self.writer.write(data);
    }

    /// Write `args` separated by spaces, followed by `\r\n`.
    pub fn print<I>(&self, args: I)
    where
        I: IntoIterator,
        I::Item: Display,
    {
        self.print_with(args, " ", "\r\n");
    }

    pub fn print_with<I>(&self, args: I, sep: &str, end: &str)
    where
        I: IntoIterator,
        I::Item: Display,
    {
        let mut line = args
            .into_iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(sep);
        line.push_str(end);
        self.write(line);
    }

    /// Terminal control sequences, written through this context.
    pub fn cmd(&self) -> Commander<'_> {
        Commander::new(&self.writer)
    }

    pub fn debug<I>(&self, parts: I)
    where
        I: IntoIterator,
        I::Item: Display,
    {
        self.debug.debug(parts);
    }

    pub fn debug_sink(&self) -> &DebugSink {
        &self.debug
    }

    pub fn image_manager(&mut self) -> Option<&mut (dyn ImageManager + 'static)> {
        self.image_manager.as_deref_mut()
    }

    /// Ask the loop to stop at its next safe point. A `None` code keeps any
    /// code set earlier (0 by default).
    pub fn quit_loop(&mut self, return_code: Option<i32>) {
        if let Some(code) = return_code {
            self.return_code = code;
        }
        self.keep_going = false;
    }

    pub fn quit_requested(&self) -> bool {
        !self.keep_going
    }

    pub fn return_code(&self) -> i32 {
        self.return_code
    }

    pub fn add_shortcut(&mut self, action: A, trigger: impl Into<Trigger>) {
        self.shortcuts
            .get_or_insert_with(Shortcuts::default)
            .add(action, trigger.into());
    }

    pub fn shortcut_action_for_key(&self, event: &KeyEvent) -> Option<A> {
        self.shortcuts.as_ref()?.for_key(event)
    }

    pub fn shortcut_action_for_text(&self, text: &str) -> Option<A> {
        self.shortcuts.as_ref()?.for_text(text)
    }

    /// Leave interactive mode while `f` runs. See [`TermManager::suspend`].
    pub fn suspend<T>(&mut self, f: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
        self.term.suspend(f)
    }

    /// Background the whole process until it is continued.
    pub fn suspend_process(&mut self) -> anyhow::Result<()> {
        self.term.suspend_process()
    }
}

// ── Handler ────────────────────────────────────────────────────────

/// Behaviour of one interactive full-screen mode.
///
/// Every hook has a default; hooks not overridden ignore their event.
#[allow(unused_variables)]
pub trait Handler {
    /// Value bound to shortcuts.
    type Action: Clone;

    fn initialize(&mut self, cx: &mut Context<Self::Action>) -> anyhow::Result<()> {
        Ok(())
    }

    fn finalize(&mut self, cx: &mut Context<Self::Action>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called after the context already holds the new size.
    fn on_resize(&mut self, cx: &mut Context<Self::Action>, size: ScreenSize) {}

    /// The terminal hung up.
    fn on_term(&mut self, cx: &mut Context<Self::Action>) {
        cx.quit_loop(Some(1));
    }

    fn on_text(&mut self, cx: &mut Context<Self::Action>, text: &str, in_bracketed_paste: bool) {}

    fn on_key(&mut self, cx: &mut Context<Self::Action>, event: &KeyEvent) {}

    fn on_mouse(&mut self, cx: &mut Context<Self::Action>, event: &MouseEvent) {}

    fn on_interrupt(&mut self, cx: &mut Context<Self::Action>) {}

    fn on_eot(&mut self, cx: &mut Context<Self::Action>) {}

    fn on_rc_response(&mut self, cx: &mut Context<Self::Action>, response: &RcResponse) {}

    fn on_clipboard_response(
        &mut self,
        cx: &mut Context<Self::Action>,
        text: &str,
        from_primary: bool,
    ) {
    }

    fn on_capability_response(&mut self, cx: &mut Context<Self::Action>, name: &str, value: &str) {}

    /// A key or text event matched a registered shortcut.
    fn on_shortcut(&mut self, cx: &mut Context<Self::Action>, action: Self::Action) {}
}

// ── Lifecycle ──────────────────────────────────────────────────────

/// An entered session. Hooks may only be dispatched through this guard.
///
/// Teardown runs exactly once: through [`ActiveSession::exit`], or on drop
/// if `exit` was never called. Either way the handler's `finalize` runs
/// before the debug sink is detached and the image subsystem deactivated,
/// and the release steps run even when `finalize` fails.
pub struct ActiveSession<'a, H: Handler> {
    handler: &'a mut H,
    cx: &'a mut Context<H::Action>,
    exited: bool,
    released: bool,
}

/// Enter `handler`'s session: activate the image subsystem, attach the
/// debug sink, then run `initialize`.
///
/// If `initialize` fails the resources acquired so far are released and
/// `finalize` is not run.
pub fn enter<'a, H: Handler>(
    handler: &'a mut H,
    cx: &'a mut Context<H::Action>,
) -> Result<ActiveSession<'a, H>, HandlerError> {
    if let Some(images) = cx.image_manager.as_mut() {
        images.activate(&cx.writer)?;
    }
    cx.debug.attach(cx.writer.clone());

    let mut session = ActiveSession {
        handler,
        cx,
        exited: false,
        released: false,
    };
    if let Err(e) = session.handler.initialize(&mut *session.cx) {
        session.exited = true;
        if let Err(release_err) = session.release() {
            tracing::warn!(error = %release_err, "failed to release session resources");
        }
        return Err(HandlerError::Setup(e));
    }
    tracing::debug!("session entered");
    Ok(session)
}

impl<'a, H: Handler> ActiveSession<'a, H> {
    pub fn context(&mut self) -> &mut Context<H::Action> {
        &mut *self.cx
    }

    pub fn handler(&mut self) -> &mut H {
        &mut *self.handler
    }

    /// Deliver one event to the matching hook.
    ///
    /// Key and text events consult the shortcut tables first and go to
    /// `on_shortcut` on a hit.
    pub fn dispatch(&mut self, event: LoopEvent) {
        let (handler, cx) = (&mut *self.handler, &mut *self.cx);
        match event {
            LoopEvent::Resize(size) => {
                let size = size.or_cells_of(cx.screen_size);
                cx.screen_size = size;
                handler.on_resize(cx, size);
            }
            LoopEvent::Key(key) => match cx.shortcut_action_for_key(&key) {
                Some(action) => handler.on_shortcut(cx, action),
                None => handler.on_key(cx, &key),
            },
            LoopEvent::Text {
                text,
                in_bracketed_paste,
            } => match cx.shortcut_action_for_text(&text) {
                Some(action) => handler.on_shortcut(cx, action),
                None => handler.on_text(cx, &text, in_bracketed_paste),
            },
            LoopEvent::Mouse(event) => handler.on_mouse(cx, &event),
            LoopEvent::Interrupt => handler.on_interrupt(cx),
            LoopEvent::Eot => handler.on_eot(cx),
            LoopEvent::Hangup => handler.on_term(cx),
            LoopEvent::RcResponse(response) => handler.on_rc_response(cx, &response),
            LoopEvent::ClipboardResponse { text, from_primary } => {
                handler.on_clipboard_response(cx, &text, from_primary)
            }
            LoopEvent::CapabilityResponse { name, value } => {
                handler.on_capability_response(cx, &name, &value)
            }
        }
    }

    /// Tear the session down: `finalize`, then detach the debug sink and
    /// deactivate the image subsystem.
    pub fn exit(mut self) -> Result<(), HandlerError> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<(), HandlerError> {
        if self.exited {
            return Ok(());
        }
        self.exited = true;
        let finalized = self.handler.finalize(&mut *self.cx);
        let released = self.release();
        tracing::debug!("session exited");
        finalized.map_err(HandlerError::Teardown)?;
        released?;
        Ok(())
    }

    fn release(&mut self) -> Result<(), HandlerError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.cx.debug.detach();
        if let Some(images) = self.cx.image_manager.as_mut() {
            images.deactivate()?;
        }
        Ok(())
    }
}

impl<H: Handler> Drop for ActiveSession<'_, H> {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            tracing::warn!(error = %e, "session teardown failed");
        }
    }
}
