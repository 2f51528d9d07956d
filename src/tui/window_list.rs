//! The interactive window list shown by `termrc run`.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;

use super::events::{keys, Modifiers, MouseButton, MouseEvent, MouseEventKind, ScreenSize};
use super::handler::{Context, Handler};
use crate::protocol::RcResponse;
use crate::rc::result::{dispatch_result, HandleResult};
use crate::rc::{CommandRegistry, GlobalOptions};
use crate::window::{Boss, WindowId, WindowRegistry};

/// Rows above the list.
const HEADER_ROWS: u16 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    Up,
    Down,
    Close,
    Focus,
    Suspend,
}

/// Lists the session's windows and drives them with remote-control commands.
///
/// Commands issued from the list go through the same registry as commands
/// from the socket, and their responses come back on the `responses` channel
/// so they arrive as ordinary loop events.
pub struct WindowList {
    boss: WindowRegistry,
    commands: Arc<CommandRegistry>,
    responses: mpsc::UnboundedSender<RcResponse>,
    selected: usize,
    status: String,
}

impl WindowList {
    pub fn new(
        boss: WindowRegistry,
        commands: Arc<CommandRegistry>,
        responses: mpsc::UnboundedSender<RcResponse>,
    ) -> Self {
        Self {
            boss,
            commands,
            responses,
            selected: 0,
            status: String::new(),
        }
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    fn selected_window(&self) -> Option<WindowId> {
        self.boss.windows().get(self.selected).map(|w| w.id)
    }

    fn clamp_selection(&mut self) {
        let len = self.boss.len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }

    /// Encode and apply `verb` as if it had come over the socket.
    fn remote(&mut self, verb: &str, argv: &[&str]) {
        let argv: Vec<String> = argv.iter().map(|s| s.to_string()).collect();
        let response = match self.commands.encode(verb, &argv, &GlobalOptions::default()) {
            Ok(msg) => self.commands.respond(&self.boss, &msg).0,
            Err(e) => RcResponse::failure(verb, e.to_string()),
        };
        if self.responses.send(response).is_err() {
            tracing::debug!(verb, "response channel closed");
        }
    }

    fn focus_selected(&mut self) {
        let focus = HandleResult::new(|_args, _data, target, boss| {
            let Some(window) = target.and_then(|id| boss.window(id)) else {
                return Ok(None);
            };
            boss.focus_window(&window)?;
            Ok(Some(json!({ "focused": window.id })))
        })
        .without_ui();

        self.status = match dispatch_result(&focus, &[], &self.boss, self.selected_window()) {
            Ok(dispatched) => match dispatched.response {
                Some(value) => format!("focused window {}", value["focused"]),
                None => "no window selected".to_string(),
            },
            Err(e) => format!("focus failed: {e:#}"),
        };
    }

    fn draw(&self, cx: &Context<Action>) {
        let size = cx.screen_size();
        let windows = self.boss.windows();
        let active = self.boss.active_window().map(|w| w.id);
        let cmd = cx.cmd();
        cmd.clear_screen().print(&format!(
            "{} window(s)  [j/k] move  [enter] focus  [x] close  [q] quit",
            windows.len()
        ));

        let visible = size.rows.saturating_sub(HEADER_ROWS + 1) as usize;
        for (row, window) in windows.iter().enumerate().take(visible.max(1)) {
            let marker = if Some(window.id) == active { '*' } else { ' ' };
            let line = format!(
                "{marker} {:>3}  {}  {}",
                window.id,
                printable(&window.title),
                printable(&window.cwd)
            );
            cmd.set_cursor_position(0, row as u16 + HEADER_ROWS);
            if row == self.selected {
                cmd.print_highlighted(&line);
            } else {
                cmd.print(&line);
            }
        }
        if !self.status.is_empty() {
            cmd.set_cursor_position(0, size.rows.saturating_sub(1))
                .print(&printable(&self.status));
        }
    }
}

/// `text` without control characters, so remote-supplied strings cannot
/// inject escape sequences into the list.
fn printable(text: &str) -> String {
    text.chars().filter(|c| !c.is_control()).collect()
}

impl Handler for WindowList {
    type Action = Action;

    fn initialize(&mut self, cx: &mut Context<Action>) -> anyhow::Result<()> {
        cx.add_shortcut(Action::Quit, "q");
        cx.add_shortcut(Action::Quit, keys::ESCAPE);
        cx.add_shortcut(Action::Up, "k");
        cx.add_shortcut(Action::Up, keys::UP);
        cx.add_shortcut(Action::Down, "j");
        cx.add_shortcut(Action::Down, keys::DOWN);
        cx.add_shortcut(Action::Close, "x");
        cx.add_shortcut(Action::Focus, keys::ENTER);
        cx.add_shortcut(Action::Suspend, ('z' as u32, Modifiers::CTRL));
        cx.cmd().set_window_title("termrc").set_cursor_visible(false);
        cx.debug([format!("window list started with {} windows", self.boss.len())]);
        self.draw(cx);
        Ok(())
    }

    fn finalize(&mut self, cx: &mut Context<Action>) -> anyhow::Result<()> {
        cx.cmd().clear_screen().set_cursor_visible(true);
        Ok(())
    }

    fn on_resize(&mut self, cx: &mut Context<Action>, _size: ScreenSize) {
        self.draw(cx);
    }

    fn on_interrupt(&mut self, cx: &mut Context<Action>) {
        cx.quit_loop(Some(0));
    }

    fn on_eot(&mut self, cx: &mut Context<Action>) {
        cx.quit_loop(Some(0));
    }

    fn on_mouse(&mut self, cx: &mut Context<Action>, event: &MouseEvent) {
        if event.button != MouseButton::Left || event.kind != MouseEventKind::Press {
            return;
        }
        if let Some(row) = event.y.checked_sub(HEADER_ROWS) {
            if (row as usize) < self.boss.len() {
                self.selected = row as usize;
                self.draw(cx);
            }
        }
    }

    fn on_rc_response(&mut self, cx: &mut Context<Action>, response: &RcResponse) {
        self.status = match &response.error {
            Some(error) => format!("{}: {error}", response.cmd),
            None => format!("{}: ok", response.cmd),
        };
        self.clamp_selection();
        self.draw(cx);
    }

    fn on_shortcut(&mut self, cx: &mut Context<Action>, action: Action) {
        match action {
            Action::Quit => {
                cx.quit_loop(Some(0));
                return;
            }
            Action::Up => self.selected = self.selected.saturating_sub(1),
            Action::Down => {
                if self.selected + 1 < self.boss.len() {
                    self.selected += 1;
                }
            }
            Action::Close => match self.selected_window() {
                Some(id) => {
                    let expr = format!("id:{id}");
                    self.remote("close-window", &["--match", expr.as_str()]);
                }
                None => self.status = "no window selected".to_string(),
            },
            Action::Focus => self.focus_selected(),
            Action::Suspend => {
                if let Err(e) = cx.suspend_process() {
                    self.status = format!("suspend failed: {e:#}");
                }
            }
        }
        self.draw(cx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::events::{KeyEvent, LoopEvent};
    use crate::tui::handler::enter;
    use crate::tui::handler::testing::{context, drain};
    use crate::window::WindowSpec;

    fn setup(
        titles: &[&str],
    ) -> (WindowList, WindowRegistry, mpsc::UnboundedReceiver<RcResponse>) {
        let boss = WindowRegistry::new();
        for t in titles {
            boss.open(WindowSpec {
                title: t.to_string(),
                ..Default::default()
            });
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let list = WindowList::new(boss.clone(), Arc::new(CommandRegistry::builtin()), tx);
        (list, boss, rx)
    }

    fn text(t: &str) -> LoopEvent {
        LoopEvent::Text {
            text: t.to_string(),
            in_bracketed_paste: false,
        }
    }

    #[test]
    fn navigation_stays_in_bounds() {
        let (mut list, _boss, _rx) = setup(&["a", "b"]);
        let (mut cx, _out, _) = context();
        let mut session = enter(&mut list, &mut cx).unwrap();
        session.dispatch(text("j"));
        session.dispatch(text("j"));
        session.dispatch(LoopEvent::Key(KeyEvent::new(keys::UP, Modifiers::empty())));
        session.dispatch(text("k"));
        session.exit().unwrap();
        assert_eq!(list.selected(), 0);
    }

    #[test]
    fn close_goes_through_remote_control() {
        let (mut list, boss, mut rx) = setup(&["a", "b"]);
        let (mut cx, _out, _) = context();
        let mut session = enter(&mut list, &mut cx).unwrap();
        session.dispatch(text("j"));
        session.dispatch(text("x"));

        let response = rx.try_recv().unwrap();
        assert!(response.ok);
        assert_eq!(response.cmd, "close-window");
        let titles: Vec<_> = boss.windows().into_iter().map(|w| w.title).collect();
        assert_eq!(titles, vec!["a"]);

        session.dispatch(LoopEvent::RcResponse(response));
        session.exit().unwrap();
        assert_eq!(list.selected(), 0);
        assert_eq!(list.status(), "close-window: ok");
    }

    #[test]
    fn enter_focuses_selected_window() {
        let (mut list, boss, _rx) = setup(&["a", "b"]);
        let (mut cx, _out, _) = context();
        let mut session = enter(&mut list, &mut cx).unwrap();
        session.dispatch(text("j"));
        session.dispatch(LoopEvent::Key(KeyEvent::new(keys::ENTER, Modifiers::empty())));
        session.exit().unwrap();
        assert_eq!(boss.active_window().map(|w| w.title).as_deref(), Some("b"));
        assert_eq!(list.status(), "focused window 2");
    }

    #[test]
    fn mouse_click_selects_row() {
        let (mut list, _boss, _rx) = setup(&["a", "b", "c"]);
        let (mut cx, _out, _) = context();
        let mut session = enter(&mut list, &mut cx).unwrap();
        session.dispatch(LoopEvent::Mouse(MouseEvent {
            x: 3,
            y: HEADER_ROWS + 2,
            button: MouseButton::Left,
            kind: MouseEventKind::Press,
            mods: Modifiers::empty(),
        }));
        session.exit().unwrap();
        assert_eq!(list.selected(), 2);
    }

    #[test]
    fn titles_are_drawn_without_control_characters() {
        let (mut list, boss, _rx) = setup(&["plain"]);
        let (mut cx, mut out, _) = context();
        let window = boss.windows()[0].clone();
        boss.set_window_title(&window, "\x1b]0;pwned\x07evil\x1b[2J").unwrap();

        let session = enter(&mut list, &mut cx).unwrap();
        session.exit().unwrap();

        let screen = String::from_utf8_lossy(&drain(&mut out)).into_owned();
        assert!(screen.contains("]0;pwnedevil[2J"));
        assert!(!screen.contains("\x1b]0;pwned"));
    }

    #[test]
    fn quit_and_output() {
        let (mut list, _boss, _rx) = setup(&["shell"]);
        let (mut cx, mut out, _) = context();
        let mut session = enter(&mut list, &mut cx).unwrap();
        session.dispatch(text("q"));
        assert!(session.context().quit_requested());
        assert_eq!(session.context().return_code(), 0);
        session.exit().unwrap();

        let screen = String::from_utf8_lossy(&drain(&mut out)).into_owned();
        assert!(screen.contains("1 window(s)"));
        assert!(screen.contains("shell"));
        assert!(screen.ends_with("\x1b[?25h"));
    }
}
