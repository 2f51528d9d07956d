use clap::{Arg, ArgMatches};

use super::{
    match_window_option, self_window_option, target_from_matches, GlobalOptions, Payload, RcError,
    RemoteCommand, Response, TargetPayload,
};
use crate::window::{Boss, Window};

/// `close-window`: close the matched windows, the calling window, or the
/// active window.
pub struct CloseWindow;

impl RemoteCommand for CloseWindow {
    fn verb(&self) -> &'static str {
        "close-window"
    }

    fn short_desc(&self) -> &'static str {
        "Close the specified window(s)"
    }

    fn options_spec(&self) -> Vec<Arg> {
        vec![
            match_window_option("Which window to close"),
            self_window_option(
                "If specified close the window this command is run in, rather than the active window.",
            ),
        ]
    }

    fn message_to_session(
        &self,
        _global: &GlobalOptions,
        opts: &ArgMatches,
        _args: &[String],
    ) -> Result<Payload, RcError> {
        Payload::from_typed(&target_from_matches(opts))
    }

    fn response_from_session(
        &self,
        boss: &dyn Boss,
        window: Option<&Window>,
        payload: &Payload,
    ) -> Result<Response, RcError> {
        let target: TargetPayload = payload.decode()?;
        for window in target.resolve(boss, window)?.iter().flatten() {
            if let Err(e) = boss.close_window(window) {
                tracing::warn!(window = %window.id, error = %e, "failed to close window");
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::{BossError, WindowId, WindowRegistry, WindowSpec};
    use parking_lot::Mutex;

    /// Boss that refuses to close one window and records every attempt.
    struct FlakyBoss {
        inner: WindowRegistry,
        refuse: WindowId,
        attempts: Mutex<Vec<WindowId>>,
    }

    impl Boss for FlakyBoss {
        fn windows(&self) -> Vec<Window> {
            self.inner.windows()
        }
        fn active_window(&self) -> Option<Window> {
            self.inner.active_window()
        }
        fn close_window(&self, window: &Window) -> Result<(), BossError> {
            self.attempts.lock().push(window.id);
            if window.id == self.refuse {
                return Err(BossError::Refused {
                    id: window.id,
                    reason: "busy".to_string(),
                });
            }
            self.inner.close_window(window)
        }
        fn focus_window(&self, window: &Window) -> Result<(), BossError> {
            self.inner.focus_window(window)
        }
        fn set_window_title(&self, window: &Window, title: &str) -> Result<(), BossError> {
            self.inner.set_window_title(window, title)
        }
    }

    fn open(registry: &WindowRegistry, title: &str) -> Window {
        registry.open(WindowSpec {
            title: title.to_string(),
            ..Default::default()
        })
    }

    fn encode(argv: &[&str]) -> Payload {
        let matches = CloseWindow.cli_command().try_get_matches_from(argv).unwrap();
        CloseWindow
            .message_to_session(&GlobalOptions::default(), &matches, &[])
            .unwrap()
    }

    #[test]
    fn encode_emits_match_and_self() {
        let payload = encode(&["--match", "title:x", "--self"]);
        assert_eq!(payload.get::<String>("match").unwrap().as_deref(), Some("title:x"));
        assert_eq!(payload.get::<bool>("self").unwrap(), Some(true));

        let bare = encode(&[]);
        assert_eq!(bare.get::<String>("match").unwrap(), None);
        assert_eq!(bare.get::<bool>("self").unwrap(), Some(false));
    }

    #[test]
    fn unmatched_expression_raises_match_error() {
        let registry = WindowRegistry::new();
        open(&registry, "a");
        let err = CloseWindow
            .response_from_session(&registry, None, &Payload::new().with("match", "title:nope"))
            .unwrap_err();
        assert!(matches!(err, RcError::Match(ref m) if m.expression == "title:nope"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn failure_on_one_target_does_not_stop_the_rest() {
        let inner = WindowRegistry::new();
        let a = open(&inner, "shell");
        let b = open(&inner, "shell");
        let c = open(&inner, "shell");
        let boss = FlakyBoss {
            inner: inner.clone(),
            refuse: b.id,
            attempts: Mutex::new(Vec::new()),
        };

        CloseWindow
            .response_from_session(&boss, None, &Payload::new().with("match", "title:shell"))
            .unwrap();

        assert_eq!(*boss.attempts.lock(), vec![a.id, b.id, c.id]);
        let left: Vec<_> = inner.windows().into_iter().map(|w| w.id).collect();
        assert_eq!(left, vec![b.id]);
    }

    #[test]
    fn self_closes_origin_not_active() {
        let registry = WindowRegistry::new();
        let active = open(&registry, "a");
        let origin = open(&registry, "b");
        CloseWindow
            .response_from_session(&registry, Some(&origin), &Payload::new().with("self", true))
            .unwrap();
        assert!(registry.window(origin.id).is_none());
        assert!(registry.window(active.id).is_some());
    }

    #[test]
    fn without_self_closes_active() {
        let registry = WindowRegistry::new();
        let active = open(&registry, "a");
        let origin = open(&registry, "b");
        CloseWindow
            .response_from_session(&registry, Some(&origin), &Payload::new())
            .unwrap();
        assert!(registry.window(active.id).is_none());
        assert!(registry.window(origin.id).is_some());
    }

    #[test]
    fn no_active_window_is_a_silent_no_op() {
        let registry = WindowRegistry::new();
        let response = CloseWindow
            .response_from_session(&registry, None, &Payload::new())
            .unwrap();
        assert_eq!(response, None);
    }
}
