use clap::{Arg, ArgMatches};

use super::{
    match_window_option, self_window_option, target_from_matches, GlobalOptions, Payload, RcError,
    RemoteCommand, Response, TargetPayload,
};
use crate::window::{Boss, Window};

/// `focus-window`: focus the first matched window.
pub struct FocusWindow;

impl RemoteCommand for FocusWindow {
    fn verb(&self) -> &'static str {
        "focus-window"
    }

    fn short_desc(&self) -> &'static str {
        "Focus the specified window"
    }

    fn options_spec(&self) -> Vec<Arg> {
        vec![
            match_window_option("The window to focus. Only the first matching window is used."),
            self_window_option("Focus the window this command is run in."),
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
        if let Some(window) = target.resolve(boss, window)?.into_iter().flatten().next() {
            boss.focus_window(&window)?;
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::{WindowRegistry, WindowSpec};

    #[test]
    fn focuses_first_match_only() {
        let registry = WindowRegistry::new();
        let a = registry.open(WindowSpec { title: "a".into(), ..Default::default() });
        let b = registry.open(WindowSpec { title: "log-1".into(), ..Default::default() });
        registry.open(WindowSpec { title: "log-2".into(), ..Default::default() });
        assert_eq!(registry.active_window().map(|w| w.id), Some(a.id));

        FocusWindow
            .response_from_session(&registry, None, &Payload::new().with("match", "title:^log"))
            .unwrap();
        assert_eq!(registry.active_window().map(|w| w.id), Some(b.id));
    }
}
