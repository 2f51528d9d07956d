use clap::ArgMatches;
use serde::Serialize;

use super::{GlobalOptions, Payload, RcError, RemoteCommand, Response};
use crate::window::{Boss, Window};

#[derive(Serialize)]
struct WindowEntry {
    #[serde(flatten)]
    window: Window,
    is_focused: bool,
    is_self: bool,
}

/// `ls`: list every window as JSON.
pub struct Ls;

impl RemoteCommand for Ls {
    fn verb(&self) -> &'static str {
        "ls"
    }

    fn short_desc(&self) -> &'static str {
        "List all windows"
    }

    fn message_to_session(
        &self,
        _global: &GlobalOptions,
        _opts: &ArgMatches,
        _args: &[String],
    ) -> Result<Payload, RcError> {
        Ok(Payload::new())
    }

    fn response_from_session(
        &self,
        boss: &dyn Boss,
        window: Option<&Window>,
        _payload: &Payload,
    ) -> Result<Response, RcError> {
        let focused = boss.active_window().map(|w| w.id);
        let origin = window.map(|w| w.id);
        let entries: Vec<WindowEntry> = boss
            .windows()
            .into_iter()
            .map(|w| WindowEntry {
                is_focused: Some(w.id) == focused,
                is_self: Some(w.id) == origin,
                window: w,
            })
            .collect();
        serde_json::to_value(entries)
            .map(Some)
            .map_err(|source| RcError::InvalidField {
                field: "windows".to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::{WindowRegistry, WindowSpec};

    #[test]
    fn lists_windows_with_focus_and_self() {
        let registry = WindowRegistry::new();
        registry.open(WindowSpec {
            title: "a".into(),
            ..Default::default()
        });
        let b = registry.open(WindowSpec {
            title: "b".into(),
            cwd: "/tmp".into(),
            ..Default::default()
        });

        let value = Ls
            .response_from_session(&registry, Some(&b), &Payload::new())
            .unwrap()
            .unwrap();
        let list = value.as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["id"], 1);
        assert_eq!(list[0]["is_focused"], true);
        assert_eq!(list[0]["is_self"], false);
        assert_eq!(list[1]["title"], "b");
        assert_eq!(list[1]["cwd"], "/tmp");
        assert_eq!(list[1]["is_self"], true);
    }
}
