use std::collections::BTreeMap;

use super::close_window::CloseWindow;
use super::focus_window::FocusWindow;
use super::ls::Ls;
use super::set_window_title::SetWindowTitle;
use super::{positional_args, GlobalOptions, RcError, RemoteCommand, Response};
use crate::protocol::{RcResponse, RemoteCommandMsg};
use crate::window::{Boss, WindowId};

/// Verb → descriptor map.
///
/// Built once at start-up and then shared read-only (typically behind an
/// `Arc`) by everything that encodes or dispatches commands.
pub struct CommandRegistry {
    commands: BTreeMap<&'static str, Box<dyn RemoteCommand>>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CommandRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            commands: BTreeMap::new(),
        }
    }

    /// A registry holding every built-in verb.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(CloseWindow);
        registry.register(FocusWindow);
        registry.register(Ls);
        registry.register(SetWindowTitle);
        registry
    }

    /// Add a descriptor.
    ///
    /// # Panics
    ///
    /// Panics if the verb is already registered.
    pub fn register(&mut self, command: impl RemoteCommand + 'static) {
        let verb = command.verb();
        if self.commands.insert(verb, Box::new(command)).is_some() {
            panic!("remote control command registered twice: {verb}");
        }
    }

    pub fn get(&self, verb: &str) -> Option<&dyn RemoteCommand> {
        self.commands.get(verb).map(|c| c.as_ref())
    }

    /// All descriptors, ordered by verb.
    pub fn iter(&self) -> impl Iterator<Item = &dyn RemoteCommand> {
        self.commands.values().map(|c| c.as_ref())
    }

    /// Parse `argv` (everything after the verb) with the verb's option spec and
    /// build the message a driver sends.
    pub fn encode(
        &self,
        verb: &str,
        argv: &[String],
        global: &GlobalOptions,
    ) -> Result<RemoteCommandMsg, EncodeError> {
        let command = self
            .get(verb)
            .ok_or_else(|| RcError::UnknownCommand(verb.to_string()))?;
        let matches = command.cli_command().try_get_matches_from(argv)?;
        let args = positional_args(&matches);
        let payload = command.message_to_session(global, &matches, &args)?;
        let mut msg = RemoteCommandMsg::new(verb, payload);
        msg.no_response = global.no_response;
        msg.window_id = global.window_id;
        Ok(msg)
    }

    /// Apply a received message inside the session.
    pub fn dispatch(&self, boss: &dyn Boss, msg: &RemoteCommandMsg) -> Result<Response, RcError> {
        let command = self
            .get(&msg.cmd)
            .ok_or_else(|| RcError::UnknownCommand(msg.cmd.clone()))?;
        let origin = msg.window_id.and_then(|id| boss.window(WindowId(id)));
        tracing::debug!(
            cmd = %msg.cmd,
            origin = ?origin.as_ref().map(|w| w.id),
            "dispatching remote command"
        );
        command
            .response_from_session(boss, origin.as_ref(), &msg.payload)
            .inspect_err(|e| tracing::warn!(cmd = %msg.cmd, error = %e, "remote command failed"))
    }

    /// [`CommandRegistry::dispatch`] folded into the response shape sent back
    /// to drivers and interactive sessions.
    pub fn respond(
        &self,
        boss: &dyn Boss,
        msg: &RemoteCommandMsg,
    ) -> (RcResponse, Option<RcError>) {
        match self.dispatch(boss, msg) {
            Ok(data) => (RcResponse::success(&msg.cmd, data), None),
            Err(e) => (RcResponse::failure(&msg.cmd, e.to_string()), Some(e)),
        }
    }

    /// One line per verb, for `--help` output.
    pub fn summary(&self) -> String {
        let width = self.commands.keys().map(|v| v.len()).max().unwrap_or(0);
        self.iter()
            .map(|c| format!("  {:width$}  {}", c.verb(), c.short_desc()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error(transparent)]
    Command(#[from] RcError),
    #[error(transparent)]
    Args(#[from] clap::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rc::Payload;
    use crate::window::{Window, WindowRegistry, WindowSpec};

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn builtin_verbs() {
        let registry = CommandRegistry::builtin();
        let verbs: Vec<_> = registry.iter().map(|c| c.verb()).collect();
        assert_eq!(verbs, vec!["close-window", "focus-window", "ls", "set-window-title"]);
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn duplicate_registration_panics() {
        let mut registry = CommandRegistry::builtin();
        registry.register(Ls);
    }

    #[test]
    fn unknown_verb_is_rejected() {
        let registry = CommandRegistry::builtin();
        let boss = WindowRegistry::new();
        let err = registry
            .dispatch(&boss, &RemoteCommandMsg::new("launch", Payload::new()))
            .unwrap_err();
        assert!(matches!(err, RcError::UnknownCommand(ref v) if v == "launch"));
        assert!(matches!(
            registry.encode("launch", &[], &GlobalOptions::default()),
            Err(EncodeError::Command(RcError::UnknownCommand(_)))
        ));
    }

    #[test]
    fn encode_carries_global_options() {
        let registry = CommandRegistry::builtin();
        let global = GlobalOptions {
            window_id: Some(4),
            no_response: true,
        };
        let msg = registry
            .encode("close-window", &argv(&["-m", "id:2"]), &global)
            .unwrap();
        assert_eq!(msg.cmd, "close-window");
        assert_eq!(msg.window_id, Some(4));
        assert!(msg.no_response);
        assert_eq!(msg.payload.get::<String>("match").unwrap().as_deref(), Some("id:2"));
    }

    #[test]
    fn encode_verbs_without_positional_arguments() {
        let registry = CommandRegistry::builtin();
        let ls = registry.encode("ls", &[], &GlobalOptions::default()).unwrap();
        assert_eq!(ls.cmd, "ls");
        assert!(ls.payload.is_empty());

        for verb in ["close-window", "focus-window"] {
            let msg = registry
                .encode(verb, &argv(&["--self"]), &GlobalOptions::default())
                .unwrap();
            assert_eq!(msg.payload.get::<bool>("self").unwrap(), Some(true));
        }
    }

    #[test]
    fn encode_collects_positional_arguments() {
        let registry = CommandRegistry::builtin();
        let msg = registry
            .encode(
                "set-window-title",
                &argv(&["-m", "id:1", "build", "logs"]),
                &GlobalOptions::default(),
            )
            .unwrap();
        assert_eq!(msg.payload.require::<String>("title").unwrap(), "build logs");
    }

    #[test]
    fn encode_rejects_bad_arguments() {
        let registry = CommandRegistry::builtin();
        let err = registry
            .encode("close-window", &argv(&["--bogus"]), &GlobalOptions::default())
            .unwrap_err();
        assert!(matches!(err, EncodeError::Args(_)));
    }

    #[test]
    fn dispatch_resolves_origin_from_window_id() {
        let registry = CommandRegistry::builtin();
        let boss = WindowRegistry::new();
        let open = |t: &str| -> Window {
            boss.open(WindowSpec {
                title: t.into(),
                ..Default::default()
            })
        };
        let a = open("a");
        let b = open("b");

        let msg = registry
            .encode(
                "close-window",
                &argv(&["--self"]),
                &GlobalOptions { window_id: Some(b.id.0), no_response: false },
            )
            .unwrap();
        registry.dispatch(&boss, &msg).unwrap();
        assert!(boss.window(a.id).is_some());
        assert!(boss.window(b.id).is_none());
    }

    #[test]
    fn respond_reports_match_failure() {
        let registry = CommandRegistry::builtin();
        let boss = WindowRegistry::new();
        let msg = RemoteCommandMsg::new("close-window", Payload::new().with("match", "id:9"));
        let (response, err) = registry.respond(&boss, &msg);
        assert!(!response.ok);
        assert_eq!(response.error.as_deref(), Some("No matching windows for expression: id:9"));
        assert_eq!(err.map(|e| e.code()), Some("no_match"));
    }
}
