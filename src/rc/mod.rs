//! Remote-control commands.
//!
//! Each verb is a [`RemoteCommand`] descriptor. The driver side turns parsed
//! command-line options into a [`Payload`] (`message_to_session`); the session
//! side applies that payload against the window container
//! (`response_from_session`). Descriptors are collected once at start-up in a
//! [`CommandRegistry`].

pub mod close_window;
pub mod focus_window;
pub mod ls;
pub mod matching;
pub mod registry;
pub mod result;
pub mod set_window_title;

use clap::{Arg, ArgAction, ArgMatches};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::window::{BossError, Window};

pub use matching::{resolve_targets, TargetPayload};
pub use registry::CommandRegistry;

/// What `response_from_session` hands back to the driver.
pub type Response = Option<Value>;

/// An explicit match expression selected no windows.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("No matching windows for expression: {expression}")]
pub struct MatchError {
    pub expression: String,
}

impl MatchError {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RcError {
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error("unknown remote control command: {0}")]
    UnknownCommand(String),
    #[error("missing required field in payload: {0}")]
    MissingField(String),
    #[error("invalid value for payload field {field}: {source}")]
    InvalidField {
        field: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Boss(#[from] BossError),
}

impl RcError {
    /// Stable machine-readable code used in error frames.
    pub fn code(&self) -> &'static str {
        match self {
            RcError::Match(_) => "no_match",
            RcError::UnknownCommand(_) => "unknown_command",
            RcError::MissingField(_) => "missing_field",
            RcError::InvalidField { .. } => "invalid_field",
            RcError::Boss(_) => "window_error",
        }
    }
}

/// Field map carried by a command.
///
/// Reads are typed: a present field that fails to deserialize is an
/// [`RcError::InvalidField`], and [`Payload::require`] turns absence into
/// [`RcError::MissingField`]. JSON `null` counts as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style insert.
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    /// Build a payload from a typed per-verb structure.
    pub fn from_typed<T: Serialize>(value: &T) -> Result<Self, RcError> {
        match serde_json::to_value(value) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(_) => Ok(Self::new()),
            Err(source) => Err(RcError::InvalidField {
                field: String::new(),
                source,
            }),
        }
    }

    /// Read the whole payload as a typed per-verb structure.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, RcError> {
        serde_json::from_value(Value::Object(self.0.clone())).map_err(|source| {
            RcError::InvalidField {
                field: String::new(),
                source,
            }
        })
    }

    pub fn get<T: DeserializeOwned>(&self, field: &str) -> Result<Option<T>, RcError> {
        match self.0.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|source| RcError::InvalidField {
                    field: field.to_string(),
                    source,
                }),
        }
    }

    pub fn require<T: DeserializeOwned>(&self, field: &str) -> Result<T, RcError> {
        self.get(field)?
            .ok_or_else(|| RcError::MissingField(field.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Options shared by every verb, taken from the top-level command line.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Window the driver itself runs in.
    pub window_id: Option<u64>,
    pub no_response: bool,
}

/// Declarative description of one remote-control verb.
pub trait RemoteCommand: Send + Sync {
    fn verb(&self) -> &'static str;

    fn short_desc(&self) -> &'static str;

    /// Positional arguments, in usage notation. Empty when none are taken.
    fn argspec(&self) -> &'static str {
        ""
    }

    /// Options accepted on the command line.
    fn options_spec(&self) -> Vec<Arg> {
        Vec::new()
    }

    /// Build the payload sent to the session. Must not perform I/O.
    fn message_to_session(
        &self,
        global: &GlobalOptions,
        opts: &ArgMatches,
        args: &[String],
    ) -> Result<Payload, RcError>;

    /// Apply a payload inside the session.
    ///
    /// `window` is the window the command arrived on, if known.
    fn response_from_session(
        &self,
        boss: &dyn crate::window::Boss,
        window: Option<&Window>,
        payload: &Payload,
    ) -> Result<Response, RcError>;

    /// Full clap command for this verb: options plus positional arguments.
    fn cli_command(&self) -> clap::Command {
        let mut cmd = clap::Command::new(self.verb())
            .about(self.short_desc())
            .no_binary_name(true)
            .args(self.options_spec());
        if !self.argspec().is_empty() {
            cmd = cmd.arg(
                Arg::new(POSITIONAL_ARGS)
                    .value_name(self.argspec())
                    .num_args(1..)
                    .required(true)
                    .trailing_var_arg(true)
                    .allow_hyphen_values(true),
            );
        }
        cmd
    }
}

/// Name of the positional-argument slot in [`RemoteCommand::cli_command`].
pub const POSITIONAL_ARGS: &str = "args";

/// Positional arguments parsed by [`RemoteCommand::cli_command`].
///
/// Verbs with an empty [`RemoteCommand::argspec`] never define the slot, so
/// an unknown id reads as no arguments.
pub fn positional_args(matches: &ArgMatches) -> Vec<String> {
    matches
        .try_get_many::<String>(POSITIONAL_ARGS)
        .ok()
        .flatten()
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

/// The `--match` option shared by window-scoped verbs.
pub fn match_window_option(help: &'static str) -> Arg {
    Arg::new("match")
        .short('m')
        .long("match")
        .value_name("EXPRESSION")
        .help(help)
        .long_help(
            "The window to match. Match specifications are of the form \
             field:query. Where field can be one of: id, title, pid, cwd, \
             cmdline, env and state. query is the expression to match. \
             Expressions can be either a number or a regular expression. \
             Several field:query terms separated by spaces must all match.",
        )
}

/// The `--self` flag shared by window-scoped verbs.
pub fn self_window_option(help: &'static str) -> Arg {
    Arg::new("self")
        .long("self")
        .action(ArgAction::SetTrue)
        .help(help)
}

/// Read the shared `--match`/`--self` options into a target payload.
pub(crate) fn target_from_matches(opts: &ArgMatches) -> TargetPayload {
    TargetPayload {
        match_expr: opts.get_one::<String>("match").cloned(),
        self_window: opts.get_flag("self"),
    }
}
