use clap::{Arg, ArgMatches};
use serde::{Deserialize, Serialize};

use super::{
    match_window_option, self_window_option, target_from_matches, GlobalOptions, Payload, RcError,
    RemoteCommand, Response, TargetPayload,
};
use crate::window::{Boss, Window};

#[derive(Debug, Serialize, Deserialize)]
struct SetTitlePayload {
    #[serde(flatten)]
    target: TargetPayload,
    title: String,
}

/// `set-window-title`: retitle the matched windows.
pub struct SetWindowTitle;

impl RemoteCommand for SetWindowTitle {
    fn verb(&self) -> &'static str {
        "set-window-title"
    }

    fn short_desc(&self) -> &'static str {
        "Set the window title"
    }

    fn argspec(&self) -> &'static str {
        "TITLE ..."
    }

    fn options_spec(&self) -> Vec<Arg> {
        vec![
            match_window_option("Which windows to change the title of"),
            self_window_option("Change the title of the window this command is run in."),
        ]
    }

    fn message_to_session(
        &self,
        _global: &GlobalOptions,
        opts: &ArgMatches,
        args: &[String],
    ) -> Result<Payload, RcError> {
        Payload::from_typed(&SetTitlePayload {
            target: target_from_matches(opts),
            title: args.join(" "),
        })
    }

    fn response_from_session(
        &self,
        boss: &dyn Boss,
        window: Option<&Window>,
        payload: &Payload,
    ) -> Result<Response, RcError> {
        let title: String = payload.require("title")?;
        let target: TargetPayload = payload.decode()?;
        for window in target.resolve(boss, window)?.iter().flatten() {
            if let Err(e) = boss.set_window_title(window, &title) {
                tracing::warn!(window = %window.id, error = %e, "failed to set window title");
            }
        }
        Ok(None)
    }
}
