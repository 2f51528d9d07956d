//! Result handlers for programs run inside a window.
//!
//! A [`HandleResult`] pairs an implementation with two tags the dispatcher
//! reads before invoking it: which window text the implementation wants as
//! input, and whether it may show any UI. The wrapper itself never looks at
//! the tags.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Response;
use crate::window::{Boss, WindowId};

/// Which window text a result handler receives as `data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputType {
    Text,
    Ansi,
    Screen,
    ScreenAnsi,
    History,
    AnsiHistory,
    Selection,
}

impl InputType {
    pub fn as_str(self) -> &'static str {
        match self {
            InputType::Text => "text",
            InputType::Ansi => "ansi",
            InputType::Screen => "screen",
            InputType::ScreenAnsi => "screen-ansi",
            InputType::History => "history",
            InputType::AnsiHistory => "ansi-history",
            InputType::Selection => "selection",
        }
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "text" => InputType::Text,
            "ansi" => InputType::Ansi,
            "screen" => InputType::Screen,
            "screen-ansi" => InputType::ScreenAnsi,
            "history" => InputType::History,
            "ansi-history" => InputType::AnsiHistory,
            "selection" => InputType::Selection,
            other => return Err(format!("unknown input type: {other}")),
        })
    }
}

/// Signature of a result-handler implementation:
/// `(args, data, target_window, boss) -> response`.
pub type ResultFn =
    dyn Fn(&[String], &Value, Option<WindowId>, &dyn Boss) -> HandlerOutput + Send + Sync;

/// What a result-handler implementation returns.
pub type HandlerOutput = anyhow::Result<Response>;

/// An implementation plus its dispatch tags. Immutable once built.
pub struct HandleResult {
    implementation: Box<ResultFn>,
    type_of_input: Option<InputType>,
    no_ui: bool,
}

impl HandleResult {
    pub fn new<F>(implementation: F) -> Self
    where
        F: Fn(&[String], &Value, Option<WindowId>, &dyn Boss) -> anyhow::Result<Response>
            + Send
            + Sync
            + 'static,
    {
        Self {
            implementation: Box::new(implementation),
            type_of_input: None,
            no_ui: false,
        }
    }

    pub fn with_input(mut self, input: InputType) -> Self {
        self.type_of_input = Some(input);
        self
    }

    pub fn without_ui(mut self) -> Self {
        self.no_ui = true;
        self
    }

    pub fn type_of_input(&self) -> Option<InputType> {
        self.type_of_input
    }

    pub fn no_ui(&self) -> bool {
        self.no_ui
    }

    /// Invoke the implementation. Its return value and errors pass through
    /// untouched.
    pub fn call(
        &self,
        args: &[String],
        data: &Value,
        target_window: Option<WindowId>,
        boss: &dyn Boss,
    ) -> anyhow::Result<Response> {
        (self.implementation)(args, data, target_window, boss)
    }
}

impl fmt::Debug for HandleResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleResult")
            .field("type_of_input", &self.type_of_input)
            .field("no_ui", &self.no_ui)
            .finish_non_exhaustive()
    }
}

/// Outcome of [`dispatch_result`].
#[derive(Debug)]
pub struct Dispatched {
    pub response: Response,
    /// False when the handler asked not to show UI.
    pub show_ui: bool,
}

/// Collect the input a handler asked for, then invoke it.
///
/// With `type_of_input` set, `data` is the target window's text of that kind
/// (JSON `null` when the window or text is unavailable); otherwise `data` is
/// `null`.
pub fn dispatch_result(
    handler: &HandleResult,
    args: &[String],
    boss: &dyn Boss,
    target_window: Option<WindowId>,
) -> anyhow::Result<Dispatched> {
    let data = match handler.type_of_input() {
        Some(input) => target_window
            .and_then(|id| boss.window(id))
            .and_then(|w| w.text_for(input))
            .map(Value::String)
            .unwrap_or(Value::Null),
        None => Value::Null,
    };
    tracing::debug!(
        input = ?handler.type_of_input(),
        no_ui = handler.no_ui(),
        target = ?target_window,
        "dispatching result handler"
    );
    let response = handler.call(args, &data, target_window, boss)?;
    Ok(Dispatched {
        response,
        show_ui: !handler.no_ui(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::{WindowRegistry, WindowSpec};
    use serde_json::json;

    #[test]
    fn defaults_and_builder_tags() {
        let plain = HandleResult::new(|_, _, _, _| Ok(None));
        assert_eq!(plain.type_of_input(), None);
        assert!(!plain.no_ui());

        let tagged = HandleResult::new(|_, _, _, _| Ok(None))
            .with_input(InputType::Selection)
            .without_ui();
        assert_eq!(tagged.type_of_input(), Some(InputType::Selection));
        assert!(tagged.no_ui());
    }

    #[test]
    fn call_passes_arguments_and_return_value_through() {
        let registry = WindowRegistry::new();
        let handler = HandleResult::new(|args, data, target, _| {
            Ok(Some(json!({ "args": args, "data": data, "target": target })))
        });
        let response = handler
            .call(&["a".to_string()], &json!(5), Some(WindowId(3)), &registry)
            .unwrap();
        assert_eq!(response, Some(json!({ "args": ["a"], "data": 5, "target": 3 })));
    }

    #[test]
    fn call_passes_errors_through() {
        let registry = WindowRegistry::new();
        let handler = HandleResult::new(|_, _, _, _| Err(anyhow::anyhow!("handler failed")));
        let err = handler.call(&[], &Value::Null, None, &registry).unwrap_err();
        assert_eq!(err.to_string(), "handler failed");
    }

    #[test]
    fn dispatch_collects_requested_input() {
        let registry = WindowRegistry::new();
        let w = registry.open(WindowSpec::default());
        registry
            .set_contents(w.id, "\x1b[1mbold\x1b[0m".to_string(), None)
            .unwrap();

        let handler =
            HandleResult::new(|_, data, _, _| Ok(Some(data.clone()))).with_input(InputType::Text);
        let dispatched = dispatch_result(&handler, &[], &registry, Some(w.id)).unwrap();
        assert_eq!(dispatched.response, Some(json!("bold")));
        assert!(dispatched.show_ui);
    }

    #[test]
    fn dispatch_without_input_passes_null() {
        let registry = WindowRegistry::new();
        let handler = HandleResult::new(|_, data, _, _| Ok(Some(data.clone()))).without_ui();
        let dispatched = dispatch_result(&handler, &[], &registry, None).unwrap();
        assert_eq!(dispatched.response, Some(Value::Null));
        assert!(!dispatched.show_ui);
    }

    #[test]
    fn input_type_names() {
        for name in [
            "text",
            "ansi",
            "screen",
            "screen-ansi",
            "history",
            "ansi-history",
            "selection",
        ] {
            let parsed: InputType = name.parse().unwrap();
            assert_eq!(parsed.as_str(), name);
            assert_eq!(serde_json::to_value(parsed).unwrap(), json!(name));
        }
        assert!("html".parse::<InputType>().is_err());
    }
}
