//! Resolving which windows a command applies to.

use serde::{Deserialize, Serialize};

use super::MatchError;
use crate::window::{Boss, Window};

/// Target selection shared by window-scoped verbs: `{match, self}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPayload {
    #[serde(rename = "match", default)]
    pub match_expr: Option<String>,
    #[serde(rename = "self", default)]
    pub self_window: bool,
}

impl TargetPayload {
    pub fn resolve(
        &self,
        boss: &dyn Boss,
        origin: Option<&Window>,
    ) -> Result<Vec<Option<Window>>, MatchError> {
        resolve_targets(boss, self.match_expr.as_deref(), self.self_window, origin)
    }
}

/// Resolve the windows a command targets.
///
/// - A non-empty `expression` is matched against every window; matching none
///   is a [`MatchError`]. The expression wins over `use_self`.
/// - Otherwise `use_self` with a known `origin` targets exactly that window.
/// - Otherwise the active window is targeted, which may be absent. Callers skip
///   `None` entries without error.
pub fn resolve_targets(
    boss: &dyn Boss,
    expression: Option<&str>,
    use_self: bool,
    origin: Option<&Window>,
) -> Result<Vec<Option<Window>>, MatchError> {
    if let Some(expression) = expression.filter(|e| !e.is_empty()) {
        let windows = boss.match_windows(expression);
        if windows.is_empty() {
            return Err(MatchError::new(expression));
        }
        return Ok(windows.into_iter().map(Some).collect());
    }
    match origin {
        Some(window) if use_self => Ok(vec![Some(window.clone())]),
        _ => Ok(vec![boss.active_window()]),
    }
}
