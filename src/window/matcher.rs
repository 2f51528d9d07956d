//! Match expressions for selecting windows.
//!
//! An expression is one or more whitespace-separated `field:query` terms and a
//! window matches when every term does. Fields:
//!
//! - `id:N`, `pid:N`: exact integer match
//! - `title:RE`, `cwd:RE`, `cmdline:RE`: regular expression search
//! - `env:NAME=RE`: the variable exists and its value matches
//! - `state:active` / `state:focused`: the focused window

use std::str::FromStr;

use regex::Regex;

use super::Window;

#[derive(Debug, thiserror::Error)]
pub enum MatchParseError {
    #[error("empty match expression")]
    Empty,
    #[error("match term {0:?} is not of the form field:query")]
    MissingField(String),
    #[error("unknown match field: {0}")]
    UnknownField(String),
    #[error("invalid regular expression for {field}: {source}")]
    InvalidRegex {
        field: &'static str,
        #[source]
        source: regex::Error,
    },
    #[error("{field} expects an integer, got {value:?}")]
    InvalidInteger { field: &'static str, value: String },
    #[error("env expects NAME=VALUE, got {0:?}")]
    InvalidEnv(String),
    #[error("unknown window state: {0}")]
    InvalidState(String),
}

#[derive(Debug, Clone)]
enum Term {
    Id(u64),
    Pid(u32),
    Title(Regex),
    Cwd(Regex),
    Cmdline(Regex),
    Env { name: String, value: Regex },
    Focused,
}

impl Term {
    fn matches(&self, window: &Window, is_focused: bool) -> bool {
        match self {
            Term::Id(id) => window.id.0 == *id,
            Term::Pid(pid) => window.pid == Some(*pid),
            Term::Title(re) => re.is_match(&window.title),
            Term::Cwd(re) => re.is_match(&window.cwd),
            Term::Cmdline(re) => window.cmdline.iter().any(|arg| re.is_match(arg)),
            Term::Env { name, value } => window
                .env
                .get(name)
                .is_some_and(|v| value.is_match(v)),
            Term::Focused => is_focused,
        }
    }
}

/// A parsed match expression.
#[derive(Debug, Clone)]
pub struct MatchExpr {
    terms: Vec<Term>,
}

impl MatchExpr {
    pub fn matches(&self, window: &Window, is_focused: bool) -> bool {
        self.terms.iter().all(|t| t.matches(window, is_focused))
    }
}

fn regex(field: &'static str, query: &str) -> Result<Regex, MatchParseError> {
    Regex::new(query).map_err(|source| MatchParseError::InvalidRegex { field, source })
}

fn integer<T: FromStr>(field: &'static str, query: &str) -> Result<T, MatchParseError> {
    query.parse().map_err(|_| MatchParseError::InvalidInteger {
        field,
        value: query.to_string(),
    })
}

fn parse_term(term: &str) -> Result<Term, MatchParseError> {
    let (field, query) = term
        .split_once(':')
        .ok_or_else(|| MatchParseError::MissingField(term.to_string()))?;
    Ok(match field {
        "id" => Term::Id(integer("id", query)?),
        "pid" => Term::Pid(integer("pid", query)?),
        "title" => Term::Title(regex("title", query)?),
        "cwd" => Term::Cwd(regex("cwd", query)?),
        "cmdline" => Term::Cmdline(regex("cmdline", query)?),
        "env" => {
            let (name, value) = query
                .split_once('=')
                .ok_or_else(|| MatchParseError::InvalidEnv(query.to_string()))?;
            Term::Env {
                name: name.to_string(),
                value: regex("env", value)?,
            }
        }
        "state" => match query {
            "active" | "focused" => Term::Focused,
            other => return Err(MatchParseError::InvalidState(other.to_string())),
        },
        other => return Err(MatchParseError::UnknownField(other.to_string())),
    })
}

impl FromStr for MatchExpr {
    type Err = MatchParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let terms = s
            .split_whitespace()
            .map(parse_term)
            .collect::<Result<Vec<_>, _>>()?;
        if terms.is_empty() {
            return Err(MatchParseError::Empty);
        }
        Ok(Self { terms })
    }
}
