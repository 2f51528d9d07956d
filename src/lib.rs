//! termrc: remote control for an interactive terminal session.
//!
//! A running session (`termrc run`) owns a set of windows and listens on a
//! Unix socket. Other processes send it commands (`termrc close-window -m
//! title:vim`), which are resolved against the windows and applied. The
//! session itself is a full-screen [`tui::Handler`] driven by an event loop.

pub mod client;
pub mod config;
pub mod protocol;
pub mod rc;
pub mod server;
pub mod terminal;
pub mod tui;
pub mod window;
