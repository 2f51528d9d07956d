//! Interactive full-screen sessions.
//!
//! A session is a [`Handler`] driven by an [`EventLoop`]: terminal input,
//! hangups and remote-control responses arrive as [`LoopEvent`]s in order,
//! and everything the handler writes is flushed after each event.

pub mod debug;
pub mod event_loop;
pub mod events;
pub mod handler;
pub mod images;
pub mod operations;
pub mod term_manager;
pub mod window_list;

pub use debug::DebugSink;
pub use event_loop::EventLoop;
pub use events::{keys, KeyEvent, LoopEvent, Modifiers, MouseEvent, ScreenSize};
pub use handler::{enter, ActiveSession, Context, Handler, HandlerError, Trigger, WriteScheduler};
pub use images::{GraphicsImageManager, ImageError, ImageManager};
pub use term_manager::TermManager;
pub use window_list::WindowList;
