//! Area window client layer
//!
//! Wraps each managed top-level X11 window in a frame and keeps its
//! mapping, shading, desktop and liveness state in sync with the server.

pub mod config;
pub mod error;
pub mod shared;
pub mod wm;
pub mod x11_async;
