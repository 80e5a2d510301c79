//! Window Manager Module
//!
//! Per-window control for managed top-level windows: the frame and
//! wrapper around each client, its mapping and shading state, captions,
//! liveness checks and the X11 glue that drives it.

pub mod caption;
pub mod client;
pub mod client_flags;
pub mod clients;
pub mod context;
pub mod decorations;
pub mod events;
pub mod ewmh;
pub mod geometry;
pub mod hints;
pub mod protocol;
pub mod scheduler;
pub mod screen;
pub mod shade;
pub mod terminate;
pub mod workspace;
pub mod x11;

#[cfg(test)]
pub mod testing;

pub use clients::Clients;
pub use ewmh::Atoms;
