//! Error types
//!
//! Everything here is a caller contract violation or a broken setup.
//! Runtime conditions (unresponsive clients, missing properties) are not
//! errors and never show up as one.

use thiserror::Error;

use crate::wm::protocol::WindowId;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Decoration requested but the workspace has no factory to build one
    #[error("no decoration factory is configured")]
    MissingDecorationFactory,

    /// Protocol state was touched after the identity handles were cleared
    #[error("window 0x{0:x} is not managed")]
    NotManaged(WindowId),

    /// The window disappeared before management could read its geometry
    #[error("window 0x{0:x} vanished before it could be managed")]
    Vanished(WindowId),

    #[error("window 0x{0:x} is already managed")]
    AlreadyManaged(WindowId),

    #[error("window 0x{0:x} is not known to the client table")]
    UnknownWindow(WindowId),
}
