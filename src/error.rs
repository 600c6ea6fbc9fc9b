//! # Error Types
//!
//! Protocol-level problems (bad length, unknown mnemonic, unknown handle) are
//! never surfaced as Rust errors: they degrade to one-line rejection replies
//! and the engine keeps serving commands. The types here cover the only
//! conditions that genuinely abort the event loop.

/// The primary error enum for the command engine.
///
/// It is generic over the transport error type `T`, allowing it to wrap
/// specific errors from the underlying serial transport (UART, USB-CDC, ...).
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError<T> {
    /// An error occurred in the underlying serial transport.
    Transport(T),
    /// The line buffer filled up without a terminator arriving.
    ///
    /// This is the one unrecoverable condition: the byte stream has no
    /// message boundary left to resynchronize on, so the surrounding system
    /// should treat it as a hard reset trigger.
    Overflow,
}

/// Allows the `?` operator to lift transport errors into `LinkError`.
impl<T: core::fmt::Debug> From<T> for LinkError<T> {
    fn from(err: T) -> Self {
        LinkError::Transport(err)
    }
}
