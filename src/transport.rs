//! # Serial Transport Abstraction
//!
//! This module defines the `SerialTransport` trait, which abstracts the byte
//! stream connecting the co-processor to its controller (UART, USB-CDC, a pty
//! in tests), keeping the engine hardware agnostic.
//!
//! With the Rust 2024 Edition, this trait uses native `async fn`, removing the
//! need for the `#[async_trait]` macro.

use embedded_io_async::{Read, Write};

/// A trait representing the byte-stream transport carrying command lines.
#[allow(async_fn_in_trait)]
pub trait SerialTransport {
    /// The error type returned by the transport.
    type Error: core::fmt::Debug;

    /// Sends a buffer of data over the transport.
    async fn send(&mut self, buf: &[u8]) -> Result<(), Self::Error>;

    /// Receives data from the transport into a buffer, waiting until at
    /// least one byte is available.
    ///
    /// Returns the number of bytes read. A return of zero means the stream
    /// is closed and no further bytes will ever arrive; the run loop then
    /// shuts down in an orderly way.
    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

/// Adapter that turns any `embedded-io-async` duplex stream into a
/// [`SerialTransport`].
pub struct IoTransport<T> {
    io: T,
}

impl<T> IoTransport<T> {
    /// Wraps an `embedded-io-async` stream.
    pub fn new(io: T) -> Self {
        Self { io }
    }

    /// Returns the wrapped stream.
    pub fn into_inner(self) -> T {
        self.io
    }
}

impl<T: Read + Write> SerialTransport for IoTransport<T> {
    type Error = T::Error;

    async fn send(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        self.io.write_all(buf).await?;
        self.io.flush().await
    }

    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.io.read(buf).await
    }
}
