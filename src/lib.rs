//! # Serial Network Co-Processor Protocol
//!
//! `serlink` is a `no_std` compatible implementation of a line-oriented
//! serial protocol that lets a small host microcontroller drive the network
//! side of a more capable companion chip, built upon the
//! [Embassy](https://embassy.dev/) async ecosystem.
//!
//! ## Core Features
//!
//! - **`no_std` & `no_alloc`:** Designed for bare-metal targets; every buffer
//!   is a fixed-capacity `heapless` container sized at compile time.
//! - **Fully Async:** The runtime loop is a single `async fn` that interleaves
//!   serial traffic and network events with `select`, so no locking is needed
//!   anywhere in the protocol state.
//! - **Rust 2024 Edition:** Uses native `async fn` in traits.
//! - **Transport Agnostic:** A [`SerialTransport`] trait carries the protocol
//!   over UART, USB CDC or anything else byte-stream shaped; an adapter is
//!   provided for `embedded-io-async` endpoints.
//! - **Pluggable Network Backends:** Wi-Fi, HTTP and MQTT operations live
//!   behind small provider traits, keeping the protocol logic testable on the
//!   host.
//!
//! ## Protocol Shape
//!
//! Commands are `\r\n`-terminated lines: a 3-character mnemonic, optionally
//! followed by one space and a parameter payload whose fields are separated
//! by the 0x1F unit separator. Every command is answered with exactly one
//! terminated reply line.
//!
//! Long-running network work is asynchronous at the protocol level too: an
//! HTTP fetch is built up field by field on a numbered handle, fired, then
//! polled and read out; MQTT subscriptions buffer the latest message per
//! topic until the controller fetches it.
//!
//! ```ignore
//! let channel: NetEventChannel<8> = NetEventChannel::new();
//! let engine: LinkEngine<_, _, _, 3, 8> = LinkEngine::new(wifi, http, mqtt);
//! let mut runtime = LinkRuntime::new(transport, engine, channel.receiver());
//! runtime.run().await?;
//! ```

#![cfg_attr(not(test), no_std)]

// Logging macros, must come first so the other modules see them.
#[macro_use]
mod fmt;

pub mod command;
pub mod engine;
pub mod error;
pub mod frame;
pub mod http;
pub mod mqtt;
pub mod params;
pub mod provider;
pub mod runtime;
pub mod transport;

// Re-export key types for easier access at the crate root.
pub use engine::{LinkEngine, Reply};
pub use error::LinkError;
pub use frame::LineFramer;
pub use http::{HttpEvent, HttpRegistry, Progress};
pub use mqtt::SubscriptionCache;
pub use provider::{HttpProvider, MqttProvider, WifiProvider};
pub use runtime::{EventHandle, LinkRuntime, NetEventChannel};
pub use transport::{IoTransport, SerialTransport};
