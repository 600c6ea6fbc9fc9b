//! # Command Mnemonics
//!
//! Every protocol command is a 3-byte mnemonic. This module maps raw
//! mnemonics to [`Command`] values and carries the per-command inclusive
//! length bounds that the dispatcher checks before any handler touches the
//! parameter payload.

use crate::http::TX_CONTENT_MAX;
use crate::mqtt::TOPIC_MAX;

/// Mnemonic length in bytes.
pub const MNEMONIC_LEN: usize = 3;

/// Ceiling for an access point SSID.
pub const SSID_MAX: usize = 32;

/// Ceiling for an access point passphrase.
pub const PASSPHRASE_MAX: usize = 64;

/// Ceiling for a broker connection URI.
pub const BROKER_URI_MAX: usize = 128;

/// Every command the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// No operation; replies with an empty line.
    Nop,
    /// Firmware version string.
    Ver,
    /// Request a device reset.
    Rst,
    /// List access points (scan).
    Lap,
    /// Configure and join an access point.
    Cap,
    /// Association status.
    Sap,
    /// Disconnect from the access point.
    Dap,
    /// Current IPv4 address.
    Gip,
    /// Initialize an HTTP request (allocate + populate a handle).
    Ihr,
    /// Set request parameters on a handle.
    Phr,
    /// Set request content on a handle.
    Chr,
    /// Set request headers on a handle.
    Hhr,
    /// Transmit (fire) the request on a handle.
    Thr,
    /// Poll request progress on a handle.
    Shr,
    /// Get a response field from a handle, optionally purging it.
    Ghr,
    /// Delete (purge) a handle.
    Dhr,
    /// Connect the global MQTT broker session.
    Mcg,
    /// MQTT connection status.
    Mic,
    /// Subscribe to a topic.
    Msb,
    /// Unsubscribe from a topic.
    Mus,
    /// Unsubscribe from every topic.
    Mua,
    /// Check whether fresh data exists for a topic.
    Mnd,
    /// Get the latest message for a topic.
    Mgs,
    /// Publish to a topic.
    Mpb,
}

impl Command {
    /// Looks up a raw 3-byte mnemonic.
    pub fn lookup(mnemonic: &[u8]) -> Option<Self> {
        match mnemonic {
            b"nop" => Some(Command::Nop),
            b"ver" => Some(Command::Ver),
            b"rst" => Some(Command::Rst),
            b"lap" => Some(Command::Lap),
            b"cap" => Some(Command::Cap),
            b"sap" => Some(Command::Sap),
            b"dap" => Some(Command::Dap),
            b"gip" => Some(Command::Gip),
            b"ihr" => Some(Command::Ihr),
            b"phr" => Some(Command::Phr),
            b"chr" => Some(Command::Chr),
            b"hhr" => Some(Command::Hhr),
            b"thr" => Some(Command::Thr),
            b"shr" => Some(Command::Shr),
            b"ghr" => Some(Command::Ghr),
            b"dhr" => Some(Command::Dhr),
            b"mcg" => Some(Command::Mcg),
            b"mic" => Some(Command::Mic),
            b"msb" => Some(Command::Msb),
            b"mus" => Some(Command::Mus),
            b"mua" => Some(Command::Mua),
            b"mnd" => Some(Command::Mnd),
            b"mgs" => Some(Command::Mgs),
            b"mpb" => Some(Command::Mpb),
            _ => None,
        }
    }

    /// Inclusive `(min, max)` bounds on the parameter payload length.
    ///
    /// These are the exact bounds of the fixed-capacity buffers the handler
    /// copies into; the dispatcher refuses the command outright on violation.
    pub fn bounds(self) -> (usize, usize) {
        match self {
            Command::Nop
            | Command::Ver
            | Command::Rst
            | Command::Lap
            | Command::Sap
            | Command::Dap
            | Command::Gip
            | Command::Mic
            | Command::Mua => (0, 0),
            // ssid [+ separator + passphrase]
            Command::Cap => (1, SSID_MAX + 1 + PASSPHRASE_MAX),
            // method + separator + url
            Command::Ihr => (3, 2 + TX_CONTENT_MAX),
            // handle + separator + value
            Command::Phr | Command::Chr | Command::Hhr => (3, 2 + TX_CONTENT_MAX),
            Command::Thr | Command::Shr | Command::Dhr => (1, 1),
            // handle + separator + field selector + separator + purge flag
            Command::Ghr => (5, 5),
            Command::Mcg => (1, BROKER_URI_MAX),
            Command::Msb | Command::Mus | Command::Mnd | Command::Mgs => (1, TOPIC_MAX),
            // topic + separator + payload
            Command::Mpb => (3, TOPIC_MAX + 1 + TX_CONTENT_MAX),
        }
    }
}
