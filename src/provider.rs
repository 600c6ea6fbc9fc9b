//! # Network Provider Traits
//!
//! The engine orchestrates network operations but never performs wire I/O
//! itself: Wi-Fi association, HTTP fetching and the MQTT session live behind
//! the traits defined here.
//!
//! All methods are synchronous and must not block. `begin`-style calls only
//! register an asynchronous operation; its progress arrives later as events
//! on the runtime's channel, processed on the same cooperative task that
//! dispatches commands.

use heapless::{String, Vec};

use crate::command::SSID_MAX;
use crate::http::RequestParts;

/// Maximum number of scan results a provider may report per scan.
pub const SCAN_RESULTS_MAX: usize = 16;

/// Opaque provider failure; the controller sees it as a one-line `U` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProviderError;

/// Wi-Fi association state, reported by `sap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WifiStatus {
    /// Not associated.
    Disconnected,
    /// Association in progress.
    Connecting,
    /// Associated, no address yet.
    Associated,
    /// Associated with an IP address assigned.
    GotIp,
}

impl WifiStatus {
    /// Single-character wire code for this state.
    pub fn code(self) -> u8 {
        match self {
            WifiStatus::Disconnected => b'D',
            WifiStatus::Connecting => b'C',
            WifiStatus::Associated => b'A',
            WifiStatus::GotIp => b'I',
        }
    }
}

/// One access point found by a scan.
#[derive(Debug, Clone)]
pub struct ScanEntry {
    /// Network name.
    pub ssid: String<SSID_MAX>,
    /// Authentication mode, provider-specific numeric code.
    pub auth: u8,
    /// Radio channel.
    pub channel: u8,
    /// Signal strength in dBm.
    pub rssi: i8,
}

/// Wi-Fi association, scanning and addressing.
pub trait WifiProvider {
    /// Current association state.
    fn status(&self) -> WifiStatus;

    /// Scans for access points, appending results to `out`.
    fn scan(&mut self, out: &mut Vec<ScanEntry, SCAN_RESULTS_MAX>) -> Result<(), ProviderError>;

    /// Stores credentials and begins association.
    fn configure(&mut self, ssid: &[u8], passphrase: &[u8]) -> Result<(), ProviderError>;

    /// Drops the current association.
    fn disconnect(&mut self) -> Result<(), ProviderError>;

    /// The assigned IPv4 address, if any.
    fn ip(&self) -> Option<[u8; 4]>;
}

/// Asynchronous HTTP operations.
pub trait HttpProvider {
    /// Begins the request described by `request`, tagged with `handle`.
    ///
    /// Must return without blocking. Lifecycle events for `handle` are
    /// delivered later through the runtime's event channel in the order
    /// connected, chunks, headers-complete, closed. `request` is borrowed
    /// only for the duration of this call.
    fn begin(&mut self, handle: usize, request: RequestParts<'_>) -> Result<(), ProviderError>;
}

/// The global MQTT session.
pub trait MqttProvider {
    /// Begins connecting the global broker session.
    fn connect(&mut self, uri: &[u8]) -> Result<(), ProviderError>;

    /// Whether the global session is currently connected.
    fn is_connected(&self) -> bool;

    /// Registers a broker-side subscription for `topic`.
    fn subscribe(&mut self, topic: &str) -> Result<(), ProviderError>;

    /// Removes the broker-side subscription for `topic`.
    fn unsubscribe(&mut self, topic: &str) -> Result<(), ProviderError>;

    /// Publishes `payload` to `topic`.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), ProviderError>;
}
