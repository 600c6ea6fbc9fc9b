//! The cooperative runtime loop.
//!
//! One task owns the transport, the framer and the engine, and interleaves
//! two sources of work with a `select`: bytes from the serial controller and
//! network events from the providers' channel. Because both land on the same
//! task, command handlers and event application never race.

use embassy_futures::select::{Either, select};

use super::events::{NetEvent, NetEventReceiver};
use crate::engine::LinkEngine;
use crate::error::LinkError;
use crate::frame::{LineFramer, TERMINATOR};
use crate::provider::{HttpProvider, MqttProvider, WifiProvider};
use crate::transport::SerialTransport;

/// Capacity of the inbound line buffer.
pub const LINE_CAP: usize = 1024;

/// Ties a transport, an engine and the event channel into one run loop.
pub struct LinkRuntime<'a, T, W, H, M, const HANDLES: usize, const MAX_SUBS: usize, const DEPTH: usize>
{
    transport: T,
    engine: LinkEngine<W, H, M, HANDLES, MAX_SUBS>,
    events: NetEventReceiver<'a, DEPTH>,
    framer: LineFramer<LINE_CAP>,
}

impl<'a, T, W, H, M, const HANDLES: usize, const MAX_SUBS: usize, const DEPTH: usize>
    LinkRuntime<'a, T, W, H, M, HANDLES, MAX_SUBS, DEPTH>
where
    T: SerialTransport,
    W: WifiProvider,
    H: HttpProvider,
    M: MqttProvider,
{
    /// Creates a runtime around an engine and the receiving end of the
    /// providers' event channel.
    pub fn new(
        transport: T,
        engine: LinkEngine<W, H, M, HANDLES, MAX_SUBS>,
        events: NetEventReceiver<'a, DEPTH>,
    ) -> Self {
        Self {
            transport,
            engine,
            events,
            framer: LineFramer::new(),
        }
    }

    /// Runs until the transport closes, the controller requests a reset, or
    /// an unrecoverable error occurs.
    ///
    /// Returns `Ok(())` on orderly shutdown; the caller decides whether that
    /// means rebooting the device or reopening the transport.
    ///
    /// Pending events are drained before more transport bytes are read, so a
    /// status poll observes every event that preceded it.
    pub async fn run(&mut self) -> Result<(), LinkError<T::Error>> {
        info!("link runtime started");
        let mut chunk = [0u8; 64];
        loop {
            match select(self.events.receive(), self.transport.recv(&mut chunk)).await {
                Either::First(event) => self.apply(event),
                Either::Second(read) => {
                    let n = read.map_err(LinkError::Transport)?;
                    if n == 0 {
                        debug!("transport closed");
                        return Ok(());
                    }
                    if self.framer.push(&chunk[..n]).is_err() {
                        error!("line buffer overflow, stream lost sync");
                        return Err(LinkError::Overflow);
                    }
                    while let Some(line) = self.framer.next_line() {
                        let reply = self.engine.dispatch(&line);
                        self.transport
                            .send(&reply)
                            .await
                            .map_err(LinkError::Transport)?;
                        self.transport
                            .send(TERMINATOR)
                            .await
                            .map_err(LinkError::Transport)?;
                        if self.engine.reset_pending() {
                            info!("stopping for device reset");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    fn apply(&mut self, event: NetEvent) {
        match event {
            NetEvent::Http { handle, event } => {
                self.engine.http_event(handle, event.as_event());
            }
            NetEvent::MqttPublish { topic, payload } => {
                self.engine.mqtt_arrived(&topic, &payload);
            }
        }
    }
}
