//! Network event channel between providers and the runtime loop.
//!
//! Providers complete their work on other tasks or interrupt contexts; they
//! report progress as owned [`NetEvent`]s over an embassy channel. The runtime
//! loop drains the channel on the same task that dispatches commands, so the
//! engine itself never needs locking.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use heapless::{String, Vec};

use crate::http::{HttpEvent, RX_CONTENT_MAX};
use crate::mqtt::{MESSAGE_MAX, TOPIC_MAX};

/// An HTTP lifecycle event with inline storage, safe to move across tasks.
#[derive(Debug, Clone)]
pub enum OwnedHttpEvent {
    /// Connection established; `status` is the connect result (0 on success).
    Connected { status: i32 },
    /// A piece of the response body.
    Chunk { data: Vec<u8, RX_CONTENT_MAX> },
    /// Response headers complete, with the final HTTP status code.
    HeadersComplete {
        status: i32,
        headers: Vec<u8, RX_CONTENT_MAX>,
    },
    /// The connection is fully closed.
    Closed,
}

impl OwnedHttpEvent {
    /// Borrowed view for applying the event to the registry.
    pub fn as_event(&self) -> HttpEvent<'_> {
        match self {
            OwnedHttpEvent::Connected { status } => HttpEvent::Connected { status: *status },
            OwnedHttpEvent::Chunk { data } => HttpEvent::Chunk { data },
            OwnedHttpEvent::HeadersComplete { status, headers } => HttpEvent::HeadersComplete {
                status: *status,
                headers,
            },
            OwnedHttpEvent::Closed => HttpEvent::Closed,
        }
    }
}

/// One event for the runtime loop to apply.
#[derive(Debug, Clone)]
pub enum NetEvent {
    /// HTTP lifecycle progress for one handle.
    Http { handle: usize, event: OwnedHttpEvent },
    /// An MQTT publish arrived from the broker.
    MqttPublish {
        topic: String<TOPIC_MAX>,
        payload: Vec<u8, MESSAGE_MAX>,
    },
}

pub type NetEventChannel<const DEPTH: usize> = Channel<CriticalSectionRawMutex, NetEvent, DEPTH>;

pub type NetEventSender<'a, const DEPTH: usize> =
    Sender<'a, CriticalSectionRawMutex, NetEvent, DEPTH>;

pub type NetEventReceiver<'a, const DEPTH: usize> =
    Receiver<'a, CriticalSectionRawMutex, NetEvent, DEPTH>;

/// A handle providers use to report progress without direct access to the
/// engine.
///
/// Wraps a channel sender; can be copied into every provider task. Sends wait
/// when the channel is full.
#[derive(Clone, Copy)]
pub struct EventHandle<'a, const DEPTH: usize> {
    tx: NetEventSender<'a, DEPTH>,
}

impl<'a, const DEPTH: usize> EventHandle<'a, DEPTH> {
    /// Creates a handle from a channel sender.
    pub fn new(tx: NetEventSender<'a, DEPTH>) -> Self {
        Self { tx }
    }

    /// Reports a connection being established for `handle`.
    pub async fn http_connected(&self, handle: usize, status: i32) {
        self.tx
            .send(NetEvent::Http {
                handle,
                event: OwnedHttpEvent::Connected { status },
            })
            .await;
    }

    /// Reports response body bytes for `handle`.
    ///
    /// Data longer than one event's inline storage is split into multiple
    /// chunk events; the registry accounts for them individually.
    pub async fn http_chunk(&self, handle: usize, mut data: &[u8]) {
        while !data.is_empty() {
            let take = data.len().min(RX_CONTENT_MAX);
            let mut chunk = Vec::new();
            // Cannot fail: take is bounded by the vec capacity.
            let _ = chunk.extend_from_slice(&data[..take]);
            self.tx
                .send(NetEvent::Http {
                    handle,
                    event: OwnedHttpEvent::Chunk { data: chunk },
                })
                .await;
            data = &data[take..];
        }
    }

    /// Reports the completed header section for `handle`. Header blocks past
    /// the inline storage are truncated.
    pub async fn http_headers(&self, handle: usize, status: i32, headers: &[u8]) {
        let mut stored = Vec::new();
        let take = headers.len().min(RX_CONTENT_MAX);
        let _ = stored.extend_from_slice(&headers[..take]);
        self.tx
            .send(NetEvent::Http {
                handle,
                event: OwnedHttpEvent::HeadersComplete {
                    status,
                    headers: stored,
                },
            })
            .await;
    }

    /// Reports the connection for `handle` being fully closed.
    pub async fn http_closed(&self, handle: usize) {
        self.tx
            .send(NetEvent::Http {
                handle,
                event: OwnedHttpEvent::Closed,
            })
            .await;
    }

    /// Reports an arriving broker publish.
    ///
    /// Returns `false` without sending when the topic or payload exceeds the
    /// event's inline storage.
    pub async fn mqtt_publish(&self, topic: &str, payload: &[u8]) -> bool {
        let mut owned_topic = String::new();
        if owned_topic.push_str(topic).is_err() {
            warn!("publish dropped, topic exceeds {} bytes", TOPIC_MAX);
            return false;
        }
        let mut owned_payload = Vec::new();
        if owned_payload.extend_from_slice(payload).is_err() {
            warn!("publish dropped, payload exceeds {} bytes", MESSAGE_MAX);
            return false;
        }
        self.tx
            .send(NetEvent::MqttPublish {
                topic: owned_topic,
                payload: owned_payload,
            })
            .await;
        true
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;

    use super::*;

    #[test]
    fn events_round_trip_through_the_channel() {
        let channel: NetEventChannel<4> = NetEventChannel::new();
        let handle = EventHandle::new(channel.sender());

        block_on(async {
            handle.http_connected(1, 0).await;
            assert!(handle.mqtt_publish("t", b"21.5").await);
        });

        match block_on(channel.receiver().receive()) {
            NetEvent::Http { handle: 1, event } => {
                assert!(matches!(
                    event.as_event(),
                    HttpEvent::Connected { status: 0 }
                ));
            }
            other => panic!("unexpected event {:?}", other),
        }
        match block_on(channel.receiver().receive()) {
            NetEvent::MqttPublish { topic, payload } => {
                assert_eq!(topic.as_str(), "t");
                assert_eq!(&payload[..], b"21.5");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn oversized_chunks_are_split() {
        let channel: NetEventChannel<4> = NetEventChannel::new();
        let handle = EventHandle::new(channel.sender());

        let data = [b'x'; RX_CONTENT_MAX + 100];
        block_on(handle.http_chunk(0, &data));

        let first = block_on(channel.receiver().receive());
        let second = block_on(channel.receiver().receive());
        let lengths = [first, second].map(|event| match event {
            NetEvent::Http {
                event: OwnedHttpEvent::Chunk { data },
                ..
            } => data.len(),
            other => panic!("unexpected event {:?}", other),
        });
        assert_eq!(lengths, [RX_CONTENT_MAX, 100]);
    }
}
