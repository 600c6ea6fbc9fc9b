//! # Subscription Cache
//!
//! Tracks MQTT topic subscriptions and buffers the most recent payload per
//! topic. The controller polls for freshness and fetches messages at its own
//! pace; arrival overwrites, it never queues.
//!
//! Entries exist only between an explicit subscribe and unsubscribe. A
//! publish arriving for an unknown topic is logged and dropped; it never
//! creates an entry implicitly.

use heapless::index_map::FnvIndexMap;
use heapless::{String, Vec};

/// Topic length ceiling.
pub const TOPIC_MAX: usize = 128;

/// Buffered payload ceiling; longer payloads are truncated on arrival.
pub const MESSAGE_MAX: usize = 512;

/// Why a cache operation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CacheError {
    /// A subscription for this topic already exists.
    AlreadyExists,
    /// No subscription for this topic.
    NotFound,
    /// The subscription table is full, or the topic exceeds [`TOPIC_MAX`].
    Rejected,
}

/// Latest-message state for one subscribed topic.
struct SubscriptionEntry {
    message: Vec<u8, MESSAGE_MAX>,
    /// Set on arrival, cleared by [`SubscriptionCache::take_message`].
    fresh: bool,
    /// True once at least one message has ever arrived.
    active: bool,
}

impl SubscriptionEntry {
    fn new() -> Self {
        Self {
            message: Vec::new(),
            fresh: false,
            active: false,
        }
    }
}

/// Topic-keyed store of subscription entries.
///
/// `MAX_SUBS` must be a power of two (`FnvIndexMap` requirement).
pub struct SubscriptionCache<const MAX_SUBS: usize> {
    entries: FnvIndexMap<String<TOPIC_MAX>, SubscriptionEntry, MAX_SUBS>,
}

impl<const MAX_SUBS: usize> Default for SubscriptionCache<MAX_SUBS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const MAX_SUBS: usize> SubscriptionCache<MAX_SUBS> {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            entries: FnvIndexMap::new(),
        }
    }

    /// Creates an entry for `topic`.
    ///
    /// The caller is responsible for registering the topic with the MQTT
    /// provider; on provider failure, roll back with [`unsubscribe`].
    ///
    /// [`unsubscribe`]: SubscriptionCache::unsubscribe
    pub fn subscribe(&mut self, topic: &str) -> Result<(), CacheError> {
        let key = topic_key(topic).ok_or(CacheError::Rejected)?;
        if self.entries.contains_key(&key) {
            return Err(CacheError::AlreadyExists);
        }
        match self.entries.insert(key, SubscriptionEntry::new()) {
            Ok(_) => {
                debug!("subscribed to {}", topic);
                Ok(())
            }
            Err(_) => Err(CacheError::Rejected),
        }
    }

    /// Removes the entry for `topic`, releasing its message buffer.
    pub fn unsubscribe(&mut self, topic: &str) -> Result<(), CacheError> {
        let key = topic_key(topic).ok_or(CacheError::NotFound)?;
        match self.entries.remove(&key) {
            Some(_) => {
                debug!("unsubscribed from {}", topic);
                Ok(())
            }
            None => Err(CacheError::NotFound),
        }
    }

    /// Removes every entry.
    pub fn unsubscribe_all(&mut self) {
        self.entries.clear();
    }

    /// Iterates the subscribed topics, in insertion order.
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|key| key.as_str())
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no subscriptions exist.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a subscription for `topic` exists.
    pub fn contains(&self, topic: &str) -> bool {
        topic_key(topic).is_some_and(|key| self.entries.contains_key(&key))
    }

    /// Whether at least one message has ever arrived for `topic`. `None` for
    /// an unknown topic.
    pub fn is_active(&self, topic: &str) -> Option<bool> {
        let key = topic_key(topic)?;
        self.entries.get(&key).map(|entry| entry.active)
    }

    /// Reads the freshness flag without clearing it. `None` for an unknown
    /// topic.
    pub fn has_new_data(&self, topic: &str) -> Option<bool> {
        let key = topic_key(topic)?;
        self.entries.get(&key).map(|entry| entry.fresh)
    }

    /// Returns the latest payload and clears the freshness flag, so each
    /// arrival is observed as fresh at most once. `None` for an unknown topic.
    pub fn take_message(&mut self, topic: &str) -> Option<&[u8]> {
        let key = topic_key(topic)?;
        let entry = self.entries.get_mut(&key)?;
        entry.fresh = false;
        Some(&entry.message)
    }

    /// Records an arriving publish, overwriting any previous payload.
    ///
    /// Returns `false` when no entry matches the topic; the payload is then
    /// dropped.
    pub fn on_message(&mut self, topic: &str, payload: &[u8]) -> bool {
        let Some(entry) = topic_key(topic).and_then(|key| self.entries.get_mut(&key)) else {
            error!("publish for unsubscribed topic {} dropped", topic);
            return false;
        };

        entry.message.clear();
        let take = payload.len().min(MESSAGE_MAX);
        if take < payload.len() {
            warn!("payload for {} truncated to {} bytes", topic, MESSAGE_MAX);
        }
        // Cannot fail: take <= MESSAGE_MAX.
        let _ = entry.message.extend_from_slice(&payload[..take]);
        entry.fresh = true;
        entry.active = true;
        true
    }
}

fn topic_key(topic: &str) -> Option<String<TOPIC_MAX>> {
    let mut key = String::new();
    key.push_str(topic).ok()?;
    Some(key)
}
