//! Playback Events
//!
//! Two channels leave the engine:
//! - Store subscriptions: listeners called with a fresh `PlayerState`
//!   after every state change
//! - Discrete events (`PlaybackEvent`) over a broadcast channel:
//!   track changes, end of queue, recovered errors

use crate::error::ErrorKind;
use crate::types::PlayerState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Events emitted by the playback engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlaybackEvent {
    /// A track started loading
    TrackChanged {
        /// ID of the new (current) track
        track_id: String,
        /// Position in the queue
        index: usize,
    },

    /// The last track finished, or `next` was pressed on it
    QueueEnded {
        /// ID of the track left loaded
        track_id: String,
    },

    /// An error was recovered locally
    Error {
        kind: ErrorKind,
        message: String,
    },
}

type Listener = Arc<dyn Fn(&PlayerState) + Send + Sync>;

/// Registry of store listeners
#[derive(Default)]
pub(crate) struct Listeners {
    next_id: u64,
    entries: BTreeMap<u64, Listener>,
}

impl Listeners {
    pub(crate) fn insert(&mut self, listener: Listener) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(id, listener);
        id
    }

    pub(crate) fn remove(&mut self, id: u64) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Clone out the current listeners so they can be called unlocked
    pub(crate) fn snapshot(&self) -> Vec<Listener> {
        self.entries.values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Handle returned by `PlaybackEngine::subscribe`
///
/// Dropping it leaves the listener registered; call `unsubscribe`.
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    pub(crate) fn new(id: u64, listeners: Weak<Mutex<Listeners>>) -> Self {
        Self { id, listeners }
    }

    /// Remove the listener. Returns false if the engine is gone.
    pub fn unsubscribe(self) -> bool {
        match self.listeners.upgrade() {
            Some(listeners) => listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(self.id),
            None => false,
        }
    }
}
