//! Linear playback queue
//!
//! Insertion order is playback order. The queue is replaced wholesale by
//! `load_queue` and never edited in place, so it is shared as an
//! `Arc<[TrackDescriptor]>` with every state snapshot.

use crate::types::TrackDescriptor;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub(crate) struct Queue {
    tracks: Arc<[TrackDescriptor]>,
}

impl Default for Queue {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Queue {
    pub(crate) fn new(tracks: Vec<TrackDescriptor>) -> Self {
        Self {
            tracks: tracks.into(),
        }
    }

    /// Start index for a new queue: `requested` if in range, else 0
    pub(crate) fn start_index(&self, requested: usize) -> Option<usize> {
        if self.tracks.is_empty() {
            None
        } else if requested < self.tracks.len() {
            Some(requested)
        } else {
            Some(0)
        }
    }

    pub(crate) fn get(&self, index: usize) -> Option<&TrackDescriptor> {
        self.tracks.get(index)
    }

    /// Index after `current`, if the queue continues
    pub(crate) fn next_index(&self, current: usize) -> Option<usize> {
        let next = current.checked_add(1)?;
        (next < self.tracks.len()).then_some(next)
    }

    /// Index before `current`, if not at the start
    pub(crate) fn previous_index(&self, current: usize) -> Option<usize> {
        current
            .checked_sub(1)
            .filter(|&index| index < self.tracks.len())
    }

    pub(crate) fn len(&self) -> usize {
        self.tracks.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub(crate) fn shared(&self) -> Arc<[TrackDescriptor]> {
        Arc::clone(&self.tracks)
    }
}
