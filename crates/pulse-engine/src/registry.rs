//! Track registration, keyed by producer identity.

use std::sync::{Arc, Mutex};

use indexmap::IndexMap;

use pulse_core::{FrameId, TrackId, TrackKind};

use crate::track::Track;

/// Descriptor of a registered track, as exposed to consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    /// Stable registration index.
    pub id: TrackId,
    /// Current display name (renames are legal).
    pub name: String,
    /// What kind of producer feeds the track.
    pub kind: TrackKind,
    /// Producer identity within the kind (thread serial, queue index).
    pub producer: u64,
}

struct RegistryInner {
    // IndexMap keeps registration order, which is the TrackId order.
    index: IndexMap<(TrackKind, u64), usize>,
    tracks: Vec<Arc<Track>>,
}

/// Registry of every track in the session.
///
/// Registration is idempotent per `(kind, producer)`: the first call wins
/// the index, later calls only rename. The mutex is touched on
/// registration and track iteration, never on the event hot path
/// (recorders cache their `Arc<Track>`).
pub(crate) struct TrackRegistry {
    inner: Mutex<RegistryInner>,
    history_size: usize,
    capacity: u32,
}

impl TrackRegistry {
    pub fn new(history_size: usize, capacity: u32) -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                index: IndexMap::new(),
                tracks: Vec::new(),
            }),
            history_size,
            capacity,
        }
    }

    /// Register (or rename) the track for `(kind, producer)`.
    ///
    /// `current` is the frame open at registration time; the track's slot
    /// for it is live immediately so a lazily registered thread can record
    /// into the ongoing frame.
    pub fn register(
        &self,
        name: &str,
        kind: TrackKind,
        producer: u64,
        current: FrameId,
    ) -> Arc<Track> {
        let mut inner = self.inner.lock().expect("registry poisoned");
        if let Some(&slot) = inner.index.get(&(kind, producer)) {
            let track = Arc::clone(&inner.tracks[slot]);
            track.rename(name);
            return track;
        }
        let pos = inner.tracks.len();
        let track = Arc::new(Track::new(
            TrackId(pos as u32),
            kind,
            producer,
            name.to_owned(),
            self.history_size,
            self.capacity,
            current,
        ));
        inner.index.insert((kind, producer), pos);
        inner.tracks.push(Arc::clone(&track));
        track
    }

    /// Look up a track by its stable index.
    pub fn get(&self, id: TrackId) -> Option<Arc<Track>> {
        let inner = self.inner.lock().expect("registry poisoned");
        inner.tracks.get(id.0 as usize).map(Arc::clone)
    }

    /// Snapshot of every track handle, in registration order.
    pub fn all(&self) -> Vec<Arc<Track>> {
        let inner = self.inner.lock().expect("registry poisoned");
        inner.tracks.iter().map(Arc::clone).collect()
    }

    /// Consumer-facing descriptors, in registration order.
    pub fn infos(&self) -> Vec<TrackInfo> {
        let inner = self.inner.lock().expect("registry poisoned");
        inner
            .tracks
            .iter()
            .map(|t| TrackInfo {
                id: t.id(),
                name: t.name(),
                kind: t.kind(),
                producer: t.producer(),
            })
            .collect()
    }
}
