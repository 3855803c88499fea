// Playback session - the one part of the app with real moving pieces
// A single manager task owns all mutable state; the engine, focus arbiter
// and sleep timer report back over a channel and every change goes out to
// observers as a whole-value snapshot.

pub mod engine;
pub mod focus;
pub mod manager;
pub mod store;
pub mod timer;
pub mod volume;

#[cfg(feature = "audio")]
pub use engine::RodioEngine;
pub use engine::{EngineEvent, PlaybackEngine, ScriptedEngine};
pub use focus::{FocusArbiter, FocusEvent, FocusResponse, ScriptedFocus, SoloFocus};
pub use manager::{Command, SessionContext, SessionHandle, SessionManager};
pub use store::StateStore;
pub use timer::SleepTimer;
pub use volume::{SoftwareVolume, VolumeControl};

use crate::catalog::{ContentType, Track};
use crate::error::TransportErrorKind;

/// Everything an observer needs to render the transport.
///
/// `content_id > 0` iff a track is loaded. `is_playing` and `is_ended` are
/// mutually exclusive; while `is_buffering` the transport is not ready yet.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaybackSnapshot {
    pub title: String,
    pub description: String,
    pub cover_url: String,
    pub content_type: Option<ContentType>,
    pub content_id: i64,
    pub is_playing: bool,
    pub is_buffering: bool,
    pub is_ended: bool,
    pub duration_ms: u64,
    pub position_ms: u64,
    /// Last transport failure for the loaded track, cleared on the next
    /// successful load or ready event.
    pub error: Option<TransportErrorKind>,
}

impl PlaybackSnapshot {
    /// Fresh snapshot carrying the new track's identity, shown to observers
    /// while the media is still preparing.
    pub fn for_track(track: &Track) -> Self {
        Self {
            title: track.title.clone(),
            description: track.description.clone(),
            cover_url: track.cover_url.clone(),
            content_type: Some(track.content_type),
            content_id: track.id,
            is_buffering: true,
            ..Self::default()
        }
    }

    pub fn has_content(&self) -> bool {
        self.content_id > 0
    }
}

/// Sleep timer as observers see it. Inactive means both durations are zero.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimerSnapshot {
    pub is_active: bool,
    pub total_duration_ms: u64,
    pub remaining_ms: u64,
}

/// The whole published state. Always replaced as a unit, never patched,
/// so no observer can see a torn update.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionState {
    pub playback: PlaybackSnapshot,
    pub timer: TimerSnapshot,
}

/// What the asynchronous components report back to the manager task.
///
/// Engine events and timer ticks carry the generation they were produced
/// under; the manager drops anything from a superseded generation.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Engine { generation: u64, event: EngineEvent },
    Focus(FocusEvent),
    TimerTick { generation: u64 },
}
