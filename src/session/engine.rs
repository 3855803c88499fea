// Playback engine port - load/play/pause/stop/seek plus async transport events
// The real adapter drives a rodio sink on a dedicated audio thread (rodio's
// output stream can't move between threads, the manager task can); the
// scripted adapter exists so transport sequences replay deterministically.

use super::SessionEvent;
use crate::catalog::Track;
use crate::error::TransportErrorKind;
use tokio::sync::mpsc;

#[cfg(feature = "audio")]
use anyhow::Result;
#[cfg(feature = "audio")]
use rodio::{Decoder, OutputStream, Sink, Source};
#[cfg(feature = "audio")]
use std::fs::File;
#[cfg(feature = "audio")]
use std::io::BufReader;
use std::sync::atomic::{AtomicU64, Ordering};
#[cfg(feature = "audio")]
use std::sync::atomic::AtomicU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;
#[cfg(feature = "audio")]
use tracing::warn;

/// Transport events an engine reports back, tagged with the load generation
/// they belong to so the manager can drop events from a superseded load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// Preparation finished; the transport can play.
    Ready { duration_ms: u64 },
    /// The transport stalled waiting for data.
    Buffering,
    /// The loaded track played to its end.
    Ended,
    /// Non-fatal transport failure; the loaded identity survives for a retry.
    Error(TransportErrorKind),
}

/// Port over the underlying media engine.
///
/// `load` begins asynchronous preparation and later produces `Ready`,
/// `Buffering` or `Error` on the session event channel. Control methods
/// return immediately; `seek` out of range is the adapter's problem to
/// clamp or ignore, never an error.
pub trait PlaybackEngine: Send {
    fn load(&mut self, track: &Track, generation: u64);
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    fn seek(&mut self, position_ms: u64);
    fn position_ms(&self) -> u64;
}

// ---------------------------------------------------------------------------
// Rodio adapter
// ---------------------------------------------------------------------------

#[cfg(feature = "audio")]
enum EngineCmd {
    Load { track: Track, generation: u64 },
    Play,
    Pause,
    Stop,
    Seek(u64),
}

/// Real engine: commands cross to an audio thread that owns the rodio
/// output stream. The thread also applies the shared master volume every
/// wakeup, which is what makes the sleep-timer fade audible.
#[cfg(feature = "audio")]
pub struct RodioEngine {
    cmds: std::sync::mpsc::Sender<EngineCmd>,
    position_ms: Arc<AtomicU64>,
}

#[cfg(feature = "audio")]
impl RodioEngine {
    pub fn new(
        events: mpsc::UnboundedSender<SessionEvent>,
        master_level: Arc<AtomicU32>,
    ) -> Result<Self> {
        let (cmd_tx, cmd_rx) = std::sync::mpsc::channel();
        let (init_tx, init_rx) = std::sync::mpsc::channel();
        let position_ms = Arc::new(AtomicU64::new(0));
        let thread_position = position_ms.clone();

        std::thread::Builder::new()
            .name("lullabox-audio".to_string())
            .spawn(move || audio_thread(cmd_rx, init_tx, events, master_level, thread_position))?;

        match init_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                cmds: cmd_tx,
                position_ms,
            }),
            Ok(Err(e)) => Err(anyhow::anyhow!("Audio output unavailable: {e}")),
            Err(_) => Err(anyhow::anyhow!("Audio thread exited during startup")),
        }
    }
}

#[cfg(feature = "audio")]
impl PlaybackEngine for RodioEngine {
    fn load(&mut self, track: &Track, generation: u64) {
        let _ = self.cmds.send(EngineCmd::Load {
            track: track.clone(),
            generation,
        });
    }

    fn play(&mut self) {
        let _ = self.cmds.send(EngineCmd::Play);
    }

    fn pause(&mut self) {
        let _ = self.cmds.send(EngineCmd::Pause);
    }

    fn stop(&mut self) {
        let _ = self.cmds.send(EngineCmd::Stop);
    }

    fn seek(&mut self, position_ms: u64) {
        let _ = self.cmds.send(EngineCmd::Seek(position_ms));
    }

    fn position_ms(&self) -> u64 {
        self.position_ms.load(Ordering::Relaxed)
    }
}

#[cfg(feature = "audio")]
fn audio_thread(
    cmds: std::sync::mpsc::Receiver<EngineCmd>,
    init: std::sync::mpsc::Sender<Result<(), String>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    master_level: Arc<AtomicU32>,
    position_ms: Arc<AtomicU64>,
) {
    // The stream must live on this thread for the whole session
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(pair) => {
            let _ = init.send(Ok(()));
            pair
        }
        Err(e) => {
            let _ = init.send(Err(e.to_string()));
            return;
        }
    };

    let mut sink: Option<Sink> = None;
    let mut generation = 0u64;
    let mut ended_sent = false;

    loop {
        match cmds.recv_timeout(Duration::from_millis(200)) {
            Ok(EngineCmd::Load { track, generation: gen }) => {
                generation = gen;
                ended_sent = false;
                if let Some(old) = sink.take() {
                    old.stop();
                }
                position_ms.store(0, Ordering::Relaxed);

                let event = match open_source(&track) {
                    Ok((source, duration_ms)) => match Sink::try_new(&handle) {
                        Ok(new_sink) => {
                            // Prepared but not playing until the manager says so
                            new_sink.pause();
                            new_sink.set_volume(master_level.load(Ordering::Relaxed) as f32 / 100.0);
                            new_sink.append(source);
                            sink = Some(new_sink);
                            EngineEvent::Ready { duration_ms }
                        }
                        Err(e) => {
                            warn!("Could not open a sink for '{}': {}", track.title, e);
                            EngineEvent::Error(TransportErrorKind::InvalidSource)
                        }
                    },
                    Err(kind) => EngineEvent::Error(kind),
                };
                let _ = events.send(SessionEvent::Engine { generation, event });
            }
            Ok(EngineCmd::Play) => {
                if let Some(s) = &sink {
                    s.play();
                }
            }
            Ok(EngineCmd::Pause) => {
                if let Some(s) = &sink {
                    s.pause();
                }
            }
            Ok(EngineCmd::Stop) => {
                if let Some(s) = sink.take() {
                    s.stop();
                }
                position_ms.store(0, Ordering::Relaxed);
                ended_sent = true;
            }
            Ok(EngineCmd::Seek(ms)) => {
                if let Some(s) = &sink {
                    match s.try_seek(Duration::from_millis(ms)) {
                        Ok(()) => position_ms.store(ms, Ordering::Relaxed),
                        Err(e) => warn!("Seek to {}ms not honored: {}", ms, e),
                    }
                }
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        }

        // Housekeeping on every wakeup: master volume, position, end detection
        if let Some(s) = &sink {
            s.set_volume(master_level.load(Ordering::Relaxed) as f32 / 100.0);
            position_ms.store(s.get_pos().as_millis() as u64, Ordering::Relaxed);
            if s.empty() && !ended_sent {
                ended_sent = true;
                let _ = events.send(SessionEvent::Engine {
                    generation,
                    event: EngineEvent::Ended,
                });
            }
        }
    }
}

#[cfg(feature = "audio")]
fn open_source(
    track: &Track,
) -> std::result::Result<(Decoder<BufReader<File>>, u64), TransportErrorKind> {
    let path = match (&track.local_path, track.is_downloaded) {
        (Some(p), true) => p.clone(),
        _ => {
            warn!(
                "'{}' has no downloaded copy; streaming {} needs a network stack this build doesn't carry",
                track.title, track.audio_url
            );
            return Err(TransportErrorKind::NetworkUnavailable);
        }
    };

    let file = File::open(&path).map_err(|e| {
        warn!("Could not open '{}': {}", path.display(), e);
        TransportErrorKind::InvalidSource
    })?;

    let source = Decoder::new(BufReader::new(file)).map_err(|e| {
        warn!("Unsupported or corrupted audio in '{}': {}", path.display(), e);
        TransportErrorKind::DecodeFailure
    })?;

    let duration_ms = source
        .total_duration()
        .map(|d| d.as_millis() as u64)
        .unwrap_or_else(|| track.duration_ms());

    Ok((source, duration_ms))
}

// ---------------------------------------------------------------------------
// Scripted adapter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Load(i64),
    Play,
    Pause,
    Stop,
    Seek(u64),
}

/// Deterministic engine for tests and audio-less builds. By default every
/// load reports `Ready` immediately (duration taken from the track); in
/// manual mode the test injects transport events itself.
pub struct ScriptedEngine {
    events: mpsc::UnboundedSender<SessionEvent>,
    auto_ready: bool,
    position: Arc<AtomicU64>,
    calls: Arc<Mutex<Vec<EngineCall>>>,
}

/// Shared view of what the scripted engine was told to do.
#[derive(Clone)]
pub struct EngineProbe {
    calls: Arc<Mutex<Vec<EngineCall>>>,
}

impl ScriptedEngine {
    pub fn new(events: mpsc::UnboundedSender<SessionEvent>) -> (Self, EngineProbe) {
        Self::build(events, true)
    }

    /// No automatic `Ready`; the caller scripts every transport event.
    pub fn manual(events: mpsc::UnboundedSender<SessionEvent>) -> (Self, EngineProbe) {
        Self::build(events, false)
    }

    fn build(
        events: mpsc::UnboundedSender<SessionEvent>,
        auto_ready: bool,
    ) -> (Self, EngineProbe) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let probe = EngineProbe {
            calls: calls.clone(),
        };
        (
            Self {
                events,
                auto_ready,
                position: Arc::new(AtomicU64::new(0)),
                calls,
            },
            probe,
        )
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl PlaybackEngine for ScriptedEngine {
    fn load(&mut self, track: &Track, generation: u64) {
        self.record(EngineCall::Load(track.id));
        self.position.store(0, Ordering::Relaxed);
        if self.auto_ready {
            let _ = self.events.send(SessionEvent::Engine {
                generation,
                event: EngineEvent::Ready {
                    duration_ms: track.duration_ms(),
                },
            });
        }
    }

    fn play(&mut self) {
        self.record(EngineCall::Play);
    }

    fn pause(&mut self) {
        self.record(EngineCall::Pause);
    }

    fn stop(&mut self) {
        self.record(EngineCall::Stop);
        self.position.store(0, Ordering::Relaxed);
    }

    fn seek(&mut self, position_ms: u64) {
        self.record(EngineCall::Seek(position_ms));
        self.position.store(position_ms, Ordering::Relaxed);
    }

    fn position_ms(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }
}

impl EngineProbe {
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &EngineCall) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::catalog::ContentType;

    #[tokio::test]
    async fn test_scripted_engine_reports_ready_with_track_duration() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (mut engine, probe) = ScriptedEngine::new(tx);
        let catalog = Catalog::builtin();
        let track = catalog.get(ContentType::Story, 1).unwrap();

        engine.load(track, 7);

        assert_eq!(probe.calls(), vec![EngineCall::Load(1)]);
        assert_eq!(
            rx.recv().await,
            Some(SessionEvent::Engine {
                generation: 7,
                event: EngineEvent::Ready {
                    duration_ms: 300_000
                }
            })
        );
    }

    #[tokio::test]
    async fn test_manual_mode_emits_nothing_on_load() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (mut engine, _probe) = ScriptedEngine::manual(tx);
        let catalog = Catalog::builtin();
        let track = catalog.get(ContentType::Song, 2).unwrap();

        engine.load(track, 1);
        engine.seek(5000);

        assert_eq!(engine.position_ms(), 5000);
        assert!(rx.try_recv().is_err());
    }
}
