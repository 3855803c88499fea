// Session manager - the single writer for all playback state
// Commands come in on one channel, component events on another; a select
// loop serializes every mutation and each change goes out as a fresh
// whole-value snapshot. Anything from a superseded load or timer run is
// dropped on the floor.

use super::engine::PlaybackEngine;
use super::focus::{FocusArbiter, FocusEvent, FocusResponse};
use super::store::StateStore;
use super::timer::{SleepTimer, TickOutcome};
use super::volume::VolumeControl;
use super::{EngineEvent, PlaybackSnapshot, SessionEvent, SessionState};
use crate::catalog::Track;
use crate::config::Config;
use crate::favorites::FavoritesStore;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Everything observers can ask the session to do.
#[derive(Debug, Clone)]
pub enum Command {
    PlayTrack(Track),
    TogglePlayPause,
    Stop,
    SeekTo(u64),
    SetTimer { minutes: u32, sleep_mode: bool },
    CancelTimer,
    ToggleFavorite,
    Shutdown,
}

/// The collaborators a session is built from, injected once at construction.
pub struct SessionContext {
    pub engine: Box<dyn PlaybackEngine>,
    pub focus: Box<dyn FocusArbiter>,
    pub volume: Box<dyn VolumeControl>,
    pub favorites: FavoritesStore,
    pub config: Config,
}

/// Cheap cloneable front door: send commands, watch snapshots.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    pub fn play_track(&self, track: Track) {
        let _ = self.commands.send(Command::PlayTrack(track));
    }

    pub fn toggle_play_pause(&self) {
        let _ = self.commands.send(Command::TogglePlayPause);
    }

    pub fn stop(&self) {
        let _ = self.commands.send(Command::Stop);
    }

    pub fn seek_to(&self, position_ms: u64) {
        let _ = self.commands.send(Command::SeekTo(position_ms));
    }

    pub fn set_timer(&self, minutes: u32, sleep_mode: bool) {
        let _ = self.commands.send(Command::SetTimer { minutes, sleep_mode });
    }

    pub fn cancel_timer(&self) {
        let _ = self.commands.send(Command::CancelTimer);
    }

    pub fn toggle_favorite(&self) {
        let _ = self.commands.send(Command::ToggleFavorite);
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    /// Cache-then-push subscription to the session state.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }
}

pub struct SessionManager {
    engine: Box<dyn PlaybackEngine>,
    focus: Box<dyn FocusArbiter>,
    timer: SleepTimer,
    favorites: FavoritesStore,
    config: Config,
    store: StateStore,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedReceiver<SessionEvent>,

    playback: PlaybackSnapshot,
    /// Kept so a stopped, ended or failed load can be replayed with a
    /// plain toggle.
    loaded: Option<Track>,
    /// Bumped on every load and stop; engine events carrying an older
    /// generation are stale and ignored.
    generation: u64,
    autoplay_on_ready: bool,
    playing_before_loss: bool,
    focus_held: bool,
    /// Set once the engine has released its source (stop or natural end);
    /// a bare `play` would be a no-op, the track must be loaded again.
    transport_down: bool,
}

impl SessionManager {
    /// Spawn the manager task. The caller owns the event channel so it can
    /// wire the same sender into the engine/focus adapters.
    pub fn spawn(
        ctx: SessionContext,
        events_tx: mpsc::UnboundedSender<SessionEvent>,
        events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    ) -> SessionHandle {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let store = StateStore::new();
        let state = store.subscribe();

        let manager = SessionManager {
            engine: ctx.engine,
            focus: ctx.focus,
            timer: SleepTimer::new(ctx.volume, events_tx),
            favorites: ctx.favorites,
            config: ctx.config,
            store,
            commands: cmd_rx,
            events: events_rx,
            playback: PlaybackSnapshot::default(),
            loaded: None,
            generation: 0,
            autoplay_on_ready: false,
            playing_before_loss: false,
            focus_held: false,
            transport_down: false,
        };
        tokio::spawn(manager.run());

        SessionHandle {
            commands: cmd_tx,
            state,
        }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => {
                        if !self.handle_command(cmd) {
                            break;
                        }
                    }
                    // Every handle dropped: nobody can command us anymore
                    None => break,
                },
                Some(event) = self.events.recv() => self.handle_event(event),
            }
        }
        self.teardown();
    }

    fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::PlayTrack(track) => self.play_track(track),
            Command::TogglePlayPause => self.toggle_play_pause(),
            Command::Stop => {
                self.stop_session();
                self.publish();
            }
            Command::SeekTo(position_ms) => self.seek_to(position_ms),
            Command::SetTimer { minutes, sleep_mode } => self.set_timer(minutes, sleep_mode),
            Command::CancelTimer => {
                self.timer.cancel();
                self.publish();
            }
            Command::ToggleFavorite => self.toggle_favorite(),
            Command::Shutdown => return false,
        }
        true
    }

    fn play_track(&mut self, track: Track) {
        info!("Playing {} '{}'", track.content_type, track.title);

        // New identity goes out right away, while the media still prepares
        self.generation += 1;
        self.transport_down = false;
        self.playback = PlaybackSnapshot::for_track(&track);
        self.engine.load(&track, self.generation);
        self.loaded = Some(track);

        self.autoplay_on_ready = match self.focus.request() {
            FocusResponse::Granted => {
                self.focus_held = true;
                true
            }
            FocusResponse::Denied => {
                warn!("Audio focus denied; staying paused");
                false
            }
        };
        self.playing_before_loss = false;
        self.publish();
    }

    fn toggle_play_pause(&mut self) {
        if !self.playback.has_content() {
            debug!("Toggle with nothing loaded; ignoring");
            return;
        }

        if self.playback.is_playing {
            self.engine.pause();
            self.playback.is_playing = false;
            self.publish();
            return;
        }

        if self.focus.request() == FocusResponse::Denied {
            warn!("Audio focus denied; staying paused");
            return;
        }
        self.focus_held = true;

        if self.playback.error.is_some() || self.transport_down {
            // The engine has no playable source anymore (failed, stopped or
            // drained); a bare play would be silent, so load again from the
            // identity we kept
            let Some(track) = self.loaded.clone() else {
                return;
            };
            self.generation += 1;
            self.transport_down = false;
            self.playback.error = None;
            self.playback.is_ended = false;
            self.playback.is_buffering = true;
            self.playback.position_ms = 0;
            self.autoplay_on_ready = true;
            self.engine.load(&track, self.generation);
        } else if self.playback.is_buffering {
            // Not ready yet; play as soon as it is
            self.autoplay_on_ready = true;
        } else {
            self.engine.play();
            self.playback.is_playing = true;
        }
        self.publish();
    }

    fn seek_to(&mut self, position_ms: u64) {
        if !self.playback.has_content() {
            return;
        }
        // Out of range is clamped, never an error
        let clamped = if self.playback.duration_ms > 0 {
            position_ms.min(self.playback.duration_ms)
        } else {
            position_ms
        };
        self.engine.seek(clamped);
        self.playback.position_ms = clamped;
        self.publish();
    }

    fn set_timer(&mut self, minutes: u32, sleep_mode: bool) {
        if minutes == 0 {
            warn!("Ignoring zero-length sleep timer");
            return;
        }
        self.timer.start(minutes, sleep_mode);

        // The chosen values become the new defaults; persistence is
        // fire-and-forget and never touches playback state.
        self.config.timer_duration_minutes = minutes;
        self.config.enable_sleep_mode = sleep_mode;
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = config.save() {
                warn!("Could not persist timer defaults: {e:#}");
            }
        });

        self.publish();
    }

    fn toggle_favorite(&mut self) {
        let Some(content_type) = self.playback.content_type else {
            debug!("Toggle favorite with nothing loaded; ignoring");
            return;
        };
        let now_favorite = self.favorites.toggle(content_type, self.playback.content_id);
        info!(
            "'{}' {} favorites",
            self.playback.title,
            if now_favorite { "added to" } else { "removed from" }
        );
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Engine { generation, event } => {
                if generation != self.generation {
                    debug!("Discarding engine event from superseded load");
                    return;
                }
                self.handle_engine_event(event);
            }
            SessionEvent::Focus(event) => self.handle_focus_event(event),
            SessionEvent::TimerTick { generation } => match self.timer.on_tick(generation) {
                TickOutcome::Stale => {}
                TickOutcome::Running => self.publish(),
                TickOutcome::Expired => {
                    // Expiry stops playback; the timer already restored volume
                    self.stop_session();
                    self.publish();
                }
            },
        }
    }

    fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Ready { duration_ms } => {
                self.playback.is_buffering = false;
                self.playback.is_ended = false;
                self.playback.error = None;
                self.playback.duration_ms = duration_ms;
                self.playback.position_ms = 0;
                if self.autoplay_on_ready {
                    self.engine.play();
                    self.playback.is_playing = true;
                }
                self.autoplay_on_ready = false;
            }
            EngineEvent::Buffering => {
                self.playback.is_buffering = true;
            }
            EngineEvent::Ended => {
                self.playback.is_playing = false;
                self.playback.is_ended = true;
                self.playback.position_ms = self.playback.duration_ms;
                self.transport_down = true;
            }
            EngineEvent::Error(kind) => {
                warn!("Transport error: {kind}; reverting to paused");
                self.playback.is_playing = false;
                self.playback.is_buffering = false;
                self.playback.error = Some(kind);
                self.autoplay_on_ready = false;
            }
        }
        self.publish();
    }

    fn handle_focus_event(&mut self, event: FocusEvent) {
        match event {
            FocusEvent::PermanentLoss => {
                info!("Audio focus lost; pausing");
                self.playing_before_loss = false;
                self.focus_held = false;
                self.engine.pause();
                self.playback.is_playing = false;
            }
            FocusEvent::TransientLoss => {
                self.playing_before_loss = self.playback.is_playing;
                self.engine.pause();
                self.playback.is_playing = false;
            }
            FocusEvent::Regained => {
                // Resume only a session the interruption itself paused
                if self.playing_before_loss {
                    self.engine.play();
                    self.playback.is_playing = true;
                }
                self.playing_before_loss = false;
            }
        }
        self.publish();
    }

    fn stop_session(&mut self) {
        self.generation += 1;
        self.engine.stop();
        self.timer.cancel();
        if self.focus_held {
            self.focus.release();
            self.focus_held = false;
        }
        self.playback.is_playing = false;
        self.playback.is_buffering = false;
        self.playback.position_ms = 0;
        self.autoplay_on_ready = false;
        self.transport_down = true;
    }

    /// Whole-snapshot publication; observers never see partial updates.
    fn publish(&mut self) {
        if self.playback.has_content() && self.playback.is_playing {
            let pos = self.engine.position_ms();
            self.playback.position_ms = if self.playback.duration_ms > 0 {
                pos.min(self.playback.duration_ms)
            } else {
                pos
            };
        }
        self.store.publish(SessionState {
            playback: self.playback.clone(),
            timer: self.timer.snapshot(),
        });
    }

    /// Best-effort teardown, in order: timer, engine, focus.
    fn teardown(&mut self) {
        info!("Session shutting down");
        self.timer.cancel();
        self.engine.stop();
        self.focus.release();
        self.playback.is_playing = false;
        self.playback.is_buffering = false;
        self.publish();
    }
}
