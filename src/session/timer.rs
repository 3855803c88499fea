// Sleep timer - counts down once a second and fades the last minute
// The volume is what ramps, not the playback, so a child hears a gentle
// fade instead of a hard cut. Expiry stops playback through the manager
// and puts the output level back exactly where it started.

use super::volume::VolumeControl;
use super::{SessionEvent, TimerSnapshot};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What a delivered tick meant to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Tick from a superseded or finished run; ignore it.
    Stale,
    /// Countdown advanced by one second.
    Running,
    /// Countdown reached zero; the caller must stop playback.
    Expired,
}

struct ActiveRun {
    total_ms: u64,
    remaining_ms: u64,
    sleep_mode: bool,
    original_level: u32,
    task: JoinHandle<()>,
}

/// Countdown state machine. At most one run is active; starting a new one
/// always supersedes the old, whose queued ticks become no-ops.
pub struct SleepTimer {
    volume: Box<dyn VolumeControl>,
    events: mpsc::UnboundedSender<SessionEvent>,
    generation: u64,
    run: Option<ActiveRun>,
}

impl SleepTimer {
    pub fn new(volume: Box<dyn VolumeControl>, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            volume,
            events,
            generation: 0,
            run: None,
        }
    }

    /// Start (or restart) the countdown. Captures the current output level
    /// so it can be restored when the run ends.
    pub fn start(&mut self, minutes: u32, sleep_mode: bool) {
        if minutes == 0 {
            warn!("Ignoring sleep timer with zero duration");
            return;
        }

        self.cancel();
        self.generation += 1;

        let total_ms = u64::from(minutes) * 60_000;
        let generation = self.generation;
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(1000));
            // The first tick completes immediately; the countdown starts
            // one full second in.
            interval.tick().await;
            loop {
                interval.tick().await;
                if events.send(SessionEvent::TimerTick { generation }).is_err() {
                    break;
                }
            }
        });

        self.run = Some(ActiveRun {
            total_ms,
            remaining_ms: total_ms,
            sleep_mode,
            original_level: self.volume.level(),
            task,
        });

        info!(
            "Sleep timer started: {} min, sleep mode {}",
            minutes,
            if sleep_mode { "on" } else { "off" }
        );
    }

    /// Advance the countdown for a delivered tick.
    pub fn on_tick(&mut self, generation: u64) -> TickOutcome {
        if generation != self.generation {
            debug!("Discarding tick from superseded timer run");
            return TickOutcome::Stale;
        }
        let Some(run) = self.run.as_mut() else {
            return TickOutcome::Stale;
        };

        run.remaining_ms = run.remaining_ms.saturating_sub(1000);

        // Final minute: ramp the output towards (but never to) silence.
        if run.sleep_mode && run.remaining_ms > 0 && run.remaining_ms < 60_000 {
            let fraction = run.remaining_ms as f64 / 60_000.0;
            let target = ((f64::from(run.original_level) * fraction).round() as u32).max(1);
            self.volume.set_level(target);
        }

        if run.remaining_ms == 0 {
            info!("Sleep timer expired");
            self.finish_run();
            TickOutcome::Expired
        } else {
            TickOutcome::Running
        }
    }

    /// Stop ticking and restore the output level. Idempotent.
    pub fn cancel(&mut self) {
        if self.run.is_some() {
            info!("Sleep timer cancelled");
            self.finish_run();
        }
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        match &self.run {
            Some(run) => TimerSnapshot {
                is_active: true,
                total_duration_ms: run.total_ms,
                remaining_ms: run.remaining_ms,
            },
            None => TimerSnapshot::default(),
        }
    }

    fn finish_run(&mut self) {
        if let Some(run) = self.run.take() {
            run.task.abort();
            if run.sleep_mode {
                self.volume.set_level(run.original_level);
            }
        }
    }
}

impl Drop for SleepTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::volume::SoftwareVolume;

    fn timer_with_volume(level: u32) -> (SleepTimer, SoftwareVolume) {
        let volume = SoftwareVolume::new(level);
        let (tx, _rx) = mpsc::unbounded_channel();
        (SleepTimer::new(Box::new(volume.clone()), tx), volume)
    }

    #[tokio::test]
    async fn test_countdown_decrements_by_exactly_one_second() {
        let (mut timer, _volume) = timer_with_volume(100);
        timer.start(3, false);
        let generation = timer.generation;

        let mut expected = 180_000u64;
        while expected > 1000 {
            assert_eq!(timer.on_tick(generation), TickOutcome::Running);
            expected -= 1000;
            assert_eq!(timer.snapshot().remaining_ms, expected);
            assert_eq!(timer.snapshot().total_duration_ms, 180_000);
        }
        assert_eq!(timer.on_tick(generation), TickOutcome::Expired);
        assert_eq!(timer.snapshot(), TimerSnapshot::default());
    }

    #[tokio::test]
    async fn test_final_minute_ramp_values() {
        let (mut timer, volume) = timer_with_volume(100);
        timer.start(1, true);
        let generation = timer.generation;

        // First tick: 59000 ms left, 100 * 59/60 rounds to 98
        assert_eq!(timer.on_tick(generation), TickOutcome::Running);
        assert_eq!(volume.level(), 98);

        // Down to the last second: 100 * 1/60 rounds to 2
        for _ in 0..58 {
            timer.on_tick(generation);
        }
        assert_eq!(timer.snapshot().remaining_ms, 1000);
        assert_eq!(volume.level(), 2);

        // Expiry restores the captured level exactly
        assert_eq!(timer.on_tick(generation), TickOutcome::Expired);
        assert_eq!(volume.level(), 100);
    }

    #[tokio::test]
    async fn test_ramp_floor_never_reaches_zero() {
        let (mut timer, volume) = timer_with_volume(10);
        timer.start(1, true);
        let generation = timer.generation;

        for _ in 0..59 {
            timer.on_tick(generation);
        }
        // 10 * 1/60 rounds to 0, floored at 1
        assert_eq!(volume.level(), 1);
    }

    #[tokio::test]
    async fn test_sleep_mode_off_leaves_volume_alone() {
        let (mut timer, volume) = timer_with_volume(73);
        timer.start(1, false);
        let generation = timer.generation;

        for _ in 0..59 {
            assert_eq!(timer.on_tick(generation), TickOutcome::Running);
        }
        assert_eq!(volume.level(), 73);
        assert_eq!(timer.on_tick(generation), TickOutcome::Expired);
        assert_eq!(volume.level(), 73);
    }

    #[tokio::test]
    async fn test_new_run_supersedes_and_old_ticks_go_stale() {
        let (mut timer, _volume) = timer_with_volume(100);
        timer.start(30, true);
        let old_generation = timer.generation;
        timer.start(5, false);
        let generation = timer.generation;

        assert_eq!(timer.on_tick(old_generation), TickOutcome::Stale);
        assert_eq!(timer.snapshot().remaining_ms, 300_000);

        assert_eq!(timer.on_tick(generation), TickOutcome::Running);
        assert_eq!(timer.snapshot().remaining_ms, 299_000);
    }

    #[tokio::test]
    async fn test_cancel_restores_volume_and_is_idempotent() {
        let (mut timer, volume) = timer_with_volume(100);
        timer.start(1, true);
        let generation = timer.generation;

        for _ in 0..30 {
            timer.on_tick(generation);
        }
        assert_eq!(volume.level(), 50);

        timer.cancel();
        assert_eq!(volume.level(), 100);
        assert_eq!(timer.snapshot(), TimerSnapshot::default());

        // Already idle: a second cancel and a late tick are no-ops
        timer.cancel();
        assert_eq!(timer.on_tick(generation), TickOutcome::Stale);
    }

    #[tokio::test]
    async fn test_zero_minutes_is_rejected() {
        let (mut timer, _volume) = timer_with_volume(100);
        timer.start(0, true);
        assert_eq!(timer.snapshot(), TimerSnapshot::default());
    }
}
