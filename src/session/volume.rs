// The host's output volume, modeled as an injected capability.
// Only the sleep timer writes through this during an active run, and it
// alone restores the pre-timer level.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Get/set port for the shared output level, 0..=100.
pub trait VolumeControl: Send {
    fn level(&self) -> u32;
    fn set_level(&mut self, level: u32);
}

/// Process-wide software volume. Clones share one level, so the audio
/// output can apply it while the timer ramps it and tests observe it.
#[derive(Debug, Clone)]
pub struct SoftwareVolume {
    level: Arc<AtomicU32>,
}

impl SoftwareVolume {
    pub fn new(level: u32) -> Self {
        Self {
            level: Arc::new(AtomicU32::new(level.min(100))),
        }
    }

    /// Raw shared handle for an output adapter to poll.
    pub fn shared(&self) -> Arc<AtomicU32> {
        self.level.clone()
    }
}

impl VolumeControl for SoftwareVolume {
    fn level(&self) -> u32 {
        self.level.load(Ordering::Relaxed)
    }

    fn set_level(&mut self, level: u32) {
        self.level.store(level.min(100), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_level() {
        let mut a = SoftwareVolume::new(80);
        let b = a.clone();
        a.set_level(35);
        assert_eq!(b.level(), 35);
    }

    #[test]
    fn test_level_is_capped_at_100() {
        let mut v = SoftwareVolume::new(250);
        assert_eq!(v.level(), 100);
        v.set_level(180);
        assert_eq!(v.level(), 100);
    }
}
