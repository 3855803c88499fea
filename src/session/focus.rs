// Audio focus arbitration - playback yields to other audio sources
// The platform adapter decides whether we get the output; loss and regain
// notifications arrive asynchronously on the session event channel.

use super::SessionEvent;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusResponse {
    Granted,
    Denied,
}

/// Focus changes pushed by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusEvent {
    /// Another source took the output for good. Pause, don't auto-resume.
    PermanentLoss,
    /// A brief interruption. Pause, and remember whether we were playing.
    TransientLoss,
    /// The interruption is over; resume only if we were playing before it.
    Regained,
}

/// Port to the platform's focus arbitration.
///
/// At most one request may be outstanding; the manager requests exactly once
/// per play transition and releases on stop/teardown.
pub trait FocusArbiter: Send {
    fn request(&mut self) -> FocusResponse;
    fn release(&mut self);
}

/// Desktop adapter for hosts without focus arbitration: the request is
/// always granted and no loss events are ever delivered.
#[derive(Debug, Default)]
pub struct SoloFocus {
    held: bool,
}

impl SoloFocus {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FocusArbiter for SoloFocus {
    fn request(&mut self) -> FocusResponse {
        if !self.held {
            debug!("Audio focus granted (uncontended host)");
            self.held = true;
        }
        FocusResponse::Granted
    }

    fn release(&mut self) {
        if self.held {
            debug!("Audio focus released");
            self.held = false;
        }
    }
}

/// Test adapter: focus grants are scripted and loss/regain sequences are
/// injected through the probe, so arbitration is deterministically
/// reproducible.
pub struct ScriptedFocus {
    deny: Arc<AtomicBool>,
    requests: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
}

#[derive(Clone)]
pub struct FocusProbe {
    events: mpsc::UnboundedSender<SessionEvent>,
    deny: Arc<AtomicBool>,
    requests: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
}

impl ScriptedFocus {
    pub fn new(events: mpsc::UnboundedSender<SessionEvent>) -> (Self, FocusProbe) {
        let deny = Arc::new(AtomicBool::new(false));
        let requests = Arc::new(AtomicUsize::new(0));
        let releases = Arc::new(AtomicUsize::new(0));
        let probe = FocusProbe {
            events,
            deny: deny.clone(),
            requests: requests.clone(),
            releases: releases.clone(),
        };
        (
            Self {
                deny,
                requests,
                releases,
            },
            probe,
        )
    }
}

impl FocusArbiter for ScriptedFocus {
    fn request(&mut self) -> FocusResponse {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.deny.load(Ordering::SeqCst) {
            FocusResponse::Denied
        } else {
            FocusResponse::Granted
        }
    }

    fn release(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

impl FocusProbe {
    /// Deliver a focus change as if the platform pushed it.
    pub fn emit(&self, event: FocusEvent) {
        let _ = self.events.send(SessionEvent::Focus(event));
    }

    pub fn deny_requests(&self, deny: bool) {
        self.deny.store(deny, Ordering::SeqCst);
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}
