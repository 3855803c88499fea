// Session state store - cache-then-push snapshots over a watch channel
// A new subscriber immediately sees the latest snapshot, then every change
// after it. Publications are totally ordered and a slow observer can never
// block the publisher; it just skips ahead to the newest value.

use super::SessionState;
use tokio::sync::watch;

pub struct StateStore {
    tx: watch::Sender<SessionState>,
}

impl StateStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::default());
        Self { tx }
    }

    /// Replace the current state with a full copy. Whole-snapshot swaps only;
    /// there is no field-level mutation through the store.
    pub fn publish(&self, state: SessionState) {
        self.tx.send_replace(state);
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> SessionState {
        self.tx.borrow().clone()
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::PlaybackSnapshot;

    fn state_with_title(title: &str) -> SessionState {
        SessionState {
            playback: PlaybackSnapshot {
                title: title.to_string(),
                content_id: 1,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_new_subscriber_sees_current_snapshot_immediately() {
        let store = StateStore::new();
        store.publish(state_with_title("The Bear's Dream"));

        // No waiting: the cached value is already there
        let rx = store.subscribe();
        assert_eq!(rx.borrow().playback.title, "The Bear's Dream");
    }

    #[tokio::test]
    async fn test_publications_arrive_in_order() {
        let store = StateStore::new();
        let mut rx = store.subscribe();

        store.publish(state_with_title("one"));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().playback.title, "one");

        store.publish(state_with_title("two"));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().playback.title, "two");
    }

    #[tokio::test]
    async fn test_publishing_without_subscribers_still_caches() {
        let store = StateStore::new();
        store.publish(state_with_title("unheard"));
        assert_eq!(store.current().playback.title, "unheard");
    }

    #[tokio::test]
    async fn test_multiple_subscribers_see_the_same_sequence() {
        let store = StateStore::new();
        let mut a = store.subscribe();
        let mut b = store.subscribe();

        store.publish(state_with_title("same"));
        a.changed().await.unwrap();
        b.changed().await.unwrap();
        assert_eq!(a.borrow().clone(), b.borrow().clone());
    }
}
