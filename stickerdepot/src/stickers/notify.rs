//! Debounced change notifications.
//!
//! Each topic has a leading/trailing debouncer: the first request in a quiet
//! period is delivered at once and opens a window; any further requests
//! inside the window collapse into one delivery when it closes. A burst of
//! N requests therefore yields at most two deliveries, and the first and
//! last edges are never lost.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 64;

/// What changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeEvent {
    /// A pack was saved, installed or uninstalled.
    PacksChanged,
    /// Installed stickers changed, or any pack change.
    StickersOrPacksChanged,
    /// The recent-stickers list changed.
    RecentStickersChanged,
}

#[derive(Debug, Default)]
struct WindowState {
    open: bool,
    pending: bool,
}

struct Debouncer {
    window: Duration,
    state: Mutex<WindowState>,
    fire: Box<dyn Fn() + Send + Sync>,
}

impl Debouncer {
    fn new(window: Duration, fire: impl Fn() + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            window,
            state: Mutex::new(WindowState::default()),
            fire: Box::new(fire),
        })
    }

    fn request(self: &Arc<Self>) {
        if self.window.is_zero() {
            (self.fire)();
            return;
        }
        // Without a runtime there is no timer to close the window.
        let Ok(handle) = Handle::try_current() else {
            (self.fire)();
            return;
        };

        {
            let mut state = self.state.lock();
            if state.open {
                state.pending = true;
                return;
            }
            state.open = true;
        }

        (self.fire)();
        handle.spawn(Arc::clone(self).close_window());
    }

    async fn close_window(self: Arc<Self>) {
        loop {
            sleep(self.window).await;
            {
                let mut state = self.state.lock();
                if !state.pending {
                    state.open = false;
                    return;
                }
                state.pending = false;
            }
            (self.fire)();
        }
    }
}

/// Publishes [`ChangeEvent`]s to subscribers.
pub struct ChangeNotifier {
    sender: broadcast::Sender<ChangeEvent>,
    packs: Arc<Debouncer>,
    stickers: Arc<Debouncer>,
    window: Duration,
}

impl ChangeNotifier {
    /// Creates a notifier whose debounce windows last `window`. A zero
    /// window delivers every request.
    pub fn new(window: Duration) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);

        let tx = sender.clone();
        let packs = Debouncer::new(window, move || {
            let _ = tx.send(ChangeEvent::PacksChanged);
            let _ = tx.send(ChangeEvent::StickersOrPacksChanged);
        });
        let tx = sender.clone();
        let stickers = Debouncer::new(window, move || {
            let _ = tx.send(ChangeEvent::StickersOrPacksChanged);
        });

        Self {
            sender,
            packs,
            stickers,
            window,
        }
    }

    /// Requests a debounced [`ChangeEvent::PacksChanged`], delivered together
    /// with [`ChangeEvent::StickersOrPacksChanged`].
    pub fn packs_changed(&self) {
        self.packs.request();
    }

    /// Requests a debounced [`ChangeEvent::StickersOrPacksChanged`].
    pub fn stickers_changed(&self) {
        self.stickers.request();
    }

    /// Delivers [`ChangeEvent::RecentStickersChanged`] immediately.
    pub fn recent_stickers_changed(&self) {
        let _ = self.sender.send(ChangeEvent::RecentStickersChanged);
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

/// A live subscription. Dropping it unsubscribes.
pub struct Subscription {
    receiver: broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    /// Waits for the next event. Returns `None` once the notifier is gone.
    ///
    /// A subscriber that falls behind skips the events it missed.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Change subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns an already delivered event without waiting.
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Drains every event delivered so far.
    pub fn drain(&mut self) -> Vec<ChangeEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    pub fn unsubscribe(self) {}
}
