//! # PHY Listeners
//!
//! MAC-layer components (channel-access managers, NAV trackers, coexistence
//! managers) observe the PHY through the [`PhyListener`] trait. The state
//! machine never owns a listener: it keeps a weak handle per registration, so a
//! listener that is dropped before the PHY simply stops being notified.
//!
//! ## Usage
//!
//! ```rust
//! use std::rc::Rc;
//! use wifi_phy_cca::phy::listener::{ListenerRegistry, PhyListener};
//!
//! struct Nav;
//! impl PhyListener for Nav {}
//!
//! let mut registry = ListenerRegistry::default();
//! let nav = Rc::new(Nav);
//! let id = registry.register(&nav);
//! assert_eq!(registry.len(), 1);
//! assert!(registry.unregister(id));
//! ```

use std::rc::{Rc, Weak};
use std::time::Duration;

/// Callbacks emitted on PHY state transitions.
///
/// Every method has an empty default body so implementors only override the
/// events they care about. Methods take `&self`; listeners that keep state use
/// interior mutability.
pub trait PhyListener {
    /// A transmission of `duration` at `power_dbm` starts now.
    fn notify_tx_start(&self, _duration: Duration, _power_dbm: f64) {}

    /// A reception of `duration` starts now.
    fn notify_rx_start(&self, _duration: Duration) {}

    /// The ongoing reception ended successfully.
    fn notify_rx_end_ok(&self) {}

    /// The ongoing reception ended with an error.
    fn notify_rx_end_error(&self) {}

    /// The primary channel may be busy for `duration`.
    fn notify_maybe_cca_busy_start(&self, _duration: Duration) {}

    /// A channel switch taking `duration` starts now.
    fn notify_switching_start(&self, _duration: Duration) {}

    fn notify_sleep(&self) {}

    fn notify_off(&self) {}

    fn notify_wakeup(&self) {}

    fn notify_on(&self) {}
}

/// Handle returned by [`ListenerRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Weak-handle registry of listeners, notified in registration order.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: u64,
    entries: Vec<(ListenerId, Weak<dyn PhyListener>)>,
}

impl ListenerRegistry {
    /// Register a listener. The registry keeps only a weak reference.
    pub fn register<L: PhyListener + 'static>(&mut self, listener: &Rc<L>) -> ListenerId {
        let shared: Rc<dyn PhyListener> = listener.clone();
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, Rc::downgrade(&shared)));
        id
    }

    /// Remove a registration. Returns false if the id was unknown.
    pub fn unregister(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    /// Number of registrations whose listener is still alive.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, listener)| listener.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke `event` on every live listener and forget the dead ones.
    pub fn notify(&mut self, mut event: impl FnMut(&dyn PhyListener)) {
        self.entries.retain(|(id, weak)| match weak.upgrade() {
            Some(listener) => {
                event(listener.as_ref());
                true
            }
            None => {
                log::debug!("dropping listener {id:?}: no longer alive");
                false
            }
        });
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("registered", &self.entries.len())
            .field("alive", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Default)]
    struct Counter {
        rx_starts: Cell<u32>,
    }

    impl PhyListener for Counter {
        fn notify_rx_start(&self, _duration: Duration) {
            self.rx_starts.set(self.rx_starts.get() + 1);
        }
    }

    #[test]
    fn test_notify_reaches_all_listeners() {
        let mut registry = ListenerRegistry::default();
        let a = Rc::new(Counter::default());
        let b = Rc::new(Counter::default());
        registry.register(&a);
        registry.register(&b);

        registry.notify(|l| l.notify_rx_start(Duration::from_micros(100)));

        assert_eq!(a.rx_starts.get(), 1);
        assert_eq!(b.rx_starts.get(), 1);
    }

    #[test]
    fn test_unregister_stops_notifications() {
        let mut registry = ListenerRegistry::default();
        let a = Rc::new(Counter::default());
        let id = registry.register(&a);
        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));

        registry.notify(|l| l.notify_rx_start(Duration::ZERO));
        assert_eq!(a.rx_starts.get(), 0);
    }

    #[test]
    fn test_dropped_listener_is_pruned() {
        let mut registry = ListenerRegistry::default();
        let a = Rc::new(Counter::default());
        registry.register(&a);
        drop(a);
        assert!(registry.is_empty());

        registry.notify(|l| l.notify_rx_end_ok());
        assert_eq!(registry.entries.len(), 0);
    }
}
