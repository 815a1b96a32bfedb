// Exactly-once completion notification for a playback attempt
// The audio subsystem may report several terminal events for one session
// (revocation racing end-of-file, an error after EOF); only the first reaches the caller.

use parking_lot::Mutex;

/// Why a playback attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EndReason {
    /// The sound played to the end
    Done = 0,
    /// The playback engine reported an error
    Error = 1,
    /// The output resource was taken away by the arbiter
    Revoked = 2,
}

impl EndReason {
    /// Numeric code used across the C boundary
    pub fn code(self) -> u32 {
        self as u32
    }
}

/// Caller-supplied completion callback
/// Runs on the audio subsystem's context, never on the thread that called `play`.
/// Any opaque caller parameter is captured by the closure.
pub type SoundCallback = Box<dyn FnOnce(EndReason) + Send + 'static>;

/// Holds the pending completion callback until it is delivered
pub struct CompletionSlot {
    pending: Mutex<Option<SoundCallback>>,
}

impl CompletionSlot {
    pub fn new(callback: Option<SoundCallback>) -> Self {
        Self {
            pending: Mutex::new(callback),
        }
    }

    pub fn empty() -> Self {
        Self::new(None)
    }

    /// Deliver `reason` to the pending callback, if any.
    /// Returns true if this call delivered the notification.
    pub fn deliver(&self, reason: EndReason) -> bool {
        // Take under the lock, invoke after it is dropped: the callback may call back
        // into the player (volume changes) without deadlocking on the slot.
        let callback = self.pending.lock().take();
        match callback {
            Some(callback) => {
                log::debug!("Delivering end reason {:?}", reason);
                callback(reason);
                true
            }
            None => {
                log::debug!("End reason {:?} dropped, already delivered", reason);
                false
            }
        }
    }

    /// Drop the pending callback without invoking it
    pub fn clear(&self) {
        self.pending.lock().take();
    }

    pub fn is_pending(&self) -> bool {
        self.pending.lock().is_some()
    }
}

impl Default for CompletionSlot {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn recording_callback(log: Arc<Mutex<Vec<EndReason>>>) -> SoundCallback {
        Box::new(move |reason| log.lock().push(reason))
    }

    #[test]
    fn first_terminal_event_wins() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let slot = CompletionSlot::new(Some(recording_callback(log.clone())));

        assert!(slot.deliver(EndReason::Done));
        assert!(!slot.deliver(EndReason::Error));
        assert!(!slot.deliver(EndReason::Revoked));

        assert_eq!(*log.lock(), vec![EndReason::Done]);
        assert!(!slot.is_pending());
    }

    #[test]
    fn empty_slot_delivers_nothing() {
        let slot = CompletionSlot::empty();
        assert!(!slot.is_pending());
        assert!(!slot.deliver(EndReason::Done));
    }

    #[test]
    fn cleared_callback_is_never_invoked() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let slot = CompletionSlot::new(Some(recording_callback(log.clone())));
        slot.clear();
        assert!(!slot.deliver(EndReason::Error));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn racing_deliveries_invoke_once() {
        for _ in 0..50 {
            let calls = Arc::new(AtomicUsize::new(0));
            let counter = calls.clone();
            let slot = Arc::new(CompletionSlot::new(Some(Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))));

            let handles: Vec<_> = [EndReason::Done, EndReason::Error, EndReason::Revoked]
                .into_iter()
                .map(|reason| {
                    let slot = slot.clone();
                    thread::spawn(move || slot.deliver(reason))
                })
                .collect();

            let delivered = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|delivered| *delivered)
                .count();

            assert_eq!(delivered, 1);
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn reason_codes_are_stable() {
        assert_eq!(EndReason::Done.code(), 0);
        assert_eq!(EndReason::Error.code(), 1);
        assert_eq!(EndReason::Revoked.code(), 2);
    }
}
