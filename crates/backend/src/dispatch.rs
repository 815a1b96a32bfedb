// Per-session event thread
// Every notification for a session is queued here and delivered from one
// thread, so the resource and playback callbacks never run concurrently and
// never run on the thread that drives the session.

use chime_audio_api::{PlaybackEvent, PlaybackNotify, ResourceEvent, ResourceNotify};
use chime_core::{AudioError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Event {
    Resource(ResourceEvent),
    Playback(PlaybackEvent),
    Shutdown,
}

pub(crate) type EventSender = Sender<Event>;

#[derive(Default)]
struct Handlers {
    resource: Option<ResourceNotify>,
    playback: Option<PlaybackNotify>,
}

pub(crate) struct Dispatcher {
    tx: EventSender,
    handlers: Arc<Mutex<Handlers>>,
    revoked: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn spawn(name: String) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let handlers = Arc::new(Mutex::new(Handlers::default()));
        let revoked = Arc::new(AtomicBool::new(false));

        let thread = {
            let handlers = handlers.clone();
            let revoked = revoked.clone();
            thread::Builder::new()
                .name(name)
                .spawn(move || run(rx, handlers, revoked))
                .map_err(|e| AudioError::ThreadError(format!("Failed to spawn event thread: {}", e)))?
        };

        Ok(Self {
            tx,
            handlers,
            revoked,
            thread: Some(thread),
        })
    }

    pub fn sender(&self) -> EventSender {
        self.tx.clone()
    }

    /// Set once the arbiter has taken the output away from this session
    pub fn revoked_flag(&self) -> Arc<AtomicBool> {
        self.revoked.clone()
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::Acquire)
    }

    pub fn set_resource_handler(&self, notify: Option<ResourceNotify>) {
        self.handlers.lock().resource = notify;
    }

    pub fn set_playback_handler(&self, notify: Option<PlaybackNotify>) {
        self.handlers.lock().playback = notify;
    }

    /// Stop the event thread after it drains what is already queued
    pub fn shutdown(mut self) {
        self.stop_thread();
    }

    fn stop_thread(&mut self) {
        let Some(handle) = self.thread.take() else {
            return;
        };
        let _ = self.tx.send(Event::Shutdown);
        if handle.thread().id() == thread::current().id() {
            // Torn down from inside one of our own callbacks
            log::debug!("Event thread detached during its own callback");
            return;
        }
        if handle.join().is_err() {
            log::error!("Event thread panicked");
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop_thread();
    }
}

fn run(rx: Receiver<Event>, handlers: Arc<Mutex<Handlers>>, revoked: Arc<AtomicBool>) {
    for event in rx {
        match event {
            Event::Shutdown => break,
            Event::Resource(event) => {
                if event == ResourceEvent::Revoked {
                    revoked.store(true, Ordering::Release);
                }
                // Clone out of the lock; the handler may swap handlers
                let notify = handlers.lock().resource.clone();
                match notify {
                    Some(notify) => notify(event),
                    None => log::debug!("Resource event {:?} with no handler", event),
                }
            }
            Event::Playback(event) => {
                let notify = handlers.lock().playback.clone();
                match notify {
                    Some(notify) => notify(event),
                    None => log::debug!("Playback event {:?} with no handler", event),
                }
            }
        }
    }
    log::trace!("Event thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn spawn() -> Dispatcher {
        Dispatcher::spawn("chime-test-events".to_string()).unwrap()
    }

    #[test]
    fn delivers_in_order_on_its_own_thread() {
        let dispatcher = spawn();
        let (tx, rx) = mpsc::channel();
        let caller = thread::current().id();

        let resource_tx = tx.clone();
        dispatcher.set_resource_handler(Some(Arc::new(move |event| {
            assert_ne!(thread::current().id(), caller);
            let _ = resource_tx.send(format!("{:?}", event));
        })));
        dispatcher.set_playback_handler(Some(Arc::new(move |event| {
            let _ = tx.send(format!("{:?}", event));
        })));

        let events = dispatcher.sender();
        events.send(Event::Resource(ResourceEvent::Granted)).unwrap();
        events.send(Event::Playback(PlaybackEvent::FirstFrame)).unwrap();
        events.send(Event::Playback(PlaybackEvent::Eof)).unwrap();

        let seen: Vec<String> = (0..3)
            .map(|_| rx.recv_timeout(Duration::from_secs(1)).unwrap())
            .collect();
        assert_eq!(seen, vec!["Granted", "FirstFrame", "Eof"]);

        dispatcher.shutdown();
    }

    #[test]
    fn revocation_sets_flag_without_handler() {
        let dispatcher = spawn();
        let flag = dispatcher.revoked_flag();
        assert!(!dispatcher.is_revoked());

        dispatcher
            .sender()
            .send(Event::Resource(ResourceEvent::Revoked))
            .unwrap();
        dispatcher.shutdown();

        assert!(flag.load(Ordering::Acquire));
    }

    #[test]
    fn cleared_handler_receives_nothing() {
        let dispatcher = spawn();
        let (tx, rx) = mpsc::channel::<PlaybackEvent>();
        dispatcher.set_playback_handler(Some(Arc::new(move |event| {
            let _ = tx.send(event);
        })));
        dispatcher.set_playback_handler(None);

        dispatcher
            .sender()
            .send(Event::Playback(PlaybackEvent::Eof))
            .unwrap();
        dispatcher.shutdown();

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn shutdown_from_own_callback_does_not_deadlock() {
        let dispatcher = Arc::new(Mutex::new(Some(spawn())));
        let (done_tx, done_rx) = mpsc::channel();

        let slot = dispatcher.clone();
        let guard = dispatcher.lock();
        let Some(inner) = guard.as_ref() else {
            unreachable!()
        };
        inner.set_playback_handler(Some(Arc::new(move |_| {
            if let Some(own) = slot.lock().take() {
                own.shutdown();
            }
            let _ = done_tx.send(());
        })));
        inner.sender().send(Event::Playback(PlaybackEvent::Eof)).unwrap();
        drop(guard);

        done_rx.recv_timeout(Duration::from_secs(1)).unwrap();
    }
}
