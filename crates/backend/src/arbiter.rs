// Output resource arbiter
// One session holds the output at a time. A strictly higher priority request
// takes it over and the previous holder is revoked; anything else queues.

use crate::dispatch::{Event, EventSender};
use chime_audio_api::{Priority, ResourceEvent};
use chime_core::{AudioError, Result};
use parking_lot::Mutex;

pub type SessionId = u64;

struct Request {
    id: SessionId,
    priority: Priority,
    seq: u64,
    events: EventSender,
}

impl Request {
    fn notify(&self, event: ResourceEvent) {
        if self.events.send(Event::Resource(event)).is_err() {
            log::debug!("Session {} gone before {:?}", self.id, event);
        }
    }
}

#[derive(Default)]
struct ArbiterState {
    holder: Option<Request>,
    pending: Vec<Request>,
    next_seq: u64,
}

impl ArbiterState {
    fn knows(&self, id: SessionId) -> bool {
        self.holder.as_ref().is_some_and(|r| r.id == id) || self.pending.iter().any(|r| r.id == id)
    }

    /// Highest priority first, oldest first among equals
    fn take_next_pending(&mut self) -> Option<Request> {
        let index = self
            .pending
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.priority.cmp(&b.priority).then(b.seq.cmp(&a.seq)))
            .map(|(index, _)| index)?;
        Some(self.pending.remove(index))
    }
}

/// Grants the shared output to one session at a time
#[derive(Default)]
pub struct Arbiter {
    state: Mutex<ArbiterState>,
}

impl Arbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a request for the output.
    /// The outcome arrives later as a resource event on `events`.
    pub(crate) fn request(&self, id: SessionId, priority: Priority, events: EventSender) -> Result<()> {
        let mut state = self.state.lock();
        if state.knows(id) {
            return Err(AudioError::InvalidState(format!(
                "session {} already requested the output",
                id
            )));
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        let request = Request {
            id,
            priority,
            seq,
            events,
        };

        let current = state.holder.as_ref().map(|h| (h.id, h.priority));
        match current {
            None => {
                log::debug!("Output granted to session {} ({:?})", id, priority);
                request.notify(ResourceEvent::Granted);
                state.holder = Some(request);
            }
            Some((holder_id, holder_priority)) if priority > holder_priority => {
                log::warn!(
                    "Session {} ({:?}) preempts session {} ({:?})",
                    id,
                    priority,
                    holder_id,
                    holder_priority
                );
                request.notify(ResourceEvent::Granted);
                if let Some(previous) = state.holder.replace(request) {
                    previous.notify(ResourceEvent::Revoked);
                }
            }
            Some((holder_id, holder_priority)) => {
                log::debug!(
                    "Session {} ({:?}) waits behind session {} ({:?})",
                    id,
                    priority,
                    holder_id,
                    holder_priority
                );
                state.pending.push(request);
            }
        }
        Ok(())
    }

    /// Give up the output or withdraw a pending request.
    /// Unknown ids (including revoked holders) are ignored.
    pub fn release(&self, id: SessionId) {
        let mut state = self.state.lock();

        if state.holder.as_ref().is_some_and(|r| r.id == id) {
            state.holder = None;
            log::debug!("Session {} released the output", id);
            if let Some(next) = state.take_next_pending() {
                log::debug!("Output granted to waiting session {} ({:?})", next.id, next.priority);
                next.notify(ResourceEvent::Granted);
                state.holder = Some(next);
            }
            return;
        }

        let before = state.pending.len();
        state.pending.retain(|r| r.id != id);
        if state.pending.len() != before {
            log::debug!("Session {} withdrew its request", id);
        }
    }

    pub fn holder(&self) -> Option<SessionId> {
        self.state.lock().holder.as_ref().map(|r| r.id)
    }

    pub fn is_holder(&self, id: SessionId) -> bool {
        self.holder() == Some(id)
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::{self, Receiver};

    fn sink() -> (EventSender, Receiver<Event>) {
        mpsc::channel()
    }

    fn drain(rx: &Receiver<Event>) -> Vec<Event> {
        rx.try_iter().collect()
    }

    const GRANTED: Event = Event::Resource(ResourceEvent::Granted);
    const REVOKED: Event = Event::Resource(ResourceEvent::Revoked);

    #[test]
    fn free_output_is_granted_immediately() {
        let arbiter = Arbiter::new();
        let (tx, rx) = sink();

        arbiter.request(1, Priority::Low, tx).unwrap();

        assert_eq!(drain(&rx), vec![GRANTED]);
        assert_eq!(arbiter.holder(), Some(1));
    }

    #[test]
    fn higher_priority_revokes_holder() {
        let arbiter = Arbiter::new();
        let (tx1, rx1) = sink();
        let (tx2, rx2) = sink();

        arbiter.request(1, Priority::Normal, tx1).unwrap();
        arbiter.request(2, Priority::High, tx2).unwrap();

        assert_eq!(drain(&rx1), vec![GRANTED, REVOKED]);
        assert_eq!(drain(&rx2), vec![GRANTED]);
        assert_eq!(arbiter.holder(), Some(2));

        // The revoked holder releasing afterwards changes nothing
        arbiter.release(1);
        assert_eq!(arbiter.holder(), Some(2));
    }

    #[test]
    fn equal_priority_waits_for_release() {
        let arbiter = Arbiter::new();
        let (tx1, _rx1) = sink();
        let (tx2, rx2) = sink();

        arbiter.request(1, Priority::High, tx1).unwrap();
        arbiter.request(2, Priority::High, tx2).unwrap();
        assert!(drain(&rx2).is_empty());
        assert_eq!(arbiter.pending_len(), 1);

        arbiter.release(1);
        assert_eq!(drain(&rx2), vec![GRANTED]);
        assert_eq!(arbiter.holder(), Some(2));
        assert_eq!(arbiter.pending_len(), 0);
    }

    #[test]
    fn release_grants_highest_then_oldest() {
        let arbiter = Arbiter::new();
        let (tx0, _rx0) = sink();
        arbiter.request(0, Priority::High, tx0).unwrap();

        let mut receivers = Vec::new();
        for (id, priority) in [(1, Priority::Low), (2, Priority::Normal), (3, Priority::Normal)] {
            let (tx, rx) = sink();
            arbiter.request(id, priority, tx).unwrap();
            receivers.push(rx);
        }

        arbiter.release(0);
        assert_eq!(arbiter.holder(), Some(2));
        arbiter.release(2);
        assert_eq!(arbiter.holder(), Some(3));
        arbiter.release(3);
        assert_eq!(arbiter.holder(), Some(1));
        arbiter.release(1);
        assert_eq!(arbiter.holder(), None);

        for rx in &receivers {
            assert_eq!(drain(rx), vec![GRANTED]);
        }
    }

    #[test]
    fn withdrawn_request_is_never_granted() {
        let arbiter = Arbiter::new();
        let (tx1, _rx1) = sink();
        let (tx2, rx2) = sink();

        arbiter.request(1, Priority::High, tx1).unwrap();
        arbiter.request(2, Priority::Low, tx2).unwrap();
        arbiter.release(2);
        arbiter.release(1);

        assert!(drain(&rx2).is_empty());
        assert_eq!(arbiter.holder(), None);
    }

    #[test]
    fn duplicate_request_is_rejected() {
        let arbiter = Arbiter::new();
        let (tx, _rx) = sink();

        arbiter.request(7, Priority::Normal, tx.clone()).unwrap();
        let err = arbiter.request(7, Priority::High, tx).unwrap_err();
        assert!(matches!(err, AudioError::InvalidState(_)));
    }

    #[test]
    fn dropped_receiver_does_not_block_grants() {
        let arbiter = Arbiter::new();
        let (tx1, rx1) = sink();
        drop(rx1);

        arbiter.request(1, Priority::Normal, tx1).unwrap();
        assert_eq!(arbiter.holder(), Some(1));
    }
}
