use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::Phase;

const DEFAULT_CAPACITY: usize = 256;

/// Notification pushed to observers on every notable tracker transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackerEvent {
    RunStarted {
        run_id: Uuid,
    },
    PhaseStarted {
        run_id: Uuid,
        phase: Phase,
    },
    PhaseProgress {
        run_id: Uuid,
        phase: Phase,
        percent: u8,
    },
    PhaseCompleted {
        run_id: Uuid,
        phase: Phase,
    },
    RunCompleted {
        run_id: Uuid,
    },
    RunFailed {
        run_id: Uuid,
        phase: Option<Phase>,
        message: String,
    },
}

/// Synchronous observer, called in registration order on the tracker's thread.
pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: &TrackerEvent);
}

/// Fan-out to registered observers and to any broadcast subscribers.
pub(crate) struct Notifier {
    observers: Vec<Arc<dyn ProgressObserver>>,
    sender: broadcast::Sender<TrackerEvent>,
}

impl Notifier {
    pub(crate) fn new() -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_CAPACITY);
        Self {
            observers: Vec::new(),
            sender,
        }
    }

    pub(crate) fn register(&mut self, observer: Arc<dyn ProgressObserver>) {
        self.observers.push(observer);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.sender.subscribe()
    }

    pub(crate) fn emit(&self, event: TrackerEvent) {
        for observer in &self.observers {
            observer.on_event(&event);
        }
        // No subscribers is fine; the event is simply dropped.
        let _ = self.sender.send(event);
    }
}
