//! Broadcast bus carrying [`UiEvent`]s from a conversation to renderers.

use super::UiEvent;
use tokio::sync::broadcast;

/// Sender half of the event bus.
#[derive(Clone)]
pub struct EventSender {
    tx: broadcast::Sender<UiEvent>,
}

impl EventSender {
    /// Publish an event.
    pub fn send(&self, event: UiEvent) -> Result<(), BusError> {
        self.tx.send(event).map_err(|_| BusError::Closed)?;
        Ok(())
    }

    /// Publish, ignoring the absence of subscribers.
    pub fn emit(&self, event: UiEvent) {
        let _ = self.send(event);
    }

    pub fn info(&self, text: impl Into<String>) {
        self.emit(UiEvent::info(text));
    }

    pub fn warning(&self, text: impl Into<String>) {
        self.emit(UiEvent::warning(text));
    }

    pub fn error(&self, text: impl Into<String>) {
        self.emit(UiEvent::error(text));
    }
}

/// Receiver half of the event bus.
pub struct EventReceiver {
    rx: broadcast::Receiver<UiEvent>,
}

impl EventReceiver {
    /// Receive the next event.
    pub async fn recv(&mut self) -> Result<UiEvent, BusError> {
        self.rx.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => BusError::Closed,
            broadcast::error::RecvError::Lagged(n) => BusError::Lagged(n),
        })
    }

    /// Try to receive an event without waiting.
    pub fn try_recv(&mut self) -> Result<Option<UiEvent>, BusError> {
        match self.rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Closed) => Err(BusError::Closed),
            Err(broadcast::error::TryRecvError::Lagged(n)) => Err(BusError::Lagged(n)),
        }
    }

    /// Drain everything currently queued.
    pub fn drain(&mut self) -> Vec<UiEvent> {
        let mut events = Vec::new();
        loop {
            match self.try_recv() {
                Ok(Some(event)) => events.push(event),
                Ok(None) | Err(BusError::Closed) => break,
                Err(BusError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event receiver lagged");
                }
            }
        }
        events
    }
}

/// Event bus between a conversation and its renderers.
pub struct EventBus {
    tx: broadcast::Sender<UiEvent>,
}

impl EventBus {
    /// Streams can emit hundreds of deltas per second; keep a deep buffer.
    const CAPACITY: usize = 1024;

    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(Self::CAPACITY);
        Self { tx }
    }

    pub fn sender(&self) -> EventSender {
        EventSender {
            tx: self.tx.clone(),
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Bus errors.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Channel closed")]
    Closed,
    #[error("Lagged behind by {0} events")]
    Lagged(u64),
}
