//! Client events
//!
//! Observable notifications published by a client. Nothing is required to
//! listen; events published with no subscriber are dropped.

use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

/// Direction of a file transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferAction {
    Get,
    Put,
}

/// Progress snapshot of a running transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferProgress {
    pub filename: String,
    pub action: TransferAction,
    /// Expected size in bytes, 0 when unknown.
    pub total_bytes: u64,
    pub transferred_bytes: u64,
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A command line was written to the control connection.
    CommandSent(String),
    /// A raw line was received on the control connection.
    DataLineReceived(String),
    /// The control connection failed or was closed by the server.
    TransportError(String),
    TransferProgress(TransferProgress),
}

/// Fan-out publisher shared by a client and its connection task.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: ClientEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
