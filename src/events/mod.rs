use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

/// Domain events emitted after a transition commits. Delivery is in-process
/// and best-effort; the write that produced the event has already committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    StageAdvanced {
        order_id: Uuid,
        from: String,
        to: String,
    },
    StageCancelled {
        order_id: Uuid,
        from: String,
        to: String,
    },
    OrderSplit {
        source_id: Uuid,
        child_id: Uuid,
        quantity: i32,
    },
    OrdersMerged {
        survivor_id: Uuid,
        absorbed_id: Uuid,
        quantity: i32,
    },
    RollCompleted {
        parent_id: Uuid,
        child_id: Uuid,
        roll_no: i32,
    },
    WeavingOrderClosed(Uuid),
    MachineAcquired {
        order_id: Uuid,
        machine_no: String,
    },
    MachineReleased {
        order_id: Uuid,
        machine_no: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Drains the event channel, logging each event. Runs for the lifetime of the
/// process.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        info!(?event, "domain event");
    }
}
