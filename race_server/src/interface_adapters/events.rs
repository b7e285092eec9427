// Event fan-out: every race event is encoded once and shared as bytes.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{error, warn};

use crate::domain::RaceEvent;
use crate::interface_adapters::protocol::ServerMessage;
use crate::use_cases::SessionHandle;

/// Encoded output of one session's event stream.
#[derive(Clone)]
pub struct EventFeed {
    /// Broadcast sender for serialized events.
    pub bytes_tx: broadcast::Sender<Arc<str>>,
    /// Latest serialized snapshot, for late joiners and lagged readers.
    pub latest_snapshot_tx: watch::Sender<Arc<str>>,
}

pub async fn event_serializer(
    mut events_rx: broadcast::Receiver<RaceEvent>,
    bytes_tx: broadcast::Sender<Arc<str>>,
    latest_snapshot_tx: watch::Sender<Arc<str>>,
) {
    loop {
        match events_rx.recv().await {
            Ok(event) => {
                let is_snapshot = matches!(event, RaceEvent::Snapshot(_));
                let txt = match serde_json::to_string(&ServerMessage::Event(event)) {
                    Ok(txt) => txt,
                    Err(e) => {
                        error!(error = ?e, "failed to serialize race event");
                        continue;
                    }
                };
                let bytes: Arc<str> = Arc::from(txt);
                if is_snapshot {
                    let _ = latest_snapshot_tx.send(bytes.clone());
                }
                let _ = bytes_tx.send(bytes);
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(missed = n, "event serializer lagged; skipping to latest event");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Spawns the serializer for a session and returns the channels it feeds.
pub fn spawn_session_serializer(handle: &SessionHandle, capacity: usize) -> EventFeed {
    let (bytes_tx, _bytes_rx) = broadcast::channel::<Arc<str>>(capacity);
    let (latest_snapshot_tx, _latest_rx) = watch::channel::<Arc<str>>(Arc::from(""));
    tokio::spawn(event_serializer(
        handle.subscribe(),
        bytes_tx.clone(),
        latest_snapshot_tx.clone(),
    ));
    EventFeed {
        bytes_tx,
        latest_snapshot_tx,
    }
}
