use axum::extract::ws::Utf8Bytes;
use plaza_shared::protocol::{Players, ServerMsg};
use tokio::sync::broadcast;

/// Snapshots buffered per connection before a slow reader starts skipping.
pub const FANOUT_CAPACITY: usize = 64;

/// Fans serialized snapshots out to every open connection.
///
/// Each snapshot is encoded once; connections receive a cheap clone of the
/// same frame. A connection that closed has dropped its receiver and is
/// skipped by the channel itself.
#[derive(Clone)]
pub struct Dispatcher {
    tx: broadcast::Sender<Utf8Bytes>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(FANOUT_CAPACITY)
    }
}

impl Dispatcher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Utf8Bytes> {
        self.tx.subscribe()
    }

    /// Number of connections currently listening.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Send `{type:"update", players}` to everyone. Returns how many
    /// connections the frame was queued for.
    pub fn broadcast(&self, players: Players) -> usize {
        let json = match serde_json::to_string(&ServerMsg::Update { players }) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to encode snapshot: {}", e);
                return 0;
            }
        };
        // Err only means nobody is connected.
        self.tx.send(Utf8Bytes::from(json)).unwrap_or(0)
    }
}
