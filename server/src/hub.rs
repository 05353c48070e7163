use std::time::Duration;

use plaza_shared::config::Plane;
use plaza_shared::protocol::{ConnectionId, Position};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Interval, MissedTickBehavior};

use crate::broadcast::Dispatcher;
use crate::config::{BroadcastPolicy, ServerConfig};
use crate::ids::IdGenerator;
use crate::registry::SessionRegistry;

/// Commands from client connections to the hub
#[derive(Debug)]
pub enum HubCommand {
    Join {
        response: oneshot::Sender<ConnectionId>,
    },
    Update {
        id: ConnectionId,
        position: Position,
    },
    Leave {
        id: ConnectionId,
    },
}

/// Registry plus id allocation. Owned by the hub task.
pub struct Hub {
    registry: SessionRegistry,
    ids: IdGenerator,
    plane: Plane,
}

impl Hub {
    pub fn new(plane: Plane, rng_seed: Option<u64>) -> Self {
        Self {
            registry: SessionRegistry::new(),
            ids: IdGenerator::new(rng_seed),
            plane,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Register a new connection at the origin.
    pub fn join(&mut self) -> ConnectionId {
        let mut id = self.ids.next_id();
        while self.registry.contains(&id) {
            id = self.ids.next_id();
        }
        self.registry.put(id.clone(), self.plane.origin());
        id
    }

    /// Returns false if `id` is not connected.
    pub fn update(&mut self, id: ConnectionId, position: Position) -> bool {
        if !self.registry.contains(&id) {
            return false;
        }
        self.registry.put(id, position);
        true
    }

    pub fn leave(&mut self, id: &ConnectionId) -> bool {
        self.registry.remove(id)
    }
}

/// Run the hub. Owns the registry; exits when every command sender is gone.
pub async fn run_hub(
    mut cmd_rx: mpsc::Receiver<HubCommand>,
    dispatcher: Dispatcher,
    config: ServerConfig,
) {
    let mut hub = Hub::new(config.plane, config.rng_seed);

    let mut ticker = match config.broadcast {
        BroadcastPolicy::Immediate => None,
        BroadcastPolicy::Tick { hz } => {
            let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / hz as f64));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            Some(interval)
        }
    };
    let immediate = ticker.is_none();
    let mut dirty = false;

    loop {
        tokio::select! {
            _ = next_tick(&mut ticker) => {
                if dirty {
                    dispatcher.broadcast(hub.registry().snapshot());
                    dirty = false;
                }
            }

            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break };
                let changed = match cmd {
                    HubCommand::Join { response } => {
                        let id = hub.join();
                        if let Err(id) = response.send(id) {
                            // Connection went away before it learned its id.
                            hub.leave(&id);
                        }
                        false
                    }
                    HubCommand::Update { id, position } => {
                        let accepted = hub.update(id.clone(), position);
                        if !accepted {
                            tracing::debug!("Dropping update for unknown player {}", id);
                        }
                        accepted
                    }
                    HubCommand::Leave { id } => {
                        let removed = hub.leave(&id);
                        if removed {
                            let remaining = hub.registry().len();
                            tracing::info!("Player {} left, {} remaining", id, remaining);
                        }
                        removed
                    }
                };

                if changed {
                    if immediate {
                        dispatcher.broadcast(hub.registry().snapshot());
                    } else {
                        dirty = true;
                    }
                }
            }
        }
    }

    tracing::info!("Hub stopped");
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
