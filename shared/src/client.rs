//! Protocol-facing half of a client.
//!
//! [`ClientSync`] owns everything a renderer needs to stay in step with the
//! server: its own id, the set of remote players, the locally controlled
//! position and the frame-gated send cadence. It never draws anything; the
//! renderer applies the [`ProxyChange`]s it returns and sends the
//! [`ClientMsg`]s it produces.

use std::time::{Duration, Instant};

use crate::config::ClientConfig;
use crate::protocol::{ClientMsg, ConnectionId, Players, Position, ServerMsg};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// What the renderer must do to its visual proxies after a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyChange {
    Spawn { id: ConnectionId, position: Position },
    Move { id: ConnectionId, position: Position },
    Despawn { id: ConnectionId },
}

/// Fires at most once per fixed frame duration.
#[derive(Debug, Clone)]
pub struct FrameGate {
    frame: Duration,
    last: Option<Instant>,
}

impl FrameGate {
    pub fn new(frame: Duration) -> Self {
        Self { frame, last: None }
    }

    /// Returns true and starts a new frame if at least one frame duration has
    /// passed since the previous one. The first call always fires.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.frame => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

pub struct ClientSync {
    config: ClientConfig,
    self_id: Option<ConnectionId>,
    remote: Players,
    position: Position,
    /// (x, depth) per frame
    velocity: (f64, f64),
    gate: FrameGate,
}

impl ClientSync {
    /// Fails if `config` does not pass [`ClientConfig::validate`].
    pub fn new(config: ClientConfig) -> Result<Self, String> {
        config.validate()?;
        Ok(Self {
            position: config.plane.origin(),
            gate: FrameGate::new(config.frame_duration()),
            config,
            self_id: None,
            remote: Players::new(),
            velocity: (0.0, 0.0),
        })
    }

    pub fn self_id(&self) -> Option<&ConnectionId> {
        self.self_id.as_ref()
    }

    /// Remote players currently tracked. Never contains our own id.
    pub fn remote_players(&self) -> &Players {
        &self.remote
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn velocity(&self) -> (f64, f64) {
        self.velocity
    }

    /// Apply a server message and return the proxy changes it implies.
    pub fn handle_message(&mut self, msg: ServerMsg) -> Vec<ProxyChange> {
        match msg {
            ServerMsg::Init { id } => {
                let mut changes = Vec::new();
                if self.remote.remove(&id).is_some() {
                    changes.push(ProxyChange::Despawn { id: id.clone() });
                }
                self.self_id = Some(id);
                changes
            }
            ServerMsg::Update { players } => self.reconcile(players),
        }
    }

    /// Replace the remote view wholesale with `players`.
    fn reconcile(&mut self, mut players: Players) -> Vec<ProxyChange> {
        if let Some(me) = &self.self_id {
            players.remove(me);
        }

        let mut changes = Vec::new();
        for id in self.remote.keys() {
            if !players.contains_key(id) {
                changes.push(ProxyChange::Despawn { id: id.clone() });
            }
        }
        for (id, position) in &players {
            let change = if self.remote.contains_key(id) {
                ProxyChange::Move {
                    id: id.clone(),
                    position: *position,
                }
            } else {
                ProxyChange::Spawn {
                    id: id.clone(),
                    position: *position,
                }
            };
            changes.push(change);
        }

        self.remote = players;
        changes
    }

    pub fn key_down(&mut self, direction: Direction) {
        let speed = self.config.speed;
        match direction {
            Direction::Up => self.velocity.1 = -speed,
            Direction::Down => self.velocity.1 = speed,
            Direction::Left => self.velocity.0 = -speed,
            Direction::Right => self.velocity.0 = speed,
        }
    }

    /// Releasing either key of an axis stops motion along that axis.
    pub fn key_up(&mut self, direction: Direction) {
        match direction {
            Direction::Up | Direction::Down => self.velocity.1 = 0.0,
            Direction::Left | Direction::Right => self.velocity.0 = 0.0,
        }
    }

    pub fn set_velocity(&mut self, vx: f64, vdepth: f64) {
        self.velocity = (vx, vdepth);
    }

    /// Advance one rendered frame.
    ///
    /// Does nothing until a full frame duration has elapsed. When a frame is
    /// due, integrates velocity into the local position, clamps it to the
    /// playable bounds and, once an id has been assigned, returns the update
    /// to send.
    pub fn frame(&mut self, now: Instant) -> Option<ClientMsg> {
        if !self.gate.ready(now) {
            return None;
        }

        let x = self.position.x() + self.velocity.0;
        let depth = self.position.depth() + self.velocity.1;
        let (x, depth) = self.config.bounds.clamp(x, depth);
        self.position = self.position.moved_to(x, depth);

        let id = self.self_id.clone()?;
        Some(ClientMsg::Update {
            id: Some(id),
            position: self.position,
        })
    }
}
