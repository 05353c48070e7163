use std::collections::HashMap;

use plaza_shared::protocol::{ConnectionId, Players, Position};

/// Last known position of every open connection.
///
/// Owned by the hub task; nothing else mutates it.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    players: HashMap<ConnectionId, Position>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or fully replace the position for `id`.
    pub fn put(&mut self, id: ConnectionId, position: Position) {
        self.players.insert(id, position);
    }

    /// Returns true if `id` was present.
    pub fn remove(&mut self, id: &ConnectionId) -> bool {
        self.players.remove(id).is_some()
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.players.contains_key(id)
    }

    pub fn get(&self, id: &ConnectionId) -> Option<Position> {
        self.players.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Owned copy of the whole registry, ordered by id.
    pub fn snapshot(&self) -> Players {
        self.players
            .iter()
            .map(|(id, pos)| (id.clone(), *pos))
            .collect()
    }
}
