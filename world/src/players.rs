//! Fixed-size player table.

use glam::Vec3;
use unlagged_core::{ActorId, HistoryDepth, PlayerHistory, PlayerId, MAX_PLAYERS};

/// Live record of a connected player.
#[derive(Clone, Debug)]
pub(crate) struct Player {
    pub(crate) latency_ms: u32,
    pub(crate) spectating: bool,
    pub(crate) unlagged: bool,
    pub(crate) actor: Option<ActorId>,
    pub(crate) history: PlayerHistory,
}

impl Player {
    fn new(latency_ms: u32, unlagged: bool, depth: HistoryDepth) -> Self {
        Self {
            latency_ms,
            spectating: false,
            unlagged,
            actor: None,
            history: PlayerHistory::new(depth, Vec3::ZERO),
        }
    }
}

/// Player slots; a slot holds a record only while its player is connected.
#[derive(Debug)]
pub(crate) struct PlayerTable {
    depth: HistoryDepth,
    slots: Vec<Option<Player>>,
}

impl PlayerTable {
    pub(crate) fn new(depth: HistoryDepth) -> Self {
        let mut slots = Vec::with_capacity(MAX_PLAYERS);
        slots.resize_with(MAX_PLAYERS, || None);
        Self { depth, slots }
    }

    /// Occupies an empty slot. Returns `false` when the slot is taken or out of range.
    pub(crate) fn connect(&mut self, id: PlayerId, latency_ms: u32, unlagged: bool) -> bool {
        match self.slots.get_mut(id.index()) {
            Some(slot @ None) => {
                *slot = Some(Player::new(latency_ms, unlagged, self.depth));
                true
            }
            _ => false,
        }
    }

    pub(crate) fn disconnect(&mut self, id: PlayerId) -> Option<Player> {
        self.slots.get_mut(id.index()).and_then(Option::take)
    }

    pub(crate) fn get(&self, id: PlayerId) -> Option<&Player> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub(crate) fn is_occupied(&self, id: PlayerId) -> bool {
        self.get(id).is_some()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (PlayerId, &Player)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.as_ref()
                .map(|player| (PlayerId::new(index as u8), player))
        })
    }
}
