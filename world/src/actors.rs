//! Authoritative actor state and identifier allocation.

use std::collections::BTreeMap;

use glam::Vec3;
use unlagged_core::{ActorId, ActorState, PlayerId};

/// Height of a player's bounding cylinder.
pub const PLAYER_HEIGHT: f32 = 56.0;
/// Radius of a player's bounding cylinder.
pub const PLAYER_RADIUS: f32 = 16.0;
/// Height of a non-player actor's bounding cylinder.
pub const PROP_HEIGHT: f32 = 40.0;
/// Radius of a non-player actor's bounding cylinder.
pub const PROP_RADIUS: f32 = 20.0;

#[derive(Clone, Debug)]
pub(crate) struct Actor {
    pub(crate) state: ActorState,
    pub(crate) player: Option<PlayerId>,
}

/// Registry that stores actors and manages identifier allocation.
#[derive(Debug)]
pub(crate) struct ActorRegistry {
    entries: BTreeMap<ActorId, Actor>,
    next_actor_id: ActorId,
}

impl ActorRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_actor_id: ActorId::new(0),
        }
    }

    /// Inserts an actor whose bounds are filled in later by relinking.
    pub(crate) fn spawn(
        &mut self,
        position: Vec3,
        height: f32,
        radius: f32,
        player: Option<PlayerId>,
    ) -> ActorId {
        let id = self.next_actor_id;
        self.next_actor_id = ActorId::new(id.get().saturating_add(1));
        let _ = self.entries.insert(
            id,
            Actor {
                state: ActorState {
                    position,
                    height,
                    radius,
                    momz: 0.0,
                    floor_z: f32::NEG_INFINITY,
                    ceiling_z: f32::INFINITY,
                },
                player,
            },
        );
        id
    }

    pub(crate) fn remove(&mut self, id: ActorId) -> Option<Actor> {
        self.entries.remove(&id)
    }

    pub(crate) fn get(&self, id: ActorId) -> Option<&Actor> {
        self.entries.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        self.entries.get_mut(&id)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Actor> {
        self.entries.values_mut()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (ActorId, &Actor)> {
        self.entries.iter().map(|(id, actor)| (*id, actor))
    }
}
