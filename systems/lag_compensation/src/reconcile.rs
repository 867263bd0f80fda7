use glam::Vec3;
use log::debug;
use unlagged_core::{ActorId, ActorState, PlayerId, RewindWorld, SectorId, SectorPlanes, Tick};

use crate::{compensation_active, recorder::sector_ids, target_tick, tracked_actor};

/// How a player slot takes part in a reconciliation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerClass {
    /// The player firing; never relocated, only re-bounded.
    Attacker(ActorId),
    /// Another tracked player; relocated to its historical position.
    TrackedOther(ActorId),
    /// Disconnected, spectating or without an actor; left untouched.
    Excluded,
}

/// Classifies a player slot relative to the attacking actor.
#[must_use]
pub fn classify<W>(world: &W, player: PlayerId, attacker: ActorId) -> PlayerClass
where
    W: RewindWorld + ?Sized,
{
    match tracked_actor(world, player) {
        Some(actor) if actor == attacker => PlayerClass::Attacker(actor),
        Some(actor) => PlayerClass::TrackedOther(actor),
        None => PlayerClass::Excluded,
    }
}

#[derive(Clone, Copy, Debug)]
struct SavedPlayer {
    actor: ActorId,
    position: Vec3,
    floor_z: f32,
    ceiling_z: f32,
}

/// Live values captured by [`reconcile`] and written back by [`restore`].
///
/// The snapshot is the only way to undo a reconciliation and is consumed by
/// [`restore`], so a rewind can be restored at most once.
#[must_use = "rewound state stays live until the snapshot is passed to `restore`"]
#[derive(Debug)]
pub struct RestoreSnapshot {
    attacker: ActorId,
    target_tick: Tick,
    rewound: bool,
    sectors: Vec<(SectorId, SectorPlanes)>,
    players: Vec<SavedPlayer>,
}

impl RestoreSnapshot {
    /// Actor whose perspective the world was rewound to.
    #[must_use]
    pub const fn attacker(&self) -> ActorId {
        self.attacker
    }

    /// Historical tick the world was rewound to.
    #[must_use]
    pub const fn target_tick(&self) -> Tick {
        self.target_tick
    }

    /// Reports whether any live value was overwritten with history.
    ///
    /// `false` when the target tick is the current tick.
    #[must_use]
    pub const fn rewound(&self) -> bool {
        self.rewound
    }

    /// Number of sectors captured.
    #[must_use]
    pub fn sector_count(&self) -> usize {
        self.sectors.len()
    }

    /// Number of player actors captured.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.players.len()
    }
}

/// Rewinds sectors and other players to the tick the attacker perceived.
///
/// Returns `None`, leaving the world untouched, unless the process is the
/// authoritative server, lag compensation is enabled and `attacker` belongs to
/// a player. Every returned snapshot must be handed to [`restore`] before the
/// next tick is recorded.
pub fn reconcile<W>(world: &mut W, attacker: ActorId) -> Option<RestoreSnapshot>
where
    W: RewindWorld + ?Sized,
{
    if !compensation_active(world) {
        return None;
    }
    let shooter = world.actor_player(attacker)?;

    let current = world.current_tick();
    let target = target_tick(world, shooter);
    // the current tick may not be fully recorded yet
    let rewound = target != current;
    debug!(
        "reconciling player {} at tick {} to tick {}",
        shooter.get(),
        current.get(),
        target.get()
    );

    let mut snapshot = RestoreSnapshot {
        attacker,
        target_tick: target,
        rewound,
        sectors: Vec::with_capacity(world.sector_count()),
        players: Vec::new(),
    };

    for sector in sector_ids(world.sector_count()) {
        let Some(planes) = world.sector_planes(sector) else {
            continue;
        };
        snapshot.sectors.push((sector, planes));
        if !rewound {
            continue;
        }
        let past = world.sector_history(sector).map(|(floor, ceiling)| {
            SectorPlanes::new(floor.sample(target), ceiling.sample(target))
        });
        if let Some(past) = past {
            world.set_sector_planes(sector, past);
        }
    }

    for player in PlayerId::all() {
        let actor = match classify(world, player, attacker) {
            PlayerClass::Attacker(actor) | PlayerClass::TrackedOther(actor) => actor,
            PlayerClass::Excluded => continue,
        };
        let Some(before) = world.actor(actor) else {
            continue;
        };
        snapshot.players.push(SavedPlayer {
            actor,
            position: before.position,
            floor_z: before.floor_z,
            ceiling_z: before.ceiling_z,
        });
        if !rewound {
            continue;
        }

        if actor == attacker {
            rebound_attacker(world, actor, before);
        } else if let Some(past) = world.player_history(player).map(|history| history.sample(target))
        {
            world.set_origin(actor, past);
        }
    }

    Some(snapshot)
}

/// Writes every value captured by [`reconcile`] back into the world.
///
/// Afterwards every captured sector and player is bit-identical to its state
/// immediately before the matching [`reconcile`], whether or not anything was
/// rewound.
pub fn restore<W>(world: &mut W, snapshot: RestoreSnapshot)
where
    W: RewindWorld + ?Sized,
{
    for (sector, planes) in &snapshot.sectors {
        world.set_sector_planes(*sector, *planes);
    }

    // relocating re-derives the bounds, so the saved ones are written last
    for saved in &snapshot.players {
        world.set_origin(saved.actor, saved.position);
        world.set_floor_z(saved.actor, saved.floor_z);
        world.set_ceiling_z(saved.actor, saved.ceiling_z);
    }

    debug!(
        "restored {} sectors and {} players after rewinding actor {} to tick {}",
        snapshot.sectors.len(),
        snapshot.players.len(),
        snapshot.attacker.get(),
        snapshot.target_tick.get()
    );
}

/// Runs `compute` against the world as `attacker` perceived it, then restores.
///
/// When reconciliation is gated off, `compute` sees the live world.
pub fn with_reconciled<W, R, F>(world: &mut W, attacker: ActorId, compute: F) -> R
where
    W: RewindWorld + ?Sized,
    F: FnOnce(&mut W) -> R,
{
    let snapshot = reconcile(world, attacker);
    let result = compute(world);
    if let Some(snapshot) = snapshot {
        restore(world, snapshot);
    }
    result
}

/// Re-derives the attacker's bounds against the rewound geometry at their
/// unchanged position and pushes them out of the floor or ceiling.
fn rebound_attacker<W>(world: &mut W, actor: ActorId, before: ActorState)
where
    W: RewindWorld + ?Sized,
{
    world.set_origin(actor, before.position);
    let Some(state) = world.actor(actor) else {
        return;
    };

    let mut z = state.position.z;
    if z + state.height > state.ceiling_z {
        z = state.ceiling_z - state.height;
    }
    if z < state.floor_z {
        z = state.floor_z;
    }
    if z != state.position.z {
        world.set_z(actor, z);
    }

    settle_attacker_on_lowered_floor(world, actor, before.floor_z);
}

/// Heuristic for a client that mispredicted itself on a rising floor.
///
/// When the floor under the attacker is higher now than at the rewound tick and
/// the attacker stood on the present floor without falling, the attacker is
/// dropped onto the rewound floor. Other mispredictions on moving floors are
/// not corrected.
fn settle_attacker_on_lowered_floor<W>(world: &mut W, actor: ActorId, present_floor_z: f32)
where
    W: RewindWorld + ?Sized,
{
    let Some(state) = world.actor(actor) else {
        return;
    };
    if present_floor_z > state.floor_z
        && state.position.z == present_floor_z
        && state.momz >= 0.0
    {
        world.set_z(actor, state.floor_z);
    }
}
