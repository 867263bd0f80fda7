use log::trace;
use unlagged_core::{Event, PlayerId, RewindWorld, SectorId, SectorPlanes};

use crate::{compensation_active, tracked_actor};

/// Writes every sector's live plane offsets into the current tick's slot.
pub fn record_sectors<W>(world: &mut W)
where
    W: RewindWorld + ?Sized,
{
    if !compensation_active(world) {
        return;
    }

    let tick = world.current_tick();
    for sector in sector_ids(world.sector_count()) {
        let Some(SectorPlanes { floor, ceiling }) = world.sector_planes(sector) else {
            continue;
        };
        if let Some((floor_history, ceiling_history)) = world.sector_history_mut(sector) {
            floor_history.record(tick, floor);
            ceiling_history.record(tick, ceiling);
        }
    }
}

/// Writes the player's live position into the current tick's slot.
///
/// Players that are disconnected, spectating or without an actor are skipped.
pub fn record_player<W>(world: &mut W, player: PlayerId)
where
    W: RewindWorld + ?Sized,
{
    if !compensation_active(world) {
        return;
    }

    let Some(actor) = tracked_actor(world, player) else {
        return;
    };
    let Some(state) = world.actor(actor) else {
        return;
    };

    let tick = world.current_tick();
    if let Some(history) = world.player_history_mut(player) {
        history.record(tick, state.position);
    }
}

/// Records every sector and every tracked player for the current tick.
///
/// Must run exactly once per tick, after movement and outside any
/// reconcile/restore pair.
pub fn record_tick<W>(world: &mut W)
where
    W: RewindWorld + ?Sized,
{
    if !compensation_active(world) {
        return;
    }

    trace!("recording tick {}", world.current_tick().get());
    record_sectors(world);
    for player in PlayerId::all() {
        record_player(world, player);
    }
}

/// Fills every slot of the player's history with their current position.
///
/// Invoke after any authoritative teleport or respawn so a later rewind cannot
/// read pre-respawn coordinates.
pub fn reset_player_history<W>(world: &mut W, player: PlayerId)
where
    W: RewindWorld + ?Sized,
{
    if !compensation_active(world) {
        return;
    }

    let Some(state) = world.player_actor(player).and_then(|actor| world.actor(actor)) else {
        return;
    };
    if let Some(history) = world.player_history_mut(player) {
        history.fill(state.position);
    }
}

/// Resets the history of every player the events report as spawned.
pub fn reset_spawned_players<W>(world: &mut W, events: &[Event])
where
    W: RewindWorld + ?Sized,
{
    for event in events {
        if let Event::PlayerSpawned { player, .. } = event {
            reset_player_history(world, *player);
        }
    }
}

pub(crate) fn sector_ids(count: usize) -> impl Iterator<Item = SectorId> {
    (0..count).map(|index| SectorId::new(u32::try_from(index).unwrap_or(u32::MAX)))
}
