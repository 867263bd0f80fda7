#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Server-side lag compensation ("unlagged").
//!
//! Every tick the [`record_tick`] pass appends the authoritative value of each
//! sector plane and each tracked player into fixed-depth rings owned by the
//! world. Before a hit-scan computation the caller invokes [`reconcile`], which
//! resolves the tick the attacking client perceived as "now", captures the live
//! values and overwrites them with history. The returned [`RestoreSnapshot`]
//! is consumed by [`restore`], which writes the captured values back.
//! [`with_reconciled`] wraps the pair around a closure.
//!
//! Every entry point is a silent no-op unless the process is the authoritative
//! server and lag compensation is enabled; the simulation stays correct, just
//! less fair, without it.

mod reconcile;
mod recorder;
mod resolver;

use unlagged_core::{ActorId, PlayerId, RewindWorld};

pub use reconcile::{classify, reconcile, restore, with_reconciled, PlayerClass, RestoreSnapshot};
pub use recorder::{
    record_player, record_sectors, record_tick, reset_player_history, reset_spawned_players,
};
pub use resolver::{target_tick, unlagged_tick};

/// Reports whether the hit-scan presentation for `attacker` (a rail trail, for
/// instance) is drawn by the shooting client itself rather than broadcast.
///
/// True only when lag compensation is enabled and `attacker` belongs to the
/// player this process presents.
#[must_use]
pub fn is_client_side_presentation<W>(world: &W, attacker: ActorId) -> bool
where
    W: RewindWorld + ?Sized,
{
    let Some(player) = world.actor_player(attacker) else {
        return false;
    };
    if !world.lag_compensation().enabled {
        return false;
    }
    world.console_player() == Some(player)
}

/// Reports whether this process rewinds at all: it must be the authoritative
/// server with lag compensation enabled.
#[must_use]
pub fn compensation_active<W>(world: &W) -> bool
where
    W: RewindWorld + ?Sized,
{
    world.role().is_authoritative_server() && world.lag_compensation().enabled
}

/// Actor of a connected, non-spectating player.
pub(crate) fn tracked_actor<W>(world: &W, player: PlayerId) -> Option<ActorId>
where
    W: RewindWorld + ?Sized,
{
    if !world.player_in_game(player) || world.player_spectating(player) {
        return None;
    }
    world.player_actor(player)
}
