#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Hit-scan attacks resolved against the world as the shooting client saw it.
//!
//! A shot is traced inside a reconcile/restore pair, so other players stand
//! where the shooter's client drew them when the trigger was pulled. Players
//! whose client opted out of lag compensation are traced against the live
//! world.

use glam::{Vec2, Vec3};
use log::debug;
use unlagged_core::{ActorId, ActorState, PlayerId, RewindWorld, Tick};
use unlagged_system_lag_compensation::{
    compensation_active, is_client_side_presentation, reconcile, restore, target_tick,
};
use unlagged_world::{query, World};

/// Height above the middle of the shooter's cylinder that shots leave from.
pub const ATTACK_Z_OFFSET: f32 = 8.0;

/// Nearest player struck by a hit-scan attack.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HitscanHit {
    /// Player that was struck.
    pub target: PlayerId,
    /// Distance from the muzzle to the impact point.
    pub distance: f32,
    /// Point where the ray entered the target's cylinder.
    pub impact: Vec3,
}

/// Hit-scan system that traces shots against player cylinders.
#[derive(Debug, Default)]
pub struct Hitscan {
    candidates: Vec<(PlayerId, ActorId)>,
}

impl Hitscan {
    /// Creates a hit-scan system with empty scratch buffers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires a ray from `shooter` along `direction` and reports the nearest
    /// player it strikes within `range`.
    ///
    /// The world is rewound to the tick the shooter perceived for the duration
    /// of the trace and restored before returning.
    pub fn fire(
        &mut self,
        world: &mut World,
        shooter: PlayerId,
        direction: Vec3,
        range: f32,
    ) -> Option<HitscanHit> {
        let actor = world.player_actor(shooter)?;
        let direction = direction.normalize_or_zero();
        if direction == Vec3::ZERO || range <= 0.0 {
            return None;
        }

        self.candidates.clear();
        self.candidates.extend(
            query::players(world)
                .into_iter()
                .filter(|player| player.id != shooter && !player.spectating)
                .filter_map(|player| player.actor.map(|actor| (player.id, actor))),
        );

        let snapshot = if prefers_compensation(world, shooter) {
            reconcile(world, actor)
        } else {
            None
        };
        let hit = trace(world, actor, direction, range, &self.candidates);
        if let Some(snapshot) = snapshot {
            restore(world, snapshot);
        }

        debug!(
            "player {} fired at tick {}: {}",
            shooter.get(),
            world.current_tick().get(),
            match hit {
                Some(hit) => format!("hit player {} at {:.1}", hit.target.get(), hit.distance),
                None => "miss".to_owned(),
            }
        );
        hit
    }
}

/// Tick whose state a shot fired by `shooter` right now is traced against.
#[must_use]
pub fn perceived_tick(world: &World, shooter: PlayerId) -> Tick {
    if compensation_active(world) && prefers_compensation(world, shooter) {
        target_tick(world, shooter)
    } else {
        world.current_tick()
    }
}

/// Reports whether the shooter's own client draws the trail of its shots.
#[must_use]
pub fn draws_trail_client_side(world: &World, shooter: PlayerId) -> bool {
    world
        .player_actor(shooter)
        .is_some_and(|actor| is_client_side_presentation(world, actor))
}

/// Point a shot fired by the actor leaves from.
#[must_use]
pub fn muzzle(shooter: &ActorState) -> Vec3 {
    shooter.position + Vec3::Z * (shooter.height * 0.5 + ATTACK_Z_OFFSET)
}

fn prefers_compensation(world: &World, shooter: PlayerId) -> bool {
    query::player(world, shooter).is_some_and(|player| player.unlagged)
}

fn trace(
    world: &World,
    shooter: ActorId,
    direction: Vec3,
    range: f32,
    candidates: &[(PlayerId, ActorId)],
) -> Option<HitscanHit> {
    let origin = muzzle(&query::actor(world, shooter)?);

    let mut nearest: Option<HitscanHit> = None;
    for &(target, actor) in candidates {
        let Some(state) = query::actor(world, actor) else {
            continue;
        };
        let Some(distance) = entry_distance(origin, direction, &state) else {
            continue;
        };
        if distance > range || nearest.is_some_and(|hit| hit.distance <= distance) {
            continue;
        }
        let impact = origin + direction * distance;
        if impact.z < state.floor_z || impact.z > state.ceiling_z {
            continue;
        }
        nearest = Some(HitscanHit {
            target,
            distance,
            impact,
        });
    }
    nearest
}

/// Distance along the ray to where it enters the target's cylinder.
fn entry_distance(origin: Vec3, direction: Vec3, target: &ActorState) -> Option<f32> {
    let (side_near, side_far) = side_interval(
        origin.truncate() - target.position.truncate(),
        direction.truncate(),
        target.radius,
    )?;
    let (cap_near, cap_far) = slab_interval(
        origin.z,
        direction.z,
        target.position.z,
        target.position.z + target.height,
    )?;
    let near = side_near.max(cap_near).max(0.0);
    let far = side_far.min(cap_far);
    (near <= far).then_some(near)
}

/// Ray parameters between which the ray lies inside an infinite vertical
/// cylinder; `offset` is the ray origin relative to the cylinder axis.
fn side_interval(offset: Vec2, planar: Vec2, radius: f32) -> Option<(f32, f32)> {
    let a = planar.length_squared();
    let c = offset.length_squared() - radius * radius;
    if a == 0.0 {
        return (c <= 0.0).then_some((f32::NEG_INFINITY, f32::INFINITY));
    }
    let b = offset.dot(planar);
    let discriminant = b * b - a * c;
    if discriminant < 0.0 {
        return None;
    }
    let root = discriminant.sqrt();
    Some(((-b - root) / a, (-b + root) / a))
}

fn slab_interval(origin: f32, direction: f32, bottom: f32, top: f32) -> Option<(f32, f32)> {
    if direction == 0.0 {
        return (bottom..=top)
            .contains(&origin)
            .then_some((f32::NEG_INFINITY, f32::INFINITY));
    }
    let enter = (bottom - origin) / direction;
    let exit = (top - origin) / direction;
    Some((enter.min(exit), enter.max(exit)))
}
