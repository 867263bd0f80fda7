use std::fmt;

use anyhow::{bail, Result};
use glam::Vec3;
use log::{debug, warn};
use unlagged_core::{
    ActorId, ActorState, Command, Event, PlayerHistory, PlayerId, RewindWorld, SectorPlanes, Tick,
};
use unlagged_system_hitscan::{draws_trail_client_side, muzzle, perceived_tick, Hitscan, HitscanHit};
use unlagged_system_lag_compensation::{record_tick, reset_spawned_players, unlagged_tick};
use unlagged_world::{self as world, query, World};

use crate::scenario::{LiftSpec, Scenario, ShotSpec};

/// Farthest distance a scripted shot travels.
const SHOT_RANGE: f32 = 8192.0;

/// Player driven by the scenario.
#[derive(Debug)]
struct Walker {
    player: PlayerId,
    actor: ActorId,
    velocity: Vec3,
    /// Positions as remote clients drew them, kept regardless of the
    /// server's lag-compensation settings.
    seen: PlayerHistory,
}

/// Outcome of one scripted shot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ShotReport {
    tick: Tick,
    shooter: PlayerId,
    target: PlayerId,
    aimed_tick: Tick,
    traced_tick: Tick,
    hit: Option<HitscanHit>,
    client_side_trail: bool,
}

impl ShotReport {
    pub(crate) fn is_hit(&self) -> bool {
        self.hit.is_some()
    }
}

impl fmt::Display for ShotReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tick {}: player {} -> player {}, aimed at tick {}, traced at tick {}: ",
            self.tick.get(),
            self.shooter.get(),
            self.target.get(),
            self.aimed_tick.get(),
            self.traced_tick.get()
        )?;
        match self.hit {
            Some(hit) => write!(f, "hit player {} at {:.1}", hit.target.get(), hit.distance)?,
            None => write!(f, "miss")?,
        }
        if self.client_side_trail {
            write!(f, " [client-side trail]")?;
        }
        Ok(())
    }
}

/// Fixed-tick driver for a scenario.
#[derive(Debug)]
pub(crate) struct Simulation {
    world: World,
    hitscan: Hitscan,
    lifts: Vec<LiftSpec>,
    walkers: Vec<Walker>,
    shots: Vec<ShotSpec>,
}

impl Simulation {
    /// Builds the world described by the scenario and records tick zero.
    pub(crate) fn new(scenario: &Scenario) -> Result<Self> {
        let mut world = World::new(scenario.settings);
        world.set_console_player(scenario.console_player.map(PlayerId::new));
        let depth = scenario.settings.lag_compensation.history_depth;

        let mut events = Vec::new();
        for sector in &scenario.sectors {
            world::apply(
                &mut world,
                Command::AddSector {
                    bounds: sector.bounds(),
                    planes: sector.planes(),
                },
                &mut events,
            );
        }

        let mut walkers = Vec::with_capacity(scenario.players.len());
        for declared in &scenario.players {
            let player = declared.player();
            world::apply(
                &mut world,
                Command::ConnectPlayer {
                    player,
                    latency_ms: declared.latency_ms(),
                    unlagged: declared.unlagged(),
                },
                &mut events,
            );
            world::apply(
                &mut world,
                Command::SpawnPlayer {
                    player,
                    position: declared.spawn(),
                },
                &mut events,
            );
            let Some(actor) = world.player_actor(player) else {
                bail!("player {} did not spawn", player.get());
            };
            walkers.push(Walker {
                player,
                actor,
                velocity: declared.velocity().extend(0.0),
                seen: PlayerHistory::new(depth, declared.spawn()),
            });
        }

        if let Some(Event::CommandRejected { reason }) = events
            .iter()
            .find(|event| matches!(event, Event::CommandRejected { .. }))
        {
            bail!("scenario setup was rejected: {reason:?}");
        }
        reset_spawned_players(&mut world, &events);
        record_tick(&mut world);

        let mut shots = scenario.shots.clone();
        shots.sort_by_key(ShotSpec::tick);

        Ok(Self {
            world,
            hitscan: Hitscan::new(),
            lifts: scenario.lifts.clone(),
            walkers,
            shots,
        })
    }

    /// Simulates until `end`, returning a report for every shot fired.
    pub(crate) fn run(&mut self, end: Tick) -> Vec<ShotReport> {
        let mut reports = Vec::new();
        while self.world.current_tick() < end {
            self.step();
            let tick = self.world.current_tick();
            let due: Vec<ShotSpec> = self
                .shots
                .iter()
                .copied()
                .filter(|shot| shot.tick() == tick)
                .collect();
            for shot in due {
                match self.fire(shot) {
                    Some(report) => reports.push(report),
                    None => warn!(
                        "skipping shot at tick {}: player {} or {} has no actor",
                        tick.get(),
                        shot.shooter().get(),
                        shot.target().get()
                    ),
                }
            }
        }
        reports
    }

    /// Advances one tick: lifts move, players walk, then history is recorded.
    fn step(&mut self) {
        let mut events = Vec::new();
        world::apply(&mut self.world, Command::Tick, &mut events);
        let tick = self.world.current_tick();

        for lift in &self.lifts {
            let Some(sector) = query::sector(&self.world, lift.sector()) else {
                continue;
            };
            world::apply(
                &mut self.world,
                Command::MovePlanes {
                    sector: lift.sector(),
                    planes: SectorPlanes::new(lift.floor_at(tick), sector.planes.ceiling),
                },
                &mut events,
            );
        }

        for walker in &mut self.walkers {
            let Some(state) = query::actor(&self.world, walker.actor) else {
                continue;
            };
            let next = state.position + walker.velocity;
            let planes = self
                .world
                .sector_at(next.truncate())
                .and_then(|sector| self.world.sector_planes(sector));
            let position = match planes {
                Some(planes) if state.position.z == state.floor_z => {
                    next.truncate().extend(planes.floor)
                }
                Some(planes) => next.truncate().extend(next.z.max(planes.floor)),
                None => {
                    // turn around at the edge of the map
                    walker.velocity = -walker.velocity;
                    state.position
                }
            };
            world::apply(
                &mut self.world,
                Command::MoveActor {
                    actor: walker.actor,
                    position,
                    momz: 0.0,
                },
                &mut events,
            );
        }

        record_tick(&mut self.world);
        for walker in &mut self.walkers {
            if let Some(state) = query::actor(&self.world, walker.actor) {
                walker.seen.record(tick, state.position);
            }
        }
        debug!("tick {} produced {} events", tick.get(), events.len());
    }

    /// Fires at where the shooter's client drew the target.
    fn fire(&mut self, shot: ShotSpec) -> Option<ShotReport> {
        let tick = self.world.current_tick();
        let shooter = self.walker(shot.shooter())?;
        let target = self.walker(shot.target())?;
        let shooter_state = query::actor(&self.world, shooter.actor)?;
        let target_state = query::actor(&self.world, target.actor)?;

        let latency_ms = query::player(&self.world, shot.shooter())?.latency_ms;
        let aimed_tick = unlagged_tick(
            tick,
            latency_ms,
            self.world.tic_rate(),
            self.world.lag_compensation().history_depth,
        );
        let aim = muzzle(&ActorState {
            position: target.seen.sample(aimed_tick),
            ..target_state
        });
        let direction = aim - muzzle(&shooter_state);

        let traced_tick = perceived_tick(&self.world, shot.shooter());
        let hit = self
            .hitscan
            .fire(&mut self.world, shot.shooter(), direction, SHOT_RANGE);

        Some(ShotReport {
            tick,
            shooter: shot.shooter(),
            target: shot.target(),
            aimed_tick,
            traced_tick,
            hit,
            client_side_trail: draws_trail_client_side(&self.world, shot.shooter()),
        })
    }

    fn walker(&self, player: PlayerId) -> Option<&Walker> {
        self.walkers.iter().find(|walker| walker.player == player)
    }
}
