#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state for the unlagged simulation.
//!
//! The world owns the sector table, the player table and every actor. It is
//! mutated only through [`apply`] and read through [`query`]; the
//! lag-compensation systems reach it through the [`RewindWorld`] implementation,
//! which also exposes the per-sector and per-player histories the world owns.

mod actors;
mod players;
mod sectors;

use glam::{Vec2, Vec3};
use log::warn;
use unlagged_core::{
    ActorId, ActorState, Command, Event, LagCompensationConfig, NetworkRole, PlaneHistory,
    PlayerHistory, PlayerId, RejectionReason, RewindWorld, SectorId, SectorPlanes,
    ServerSettings, Tick,
};

pub use actors::{PLAYER_HEIGHT, PLAYER_RADIUS, PROP_HEIGHT, PROP_RADIUS};

use self::{actors::ActorRegistry, players::PlayerTable, sectors::SectorTable};

/// Represents the authoritative simulation state.
#[derive(Debug)]
pub struct World {
    settings: ServerSettings,
    console_player: Option<PlayerId>,
    tick: Tick,
    sectors: SectorTable,
    players: PlayerTable,
    actors: ActorRegistry,
}

impl World {
    /// Creates an empty world running under the provided settings.
    #[must_use]
    pub fn new(settings: ServerSettings) -> Self {
        let depth = settings.lag_compensation.history_depth;
        Self {
            settings,
            console_player: None,
            tick: Tick::default(),
            sectors: SectorTable::new(depth),
            players: PlayerTable::new(depth),
            actors: ActorRegistry::new(),
        }
    }

    /// Selects the player whose viewpoint this process presents.
    pub fn set_console_player(&mut self, player: Option<PlayerId>) {
        self.console_player = player;
    }

    fn relink(&mut self, id: ActorId, position: Vec3) {
        let (floor_z, ceiling_z) = self.sectors.bounds_at(position.truncate());
        if let Some(actor) = self.actors.get_mut(id) {
            actor.state.position = position;
            actor.state.floor_z = floor_z;
            actor.state.ceiling_z = ceiling_z;
        }
    }

    fn move_planes(&mut self, id: SectorId, planes: SectorPlanes) -> bool {
        let Some(sector) = self.sectors.get_mut(id) else {
            return false;
        };
        let previous = sector.planes;
        sector.planes = planes;

        for actor in self.actors.iter_mut() {
            let state = &mut actor.state;
            if self.sectors.locate(state.position.truncate()) != Some(id) {
                continue;
            }
            if state.position.z == previous.floor || state.position.z < planes.floor {
                state.position.z = planes.floor;
            }
            state.floor_z = planes.floor;
            state.ceiling_z = planes.ceiling;
        }
        true
    }

    fn spawn_player(&mut self, player: PlayerId, position: Vec3) -> Option<ActorId> {
        let existing = self.players.get(player)?.actor;
        let actor = match existing {
            Some(actor) => actor,
            None => self
                .actors
                .spawn(position, PLAYER_HEIGHT, PLAYER_RADIUS, Some(player)),
        };
        if let Some(record) = self.players.get_mut(player) {
            record.actor = Some(actor);
        }
        if let Some(state) = self.actors.get_mut(actor) {
            state.state.momz = 0.0;
        }
        self.relink(actor, position);
        Some(actor)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(ServerSettings::default())
    }
}

fn reject(out_events: &mut Vec<Event>, reason: RejectionReason) {
    warn!("world rejected command: {reason:?}");
    out_events.push(Event::CommandRejected { reason });
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::AddSector { bounds, planes } => {
            let sector = world.sectors.add(bounds, planes);
            out_events.push(Event::SectorAdded { sector });
        }
        Command::MovePlanes { sector, planes } => {
            if world.move_planes(sector, planes) {
                out_events.push(Event::PlanesMoved { sector, planes });
            } else {
                reject(out_events, RejectionReason::UnknownSector(sector));
            }
        }
        Command::ConnectPlayer {
            player,
            latency_ms,
            unlagged,
        } => {
            if world.players.connect(player, latency_ms, unlagged) {
                out_events.push(Event::PlayerConnected { player });
            } else if world.players.is_occupied(player) {
                reject(out_events, RejectionReason::SlotOccupied(player));
            } else {
                reject(out_events, RejectionReason::UnknownPlayer(player));
            }
        }
        Command::DisconnectPlayer { player } => match world.players.disconnect(player) {
            Some(record) => {
                if let Some(actor) = record.actor {
                    let _ = world.actors.remove(actor);
                }
                if world.console_player == Some(player) {
                    world.console_player = None;
                }
                out_events.push(Event::PlayerDisconnected { player });
            }
            None => reject(out_events, RejectionReason::UnknownPlayer(player)),
        },
        Command::SetSpectating { player, spectating } => match world.players.get_mut(player) {
            Some(record) => {
                let rejoined = record.spectating && !spectating;
                record.spectating = spectating;
                let actor = record.actor;
                out_events.push(Event::SpectatingChanged { player, spectating });

                // history went unrecorded while spectating; re-entering counts as a spawn
                let spawned = actor
                    .filter(|_| rejoined)
                    .and_then(|actor| world.actors.get(actor).map(|record| (actor, record)));
                if let Some((actor, record)) = spawned {
                    out_events.push(Event::PlayerSpawned {
                        player,
                        actor,
                        position: record.state.position,
                    });
                }
            }
            None => reject(out_events, RejectionReason::UnknownPlayer(player)),
        },
        Command::SetLatency { player, latency_ms } => match world.players.get_mut(player) {
            Some(record) => record.latency_ms = latency_ms,
            None => reject(out_events, RejectionReason::UnknownPlayer(player)),
        },
        Command::SpawnPlayer { player, position } => match world.spawn_player(player, position) {
            Some(actor) => out_events.push(Event::PlayerSpawned {
                player,
                actor,
                position,
            }),
            None => reject(out_events, RejectionReason::UnknownPlayer(player)),
        },
        Command::SpawnActor { position } => {
            let actor = world.actors.spawn(position, PROP_HEIGHT, PROP_RADIUS, None);
            world.relink(actor, position);
            out_events.push(Event::ActorSpawned { actor });
        }
        Command::MoveActor {
            actor,
            position,
            momz,
        } => match world.actors.get_mut(actor) {
            Some(record) => {
                record.state.momz = momz;
                world.relink(actor, position);
                out_events.push(Event::ActorMoved { actor, position });
            }
            None => reject(out_events, RejectionReason::UnknownActor(actor)),
        },
        Command::Tick => {
            world.tick = world.tick.next();
            out_events.push(Event::TickAdvanced { tick: world.tick });
        }
    }
}

impl RewindWorld for World {
    fn current_tick(&self) -> Tick {
        self.tick
    }

    fn tic_rate(&self) -> u32 {
        self.settings.tic_rate
    }

    fn role(&self) -> NetworkRole {
        self.settings.role
    }

    fn lag_compensation(&self) -> LagCompensationConfig {
        self.settings.lag_compensation
    }

    fn console_player(&self) -> Option<PlayerId> {
        self.console_player
    }

    fn sector_count(&self) -> usize {
        self.sectors.len()
    }

    fn sector_planes(&self, sector: SectorId) -> Option<SectorPlanes> {
        self.sectors.get(sector).map(|sector| sector.planes)
    }

    fn set_sector_planes(&mut self, sector: SectorId, planes: SectorPlanes) {
        if let Some(sector) = self.sectors.get_mut(sector) {
            sector.planes = planes;
        }
    }

    fn sector_history(&self, sector: SectorId) -> Option<(&PlaneHistory, &PlaneHistory)> {
        self.sectors
            .get(sector)
            .map(|sector| (&sector.floor_history, &sector.ceiling_history))
    }

    fn sector_history_mut(
        &mut self,
        sector: SectorId,
    ) -> Option<(&mut PlaneHistory, &mut PlaneHistory)> {
        self.sectors
            .get_mut(sector)
            .map(|sector| (&mut sector.floor_history, &mut sector.ceiling_history))
    }

    fn sector_at(&self, point: Vec2) -> Option<SectorId> {
        self.sectors.locate(point)
    }

    fn player_in_game(&self, player: PlayerId) -> bool {
        self.players.is_occupied(player)
    }

    fn player_spectating(&self, player: PlayerId) -> bool {
        self.players.get(player).is_some_and(|record| record.spectating)
    }

    fn player_latency_ms(&self, player: PlayerId) -> u32 {
        self.players.get(player).map_or(0, |record| record.latency_ms)
    }

    fn player_actor(&self, player: PlayerId) -> Option<ActorId> {
        self.players.get(player).and_then(|record| record.actor)
    }

    fn actor_player(&self, actor: ActorId) -> Option<PlayerId> {
        self.actors.get(actor).and_then(|record| record.player)
    }

    fn actor(&self, actor: ActorId) -> Option<ActorState> {
        self.actors.get(actor).map(|record| record.state)
    }

    fn set_origin(&mut self, actor: ActorId, position: Vec3) {
        self.relink(actor, position);
    }

    fn set_z(&mut self, actor: ActorId, z: f32) {
        if let Some(record) = self.actors.get_mut(actor) {
            record.state.position.z = z;
        }
    }

    fn set_floor_z(&mut self, actor: ActorId, floor_z: f32) {
        if let Some(record) = self.actors.get_mut(actor) {
            record.state.floor_z = floor_z;
        }
    }

    fn set_ceiling_z(&mut self, actor: ActorId, ceiling_z: f32) {
        if let Some(record) = self.actors.get_mut(actor) {
            record.state.ceiling_z = ceiling_z;
        }
    }

    fn player_history(&self, player: PlayerId) -> Option<&PlayerHistory> {
        self.players.get(player).map(|record| &record.history)
    }

    fn player_history_mut(&mut self, player: PlayerId) -> Option<&mut PlayerHistory> {
        self.players.get_mut(player).map(|record| &mut record.history)
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use unlagged_core::{
        ActorId, ActorState, NetworkRole, PlayerHistory, PlayerId, SectorBounds, SectorId,
        SectorPlanes, ServerSettings, Tick,
    };

    use super::World;

    /// Tick currently being simulated.
    #[must_use]
    pub fn current_tick(world: &World) -> Tick {
        world.tick
    }

    /// Network role the world runs under.
    #[must_use]
    pub fn role(world: &World) -> NetworkRole {
        world.settings.role
    }

    /// Settings the world was created with.
    #[must_use]
    pub fn settings(world: &World) -> &ServerSettings {
        &world.settings
    }

    /// Captures every sector in identifier order.
    #[must_use]
    pub fn sectors(world: &World) -> Vec<SectorSnapshot> {
        world
            .sectors
            .iter()
            .map(|(id, sector)| SectorSnapshot {
                id,
                bounds: sector.bounds,
                planes: sector.planes,
            })
            .collect()
    }

    /// Captures a single sector.
    #[must_use]
    pub fn sector(world: &World, id: SectorId) -> Option<SectorSnapshot> {
        world.sectors.get(id).map(|sector| SectorSnapshot {
            id,
            bounds: sector.bounds,
            planes: sector.planes,
        })
    }

    /// Captures every connected player in slot order.
    #[must_use]
    pub fn players(world: &World) -> Vec<PlayerSnapshot> {
        world
            .players
            .iter()
            .map(|(id, player)| PlayerSnapshot {
                id,
                latency_ms: player.latency_ms,
                spectating: player.spectating,
                unlagged: player.unlagged,
                actor: player.actor,
            })
            .collect()
    }

    /// Captures a single connected player.
    #[must_use]
    pub fn player(world: &World, id: PlayerId) -> Option<PlayerSnapshot> {
        world.players.get(id).map(|player| PlayerSnapshot {
            id,
            latency_ms: player.latency_ms,
            spectating: player.spectating,
            unlagged: player.unlagged,
            actor: player.actor,
        })
    }

    /// Reads an actor's live state.
    #[must_use]
    pub fn actor(world: &World, id: ActorId) -> Option<ActorState> {
        world.actors.get(id).map(|actor| actor.state)
    }

    /// Position history of a connected player.
    #[must_use]
    pub fn player_history(world: &World, id: PlayerId) -> Option<&PlayerHistory> {
        world.players.get(id).map(|player| &player.history)
    }

    /// Enumerates actors not controlled by any player.
    #[must_use]
    pub fn props(world: &World) -> Vec<ActorId> {
        world
            .actors
            .iter()
            .filter(|(_, actor)| actor.player.is_none())
            .map(|(id, _)| id)
            .collect()
    }

    /// Immutable representation of a sector.
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub struct SectorSnapshot {
        /// Identifier of the sector.
        pub id: SectorId,
        /// Footprint of the sector.
        pub bounds: SectorBounds,
        /// Live plane offsets.
        pub planes: SectorPlanes,
    }

    /// Immutable representation of a connected player.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PlayerSnapshot {
        /// Slot of the player.
        pub id: PlayerId,
        /// Round-trip latency estimate.
        pub latency_ms: u32,
        /// Whether the player spectates.
        pub spectating: bool,
        /// Whether the player's client asks for lag compensation.
        pub unlagged: bool,
        /// Actor controlled by the player.
        pub actor: Option<ActorId>,
    }
}
