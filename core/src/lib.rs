#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the unlagged simulation.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and the lag-compensation systems. Adapters submit
//! [`Command`] values describing desired mutations, the world executes those
//! commands via its `apply` entry point and reports [`Event`] values. The
//! lag-compensation systems never reach into world internals: they operate on
//! any state that implements [`RewindWorld`], which keeps them testable against
//! synthetic worlds.

mod config;
mod history;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

pub use config::{ConfigError, LagCompensationConfig, ServerSettings};
pub use history::{HistoryDepth, HistoryRing, PlaneHistory, PlayerHistory};

/// Authoritative simulation ticks per second.
pub const TIC_RATE: u32 = 35;

/// Milliseconds in one second, used when converting latency into ticks.
pub const MS_PER_SECOND: u64 = 1000;

/// Number of player slots tracked by the simulation.
pub const MAX_PLAYERS: usize = 32;

/// One discrete authoritative simulation step.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Tick(u64);

impl Tick {
    /// Creates a tick with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the tick.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Tick that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Tick `ticks` steps in the past, never earlier than tick zero.
    #[must_use]
    pub const fn saturating_sub(self, ticks: u64) -> Self {
        Self(self.0.saturating_sub(ticks))
    }
}

/// Slot index of a player within the player table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(u8);

impl PlayerId {
    /// Creates a player identifier for the provided slot.
    #[must_use]
    pub const fn new(slot: u8) -> Self {
        Self(slot)
    }

    /// Retrieves the slot number.
    #[must_use]
    pub const fn get(&self) -> u8 {
        self.0
    }

    /// Slot number usable as a table index.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    /// Iterates every player slot in ascending order.
    pub fn all() -> impl Iterator<Item = PlayerId> {
        (0..MAX_PLAYERS as u8).map(PlayerId)
    }
}

/// Unique identifier assigned to an actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(u32);

impl ActorId {
    /// Creates a new actor identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Index of a spatial cell (sector) owning a movable floor and ceiling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectorId(u32);

impl SectorId {
    /// Creates a new sector identifier with the provided index.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Sector index usable as a table index.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Role the running process plays within a networked session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkRole {
    /// Offline single-player game.
    Single,
    /// Offline game emulating a network session (bots).
    SingleMultiplayer,
    /// Client connected to a remote server.
    Client,
    /// Playback of a recorded client-side demo.
    DemoPlayback,
    /// Server hosting the session; its state is ground truth.
    #[default]
    Server,
}

impl NetworkRole {
    /// Reports whether this process owns the authoritative state.
    #[must_use]
    pub const fn is_authoritative_server(self) -> bool {
        matches!(self, Self::Server)
    }

    /// Reports whether the process presents a remote session: a connected
    /// client or a client-side demo being played back.
    #[must_use]
    pub const fn in_client_mode(self) -> bool {
        matches!(self, Self::Client | Self::DemoPlayback)
    }
}

/// Scalar offsets of a sector's floor and ceiling planes.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SectorPlanes {
    /// Height of the floor surface.
    pub floor: f32,
    /// Height of the ceiling surface.
    pub ceiling: f32,
}

impl SectorPlanes {
    /// Creates a plane pair.
    #[must_use]
    pub const fn new(floor: f32, ceiling: f32) -> Self {
        Self { floor, ceiling }
    }
}

/// Axis-aligned footprint of a sector on the horizontal plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SectorBounds {
    min: Vec2,
    max: Vec2,
}

impl SectorBounds {
    /// Creates bounds from two opposite corners in any order.
    #[must_use]
    pub fn from_corners(a: Vec2, b: Vec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Lower corner of the footprint.
    #[must_use]
    pub const fn min(&self) -> Vec2 {
        self.min
    }

    /// Upper corner of the footprint.
    #[must_use]
    pub const fn max(&self) -> Vec2 {
        self.max
    }

    /// Reports whether the point lies inside the footprint, edges included.
    #[must_use]
    pub fn contains(&self, point: Vec2) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

/// Copy of the actor fields lag compensation reads.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActorState {
    /// Position of the actor's feet.
    pub position: Vec3,
    /// Height of the actor's bounding cylinder.
    pub height: f32,
    /// Radius of the actor's bounding cylinder.
    pub radius: f32,
    /// Vertical velocity.
    pub momz: f32,
    /// Height of the supporting floor below the actor.
    pub floor_z: f32,
    /// Height of the ceiling above the actor.
    pub ceiling_z: f32,
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Adds a sector with the provided footprint and initial planes.
    AddSector {
        /// Footprint of the sector.
        bounds: SectorBounds,
        /// Initial floor and ceiling offsets.
        planes: SectorPlanes,
    },
    /// Moves a sector's floor and ceiling planes.
    MovePlanes {
        /// Sector whose planes move.
        sector: SectorId,
        /// New plane offsets.
        planes: SectorPlanes,
    },
    /// Connects a player into an empty slot.
    ConnectPlayer {
        /// Slot the player occupies.
        player: PlayerId,
        /// Initial round-trip latency estimate.
        latency_ms: u32,
        /// Whether the player's client asks for lag compensation.
        unlagged: bool,
    },
    /// Disconnects a player, dropping their actor and history.
    DisconnectPlayer {
        /// Slot being vacated.
        player: PlayerId,
    },
    /// Moves a player in or out of spectator mode.
    SetSpectating {
        /// Player whose mode changes.
        player: PlayerId,
        /// Whether the player spectates.
        spectating: bool,
    },
    /// Updates a player's latency estimate.
    SetLatency {
        /// Player whose estimate changes.
        player: PlayerId,
        /// New round-trip latency in milliseconds.
        latency_ms: u32,
    },
    /// Spawns or respawns a player's actor at the provided position.
    SpawnPlayer {
        /// Player being spawned.
        player: PlayerId,
        /// Spawn position.
        position: Vec3,
    },
    /// Spawns an actor that is not controlled by any player.
    SpawnActor {
        /// Spawn position.
        position: Vec3,
    },
    /// Moves an actor as the result of regular movement.
    MoveActor {
        /// Actor being moved.
        actor: ActorId,
        /// New position.
        position: Vec3,
        /// New vertical velocity.
        momz: f32,
    },
    /// Advances the authoritative tick counter.
    Tick,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Confirms that a sector was added.
    SectorAdded {
        /// Identifier allocated to the sector.
        sector: SectorId,
    },
    /// Confirms that a sector's planes moved.
    PlanesMoved {
        /// Sector whose planes moved.
        sector: SectorId,
        /// Offsets after the move.
        planes: SectorPlanes,
    },
    /// Confirms that a player connected.
    PlayerConnected {
        /// Slot now occupied.
        player: PlayerId,
    },
    /// Confirms that a player disconnected.
    PlayerDisconnected {
        /// Slot now free.
        player: PlayerId,
    },
    /// Confirms a change of spectator mode.
    SpectatingChanged {
        /// Player whose mode changed.
        player: PlayerId,
        /// Whether the player now spectates.
        spectating: bool,
    },
    /// Announces that a player's actor was spawned or teleported outside the
    /// regular per-tick movement. Histories must be reset in response.
    PlayerSpawned {
        /// Player that spawned.
        player: PlayerId,
        /// Actor controlled by the player.
        actor: ActorId,
        /// Position after spawning.
        position: Vec3,
    },
    /// Confirms that a non-player actor was spawned.
    ActorSpawned {
        /// Identifier allocated to the actor.
        actor: ActorId,
    },
    /// Confirms that an actor moved.
    ActorMoved {
        /// Actor that moved.
        actor: ActorId,
        /// Position after the move.
        position: Vec3,
    },
    /// Indicates that the authoritative tick counter advanced.
    TickAdvanced {
        /// Tick that is now current.
        tick: Tick,
    },
    /// Reports that a command could not be applied.
    CommandRejected {
        /// Specific reason the command failed.
        reason: RejectionReason,
    },
}

/// Reasons the world may reject a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RejectionReason {
    /// No sector with the provided identifier exists.
    UnknownSector(SectorId),
    /// The player slot is out of range or not connected.
    UnknownPlayer(PlayerId),
    /// No actor with the provided identifier exists.
    UnknownActor(ActorId),
    /// The player slot is already occupied.
    SlotOccupied(PlayerId),
}

/// Read and write access to the live state that lag compensation rewinds.
///
/// Relocation goes through [`RewindWorld::set_origin`], which re-derives the
/// actor's floor and ceiling bounds from the geometry at the new position; the
/// remaining mutators write a single field without re-deriving anything.
pub trait RewindWorld {
    /// Tick currently being simulated.
    fn current_tick(&self) -> Tick;

    /// Simulation ticks per second.
    fn tic_rate(&self) -> u32;

    /// Network role of the running process.
    fn role(&self) -> NetworkRole;

    /// Lag-compensation toggle and history window.
    fn lag_compensation(&self) -> LagCompensationConfig;

    /// Player whose viewpoint this process presents, if any.
    fn console_player(&self) -> Option<PlayerId>;

    /// Number of sectors; sector identifiers are dense from zero.
    fn sector_count(&self) -> usize;

    /// Live plane offsets of a sector.
    fn sector_planes(&self, sector: SectorId) -> Option<SectorPlanes>;

    /// Overwrites the live plane offsets of a sector.
    fn set_sector_planes(&mut self, sector: SectorId, planes: SectorPlanes);

    /// Floor and ceiling histories of a sector.
    fn sector_history(&self, sector: SectorId) -> Option<(&PlaneHistory, &PlaneHistory)>;

    /// Mutable floor and ceiling histories of a sector.
    fn sector_history_mut(
        &mut self,
        sector: SectorId,
    ) -> Option<(&mut PlaneHistory, &mut PlaneHistory)>;

    /// Sector whose footprint contains the point.
    fn sector_at(&self, point: Vec2) -> Option<SectorId>;

    /// Reports whether the player slot is connected and in the game.
    fn player_in_game(&self, player: PlayerId) -> bool;

    /// Reports whether the player spectates.
    fn player_spectating(&self, player: PlayerId) -> bool;

    /// Current round-trip latency estimate of the player.
    fn player_latency_ms(&self, player: PlayerId) -> u32;

    /// Actor controlled by the player.
    fn player_actor(&self, player: PlayerId) -> Option<ActorId>;

    /// Player controlling the actor.
    fn actor_player(&self, actor: ActorId) -> Option<PlayerId>;

    /// Reads an actor.
    fn actor(&self, actor: ActorId) -> Option<ActorState>;

    /// Relocates an actor and re-derives its floor and ceiling bounds.
    fn set_origin(&mut self, actor: ActorId, position: Vec3);

    /// Overwrites an actor's vertical position only.
    fn set_z(&mut self, actor: ActorId, z: f32);

    /// Overwrites an actor's floor bound only.
    fn set_floor_z(&mut self, actor: ActorId, floor_z: f32);

    /// Overwrites an actor's ceiling bound only.
    fn set_ceiling_z(&mut self, actor: ActorId, ceiling_z: f32);

    /// Position history of the player.
    fn player_history(&self, player: PlayerId) -> Option<&PlayerHistory>;

    /// Mutable position history of the player.
    fn player_history_mut(&mut self, player: PlayerId) -> Option<&mut PlayerHistory>;
}
