use std::{collections::BTreeSet, fs, path::Path};

use anyhow::{bail, ensure, Context, Result};
use glam::{Vec2, Vec3};
use serde::Deserialize;
use unlagged_core::{
    PlayerId, SectorBounds, SectorId, SectorPlanes, ServerSettings, Tick, MAX_PLAYERS,
};

/// Scripted session: geometry, players and the shots they fire.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Scenario {
    /// Process settings, including the lag-compensation switch.
    #[serde(default)]
    pub(crate) settings: ServerSettings,
    /// Player whose viewpoint the process presents.
    #[serde(default)]
    pub(crate) console_player: Option<u8>,
    /// Sectors in identifier order.
    #[serde(default)]
    pub(crate) sectors: Vec<SectorSpec>,
    /// Sectors whose floor oscillates.
    #[serde(default)]
    pub(crate) lifts: Vec<LiftSpec>,
    /// Players connected before the first tick.
    #[serde(default)]
    pub(crate) players: Vec<PlayerSpec>,
    /// Shots fired during the session.
    #[serde(default)]
    pub(crate) shots: Vec<ShotSpec>,
}

/// Rectangular sector with its initial planes.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SectorSpec {
    min: [f32; 2],
    max: [f32; 2],
    floor: f32,
    ceiling: f32,
}

impl SectorSpec {
    pub(crate) fn bounds(&self) -> SectorBounds {
        SectorBounds::from_corners(Vec2::from(self.min), Vec2::from(self.max))
    }

    pub(crate) fn planes(&self) -> SectorPlanes {
        SectorPlanes::new(self.floor, self.ceiling)
    }
}

/// Floor that rises from `low` to `high` and back once every `period` ticks.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct LiftSpec {
    sector: u32,
    low: f32,
    high: f32,
    period: u64,
}

impl LiftSpec {
    pub(crate) fn sector(&self) -> SectorId {
        SectorId::new(self.sector)
    }

    /// Floor height at the given tick.
    pub(crate) fn floor_at(&self, tick: Tick) -> f32 {
        let half = self.period as f32 / 2.0;
        let phase = (tick.get() % self.period) as f32;
        let rise = if phase <= half {
            phase / half
        } else {
            (self.period as f32 - phase) / half
        };
        self.low + (self.high - self.low) * rise
    }
}

/// Player connected at start-up and walking at a constant velocity.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PlayerSpec {
    slot: u8,
    #[serde(default)]
    latency_ms: u32,
    spawn: [f32; 3],
    #[serde(default)]
    velocity: [f32; 2],
    #[serde(default = "unlagged_by_default")]
    unlagged: bool,
}

fn unlagged_by_default() -> bool {
    true
}

impl PlayerSpec {
    pub(crate) fn player(&self) -> PlayerId {
        PlayerId::new(self.slot)
    }

    pub(crate) fn latency_ms(&self) -> u32 {
        self.latency_ms
    }

    pub(crate) fn spawn(&self) -> Vec3 {
        Vec3::from(self.spawn)
    }

    /// Horizontal displacement per tick.
    pub(crate) fn velocity(&self) -> Vec2 {
        Vec2::from(self.velocity)
    }

    pub(crate) fn unlagged(&self) -> bool {
        self.unlagged
    }
}

/// Shot fired by `shooter` at where its client saw `target`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ShotSpec {
    tick: u64,
    shooter: u8,
    target: u8,
}

impl ShotSpec {
    pub(crate) fn tick(&self) -> Tick {
        Tick::new(self.tick)
    }

    pub(crate) fn shooter(&self) -> PlayerId {
        PlayerId::new(self.shooter)
    }

    pub(crate) fn target(&self) -> PlayerId {
        PlayerId::new(self.target)
    }
}

impl Scenario {
    /// Reads and validates a scenario file.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario at {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("invalid scenario at {}", path.display()))
    }

    /// Parses and validates a scenario document.
    pub(crate) fn from_toml_str(contents: &str) -> Result<Self> {
        let scenario: Self =
            toml::from_str(contents).context("failed to parse scenario toml contents")?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Tick of the last scripted shot.
    pub(crate) fn last_shot_tick(&self) -> Option<Tick> {
        self.shots.iter().map(ShotSpec::tick).max()
    }

    fn validate(&self) -> Result<()> {
        self.settings.validate().context("invalid scenario settings")?;

        for (index, sector) in self.sectors.iter().enumerate() {
            ensure!(
                sector.floor <= sector.ceiling,
                "sector {index} has its floor above its ceiling"
            );
        }

        for lift in &self.lifts {
            ensure!(
                lift.sector().index() < self.sectors.len(),
                "lift references unknown sector {}",
                lift.sector
            );
            ensure!(
                lift.period >= 2,
                "lift in sector {} needs a period of at least two ticks",
                lift.sector
            );
        }

        let mut slots = BTreeSet::new();
        for player in &self.players {
            ensure!(
                player.player().index() < MAX_PLAYERS,
                "player slot {} exceeds the {MAX_PLAYERS} available slots",
                player.slot
            );
            if !slots.insert(player.slot) {
                bail!("player slot {} is declared twice", player.slot);
            }
        }

        if let Some(console) = self.console_player {
            ensure!(slots.contains(&console), "console player {console} is not declared");
        }

        for shot in &self.shots {
            ensure!(shot.tick > 0, "shots cannot be fired before the first tick");
            ensure!(
                slots.contains(&shot.shooter) && slots.contains(&shot.target),
                "shot at tick {} references an undeclared player",
                shot.tick
            );
            ensure!(
                shot.shooter != shot.target,
                "player {} cannot shoot at itself",
                shot.shooter
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unlagged_core::NetworkRole;

    const DUEL: &str = include_str!("../scenarios/duel.toml");

    #[test]
    fn bundled_duel_parses() {
        let scenario = Scenario::from_toml_str(DUEL).expect("bundled scenario is valid");

        assert_eq!(scenario.settings.role, NetworkRole::Server);
        assert_eq!(scenario.sectors.len(), 2);
        assert_eq!(scenario.players.len(), 3);
        assert_eq!(scenario.players[1].velocity(), Vec2::new(0.0, 8.0));
        assert!(scenario.players[0].unlagged());
        assert_eq!(scenario.last_shot_tick(), Some(Tick::new(50)));
    }

    #[test]
    fn lift_floor_follows_a_triangle_wave() {
        let lift = LiftSpec {
            sector: 0,
            low: 0.0,
            high: 48.0,
            period: 70,
        };
        assert_eq!(lift.floor_at(Tick::new(0)), 0.0);
        assert_eq!(lift.floor_at(Tick::new(35)), 48.0);
        assert_eq!(lift.floor_at(Tick::new(70)), 0.0);
        assert_eq!(lift.floor_at(Tick::new(105)), 48.0);
    }

    #[test]
    fn shots_must_name_declared_players() {
        let error = Scenario::from_toml_str(
            r#"
            [[players]]
            slot = 0
            spawn = [0.0, 0.0, 0.0]

            [[shots]]
            tick = 5
            shooter = 0
            target = 3
            "#,
        )
        .expect_err("target 3 is undeclared");
        assert!(error.to_string().contains("undeclared player"), "{error}");
    }

    #[test]
    fn duplicate_slots_are_rejected() {
        let error = Scenario::from_toml_str(
            r#"
            [[players]]
            slot = 4
            spawn = [0.0, 0.0, 0.0]

            [[players]]
            slot = 4
            spawn = [8.0, 0.0, 0.0]
            "#,
        )
        .expect_err("slot 4 is declared twice");
        assert!(error.to_string().contains("declared twice"), "{error}");
    }

    #[test]
    fn zero_history_depth_fails_to_parse() {
        let result = Scenario::from_toml_str(
            r#"
            [settings.lag_compensation]
            history_depth = 0
            "#,
        );
        assert!(result.is_err());
    }
}
