#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that replays a scripted session on the authoritative
//! server and reports how every hit-scan shot was resolved.

mod scenario;
mod simulation;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::info;
use unlagged_core::{NetworkRole, Tick};

use crate::{scenario::Scenario, simulation::Simulation};

/// Command-line arguments accepted by the `unlagged` binary.
#[derive(Debug, Parser)]
#[command(
    name = "unlagged",
    about = "Replays a scripted session and reports lag-compensated hit-scan shots",
    version
)]
struct Cli {
    /// Scenario file describing sectors, lifts, players and shots.
    #[arg(long)]
    scenario: PathBuf,

    /// Number of ticks to simulate; defaults to the tick of the last shot.
    #[arg(long)]
    ticks: Option<u64>,

    /// Overrides the network role declared by the scenario.
    #[arg(long, value_enum)]
    role: Option<RoleArg>,

    /// Turns lag compensation off regardless of the scenario settings.
    #[arg(long)]
    disable_lag_compensation: bool,
}

/// Network roles selectable from the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum RoleArg {
    Single,
    SingleMultiplayer,
    Client,
    DemoPlayback,
    Server,
}

impl From<RoleArg> for NetworkRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Single => Self::Single,
            RoleArg::SingleMultiplayer => Self::SingleMultiplayer,
            RoleArg::Client => Self::Client,
            RoleArg::DemoPlayback => Self::DemoPlayback,
            RoleArg::Server => Self::Server,
        }
    }
}

/// Entry point for the unlagged command-line interface.
fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut scenario = Scenario::load(&cli.scenario)?;
    if let Some(role) = cli.role {
        scenario.settings.role = role.into();
    }
    if cli.disable_lag_compensation {
        scenario.settings.lag_compensation.enabled = false;
    }

    let end = cli
        .ticks
        .map(Tick::new)
        .or_else(|| scenario.last_shot_tick())
        .unwrap_or_else(|| Tick::new(u64::from(scenario.settings.tic_rate)));

    let mut simulation = Simulation::new(&scenario)?;
    let reports = simulation.run(end);
    for report in &reports {
        println!("{report}");
    }

    info!(
        "simulated {} ticks as {:?}: {} shots, {} hits",
        end.get(),
        scenario.settings.role,
        reports.len(),
        reports.iter().filter(|report| report.is_hit()).count()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_flag_uses_kebab_case_names() {
        let cli = Cli::try_parse_from([
            "unlagged",
            "--scenario",
            "duel.toml",
            "--role",
            "demo-playback",
            "--disable-lag-compensation",
        ])
        .expect("arguments parse");

        assert_eq!(cli.role.map(NetworkRole::from), Some(NetworkRole::DemoPlayback));
        assert!(cli.disable_lag_compensation);
        assert_eq!(cli.ticks, None);
    }

    #[test]
    fn scenario_is_required() {
        assert!(Cli::try_parse_from(["unlagged", "--ticks", "10"]).is_err());
    }
}
