use glam::{Vec2, Vec3};
use unlagged_core::{
    ActorId, ActorState, Command, Event, HistoryDepth, LagCompensationConfig, NetworkRole,
    PlayerId, RewindWorld, SectorBounds, SectorId, SectorPlanes, ServerSettings, Tick,
};
use unlagged_system_lag_compensation::{
    reconcile, record_tick, reset_spawned_players, restore, with_reconciled,
};
use unlagged_world::{self as world, query, World};

const FLOOR: SectorId = SectorId::new(0);
const LIFT: SectorId = SectorId::new(1);

#[test]
fn rewinds_everything_but_the_attacker_to_the_perceived_tick() {
    let mut world = arena(ServerSettings::default());
    let attacker = join(&mut world, PlayerId::new(0), 200, Vec3::new(20.0, 20.0, 0.0));
    let runner = join(&mut world, PlayerId::new(1), 80, runner_position(Tick::new(0)));
    record_tick(&mut world);

    run_until(&mut world, Tick::new(1000), runner);

    let snapshot = reconcile(&mut world, attacker).expect("server with compensation enabled");

    // 200ms at 35Hz is seven ticks; slot 993 mod 64 = 33
    assert_eq!(snapshot.target_tick(), Tick::new(993));
    assert_eq!(snapshot.attacker(), attacker);
    assert!(snapshot.rewound());
    assert_eq!(position(&world, runner), runner_position(Tick::new(993)));
    assert_eq!(planes(&world, LIFT), lift_planes(Tick::new(993)));
    assert_eq!(position(&world, attacker), Vec3::new(20.0, 20.0, 0.0));

    restore(&mut world, snapshot);

    assert_eq!(position(&world, runner), runner_position(Tick::new(1000)));
    assert_eq!(planes(&world, LIFT), lift_planes(Tick::new(1000)));
}

#[test]
fn restore_is_bit_identical_after_rewind() {
    let mut world = arena(ServerSettings::default());
    let attacker = join(&mut world, PlayerId::new(0), 120, Vec3::new(300.0, 20.0, 0.0));
    let runner = join(&mut world, PlayerId::new(3), 40, runner_position(Tick::new(0)));
    record_tick(&mut world);
    run_until(&mut world, Tick::new(140), runner);

    let before = fingerprint(&world);
    let snapshot = reconcile(&mut world, attacker).expect("gate passes");
    assert_ne!(fingerprint(&world), before, "something must have been rewound");
    restore(&mut world, snapshot);

    assert_eq!(fingerprint(&world), before);
}

#[test]
fn same_tick_target_leaves_live_state_untouched() {
    let mut world = arena(ServerSettings::default());
    // 20ms at 35Hz rounds down to zero ticks
    let attacker = join(&mut world, PlayerId::new(0), 20, Vec3::new(20.0, 20.0, 0.0));
    let runner = join(&mut world, PlayerId::new(1), 0, runner_position(Tick::new(0)));
    record_tick(&mut world);
    run_until(&mut world, Tick::new(30), runner);

    let before = fingerprint(&world);
    let snapshot = reconcile(&mut world, attacker).expect("gate passes");

    assert!(!snapshot.rewound());
    assert_eq!(snapshot.target_tick(), Tick::new(30));
    assert_eq!(snapshot.sector_count(), 2);
    assert_eq!(snapshot.player_count(), 2);
    assert_eq!(fingerprint(&world), before);

    restore(&mut world, snapshot);
    assert_eq!(fingerprint(&world), before);
}

#[test]
fn attacker_resting_on_a_rising_lift_drops_to_the_rewound_floor() {
    let mut world = arena(ServerSettings::default());
    let attacker = join(&mut world, PlayerId::new(0), 200, Vec3::new(300.0, 20.0, 0.0));
    record_tick(&mut world);
    run_lift_until(&mut world, Tick::new(20));

    let live = actor(&world, attacker);
    assert_eq!(live.position.z, 20.0, "lift carries the resting attacker");

    let snapshot = reconcile(&mut world, attacker).expect("gate passes");
    let rewound = actor(&world, attacker);
    assert_eq!(rewound.floor_z, 13.0);
    assert_eq!(rewound.position.z, 13.0);
    assert_eq!(rewound.position.truncate(), live.position.truncate());

    restore(&mut world, snapshot);
    assert_eq!(actor(&world, attacker), live);
}

#[test]
fn falling_attacker_is_not_pulled_down() {
    let mut world = arena(ServerSettings::default());
    let attacker = join(&mut world, PlayerId::new(0), 200, Vec3::new(300.0, 20.0, 0.0));
    record_tick(&mut world);
    run_lift_until(&mut world, Tick::new(20));
    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::MoveActor {
            actor: attacker,
            position: Vec3::new(300.0, 20.0, 20.0),
            momz: -4.0,
        },
        &mut events,
    );

    let snapshot = reconcile(&mut world, attacker).expect("gate passes");
    assert_eq!(actor(&world, attacker).position.z, 20.0);
    restore(&mut world, snapshot);
}

#[test]
fn attacker_is_pushed_out_of_a_rewound_ceiling() {
    let mut world = arena(ServerSettings::default());
    let attacker = join(&mut world, PlayerId::new(0), 200, Vec3::new(300.0, 20.0, 0.0));
    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::MoveActor {
            actor: attacker,
            position: Vec3::new(300.0, 20.0, 50.0),
            momz: 0.0,
        },
        &mut events,
    );
    record_tick(&mut world);

    for _ in 0..20 {
        world::apply(&mut world, Command::Tick, &mut events);
        let ceiling = if world.current_tick() <= Tick::new(13) {
            80.0
        } else {
            128.0
        };
        world::apply(
            &mut world,
            Command::MovePlanes {
                sector: LIFT,
                planes: SectorPlanes::new(0.0, ceiling),
            },
            &mut events,
        );
        record_tick(&mut world);
    }

    let snapshot = reconcile(&mut world, attacker).expect("gate passes");
    let rewound = actor(&world, attacker);
    assert_eq!(rewound.ceiling_z, 80.0);
    assert_eq!(rewound.position.z, 80.0 - rewound.height);

    restore(&mut world, snapshot);
    assert_eq!(actor(&world, attacker).position.z, 50.0);
    assert_eq!(actor(&world, attacker).ceiling_z, 128.0);
}

#[test]
fn attacker_is_lifted_onto_a_higher_rewound_floor() {
    let mut world = arena(ServerSettings::default());
    let attacker = join(&mut world, PlayerId::new(0), 200, Vec3::new(300.0, 20.0, 0.0));
    record_tick(&mut world);

    let mut events = Vec::new();
    for _ in 0..20 {
        world::apply(&mut world, Command::Tick, &mut events);
        let floor = if world.current_tick() <= Tick::new(13) {
            40.0
        } else {
            0.0
        };
        world::apply(
            &mut world,
            Command::MovePlanes {
                sector: LIFT,
                planes: SectorPlanes::new(floor, 128.0),
            },
            &mut events,
        );
        record_tick(&mut world);
    }

    let live = actor(&world, attacker);
    assert_eq!(live.position.z, 0.0, "lowered floor carries the attacker down");

    let before = fingerprint(&world);
    let snapshot = reconcile(&mut world, attacker).expect("gate passes");
    let rewound = actor(&world, attacker);
    assert_eq!(rewound.floor_z, 40.0);
    assert_eq!(rewound.position.z, 40.0);
    assert_eq!(rewound.position.truncate(), live.position.truncate());

    restore(&mut world, snapshot);
    assert_eq!(actor(&world, attacker), live);
    assert_eq!(fingerprint(&world), before);
}

#[test]
fn spectators_are_neither_recorded_nor_rewound() {
    let mut world = arena(ServerSettings::default());
    let attacker = join(&mut world, PlayerId::new(0), 300, Vec3::new(20.0, 20.0, 0.0));
    let watcher = join(&mut world, PlayerId::new(4), 0, Vec3::new(40.0, 40.0, 0.0));
    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::SetSpectating {
            player: PlayerId::new(4),
            spectating: true,
        },
        &mut events,
    );
    record_tick(&mut world);
    run_until(&mut world, Tick::new(50), watcher);

    // only the spawn reset ever wrote this history
    let history = world
        .player_history(PlayerId::new(4))
        .expect("connected players own a history");
    assert!(history
        .slots()
        .iter()
        .all(|slot| *slot == Vec3::new(40.0, 40.0, 0.0)));

    let live = position(&world, watcher);
    let snapshot = reconcile(&mut world, attacker).expect("gate passes");
    assert_eq!(snapshot.player_count(), 1);
    assert_eq!(position(&world, watcher), live);
    restore(&mut world, snapshot);
}

#[test]
fn respawned_player_is_never_rewound_to_pre_respawn_coordinates() {
    let mut world = arena(ServerSettings::default());
    let attacker = join(&mut world, PlayerId::new(0), 1500, Vec3::new(20.0, 20.0, 0.0));
    let victim = join(&mut world, PlayerId::new(1), 0, runner_position(Tick::new(0)));
    record_tick(&mut world);
    run_until(&mut world, Tick::new(200), victim);

    let spawn_point = Vec3::new(200.0, 200.0, 0.0);
    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::SpawnPlayer {
            player: PlayerId::new(1),
            position: spawn_point,
        },
        &mut events,
    );
    reset_spawned_players(&mut world, &events);

    for latency_ms in [0, 100, 400, 1500, 9000] {
        let mut events = Vec::new();
        world::apply(
            &mut world,
            Command::SetLatency {
                player: PlayerId::new(0),
                latency_ms,
            },
            &mut events,
        );
        let seen = with_reconciled(&mut world, attacker, |world| position(world, victim));
        assert_eq!(seen, spawn_point, "latency {latency_ms}ms");
    }
}

#[test]
fn rejoining_spectator_is_never_rewound_to_pre_spectating_coordinates() {
    let mut world = arena(ServerSettings::default());
    let attacker = join(&mut world, PlayerId::new(0), 200, Vec3::new(20.0, 20.0, 0.0));
    let returning = join(&mut world, PlayerId::new(1), 0, Vec3::new(100.0, 100.0, 0.0));
    record_tick(&mut world);
    run_until(&mut world, Tick::new(10), attacker);

    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::SetSpectating {
            player: PlayerId::new(1),
            spectating: true,
        },
        &mut events,
    );
    // wanders off while nothing records it
    let wandered = Vec3::new(200.0, 200.0, 0.0);
    world::apply(
        &mut world,
        Command::MoveActor {
            actor: returning,
            position: wandered,
            momz: 0.0,
        },
        &mut events,
    );
    run_until(&mut world, Tick::new(100), attacker);

    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::SetSpectating {
            player: PlayerId::new(1),
            spectating: false,
        },
        &mut events,
    );
    reset_spawned_players(&mut world, &events);

    let snapshot = reconcile(&mut world, attacker).expect("gate passes");
    assert!(snapshot.rewound());
    assert_eq!(snapshot.target_tick(), Tick::new(93));
    assert_eq!(position(&world, returning), wandered);
    restore(&mut world, snapshot);
    assert_eq!(position(&world, returning), wandered);
}

#[test]
fn gated_roles_leave_history_and_state_alone() {
    for role in [
        NetworkRole::Single,
        NetworkRole::SingleMultiplayer,
        NetworkRole::Client,
        NetworkRole::DemoPlayback,
    ] {
        let mut world = arena(ServerSettings {
            role,
            ..ServerSettings::default()
        });
        let attacker = join(&mut world, PlayerId::new(0), 500, Vec3::new(20.0, 20.0, 0.0));
        let runner = join(&mut world, PlayerId::new(1), 0, runner_position(Tick::new(0)));
        run_until(&mut world, Tick::new(40), runner);

        let history = world.player_history(PlayerId::new(1)).expect("connected");
        assert!(history.slots().iter().all(|slot| *slot == Vec3::ZERO), "{role:?}");

        let before = fingerprint(&world);
        assert!(reconcile(&mut world, attacker).is_none(), "{role:?}");
        assert_eq!(fingerprint(&world), before, "{role:?}");
    }
}

#[test]
fn disabled_compensation_is_a_no_op() {
    let mut world = arena(ServerSettings {
        lag_compensation: LagCompensationConfig {
            enabled: false,
            history_depth: HistoryDepth::DEFAULT,
        },
        ..ServerSettings::default()
    });
    let attacker = join(&mut world, PlayerId::new(0), 500, Vec3::new(20.0, 20.0, 0.0));
    let runner = join(&mut world, PlayerId::new(1), 0, runner_position(Tick::new(0)));
    run_until(&mut world, Tick::new(40), runner);

    let seen = with_reconciled(&mut world, attacker, |world| position(world, runner));
    assert_eq!(seen, runner_position(Tick::new(40)));
}

#[test]
fn non_player_attackers_are_ignored() {
    let mut world = arena(ServerSettings::default());
    let runner = join(&mut world, PlayerId::new(1), 0, runner_position(Tick::new(0)));
    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::SpawnActor {
            position: Vec3::new(50.0, 50.0, 0.0),
        },
        &mut events,
    );
    let turret = query::props(&world)[0];
    run_until(&mut world, Tick::new(40), runner);

    assert!(reconcile(&mut world, turret).is_none());
}

fn arena(settings: ServerSettings) -> World {
    let mut world = World::new(settings);
    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::AddSector {
            bounds: SectorBounds::from_corners(Vec2::new(0.0, 0.0), Vec2::new(256.0, 256.0)),
            planes: SectorPlanes::new(0.0, 256.0),
        },
        &mut events,
    );
    world::apply(
        &mut world,
        Command::AddSector {
            bounds: SectorBounds::from_corners(Vec2::new(257.0, 0.0), Vec2::new(512.0, 256.0)),
            planes: SectorPlanes::new(0.0, 128.0),
        },
        &mut events,
    );
    assert!(
        events
            .iter()
            .all(|event| matches!(event, Event::SectorAdded { .. })),
        "unexpected events: {events:?}"
    );
    world
}

fn join(world: &mut World, player: PlayerId, latency_ms: u32, position: Vec3) -> ActorId {
    let mut events = Vec::new();
    world::apply(
        world,
        Command::ConnectPlayer {
            player,
            latency_ms,
            unlagged: true,
        },
        &mut events,
    );
    world::apply(world, Command::SpawnPlayer { player, position }, &mut events);
    reset_spawned_players(world, &events);
    world.player_actor(player).expect("spawned player owns an actor")
}

fn runner_position(tick: Tick) -> Vec3 {
    Vec3::new(10.0 + (tick.get() % 200) as f32, 100.0, 0.0)
}

fn lift_planes(tick: Tick) -> SectorPlanes {
    SectorPlanes::new((tick.get() % 50) as f32, 128.0)
}

/// Ticks until `end`, moving `runner` and the lift, and records every tick.
fn run_until(world: &mut World, end: Tick, runner: ActorId) {
    let mut events = Vec::new();
    while world.current_tick() < end {
        world::apply(world, Command::Tick, &mut events);
        let tick = world.current_tick();
        world::apply(
            world,
            Command::MoveActor {
                actor: runner,
                position: runner_position(tick),
                momz: 0.0,
            },
            &mut events,
        );
        world::apply(
            world,
            Command::MovePlanes {
                sector: LIFT,
                planes: lift_planes(tick),
            },
            &mut events,
        );
        record_tick(world);
    }
}

/// Raises the lift floor by one unit per tick until `end`.
fn run_lift_until(world: &mut World, end: Tick) {
    let mut events = Vec::new();
    while world.current_tick() < end {
        world::apply(world, Command::Tick, &mut events);
        let floor = world.current_tick().get() as f32;
        world::apply(
            world,
            Command::MovePlanes {
                sector: LIFT,
                planes: SectorPlanes::new(floor, 128.0),
            },
            &mut events,
        );
        record_tick(world);
    }
}

fn actor(world: &World, actor: ActorId) -> ActorState {
    query::actor(world, actor).expect("actor exists")
}

fn position(world: &World, id: ActorId) -> Vec3 {
    actor(world, id).position
}

fn planes(world: &World, sector: SectorId) -> SectorPlanes {
    query::sector(world, sector).expect("sector exists").planes
}

/// Bit patterns of every sector plane and every player actor field.
fn fingerprint(world: &World) -> Vec<u32> {
    let mut bits = Vec::new();
    for sector in query::sectors(world) {
        bits.extend([sector.planes.floor.to_bits(), sector.planes.ceiling.to_bits()]);
    }
    for player in query::players(world) {
        let Some(state) = player.actor.and_then(|id| query::actor(world, id)) else {
            continue;
        };
        bits.extend(state.position.to_array().map(f32::to_bits));
        bits.extend([
            state.floor_z.to_bits(),
            state.ceiling_z.to_bits(),
            state.momz.to_bits(),
        ]);
    }
    bits
}
