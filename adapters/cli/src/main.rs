#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs headless Onslaught sessions.

mod scenario;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use onslaught_core::{Command, EntityKind, Event, Position, WaveNumber};
use onslaught_pool::{self as pool, query, Pool};
use onslaught_system_expiry::Expiry;
use onslaught_system_ledger::Ledger;
use onslaught_system_scheduling::{wave_count, wave_kind, Scheduler};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::scenario::Scenario;

/// Command-line arguments for a headless session.
#[derive(Debug, Parser)]
#[command(name = "onslaught", about = "Headless wave-spawning pool simulation")]
struct Args {
    /// Scenario file to load; the built-in scenario runs when omitted.
    #[arg(short, long)]
    scenario: Option<PathBuf>,
    /// Number of simulation ticks to run.
    #[arg(long, default_value_t = 600)]
    ticks: u32,
    /// Simulated milliseconds per tick.
    #[arg(long, default_value_t = 100)]
    dt_ms: u64,
    /// Overrides the scenario's schedule seed.
    #[arg(long)]
    seed: Option<u64>,
}

/// Entry point for the Onslaught command-line interface.
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let scenario = match &args.scenario {
        Some(path) => scenario::load_scenario(path)
            .with_context(|| format!("failed to load scenario from {}", path.display()))?,
        None => scenario::default_scenario(),
    };

    run(&args, &scenario)
}

fn run(args: &Args, scenario: &Scenario) -> anyhow::Result<()> {
    let mut pool =
        Pool::new(scenario.definitions()).context("pool configuration rejected")?;

    let mut config = scenario.schedule_config();
    if let Some(seed) = args.seed {
        config.rng_seed = seed;
    }
    let seed = config.rng_seed;
    let mut scheduler = Scheduler::new(config, query::kind_catalog(&pool))
        .context("schedule configuration rejected")?;

    let mut expiry = Expiry::new();
    let mut ledger = Ledger::new();

    let width = scenario.arena.width;
    let entry_y = scenario.arena.entry_y;
    let mut entry_points = ChaCha8Rng::seed_from_u64(seed);
    let mut position = move || Position::new(entry_points.gen_range(0.0..=width), entry_y);

    scheduler.start();
    info!(
        ticks = args.ticks,
        dt_ms = args.dt_ms,
        seed,
        kinds = scenario.kinds.len(),
        "session started"
    );

    let dt = Duration::from_millis(args.dt_ms);
    let mut announced_waves = 0;
    for _ in 0..args.ticks {
        let mut events = Vec::new();
        pool::apply(&mut pool, Command::Tick { dt }, &mut events);
        pump(
            &mut pool,
            &mut scheduler,
            &mut expiry,
            &mut ledger,
            &mut position,
            scenario,
            events,
        );
        while announced_waves < scheduler.issued_waves() {
            announced_waves += 1;
            announce_wave(&scheduler, scenario, announced_waves);
        }
    }

    for census in query::bucket_census(&pool).iter() {
        info!(
            kind = %kind_label(scenario, census.kind),
            total = census.total,
            active = census.active,
            idle = census.idle,
            "bucket census"
        );
    }
    let report = ledger.report();
    info!(
        waves = scheduler.issued_waves(),
        spawned = report.spawned,
        reused = report.spawned.saturating_sub(report.instantiated),
        instantiated = report.instantiated,
        released = report.released,
        rejected = report.rejected,
        treasury = report.treasury,
        ticks = query::tick_index(&pool),
        "session complete"
    );

    Ok(())
}

/// Feeds events through every system until no further commands are produced.
fn pump(
    pool: &mut Pool,
    scheduler: &mut Scheduler,
    expiry: &mut Expiry,
    ledger: &mut Ledger,
    position: &mut impl FnMut() -> Position,
    scenario: &Scenario,
    mut events: Vec<Event>,
) {
    loop {
        if events.is_empty() {
            break;
        }
        trace_events(scenario, &events);

        let mut commands = Vec::new();
        let catalog = query::kind_catalog(pool);
        scheduler.handle(&events, position, &mut commands);
        expiry.handle(&events, catalog, &mut commands);
        ledger.handle(&events, catalog);

        if commands.is_empty() {
            break;
        }
        events.clear();
        for command in commands {
            pool::apply(pool, command, &mut events);
        }
    }
}

fn trace_events(scenario: &Scenario, events: &[Event]) {
    for event in events {
        match event {
            Event::EntitySpawned {
                entity,
                kind,
                position,
                provenance,
            } => debug!(
                entity = entity.get(),
                kind = %kind_label(scenario, *kind),
                x = position.x(),
                y = position.y(),
                ?provenance,
                "entity spawned"
            ),
            Event::EntityReleased { entity, kind, .. } => debug!(
                entity = entity.get(),
                kind = %kind_label(scenario, *kind),
                "entity released"
            ),
            Event::SpawnRejected { kind, reason, .. } => warn!(
                kind = %kind_label(scenario, *kind),
                ?reason,
                "spawn rejected"
            ),
            Event::ReleaseRejected { entity, reason } => warn!(
                entity = entity.get(),
                ?reason,
                "release rejected"
            ),
            Event::TimeAdvanced { .. } => {}
        }
    }
}

fn announce_wave(scheduler: &Scheduler, scenario: &Scenario, ordinal: u32) {
    let wave = WaveNumber::new(ordinal);
    let label = wave_kind(scheduler.config(), wave)
        .map_or_else(|| "none".to_owned(), |kind| kind_label(scenario, kind));
    info!(
        wave = ordinal,
        kind = %label,
        count = wave_count(scheduler.config(), wave),
        in_flight = scheduler.waves_in_flight().len(),
        "wave issued"
    );
}

fn kind_label(scenario: &Scenario, kind: EntityKind) -> String {
    scenario
        .kind_name(kind)
        .map_or_else(|| format!("kind{}", kind.get()), str::to_owned)
}
