#![allow(clippy::missing_errors_doc)]

use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use onslaught_core::{EntityKind, KindDefinition, Prototype};
use onslaught_system_scheduling::{RampCurve, ScheduleConfig};
use serde::{Deserialize, Serialize};

const SUPPORTED_SCENARIO_VERSION: u32 = 1;

/// Scenario file contents describing the pool catalog and wave schedule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct Scenario {
    /// Schema version guarding against stale scenario files.
    pub version: u32,
    /// Geometry of the line spawned entities enter along.
    pub arena: ArenaSection,
    /// Wave schedule tuning.
    pub schedule: ScheduleSection,
    /// Pool bucket registrations, one per entity kind.
    pub kinds: Vec<KindSection>,
}

/// Spawn-line geometry used to place entities as they are handed out.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct ArenaSection {
    /// Width of the spawn line entities appear along.
    pub width: f32,
    /// Vertical coordinate of the spawn line.
    pub entry_y: f32,
}

/// Wave schedule tuning with durations expressed in milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct ScheduleSection {
    /// Kind identifiers the schedule rotates through, one per wave.
    pub kind_rotation: Vec<u32>,
    /// Delay before the first wave, in milliseconds.
    pub before_first_wave_ms: u64,
    /// Delay between consecutive wave issuances, in milliseconds.
    pub between_waves_ms: u64,
    /// Wave size at the beginning of the ramp.
    pub min_count: u32,
    /// Wave size reached when the ramp completes.
    pub max_count: u32,
    /// Number of waves the ramp spans.
    pub ramp_length: u32,
    /// Curve shaping wave-size growth across the ramp.
    pub ramp: RampCurve,
    /// Entities added per wave once the ramp has completed.
    pub post_ramp_increment: u32,
    /// Shortest gap between spawns within a wave, in milliseconds.
    pub min_spawn_gap_ms: u64,
    /// Longest gap between spawns within a wave, in milliseconds.
    pub max_spawn_gap_ms: u64,
    /// Seed every per-wave random stream derives from.
    pub rng_seed: u64,
}

/// One pool bucket registration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct KindSection {
    /// Numeric kind identifier referenced by the schedule rotation.
    pub id: u32,
    /// Human-readable name used in session logs.
    pub name: String,
    /// Hit points granted at activation.
    pub health: u32,
    /// Movement rate granted at activation.
    pub speed: f32,
    /// Simulated lifetime before expiry releases the entity, in milliseconds.
    pub lifespan_ms: u64,
    /// Currency awarded when an entity of this kind is released.
    pub bounty: u32,
    /// Idle entities instantiated when the pool is constructed.
    pub prewarm: u32,
}

impl Scenario {
    /// Pool registrations derived from the kind sections, in file order.
    pub(crate) fn definitions(&self) -> Vec<KindDefinition> {
        self.kinds
            .iter()
            .map(|kind| {
                KindDefinition::new(
                    EntityKind::new(kind.id),
                    Prototype::new(
                        kind.health,
                        kind.speed,
                        Duration::from_millis(kind.lifespan_ms),
                        kind.bounty,
                    ),
                    kind.prewarm,
                )
            })
            .collect()
    }

    /// Schedule configuration with millisecond fields widened to durations.
    pub(crate) fn schedule_config(&self) -> ScheduleConfig {
        let schedule = &self.schedule;
        ScheduleConfig {
            kinds: schedule
                .kind_rotation
                .iter()
                .copied()
                .map(EntityKind::new)
                .collect(),
            before_first_wave: Duration::from_millis(schedule.before_first_wave_ms),
            between_waves: Duration::from_millis(schedule.between_waves_ms),
            min_count: schedule.min_count,
            max_count: schedule.max_count,
            ramp_length: schedule.ramp_length,
            ramp: schedule.ramp.clone(),
            post_ramp_increment: schedule.post_ramp_increment,
            min_spawn_gap: Duration::from_millis(schedule.min_spawn_gap_ms),
            max_spawn_gap: Duration::from_millis(schedule.max_spawn_gap_ms),
            rng_seed: schedule.rng_seed,
        }
    }

    /// Display name registered for the provided kind, if any.
    pub(crate) fn kind_name(&self, kind: EntityKind) -> Option<&str> {
        self.kinds
            .iter()
            .find(|section| section.id == kind.get())
            .map(|section| section.name.as_str())
    }
}

/// Reads and parses a scenario file from disk.
pub(crate) fn load_scenario(path: &Path) -> Result<Scenario> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario file at {}", path.display()))?;
    parse_scenario(&contents)
}

/// Parses scenario file contents, rejecting unsupported schema versions.
pub(crate) fn parse_scenario(contents: &str) -> Result<Scenario> {
    let scenario: Scenario =
        toml::from_str(contents).context("failed to parse scenario toml contents")?;
    if scenario.version != SUPPORTED_SCENARIO_VERSION {
        bail!(
            "unsupported scenario version {}; expected {}",
            scenario.version,
            SUPPORTED_SCENARIO_VERSION
        );
    }
    Ok(scenario)
}

/// Built-in scenario used when no file is provided on the command line.
pub(crate) fn default_scenario() -> Scenario {
    Scenario {
        version: SUPPORTED_SCENARIO_VERSION,
        arena: ArenaSection {
            width: 24.0,
            entry_y: 0.0,
        },
        schedule: ScheduleSection {
            kind_rotation: vec![0, 0, 1],
            before_first_wave_ms: 2_000,
            between_waves_ms: 8_000,
            min_count: 4,
            max_count: 18,
            ramp_length: 8,
            ramp: RampCurve::SmoothStep,
            post_ramp_increment: 2,
            min_spawn_gap_ms: 250,
            max_spawn_gap_ms: 750,
            rng_seed: 0,
        },
        kinds: vec![
            KindSection {
                id: 0,
                name: "raider".to_owned(),
                health: 3,
                speed: 1.25,
                lifespan_ms: 6_000,
                bounty: 10,
                prewarm: 8,
            },
            KindSection {
                id: 1,
                name: "brute".to_owned(),
                health: 12,
                speed: 0.7,
                lifespan_ms: 9_000,
                bounty: 25,
                prewarm: 2,
            },
        ],
    }
}
