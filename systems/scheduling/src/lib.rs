#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic wave scheduling system responsible for emitting spawn
//! commands.
//!
//! The scheduler runs two layers of cooperative timers. A single wave timer
//! counts down the delay before the first wave and then re-arms itself with
//! the inter-wave delay, issuing wave after wave without ever waiting for
//! spawn work to finish. Each issued wave adds an independent spawn task that
//! emits its first spawn at issuance and the rest separated by randomized
//! gaps, so a slow wave keeps spawning while its successors are already under
//! way. All randomness flows from per-wave streams derived from the
//! configured seed, which keeps replays with equal seeds identical.

use std::time::Duration;

use onslaught_core::{
    Command, ConfigurationError, EntityKind, Event, KindCatalogView, Position, WaveNumber,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Configuration parameters required to construct the scheduler.
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduleConfig {
    /// Kinds the scheduler rotates through, one kind per wave in order.
    pub kinds: Vec<EntityKind>,
    /// Delay between starting the scheduler and issuing the first wave.
    pub before_first_wave: Duration,
    /// Delay between one wave's issuance and the next wave's issuance.
    pub between_waves: Duration,
    /// Wave size at the beginning of the ramp.
    pub min_count: u32,
    /// Wave size reached when the ramp completes.
    pub max_count: u32,
    /// Number of waves the ramp spans before linear growth takes over.
    pub ramp_length: u32,
    /// Curve shaping how wave sizes progress across the ramp.
    pub ramp: RampCurve,
    /// Entities added per wave once the ramp has completed.
    pub post_ramp_increment: u32,
    /// Shortest randomized gap between consecutive spawns within a wave.
    pub min_spawn_gap: Duration,
    /// Longest randomized gap between consecutive spawns within a wave.
    pub max_spawn_gap: Duration,
    /// Seed from which every per-wave random stream is derived.
    pub rng_seed: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            kinds: vec![EntityKind::new(0)],
            before_first_wave: Duration::from_secs(3),
            between_waves: Duration::from_secs(10),
            min_count: 4,
            max_count: 24,
            ramp_length: 12,
            ramp: RampCurve::SmoothStep,
            post_ramp_increment: 2,
            min_spawn_gap: Duration::from_millis(300),
            max_spawn_gap: Duration::from_millis(900),
            rng_seed: 0,
        }
    }
}

/// Shaping curve applied to ramp progress when computing wave sizes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RampCurve {
    /// Wave sizes grow proportionally to ramp progress.
    Linear,
    /// Growth eases in and out around the middle of the ramp.
    SmoothStep,
    /// Growth starts slow and accelerates toward the end of the ramp.
    EaseIn,
    /// Growth starts fast and levels off toward the end of the ramp.
    EaseOut,
    /// Growth follows straight segments between explicit keys.
    Polyline(Vec<CurveKey>),
}

impl RampCurve {
    /// Checks the structural requirements polyline curves must satisfy.
    ///
    /// # Errors
    ///
    /// Polyline curves need at least two keys, every key must lie within the
    /// unit square, and key times must strictly increase.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let Self::Polyline(keys) = self else {
            return Ok(());
        };

        if keys.len() < 2 {
            return Err(ConfigurationError::CurveWithoutKeys);
        }

        for (index, key) in keys.iter().enumerate() {
            let in_unit_square =
                (0.0..=1.0).contains(&key.time) && (0.0..=1.0).contains(&key.value);
            if !in_unit_square {
                return Err(ConfigurationError::CurveKeyOutOfRange { index });
            }
            if index > 0 && key.time <= keys[index - 1].time {
                return Err(ConfigurationError::CurveKeysNotIncreasing { index });
            }
        }

        Ok(())
    }

    /// Samples the curve at the provided progress through the ramp.
    ///
    /// Progress outside `[0, 1]` is clamped. Polyline curves hold their first
    /// value before the first key and their last value after the last key.
    #[must_use]
    pub fn evaluate(&self, progress: f64) -> f64 {
        let t = progress.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::SmoothStep => t * t * (3.0 - 2.0 * t),
            Self::EaseIn => t * t,
            Self::EaseOut => t * (2.0 - t),
            Self::Polyline(keys) => evaluate_polyline(keys, t),
        }
    }
}

/// One key of a polyline ramp curve, in unit-square coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurveKey {
    /// Ramp progress at which the key applies, in `[0, 1]`.
    pub time: f32,
    /// Curve value at the key, in `[0, 1]`.
    pub value: f32,
}

fn evaluate_polyline(keys: &[CurveKey], t: f64) -> f64 {
    let Some(first) = keys.first() else {
        return 0.0;
    };
    if t <= f64::from(first.time) {
        return f64::from(first.value);
    }

    for pair in keys.windows(2) {
        let (left, right) = (pair[0], pair[1]);
        let right_time = f64::from(right.time);
        if t <= right_time {
            let left_time = f64::from(left.time);
            let span = right_time - left_time;
            if span <= f64::EPSILON {
                return f64::from(right.value);
            }
            let alpha = (t - left_time) / span;
            let left_value = f64::from(left.value);
            return left_value + (f64::from(right.value) - left_value) * alpha;
        }
    }

    keys.last().map_or(0.0, |key| f64::from(key.value))
}

/// Computes the number of entities issued for the provided wave.
///
/// Waves inside the ramp interpolate between the configured minimum and
/// maximum counts along the shaping curve. Waves past the ramp grow linearly
/// from the maximum by the post-ramp increment, saturating at `u32::MAX`.
#[must_use]
pub fn wave_count(config: &ScheduleConfig, wave: WaveNumber) -> u32 {
    let ordinal = wave.get();
    if ordinal > config.ramp_length {
        let waves_past_ramp = ordinal - config.ramp_length;
        return config
            .max_count
            .saturating_add(config.post_ramp_increment.saturating_mul(waves_past_ramp));
    }

    let progress = if config.ramp_length == 0 {
        1.0
    } else {
        f64::from(ordinal) / f64::from(config.ramp_length)
    };
    let shaped = config.ramp.evaluate(progress);
    let span = f64::from(config.max_count) - f64::from(config.min_count);
    let target = (f64::from(config.min_count) + span * shaped).round();
    let clamped = target.max(0.0).min(f64::from(u32::MAX));
    clamped as u32
}

/// Selects the kind issued for the provided wave from the rotation.
///
/// Returns `None` when the rotation is empty; scheduler construction rejects
/// that configuration up front.
#[must_use]
pub fn wave_kind(config: &ScheduleConfig, wave: WaveNumber) -> Option<EntityKind> {
    if config.kinds.is_empty() {
        return None;
    }
    let index = wave.get().saturating_sub(1) as usize % config.kinds.len();
    Some(config.kinds[index])
}

/// Lifecycle phases a scheduler moves through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    /// Constructed but not yet started; no time is consumed.
    Idle,
    /// Issuing waves and running spawn tasks.
    Running,
    /// Terminally stopped; starting again has no effect.
    Cancelled,
}

/// Pure system that deterministically emits spawn commands wave by wave.
#[derive(Debug)]
pub struct Scheduler {
    config: ScheduleConfig,
    lifecycle: Lifecycle,
    wave_timer: Option<WaveTimer>,
    spawn_tasks: Vec<SpawnTask>,
    issued_waves: u32,
}

#[derive(Debug)]
struct WaveTimer {
    next_wave: WaveNumber,
    remaining: Duration,
}

#[derive(Debug)]
struct SpawnTask {
    wave: WaveNumber,
    kind: EntityKind,
    remaining_spawns: u32,
    until_next_spawn: Duration,
    rng: ChaCha8Rng,
}

impl Scheduler {
    /// Creates a scheduler after validating the configuration against the
    /// pool's kind catalog.
    ///
    /// # Errors
    ///
    /// Rejects empty kind rotations, kinds absent from the catalog, a zero
    /// ramp length, inverted count or gap ranges, a zero inter-wave delay,
    /// and malformed polyline curves.
    pub fn new(
        config: ScheduleConfig,
        catalog: KindCatalogView<'_>,
    ) -> Result<Self, ConfigurationError> {
        if config.kinds.is_empty() {
            return Err(ConfigurationError::EmptyKindRotation);
        }
        for kind in &config.kinds {
            if !catalog.contains(*kind) {
                return Err(ConfigurationError::UnknownKind { kind: *kind });
            }
        }
        if config.ramp_length == 0 {
            return Err(ConfigurationError::ZeroRampLength);
        }
        if config.min_count > config.max_count {
            return Err(ConfigurationError::CountRange {
                min: config.min_count,
                max: config.max_count,
            });
        }
        if config.min_spawn_gap > config.max_spawn_gap {
            return Err(ConfigurationError::GapRange {
                min: config.min_spawn_gap,
                max: config.max_spawn_gap,
            });
        }
        if config.between_waves.is_zero() {
            return Err(ConfigurationError::ZeroWaveGap);
        }
        config.ramp.validate()?;

        Ok(Self {
            config,
            lifecycle: Lifecycle::Idle,
            wave_timer: None,
            spawn_tasks: Vec::new(),
            issued_waves: 0,
        })
    }

    /// Arms the first-wave delay and begins consuming time.
    ///
    /// Starting is a no-op unless the scheduler is idle; in particular a
    /// cancelled scheduler stays cancelled.
    pub fn start(&mut self) {
        if self.lifecycle != Lifecycle::Idle {
            return;
        }
        self.lifecycle = Lifecycle::Running;
        self.wave_timer = Some(WaveTimer {
            next_wave: WaveNumber::new(1),
            remaining: self.config.before_first_wave,
        });
    }

    /// Terminally stops wave issuance and abandons all spawn work in flight.
    pub fn cancel(&mut self) {
        self.lifecycle = Lifecycle::Cancelled;
        self.wave_timer = None;
        self.spawn_tasks.clear();
    }

    /// Consumes events to advance every timer, emitting spawn commands.
    ///
    /// The `position` callback supplies the coordinate for each emitted
    /// spawn, in emission order.
    pub fn handle(
        &mut self,
        events: &[Event],
        position: &mut impl FnMut() -> Position,
        out: &mut Vec<Command>,
    ) {
        if self.lifecycle != Lifecycle::Running {
            return;
        }

        let mut accumulated = Duration::ZERO;
        for event in events {
            if let Event::TimeAdvanced { dt } = event {
                accumulated = accumulated.saturating_add(*dt);
            }
        }

        if accumulated.is_zero() {
            return;
        }

        self.advance(accumulated, position, out);
    }

    /// Current lifecycle phase of the scheduler.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Configuration the scheduler was constructed with.
    #[must_use]
    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    /// Number of waves issued since the scheduler started.
    #[must_use]
    pub fn issued_waves(&self) -> u32 {
        self.issued_waves
    }

    /// Wave the timer will issue next, while the scheduler is running.
    #[must_use]
    pub fn next_wave(&self) -> Option<WaveNumber> {
        self.wave_timer.as_ref().map(|timer| timer.next_wave)
    }

    /// Waves whose spawn work is still in flight, oldest first.
    #[must_use]
    pub fn waves_in_flight(&self) -> Vec<WaveNumber> {
        self.spawn_tasks.iter().map(|task| task.wave).collect()
    }

    /// Spawn commands not yet emitted across every wave in flight.
    #[must_use]
    pub fn pending_spawns(&self) -> u32 {
        self.spawn_tasks
            .iter()
            .map(|task| task.remaining_spawns)
            .fold(0, u32::saturating_add)
    }

    // Advances all timers by repeatedly stepping to the nearest deadline, so
    // leftover time within one tick flows into work scheduled behind it.
    fn advance(
        &mut self,
        dt: Duration,
        position: &mut impl FnMut() -> Position,
        out: &mut Vec<Command>,
    ) {
        let mut budget = dt;
        loop {
            let Some(step) = self.nearest_deadline() else {
                return;
            };
            if step > budget {
                self.consume(budget);
                return;
            }
            self.consume(step);
            budget -= step;
            self.fire_due(position, out);
        }
    }

    fn nearest_deadline(&self) -> Option<Duration> {
        let timer = self.wave_timer.as_ref().map(|timer| timer.remaining);
        let task = self
            .spawn_tasks
            .iter()
            .map(|task| task.until_next_spawn)
            .min();
        match (timer, task) {
            (Some(timer), Some(task)) => Some(timer.min(task)),
            (Some(timer), None) => Some(timer),
            (None, Some(task)) => Some(task),
            (None, None) => None,
        }
    }

    fn consume(&mut self, step: Duration) {
        if let Some(timer) = self.wave_timer.as_mut() {
            timer.remaining = timer.remaining.saturating_sub(step);
        }
        for task in &mut self.spawn_tasks {
            task.until_next_spawn = task.until_next_spawn.saturating_sub(step);
        }
    }

    fn fire_due(&mut self, position: &mut impl FnMut() -> Position, out: &mut Vec<Command>) {
        let due_wave = match self.wave_timer.as_mut() {
            Some(timer) if timer.remaining.is_zero() => {
                let wave = timer.next_wave;
                timer.next_wave = WaveNumber::new(wave.get().saturating_add(1));
                timer.remaining = self.config.between_waves;
                Some(wave)
            }
            _ => None,
        };
        if let Some(wave) = due_wave {
            self.issued_waves = self.issued_waves.saturating_add(1);
            self.push_spawn_task(wave);
        }

        for task in &mut self.spawn_tasks {
            if task.until_next_spawn.is_zero() && task.remaining_spawns > 0 {
                out.push(Command::Spawn {
                    kind: task.kind,
                    position: position(),
                });
                task.remaining_spawns -= 1;
                if task.remaining_spawns > 0 {
                    task.until_next_spawn = sample_gap(&self.config, &mut task.rng);
                }
            }
        }
        self.spawn_tasks.retain(|task| task.remaining_spawns > 0);
    }

    fn push_spawn_task(&mut self, wave: WaveNumber) {
        let Some(kind) = wave_kind(&self.config, wave) else {
            return;
        };
        let count = wave_count(&self.config, wave);
        if count == 0 {
            return;
        }
        self.spawn_tasks.push(SpawnTask {
            wave,
            kind,
            remaining_spawns: count,
            until_next_spawn: Duration::ZERO,
            rng: wave_rng(self.config.rng_seed, wave),
        });
    }
}

fn sample_gap(config: &ScheduleConfig, rng: &mut ChaCha8Rng) -> Duration {
    if config.min_spawn_gap == config.max_spawn_gap {
        return config.min_spawn_gap;
    }
    rng.gen_range(config.min_spawn_gap..=config.max_spawn_gap)
}

fn wave_rng(seed: u64, wave: WaveNumber) -> ChaCha8Rng {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update(wave.get().to_le_bytes());
    let digest: [u8; 32] = hasher.finalize().into();
    ChaCha8Rng::from_seed(digest)
}
