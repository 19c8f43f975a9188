#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Onslaught engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative entity pool, and pure systems. Adapters submit [`Command`]
//! values describing desired mutations, the pool executes those commands via
//! its `apply` entry point, and then broadcasts [`Event`] values for systems
//! to react to deterministically. Systems consume event streams, query
//! immutable snapshots, and respond exclusively with new command batches.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Commands that express all permissible pool mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Advances the session clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Requests that the pool hand out an entity of the given kind.
    Spawn {
        /// Kind selecting the bucket the entity is drawn from.
        kind: EntityKind,
        /// Coordinate the entity occupies once active.
        position: Position,
    },
    /// Requests that an active entity return to its bucket's idle set.
    Release {
        /// Identifier of the entity whose lifecycle ended.
        entity: EntityId,
    },
}

/// Events broadcast by the pool after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the session clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that the pool handed out an entity.
    EntitySpawned {
        /// Identifier of the entity that became active.
        entity: EntityId,
        /// Kind of the bucket the entity belongs to.
        kind: EntityKind,
        /// Coordinate assigned to the entity.
        position: Position,
        /// Whether an idle entity was reused or a new one was instantiated.
        provenance: SpawnProvenance,
    },
    /// Confirms that an entity returned to its bucket's idle set.
    EntityReleased {
        /// Identifier of the entity that became idle.
        entity: EntityId,
        /// Kind of the bucket the entity belongs to.
        kind: EntityKind,
        /// Coordinate the entity occupied when released.
        position: Position,
    },
    /// Reports that a spawn request was rejected.
    SpawnRejected {
        /// Kind named by the rejected request.
        kind: EntityKind,
        /// Coordinate named by the rejected request.
        position: Position,
        /// Specific reason the spawn failed.
        reason: SpawnError,
    },
    /// Reports that a release request was rejected.
    ReleaseRejected {
        /// Identifier named by the rejected request.
        entity: EntityId,
        /// Specific reason the release failed.
        reason: ReleaseError,
    },
}

/// Unique identifier assigned to a poolable entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates a new entity identifier with the provided numeric value.
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

/// Tag selecting which pool bucket and prototype an entity belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKind(u32);

impl EntityKind {
    /// Creates a new kind tag with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the kind tag.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// One-indexed ordinal of a wave within a scheduler run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WaveNumber(u32);

impl WaveNumber {
    /// Creates a new wave ordinal with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the ordinal.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Planar coordinate assigned to entities when they are handed out.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    x: f32,
    y: f32,
}

impl Position {
    /// Resting coordinate occupied by idle entities.
    pub const ORIGIN: Position = Position::new(0.0, 0.0);

    /// Creates a new coordinate from horizontal and vertical components.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Horizontal component of the coordinate.
    #[must_use]
    pub const fn x(&self) -> f32 {
        self.x
    }

    /// Vertical component of the coordinate.
    #[must_use]
    pub const fn y(&self) -> f32 {
        self.y
    }
}

/// Distinguishes how the pool satisfied a spawn request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpawnProvenance {
    /// An idle entity already held by the bucket was reactivated.
    Reused,
    /// No idle entity existed, so a new one was instantiated.
    Instantiated,
}

/// Per-kind payload template applied to entities at instantiation and reuse.
///
/// Payload state belongs to each entity; the pool copies these values in but
/// never interprets them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Prototype {
    health: u32,
    speed: f32,
    lifespan: Duration,
    bounty: u32,
}

impl Prototype {
    /// Creates a new payload template.
    #[must_use]
    pub const fn new(health: u32, speed: f32, lifespan: Duration, bounty: u32) -> Self {
        Self {
            health,
            speed,
            lifespan,
            bounty,
        }
    }

    /// Hit points granted to a freshly activated entity.
    #[must_use]
    pub const fn health(&self) -> u32 {
        self.health
    }

    /// Movement rate granted to a freshly activated entity.
    #[must_use]
    pub const fn speed(&self) -> f32 {
        self.speed
    }

    /// Simulated time an activated entity survives before expiring.
    #[must_use]
    pub const fn lifespan(&self) -> Duration {
        self.lifespan
    }

    /// Currency awarded when an entity of this kind is released.
    #[must_use]
    pub const fn bounty(&self) -> u32 {
        self.bounty
    }
}

/// One pool-bucket registration: a kind, its prototype, and a pre-warm count.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KindDefinition {
    kind: EntityKind,
    prototype: Prototype,
    prewarm: u32,
}

impl KindDefinition {
    /// Creates a new bucket registration.
    #[must_use]
    pub const fn new(kind: EntityKind, prototype: Prototype, prewarm: u32) -> Self {
        Self {
            kind,
            prototype,
            prewarm,
        }
    }

    /// Kind tag the bucket is registered under.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Payload template entities of this kind are built from.
    #[must_use]
    pub const fn prototype(&self) -> Prototype {
        self.prototype
    }

    /// Number of entities instantiated idle when the pool is constructed.
    #[must_use]
    pub const fn prewarm(&self) -> u32 {
        self.prewarm
    }
}

/// Read-only view over the kind definitions registered with a pool.
///
/// The validated-lookup surface consulted by scheduler construction and by
/// systems that need prototype data for a kind.
#[derive(Clone, Copy, Debug)]
pub struct KindCatalogView<'a> {
    definitions: &'a [KindDefinition],
}

impl<'a> KindCatalogView<'a> {
    /// Captures a new catalog view backed by the provided definitions.
    #[must_use]
    pub const fn new(definitions: &'a [KindDefinition]) -> Self {
        Self { definitions }
    }

    /// Definitions in registration order.
    #[must_use]
    pub const fn definitions(&self) -> &'a [KindDefinition] {
        self.definitions
    }

    /// Looks up the definition registered for the provided kind, if any.
    #[must_use]
    pub fn get(&self, kind: EntityKind) -> Option<&'a KindDefinition> {
        self.definitions
            .iter()
            .find(|definition| definition.kind() == kind)
    }

    /// Reports whether the provided kind is registered.
    #[must_use]
    pub fn contains(&self, kind: EntityKind) -> bool {
        self.get(kind).is_some()
    }

    /// Iterator over the definitions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &'a KindDefinition> {
        self.definitions.iter()
    }
}

/// Immutable representation of a single entity's state used for queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EntitySnapshot {
    /// Unique identifier assigned to the entity.
    pub id: EntityId,
    /// Kind of the bucket the entity belongs to.
    pub kind: EntityKind,
    /// Coordinate currently assigned to the entity.
    pub position: Position,
    /// Indicates whether the entity is checked out to a caller.
    pub active: bool,
    /// Hit points carried by the entity's payload.
    pub health: u32,
    /// Movement rate carried by the entity's payload.
    pub speed: f32,
}

/// Read-only snapshot describing all entities owned by a pool.
#[derive(Clone, Debug, Default)]
pub struct RosterView {
    snapshots: Vec<EntitySnapshot>,
}

impl RosterView {
    /// Creates a new roster view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<EntitySnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &EntitySnapshot> {
        self.snapshots.iter()
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<EntitySnapshot> {
        self.snapshots
    }
}

/// Per-bucket occupancy tallies captured from a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BucketCensus {
    /// Kind the bucket is registered under.
    pub kind: EntityKind,
    /// Total entities the bucket owns, active and idle combined.
    pub total: u32,
    /// Entities currently checked out to callers.
    pub active: u32,
    /// Entities currently resting in the idle set.
    pub idle: u32,
}

/// Read-only snapshot of every bucket's occupancy, in registration order.
#[derive(Clone, Debug, Default)]
pub struct BucketCensusView {
    tallies: Vec<BucketCensus>,
}

impl BucketCensusView {
    /// Creates a new census view from per-bucket tallies.
    #[must_use]
    pub fn from_tallies(tallies: Vec<BucketCensus>) -> Self {
        Self { tallies }
    }

    /// Iterator over the tallies in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &BucketCensus> {
        self.tallies.iter()
    }

    /// Looks up the tally captured for the provided kind, if any.
    #[must_use]
    pub fn get(&self, kind: EntityKind) -> Option<&BucketCensus> {
        self.tallies.iter().find(|census| census.kind == kind)
    }

    /// Consumes the view, yielding the underlying tallies.
    #[must_use]
    pub fn into_vec(self) -> Vec<BucketCensus> {
        self.tallies
    }
}

/// Reasons a spawn request may be rejected by the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpawnError {
    /// The requested kind has no bucket registered with the pool.
    UnknownKind,
}

/// Reasons a release request may be rejected by the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReleaseError {
    /// No entity with the provided identifier exists in any bucket.
    UnknownEntity,
    /// The entity is already idle; each acquire pairs with exactly one release.
    AlreadyIdle,
}

/// Fatal construction-time failures raised by the pool and the scheduler.
///
/// Configuration problems abort the subsystem being built instead of
/// degrading into empty or non-finite wave sequences at runtime.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// A pool registration listed the same kind twice.
    #[error("kind {} is registered twice", kind.get())]
    DuplicateKind {
        /// Kind tag that appeared more than once.
        kind: EntityKind,
    },
    /// A schedule named no kinds to rotate through.
    #[error("schedule names no kinds to spawn")]
    EmptyKindRotation,
    /// A schedule referenced a kind absent from the pool catalog.
    #[error("kind {} has no bucket registered with the pool", kind.get())]
    UnknownKind {
        /// Kind tag missing from the catalog.
        kind: EntityKind,
    },
    /// The ramp must span at least one wave.
    #[error("ramp length must be at least one wave")]
    ZeroRampLength,
    /// The wave-size interpolation range is inverted.
    #[error("minimum wave count {min} exceeds maximum wave count {max}")]
    CountRange {
        /// Configured minimum wave size.
        min: u32,
        /// Configured maximum wave size.
        max: u32,
    },
    /// The intra-wave spawn gap range is inverted.
    #[error("minimum spawn gap {min:?} exceeds maximum spawn gap {max:?}")]
    GapRange {
        /// Configured minimum gap between spawns within a wave.
        min: Duration,
        /// Configured maximum gap between spawns within a wave.
        max: Duration,
    },
    /// A zero inter-wave delay would issue unbounded waves within one tick.
    #[error("delay between waves must be non-zero")]
    ZeroWaveGap,
    /// A polyline curve carried fewer than two keys.
    #[error("polyline curve needs at least two keys")]
    CurveWithoutKeys,
    /// A polyline curve key left the unit square.
    #[error("polyline curve key {index} lies outside the unit square")]
    CurveKeyOutOfRange {
        /// Index of the offending key.
        index: usize,
    },
    /// Polyline curve keys must strictly increase along the time axis.
    #[error("polyline curve key {index} does not increase along the time axis")]
    CurveKeysNotIncreasing {
        /// Index of the offending key.
        index: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::{
        EntityId, EntityKind, KindCatalogView, KindDefinition, Position, Prototype, ReleaseError,
        SpawnError,
    };
    use serde::{de::DeserializeOwned, Serialize};
    use std::time::Duration;

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn entity_id_round_trips_through_bincode() {
        assert_round_trip(&EntityId::new(42));
    }

    #[test]
    fn entity_kind_round_trips_through_bincode() {
        assert_round_trip(&EntityKind::new(7));
    }

    #[test]
    fn position_round_trips_through_bincode() {
        assert_round_trip(&Position::new(12.5, -3.0));
    }

    #[test]
    fn spawn_error_round_trips_through_bincode() {
        assert_round_trip(&SpawnError::UnknownKind);
    }

    #[test]
    fn release_error_round_trips_through_bincode() {
        assert_round_trip(&ReleaseError::AlreadyIdle);
    }

    #[test]
    fn catalog_lookup_matches_registration() {
        let definitions = vec![
            KindDefinition::new(
                EntityKind::new(0),
                Prototype::new(3, 1.5, Duration::from_secs(4), 10),
                2,
            ),
            KindDefinition::new(
                EntityKind::new(5),
                Prototype::new(8, 0.75, Duration::from_secs(9), 25),
                0,
            ),
        ];
        let catalog = KindCatalogView::new(&definitions);

        assert!(catalog.contains(EntityKind::new(0)));
        assert!(catalog.contains(EntityKind::new(5)));
        assert!(!catalog.contains(EntityKind::new(1)));

        let definition = catalog.get(EntityKind::new(5)).expect("registered kind");
        assert_eq!(definition.prototype().bounty(), 25);
        assert_eq!(definition.prewarm(), 0);
        assert_eq!(catalog.iter().count(), 2);
    }

    #[test]
    fn origin_rests_at_zero() {
        assert_eq!(Position::ORIGIN.x(), 0.0);
        assert_eq!(Position::ORIGIN.y(), 0.0);
    }
}
