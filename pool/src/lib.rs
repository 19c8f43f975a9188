#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative entity pool for Onslaught.
//!
//! The pool owns every poolable entity for the lifetime of a session. It is
//! constructed once from a list of [`KindDefinition`] registrations and then
//! mutated exclusively through [`apply`], which executes [`Command`] values
//! and broadcasts [`Event`] values describing what happened. Buckets hand out
//! the first idle entity in slot order and grow permanently when none is
//! idle; they never shrink and never discard an entity. Growth carries no
//! cap, so sustained spawn pressure without matching releases grows a bucket
//! without bound.

use onslaught_core::{
    BucketCensus, Command, ConfigurationError, EntityId, EntityKind, Event, KindDefinition,
    Position, Prototype, ReleaseError, SpawnError, SpawnProvenance,
};

/// Session-long owner of all pooled entities, keyed by kind.
#[derive(Debug)]
pub struct Pool {
    definitions: Vec<KindDefinition>,
    buckets: Vec<Bucket>,
    next_entity_id: u32,
    tick_index: u64,
}

impl Pool {
    /// Creates a pool and pre-warms each registered bucket with idle entities.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::DuplicateKind`] when the same kind is
    /// registered more than once.
    pub fn new(definitions: Vec<KindDefinition>) -> Result<Self, ConfigurationError> {
        for (index, definition) in definitions.iter().enumerate() {
            let duplicated = definitions[..index]
                .iter()
                .any(|earlier| earlier.kind() == definition.kind());
            if duplicated {
                return Err(ConfigurationError::DuplicateKind {
                    kind: definition.kind(),
                });
            }
        }

        let mut pool = Self {
            buckets: Vec::with_capacity(definitions.len()),
            next_entity_id: 0,
            tick_index: 0,
            definitions,
        };

        for index in 0..pool.definitions.len() {
            let definition = pool.definitions[index];
            let mut bucket = Bucket::new(definition.kind(), definition.prototype());
            for _ in 0..definition.prewarm() {
                let id = pool.allocate_entity_id();
                bucket.slots.push(Entity::idle(id, definition.prototype()));
            }
            pool.buckets.push(bucket);
        }

        Ok(pool)
    }

    fn allocate_entity_id(&mut self) -> EntityId {
        let id = EntityId::new(self.next_entity_id);
        self.next_entity_id = self.next_entity_id.saturating_add(1);
        id
    }

    fn bucket_index(&self, kind: EntityKind) -> Option<usize> {
        self.buckets.iter().position(|bucket| bucket.kind == kind)
    }

    fn locate(&self, entity: EntityId) -> Option<(usize, usize)> {
        for (bucket_index, bucket) in self.buckets.iter().enumerate() {
            if let Some(slot_index) = bucket.slots.iter().position(|slot| slot.id == entity) {
                return Some((bucket_index, slot_index));
            }
        }
        None
    }
}

/// Applies the provided command to the pool, mutating state deterministically.
pub fn apply(pool: &mut Pool, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Tick { dt } => {
            pool.tick_index = pool.tick_index.saturating_add(1);
            out_events.push(Event::TimeAdvanced { dt });
        }
        Command::Spawn { kind, position } => {
            let Some(bucket_index) = pool.bucket_index(kind) else {
                out_events.push(Event::SpawnRejected {
                    kind,
                    position,
                    reason: SpawnError::UnknownKind,
                });
                return;
            };

            // First-fit in slot order; reuse order is observable and tested.
            let reusable = pool.buckets[bucket_index]
                .slots
                .iter()
                .position(|slot| !slot.active);

            match reusable {
                Some(slot_index) => {
                    let prototype = pool.buckets[bucket_index].prototype;
                    let slot = &mut pool.buckets[bucket_index].slots[slot_index];
                    slot.activate(position, prototype);
                    out_events.push(Event::EntitySpawned {
                        entity: slot.id,
                        kind,
                        position,
                        provenance: SpawnProvenance::Reused,
                    });
                }
                None => {
                    let id = pool.allocate_entity_id();
                    let bucket = &mut pool.buckets[bucket_index];
                    let mut slot = Entity::idle(id, bucket.prototype);
                    slot.activate(position, bucket.prototype);
                    bucket.slots.push(slot);
                    out_events.push(Event::EntitySpawned {
                        entity: id,
                        kind,
                        position,
                        provenance: SpawnProvenance::Instantiated,
                    });
                }
            }
        }
        Command::Release { entity } => {
            let Some((bucket_index, slot_index)) = pool.locate(entity) else {
                out_events.push(Event::ReleaseRejected {
                    entity,
                    reason: ReleaseError::UnknownEntity,
                });
                return;
            };

            let bucket = &mut pool.buckets[bucket_index];
            let slot = &mut bucket.slots[slot_index];
            if !slot.active {
                out_events.push(Event::ReleaseRejected {
                    entity,
                    reason: ReleaseError::AlreadyIdle,
                });
                return;
            }

            slot.active = false;
            out_events.push(Event::EntityReleased {
                entity,
                kind: bucket.kind,
                position: slot.position,
            });
        }
    }
}

/// Query functions that provide read-only access to the pool state.
pub mod query {
    use onslaught_core::{BucketCensusView, EntitySnapshot, KindCatalogView, RosterView};

    use super::Pool;

    /// Captures a read-only snapshot of every entity the pool owns.
    #[must_use]
    pub fn roster_view(pool: &Pool) -> RosterView {
        let mut snapshots: Vec<EntitySnapshot> = Vec::new();
        for bucket in &pool.buckets {
            snapshots.extend(bucket.slots.iter().map(|slot| EntitySnapshot {
                id: slot.id,
                kind: bucket.kind,
                position: slot.position,
                active: slot.active,
                health: slot.health,
                speed: slot.speed,
            }));
        }
        RosterView::from_snapshots(snapshots)
    }

    /// Exposes the kind definitions the pool was constructed from.
    #[must_use]
    pub fn kind_catalog(pool: &Pool) -> KindCatalogView<'_> {
        KindCatalogView::new(&pool.definitions)
    }

    /// Captures per-bucket occupancy tallies in registration order.
    #[must_use]
    pub fn bucket_census(pool: &Pool) -> BucketCensusView {
        BucketCensusView::from_tallies(pool.buckets.iter().map(super::Bucket::census).collect())
    }

    /// Number of ticks the pool has processed since construction.
    #[must_use]
    pub fn tick_index(pool: &Pool) -> u64 {
        pool.tick_index
    }
}

#[derive(Debug)]
struct Bucket {
    kind: EntityKind,
    prototype: Prototype,
    slots: Vec<Entity>,
}

impl Bucket {
    fn new(kind: EntityKind, prototype: Prototype) -> Self {
        Self {
            kind,
            prototype,
            slots: Vec::new(),
        }
    }

    fn census(&self) -> BucketCensus {
        let total = self.slots.len() as u32;
        let active = self.slots.iter().filter(|slot| slot.active).count() as u32;
        BucketCensus {
            kind: self.kind,
            total,
            active,
            idle: total.saturating_sub(active),
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Entity {
    id: EntityId,
    position: Position,
    active: bool,
    health: u32,
    speed: f32,
}

impl Entity {
    fn idle(id: EntityId, prototype: Prototype) -> Self {
        Self {
            id,
            position: Position::ORIGIN,
            active: false,
            health: prototype.health(),
            speed: prototype.speed(),
        }
    }

    fn activate(&mut self, position: Position, prototype: Prototype) {
        self.active = true;
        self.position = position;
        self.health = prototype.health();
        self.speed = prototype.speed();
    }
}

#[cfg(test)]
mod tests {
    use super::{apply, query, Pool};
    use onslaught_core::{
        Command, ConfigurationError, EntityId, EntityKind, Event, KindDefinition, Position,
        Prototype, ReleaseError, SpawnError, SpawnProvenance,
    };
    use std::time::Duration;

    const RAIDER: EntityKind = EntityKind::new(0);
    const BRUTE: EntityKind = EntityKind::new(1);

    fn raider_pool(prewarm: u32) -> Pool {
        Pool::new(vec![KindDefinition::new(
            RAIDER,
            Prototype::new(3, 1.25, Duration::from_secs(5), 10),
            prewarm,
        )])
        .expect("valid pool registration")
    }

    fn spawned_entity(events: &[Event]) -> (EntityId, SpawnProvenance) {
        match events.last() {
            Some(Event::EntitySpawned {
                entity, provenance, ..
            }) => (*entity, *provenance),
            other => panic!("expected EntitySpawned, got {other:?}"),
        }
    }

    #[test]
    fn prewarm_creates_idle_entities() {
        let pool = raider_pool(3);

        let roster = query::roster_view(&pool).into_vec();
        assert_eq!(roster.len(), 3);
        for snapshot in &roster {
            assert!(!snapshot.active);
            assert_eq!(snapshot.position, Position::ORIGIN);
            assert_eq!(snapshot.health, 3);
        }

        let census = query::bucket_census(&pool);
        let tally = census.get(RAIDER).expect("registered bucket");
        assert_eq!(tally.total, 3);
        assert_eq!(tally.idle, 3);
        assert_eq!(tally.active, 0);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let prototype = Prototype::new(1, 1.0, Duration::from_secs(1), 1);
        let result = Pool::new(vec![
            KindDefinition::new(RAIDER, prototype, 1),
            KindDefinition::new(BRUTE, prototype, 1),
            KindDefinition::new(RAIDER, prototype, 0),
        ]);

        assert_eq!(
            result.err(),
            Some(ConfigurationError::DuplicateKind { kind: RAIDER })
        );
    }

    #[test]
    fn spawn_reuses_first_idle_slot() {
        let mut pool = raider_pool(3);
        let mut events = Vec::new();

        for _ in 0..3 {
            apply(
                &mut pool,
                Command::Spawn {
                    kind: RAIDER,
                    position: Position::new(4.0, 9.0),
                },
                &mut events,
            );
        }

        let middle = EntityId::new(1);
        apply(&mut pool, Command::Release { entity: middle }, &mut events);

        events.clear();
        apply(
            &mut pool,
            Command::Spawn {
                kind: RAIDER,
                position: Position::new(1.0, 9.0),
            },
            &mut events,
        );

        let (entity, provenance) = spawned_entity(&events);
        assert_eq!(entity, middle, "first-fit must return the only idle slot");
        assert_eq!(provenance, SpawnProvenance::Reused);
    }

    #[test]
    fn spawn_grows_bucket_when_no_idle_entity_exists() {
        let mut pool = raider_pool(1);
        let mut events = Vec::new();

        apply(
            &mut pool,
            Command::Spawn {
                kind: RAIDER,
                position: Position::new(0.0, 9.0),
            },
            &mut events,
        );
        let (first, first_provenance) = spawned_entity(&events);
        assert_eq!(first_provenance, SpawnProvenance::Reused);

        apply(
            &mut pool,
            Command::Spawn {
                kind: RAIDER,
                position: Position::new(2.0, 9.0),
            },
            &mut events,
        );
        let (second, second_provenance) = spawned_entity(&events);
        assert_eq!(second_provenance, SpawnProvenance::Instantiated);
        assert_ne!(first, second);

        let tally_after_growth = query::bucket_census(&pool)
            .get(RAIDER)
            .copied()
            .expect("registered bucket");
        assert_eq!(tally_after_growth.total, 2);
        assert_eq!(tally_after_growth.active, 2);

        apply(&mut pool, Command::Release { entity: first }, &mut events);
        apply(&mut pool, Command::Release { entity: second }, &mut events);

        events.clear();
        apply(
            &mut pool,
            Command::Spawn {
                kind: RAIDER,
                position: Position::new(5.0, 9.0),
            },
            &mut events,
        );
        let (reused, provenance) = spawned_entity(&events);
        assert_eq!(reused, first, "released slots are reused before growth");
        assert_eq!(provenance, SpawnProvenance::Reused);

        let tally_after_reuse = query::bucket_census(&pool)
            .get(RAIDER)
            .copied()
            .expect("registered bucket");
        assert_eq!(tally_after_reuse.total, 2, "buckets never shrink or grow on reuse");
    }

    #[test]
    fn acquired_entities_have_a_single_owner() {
        let mut pool = raider_pool(2);
        let mut events = Vec::new();
        let mut checked_out = Vec::new();

        for step in 0..5 {
            events.clear();
            apply(
                &mut pool,
                Command::Spawn {
                    kind: RAIDER,
                    position: Position::new(step as f32, 9.0),
                },
                &mut events,
            );
            let (entity, _) = spawned_entity(&events);
            assert!(
                !checked_out.contains(&entity),
                "entity {entity:?} was handed out twice without a release"
            );
            checked_out.push(entity);
        }
    }

    #[test]
    fn spawn_of_unregistered_kind_is_rejected() {
        let mut pool = raider_pool(1);
        let mut events = Vec::new();

        apply(
            &mut pool,
            Command::Spawn {
                kind: BRUTE,
                position: Position::new(3.0, 9.0),
            },
            &mut events,
        );

        assert_eq!(
            events,
            vec![Event::SpawnRejected {
                kind: BRUTE,
                position: Position::new(3.0, 9.0),
                reason: SpawnError::UnknownKind,
            }]
        );
        let tally = query::bucket_census(&pool)
            .get(RAIDER)
            .copied()
            .expect("registered bucket");
        assert_eq!(tally.active, 0);
    }

    #[test]
    fn releasing_an_idle_entity_is_rejected_loudly() {
        let mut pool = raider_pool(1);
        let mut events = Vec::new();

        apply(
            &mut pool,
            Command::Spawn {
                kind: RAIDER,
                position: Position::new(6.0, 9.0),
            },
            &mut events,
        );
        let (entity, _) = spawned_entity(&events);

        events.clear();
        apply(&mut pool, Command::Release { entity }, &mut events);
        assert!(matches!(events[0], Event::EntityReleased { .. }));

        events.clear();
        apply(&mut pool, Command::Release { entity }, &mut events);
        assert_eq!(
            events,
            vec![Event::ReleaseRejected {
                entity,
                reason: ReleaseError::AlreadyIdle,
            }]
        );

        let roster = query::roster_view(&pool).into_vec();
        assert_eq!(roster.len(), 1, "rejected releases must not mutate buckets");
        assert!(!roster[0].active);
    }

    #[test]
    fn releasing_an_unknown_entity_is_rejected() {
        let mut pool = raider_pool(0);
        let mut events = Vec::new();
        let ghost = EntityId::new(99);

        apply(&mut pool, Command::Release { entity: ghost }, &mut events);

        assert_eq!(
            events,
            vec![Event::ReleaseRejected {
                entity: ghost,
                reason: ReleaseError::UnknownEntity,
            }]
        );
    }

    #[test]
    fn release_reports_last_assigned_position() {
        let mut pool = raider_pool(1);
        let mut events = Vec::new();
        let landing = Position::new(7.5, 9.0);

        apply(
            &mut pool,
            Command::Spawn {
                kind: RAIDER,
                position: landing,
            },
            &mut events,
        );
        let (entity, _) = spawned_entity(&events);

        events.clear();
        apply(&mut pool, Command::Release { entity }, &mut events);

        assert_eq!(
            events,
            vec![Event::EntityReleased {
                entity,
                kind: RAIDER,
                position: landing,
            }]
        );
    }

    #[test]
    fn tick_advances_clock_and_broadcasts() {
        let mut pool = raider_pool(0);
        let mut events = Vec::new();

        apply(
            &mut pool,
            Command::Tick {
                dt: Duration::from_millis(16),
            },
            &mut events,
        );
        apply(
            &mut pool,
            Command::Tick {
                dt: Duration::from_millis(16),
            },
            &mut events,
        );

        assert_eq!(query::tick_index(&pool), 2);
        assert_eq!(
            events,
            vec![
                Event::TimeAdvanced {
                    dt: Duration::from_millis(16),
                },
                Event::TimeAdvanced {
                    dt: Duration::from_millis(16),
                },
            ]
        );
    }

    #[test]
    fn buckets_grow_monotonically_under_mixed_traffic() {
        let mut pool = raider_pool(2);
        let mut events = Vec::new();
        let mut previous_total = 2;
        let mut live: Vec<EntityId> = Vec::new();

        for step in 0u32..12 {
            events.clear();
            if step % 3 == 2 {
                if let Some(entity) = live.pop() {
                    apply(&mut pool, Command::Release { entity }, &mut events);
                }
            } else {
                apply(
                    &mut pool,
                    Command::Spawn {
                        kind: RAIDER,
                        position: Position::new(step as f32, 9.0),
                    },
                    &mut events,
                );
                let (entity, _) = spawned_entity(&events);
                live.push(entity);
            }

            let total = query::bucket_census(&pool)
                .get(RAIDER)
                .copied()
                .expect("registered bucket")
                .total;
            assert!(total >= previous_total, "bucket totals must never shrink");
            previous_total = total;
        }

        assert_eq!(previous_total as usize, query::roster_view(&pool).into_vec().len());
    }
}
