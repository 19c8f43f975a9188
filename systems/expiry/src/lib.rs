#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that returns entities to the pool once their lifespan ends.
//!
//! Each spawned entity is tracked with a deadline taken from its kind's
//! prototype. Deadlines count down with observed time and expired entities
//! are released through `Command::Release`; releases observed from elsewhere
//! simply drop the deadline.

use std::time::Duration;

use onslaught_core::{Command, EntityId, Event, KindCatalogView};

/// Expiry system that emits release commands for entities past their lifespan.
#[derive(Debug, Default)]
pub struct Expiry {
    deadlines: Vec<Deadline>,
}

#[derive(Debug)]
struct Deadline {
    entity: EntityId,
    remaining: Duration,
}

impl Expiry {
    /// Creates a new expiry system tracking no entities.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entities currently awaiting expiry.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.deadlines.len()
    }

    /// Consumes events to advance deadlines and emit release commands.
    ///
    /// Events are replayed in order, so a spawn followed by a tick inside the
    /// same batch already consumes part of the new entity's lifespan.
    pub fn handle(&mut self, events: &[Event], catalog: KindCatalogView<'_>, out: &mut Vec<Command>) {
        for event in events {
            match event {
                Event::EntitySpawned { entity, kind, .. } => {
                    let Some(definition) = catalog.get(*kind) else {
                        continue;
                    };
                    self.deadlines.retain(|deadline| deadline.entity != *entity);
                    self.deadlines.push(Deadline {
                        entity: *entity,
                        remaining: definition.prototype().lifespan(),
                    });
                }
                Event::EntityReleased { entity, .. } => {
                    self.deadlines.retain(|deadline| deadline.entity != *entity);
                }
                Event::TimeAdvanced { dt } => {
                    for deadline in &mut self.deadlines {
                        deadline.remaining = deadline.remaining.saturating_sub(*dt);
                    }
                }
                _ => {}
            }
        }

        for deadline in &self.deadlines {
            if deadline.remaining.is_zero() {
                out.push(Command::Release {
                    entity: deadline.entity,
                });
            }
        }
        self.deadlines
            .retain(|deadline| !deadline.remaining.is_zero());
    }
}
