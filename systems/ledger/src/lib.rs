#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Bookkeeping system that tallies pool traffic and accumulated bounty.
//!
//! The ledger observes the event stream without ever emitting commands.
//! Adapters pull its current [`LedgerReport`] when they want to display or
//! log session totals.

use onslaught_core::{Event, KindCatalogView, SpawnProvenance};

/// Pure observer that folds pool events into session totals.
#[derive(Debug, Default)]
pub struct Ledger {
    report: LedgerReport,
}

/// Session totals accumulated from the event stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LedgerReport {
    /// Currency earned from bounties of released entities.
    pub treasury: u64,
    /// Spawn confirmations observed, reused and instantiated combined.
    pub spawned: u64,
    /// Spawns that had to instantiate because no idle entity existed.
    pub instantiated: u64,
    /// Release confirmations observed.
    pub released: u64,
    /// Spawn or release requests the pool rejected.
    pub rejected: u64,
}

impl Ledger {
    /// Creates a new ledger with zeroed totals.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current session totals.
    #[must_use]
    pub fn report(&self) -> LedgerReport {
        self.report
    }

    /// Folds the provided events into the running totals.
    pub fn handle(&mut self, events: &[Event], catalog: KindCatalogView<'_>) {
        for event in events {
            match event {
                Event::EntitySpawned { provenance, .. } => {
                    self.report.spawned = self.report.spawned.saturating_add(1);
                    if *provenance == SpawnProvenance::Instantiated {
                        self.report.instantiated = self.report.instantiated.saturating_add(1);
                    }
                }
                Event::EntityReleased { kind, .. } => {
                    self.report.released = self.report.released.saturating_add(1);
                    if let Some(definition) = catalog.get(*kind) {
                        self.report.treasury = self
                            .report
                            .treasury
                            .saturating_add(u64::from(definition.prototype().bounty()));
                    }
                }
                Event::SpawnRejected { .. } | Event::ReleaseRejected { .. } => {
                    self.report.rejected = self.report.rejected.saturating_add(1);
                }
                Event::TimeAdvanced { .. } => {}
            }
        }
    }
}
