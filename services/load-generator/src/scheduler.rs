//! Rate-controlled, per-worker operation scheduling.
//!
//! Each tick draws operation kinds uniformly at random until every kind's
//! quota is spent, then sleeps out the rest of the one-second window.

use std::collections::BTreeMap;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use store_client::{OperationKind, StoreConnection, StoreError};
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::error::{LoadTestError, LoadTestResult};
use crate::operation::OperationSpec;

/// Nominal length of one tick.
pub const TICK: Duration = Duration::from_millis(1000);

/// Remaining window below which a tick does not sleep at all.
pub const MIN_SLEEP: Duration = Duration::from_millis(25);

/// Per-tick executed counters, index-aligned with the scheduler's operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickState {
    executed: Vec<u32>,
}

impl TickState {
    pub fn new(operations: usize) -> Self {
        Self {
            executed: vec![0; operations],
        }
    }

    /// Operations still owed this tick across all kinds.
    pub fn remaining(&self, operations: &[OperationSpec]) -> u64 {
        operations
            .iter()
            .zip(&self.executed)
            .map(|(op, &done)| u64::from(op.quota.saturating_sub(done)))
            .sum()
    }

    pub fn is_exhausted(&self, index: usize, operations: &[OperationSpec]) -> bool {
        self.executed[index] >= operations[index].quota
    }

    pub fn executed(&self) -> &[u32] {
        &self.executed
    }

    fn record(&mut self, index: usize) {
        self.executed[index] += 1;
    }
}

/// What happens after a tick's operations finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Sleep out the rest of the window.
    Sleep(Duration),
    /// The remaining window is too short to be worth sleeping.
    Skip(Duration),
    /// The tick ran past one second by this much; the next tick starts at once.
    Overrun(Duration),
}

/// Decide how to pace a tick that took `elapsed`.
pub fn pace(elapsed: Duration) -> Pacing {
    if elapsed > TICK {
        return Pacing::Overrun(elapsed - TICK);
    }
    let left = TICK - elapsed;
    if left > MIN_SLEEP {
        Pacing::Sleep(left)
    } else {
        Pacing::Skip(left)
    }
}

/// Result of one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub state: TickState,
    pub elapsed: Duration,
    pub pacing: Pacing,
}

/// Counters accumulated over a scheduler's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkloadStats {
    pub ticks: u64,
    pub overruns: u64,
    pub operations: BTreeMap<OperationKind, u64>,
}

impl WorkloadStats {
    pub fn total_operations(&self) -> u64 {
        self.operations.values().sum()
    }
}

/// RNG for one worker: `seed + worker_id` when seeded, entropy otherwise.
pub fn worker_rng(seed: Option<u64>, worker_id: usize) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(worker_id as u64)),
        None => StdRng::from_entropy(),
    }
}

/// Drives one connection through quota-bounded, one-second ticks.
pub struct WorkloadScheduler {
    worker_id: usize,
    operations: Vec<OperationSpec>,
    rng: StdRng,
    stats: WorkloadStats,
}

impl WorkloadScheduler {
    pub fn new(worker_id: usize, operations: Vec<OperationSpec>, rng: StdRng) -> Self {
        let mut stats = WorkloadStats::default();
        for op in &operations {
            stats.operations.entry(op.kind()).or_insert(0);
        }
        Self {
            worker_id,
            operations,
            rng,
            stats,
        }
    }

    pub fn operations(&self) -> &[OperationSpec] {
        &self.operations
    }

    pub fn stats(&self) -> &WorkloadStats {
        &self.stats
    }

    pub fn into_stats(self) -> WorkloadStats {
        self.stats
    }

    /// Spend every quota once, in random order.
    ///
    /// Each draw is uniform over all operations, exhausted ones included; a
    /// draw that lands on an exhausted kind is discarded and redrawn.
    pub async fn run_quotas(&mut self, conn: &mut dyn StoreConnection) -> LoadTestResult<TickState> {
        let mut state = TickState::new(self.operations.len());
        let mut remaining = state.remaining(&self.operations);

        while remaining > 0 {
            let index = self.rng.gen_range(0..self.operations.len());
            if state.is_exhausted(index, &self.operations) {
                continue;
            }

            let spec = &self.operations[index];
            if let Err(source) = spec.execute(conn, &mut self.rng).await {
                return Err(operation_error(self.worker_id, spec.kind(), source));
            }

            state.record(index);
            *self.stats.operations.entry(spec.kind()).or_insert(0) += 1;
            remaining = state.remaining(&self.operations);
        }

        Ok(state)
    }

    /// Run one tick: spend the quotas, then pace to the one-second boundary.
    pub async fn tick(&mut self, conn: &mut dyn StoreConnection) -> LoadTestResult<TickOutcome> {
        let tick_start = Instant::now();
        debug!(
            ops = self.operations.iter().map(|op| u64::from(op.quota)).sum::<u64>(),
            "Starting tick"
        );

        let state = self.run_quotas(conn).await?;
        let elapsed = tick_start.elapsed();
        let pacing = pace(elapsed);
        self.stats.ticks += 1;

        match pacing {
            Pacing::Overrun(over) => {
                self.stats.overruns += 1;
                debug!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    overrun_ms = over.as_millis() as u64,
                    "Operations took more than one second to run"
                );
            }
            Pacing::Sleep(left) => {
                debug!(sleep_ms = left.as_millis() as u64, "Sleeping until end of tick");
                sleep(left).await;
            }
            Pacing::Skip(left) => {
                debug!(
                    sleep_ms = left.as_millis() as u64,
                    skipped = true,
                    "Sleeping until end of tick"
                );
            }
        }

        Ok(TickOutcome {
            state,
            elapsed,
            pacing,
        })
    }

    /// Tick until `deadline` has passed.
    ///
    /// Overruns are not compensated, so the run can end later than the
    /// deadline by the accumulated overrun. An operation error stops the loop
    /// immediately.
    pub async fn run_until(
        &mut self,
        conn: &mut dyn StoreConnection,
        deadline: Instant,
    ) -> LoadTestResult<()> {
        while Instant::now() < deadline {
            self.tick(conn).await?;
        }
        Ok(())
    }
}

/// A lost connection surfaces as a connection error, anything else as an operation error.
fn operation_error(worker_id: usize, kind: OperationKind, source: StoreError) -> LoadTestError {
    match source {
        StoreError::Connection(_) => LoadTestError::Connection { worker_id, source },
        source => LoadTestError::Operation {
            worker_id,
            kind,
            source,
        },
    }
}
