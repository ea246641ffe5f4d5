//! Stress and race harnesses.
//!
//! These helpers drive a registry from many threads at once, to check the
//! put-if-absent guarantee and bulk indexing under contention.

use nodex_core::{EntityRef, FieldValue, IndexRegistry, IndexType, Scalar};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Operations per thread.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Number of distinct values written.
    pub distinct_values: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 500,
            threads: 4,
            distinct_values: 50,
        }
    }
}

/// Outcome of one thread in a put-if-absent race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaceOutcome {
    /// The thread's entity was associated and committed.
    Won(EntityRef),
    /// The thread won but rolled back.
    RolledBack(EntityRef),
    /// The thread lost and was handed the holder.
    Lost {
        /// The thread's entity.
        entity: EntityRef,
        /// The entity returned as holder.
        holder: EntityRef,
    },
}

/// Configuration for a put-if-absent race.
#[derive(Debug, Clone)]
pub struct RaceConfig {
    /// Number of racing threads, each with its own entity.
    pub threads: usize,
    /// Key (field) raced on.
    pub key: String,
    /// Value raced on.
    pub value: Scalar,
    /// How long a winner keeps its transaction open before finishing.
    pub hold: Duration,
    /// Whether the first winner rolls back instead of committing.
    pub rollback_first_winner: bool,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            threads: 8,
            key: "email".to_string(),
            value: Scalar::from("race@example.com"),
            hold: Duration::from_millis(20),
            rollback_first_winner: false,
        }
    }
}

/// Result of a put-if-absent race.
#[derive(Debug, Clone)]
pub struct RaceResult {
    /// One outcome per thread.
    pub outcomes: Vec<RaceOutcome>,
    /// Total duration.
    pub duration: Duration,
}

impl RaceResult {
    /// Entities that won and committed.
    pub fn winners(&self) -> Vec<EntityRef> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                RaceOutcome::Won(e) => Some(*e),
                _ => None,
            })
            .collect()
    }

    /// Entities that won and rolled back.
    pub fn rolled_back(&self) -> Vec<EntityRef> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                RaceOutcome::RolledBack(e) => Some(*e),
                _ => None,
            })
            .collect()
    }

    /// Holders handed to losers.
    pub fn holders(&self) -> Vec<EntityRef> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                RaceOutcome::Lost { holder, .. } => Some(*holder),
                _ => None,
            })
            .collect()
    }
}

/// Races `config.threads` transactions to put-if-absent the same pair.
///
/// All threads start together behind a barrier. Panics if any call errors.
pub fn race_put_if_absent(registry: &Arc<IndexRegistry>, config: &RaceConfig) -> RaceResult {
    let barrier = Arc::new(Barrier::new(config.threads));
    let rolled_back = Arc::new(AtomicBool::new(false));
    let start = Instant::now();

    let workers: Vec<_> = (0..config.threads)
        .map(|_| {
            let registry = Arc::clone(registry);
            let barrier = Arc::clone(&barrier);
            let rolled_back = Arc::clone(&rolled_back);
            let config = config.clone();
            let entity = match registry.entity_kind() {
                nodex_core::EntityKind::Node => EntityRef::new_node(),
                nodex_core::EntityKind::Relationship => EntityRef::new_relationship(),
            };

            thread::spawn(move || {
                barrier.wait();
                let mut txn = registry.begin();
                let outcome = registry
                    .put_if_absent(&mut txn, entity, &config.key, &config.value, IndexType::Exact)
                    .expect("put_if_absent failed");

                match outcome {
                    Some(holder) => RaceOutcome::Lost { entity, holder },
                    None => {
                        thread::sleep(config.hold);
                        let roll_back = config.rollback_first_winner
                            && !rolled_back.swap(true, Ordering::SeqCst);
                        if roll_back {
                            txn.rollback().expect("rollback failed");
                            RaceOutcome::RolledBack(entity)
                        } else {
                            txn.commit().expect("commit failed");
                            RaceOutcome::Won(entity)
                        }
                    }
                }
            })
        })
        .collect();

    let outcomes = workers
        .into_iter()
        .map(|w| w.join().expect("race thread panicked"))
        .collect();

    RaceResult {
        outcomes,
        duration: start.elapsed(),
    }
}

/// Adds `config.operations` values per thread, one transaction each.
pub fn stress_concurrent_adds(
    registry: &Arc<IndexRegistry>,
    field: &str,
    config: &StressConfig,
) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let workers: Vec<_> = (0..config.threads)
        .map(|t| {
            let registry = Arc::clone(registry);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let field = field.to_string();
            let config = config.clone();

            thread::spawn(move || {
                for i in 0..config.operations {
                    let value = FieldValue::from(format!("v{}", (t + i) % config.distinct_values));
                    let mut txn = registry.begin();
                    let result = registry
                        .add(&mut txn, EntityRef::new_node(), &field, &value)
                        .and_then(|_| txn.commit());
                    match result {
                        Ok(()) => successful.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            })
        })
        .collect();

    for worker in workers {
        let _ = worker.join();
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}
