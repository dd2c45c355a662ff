//! Cooperative tick scheduler
//!
//! A single-threaded registry of resumable units, each advanced one
//! resumption per tick. There is no preemption: concurrency comes from
//! interleaving units across ticks, and a unit that cannot make progress
//! yields [`Tick::Continue`] to be retried later instead of blocking the
//! thread. Returning [`Tick::Stop`] deregisters the unit permanently.
//!
//! No priorities, no timers, no fairness guarantee among waiters.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{error, trace};

use crate::error::{Result, SqlError};

/// Signal returned by a resumable unit after each resumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// The unit has more work; resume it again on a later tick.
    Continue,
    /// The unit is finished; deregister it permanently.
    Stop,
}

/// A unit of work driven by repeated resumption.
pub trait Resumable: Send {
    /// Advance as far as possible without blocking, then report whether
    /// to be resumed again.
    fn resume(&mut self) -> Tick;
}

/// Configuration for the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum number of units resumed in one tick.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,

    /// Contain panics from unit resumption instead of unwinding through
    /// the tick loop. A panicking unit is dropped and counted.
    #[serde(default = "default_true")]
    pub catch_panics: bool,
}

fn default_batch_limit() -> usize {
    64
}

fn default_true() -> bool {
    true
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_limit: default_batch_limit(),
            catch_panics: true,
        }
    }
}

impl SchedulerConfig {
    /// Set the per-tick batch limit.
    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit;
        self
    }

    /// Enable or disable panic containment.
    pub fn with_catch_panics(mut self, enabled: bool) -> Self {
        self.catch_panics = enabled;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.batch_limit == 0 {
            return Err(SqlError::Config(
                "batch_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Single-threaded cooperative scheduler.
///
/// Units registered here are resumed in FIFO order; a continuing unit goes
/// to the back of the queue. The queue lock is never held across a
/// resumption, so units may register further units from inside `resume`.
pub struct Scheduler {
    /// Registered units awaiting their next resumption.
    queue: Mutex<VecDeque<Box<dyn Resumable>>>,

    /// Configuration.
    config: SchedulerConfig,

    /// Statistics.
    stats: SchedulerCounters,
}

impl Scheduler {
    /// Create a scheduler with the default configuration.
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            config: SchedulerConfig::default(),
            stats: SchedulerCounters::default(),
        }
    }

    /// Create a scheduler with a custom configuration.
    pub fn with_config(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            queue: Mutex::new(VecDeque::new()),
            config,
            stats: SchedulerCounters::default(),
        })
    }

    /// Register a resumable unit. It will be resumed on the next tick.
    pub fn register<U>(&self, unit: U)
    where
        U: Resumable + 'static,
    {
        self.queue.lock().push_back(Box::new(unit));
        self.stats.units_registered.fetch_add(1, Ordering::Relaxed);
        trace!("registered resumable unit");
    }

    /// Resume up to `batch_limit` queued units once each.
    ///
    /// Returns the number of units resumed; zero means the scheduler is
    /// idle.
    pub fn tick(&self) -> usize {
        let mut batch: Vec<Box<dyn Resumable>> = {
            let mut queue = self.queue.lock();
            let count = queue.len().min(self.config.batch_limit);
            queue.drain(..count).collect()
        };

        let resumed = batch.len();
        for mut unit in batch.drain(..) {
            let outcome = if self.config.catch_panics {
                match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| unit.resume())) {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        error!("resumable unit panicked; deregistering");
                        self.stats.unit_panics.fetch_add(1, Ordering::Relaxed);
                        Tick::Stop
                    }
                }
            } else {
                unit.resume()
            };

            match outcome {
                Tick::Continue => self.queue.lock().push_back(unit),
                Tick::Stop => {
                    self.stats.units_completed.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        self.stats.ticks.fetch_add(1, Ordering::Relaxed);
        self.stats
            .resumes
            .fetch_add(resumed as u64, Ordering::Relaxed);
        resumed
    }

    /// Tick until no unit remains registered.
    pub fn run_until_idle(&self) {
        while self.tick() > 0 {}
    }

    /// Number of units currently awaiting resumption.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Snapshot of scheduler statistics.
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            units_registered: self.stats.units_registered.load(Ordering::Relaxed),
            units_completed: self.stats.units_completed.load(Ordering::Relaxed),
            unit_panics: self.stats.unit_panics.load(Ordering::Relaxed),
            resumes: self.stats.resumes.load(Ordering::Relaxed),
            ticks: self.stats.ticks.load(Ordering::Relaxed),
            pending_units: self.pending(),
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Scheduler statistics (atomic counters).
#[derive(Debug, Default)]
struct SchedulerCounters {
    /// Units registered.
    units_registered: AtomicU64,
    /// Units that returned [`Tick::Stop`].
    units_completed: AtomicU64,
    /// Units dropped after panicking.
    unit_panics: AtomicU64,
    /// Total resumptions.
    resumes: AtomicU64,
    /// Ticks executed.
    ticks: AtomicU64,
}

/// Snapshot of scheduler statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Units registered.
    pub units_registered: u64,
    /// Units completed.
    pub units_completed: u64,
    /// Units dropped after panicking.
    pub unit_panics: u64,
    /// Total resumptions.
    pub resumes: u64,
    /// Ticks executed.
    pub ticks: u64,
    /// Units currently awaiting resumption.
    pub pending_units: usize,
}
