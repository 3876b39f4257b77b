//! Fan-out data types.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::fanout::error::{FanOutError, WorkerError};

/// Latency reported by a downstream service; also the middleman's response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayReport {
    #[serde(rename = "delay")]
    pub delay_ms: u64,
}

impl DelayReport {
    pub fn new(delay_ms: u64) -> Self {
        Self { delay_ms }
    }
}

/// Terminal state of one worker.
#[derive(Debug)]
pub struct WorkerRecord {
    pub worker: usize,
    pub result: Result<DelayReport, WorkerError>,
}

/// Success/failure counts for one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
}

/// Request-scoped collection of worker records, in completion order.
#[derive(Debug, Default)]
pub struct FanOutResult {
    records: Vec<WorkerRecord>,
}

impl FanOutResult {
    pub fn with_capacity(workers: usize) -> Self {
        Self {
            records: Vec::with_capacity(workers),
        }
    }

    pub fn push(&mut self, record: WorkerRecord) {
        self.records.push(record);
    }

    /// Number of workers that reached a terminal state.
    pub fn worker_count(&self) -> usize {
        self.records.len()
    }

    /// Delays reported by the workers that succeeded.
    pub fn delays(&self) -> impl Iterator<Item = u64> + '_ {
        self.records
            .iter()
            .filter_map(|r| r.result.as_ref().ok().map(|d| d.delay_ms))
    }

    pub fn tally(&self) -> Tally {
        let mut tally = Tally::default();
        for record in &self.records {
            match &record.result {
                Ok(_) => tally.succeeded += 1,
                Err(WorkerError::Cancelled) => tally.cancelled += 1,
                Err(_) => tally.failed += 1,
            }
        }
        tally
    }

    /// Rounded mean of the successful delays, `None` when nothing succeeded.
    ///
    /// Rounds half away from zero. Independent of completion order.
    pub fn mean_delay(&self) -> Option<u64> {
        let (sum, count) = self
            .delays()
            .fold((0u128, 0u128), |(sum, count), d| (sum + u128::from(d), count + 1));
        if count == 0 {
            return None;
        }
        let mean = (sum + count / 2) / count;
        Some(u64::try_from(mean).unwrap_or(u64::MAX))
    }
}

/// The value written to the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationOutcome {
    pub delay_ms: u64,
}

impl AggregationOutcome {
    /// `round(mean(successful delays)) + local_delay_ms`.
    pub fn compose(result: &FanOutResult, local_delay_ms: u64) -> Result<Self, FanOutError> {
        let mean = result.mean_delay().ok_or(FanOutError::Exhausted {
            workers: result.worker_count(),
        })?;
        Ok(Self {
            delay_ms: mean.saturating_add(local_delay_ms),
        })
    }

    pub fn report(&self) -> DelayReport {
        DelayReport::new(self.delay_ms)
    }
}

/// Source of the locally simulated delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocalDelay {
    /// Uniform in `[0, max)` from the thread RNG.
    #[default]
    Random,
    /// Uniform in `[0, max)` from a fresh RNG seeded per request.
    Seeded(u64),
    /// Always this many milliseconds, regardless of the bound.
    Fixed(u64),
}

impl LocalDelay {
    pub fn from_seed(seed: Option<u64>) -> Self {
        seed.map_or(Self::Random, Self::Seeded)
    }

    pub fn sample(&self, max_ms: u64) -> u64 {
        match *self {
            Self::Fixed(ms) => ms,
            _ if max_ms == 0 => 0,
            Self::Random => rand::thread_rng().gen_range(0..max_ms),
            Self::Seeded(seed) => StdRng::seed_from_u64(seed).gen_range(0..max_ms),
        }
    }
}
