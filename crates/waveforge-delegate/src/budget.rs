//! Run-scoped budget accounting
//!
//! Counters are atomics because every task of a wave acquires tool calls
//! concurrently. Acquisition uses `fetch_update`, so a denied attempt never bumps the
//! consumed count past the ceiling.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use waveforge_utils::error::DelegateError;
use waveforge_utils::types::{BudgetLimit, BudgetUsage, RuntimeBudget};

/// Tracks consumed tool calls, iterations and wall-clock time against a [`RuntimeBudget`].
#[derive(Debug)]
pub struct BudgetTracker {
    limits: RuntimeBudget,
    tool_calls: AtomicU32,
    tool_calls_denied: AtomicU32,
    iterations: AtomicU32,
    started: Mutex<Instant>,
    exhausted: Mutex<Option<BudgetLimit>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl BudgetTracker {
    #[must_use]
    pub fn new(limits: RuntimeBudget) -> Self {
        debug!(
            max_tool_calls = ?limits.max_tool_calls,
            max_iterations = ?limits.max_iterations,
            max_duration_ms = ?limits.max_duration_ms,
            "Creating BudgetTracker"
        );
        Self {
            limits,
            tool_calls: AtomicU32::new(0),
            tool_calls_denied: AtomicU32::new(0),
            iterations: AtomicU32::new(0),
            started: Mutex::new(Instant::now()),
            exhausted: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn limits(&self) -> &RuntimeBudget {
        &self.limits
    }

    /// Zero every counter and restart the clock. Called at the start of each run.
    pub fn reset(&self) {
        self.tool_calls.store(0, Ordering::SeqCst);
        self.tool_calls_denied.store(0, Ordering::SeqCst);
        self.iterations.store(0, Ordering::SeqCst);
        *lock(&self.started) = Instant::now();
        *lock(&self.exhausted) = None;
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        lock(&self.started).elapsed()
    }

    /// Time left before `max_duration_ms`, or `None` when duration is unlimited.
    #[must_use]
    pub fn remaining_duration(&self) -> Option<Duration> {
        self.limits
            .max_duration_ms
            .map(|max| Duration::from_millis(max).saturating_sub(self.elapsed()))
    }

    /// Record that `limit` stopped work. The first recorded limit wins.
    pub fn mark_exhausted(&self, limit: BudgetLimit) {
        let mut exhausted = lock(&self.exhausted);
        if exhausted.is_none() {
            warn!(limit = %limit, "Run budget exhausted");
            *exhausted = Some(limit);
        }
    }

    #[must_use]
    pub fn exhausted(&self) -> Option<BudgetLimit> {
        *lock(&self.exhausted)
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted().is_some()
    }

    /// Fail when the wall-clock ceiling has been reached.
    pub fn check_duration(&self) -> Result<(), DelegateError> {
        let Some(max) = self.limits.max_duration_ms else {
            return Ok(());
        };
        let elapsed = millis(self.elapsed());
        if elapsed >= max {
            self.mark_exhausted(BudgetLimit::MaxDuration);
            return Err(DelegateError::BudgetExceeded {
                limit: BudgetLimit::MaxDuration,
                used: elapsed,
                max,
            });
        }
        Ok(())
    }

    /// Consume one tool call. Returns the 1-based call number on success.
    ///
    /// The duration ceiling is checked first, then the tool-call ceiling.
    pub fn try_acquire_tool_call(&self) -> Result<u32, DelegateError> {
        self.check_duration()?;
        let max = self.limits.max_tool_calls;
        match self
            .tool_calls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| match max {
                Some(max) if current >= max => None,
                _ => Some(current.saturating_add(1)),
            }) {
            Ok(previous) => {
                debug!(call = previous + 1, max = ?max, "Tool call acquired");
                Ok(previous + 1)
            }
            Err(current) => {
                self.tool_calls_denied.fetch_add(1, Ordering::SeqCst);
                self.mark_exhausted(BudgetLimit::MaxToolCalls);
                Err(DelegateError::BudgetExceeded {
                    limit: BudgetLimit::MaxToolCalls,
                    used: u64::from(current),
                    max: u64::from(max.unwrap_or(current)),
                })
            }
        }
    }

    /// Consume one iteration (a wave or a quality check). Returns the 1-based count.
    pub fn begin_iteration(&self) -> Result<u32, DelegateError> {
        self.check_duration()?;
        let max = self.limits.max_iterations;
        self.iterations
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| match max {
                Some(max) if current >= max => None,
                _ => Some(current.saturating_add(1)),
            })
            .map(|previous| previous + 1)
            .map_err(|current| {
                self.mark_exhausted(BudgetLimit::MaxIterations);
                DelegateError::BudgetExceeded {
                    limit: BudgetLimit::MaxIterations,
                    used: u64::from(current),
                    max: u64::from(max.unwrap_or(current)),
                }
            })
    }

    #[must_use]
    pub fn tool_calls_used(&self) -> u32 {
        self.tool_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn iterations_used(&self) -> u32 {
        self.iterations.load(Ordering::SeqCst)
    }

    /// Snapshot of the counters for reporting.
    #[must_use]
    pub fn usage(&self) -> BudgetUsage {
        BudgetUsage {
            tool_calls_used: self.tool_calls_used(),
            tool_calls_denied: self.tool_calls_denied.load(Ordering::SeqCst),
            iterations_used: self.iterations_used(),
            elapsed_ms: millis(self.elapsed()),
            limits: self.limits,
            exhausted: self.exhausted(),
        }
    }
}
