#![forbid(unsafe_code)]

//! Deferred job queue backing "next tick" semantics.
//!
//! Work queued with [`Scheduler::next_tick`] does not run until the host
//! calls [`Scheduler::flush`], once per update cycle. Jobs may queue more
//! jobs; those run in the same flush, in later rounds.
//!
//! # Invariants
//!
//! 1. Jobs run in FIFO order within a round; a round never includes jobs
//!    queued during that round.
//! 2. `flush` never runs more than `max_flush_rounds` rounds. Jobs still
//!    pending after the limit stay queued and the flush reports
//!    [`ReactiveError::FlushOverflow`].
//! 3. A flush started while another flush is running (from inside a job) is
//!    a no-op that returns `Ok(0)`.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::error::{ReactiveError, Result};

/// Configuration for [`Scheduler`] flushing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Upper bound on job-queues-job rounds in a single flush.
    pub max_flush_rounds: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_flush_rounds: 100,
        }
    }
}

impl SchedulerConfig {
    #[must_use]
    pub fn with_max_flush_rounds(mut self, rounds: usize) -> Self {
        self.max_flush_rounds = rounds.max(1);
        self
    }
}

type Job = Box<dyn FnOnce()>;

struct SchedulerInner {
    config: SchedulerConfig,
    queue: RefCell<VecDeque<Job>>,
    flushing: Cell<bool>,
    ticks: Cell<u64>,
}

/// Single-threaded FIFO scheduler. Cloning yields another handle to the same
/// queue.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<SchedulerInner>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.inner.config)
            .field("pending", &self.pending())
            .field("ticks", &self.inner.ticks.get())
            .finish()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl Scheduler {
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            inner: Rc::new(SchedulerInner {
                config,
                queue: RefCell::new(VecDeque::new()),
                flushing: Cell::new(false),
                ticks: Cell::new(0),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> SchedulerConfig {
        self.inner.config
    }

    /// Queue `job` to run on the next flush.
    pub fn next_tick(&self, job: impl FnOnce() + 'static) {
        self.inner.queue.borrow_mut().push_back(Box::new(job));
    }

    /// Number of queued jobs.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// Number of completed flushes.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.inner.ticks.get()
    }

    #[must_use]
    pub fn is_flushing(&self) -> bool {
        self.inner.flushing.get()
    }

    /// Run queued jobs until the queue is empty.
    ///
    /// Returns the number of jobs run.
    ///
    /// # Errors
    ///
    /// [`ReactiveError::FlushOverflow`] if jobs keep queueing jobs past the
    /// configured round limit.
    pub fn flush(&self) -> Result<usize> {
        if self.inner.flushing.replace(true) {
            return Ok(0);
        }
        let _reset = FlushGuard(&self.inner.flushing);

        let mut ran = 0usize;
        for _ in 0..self.inner.config.max_flush_rounds {
            let round = std::mem::take(&mut *self.inner.queue.borrow_mut());
            if round.is_empty() {
                self.inner.ticks.set(self.inner.ticks.get() + 1);
                tracing::trace!(jobs = ran, "scheduler flushed");
                return Ok(ran);
            }
            for job in round {
                job();
                ran += 1;
            }
        }

        let pending = self.pending();
        if pending == 0 {
            self.inner.ticks.set(self.inner.ticks.get() + 1);
            return Ok(ran);
        }
        tracing::warn!(
            rounds = self.inner.config.max_flush_rounds,
            pending,
            "scheduler flush overflow"
        );
        Err(ReactiveError::FlushOverflow {
            rounds: self.inner.config.max_flush_rounds,
            pending,
        })
    }
}

struct FlushGuard<'a>(&'a Cell<bool>);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}
