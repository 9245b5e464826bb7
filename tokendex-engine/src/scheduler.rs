//! Deferred task scheduling.
//!
//! The undo window needs "run this later unless cancelled". `TokioScheduler`
//! does it with real (or paused) tokio time; `ManualScheduler` lets tests
//! move a virtual clock by hand.

use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Deferred unit of work
pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a scheduled task.
#[derive(Debug, Clone, Default)]
pub struct TimerHandle {
    token: CancellationToken,
}

impl TimerHandle {
    fn new() -> Self {
        Self::default()
    }

    /// Prevent the task from running. No-op once it has run.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Clock plus one-shot timers.
pub trait Scheduler: Send + Sync {
    /// Current instant on this scheduler's clock
    fn now(&self) -> Instant;

    /// Run `task` once after `delay` unless the handle is cancelled first.
    ///
    /// The task never runs before this call returns.
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle;
}

// =============================================================================
// Tokio Scheduler
// =============================================================================

/// Scheduler backed by the tokio timer. Must be used inside a runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        let handle = TimerHandle::new();
        let token = handle.token.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {},
                _ = tokio::time::sleep(delay) => {
                    if !token.is_cancelled() {
                        task();
                    }
                },
            }
        });

        handle
    }
}

// =============================================================================
// Manual Scheduler
// =============================================================================

struct ManualTimer {
    due: Duration,
    seq: u64,
    handle: TimerHandle,
    task: TimerTask,
}

/// Scheduler driven by `advance`, for deterministic tests.
pub struct ManualScheduler {
    origin: Instant,
    elapsed: Mutex<Duration>,
    timers: Mutex<Vec<ManualTimer>>,
    next_seq: Mutex<u64>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            timers: Mutex::new(Vec::new()),
            next_seq: Mutex::new(0),
        }
    }

    /// Move the clock forward and run every due, uncancelled task in due
    /// order. Returns how many tasks ran.
    pub fn advance(&self, by: Duration) -> usize {
        let target = {
            let mut elapsed = self.elapsed.lock();
            *elapsed += by;
            *elapsed
        };

        let mut fired = 0;
        // Locks are released before each task runs; tasks may schedule more.
        while let Some(timer) = self.pop_due(target) {
            (timer.task)();
            fired += 1;
        }
        fired
    }

    /// Tasks scheduled and neither run nor cancelled
    pub fn pending(&self) -> usize {
        self.timers.lock().iter().filter(|t| !t.handle.is_cancelled()).count()
    }

    fn pop_due(&self, target: Duration) -> Option<ManualTimer> {
        let mut timers = self.timers.lock();
        timers.retain(|t| !t.handle.is_cancelled());

        let index = timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= target)
            .min_by_key(|(_, t)| (t.due, t.seq))
            .map(|(i, _)| i)?;

        Some(timers.remove(index))
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> Instant {
        self.origin + *self.elapsed.lock()
    }

    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        let handle = TimerHandle::new();
        let due = *self.elapsed.lock() + delay;
        let seq = {
            let mut next = self.next_seq.lock();
            *next += 1;
            *next
        };

        self.timers.lock().push(ManualTimer {
            due,
            seq,
            handle: handle.clone(),
            task,
        });

        handle
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter_task(counter: &Arc<AtomicUsize>) -> TimerTask {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_manual_fires_when_due() {
        let scheduler = ManualScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        scheduler.schedule(Duration::from_secs(10), counter_task(&counter));

        assert_eq!(scheduler.advance(Duration::from_secs(9)), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        assert_eq!(scheduler.advance(Duration::from_secs(1)), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        // At most once
        assert_eq!(scheduler.advance(Duration::from_secs(30)), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_manual_cancelled_never_fires() {
        let scheduler = ManualScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = scheduler.schedule(Duration::from_secs(1), counter_task(&counter));
        assert_eq!(scheduler.pending(), 1);

        handle.cancel();
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.advance(Duration::from_secs(5)), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_manual_clock_moves() {
        let scheduler = ManualScheduler::new();
        let start = scheduler.now();
        scheduler.advance(Duration::from_millis(1500));
        assert_eq!(scheduler.now() - start, Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_fires_after_delay() {
        let counter = Arc::new(AtomicUsize::new(0));
        TokioScheduler.schedule(Duration::from_secs(10), counter_task(&counter));

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_cancel() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = TokioScheduler.schedule(Duration::from_secs(10), counter_task(&counter));

        handle.cancel();
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
