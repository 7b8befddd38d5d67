// Cancellable scheduled tasks on the tokio timer
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// What a tick callback wants the schedule to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Stop,
}

/// A spawned task that is aborted when the guard is dropped.
#[derive(Debug)]
pub struct TaskGuard {
    handle: JoinHandle<()>,
}

impl TaskGuard {
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(future),
        }
    }

    pub fn cancel(self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Calls `on_tick` every `period`, first after one full period, until it
/// returns `TickOutcome::Stop` or the task is cancelled.
///
/// Ticks never overlap: the next one is not awaited until the callback's
/// future resolves. Abort alone does not stop a callback that is already
/// running, so owners that must not observe a late tick also check an epoch
/// under their own lock (see `TaskSlot`).
pub fn every<F, Fut>(period: Duration, mut on_tick: F) -> TaskGuard
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = TickOutcome> + Send + 'static,
{
    TaskGuard::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if on_tick().await == TickOutcome::Stop {
                break;
            }
        }
    })
}

/// Holds at most one scheduled task and the epoch that identifies it.
///
/// Arming a new task, or disarming, cancels the previous one and bumps the
/// epoch. A task that wakes up with a stale epoch must do nothing.
#[derive(Debug, Default)]
pub struct TaskSlot {
    epoch: u64,
    task: Option<TaskGuard>,
}

impl TaskSlot {
    /// Cancels any current task and reserves the epoch for the next one.
    pub fn next_epoch(&mut self) -> u64 {
        self.disarm();
        self.epoch
    }

    pub fn arm(&mut self, epoch: u64, task: TaskGuard) {
        debug_assert_eq!(epoch, self.epoch);
        self.task = Some(task);
    }

    pub fn disarm(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        if let Some(task) = self.task.take() {
            task.cancel();
        }
    }

    /// Called from inside the task when it finishes on its own.
    pub fn release(&mut self, epoch: u64) {
        if self.is_current(epoch) {
            self.epoch = self.epoch.wrapping_add(1);
            // Dropping our own handle from inside the task only aborts at the
            // next await, which never comes because the loop breaks.
            self.task = None;
        }
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.task.is_some() && self.epoch == epoch
    }

    pub fn is_armed(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}
