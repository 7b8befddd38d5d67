// Playback clock - Advances the frame counter on a fixed cadence while playing
use crate::domain::playback::PlaybackState;
use crate::infrastructure::scheduler::{every, TickOutcome, TaskSlot};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Debug)]
struct ClockInner {
    state: PlaybackState,
    timer: TaskSlot,
}

#[derive(Clone)]
pub struct PlaybackClock {
    inner: Arc<Mutex<ClockInner>>,
    tick: Duration,
}

impl PlaybackClock {
    pub fn new(frame_count: u32, tick: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ClockInner {
                state: PlaybackState::new(frame_count),
                timer: TaskSlot::default(),
            })),
            tick,
        }
    }

    pub async fn snapshot(&self) -> PlaybackState {
        self.inner.lock().await.state
    }

    /// Begins advancing frames. Starting while already playing keeps the
    /// existing timer.
    pub(crate) async fn start(&self) -> PlaybackState {
        let mut inner = self.inner.lock().await;
        self.start_locked(&mut inner);
        inner.state
    }

    /// Cancels the pending tick before returning; no tick lands afterwards.
    pub async fn stop(&self) -> PlaybackState {
        let mut inner = self.inner.lock().await;
        Self::stop_locked(&mut inner);
        inner.state
    }

    pub(crate) async fn toggle(&self) -> PlaybackState {
        let mut inner = self.inner.lock().await;
        if inner.state.is_playing() {
            Self::stop_locked(&mut inner);
        } else {
            self.start_locked(&mut inner);
        }
        inner.state
    }

    fn start_locked(&self, inner: &mut ClockInner) {
        if inner.state.start() {
            let epoch = inner.timer.next_epoch();
            let weak = Arc::downgrade(&self.inner);
            let task = every(self.tick, move || Self::tick_once(weak.clone(), epoch));
            inner.timer.arm(epoch, task);
            tracing::info!(frame = inner.state.current_frame(), "Playback started");
        }
    }

    fn stop_locked(inner: &mut ClockInner) {
        inner.timer.disarm();
        if inner.state.stop() {
            tracing::info!(frame = inner.state.current_frame(), "Playback stopped");
        }
    }

    pub async fn has_active_timer(&self) -> bool {
        self.inner.lock().await.timer.is_armed()
    }

    async fn tick_once(inner: Weak<Mutex<ClockInner>>, epoch: u64) -> TickOutcome {
        // The clock itself is gone.
        let Some(inner) = inner.upgrade() else {
            return TickOutcome::Stop;
        };
        let mut inner = inner.lock().await;
        if !inner.timer.is_current(epoch) {
            return TickOutcome::Stop;
        }
        inner.state.advance();
        tracing::trace!(frame = inner.state.current_frame(), "Playback tick");
        TickOutcome::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(100);

    fn clock() -> PlaybackClock {
        PlaybackClock::new(100, TICK)
    }

    async fn ticks(n: u32) {
        tokio::time::sleep(TICK * n + TICK / 2).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_ticks_then_stop_holds_frame() {
        let clock = clock();
        let state = clock.snapshot().await;
        assert!(!state.is_playing());
        assert_eq!(state.current_frame(), 0);

        clock.start().await;
        ticks(3).await;
        assert_eq!(clock.snapshot().await.current_frame(), 3);

        let state = clock.stop().await;
        assert_eq!(state.current_frame(), 3);
        ticks(2).await;
        assert_eq!(clock.snapshot().await.current_frame(), 3);
        assert!(!clock.has_active_timer().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_frame_is_tick_count_mod_100() {
        let clock = clock();
        clock.start().await;
        ticks(137).await;
        assert_eq!(clock.snapshot().await.current_frame(), 37);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_resumes_from_last_frame() {
        let clock = clock();
        clock.start().await;
        ticks(5).await;
        clock.stop().await;
        clock.start().await;
        ticks(2).await;
        assert_eq!(clock.snapshot().await.current_frame(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_start_keeps_single_timer() {
        let clock = clock();
        clock.start().await;
        clock.start().await;
        clock.start().await;
        ticks(4).await;
        assert_eq!(clock.snapshot().await.current_frame(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle() {
        let clock = clock();
        assert!(clock.toggle().await.is_playing());
        ticks(1).await;
        assert!(!clock.toggle().await.is_playing());
        ticks(3).await;
        assert_eq!(clock.snapshot().await.current_frame(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_toggles_cancel_out() {
        let clock = clock();
        let (a, b) = tokio::join!(clock.toggle(), clock.toggle());
        assert_ne!(a.is_playing(), b.is_playing());

        let state = clock.snapshot().await;
        assert!(!state.is_playing());
        assert!(!clock.has_active_timer().await);
        ticks(3).await;
        assert_eq!(clock.snapshot().await.current_frame(), 0);
    }
}
