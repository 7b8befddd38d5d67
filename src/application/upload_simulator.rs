// Upload simulator - Drives one upload session's progress on a timer
use crate::application::activity_feed::ActivityFeed;
use crate::application::ports::FileStorage;
use crate::domain::error::ValidationError;
use crate::domain::upload::{UploadFile, UploadPolicy, UploadSession, UploadStatus};
use crate::infrastructure::scheduler::{every, TickOutcome, TaskSlot};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;

/// Point-in-time view of the upload panel.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadSnapshot {
    pub session: Option<UploadSession>,
    pub status: UploadStatus,
    pub progress: u8,
}

impl UploadSnapshot {
    /// The "Start STIV Analysis" button is live only for a finished upload.
    pub fn can_start_analysis(&self) -> bool {
        self.session.is_some() && self.status == UploadStatus::Complete
    }
}

#[derive(Debug, Default)]
struct UploadInner {
    session: Option<UploadSession>,
    timer: TaskSlot,
}

impl UploadInner {
    fn snapshot(&self) -> UploadSnapshot {
        let (status, progress) = match &self.session {
            Some(session) => (session.status(), session.progress()),
            None => (UploadStatus::Idle, 0),
        };
        UploadSnapshot {
            session: self.session.clone(),
            status,
            progress,
        }
    }
}

#[derive(Clone)]
pub struct UploadSimulator {
    inner: Arc<Mutex<UploadInner>>,
    storage: Arc<dyn FileStorage>,
    policy: UploadPolicy,
    tick: Duration,
    increment: u8,
    activity: ActivityFeed,
}

impl UploadSimulator {
    pub fn new(
        storage: Arc<dyn FileStorage>,
        policy: UploadPolicy,
        tick: Duration,
        increment: u8,
        activity: ActivityFeed,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(UploadInner::default())),
            storage,
            policy,
            tick,
            increment: increment.max(1),
            activity,
        }
    }

    pub async fn snapshot(&self) -> UploadSnapshot {
        self.inner.lock().await.snapshot()
    }

    /// Starts a new upload session for `file`, replacing the current one.
    ///
    /// A rejected file leaves the current session, and its timer, untouched.
    /// An accepted file cancels the previous session's timer before the new
    /// one is armed, so at most one upload timer exists at any moment.
    pub async fn select(
        &self,
        file: Option<UploadFile>,
    ) -> Result<UploadSnapshot, ValidationError> {
        let file = file.ok_or(ValidationError::MissingFile)?;
        if let Err(e) = self.policy.validate(&file) {
            tracing::warn!("Rejected upload {}: {}", file.name, e);
            self.activity.warn(format!("Upload rejected: {}", e));
            return Err(e);
        }

        let preview_ref = self.storage.preview_ref(&file);
        let mut inner = self.inner.lock().await;
        let epoch = inner.timer.next_epoch();
        if let Some(previous) = inner
            .session
            .as_ref()
            .filter(|s| s.status() == UploadStatus::Uploading)
        {
            tracing::info!(
                "Replacing upload {} at {}%",
                previous.file.name,
                previous.progress()
            );
        }

        tracing::info!(
            "Uploading {} ({:.2} MB) as {}",
            file.name,
            file.size_mb(),
            preview_ref
        );
        inner.session = Some(UploadSession::new(file, preview_ref));

        let weak = Arc::downgrade(&self.inner);
        let increment = self.increment;
        let activity = self.activity.clone();
        let task = every(self.tick, move || {
            Self::tick_once(weak.clone(), epoch, increment, activity.clone())
        });
        inner.timer.arm(epoch, task);

        Ok(inner.snapshot())
    }

    /// Cancels the in-flight upload timer, if any. The session keeps the
    /// progress it reached.
    pub async fn dispose(&self) {
        self.inner.lock().await.timer.disarm();
    }

    pub async fn has_active_timer(&self) -> bool {
        self.inner.lock().await.timer.is_armed()
    }

    async fn tick_once(
        inner: Weak<Mutex<UploadInner>>,
        epoch: u64,
        increment: u8,
        activity: ActivityFeed,
    ) -> TickOutcome {
        let Some(inner) = inner.upgrade() else {
            return TickOutcome::Stop;
        };
        let mut inner = inner.lock().await;
        if !inner.timer.is_current(epoch) {
            return TickOutcome::Stop;
        }
        let Some(session) = inner.session.as_mut() else {
            inner.timer.release(epoch);
            return TickOutcome::Stop;
        };

        match session.advance(increment) {
            UploadStatus::Complete => {
                tracing::info!("Upload of {} complete", session.file.name);
                activity.info(format!("Video upload successful: {}", session.file.name));
                inner.timer.release(epoch);
                TickOutcome::Stop
            }
            _ => {
                tracing::debug!("Upload of {} at {}%", session.file.name, session.progress());
                TickOutcome::Continue
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::file_storage::InMemoryFileStorage;

    const TICK: Duration = Duration::from_millis(200);

    fn simulator() -> UploadSimulator {
        UploadSimulator::new(
            Arc::new(InMemoryFileStorage::default()),
            UploadPolicy::default(),
            TICK,
            10,
            ActivityFeed::default(),
        )
    }

    fn clip(name: &str) -> UploadFile {
        UploadFile::new(name, 8 * 1024 * 1024, "video/mp4")
    }

    async fn ticks(n: u32) {
        tokio::time::sleep(TICK * n + TICK / 2).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_before_selection() {
        let snapshot = simulator().snapshot().await;
        assert_eq!(snapshot.status, UploadStatus::Idle);
        assert_eq!(snapshot.progress, 0);
        assert!(!snapshot.can_start_analysis());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ten_ticks_complete_upload() {
        let uploads = simulator();
        let snapshot = uploads.select(Some(clip("a.mp4"))).await.unwrap();
        assert_eq!(snapshot.status, UploadStatus::Uploading);
        assert_eq!(snapshot.progress, 0);
        assert!(snapshot.session.unwrap().preview_ref.starts_with("blob:"));

        let mut last = 0;
        for _ in 0..9 {
            tokio::time::sleep(TICK).await;
            let snapshot = uploads.snapshot().await;
            assert!(snapshot.progress >= last);
            assert_ne!(snapshot.status, UploadStatus::Complete);
            last = snapshot.progress;
        }

        ticks(1).await;
        let snapshot = uploads.snapshot().await;
        assert_eq!(snapshot.progress, 100);
        assert_eq!(snapshot.status, UploadStatus::Complete);
        assert!(snapshot.can_start_analysis());
        assert!(!uploads.has_active_timer().await);
        let recent = uploads.activity.recent();
        assert_eq!(recent[0].message, "Video upload successful: a.mp4");

        ticks(5).await;
        assert_eq!(uploads.snapshot().await.progress, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_file_is_rejected_without_state_change() {
        let uploads = simulator();
        uploads.select(Some(clip("a.mp4"))).await.unwrap();
        ticks(2).await;

        assert_eq!(uploads.select(None).await, Err(ValidationError::MissingFile));
        let snapshot = uploads.snapshot().await;
        assert_eq!(snapshot.session.unwrap().file.name, "a.mp4");
        assert_eq!(snapshot.progress, 20);
        assert!(uploads.has_active_timer().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_type_is_rejected() {
        let uploads = simulator();
        let result = uploads
            .select(Some(UploadFile::new("notes.txt", 10, "text/plain")))
            .await;
        assert!(matches!(result, Err(ValidationError::UnsupportedType { .. })));
        assert_eq!(uploads.snapshot().await.status, UploadStatus::Idle);
        assert_eq!(uploads.activity.recent()[0].level.as_str(), "WARN");
        assert!(!uploads.has_active_timer().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_selection_replaces_first_timer() {
        let uploads = simulator();
        uploads.select(Some(clip("a.mp4"))).await.unwrap();
        ticks(4).await;
        assert_eq!(uploads.snapshot().await.progress, 40);

        let snapshot = uploads.select(Some(clip("b.mp4"))).await.unwrap();
        let session = snapshot.session.unwrap();
        assert_eq!(session.file.name, "b.mp4");
        assert_eq!(snapshot.progress, 0);
        assert_eq!(snapshot.status, UploadStatus::Uploading);

        // One tick of b's timer; a's would have double counted.
        ticks(1).await;
        assert_eq!(uploads.snapshot().await.progress, 10);
        tokio::time::sleep(TICK * 3).await;
        assert_eq!(uploads.snapshot().await.progress, 40);
        assert!(uploads.has_active_timer().await);
        tokio::time::sleep(TICK * 7).await;
        assert_eq!(uploads.snapshot().await.status, UploadStatus::Complete);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_cancels_timer() {
        let uploads = simulator();
        uploads.select(Some(clip("a.mp4"))).await.unwrap();
        ticks(3).await;
        uploads.dispose().await;
        ticks(5).await;
        let snapshot = uploads.snapshot().await;
        assert_eq!(snapshot.progress, 30);
        assert!(!uploads.has_active_timer().await);
    }
}
