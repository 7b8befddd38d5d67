// Dashboard session - Tab selection and the three views it mounts
use crate::application::activity_feed::ActivityFeed;
use crate::application::analysis_service::AnalysisService;
use crate::application::playback_clock::PlaybackClock;
use crate::application::ports::{AnalysisEngine, FileStorage, JobBackend};
use crate::application::process_monitor::{MonitorSnapshot, ProcessMonitor};
use crate::application::upload_simulator::UploadSimulator;
use crate::domain::activity::DEFAULT_LOG_CAPACITY;
use crate::domain::error::{InvalidSelection, ValidationError};
use crate::domain::navigation::{Tab, TabSelection};
use crate::domain::playback::PlaybackState;
use crate::domain::upload::UploadStatus;
use crate::domain::velocity::VideoSource;
use crate::infrastructure::config::DashboardConfig;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// One user's dashboard. Each view's state is owned by its own service;
/// the session decides which view is active and whether the player may run.
#[derive(Clone)]
pub struct DashboardSession {
    tabs: Arc<Mutex<TabSelection>>,
    pub playback: PlaybackClock,
    pub uploads: UploadSimulator,
    pub processes: ProcessMonitor,
    pub analysis: AnalysisService,
    pub activity: ActivityFeed,
    storage: Arc<dyn FileStorage>,
}

impl DashboardSession {
    pub async fn open(
        config: &DashboardConfig,
        engine: Arc<dyn AnalysisEngine>,
        backend: Arc<dyn JobBackend>,
        storage: Arc<dyn FileStorage>,
    ) -> anyhow::Result<Self> {
        let activity = ActivityFeed::new(DEFAULT_LOG_CAPACITY);
        let session = Self {
            tabs: Arc::new(Mutex::new(TabSelection::default())),
            playback: PlaybackClock::new(config.playback.frame_count, config.playback.tick()),
            uploads: UploadSimulator::new(
                storage.clone(),
                config.upload.policy(),
                config.upload.tick(),
                config.upload.increment,
                activity.clone(),
            ),
            processes: ProcessMonitor::new(
                backend,
                config.backend.stages.iter().cloned(),
                activity.clone(),
            ),
            analysis: AnalysisService::new(engine, config.analysis.params()?, activity.clone()),
            activity,
            storage,
        };
        session.analysis.run(VideoSource::Reference).await?;
        tracing::info!("Dashboard session opened");
        Ok(session)
    }

    pub async fn active_tab(&self) -> Tab {
        self.tabs.lock().await.active()
    }

    /// Switches views. Leaving Analysis unmounts the player, which stops
    /// playback and cancels its timer.
    pub async fn select_tab(&self, tab: Tab) -> Tab {
        let mut tabs = self.tabs.lock().await;
        let previous = tabs.select(tab);
        if previous == Tab::Analysis && tab != Tab::Analysis {
            self.playback.stop().await;
        }
        if previous != tab {
            tracing::debug!("Switched tab {} -> {}", previous, tab);
        }
        tab
    }

    /// Starts playback if the player is mounted. Off the Analysis tab this
    /// is a no-op that returns the current state.
    pub async fn start_playback(&self) -> PlaybackState {
        let tabs = self.tabs.lock().await;
        if tabs.active() != Tab::Analysis {
            tracing::debug!("Ignoring playback start on the {} tab", tabs.active());
            return self.playback.snapshot().await;
        }
        self.playback.start().await
    }

    /// Same gating as `start_playback`.
    pub async fn toggle_playback(&self) -> PlaybackState {
        let tabs = self.tabs.lock().await;
        if tabs.active() != Tab::Analysis {
            tracing::debug!("Ignoring playback toggle on the {} tab", tabs.active());
            return self.playback.snapshot().await;
        }
        self.playback.toggle().await
    }

    pub async fn stop_playback(&self) -> PlaybackState {
        self.playback.stop().await
    }

    pub async fn select_tab_id(&self, id: &str) -> Result<Tab, InvalidSelection> {
        let tab = id.parse::<Tab>()?;
        Ok(self.select_tab(tab).await)
    }

    /// "Start STIV Analysis": stores the completed upload, hands it to the
    /// job backend and reruns the analysis engine on it.
    pub async fn start_processing(&self) -> Result<MonitorSnapshot, SessionError> {
        let upload = self.uploads.snapshot().await;
        let session = match upload.session {
            Some(session) if upload.status == UploadStatus::Complete => session,
            _ => return Err(ValidationError::NoCompletedUpload.into()),
        };

        let stored = self.storage.store(&session.file, &session.preview_ref)?;
        let snapshot = self.processes.submit(stored).await;

        let source = VideoSource::Uploaded {
            preview_ref: session.preview_ref,
        };
        if let Err(e) = self.analysis.run(source).await {
            tracing::warn!("Analysis of uploaded video failed: {}", e);
        }
        Ok(snapshot)
    }

    /// Cancels every timer and background task the session owns.
    pub async fn shutdown(&self) {
        self.playback.stop().await;
        self.uploads.dispose().await;
        self.processes.dispose().await;
        tracing::info!("Dashboard session closed");
    }
}
