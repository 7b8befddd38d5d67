// Process monitor - Runs queued videos through the job backend's stage pipeline
use crate::application::activity_feed::ActivityFeed;
use crate::application::ports::{JobBackend, StageRequest, StoredVideo};
use crate::domain::error::{StageTransitionError, TransportError};
use crate::domain::jobs::{JobQueue, JobStatus, ProcessingJob};
use crate::domain::process::{ProcessRegistry, ProcessStage, StageEvent, StageStatus};
use crate::infrastructure::scheduler::{TaskGuard, TaskSlot};
use chrono::Utc;
use futures::StreamExt;
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, Mutex};

const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Stage pipeline and processing queue, taken under one lock.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSnapshot {
    pub registry: ProcessRegistry,
    pub jobs: Vec<ProcessingJob>,
}

#[derive(Debug)]
struct MonitorInner {
    registry: ProcessRegistry,
    jobs: JobQueue,
    /// The video the registry is tracking.
    video: Option<StoredVideo>,
    consumer: TaskSlot,
}

impl MonitorInner {
    fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            registry: self.registry.clone(),
            jobs: self.jobs.iter().cloned().collect(),
        }
    }
}

#[derive(Clone)]
pub struct ProcessMonitor {
    inner: Arc<Mutex<MonitorInner>>,
    backend: Arc<dyn JobBackend>,
    updates: broadcast::Sender<MonitorSnapshot>,
    activity: ActivityFeed,
}

/// What a consumer task holds on to. It must not keep the monitor alive.
struct WeakMonitor {
    inner: Weak<Mutex<MonitorInner>>,
    backend: Arc<dyn JobBackend>,
    updates: broadcast::Sender<MonitorSnapshot>,
    activity: ActivityFeed,
}

impl WeakMonitor {
    fn upgrade(&self) -> Option<ProcessMonitor> {
        Some(ProcessMonitor {
            inner: self.inner.upgrade()?,
            backend: self.backend.clone(),
            updates: self.updates.clone(),
            activity: self.activity.clone(),
        })
    }
}

impl ProcessMonitor {
    pub fn new<I, S>(backend: Arc<dyn JobBackend>, stage_names: I, activity: ActivityFeed) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(MonitorInner {
                registry: ProcessRegistry::new(stage_names),
                jobs: JobQueue::default(),
                video: None,
                consumer: TaskSlot::default(),
            })),
            backend,
            updates,
            activity,
        }
    }

    pub async fn registry(&self) -> ProcessRegistry {
        self.inner.lock().await.registry.clone()
    }

    pub async fn snapshot(&self) -> MonitorSnapshot {
        self.inner.lock().await.snapshot()
    }

    /// Receives a snapshot after every applied transition.
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorSnapshot> {
        self.updates.subscribe()
    }

    /// Queues `video` for processing. It starts right away unless another
    /// video holds the pipeline. A video that is already queued or
    /// processing is not added again.
    pub async fn submit(&self, video: StoredVideo) -> MonitorSnapshot {
        let mut inner = self.inner.lock().await;
        if inner.jobs.enqueue(&video.reference, &video.name, Utc::now()) {
            tracing::info!("Queued {} for processing", video.reference);
        } else {
            tracing::debug!("{} is already queued", video.reference);
        }
        self.start_next_job(&mut inner);
        self.publish(&inner);
        inner.snapshot()
    }

    /// Re-queues a failed stage and resumes the pipeline from it.
    pub async fn retry(&self, stage_id: u32) -> Result<MonitorSnapshot, StageTransitionError> {
        let mut inner = self.inner.lock().await;
        inner.registry.retry(stage_id)?;
        tracing::info!("Retrying stage {}", stage_id);
        if let Some(stage) = inner.registry.stage(stage_id) {
            self.activity.info(format!("Retrying {}", stage.name));
        }
        if let Some(video) = inner.video.clone() {
            inner.jobs.set_status(&video.reference, JobStatus::Processing);
            self.spawn_consumer(&mut inner);
        }
        self.publish(&inner);
        Ok(inner.snapshot())
    }

    pub async fn dispose(&self) {
        self.inner.lock().await.consumer.disarm();
    }

    pub async fn is_consuming(&self) -> bool {
        self.inner.lock().await.consumer.is_armed()
    }

    fn downgrade(&self) -> WeakMonitor {
        WeakMonitor {
            inner: Arc::downgrade(&self.inner),
            backend: self.backend.clone(),
            updates: self.updates.clone(),
            activity: self.activity.clone(),
        }
    }

    fn publish(&self, inner: &MonitorInner) {
        // No subscribers is fine.
        let _ = self.updates.send(inner.snapshot());
    }

    /// Hands the pipeline to the oldest queued job if nothing is processing.
    /// A failed job gives up the pipeline to the next one.
    fn start_next_job(&self, inner: &mut MonitorInner) {
        let Some(job) = inner.jobs.start_next() else {
            return;
        };
        let video = StoredVideo {
            reference: job.reference.clone(),
            name: job.name.clone(),
        };
        inner.consumer.disarm();
        inner.registry.reset();
        tracing::info!("Submitting {} for processing", video.reference);
        self.activity.info(format!("STIV analysis started for {}", video.name));
        inner.video = Some(video);
        self.spawn_consumer(inner);
    }

    fn spawn_consumer(&self, inner: &mut MonitorInner) {
        let Some(video) = inner.video.clone() else {
            return;
        };
        let requests: Vec<StageRequest> = inner
            .registry
            .pending_ids()
            .into_iter()
            .filter_map(|id| inner.registry.stage(id))
            .map(|s| StageRequest {
                stage_id: s.id,
                name: s.name.clone(),
            })
            .collect();

        let epoch = inner.consumer.next_epoch();
        let task = TaskGuard::spawn(Self::consume(self.downgrade(), video, requests, epoch));
        inner.consumer.arm(epoch, task);
    }

    async fn consume(
        monitor: WeakMonitor,
        video: StoredVideo,
        requests: Vec<StageRequest>,
        epoch: u64,
    ) {
        let mut events = match monitor.backend.submit(&video, &requests).await {
            Ok(events) => events,
            Err(e) => {
                if let Some(this) = monitor.upgrade() {
                    this.fail_current(epoch, e).await;
                }
                return;
            }
        };

        while let Some(item) = events.next().await {
            let Some(this) = monitor.upgrade() else {
                return;
            };
            let mut inner = this.inner.lock().await;
            if !inner.consumer.is_current(epoch) {
                return;
            }
            match item {
                Ok(event) => this.apply_event(&mut inner, &event, epoch),
                Err(e) => {
                    drop(inner);
                    this.fail_current(epoch, e).await;
                    return;
                }
            }
            this.publish(&inner);
        }

        // Still current means the pipeline neither finished nor halted.
        let Some(this) = monitor.upgrade() else {
            return;
        };
        let inner = this.inner.lock().await;
        if !inner.consumer.is_current(epoch) {
            return;
        }
        drop(inner);
        this.fail_current(epoch, TransportError::StreamClosed).await;
    }

    fn apply_event(&self, inner: &mut MonitorInner, event: &StageEvent, epoch: u64) {
        let before = inner.registry.stage(event.stage_id()).map(|s| s.status);
        if let Err(e) = inner.registry.apply(event, Utc::now()) {
            tracing::warn!("Ignoring backend event {:?}: {}", event, e);
            return;
        }
        tracing::debug!("Applied backend event {:?}", event);
        if let Some(stage) = inner.registry.stage(event.stage_id()) {
            if Some(stage.status) != before {
                self.record_transition(stage);
            }
        }
        self.settle(inner, epoch);
    }

    /// A transport failure becomes a Failed stage; the session carries on.
    async fn fail_current(&self, epoch: u64, error: TransportError) {
        let mut inner = self.inner.lock().await;
        if !inner.consumer.is_current(epoch) {
            return;
        }
        tracing::warn!("Job backend error: {}", error);
        if let Some(stage_id) = inner.registry.fail_frontier(error.to_string(), Utc::now()) {
            tracing::warn!("Stage {} marked failed", stage_id);
            if let Some(stage) = inner.registry.stage(stage_id) {
                self.record_transition(stage);
            }
        }
        self.settle(&mut inner, epoch);
        if inner.consumer.is_current(epoch) {
            inner.consumer.release(epoch);
        }
        self.publish(&inner);
    }

    /// Closes out the current job once its pipeline finished or halted.
    fn settle(&self, inner: &mut MonitorInner, epoch: u64) {
        let Some(video) = inner.video.clone() else {
            return;
        };
        if inner.registry.is_finished() {
            inner.consumer.release(epoch);
            inner.jobs.set_status(&video.reference, JobStatus::Completed);
            tracing::info!("Pipeline finished for {}", video.reference);
            self.activity.info(format!("Processing of {} complete", video.name));
            self.start_next_job(inner);
        } else if inner.registry.is_halted() {
            inner.consumer.release(epoch);
            inner.jobs.set_status(&video.reference, JobStatus::Failed);
        }
    }

    fn record_transition(&self, stage: &ProcessStage) {
        match stage.status {
            StageStatus::Queued => {}
            StageStatus::Running => self.activity.debug(format!("{} started", stage.name)),
            StageStatus::Completed => self.activity.info(format!("{} complete", stage.name)),
            StageStatus::Failed => self.activity.warn(format!(
                "{} failed: {}",
                stage.name,
                stage.failure.as_deref().unwrap_or("unknown error")
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::StageEventStream;
    use crate::infrastructure::simulated_backend::SimulatedJobBackend;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::time::Duration;

    const TICK: Duration = Duration::from_millis(10);
    const STAGES: [&str; 4] = [
        "Video Preprocessing",
        "STIV Analysis Engine",
        "Velocity Calculation",
        "Data Export",
    ];

    /// Plays back one hand-written event list per submission.
    struct ScriptedBackend {
        scripts: std::sync::Mutex<VecDeque<Vec<Result<StageEvent, TransportError>>>>,
    }

    impl ScriptedBackend {
        fn new(scripts: Vec<Vec<Result<StageEvent, TransportError>>>) -> Arc<Self> {
            Arc::new(Self {
                scripts: std::sync::Mutex::new(scripts.into()),
            })
        }
    }

    #[async_trait]
    impl JobBackend for ScriptedBackend {
        async fn submit(
            &self,
            _video: &StoredVideo,
            _stages: &[StageRequest],
        ) -> Result<StageEventStream, TransportError> {
            let script = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
            Ok(futures::stream::iter(script).boxed())
        }
    }

    fn video(name: &str) -> StoredVideo {
        StoredVideo {
            reference: format!("stiv://videos/{}", name),
            name: name.to_string(),
        }
    }

    fn monitor(backend: Arc<dyn JobBackend>, stages: &[&str]) -> ProcessMonitor {
        ProcessMonitor::new(backend, stages.iter().copied(), ActivityFeed::default())
    }

    fn simulated() -> Arc<SimulatedJobBackend> {
        Arc::new(SimulatedJobBackend::new(TICK, 25))
    }

    /// Lets spawned consumers drain whatever is ready.
    async fn drain() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    fn assert_order_invariant(registry: &ProcessRegistry) {
        for (i, stage) in registry.stages().iter().enumerate() {
            if stage.status == StageStatus::Running {
                assert!(
                    registry.stages()[..i]
                        .iter()
                        .all(|s| s.status == StageStatus::Completed)
                );
            }
        }
    }

    fn job_statuses(snapshot: &MonitorSnapshot) -> Vec<JobStatus> {
        snapshot.jobs.iter().map(|j| j.status).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_pipeline_runs_to_completion() {
        let monitor = monitor(simulated(), &STAGES);
        let mut updates = monitor.subscribe();

        monitor.submit(video("a.mp4")).await;
        loop {
            let snapshot = updates.recv().await.unwrap();
            assert_order_invariant(&snapshot.registry);
            if snapshot.registry.is_finished() {
                break;
            }
        }

        let snapshot = monitor.snapshot().await;
        assert!(snapshot.registry.stages().iter().all(|s| s.progress == 100));
        assert_eq!(job_statuses(&snapshot), vec![JobStatus::Completed]);
        tokio::time::sleep(TICK).await;
        assert!(!monitor.is_consuming().await);

        let messages: Vec<String> = monitor
            .activity
            .recent()
            .into_iter()
            .map(|e| e.message)
            .collect();
        assert!(messages.contains(&"Video Preprocessing complete".to_string()));
        assert_eq!(messages[0], "Processing of a.mp4 complete");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_halts_then_retry_resumes() {
        let backend = Arc::new(SimulatedJobBackend::new(TICK, 25).with_failure_once(2));
        let monitor = monitor(backend, &STAGES);

        monitor.submit(video("a.mp4")).await;
        tokio::time::sleep(TICK * 40).await;

        let snapshot = monitor.snapshot().await;
        let registry = &snapshot.registry;
        assert_eq!(registry.stage(1).unwrap().status, StageStatus::Completed);
        assert_eq!(registry.stage(2).unwrap().status, StageStatus::Failed);
        assert_eq!(registry.stage(3).unwrap().status, StageStatus::Queued);
        assert!(registry.is_halted());
        assert_eq!(job_statuses(&snapshot), vec![JobStatus::Failed]);

        let snapshot = monitor.retry(2).await.unwrap();
        assert_eq!(snapshot.registry.stage(2).unwrap().status, StageStatus::Queued);
        assert_eq!(job_statuses(&snapshot), vec![JobStatus::Processing]);
        tokio::time::sleep(TICK * 100).await;
        let snapshot = monitor.snapshot().await;
        assert!(snapshot.registry.is_finished());
        assert_eq!(job_statuses(&snapshot), vec![JobStatus::Completed]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_backend_fails_first_stage() {
        let backend = simulated();
        backend.set_offline(true);
        let monitor = monitor(backend.clone(), &STAGES);

        monitor.submit(video("a.mp4")).await;
        drain().await;
        let registry = monitor.registry().await;
        let first = registry.stage(1).unwrap();
        assert_eq!(first.status, StageStatus::Failed);
        assert!(first.failure.as_deref().unwrap().contains("unreachable"));

        backend.set_offline(false);
        monitor.retry(1).await.unwrap();
        tokio::time::sleep(TICK * 100).await;
        assert!(monitor.registry().await.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_error_fails_running_stage() {
        let backend = ScriptedBackend::new(vec![
            vec![
                Ok(StageEvent::Started { stage_id: 1 }),
                Ok(StageEvent::Progress { stage_id: 1, progress: 40 }),
                Err(TransportError::Unreachable("connection reset".to_string())),
            ],
            vec![
                Ok(StageEvent::Started { stage_id: 1 }),
                Ok(StageEvent::Completed { stage_id: 1 }),
                Ok(StageEvent::Started { stage_id: 2 }),
                Ok(StageEvent::Completed { stage_id: 2 }),
            ],
        ]);
        let monitor = monitor(backend, &["Video Preprocessing", "Data Export"]);

        monitor.submit(video("a.mp4")).await;
        drain().await;
        let snapshot = monitor.snapshot().await;
        let first = snapshot.registry.stage(1).unwrap();
        assert_eq!(first.status, StageStatus::Failed);
        assert_eq!(first.progress, 40);
        assert!(first.failure.as_deref().unwrap().contains("connection reset"));
        assert_eq!(snapshot.registry.stage(2).unwrap().status, StageStatus::Queued);
        assert_eq!(job_statuses(&snapshot), vec![JobStatus::Failed]);
        assert!(!monitor.is_consuming().await);

        monitor.retry(1).await.unwrap();
        drain().await;
        let snapshot = monitor.snapshot().await;
        assert!(snapshot.registry.is_finished());
        assert_eq!(job_statuses(&snapshot), vec![JobStatus::Completed]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_early_end_of_stream_fails_frontier() {
        let backend = ScriptedBackend::new(vec![
            vec![
                Ok(StageEvent::Started { stage_id: 1 }),
                Ok(StageEvent::Completed { stage_id: 1 }),
                Ok(StageEvent::Started { stage_id: 2 }),
            ],
            vec![
                Ok(StageEvent::Started { stage_id: 2 }),
                Ok(StageEvent::Completed { stage_id: 2 }),
            ],
        ]);
        let monitor = monitor(backend, &["Video Preprocessing", "Data Export"]);

        monitor.submit(video("a.mp4")).await;
        drain().await;
        let registry = monitor.registry().await;
        assert_eq!(registry.stage(1).unwrap().status, StageStatus::Completed);
        let second = registry.stage(2).unwrap();
        assert_eq!(second.status, StageStatus::Failed);
        assert_eq!(
            second.failure.as_deref(),
            Some(TransportError::StreamClosed.to_string().as_str())
        );

        monitor.retry(2).await.unwrap();
        drain().await;
        assert!(monitor.registry().await.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_of_non_failed_stage_is_rejected() {
        let monitor = monitor(simulated(), &STAGES);
        assert_eq!(
            monitor.retry(1).await.unwrap_err(),
            StageTransitionError::NotFailed(1)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_video_waits_in_queue() {
        let monitor = monitor(simulated(), &STAGES);
        monitor.submit(video("a.mp4")).await;
        tokio::time::sleep(TICK * 12).await;

        let snapshot = monitor.submit(video("b.mp4")).await;
        assert_eq!(
            job_statuses(&snapshot),
            vec![JobStatus::Processing, JobStatus::Queued]
        );
        assert!(snapshot.registry.stage(2).is_some_and(|s| s.status != StageStatus::Queued));

        let snapshot = monitor.submit(video("a.mp4")).await;
        assert_eq!(snapshot.jobs.len(), 2);

        // a finishes at 20 ticks and hands over to b.
        tokio::time::sleep(TICK * 13 + TICK / 2).await;
        let snapshot = monitor.snapshot().await;
        assert_eq!(
            job_statuses(&snapshot),
            vec![JobStatus::Completed, JobStatus::Processing]
        );

        tokio::time::sleep(TICK * 100).await;
        let snapshot = monitor.snapshot().await;
        assert_eq!(
            job_statuses(&snapshot),
            vec![JobStatus::Completed, JobStatus::Completed]
        );
        assert!(snapshot.registry.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_job_gives_way_to_next_submission() {
        let backend = Arc::new(SimulatedJobBackend::new(TICK, 25).with_failure_once(1));
        let monitor = monitor(backend, &STAGES);
        monitor.submit(video("a.mp4")).await;
        tokio::time::sleep(TICK * 10).await;
        assert!(monitor.registry().await.is_halted());

        let snapshot = monitor.submit(video("b.mp4")).await;
        assert_eq!(
            job_statuses(&snapshot),
            vec![JobStatus::Failed, JobStatus::Processing]
        );
        assert!(snapshot.registry.stages().iter().all(|s| s.status == StageStatus::Queued));
        tokio::time::sleep(TICK * 100).await;
        assert!(monitor.registry().await.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_stops_consumption() {
        let monitor = monitor(simulated(), &STAGES);
        monitor.submit(video("a.mp4")).await;
        tokio::time::sleep(TICK * 3 + TICK / 2).await;
        monitor.dispose().await;
        let before = monitor.snapshot().await;
        tokio::time::sleep(TICK * 100).await;
        assert_eq!(monitor.snapshot().await, before);
        assert!(!monitor.is_consuming().await);
    }
}
