// Job backend that plays a stage pipeline on a timer
use crate::application::ports::{JobBackend, StageEventStream, StageRequest, StoredVideo};
use crate::domain::error::TransportError;
use crate::domain::process::StageEvent;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SimulatedJobBackend {
    tick: Duration,
    step: u8,
    /// Stage id that fails the first time it runs. 0 disables injection.
    fail_once: Arc<AtomicU32>,
    offline: Arc<AtomicBool>,
}

impl SimulatedJobBackend {
    pub fn new(tick: Duration, step: u8) -> Self {
        Self {
            tick,
            step: step.clamp(1, 100),
            fail_once: Arc::new(AtomicU32::new(0)),
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_failure_once(self, stage_id: u32) -> Self {
        self.fail_once.store(stage_id, Ordering::SeqCst);
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl JobBackend for SimulatedJobBackend {
    async fn submit(
        &self,
        video: &StoredVideo,
        stages: &[StageRequest],
    ) -> Result<StageEventStream, TransportError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(TransportError::Unreachable("simulated backend is offline".to_string()));
        }
        if stages.is_empty() {
            return Err(TransportError::Rejected("no stages requested".to_string()));
        }

        tracing::info!(
            "Simulated backend accepted {} with {} stages",
            video.reference,
            stages.len()
        );

        let stages = stages.to_vec();
        let tick = self.tick;
        let step = self.step;
        let fail_once = self.fail_once.clone();

        let events = async_stream::stream! {
            'stages: for stage in stages {
                tokio::time::sleep(tick).await;
                yield Ok::<_, TransportError>(StageEvent::Started { stage_id: stage.stage_id });

                let should_fail = fail_once
                    .compare_exchange(stage.stage_id, 0, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok();

                let mut progress: u8 = 0;
                loop {
                    tokio::time::sleep(tick).await;
                    if should_fail && progress >= 50 {
                        yield Ok(StageEvent::Failed {
                            stage_id: stage.stage_id,
                            reason: format!("{} aborted", stage.name),
                        });
                        break 'stages;
                    }
                    progress = progress.saturating_add(step).min(100);
                    if progress >= 100 {
                        yield Ok(StageEvent::Completed { stage_id: stage.stage_id });
                        break;
                    }
                    yield Ok(StageEvent::Progress { stage_id: stage.stage_id, progress });
                }
            }
        };

        Ok(Box::pin(events))
    }
}
