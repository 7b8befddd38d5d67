// Backend pipeline stages and the registry that orders them
use super::error::StageTransitionError;
use chrono::{DateTime, Utc};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Queued => "queued",
            StageStatus::Running => "running",
            StageStatus::Completed => "completed",
            StageStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessStage {
    pub id: u32,
    pub name: String,
    pub status: StageStatus,
    pub progress: u8,
    pub started_at: Option<DateTime<Utc>>,
    pub duration: Option<Duration>,
    pub failure: Option<String>,
}

impl ProcessStage {
    fn queued(id: u32, name: String) -> Self {
        Self {
            id,
            name,
            status: StageStatus::Queued,
            progress: 0,
            started_at: None,
            duration: None,
            failure: None,
        }
    }

    /// "HH:MM:SS" or a placeholder before the stage starts.
    pub fn start_time_label(&self) -> String {
        match self.started_at {
            Some(at) => at.format("%H:%M:%S").to_string(),
            None => "--:--:--".to_string(),
        }
    }

    pub fn duration_label(&self) -> String {
        match self.duration {
            Some(d) => format!("{:.1}s", d.as_secs_f64()),
            None => "--".to_string(),
        }
    }

    fn finish(&mut self, status: StageStatus, now: DateTime<Utc>) {
        self.status = status;
        if let Some(started) = self.started_at {
            self.duration = (now - started).to_std().ok();
        }
    }
}

/// A transition reported by the job backend.
#[derive(Debug, Clone, PartialEq)]
pub enum StageEvent {
    Started { stage_id: u32 },
    Progress { stage_id: u32, progress: u8 },
    Completed { stage_id: u32 },
    Failed { stage_id: u32, reason: String },
}

impl StageEvent {
    pub fn stage_id(&self) -> u32 {
        match self {
            StageEvent::Started { stage_id }
            | StageEvent::Progress { stage_id, .. }
            | StageEvent::Completed { stage_id }
            | StageEvent::Failed { stage_id, .. } => *stage_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemStatus {
    pub active: usize,
    pub queued: usize,
    pub halted: bool,
    pub finished: bool,
}

/// Ordered pipeline stages.
///
/// Stages move Queued -> Running -> Completed | Failed and never go back,
/// except that a Failed stage may be re-queued by `retry`. At most one stage
/// runs at a time and a stage only starts once every earlier stage has
/// completed, so a failure halts everything after it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRegistry {
    stages: Vec<ProcessStage>,
}

impl ProcessRegistry {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let stages = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| ProcessStage::queued(i as u32 + 1, name.into()))
            .collect();
        Self { stages }
    }

    pub fn stages(&self) -> &[ProcessStage] {
        &self.stages
    }

    pub fn stage(&self, id: u32) -> Option<&ProcessStage> {
        self.stages.iter().find(|s| s.id == id)
    }

    fn index_of(&self, id: u32) -> Result<usize, StageTransitionError> {
        self.stages
            .iter()
            .position(|s| s.id == id)
            .ok_or(StageTransitionError::UnknownStage(id))
    }

    pub fn running(&self) -> Option<&ProcessStage> {
        self.stages.iter().find(|s| s.status == StageStatus::Running)
    }

    /// The stage that would start next, if the pipeline is free to move.
    pub fn next_eligible(&self) -> Option<&ProcessStage> {
        if self.running().is_some() {
            return None;
        }
        self.stages
            .iter()
            .find(|s| s.status != StageStatus::Completed)
            .filter(|s| s.status == StageStatus::Queued)
    }

    /// Stages that still have work to do, in order.
    pub fn pending_ids(&self) -> Vec<u32> {
        self.stages
            .iter()
            .filter(|s| s.status != StageStatus::Completed)
            .map(|s| s.id)
            .collect()
    }

    pub fn is_halted(&self) -> bool {
        self.stages.iter().any(|s| s.status == StageStatus::Failed)
    }

    pub fn is_finished(&self) -> bool {
        self.stages.iter().all(|s| s.status == StageStatus::Completed)
    }

    pub fn system_status(&self) -> SystemStatus {
        SystemStatus {
            active: self.count(StageStatus::Running),
            queued: self.count(StageStatus::Queued),
            halted: self.is_halted(),
            finished: self.is_finished(),
        }
    }

    fn count(&self, status: StageStatus) -> usize {
        self.stages.iter().filter(|s| s.status == status).count()
    }

    /// Queued -> Running, subject to pipeline order.
    pub fn start(&mut self, id: u32, now: DateTime<Utc>) -> Result<(), StageTransitionError> {
        let idx = self.index_of(id)?;
        if self.stages[idx].status != StageStatus::Queued {
            return Err(StageTransitionError::NotQueued(id));
        }
        if let Some(blocking) = self.stages[..idx]
            .iter()
            .find(|s| s.status != StageStatus::Completed)
        {
            return Err(StageTransitionError::PredecessorIncomplete {
                stage: id,
                blocking: blocking.id,
            });
        }
        if let Some(running) = self.running() {
            return Err(StageTransitionError::AnotherRunning {
                stage: id,
                running: running.id,
            });
        }

        let stage = &mut self.stages[idx];
        stage.status = StageStatus::Running;
        stage.started_at = Some(now);
        stage.duration = None;
        stage.failure = None;
        Ok(())
    }

    /// Moves a running stage's progress forward. Reaching 100 completes it.
    pub fn set_progress(
        &mut self,
        id: u32,
        progress: u8,
        now: DateTime<Utc>,
    ) -> Result<StageStatus, StageTransitionError> {
        let idx = self.index_of(id)?;
        let stage = &mut self.stages[idx];
        if stage.status != StageStatus::Running {
            return Err(StageTransitionError::NotRunning(id));
        }
        let progress = progress.min(100);
        if progress < stage.progress {
            return Err(StageTransitionError::ProgressRegression {
                stage: id,
                current: stage.progress,
                requested: progress,
            });
        }
        stage.progress = progress;
        if progress == 100 {
            stage.finish(StageStatus::Completed, now);
        }
        Ok(stage.status)
    }

    pub fn complete(&mut self, id: u32, now: DateTime<Utc>) -> Result<(), StageTransitionError> {
        self.set_progress(id, 100, now).map(|_| ())
    }

    /// Running -> Failed. A queued stage may also fail if it is the next one
    /// eligible to run, which covers a backend that could not start it.
    pub fn fail(
        &mut self,
        id: u32,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), StageTransitionError> {
        let idx = self.index_of(id)?;
        match self.stages[idx].status {
            StageStatus::Running => {}
            StageStatus::Queued if self.next_eligible().map(|s| s.id) == Some(id) => {}
            _ => return Err(StageTransitionError::NotRunning(id)),
        }
        let stage = &mut self.stages[idx];
        stage.failure = Some(reason.into());
        stage.finish(StageStatus::Failed, now);
        Ok(())
    }

    /// Fails whichever stage the pipeline is currently on. Used when the
    /// backend connection itself breaks and no stage id is known.
    pub fn fail_frontier(&mut self, reason: impl Into<String>, now: DateTime<Utc>) -> Option<u32> {
        let id = self
            .running()
            .or_else(|| self.next_eligible())
            .map(|s| s.id)?;
        self.fail(id, reason, now).ok().map(|_| id)
    }

    /// Failed -> Queued, clearing progress and timing.
    pub fn retry(&mut self, id: u32) -> Result<(), StageTransitionError> {
        let idx = self.index_of(id)?;
        let stage = &mut self.stages[idx];
        if stage.status != StageStatus::Failed {
            return Err(StageTransitionError::NotFailed(id));
        }
        *stage = ProcessStage::queued(stage.id, std::mem::take(&mut stage.name));
        Ok(())
    }

    pub fn apply(
        &mut self,
        event: &StageEvent,
        now: DateTime<Utc>,
    ) -> Result<(), StageTransitionError> {
        match event {
            StageEvent::Started { stage_id } => self.start(*stage_id, now),
            StageEvent::Progress { stage_id, progress } => {
                self.set_progress(*stage_id, *progress, now).map(|_| ())
            }
            StageEvent::Completed { stage_id } => self.complete(*stage_id, now),
            StageEvent::Failed { stage_id, reason } => self.fail(*stage_id, reason.clone(), now),
        }
    }

    /// Puts every stage back to Queued for a fresh submission.
    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            *stage = ProcessStage::queued(stage.id, std::mem::take(&mut stage.name));
        }
    }
}
