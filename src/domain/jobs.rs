// Videos submitted for processing, in submission order
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

pub const DEFAULT_JOB_HISTORY: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Still waiting for, or holding, the pipeline.
    pub fn is_pending(&self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Processing)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingJob {
    pub reference: String,
    pub name: String,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
}

/// The processing queue. At most one job is Processing; the oldest Queued
/// job goes next. Completed and Failed jobs stay as history until the queue
/// holds more than `capacity` jobs, then the oldest of them are dropped.
/// Pending jobs are never dropped.
#[derive(Debug, Clone)]
pub struct JobQueue {
    jobs: VecDeque<ProcessingJob>,
    capacity: usize,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            jobs: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessingJob> {
        self.jobs.iter()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn processing(&self) -> Option<&ProcessingJob> {
        self.jobs.iter().find(|j| j.status == JobStatus::Processing)
    }

    /// Adds a Queued job unless the same video is already pending.
    /// Returns whether a job was added.
    pub fn enqueue(&mut self, reference: &str, name: &str, now: DateTime<Utc>) -> bool {
        if self
            .jobs
            .iter()
            .any(|j| j.reference == reference && j.status.is_pending())
        {
            return false;
        }
        self.jobs.push_back(ProcessingJob {
            reference: reference.to_string(),
            name: name.to_string(),
            status: JobStatus::Queued,
            submitted_at: now,
        });
        self.evict_history();
        true
    }

    /// Moves the oldest Queued job to Processing, unless a job already is.
    pub fn start_next(&mut self) -> Option<&ProcessingJob> {
        if self.processing().is_some() {
            return None;
        }
        let job = self.jobs.iter_mut().find(|j| j.status == JobStatus::Queued)?;
        job.status = JobStatus::Processing;
        Some(&*job)
    }

    /// Sets the status of the newest job for `reference`.
    pub fn set_status(&mut self, reference: &str, status: JobStatus) -> bool {
        match self.jobs.iter_mut().rev().find(|j| j.reference == reference) {
            Some(job) => {
                job.status = status;
                true
            }
            None => false,
        }
    }

    fn evict_history(&mut self) {
        while self.jobs.len() > self.capacity {
            match self.jobs.iter().position(|j| !j.status.is_pending()) {
                Some(idx) => {
                    self.jobs.remove(idx);
                }
                None => break,
            }
        }
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new(DEFAULT_JOB_HISTORY)
    }
}
