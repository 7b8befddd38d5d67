// Collaborator traits the dashboard calls out to
use crate::domain::error::TransportError;
use crate::domain::process::StageEvent;
use crate::domain::upload::UploadFile;
use crate::domain::velocity::{AnalysisParameters, VelocitySample, VideoSource};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Reference to a video held by file storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredVideo {
    pub reference: String,
    pub name: String,
}

/// Stage the backend is asked to run, identified the way the registry does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRequest {
    pub stage_id: u32,
    pub name: String,
}

pub type StageEventStream = BoxStream<'static, Result<StageEvent, TransportError>>;

#[async_trait]
pub trait AnalysisEngine: Send + Sync {
    /// Compute velocity samples for a video with the given parameters
    async fn analyze(
        &self,
        source: &VideoSource,
        params: &AnalysisParameters,
    ) -> anyhow::Result<Vec<VelocitySample>>;
}

#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Submit a stored video for processing. The returned stream reports
    /// stage transitions for `stages`, in order, and ends when the last
    /// stage completes or one fails.
    async fn submit(
        &self,
        video: &StoredVideo,
        stages: &[StageRequest],
    ) -> Result<StageEventStream, TransportError>;
}

pub trait FileStorage: Send + Sync {
    /// Reference that lets the UI preview a selected file before it is stored
    fn preview_ref(&self, file: &UploadFile) -> String;

    /// Persist a previewed file and return its stored reference
    fn store(&self, file: &UploadFile, preview_ref: &str) -> anyhow::Result<StoredVideo>;
}
