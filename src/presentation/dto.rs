// JSON shapes exchanged with the dashboard frontend
use crate::application::analysis_service::AnalysisView;
use crate::application::process_monitor::MonitorSnapshot;
use crate::application::upload_simulator::UploadSnapshot;
use crate::domain::activity::LogEntry;
use crate::domain::jobs::ProcessingJob;
use crate::domain::navigation::Tab;
use crate::domain::playback::PlaybackState;
use crate::domain::process::ProcessStage;
use crate::domain::upload::{UploadFile, UploadStatus};
use crate::domain::velocity::VideoSource;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabDto {
    pub id: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabsDto {
    pub active: &'static str,
    pub tabs: Vec<TabDto>,
}

impl TabsDto {
    pub fn new(active: Tab) -> Self {
        Self {
            active: active.id(),
            tabs: Tab::ALL
                .iter()
                .map(|t| TabDto {
                    id: t.id(),
                    label: t.label(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackDto {
    pub current_frame: u32,
    pub is_playing: bool,
    pub frame_count: u32,
    pub progress_percent: f64,
    pub readout: String,
}

impl From<PlaybackState> for PlaybackDto {
    fn from(state: PlaybackState) -> Self {
        Self {
            current_frame: state.current_frame(),
            is_playing: state.is_playing(),
            frame_count: state.frame_count(),
            progress_percent: state.progress_percent(),
            readout: state.readout(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParametersDto {
    pub velocity_threshold: f64,
    pub measurement_point_count: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsDto {
    pub max_velocity: Option<f64>,
    pub avg_velocity: Option<f64>,
    pub sample_count: usize,
    pub measurement_points: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerDto {
    pub x: f64,
    pub y: f64,
    pub label: String,
    pub opacity: f64,
    pub above_threshold: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BarDto {
    pub time: f64,
    pub height_percent: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisDto {
    pub source: Option<String>,
    pub parameters: ParametersDto,
    pub metrics: MetricsDto,
    pub overlay: Vec<MarkerDto>,
    pub timeline: Vec<BarDto>,
}

impl From<AnalysisView> for AnalysisDto {
    fn from(view: AnalysisView) -> Self {
        let source = match view.source {
            VideoSource::Reference => None,
            VideoSource::Uploaded { preview_ref } => Some(preview_ref),
        };
        Self {
            source,
            parameters: ParametersDto {
                velocity_threshold: view.params.velocity_threshold,
                measurement_point_count: view.params.measurement_point_count,
            },
            metrics: MetricsDto {
                max_velocity: view.metrics.max_velocity,
                avg_velocity: view.metrics.avg_velocity,
                sample_count: view.metrics.sample_count,
                measurement_points: view.params.measurement_point_count,
            },
            overlay: view
                .overlay
                .into_iter()
                .map(|m| MarkerDto {
                    x: m.position.x,
                    y: m.position.y,
                    label: m.label,
                    opacity: m.opacity,
                    above_threshold: m.above_threshold,
                })
                .collect(),
            timeline: view
                .timeline
                .into_iter()
                .map(|b| BarDto {
                    time: b.time,
                    height_percent: b.height_percent,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDto {
    pub name: String,
    pub size_bytes: u64,
    pub size_mb: String,
    pub content_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadDto {
    pub status: &'static str,
    pub progress: u8,
    pub file: Option<FileDto>,
    pub preview_ref: Option<String>,
    pub can_start_analysis: bool,
}

fn upload_status(status: UploadStatus) -> &'static str {
    match status {
        UploadStatus::Idle => "idle",
        UploadStatus::Uploading => "uploading",
        UploadStatus::Complete => "complete",
    }
}

impl From<UploadSnapshot> for UploadDto {
    fn from(snapshot: UploadSnapshot) -> Self {
        let can_start_analysis = snapshot.can_start_analysis();
        let (file, preview_ref) = match snapshot.session {
            Some(session) => (
                Some(FileDto {
                    size_mb: format!("{:.2}", session.file.size_mb()),
                    name: session.file.name,
                    size_bytes: session.file.size_bytes,
                    content_type: session.file.content_type,
                }),
                Some(session.preview_ref),
            ),
            None => (None, None),
        };
        Self {
            status: upload_status(snapshot.status),
            progress: snapshot.progress,
            file,
            preview_ref,
            can_start_analysis,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageDto {
    pub id: u32,
    pub name: String,
    pub status: &'static str,
    pub progress: u8,
    pub start_time: String,
    pub duration: String,
    pub failure: Option<String>,
}

impl From<&ProcessStage> for StageDto {
    fn from(stage: &ProcessStage) -> Self {
        Self {
            id: stage.id,
            name: stage.name.clone(),
            status: stage.status.as_str(),
            progress: stage.progress,
            start_time: stage.start_time_label(),
            duration: stage.duration_label(),
            failure: stage.failure.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatusDto {
    pub active_processes: usize,
    pub queue_length: usize,
    pub halted: bool,
    pub finished: bool,
}

/// One row of the processing queue panel.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDto {
    pub name: String,
    pub reference: String,
    pub status: &'static str,
    pub submitted_at: String,
}

impl From<&ProcessingJob> for JobDto {
    fn from(job: &ProcessingJob) -> Self {
        Self {
            name: job.name.clone(),
            reference: job.reference.clone(),
            status: job.status.as_str(),
            submitted_at: job.submitted_at.format("%H:%M:%S").to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LogDto {
    pub time: String,
    pub level: &'static str,
    pub message: String,
}

impl From<&LogEntry> for LogDto {
    fn from(entry: &LogEntry) -> Self {
        Self {
            time: entry.time_label(),
            level: entry.level.as_str(),
            message: entry.message.clone(),
        }
    }
}

/// Backend tab: stage pipeline, processing queue and recent logs.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessesDto {
    pub stages: Vec<StageDto>,
    pub system: SystemStatusDto,
    pub jobs: Vec<JobDto>,
    pub logs: Vec<LogDto>,
}

impl ProcessesDto {
    pub fn new(snapshot: &MonitorSnapshot, logs: &[LogEntry]) -> Self {
        let status = snapshot.registry.system_status();
        Self {
            stages: snapshot.registry.stages().iter().map(StageDto::from).collect(),
            system: SystemStatusDto {
                active_processes: status.active,
                queue_length: status.queued,
                halted: status.halted,
                finished: status.finished,
            },
            jobs: snapshot.jobs.iter().map(JobDto::from).collect(),
            logs: logs.iter().map(LogDto::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDto {
    pub kind: &'static str,
    pub error: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRequest {
    pub name: String,
    pub size_bytes: u64,
    pub content_type: String,
}

impl From<FileRequest> for UploadFile {
    fn from(file: FileRequest) -> Self {
        UploadFile::new(file.name, file.size_bytes, file.content_type)
    }
}

#[derive(Debug, Deserialize)]
pub struct SelectFileRequest {
    #[serde(default)]
    pub file: Option<FileRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParametersRequest {
    pub velocity_threshold: Option<f64>,
    pub measurement_point_count: Option<u32>,
}
