// HTTP request handlers
use crate::application::dashboard_session::SessionError;
use crate::application::process_monitor::MonitorSnapshot;
use crate::domain::error::StageTransitionError;
use crate::infrastructure::ndjson_stream::stream_from_broadcast;
use crate::presentation::app_state::AppState;
use crate::presentation::dto::{
    AnalysisDto, ErrorDto, ParametersRequest, PlaybackDto, ProcessesDto, SelectFileRequest,
    TabsDto, UploadDto,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

fn error_response(status: StatusCode, kind: &'static str, error: impl ToString) -> Response {
    (
        status,
        Json(ErrorDto {
            kind,
            error: error.to_string(),
        }),
    )
        .into_response()
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn get_tabs(State(state): State<Arc<AppState>>) -> Json<TabsDto> {
    Json(TabsDto::new(state.session.active_tab().await))
}

/// Switch the visible view
pub async fn select_tab(
    Path(tab): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match state.session.select_tab_id(&tab).await {
        Ok(active) => Json(TabsDto::new(active)).into_response(),
        Err(e) => {
            // The frontend only links known tabs.
            tracing::error!("Navigation outside the tab set: {}", e);
            error_response(StatusCode::NOT_FOUND, "invalid_selection", e)
        }
    }
}

pub async fn get_playback(State(state): State<Arc<AppState>>) -> Json<PlaybackDto> {
    Json(state.session.playback.snapshot().await.into())
}

/// Only plays while the Analysis tab is active
pub async fn start_playback(State(state): State<Arc<AppState>>) -> Json<PlaybackDto> {
    Json(state.session.start_playback().await.into())
}

pub async fn stop_playback(State(state): State<Arc<AppState>>) -> Json<PlaybackDto> {
    Json(state.session.stop_playback().await.into())
}

pub async fn toggle_playback(State(state): State<Arc<AppState>>) -> Json<PlaybackDto> {
    Json(state.session.toggle_playback().await.into())
}

/// Flow metrics, overlay markers and timeline for the current sample set
pub async fn get_analysis(State(state): State<Arc<AppState>>) -> Json<AnalysisDto> {
    Json(state.session.analysis.view().await.into())
}

pub async fn update_parameters(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ParametersRequest>,
) -> Response {
    let analysis = &state.session.analysis;
    match analysis
        .update_params(request.velocity_threshold, request.measurement_point_count)
        .await
    {
        Ok(_) => Json(AnalysisDto::from(analysis.view().await)).into_response(),
        Err(e) => error_response(StatusCode::UNPROCESSABLE_ENTITY, "validation_error", e),
    }
}

pub async fn get_upload(State(state): State<Arc<AppState>>) -> Json<UploadDto> {
    Json(state.session.uploads.snapshot().await.into())
}

/// Select a file and start the simulated upload
pub async fn select_file(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SelectFileRequest>,
) -> Response {
    match state.session.uploads.select(request.file.map(Into::into)).await {
        Ok(snapshot) => Json(UploadDto::from(snapshot)).into_response(),
        Err(e) => error_response(StatusCode::UNPROCESSABLE_ENTITY, "validation_error", e),
    }
}

/// Hand the completed upload to the job backend
pub async fn start_processing(State(state): State<Arc<AppState>>) -> Response {
    match state.session.start_processing().await {
        Ok(snapshot) => processes_response(&state, &snapshot),
        Err(SessionError::Validation(e)) => {
            error_response(StatusCode::CONFLICT, "validation_error", e)
        }
        Err(SessionError::Storage(e)) => {
            tracing::error!("Error storing upload: {:#}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", e)
        }
    }
}

fn processes_response(state: &AppState, snapshot: &MonitorSnapshot) -> Response {
    Json(ProcessesDto::new(snapshot, &state.session.activity.recent())).into_response()
}

pub async fn get_processes(State(state): State<Arc<AppState>>) -> Json<ProcessesDto> {
    let snapshot = state.session.processes.snapshot().await;
    Json(ProcessesDto::new(&snapshot, &state.session.activity.recent()))
}

pub async fn retry_stage(
    Path(id): Path<u32>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match state.session.processes.retry(id).await {
        Ok(snapshot) => processes_response(&state, &snapshot),
        Err(e @ StageTransitionError::UnknownStage(_)) => {
            error_response(StatusCode::NOT_FOUND, "stage_transition_error", e)
        }
        Err(e) => error_response(StatusCode::CONFLICT, "stage_transition_error", e),
    }
}

/// Stream backend tab snapshots as they change (NDJSON)
pub async fn stream_processes(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let processes = &state.session.processes;
    let activity = state.session.activity.clone();
    let rx = processes.subscribe();
    let initial = ProcessesDto::new(&processes.snapshot().await, &activity.recent());
    stream_from_broadcast(initial, rx, move |snapshot| {
        ProcessesDto::new(&snapshot, &activity.recent())
    })
}
