// Error conditions raised by the dashboard's session objects
use thiserror::Error;

/// Rejected input at upload selection or parameter entry. Reported inline,
/// the operation is not started.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("no file selected")]
    MissingFile,

    #[error("unsupported file type '{content_type}'")]
    UnsupportedType { content_type: String },

    #[error("file is {size_bytes} bytes, limit is {max_bytes} bytes")]
    TooLarge { size_bytes: u64, max_bytes: u64 },

    #[error("{parameter} must be between {min} and {max}, got {value}")]
    ParameterOutOfRange {
        parameter: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("no completed upload to process")]
    NoCompletedUpload,
}

/// Failure talking to the job backend. Surfaces as a Failed stage.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("job backend unreachable: {0}")]
    Unreachable(String),

    #[error("job backend rejected the request: {0}")]
    Rejected(String),

    #[error("job backend closed the event stream before the pipeline finished")]
    StreamClosed,
}

/// Navigation to a tab outside the closed set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown tab '{0}'")]
pub struct InvalidSelection(pub String);

/// A stage transition that would break the registry's ordering or
/// monotonicity rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageTransitionError {
    #[error("stage {0} does not exist")]
    UnknownStage(u32),

    #[error("stage {0} is not queued")]
    NotQueued(u32),

    #[error("stage {0} is not running")]
    NotRunning(u32),

    #[error("stage {0} has not failed")]
    NotFailed(u32),

    #[error("stage {stage} cannot start before stage {blocking} completes")]
    PredecessorIncomplete { stage: u32, blocking: u32 },

    #[error("stage {stage} cannot start while stage {running} is running")]
    AnotherRunning { stage: u32, running: u32 },

    #[error("stage {stage} progress cannot go from {current} to {requested}")]
    ProgressRegression { stage: u32, current: u8, requested: u8 },
}
