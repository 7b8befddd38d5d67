// Upload session domain model
use super::error::ValidationError;

pub const PROGRESS_COMPLETE: u8 = 100;

/// Opaque handle to a file picked by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub size_bytes: u64,
    pub content_type: String,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, size_bytes: u64, content_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            content_type: content_type.into(),
        }
    }

    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Idle,
    Uploading,
    Complete,
}

/// Limits applied when a file is selected.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_bytes: u64,
    pub accepted_types: Vec<String>,
}

impl UploadPolicy {
    pub fn validate(&self, file: &UploadFile) -> Result<(), ValidationError> {
        let accepted = self
            .accepted_types
            .iter()
            .any(|prefix| file.content_type.starts_with(prefix.as_str()));
        if !accepted {
            return Err(ValidationError::UnsupportedType {
                content_type: file.content_type.clone(),
            });
        }
        if file.size_bytes > self.max_bytes {
            return Err(ValidationError::TooLarge {
                size_bytes: file.size_bytes,
                max_bytes: self.max_bytes,
            });
        }
        Ok(())
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: 2 * 1024 * 1024 * 1024,
            accepted_types: vec!["video/".to_string()],
        }
    }
}

/// One selected file and its upload progress.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadSession {
    pub file: UploadFile,
    pub preview_ref: String,
    progress: u8,
}

impl UploadSession {
    pub fn new(file: UploadFile, preview_ref: String) -> Self {
        Self {
            file,
            preview_ref,
            progress: 0,
        }
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    /// Derived from progress so Complete and 100 can never disagree.
    pub fn status(&self) -> UploadStatus {
        if self.progress >= PROGRESS_COMPLETE {
            UploadStatus::Complete
        } else {
            UploadStatus::Uploading
        }
    }

    /// Adds one tick's increment, saturating at 100. Returns the new status.
    pub fn advance(&mut self, increment: u8) -> UploadStatus {
        self.progress = self.progress.saturating_add(increment).min(PROGRESS_COMPLETE);
        self.status()
    }
}
