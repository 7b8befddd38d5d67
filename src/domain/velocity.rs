// Velocity samples and the metrics derived from them
use super::error::ValidationError;

pub const THRESHOLD_MIN: f64 = 0.1;
pub const THRESHOLD_MAX: f64 = 3.0;
pub const POINTS_MIN: u32 = 5;
pub const POINTS_MAX: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// One velocity measurement at a pixel location of the flow video.
#[derive(Debug, Clone, PartialEq)]
pub struct VelocitySample {
    pub time: f64,
    pub velocity: f64,
    pub position: Position,
}

impl VelocitySample {
    pub fn new(time: f64, velocity: f64, x: f64, y: f64) -> Self {
        Self {
            time,
            velocity: velocity.max(0.0),
            position: Position { x, y },
        }
    }
}

/// Which video the samples belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    /// The still reference image shown before any upload.
    Reference,
    Uploaded { preview_ref: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisParameters {
    pub velocity_threshold: f64,
    pub measurement_point_count: u32,
}

impl AnalysisParameters {
    pub fn new(
        velocity_threshold: f64,
        measurement_point_count: u32,
    ) -> Result<Self, ValidationError> {
        let mut params = Self::default();
        params.set_velocity_threshold(velocity_threshold)?;
        params.set_measurement_point_count(measurement_point_count)?;
        Ok(params)
    }

    /// Snaps to the 0.1 m/s slider step.
    pub fn set_velocity_threshold(&mut self, value: f64) -> Result<(), ValidationError> {
        if !value.is_finite() || value < THRESHOLD_MIN || value > THRESHOLD_MAX {
            return Err(ValidationError::ParameterOutOfRange {
                parameter: "velocity_threshold",
                value,
                min: THRESHOLD_MIN,
                max: THRESHOLD_MAX,
            });
        }
        self.velocity_threshold = (value * 10.0).round() / 10.0;
        Ok(())
    }

    pub fn set_measurement_point_count(&mut self, value: u32) -> Result<(), ValidationError> {
        if !(POINTS_MIN..=POINTS_MAX).contains(&value) {
            return Err(ValidationError::ParameterOutOfRange {
                parameter: "measurement_point_count",
                value: value as f64,
                min: POINTS_MIN as f64,
                max: POINTS_MAX as f64,
            });
        }
        self.measurement_point_count = value;
        Ok(())
    }
}

impl Default for AnalysisParameters {
    fn default() -> Self {
        Self {
            velocity_threshold: 0.5,
            measurement_point_count: 12,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowMetrics {
    pub max_velocity: Option<f64>,
    pub avg_velocity: Option<f64>,
    pub sample_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayMarker {
    pub position: Position,
    pub label: String,
    pub opacity: f64,
    pub above_threshold: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineBar {
    pub time: f64,
    pub height_percent: f64,
}

pub fn max_velocity(samples: &[VelocitySample]) -> Option<f64> {
    samples.iter().map(|s| s.velocity).reduce(f64::max)
}

pub fn avg_velocity(samples: &[VelocitySample]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().map(|s| s.velocity).sum::<f64>() / samples.len() as f64)
}

pub fn flow_metrics(samples: &[VelocitySample]) -> FlowMetrics {
    FlowMetrics {
        max_velocity: max_velocity(samples),
        avg_velocity: avg_velocity(samples),
        sample_count: samples.len(),
    }
}

/// Share of the maximum, 0 when every sample is still water.
fn relative_to_max(velocity: f64, max: f64) -> f64 {
    if max > 0.0 { velocity / max } else { 0.0 }
}

pub fn overlay_markers(samples: &[VelocitySample], threshold: f64) -> Vec<OverlayMarker> {
    let max = max_velocity(samples).unwrap_or(0.0);
    samples
        .iter()
        .map(|s| OverlayMarker {
            position: s.position,
            label: format!("{:.1}m/s", s.velocity),
            opacity: 0.8 + relative_to_max(s.velocity, max) * 0.2,
            above_threshold: s.velocity >= threshold,
        })
        .collect()
}

pub fn timeline_bars(samples: &[VelocitySample]) -> Vec<TimelineBar> {
    let max = max_velocity(samples).unwrap_or(0.0);
    samples
        .iter()
        .map(|s| TimelineBar {
            time: s.time,
            height_percent: relative_to_max(s.velocity, max) * 100.0,
        })
        .collect()
}
