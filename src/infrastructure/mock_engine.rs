// Analysis engine returning the fixed reference measurements
use crate::application::ports::AnalysisEngine;
use crate::domain::velocity::{AnalysisParameters, VelocitySample, VideoSource};
use async_trait::async_trait;

#[derive(Debug, Clone, Default)]
pub struct MockAnalysisEngine;

impl MockAnalysisEngine {
    pub fn reference_samples() -> Vec<VelocitySample> {
        vec![
            VelocitySample::new(0.0, 1.2, 245.0, 180.0),
            VelocitySample::new(1.0, 1.8, 320.0, 165.0),
            VelocitySample::new(2.0, 2.1, 410.0, 155.0),
            VelocitySample::new(3.0, 1.9, 490.0, 170.0),
            VelocitySample::new(4.0, 2.3, 580.0, 145.0),
        ]
    }
}

#[async_trait]
impl AnalysisEngine for MockAnalysisEngine {
    async fn analyze(
        &self,
        source: &VideoSource,
        params: &AnalysisParameters,
    ) -> anyhow::Result<Vec<VelocitySample>> {
        tracing::debug!(
            "Mock analysis of {:?} (threshold {:.1} m/s, {} points)",
            source,
            params.velocity_threshold,
            params.measurement_point_count
        );
        Ok(Self::reference_samples())
    }
}
