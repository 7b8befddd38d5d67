// Analysis service - Parameters, sample set and derived flow metrics
use crate::application::activity_feed::ActivityFeed;
use crate::application::ports::AnalysisEngine;
use crate::domain::error::ValidationError;
use crate::domain::velocity::{
    flow_metrics, overlay_markers, timeline_bars, AnalysisParameters, FlowMetrics, OverlayMarker,
    TimelineBar, VelocitySample, VideoSource,
};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Everything the Analysis view renders, computed from one sample set.
#[derive(Debug, Clone)]
pub struct AnalysisView {
    pub source: VideoSource,
    pub params: AnalysisParameters,
    pub metrics: FlowMetrics,
    pub overlay: Vec<OverlayMarker>,
    pub timeline: Vec<TimelineBar>,
}

#[derive(Debug)]
struct AnalysisInner {
    source: VideoSource,
    params: AnalysisParameters,
    samples: Arc<[VelocitySample]>,
}

#[derive(Clone)]
pub struct AnalysisService {
    engine: Arc<dyn AnalysisEngine>,
    inner: Arc<RwLock<AnalysisInner>>,
    activity: ActivityFeed,
}

impl AnalysisService {
    pub fn new(
        engine: Arc<dyn AnalysisEngine>,
        params: AnalysisParameters,
        activity: ActivityFeed,
    ) -> Self {
        Self {
            engine,
            activity,
            inner: Arc::new(RwLock::new(AnalysisInner {
                source: VideoSource::Reference,
                params,
                samples: Arc::from(Vec::new()),
            })),
        }
    }

    pub async fn params(&self) -> AnalysisParameters {
        self.inner.read().await.params
    }

    /// Validates both values before committing either.
    pub async fn update_params(
        &self,
        velocity_threshold: Option<f64>,
        measurement_point_count: Option<u32>,
    ) -> Result<AnalysisParameters, ValidationError> {
        let mut inner = self.inner.write().await;
        let mut params = inner.params;
        if let Some(value) = velocity_threshold {
            params.set_velocity_threshold(value)?;
        }
        if let Some(value) = measurement_point_count {
            params.set_measurement_point_count(value)?;
        }
        let previous = std::mem::replace(&mut inner.params, params);
        if params.velocity_threshold != previous.velocity_threshold {
            self.activity.debug(format!(
                "Velocity threshold set to {:.1}",
                params.velocity_threshold
            ));
        }
        if params.measurement_point_count != previous.measurement_point_count {
            self.activity.debug(format!(
                "Measurement points set to {}",
                params.measurement_point_count
            ));
        }
        tracing::debug!(
            "Analysis parameters: threshold {:.1} m/s, {} points",
            params.velocity_threshold,
            params.measurement_point_count
        );
        Ok(params)
    }

    /// The current immutable sample set. Callers share it, never mutate it.
    pub async fn samples(&self) -> Arc<[VelocitySample]> {
        self.inner.read().await.samples.clone()
    }

    /// Asks the engine for a fresh sample set and swaps it in whole.
    pub async fn run(&self, source: VideoSource) -> anyhow::Result<usize> {
        let params = self.params().await;
        let samples = self.engine.analyze(&source, &params).await?;
        let count = samples.len();

        let mut inner = self.inner.write().await;
        inner.samples = Arc::from(samples);
        inner.source = source;
        tracing::info!("Loaded {} velocity samples for {:?}", count, inner.source);
        Ok(count)
    }

    pub async fn view(&self) -> AnalysisView {
        let inner = self.inner.read().await;
        AnalysisView {
            source: inner.source.clone(),
            params: inner.params,
            metrics: flow_metrics(&inner.samples),
            overlay: overlay_markers(&inner.samples, inner.params.velocity_threshold),
            timeline: timeline_bars(&inner.samples),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mock_engine::MockAnalysisEngine;

    fn service() -> AnalysisService {
        AnalysisService::new(
            Arc::new(MockAnalysisEngine),
            AnalysisParameters::default(),
            ActivityFeed::default(),
        )
    }

    #[tokio::test]
    async fn test_view_is_empty_before_first_run() {
        let view = service().view().await;
        assert_eq!(view.metrics.sample_count, 0);
        assert_eq!(view.metrics.max_velocity, None);
        assert_eq!(view.source, VideoSource::Reference);
    }

    #[tokio::test]
    async fn test_run_replaces_sample_set() {
        let analysis = service();
        let before = analysis.samples().await;
        assert_eq!(analysis.run(VideoSource::Reference).await.unwrap(), 5);
        let after = analysis.samples().await;
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(before.len(), 0);

        let view = analysis.view().await;
        assert_eq!(view.metrics.max_velocity, Some(2.3));
        assert_eq!(view.overlay.len(), 5);
        assert_eq!(view.timeline.len(), 5);
    }

    #[tokio::test]
    async fn test_threshold_marks_overlay() {
        let analysis = service();
        analysis.run(VideoSource::Reference).await.unwrap();
        analysis.update_params(Some(2.0), None).await.unwrap();
        let view = analysis.view().await;
        let above: Vec<bool> = view.overlay.iter().map(|m| m.above_threshold).collect();
        assert_eq!(above, vec![false, false, true, false, true]);
    }

    #[tokio::test]
    async fn test_invalid_parameters_leave_state_unchanged() {
        let analysis = service();
        assert!(analysis.update_params(Some(9.0), None).await.is_err());
        assert!(analysis.update_params(None, Some(1)).await.is_err());
        assert_eq!(analysis.params().await, AnalysisParameters::default());
        let params = analysis.update_params(None, Some(20)).await.unwrap();
        assert_eq!(params.measurement_point_count, 20);
    }

    #[tokio::test]
    async fn test_update_params_is_all_or_nothing() {
        let analysis = service();
        assert!(analysis.update_params(Some(1.0), Some(99)).await.is_err());
        assert_eq!(analysis.params().await, AnalysisParameters::default());
        let params = analysis.update_params(Some(1.0), Some(30)).await.unwrap();
        assert_eq!(params, AnalysisParameters::new(1.0, 30).unwrap());
    }

    #[tokio::test]
    async fn test_parameter_changes_are_logged() {
        let analysis = service();
        analysis.update_params(Some(0.7), None).await.unwrap();
        analysis.update_params(Some(0.7), Some(30)).await.unwrap();
        assert!(analysis.update_params(Some(9.0), None).await.is_err());

        let messages: Vec<String> = analysis
            .activity
            .recent()
            .into_iter()
            .map(|e| e.message)
            .collect();
        assert_eq!(
            messages,
            vec!["Measurement points set to 30", "Velocity threshold set to 0.7"]
        );
    }

    #[tokio::test]
    async fn test_run_records_source() {
        let analysis = service();
        let source = VideoSource::Uploaded { preview_ref: "blob:stiv/1/a.mp4".to_string() };
        analysis.run(source.clone()).await.unwrap();
        assert_eq!(analysis.view().await.source, source);
    }
}
