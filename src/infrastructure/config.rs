use crate::domain::upload::UploadPolicy;
use crate::domain::velocity::AnalysisParameters;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub server: ServerSettings,
    pub playback: PlaybackSettings,
    pub upload: UploadSettings,
    pub backend: BackendSettings,
    pub analysis: AnalysisSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub addr: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlaybackSettings {
    pub tick_ms: u64,
    pub frame_count: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadSettings {
    pub tick_ms: u64,
    pub increment: u8,
    pub max_bytes: u64,
    pub accepted_types: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendSettings {
    pub tick_ms: u64,
    pub step: u8,
    pub stages: Vec<String>,
    /// Stage id the simulated backend fails on its first run.
    #[serde(default)]
    pub fail_stage_once: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisSettings {
    pub velocity_threshold: f64,
    pub measurement_points: u32,
}

impl PlaybackSettings {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl UploadSettings {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn policy(&self) -> UploadPolicy {
        UploadPolicy {
            max_bytes: self.max_bytes,
            accepted_types: self.accepted_types.clone(),
        }
    }
}

impl BackendSettings {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl AnalysisSettings {
    pub fn params(&self) -> anyhow::Result<AnalysisParameters> {
        Ok(AnalysisParameters::new(self.velocity_threshold, self.measurement_points)?)
    }
}

impl DashboardConfig {
    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.playback.tick_ms > 0, "playback.tick_ms must be positive");
        anyhow::ensure!(self.playback.frame_count > 0, "playback.frame_count must be positive");
        anyhow::ensure!(self.upload.tick_ms > 0, "upload.tick_ms must be positive");
        anyhow::ensure!(
            (1..=100).contains(&self.upload.increment),
            "upload.increment must be between 1 and 100"
        );
        anyhow::ensure!(self.backend.tick_ms > 0, "backend.tick_ms must be positive");
        anyhow::ensure!(
            (1..=100).contains(&self.backend.step),
            "backend.step must be between 1 and 100"
        );
        anyhow::ensure!(!self.backend.stages.is_empty(), "backend.stages must not be empty");
        self.analysis.params()?;
        Ok(())
    }
}

fn builder() -> anyhow::Result<config::ConfigBuilder<config::builder::DefaultState>> {
    Ok(config::Config::builder()
        .set_default("server.addr", "0.0.0.0:8080")?
        .set_default("playback.tick_ms", 100)?
        .set_default("playback.frame_count", 100)?
        .set_default("upload.tick_ms", 200)?
        .set_default("upload.increment", 10)?
        .set_default("upload.max_bytes", 2_u64 * 1024 * 1024 * 1024)?
        .set_default("upload.accepted_types", vec!["video/"])?
        .set_default("backend.tick_ms", 250)?
        .set_default("backend.step", 20)?
        .set_default(
            "backend.stages",
            vec![
                "Video Preprocessing",
                "STIV Analysis Engine",
                "Velocity Calculation",
                "Data Export",
            ],
        )?
        .set_default("analysis.velocity_threshold", 0.5)?
        .set_default("analysis.measurement_points", 12)?)
}

pub fn load_dashboard_config() -> anyhow::Result<DashboardConfig> {
    let settings = builder()?
        .add_source(config::File::with_name("config/dashboard").required(false))
        .add_source(
            config::Environment::with_prefix("STIV")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("backend.stages")
                .with_list_parse_key("upload.accepted_types")
                .try_parsing(true),
        )
        .build()?;

    let config: DashboardConfig = settings.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> DashboardConfig {
        builder().unwrap().build().unwrap().try_deserialize().unwrap()
    }

    #[test]
    fn test_defaults_match_dashboard() {
        let config = defaults();
        assert_eq!(config.playback.tick(), Duration::from_millis(100));
        assert_eq!(config.playback.frame_count, 100);
        assert_eq!(config.upload.tick(), Duration::from_millis(200));
        assert_eq!(config.upload.increment, 10);
        assert_eq!(config.backend.stages.len(), 4);
        assert_eq!(config.backend.fail_stage_once, None);
        assert_eq!(config.analysis.params().unwrap(), AnalysisParameters::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let config: DashboardConfig = builder()
            .unwrap()
            .add_source(config::File::from_str(
                "[upload]\nincrement = 25\n[backend]\nstages = [\"Only\"]\nfail_stage_once = 1\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.upload.increment, 25);
        assert_eq!(config.backend.stages, vec!["Only".to_string()]);
        assert_eq!(config.backend.fail_stage_once, Some(1));
        assert_eq!(config.upload.tick_ms, 200);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = defaults();
        config.upload.increment = 0;
        assert!(config.validate().is_err());

        let mut config = defaults();
        config.backend.stages.clear();
        assert!(config.validate().is_err());

        let mut config = defaults();
        config.analysis.velocity_threshold = 7.0;
        assert!(config.validate().is_err());
    }
}
