use anyhow::{Context, Result};
use facefind_vision::{DetectionParams, Metric};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub static CONFIG_PATH: Lazy<&'static Path> = Lazy::new(|| {
    Path::new(
        option_env!("FACEFIND_CONFIG_PATH").unwrap_or("/usr/local/etc/facefind/config.toml"),
    )
});

pub static MODEL_PREFIX: Lazy<&'static Path> = Lazy::new(|| {
    Path::new(option_env!("FACEFIND_MODEL_PREFIX").unwrap_or("/usr/local/share/facefind/models"))
});

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Largest distance still counted as the same person.
    pub tolerance: f32,
    pub metric: Metric,
    pub detector_model: PathBuf,
    pub encoder_model: PathBuf,
    pub score_threshold: f32,
    pub nms_threshold: f32,
    /// Unknown images are shrunk to fit this many pixels on their longest side.
    pub max_dimension: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tolerance: 0.6,
            metric: Metric::Euclidean,
            detector_model: MODEL_PREFIX.join("face_detection_yunet_2023mar.onnx"),
            encoder_model: MODEL_PREFIX.join("face_recognition_sface_2021dec.onnx"),
            score_threshold: 0.6,
            nms_threshold: 0.3,
            max_dimension: 1600,
        }
    }
}

impl Config {
    pub fn detection(&self) -> DetectionParams {
        DetectionParams {
            score_threshold: self.score_threshold,
            nms_threshold: self.nms_threshold,
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    if !path.exists() {
        log::debug!("no config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(cfg.tolerance, 0.6);
        assert_eq!(cfg.metric, Metric::Euclidean);
        assert_eq!(cfg.max_dimension, 1600);
    }

    #[test]
    fn test_partial_config_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "tolerance = 0.45\nmetric = \"cosine\"\nencoder_model = \"/opt/sface.onnx\"\n",
        )
        .unwrap();

        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.tolerance, 0.45);
        assert_eq!(cfg.metric, Metric::Cosine);
        assert_eq!(cfg.encoder_model, PathBuf::from("/opt/sface.onnx"));
        assert_eq!(cfg.score_threshold, 0.6);
        assert!(cfg.detector_model.ends_with("face_detection_yunet_2023mar.onnx"));
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "tolerance = \"wide\"\n").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("parsing config"));
    }
}
