use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::labels::Locale;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scanner: ScannerConfig,

    #[serde(default)]
    pub clustering: ClusteringConfig,

    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
}

fn default_image_extensions() -> Vec<String> {
    vec!["png".to_string(), "jpg".to_string(), "jpeg".to_string()]
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            image_extensions: default_image_extensions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// DBSCAN neighborhood radius (Euclidean distance between embeddings)
    #[serde(default = "default_eps")]
    pub eps: f32,

    /// Minimum neighborhood size, the point itself included
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
}

fn default_eps() -> f32 {
    0.5
}

fn default_min_samples() -> usize {
    1
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            eps: default_eps(),
            min_samples: default_min_samples(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_models_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_detection_url")]
    pub detection_url: String,

    #[serde(default = "default_embedding_url")]
    pub embedding_url: String,

    #[serde(default = "default_genderage_url")]
    pub genderage_url: String,

    #[serde(default = "default_emotion_url")]
    pub emotion_url: String,

    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,
}

fn default_models_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from(".local/share"))
        .join("trombi")
        .join("models")
}

fn default_detection_url() -> String {
    "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/ultraface/models/version-RFB-320.onnx".to_string()
}

fn default_embedding_url() -> String {
    "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/arcface/model/arcfaceresnet100-11-int8.onnx".to_string()
}

fn default_genderage_url() -> String {
    "https://huggingface.co/public-data/insightface/resolve/main/models/buffalo_l/genderage.onnx".to_string()
}

fn default_emotion_url() -> String {
    "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/emotion_ferplus/model/emotion-ferplus-8.onnx".to_string()
}

fn default_intra_threads() -> usize {
    4
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            dir: default_models_dir(),
            detection_url: default_detection_url(),
            embedding_url: default_embedding_url(),
            genderage_url: default_genderage_url(),
            emotion_url: default_emotion_url(),
            intra_threads: default_intra_threads(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub locale: Locale,

    /// File name of the JSON summary, written inside the output directory
    #[serde(default = "default_results_file")]
    pub results_file: String,
}

fn default_results_file() -> String {
    "results.json".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            locale: Locale::default(),
            results_file: default_results_file(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for a daily rolling log file. Stderr only when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Config {
    /// Load from the default location, falling back to defaults when no file exists.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            tracing::debug!(path = ?path, "No config file, using defaults");
            Ok(Config::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("TROMBI_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("trombi")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_clustering_parameters() {
        let config = Config::default();
        assert_eq!(config.clustering.eps, 0.5);
        assert_eq!(config.clustering.min_samples, 1);
        assert_eq!(config.scanner.image_extensions, vec!["png", "jpg", "jpeg"]);
        assert_eq!(config.output.results_file, "results.json");
        assert_eq!(config.output.locale, Locale::Fr);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[clustering]\neps = 0.9\n\n[output]\nlocale = \"en\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.clustering.eps, 0.9);
        assert_eq!(config.clustering.min_samples, 1);
        assert_eq!(config.output.locale, Locale::En);
        assert_eq!(config.models.intra_threads, 4);
        assert!(config.logging.dir.is_none());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[clustering\neps = ").unwrap();

        assert!(Config::load_from(&path).is_err());
    }
}
