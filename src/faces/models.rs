use anyhow::{anyhow, Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::{Path, PathBuf};

use crate::config::ModelsConfig;

/// UltraFace RFB-320 face detector
pub const DETECTION_MODEL: &str = "ultraface-320.onnx";
/// ArcFace ResNet100, 512-dim embeddings
pub const EMBEDDING_MODEL: &str = "arcface-resnet100.onnx";
/// InsightFace gender + age regressor
pub const GENDERAGE_MODEL: &str = "genderage.onnx";
/// FER+ eight-class emotion classifier
pub const EMOTION_MODEL: &str = "emotion-ferplus-8.onnx";

/// Resolves ONNX model files in a local directory, downloading missing ones.
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
    intra_threads: usize,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>, intra_threads: usize) -> Self {
        Self {
            dir: dir.into(),
            intra_threads: intra_threads.max(1),
        }
    }

    pub fn from_config(config: &ModelsConfig) -> Self {
        Self::new(&config.dir, config.intra_threads)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Download a model file if it doesn't exist
    pub fn ensure_model(&self, filename: &str, url: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create models directory {}", self.dir.display()))?;
        let model_path = self.dir.join(filename);

        if !model_path.exists() {
            tracing::info!(model = %filename, "Downloading model...");
            let response = ureq::get(url)
                .call()
                .map_err(|e| anyhow!("Failed to download model {}: {}", filename, e))?;

            // Write to a temporary name so an interrupted download is not picked up later
            let partial_path = self.dir.join(format!("{}.part", filename));
            let mut file = std::fs::File::create(&partial_path)?;
            std::io::copy(&mut response.into_reader(), &mut file)?;
            std::fs::rename(&partial_path, &model_path)?;
            tracing::info!(model = %filename, path = ?model_path, "Model downloaded");
        }

        Ok(model_path)
    }

    /// Resolve (downloading if needed) and load a model into an inference session.
    pub fn load_session(&self, filename: &str, url: &str) -> Result<Session> {
        let model_path = self.ensure_model(filename, url)?;

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.intra_threads)?
            .commit_from_file(&model_path)
            .with_context(|| format!("Failed to load model {}", model_path.display()))?;

        tracing::debug!(model = %filename, "Model session ready");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_existing_model_is_not_downloaded() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path(), 4);
        std::fs::write(dir.path().join(DETECTION_MODEL), b"onnx").unwrap();

        // Unroutable URL: any download attempt would fail
        let path = store
            .ensure_model(DETECTION_MODEL, "http://127.0.0.1:9/never")
            .unwrap();

        assert_eq!(path, dir.path().join(DETECTION_MODEL));
    }

    #[test]
    fn test_failed_download_leaves_no_model() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("models");
        let store = ModelStore::new(&nested, 0);

        assert!(store.ensure_model(EMOTION_MODEL, "http://127.0.0.1:9/never").is_err());
        assert!(nested.is_dir());
        assert!(!nested.join(EMOTION_MODEL).exists());
        assert_eq!(store.intra_threads, 1);
    }
}
