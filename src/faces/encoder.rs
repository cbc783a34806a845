use anyhow::{anyhow, Result};
use image::DynamicImage;
use ort::session::Session;
use ort::value::Tensor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::detector::{self, FaceDetector};
use super::models::{ModelStore, EMBEDDING_MODEL};
use crate::config::ModelsConfig;
use crate::labels::Labels;
use crate::scanner::discover_images;

/// Face embedding vector
pub type Embedding = Vec<f32>;

/// Produces one embedding per face found in an image.
pub trait FaceEncoder {
    fn encode(&self, image_path: &Path) -> Result<Vec<Embedding>>;
}

/// Embeddings with the image each one came from, index-aligned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceEncodings {
    pub embeddings: Vec<Embedding>,
    pub paths: Vec<PathBuf>,
}

impl FaceEncodings {
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }

    fn push(&mut self, path: &Path, embedding: Embedding) {
        self.embeddings.push(embedding);
        self.paths.push(path.to_path_buf());
    }
}

/// Encode every face of every image directly inside `directory`.
///
/// Prints each file name with its face count. An empty result (no image or
/// no face) is not an error.
pub fn encode_directory(
    encoder: &dyn FaceEncoder,
    directory: &Path,
    extensions: &[String],
    labels: &Labels,
) -> Result<FaceEncodings> {
    let images = discover_images(directory, extensions)?;
    tracing::info!(directory = ?directory, images = images.len(), "Encoding faces");

    let mut encodings = FaceEncodings::default();

    for image_path in &images {
        let embeddings = encoder.encode(image_path)?;

        let filename = image_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        println!("{}", labels.image_line(&filename));
        println!("{}", labels.face_count_line(embeddings.len()));
        tracing::debug!(path = ?image_path, faces = embeddings.len(), "Image encoded");

        for embedding in embeddings {
            encodings.push(image_path, embedding);
        }
    }

    if encodings.is_empty() {
        println!("{}", labels.no_faces());
        tracing::info!(directory = ?directory, "No face detected");
    }

    Ok(encodings)
}

/// UltraFace detection followed by ArcFace embedding of each padded crop
pub struct OnnxFaceEncoder {
    detector: FaceDetector,
    embedding_model: Mutex<Session>,
}

impl OnnxFaceEncoder {
    pub fn load(store: &ModelStore, config: &ModelsConfig) -> Result<Self> {
        let detector = FaceDetector::load(store, &config.detection_url)?;
        let embedding_model = store.load_session(EMBEDDING_MODEL, &config.embedding_url)?;
        Ok(Self {
            detector,
            embedding_model: Mutex::new(embedding_model),
        })
    }
}

impl FaceEncoder for OnnxFaceEncoder {
    fn encode(&self, image_path: &Path) -> Result<Vec<Embedding>> {
        let img = detector::load_image(image_path)?;
        let faces = self.detector.detect(&img)?;

        if faces.is_empty() {
            return Ok(Vec::new());
        }

        let mut embedding_model = self
            .embedding_model
            .lock()
            .map_err(|e| anyhow!("Failed to lock embedding model: {}", e))?;

        faces
            .iter()
            .map(|face| {
                let crop = detector::crop_padded(&img, &face.bbox);
                run_arcface_embedding(&mut embedding_model, &crop)
            })
            .collect()
    }
}

fn run_arcface_embedding(session: &mut Session, face_img: &DynamicImage) -> Result<Embedding> {
    const INPUT_SIZE: u32 = 112;

    let resized = face_img.resize_exact(INPUT_SIZE, INPUT_SIZE, image::imageops::FilterType::Triangle);
    let rgb = resized.to_rgb8();

    let plane = (INPUT_SIZE * INPUT_SIZE) as usize;
    let mut input_data = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let idx = y as usize * INPUT_SIZE as usize + x as usize;
        // ArcFace normalization: (pixel - 127.5) / 127.5
        input_data[idx] = (pixel[0] as f32 - 127.5) / 127.5;
        input_data[plane + idx] = (pixel[1] as f32 - 127.5) / 127.5;
        input_data[2 * plane + idx] = (pixel[2] as f32 - 127.5) / 127.5;
    }

    let input_tensor = Tensor::from_array((
        [1usize, 3, INPUT_SIZE as usize, INPUT_SIZE as usize],
        input_data.into_boxed_slice(),
    ))?;

    // ArcFace ONNX model uses "data" as input name
    let outputs = session.run(ort::inputs!["data" => input_tensor])?;

    let embedding_output = outputs.iter().next()
        .ok_or_else(|| anyhow!("No embedding output"))?;

    let (_embedding_shape, embedding_data) = embedding_output.1
        .try_extract_tensor::<f32>()?;

    Ok(l2_normalize(embedding_data.to_vec()))
}

pub fn l2_normalize(embedding: Embedding) -> Embedding {
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm > 0.0 {
        embedding.iter().map(|x| x / norm).collect()
    } else {
        embedding
    }
}
