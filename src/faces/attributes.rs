//! Age, gender and emotion estimation for a cluster's representative image.
//!
//! A model may report several faces for one image; [`AnalysisOutput`]
//! carries either shape and is always reduced to its first record. Failures
//! are contained in [`analyze_face_attributes`], which turns them into a
//! `None` result so one bad image never stops the run.

use image::DynamicImage;
use ort::session::Session;
use ort::value::Tensor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

use super::detector::{self, FaceBox, FaceDetector};
use super::models::{ModelStore, EMOTION_MODEL, GENDERAGE_MODEL};
use crate::config::ModelsConfig;
use crate::labels::Labels;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gender {
    Woman,
    Man,
}

/// FER+ emotion classes, in model output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emotion {
    Neutral,
    Happy,
    Surprise,
    Sad,
    Angry,
    Disgust,
    Fear,
    Contempt,
}

impl Emotion {
    pub const ALL: [Emotion; 8] = [
        Emotion::Neutral,
        Emotion::Happy,
        Emotion::Surprise,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Contempt,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// Everything a model reports about one face
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceAnalysis {
    pub age: Option<f32>,
    pub gender: Vec<(Gender, f32)>,
    pub emotion: Vec<(Emotion, f32)>,
    /// Set when the model names the dominant emotion itself
    pub dominant_emotion: Option<Emotion>,
}

impl FaceAnalysis {
    pub fn dominant_gender(&self) -> Option<Gender> {
        arg_max(&self.gender)
    }

    pub fn dominant_emotion(&self) -> Option<Emotion> {
        self.dominant_emotion.or_else(|| arg_max(&self.emotion))
    }
}

/// One analysis record, or one per face found in the image
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutput {
    Single(FaceAnalysis),
    Many(Vec<FaceAnalysis>),
}

impl AnalysisOutput {
    pub fn into_first(self) -> Option<FaceAnalysis> {
        match self {
            AnalysisOutput::Single(analysis) => Some(analysis),
            AnalysisOutput::Many(analyses) => analyses.into_iter().next(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("no face detected in {}", .0.display())]
    NoFaceDetected(PathBuf),

    #[error("failed to load image {}: {source}", .path.display())]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("model returned no analysis")]
    EmptyResult,

    #[error("inference failed: {0:#}")]
    Inference(anyhow::Error),
}

impl From<ort::Error> for AnalysisError {
    fn from(e: ort::Error) -> Self {
        AnalysisError::Inference(e.into())
    }
}

pub trait AttributeAnalyzer {
    fn analyze(&self, image_path: &Path) -> Result<AnalysisOutput, AnalysisError>;
}

/// Attributes kept for a person record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersonAttributes {
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub dominant_emotion: Option<Emotion>,
}

impl From<FaceAnalysis> for PersonAttributes {
    fn from(analysis: FaceAnalysis) -> Self {
        Self {
            age: analysis.age.map(|a| a.round().max(0.0) as u32),
            gender: analysis.dominant_gender(),
            dominant_emotion: analysis.dominant_emotion(),
        }
    }
}

/// Analyze one image, logging and swallowing any failure.
pub fn analyze_face_attributes(
    analyzer: &dyn AttributeAnalyzer,
    image_path: &Path,
    labels: &Labels,
) -> Option<PersonAttributes> {
    let result = analyzer
        .analyze(image_path)
        .and_then(|output| output.into_first().ok_or(AnalysisError::EmptyResult));

    match result {
        Ok(analysis) => Some(analysis.into()),
        Err(e) => {
            println!("{}", labels.analysis_failed(&e));
            tracing::warn!(path = ?image_path, error = %e, "Face attribute analysis failed");
            None
        }
    }
}

/// Highest-probability category; the earliest one wins ties
fn arg_max<T: Copy>(probabilities: &[(T, f32)]) -> Option<T> {
    let mut best: Option<(T, f32)> = None;
    for &(category, p) in probabilities {
        match best {
            Some((_, best_p)) if p <= best_p => {}
            _ => best = Some((category, p)),
        }
    }
    best.map(|(category, _)| category)
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|e| e / sum).collect()
}

/// UltraFace detection, InsightFace gender/age and FER+ emotion
pub struct OnnxAttributeAnalyzer {
    detector: FaceDetector,
    genderage_model: Mutex<Session>,
    emotion_model: Mutex<Session>,
}

impl OnnxAttributeAnalyzer {
    pub fn load(store: &ModelStore, config: &ModelsConfig) -> anyhow::Result<Self> {
        Ok(Self {
            detector: FaceDetector::load(store, &config.detection_url)?,
            genderage_model: Mutex::new(store.load_session(GENDERAGE_MODEL, &config.genderage_url)?),
            emotion_model: Mutex::new(store.load_session(EMOTION_MODEL, &config.emotion_url)?),
        })
    }

    fn analyze_face(&self, img: &DynamicImage, face: &FaceBox) -> Result<FaceAnalysis, AnalysisError> {
        let mut genderage = self
            .genderage_model
            .lock()
            .map_err(|e| AnalysisError::Inference(anyhow::anyhow!("Failed to lock gender/age model: {}", e)))?;
        let crop = detector::crop_centered(img, &face.bbox, 1.5);
        let (gender, age) = run_genderage(&mut genderage, &crop)?;
        drop(genderage);

        let mut emotion_model = self
            .emotion_model
            .lock()
            .map_err(|e| AnalysisError::Inference(anyhow::anyhow!("Failed to lock emotion model: {}", e)))?;
        let crop = detector::crop_centered(img, &face.bbox, 1.0);
        let emotion = run_ferplus(&mut emotion_model, &crop)?;

        Ok(FaceAnalysis {
            age: Some(age),
            gender,
            emotion,
            dominant_emotion: None,
        })
    }
}

impl AttributeAnalyzer for OnnxAttributeAnalyzer {
    fn analyze(&self, image_path: &Path) -> Result<AnalysisOutput, AnalysisError> {
        let img = image::open(image_path).map_err(|source| AnalysisError::ImageLoad {
            path: image_path.to_path_buf(),
            source,
        })?;

        let faces = self.detector.detect(&img).map_err(AnalysisError::Inference)?;
        if faces.is_empty() {
            return Err(AnalysisError::NoFaceDetected(image_path.to_path_buf()));
        }

        let mut analyses = faces
            .iter()
            .map(|face| self.analyze_face(&img, face))
            .collect::<Result<Vec<_>, _>>()?;

        if analyses.len() == 1 {
            Ok(AnalysisOutput::Single(analyses.remove(0)))
        } else {
            Ok(AnalysisOutput::Many(analyses))
        }
    }
}

/// InsightFace genderage: 96x96 RGB, raw pixel values.
/// Output is `[female, male, age / 100]`.
fn run_genderage(session: &mut Session, face_img: &DynamicImage) -> Result<(Vec<(Gender, f32)>, f32), AnalysisError> {
    const INPUT_SIZE: u32 = 96;

    let resized = face_img.resize_exact(INPUT_SIZE, INPUT_SIZE, image::imageops::FilterType::Triangle);
    let rgb = resized.to_rgb8();

    let plane = (INPUT_SIZE * INPUT_SIZE) as usize;
    let mut input_data = vec![0.0f32; 3 * plane];
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let idx = y as usize * INPUT_SIZE as usize + x as usize;
        input_data[idx] = pixel[0] as f32;
        input_data[plane + idx] = pixel[1] as f32;
        input_data[2 * plane + idx] = pixel[2] as f32;
    }

    let input_tensor = Tensor::from_array((
        [1usize, 3, INPUT_SIZE as usize, INPUT_SIZE as usize],
        input_data.into_boxed_slice(),
    ))?;
    let outputs = session.run(ort::inputs![input_tensor])?;

    let output = outputs.iter().next()
        .ok_or_else(|| AnalysisError::Inference(anyhow::anyhow!("No gender/age output")))?;
    let (_shape, data) = output.1.try_extract_tensor::<f32>()?;

    if data.len() < 3 {
        return Err(AnalysisError::Inference(anyhow::anyhow!(
            "Gender/age output has {} values, expected 3",
            data.len()
        )));
    }

    let probs = softmax(&data[..2]);
    let gender = vec![(Gender::Woman, probs[0]), (Gender::Man, probs[1])];
    Ok((gender, data[2] * 100.0))
}

/// FER+: 64x64 grayscale, raw pixel values, eight logits.
fn run_ferplus(session: &mut Session, face_img: &DynamicImage) -> Result<Vec<(Emotion, f32)>, AnalysisError> {
    const INPUT_SIZE: u32 = 64;

    let gray = face_img
        .resize_exact(INPUT_SIZE, INPUT_SIZE, image::imageops::FilterType::Triangle)
        .to_luma8();
    let input_data: Vec<f32> = gray.pixels().map(|p| p[0] as f32).collect();

    let input_tensor = Tensor::from_array((
        [1usize, 1, INPUT_SIZE as usize, INPUT_SIZE as usize],
        input_data.into_boxed_slice(),
    ))?;
    let outputs = session.run(ort::inputs![input_tensor])?;

    let output = outputs.iter().next()
        .ok_or_else(|| AnalysisError::Inference(anyhow::anyhow!("No emotion output")))?;
    let (_shape, data) = output.1.try_extract_tensor::<f32>()?;

    if data.len() < Emotion::ALL.len() {
        return Err(AnalysisError::Inference(anyhow::anyhow!(
            "Emotion output has {} values, expected {}",
            data.len(),
            Emotion::ALL.len()
        )));
    }

    let probs = softmax(&data[..Emotion::ALL.len()]);
    Ok(Emotion::ALL.iter().copied().zip(probs).collect())
}
