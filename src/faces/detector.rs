use anyhow::{anyhow, Result};
use image::{DynamicImage, GenericImageView};
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;
use std::sync::Mutex;

use super::models::{ModelStore, DETECTION_MODEL};

/// Face bounding box in original image pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// A detected face before any embedding or attribute model runs
#[derive(Debug, Clone, Copy)]
pub struct FaceBox {
    pub bbox: BoundingBox,
    pub confidence: f32,
}

const INPUT_WIDTH: u32 = 320;
const INPUT_HEIGHT: u32 = 240;
const CONFIDENCE_THRESHOLD: f32 = 0.7;
const NMS_THRESHOLD: f32 = 0.3;

/// Face detection model (UltraFace - lightweight and fast)
pub struct FaceDetector {
    session: Mutex<Session>,
}

impl FaceDetector {
    pub fn load(store: &ModelStore, url: &str) -> Result<Self> {
        let session = store.load_session(DETECTION_MODEL, url)?;
        Ok(Self {
            session: Mutex::new(session),
        })
    }

    /// Detect faces, highest confidence first
    pub fn detect(&self, img: &DynamicImage) -> Result<Vec<FaceBox>> {
        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow!("Failed to lock detection model: {}", e))?;

        let faces = run_ultraface_detection(&mut session, img)?;
        Ok(faces
            .into_iter()
            .filter(|f| f.bbox.width > 0 && f.bbox.height > 0)
            .collect())
    }
}

pub fn load_image(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|e| anyhow!("Failed to load image {}: {}", path.display(), e))
}

fn run_ultraface_detection(session: &mut Session, img: &DynamicImage) -> Result<Vec<FaceBox>> {
    let (orig_width, orig_height) = img.dimensions();

    let resized = img.resize_exact(INPUT_WIDTH, INPUT_HEIGHT, image::imageops::FilterType::Triangle);
    let rgb = resized.to_rgb8();

    // NCHW, normalized to roughly [-1, 1]
    let plane = (INPUT_HEIGHT * INPUT_WIDTH) as usize;
    let mut input_data = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let idx = y as usize * INPUT_WIDTH as usize + x as usize;
        input_data[idx] = (pixel[0] as f32 - 127.0) / 128.0;
        input_data[plane + idx] = (pixel[1] as f32 - 127.0) / 128.0;
        input_data[2 * plane + idx] = (pixel[2] as f32 - 127.0) / 128.0;
    }

    let input_tensor = Tensor::from_array((
        [1usize, 3, INPUT_HEIGHT as usize, INPUT_WIDTH as usize],
        input_data.into_boxed_slice(),
    ))?;

    let outputs = session.run(ort::inputs!["input" => input_tensor])?;

    let scores_value = outputs.get("scores")
        .ok_or_else(|| anyhow!("No scores output"))?;
    let boxes_value = outputs.get("boxes")
        .ok_or_else(|| anyhow!("No boxes output"))?;

    let (scores_shape, scores_data) = scores_value.try_extract_tensor::<f32>()?;
    let (_boxes_shape, boxes_data) = boxes_value.try_extract_tensor::<f32>()?;

    // scores: [1, anchors, 2] (background, face)
    // boxes: [1, anchors, 4] (x1, y1, x2, y2 normalized)
    let num_anchors = scores_shape[1] as usize;
    let mut faces = Vec::new();

    for i in 0..num_anchors {
        let confidence = scores_data[i * 2 + 1];
        if confidence <= CONFIDENCE_THRESHOLD {
            continue;
        }

        let x1 = (boxes_data[i * 4] * orig_width as f32) as i32;
        let y1 = (boxes_data[i * 4 + 1] * orig_height as f32) as i32;
        let x2 = (boxes_data[i * 4 + 2] * orig_width as f32) as i32;
        let y2 = (boxes_data[i * 4 + 3] * orig_height as f32) as i32;

        faces.push(FaceBox {
            bbox: BoundingBox {
                x: x1.max(0),
                y: y1.max(0),
                width: (x2 - x1).max(1),
                height: (y2 - y1).max(1),
            },
            confidence,
        });
    }

    Ok(nms(faces, NMS_THRESHOLD))
}

/// Non-maximum suppression to remove overlapping detections
fn nms(mut faces: Vec<FaceBox>, threshold: f32) -> Vec<FaceBox> {
    faces.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<FaceBox> = Vec::new();

    for face in faces {
        if keep.iter().all(|kept| compute_iou(&kept.bbox, &face.bbox) <= threshold) {
            keep.push(face);
        }
    }

    keep
}

/// Intersection over Union between two bounding boxes
fn compute_iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let intersection = ((x2 - x1).max(0) * (y2 - y1).max(0)) as f32;
    let area_a = (a.width * a.height) as f32;
    let area_b = (b.width * b.height) as f32;
    let union = area_a + area_b - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Crop a square region centred on the face, `scale` times its largest side,
/// clamped to the image.
pub fn crop_centered(img: &DynamicImage, bbox: &BoundingBox, scale: f32) -> DynamicImage {
    let (img_width, img_height) = img.dimensions();
    let side = (bbox.width.max(bbox.height) as f32 * scale).round() as i64;
    let cx = bbox.x as i64 + bbox.width as i64 / 2;
    let cy = bbox.y as i64 + bbox.height as i64 / 2;

    let x = (cx - side / 2).clamp(0, img_width.saturating_sub(1) as i64) as u32;
    let y = (cy - side / 2).clamp(0, img_height.saturating_sub(1) as i64) as u32;
    let w = (side.max(1) as u32).min(img_width - x);
    let h = (side.max(1) as u32).min(img_height - y);

    img.crop_imm(x, y, w.max(1), h.max(1))
}

/// Crop face region with 20% padding on every side
pub fn crop_padded(img: &DynamicImage, bbox: &BoundingBox) -> DynamicImage {
    let (img_width, img_height) = img.dimensions();
    let padding_x = (bbox.width as f32 * 0.2) as i32;
    let padding_y = (bbox.height as f32 * 0.2) as i32;

    let x = ((bbox.x - padding_x).max(0) as u32).min(img_width.saturating_sub(1));
    let y = ((bbox.y - padding_y).max(0) as u32).min(img_height.saturating_sub(1));
    let w = ((bbox.width + padding_x * 2) as u32).min(img_width - x);
    let h = ((bbox.height + padding_y * 2) as u32).min(img_height - y);

    img.crop_imm(x, y, w.max(1), h.max(1))
}
