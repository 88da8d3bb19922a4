use anyhow::Context;
use image::{DynamicImage, imageops::FilterType};
use rten::Model;
use rten_tensor::NdTensor;
use rten_tensor::prelude::*;

use crate::config::DetectorSettings;
use crate::models::DetectionRegion;

/// Object detector run once per uploaded image.
///
/// Returns every candidate region in source-image pixel coordinates; the
/// caller decides which labels count as plates.
pub trait PlateDetector: Send + Sync + 'static {
    fn detect(&self, image: &DynamicImage) -> anyhow::Result<Vec<DetectionRegion>>;
}

/// YOLOv8-style detector exported to the `.rten` format.
///
/// Expects one input `[1, 3, S, S]` (RGB, 0..1) and one output
/// `[1, 4 + classes, anchors]` holding `cx, cy, w, h` in input pixels
/// followed by per-class scores.
pub struct YoloPlateDetector {
    model: Model,
    settings: DetectorSettings,
}

impl YoloPlateDetector {
    pub fn load(settings: &DetectorSettings) -> anyhow::Result<Self> {
        if !settings.model_path.exists() {
            anyhow::bail!(
                "Plate detection model not found at {}",
                settings.model_path.display()
            );
        }
        let model = Model::load_file(&settings.model_path).with_context(|| {
            format!("Failed to load detection model {}", settings.model_path.display())
        })?;
        Ok(Self {
            model,
            settings: settings.clone(),
        })
    }

    fn to_input(&self, image: &DynamicImage) -> NdTensor<f32, 4> {
        let size = self.settings.input_size;
        let resized = image.resize_exact(size, size, FilterType::Triangle).to_rgb8();
        let side = size as usize;
        let plane = side * side;
        let mut data = vec![0f32; 3 * plane];
        for (x, y, pixel) in resized.enumerate_pixels() {
            let offset = y as usize * side + x as usize;
            for c in 0..3 {
                data[c * plane + offset] = pixel[c] as f32 / 255.0;
            }
        }
        NdTensor::from_data([1, 3, side, side], data)
    }
}

impl PlateDetector for YoloPlateDetector {
    fn detect(&self, image: &DynamicImage) -> anyhow::Result<Vec<DetectionRegion>> {
        let input = self.to_input(image);
        let output = self
            .model
            .run_one(input.view().into(), None)
            .map_err(|e| anyhow::anyhow!("Detection model failed: {:?}", e))?;
        let output: NdTensor<f32, 3> = output
            .try_into()
            .map_err(|e| anyhow::anyhow!("Unexpected detection output: {:?}", e))?;

        let input_size = self.settings.input_size as f32;
        Ok(decode_predictions(
            &output.to_vec(),
            output.size(1),
            output.size(2),
            &self.settings,
            image.width() as f32 / input_size,
            image.height() as f32 / input_size,
        ))
    }
}

/// Turn a flat `[4 + classes, anchors]` prediction block into regions,
/// dropping low scores and overlapping boxes of the same label.
pub(crate) fn decode_predictions(
    preds: &[f32],
    rows: usize,
    anchors: usize,
    settings: &DetectorSettings,
    scale_x: f32,
    scale_y: f32,
) -> Vec<DetectionRegion> {
    if rows <= 4 || preds.len() < rows * anchors {
        return Vec::new();
    }
    let at = |row: usize, i: usize| preds[row * anchors + i];

    let mut candidates = Vec::new();
    for i in 0..anchors {
        let (class, score) = (4..rows)
            .map(|row| (row - 4, at(row, i)))
            .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
        if score < settings.conf_threshold {
            continue;
        }
        let (cx, cy, w, h) = (at(0, i), at(1, i), at(2, i), at(3, i));
        candidates.push(DetectionRegion {
            label: settings
                .class_names
                .get(class)
                .cloned()
                .unwrap_or_else(|| format!("class_{}", class)),
            confidence: score,
            x_min: (cx - w / 2.0) * scale_x,
            y_min: (cy - h / 2.0) * scale_y,
            x_max: (cx + w / 2.0) * scale_x,
            y_max: (cy + h / 2.0) * scale_y,
        });
    }

    non_max_suppression(candidates, settings.iou_threshold)
}

fn non_max_suppression(mut regions: Vec<DetectionRegion>, iou_threshold: f32) -> Vec<DetectionRegion> {
    regions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<DetectionRegion> = Vec::new();
    for region in regions {
        let overlaps = kept
            .iter()
            .any(|k| k.label == region.label && iou(k, &region) > iou_threshold);
        if !overlaps {
            kept.push(region);
        }
    }
    kept
}

fn iou(a: &DetectionRegion, b: &DetectionRegion) -> f32 {
    let w = (a.x_max.min(b.x_max) - a.x_min.max(b.x_min)).max(0.0);
    let h = (a.y_max.min(b.y_max) - a.y_min.max(b.y_min)).max(0.0);
    let inter = w * h;
    let area = |r: &DetectionRegion| (r.x_max - r.x_min) * (r.y_max - r.y_min);
    let union = area(a) + area(b) - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}
