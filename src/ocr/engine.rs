use image::RgbImage;
use ocrs::{ImageSource, OcrEngine, OcrEngineParams, TextItem};
use rten::Model;
use std::path::{Path, PathBuf};

use crate::config::OcrSettings;
use crate::models::{BoundingBox, RecognizedText};

/// ocrs reports no per-line score, so every line gets this one.
pub const DEFAULT_LINE_CONFIDENCE: f32 = 0.9;

/// OCR engine run once over a whole plate crop
pub trait TextRecognizer: Send + Sync + 'static {
    /// Recognize text lines in an RGB image, in reading order.
    fn recognize(&self, image: &RgbImage) -> anyhow::Result<Vec<RecognizedText>>;
}

pub struct OcrsRecognizer {
    engine: OcrEngine,
}

fn default_model_path(file_name: &str) -> anyhow::Result<PathBuf> {
    let home_dir = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE"))?;
    Ok(Path::new(&home_dir).join(".cache/ocrs").join(file_name))
}

impl OcrsRecognizer {
    /// Load detection and recognition models, falling back to the standard
    /// ocrs cache location for any path not configured.
    pub fn load(settings: &OcrSettings) -> anyhow::Result<Self> {
        let detection_model_path = match &settings.detection_model {
            Some(path) => path.clone(),
            None => default_model_path("text-detection.rten")?,
        };
        let recognition_model_path = match &settings.recognition_model {
            Some(path) => path.clone(),
            None => default_model_path("text-recognition.rten")?,
        };

        if !detection_model_path.exists() || !recognition_model_path.exists() {
            anyhow::bail!(
                "OCR models not found. Please run: ocrs-cli --help (or download models manually)\n\
                 Expected locations:\n  - {}\n  - {}",
                detection_model_path.display(),
                recognition_model_path.display()
            );
        }

        let detection_model = Model::load_file(&detection_model_path)?;
        let recognition_model = Model::load_file(&recognition_model_path)?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })?;

        Ok(Self { engine })
    }
}

impl TextRecognizer for OcrsRecognizer {
    fn recognize(&self, image: &RgbImage) -> anyhow::Result<Vec<RecognizedText>> {
        let img_source = ImageSource::from_bytes(image.as_raw(), image.dimensions())
            .map_err(|e| anyhow::anyhow!("Invalid OCR input: {:?}", e))?;
        let ocr_input = self.engine.prepare_input(img_source)?;

        let word_rects = self.engine.detect_words(&ocr_input)?;
        let line_rects = self.engine.find_text_lines(&ocr_input, &word_rects);
        let lines = self.engine.recognize_text(&ocr_input, &line_rects)?;

        Ok(lines
            .into_iter()
            .flatten()
            .map(|line| {
                let rect = line.bounding_rect();
                RecognizedText {
                    region: BoundingBox {
                        x: rect.left().max(0) as u32,
                        y: rect.top().max(0) as u32,
                        width: rect.width().max(0) as u32,
                        height: rect.height().max(0) as u32,
                    },
                    text: line.to_string(),
                    confidence: DEFAULT_LINE_CONFIDENCE,
                }
            })
            .collect())
    }
}
