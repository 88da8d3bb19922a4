use std::io::Cursor;
use std::sync::{Arc, Mutex};

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb, RgbImage};
use platescan::core::storage::FsObjectStore;
use platescan::{
    BoundingBox, DetectionRegion, DetectionStage, OcrStage, PlateDetector, RecognizedText,
    ResultDb, TextRecognizer,
};

pub const RAW_BUCKET: &str = "raw";
pub const PLATE_BUCKET: &str = "plates";
pub const PLATE_LABEL: &str = "plate";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Encodes a 120x80 grey image in the given format.
pub fn test_image_bytes(format: ImageFormat) -> Vec<u8> {
    let img = ImageBuffer::from_fn(120, 80, |x, _| Rgb([(x * 2) as u8, 128u8, 64u8]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, format)
        .expect("Failed to encode test image");
    buf.into_inner()
}

/// A region labelled `label` covering the given corners.
pub fn region(label: &str, x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> DetectionRegion {
    DetectionRegion {
        label: label.to_string(),
        confidence: 0.87,
        x_min,
        y_min,
        x_max,
        y_max,
    }
}

/// Detector that reports the same regions for every image.
pub struct FakeDetector {
    regions: Vec<DetectionRegion>,
}

impl FakeDetector {
    pub fn new(regions: Vec<DetectionRegion>) -> Self {
        Self { regions }
    }

    pub fn nothing() -> Self {
        Self::new(Vec::new())
    }

    pub fn one_plate() -> Self {
        Self::new(vec![region(PLATE_LABEL, 10.0, 20.0, 90.0, 50.0)])
    }
}

impl PlateDetector for FakeDetector {
    fn detect(&self, _image: &DynamicImage) -> anyhow::Result<Vec<DetectionRegion>> {
        Ok(self.regions.clone())
    }
}

/// Recognizer replaying a scripted answer. `None` makes it fail.
/// Clones share the script, so a test can change it after handing one over.
#[derive(Clone)]
pub struct FakeRecognizer {
    script: Arc<Mutex<Option<Vec<(String, f32)>>>>,
}

impl FakeRecognizer {
    pub fn reads(lines: &[(&str, f32)]) -> Self {
        Self {
            script: Arc::new(Mutex::new(Some(
                lines.iter().map(|(t, c)| (t.to_string(), *c)).collect(),
            ))),
        }
    }

    pub fn failing() -> Self {
        Self {
            script: Arc::new(Mutex::new(None)),
        }
    }

    pub fn set_lines(&self, lines: &[(&str, f32)]) {
        *self.script.lock().unwrap() = Some(lines.iter().map(|(t, c)| (t.to_string(), *c)).collect());
    }
}

impl TextRecognizer for FakeRecognizer {
    fn recognize(&self, image: &RgbImage) -> anyhow::Result<Vec<RecognizedText>> {
        let script = self.script.lock().unwrap();
        let Some(lines) = script.as_ref() else {
            anyhow::bail!("engine unavailable");
        };
        let region = BoundingBox {
            x: 0,
            y: 0,
            width: image.width(),
            height: image.height(),
        };
        Ok(lines
            .iter()
            .map(|(text, confidence)| RecognizedText {
                region,
                text: text.clone(),
                confidence: *confidence,
            })
            .collect())
    }
}

/// Object store and result table in a temporary directory.
/// The directory must be kept alive for the duration of the test.
pub struct TestEnv {
    pub store: Arc<FsObjectStore>,
    pub table: Arc<ResultDb>,
    pub dir: tempfile::TempDir,
}

pub async fn create_test_env() -> TestEnv {
    init_logging();
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    let store = Arc::new(FsObjectStore::new(dir.path().join("store")));
    let table = Arc::new(
        ResultDb::open(dir.path().join("results.db"))
            .await
            .expect("Failed to open result table"),
    );
    TestEnv { store, table, dir }
}

impl TestEnv {
    pub fn detection_stage(&self, detector: FakeDetector) -> DetectionStage<FsObjectStore, ResultDb, FakeDetector> {
        DetectionStage::new(
            Arc::clone(&self.store),
            Arc::clone(&self.table),
            detector,
            PLATE_BUCKET,
            PLATE_LABEL,
        )
    }

    pub fn ocr_stage(&self, recognizer: FakeRecognizer) -> OcrStage<FsObjectStore, ResultDb, FakeRecognizer> {
        OcrStage::new(Arc::clone(&self.store), Arc::clone(&self.table), recognizer)
    }
}
