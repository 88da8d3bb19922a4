use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Bucket names and local locations of the object store and result table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Root directory of the filesystem object store
    pub data_dir: PathBuf,
    /// Bucket receiving raw uploads
    pub raw_bucket: String,
    /// Bucket receiving cropped plates and their sidecars
    pub plate_bucket: String,
    /// SQLite file backing the result table; `<data_dir>/plate-detection-info-prod.db`
    /// when unset
    pub table_path: Option<PathBuf>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            raw_bucket: "upload-image-first-stage-prod".into(),
            plate_bucket: "upload-image-second-stage-prod".into(),
            table_path: None,
        }
    }
}

const DEFAULT_TABLE_FILE: &str = "plate-detection-info-prod.db";

impl StorageSettings {
    pub fn table_path(&self) -> PathBuf {
        match &self.table_path {
            Some(path) => path.clone(),
            None => self.data_dir.join(DEFAULT_TABLE_FILE),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    pub model_path: PathBuf,
    /// Square model input edge, 640 for stock YOLOv8 exports
    pub input_size: u32,
    pub conf_threshold: f32,
    pub iou_threshold: f32,
    /// Label for each class index of the model output
    pub class_names: Vec<String>,
    /// Label whose regions are cropped and sent to OCR
    pub target_label: String,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/plate-detector.rten"),
            input_size: 640,
            conf_threshold: 0.25,
            iou_threshold: 0.45,
            class_names: vec!["plate".into()],
            target_label: "plate".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Defaults to `~/.cache/ocrs/text-detection.rten`
    pub detection_model: Option<PathBuf>,
    /// Defaults to `~/.cache/ocrs/text-recognition.rten`
    pub recognition_model: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerSettings {
    pub max_attempts: u32,
    pub delay_secs: u64,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            max_attempts: 9,
            delay_secs: 10,
        }
    }
}

impl PollerSettings {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub storage: StorageSettings,
    pub detector: DetectorSettings,
    pub ocr: OcrSettings,
    pub poller: PollerSettings,
}

impl Settings {
    /// Read settings from a JSON file; missing keys keep their defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))
    }

    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Move the object store root. The result table moves along with it
    /// unless its path was set explicitly.
    pub fn with_data_dir(mut self, data_dir: PathBuf) -> Self {
        self.storage.data_dir = data_dir;
        self
    }
}
