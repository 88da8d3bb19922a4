pub mod config;
pub mod core;
pub mod detection;
pub mod error;
pub mod models;
pub mod ocr;
pub mod pipeline;
pub mod poller;
pub mod upload;

pub use config::Settings;
pub use crate::core::db::{ResultDb, ResultTable};
pub use crate::core::storage::{FsObjectStore, NotifyingStore, ObjectStore, StorageEvent};
pub use detection::{DetectionStage, DetectionSummary, PlateDetector, YoloPlateDetector};
pub use error::PipelineError;
pub use models::{
    BoundingBox, Confidence, DetectionRecord, DetectionRegion, MetadataSidecar, PlateReading,
    PlateType, RecognizedText, RecordKey,
};
pub use ocr::{OcrOutcome, OcrStage, OcrsRecognizer, TextRecognizer, preprocess_image};
pub use pipeline::{EventDispatcher, Route, StageReport};
pub use poller::{PollOutcome, RetrievalPoller};
