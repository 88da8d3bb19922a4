mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from platescan for tests
pub use platescan::core::storage::FsObjectStore;
pub use platescan::{
    DetectionRecord, DetectionRegion, DetectionStage, MetadataSidecar, ObjectStore, OcrOutcome,
    OcrStage, PlateType, ResultDb, ResultTable, RetrievalPoller, StorageEvent,
};
