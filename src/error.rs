use thiserror::Error;

/// Failures a caller may need to tell apart from generic I/O errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Object bytes are not a decodable raster image
    #[error("Failed to decode image {bucket}/{key}: {source}")]
    Decode {
        bucket: String,
        key: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Object not found: {bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    /// Key has an empty, `.` or `..` segment
    #[error("Invalid object key: {0:?}")]
    InvalidKey(String),

    /// Upload is not a jpg/jpeg/png file
    #[error("Unsupported upload {0:?}: expected a jpg, jpeg or png image")]
    UnsupportedUpload(String),
}
