use std::path::PathBuf;

/// Errors produced by the detection workflow.
///
/// Every variant is surfaced to the user at the application boundary; none of
/// them should ever take the process down once the UI is running.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required file or directory does not exist (image directory, selected
    /// image, or model weights).
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The detection model could not be loaded.
    #[error("failed to load detection model: {0}")]
    ModelLoad(String),

    /// The selected image could not be decoded or inference failed on it.
    #[error("inference failed: {0}")]
    Inference(String),

    /// The annotated result could not be persisted.
    #[error("failed to write result: {0}")]
    ResultWrite(String),
}
