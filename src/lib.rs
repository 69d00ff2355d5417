pub mod annotate;
pub mod config;
pub mod detector;
pub mod error;
pub mod models;
pub mod repository;
pub mod results;
pub mod workflow;

pub use annotate::Annotator;
pub use config::{AppConfig, ModelConfig};
pub use detector::{Detector, SharedDetector};
pub use error::Error;
pub use models::{BoundingBox, Detection};
pub use repository::ImageRepository;
pub use results::ResultStore;
pub use workflow::{DetectionWorkflow, WorkflowOutcome};

#[cfg(feature = "gui")]
pub mod gui;
