use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::info;

use crate::annotate::Annotator;
use crate::config::AppConfig;
use crate::detector::SharedDetector;
use crate::error::Error;
use crate::models::Detection;
use crate::repository::ImageRepository;
use crate::results::ResultStore;

/// Outcome of one detection request.
#[derive(Debug, Clone)]
pub struct WorkflowOutcome {
    /// Source filename the detection ran on.
    pub source: String,
    pub detections: Vec<Detection>,
    /// Where the annotated image was written.
    pub result_path: PathBuf,
    pub elapsed: Duration,
}

/// Orchestrates one full detection request: resolve the selection, run the
/// model, draw the overlays, persist the result.
pub struct DetectionWorkflow {
    repository: ImageRepository,
    detector: SharedDetector,
    annotator: Annotator,
    store: ResultStore,
}

impl DetectionWorkflow {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            repository: ImageRepository::new(&config.image_dir),
            detector: SharedDetector::new(config.model.clone()),
            annotator: Annotator::new(config.model.font_path.as_deref()),
            store: ResultStore::new(&config.result_dir),
        }
    }

    pub fn repository(&self) -> &ImageRepository {
        &self.repository
    }

    /// Load the model ahead of the first request. Purely an optimization;
    /// `run` loads on demand either way.
    pub fn preload(&self) -> Result<(), Error> {
        self.detector.get().map(|_| ())
    }

    /// Process `name` from the repository end to end.
    pub fn run(&self, name: &str) -> Result<WorkflowOutcome, Error> {
        let started = Instant::now();

        let path = self.repository.resolve(name)?;
        let detector = self.detector.get()?;
        let (image, detections) = detector.detect_file(&path)?;
        let annotated = self.annotator.annotate(&image, &detections);
        let result_path = self.store.save(name, &annotated)?;

        let elapsed = started.elapsed();
        info!(
            source = name,
            count = detections.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "detection request complete"
        );

        Ok(WorkflowOutcome {
            source: name.to_string(),
            detections,
            result_path,
            elapsed,
        })
    }
}
