pub mod postprocess;
pub mod preprocess;
mod shared;

pub use shared::SharedDetector;

use std::path::Path;
use std::sync::Mutex;

use image::DynamicImage;
use ort::execution_providers::CPUExecutionProvider;
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::Value;
use tracing::{debug, info};

use crate::config::ModelConfig;
use crate::error::Error;
use crate::models::Detection;

/// Wrapper around a pretrained ONNX object-detection model.
///
/// Loaded once and reused; the session sits behind a mutex only because
/// `ort`'s `run` takes `&mut self` — the model itself is read-only.
pub struct Detector {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    config: ModelConfig,
}

impl std::fmt::Debug for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector")
            .field("model", &self.config.path)
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .finish_non_exhaustive()
    }
}

impl Detector {
    /// Build an inference session from the configured weights file.
    pub fn load(config: &ModelConfig) -> Result<Self, Error> {
        if !config.path.is_file() {
            return Err(Error::NotFound(config.path.clone()));
        }

        let load_err = |e: ort::Error| Error::ModelLoad(e.to_string());
        let session = Session::builder()
            .map_err(load_err)?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .map_err(load_err)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(load_err)?
            .with_intra_threads(4)
            .map_err(load_err)?
            .commit_from_file(&config.path)
            .map_err(load_err)?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "images".to_string());
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .unwrap_or_else(|| "output0".to_string());

        info!(
            model = %config.path.display(),
            input = %input_name,
            output = %output_name,
            "detection model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            config: config.clone(),
        })
    }

    /// Run detection on a decoded image, returning boxes in source-image
    /// pixel coordinates.
    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>, Error> {
        let rgb = image.to_rgb8();
        let lb = preprocess::letterbox(&rgb, self.config.input_size);
        let tensor = preprocess::to_tensor(&lb.image);

        let input = Value::from_array(tensor).map_err(|e| Error::Inference(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| Error::Inference("detector session lock poisoned".to_string()))?;
        let outputs = session
            .run(ort::inputs![&self.input_name => input])
            .map_err(|e| Error::Inference(e.to_string()))?;

        let output = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| Error::Inference(e.to_string()))?;
        debug!(output = %self.output_name, shape = ?output.shape(), "raw predictions");

        let detections =
            postprocess::decode_predictions(output, &lb, rgb.width(), rgb.height(), &self.config)?;
        debug!(count = detections.len(), "inference complete");
        Ok(detections)
    }

    /// Decode an image file and run detection on it.
    pub fn detect_file(&self, path: &Path) -> Result<(DynamicImage, Vec<Detection>), Error> {
        if !path.is_file() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        let image = image::open(path).map_err(|e| {
            Error::Inference(format!("failed to decode {}: {e}", path.display()))
        })?;
        let detections = self.detect(&image)?;
        Ok((image, detections))
    }
}
