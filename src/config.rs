use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::models::COCO_CLASSES;

/// Application configuration.
///
/// Every path is explicit; nothing is read from ambient environment state.
/// Defaults mirror the conventional layout: images under `static/images`,
/// results under `results`, the model under `model/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the fixed set of selectable images.
    pub image_dir: PathBuf,
    /// Directory the annotated results are written to.
    pub result_dir: PathBuf,
    pub model: ModelConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from("static/images"),
            result_dir: PathBuf::from("results"),
            model: ModelConfig::default(),
        }
    }
}

/// Detection model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the ONNX weights file.
    pub path: PathBuf,
    /// Square input size the image is letterboxed to. Must match the export.
    pub input_size: u32,
    /// Minimum confidence for a prediction to be kept.
    pub confidence_threshold: f32,
    /// IoU threshold for non-maximum suppression.
    pub iou_threshold: f32,
    /// Class names in model output order.
    pub class_names: Vec<String>,
    /// Optional font for label text; common system fonts are tried when unset.
    pub font_path: Option<PathBuf>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("model/best.onnx"),
            input_size: 640,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            class_names: COCO_CLASSES.iter().map(|s| s.to_string()).collect(),
            font_path: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file. Unset keys fall back to defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}
