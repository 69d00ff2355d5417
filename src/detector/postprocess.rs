use ndarray::{Array3, ArrayViewD, Axis, Ix3};

use crate::config::ModelConfig;
use crate::detector::preprocess::Letterbox;
use crate::error::Error;
use crate::models::{BoundingBox, Detection};

/// Decode a raw YOLO prediction tensor into detections in source-image
/// coordinates.
///
/// The tensor layout is `[batch, 4 + num_classes, num_predictions]` (a bare
/// 2-D export without the batch axis is accepted too). Each prediction column
/// is a center-format box followed by one score per class.
pub fn decode_predictions(
    output: ArrayViewD<'_, f32>,
    letterbox: &Letterbox,
    source_width: u32,
    source_height: u32,
    config: &ModelConfig,
) -> Result<Vec<Detection>, Error> {
    let pred: Array3<f32> = match output.ndim() {
        2 => output
            .to_owned()
            .insert_axis(Axis(0))
            .into_dimensionality::<Ix3>()
            .map_err(|e| Error::Inference(e.to_string()))?,
        3 => output
            .to_owned()
            .into_dimensionality::<Ix3>()
            .map_err(|e| Error::Inference(e.to_string()))?,
        rank => {
            return Err(Error::Inference(format!(
                "unexpected model output rank {rank} (shape {:?})",
                output.shape()
            )));
        }
    };

    let (_, rows, count) = pred.dim();
    if rows <= 4 {
        return Err(Error::Inference(format!(
            "model output has {rows} rows per prediction; expected 4 + classes"
        )));
    }
    let num_classes = rows - 4;

    let mut per_class: Vec<Vec<Detection>> = vec![Vec::new(); num_classes];
    for index in 0..count {
        let mut class_id = 0;
        let mut confidence = f32::NEG_INFINITY;
        for class in 0..num_classes {
            let score = pred[[0, 4 + class, index]];
            if score > confidence {
                confidence = score;
                class_id = class;
            }
        }
        if confidence <= config.confidence_threshold {
            continue;
        }

        let cx = pred[[0, 0, index]];
        let cy = pred[[0, 1, index]];
        let w = pred[[0, 2, index]];
        let h = pred[[0, 3, index]];

        let (x1, y1) = letterbox.to_source(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.to_source(cx + w / 2.0, cy + h / 2.0);
        let bbox =
            BoundingBox { x1, y1, x2, y2 }.clamp(source_width as f32, source_height as f32);
        if bbox.width() <= 0.0 || bbox.height() <= 0.0 {
            continue;
        }

        let label = config
            .class_names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class {class_id}"));
        per_class[class_id].push(Detection {
            bbox,
            class_id,
            label,
            confidence,
        });
    }

    non_maximum_suppression(&mut per_class, config.iou_threshold);

    let mut detections: Vec<Detection> = per_class.into_iter().flatten().collect();
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    Ok(detections)
}

/// Per-class non-maximum suppression.
///
/// Within each class bucket, boxes overlapping an already kept box by more
/// than `threshold` IoU are dropped, highest confidence first.
pub fn non_maximum_suppression(buckets: &mut [Vec<Detection>], threshold: f32) {
    for bucket in buckets.iter_mut() {
        bucket.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        let mut kept = 0;
        for index in 0..bucket.len() {
            let mut drop = false;
            for prev in 0..kept {
                if bucket[prev].bbox.iou(&bucket[index].bbox) > threshold {
                    drop = true;
                    break;
                }
            }
            if !drop {
                bucket.swap(kept, index);
                kept += 1;
            }
        }
        bucket.truncate(kept);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use ndarray::Array3;

    fn detection(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> Detection {
        Detection {
            bbox: BoundingBox { x1, y1, x2, y2 },
            class_id: 0,
            label: "banana".to_string(),
            confidence,
        }
    }

    fn identity_letterbox(size: u32) -> Letterbox {
        Letterbox {
            image: RgbImage::new(size, size),
            scale: 1.0,
            pad_x: 0,
            pad_y: 0,
        }
    }

    fn test_config(class_names: &[&str]) -> ModelConfig {
        ModelConfig {
            class_names: class_names.iter().map(|s| s.to_string()).collect(),
            ..ModelConfig::default()
        }
    }

    /// Output tensor with two classes and three predictions: two overlapping
    /// boxes for class 0 and one below the confidence threshold.
    fn sample_output() -> Array3<f32> {
        let mut out = Array3::<f32>::zeros((1, 6, 3));
        // prediction 0: box centered at (32, 32), 20x10, class 0 at 0.9
        out[[0, 0, 0]] = 32.0;
        out[[0, 1, 0]] = 32.0;
        out[[0, 2, 0]] = 20.0;
        out[[0, 3, 0]] = 10.0;
        out[[0, 4, 0]] = 0.9;
        // prediction 1: nearly the same box, class 0 at 0.8 (suppressed)
        out[[0, 0, 1]] = 33.0;
        out[[0, 1, 1]] = 32.0;
        out[[0, 2, 1]] = 20.0;
        out[[0, 3, 1]] = 10.0;
        out[[0, 4, 1]] = 0.8;
        // prediction 2: below the confidence threshold
        out[[0, 0, 2]] = 10.0;
        out[[0, 1, 2]] = 10.0;
        out[[0, 2, 2]] = 8.0;
        out[[0, 3, 2]] = 8.0;
        out[[0, 5, 2]] = 0.1;
        out
    }

    #[test]
    fn decode_keeps_confident_prediction_and_suppresses_overlap() {
        let out = sample_output();
        let config = test_config(&["banana", "apple"]);
        let detections = decode_predictions(
            out.view().into_dyn(),
            &identity_letterbox(64),
            64,
            64,
            &config,
        )
        .unwrap();

        assert_eq!(detections.len(), 1);
        let det = &detections[0];
        assert_eq!(det.class_id, 0);
        assert_eq!(det.label, "banana");
        assert_eq!(det.confidence, 0.9);
        assert_eq!(det.bbox.x1, 22.0);
        assert_eq!(det.bbox.y1, 27.0);
        assert_eq!(det.bbox.x2, 42.0);
        assert_eq!(det.bbox.y2, 37.0);
    }

    #[test]
    fn decode_accepts_two_dimensional_output() {
        let out = sample_output();
        let squeezed = out.index_axis(Axis(0), 0).to_owned();
        let config = test_config(&["banana", "apple"]);
        let detections = decode_predictions(
            squeezed.view().into_dyn(),
            &identity_letterbox(64),
            64,
            64,
            &config,
        )
        .unwrap();
        assert_eq!(detections.len(), 1);
    }

    #[test]
    fn decode_is_deterministic() {
        let out = sample_output();
        let config = test_config(&["banana", "apple"]);
        let lb = identity_letterbox(64);
        let first = decode_predictions(out.view().into_dyn(), &lb, 64, 64, &config).unwrap();
        let second = decode_predictions(out.view().into_dyn(), &lb, 64, 64, &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn decode_maps_through_letterbox_padding() {
        let out = sample_output();
        let config = test_config(&["banana", "apple"]);
        let lb = Letterbox {
            image: RgbImage::new(64, 64),
            scale: 0.5,
            pad_x: 0,
            pad_y: 16,
        };
        let detections =
            decode_predictions(out.view().into_dyn(), &lb, 128, 64, &config).unwrap();

        let det = &detections[0];
        assert_eq!(det.bbox.x1, 44.0);
        assert_eq!(det.bbox.y1, 22.0);
        assert_eq!(det.bbox.x2, 84.0);
        assert_eq!(det.bbox.y2, 42.0);
    }

    #[test]
    fn decode_falls_back_to_index_label_when_names_run_out() {
        let out = sample_output();
        let config = test_config(&[]);
        let detections = decode_predictions(
            out.view().into_dyn(),
            &identity_letterbox(64),
            64,
            64,
            &config,
        )
        .unwrap();
        assert_eq!(detections[0].label, "class 0");
    }

    #[test]
    fn decode_rejects_unexpected_rank() {
        let flat = ndarray::Array1::<f32>::zeros(6);
        let config = test_config(&["banana"]);
        let result = decode_predictions(
            flat.view().into_dyn(),
            &identity_letterbox(64),
            64,
            64,
            &config,
        );
        assert!(matches!(result, Err(Error::Inference(_))));
    }

    #[test]
    fn nms_drops_duplicate_boxes() {
        let mut buckets = vec![vec![
            detection(0.0, 0.0, 10.0, 10.0, 0.5),
            detection(0.0, 0.0, 10.0, 10.0, 0.6),
        ]];
        non_maximum_suppression(&mut buckets, 0.5);
        assert_eq!(buckets[0].len(), 1);
        assert_eq!(buckets[0][0].confidence, 0.6);
    }

    #[test]
    fn nms_keeps_distant_boxes() {
        let mut buckets = vec![vec![
            detection(0.0, 0.0, 10.0, 10.0, 0.5),
            detection(50.0, 50.0, 60.0, 60.0, 0.4),
        ]];
        non_maximum_suppression(&mut buckets, 0.5);
        assert_eq!(buckets[0].len(), 2);
    }

    #[test]
    fn nms_is_per_class() {
        let mut buckets = vec![
            vec![detection(0.0, 0.0, 10.0, 10.0, 0.5)],
            vec![detection(0.0, 0.0, 10.0, 10.0, 0.4)],
        ];
        non_maximum_suppression(&mut buckets, 0.5);
        assert_eq!(buckets[0].len(), 1);
        assert_eq!(buckets[1].len(), 1);
    }
}
