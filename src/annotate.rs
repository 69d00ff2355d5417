use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use tracing::{debug, warn};

use crate::models::Detection;

/// Box outline thickness in pixels.
const BOX_THICKNESS: i32 = 2;

/// Label text height.
const LABEL_SCALE: f32 = 16.0;

/// Distinct colors cycled per class index.
const PALETTE: [[u8; 3]; 12] = [
    [230, 57, 70],
    [46, 134, 222],
    [38, 166, 91],
    [243, 156, 18],
    [155, 89, 182],
    [22, 160, 133],
    [231, 76, 60],
    [52, 73, 94],
    [241, 196, 15],
    [211, 84, 0],
    [127, 140, 141],
    [192, 57, 43],
];

/// System font locations tried when no font is configured.
const FALLBACK_FONTS: [&str; 4] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/Library/Fonts/Arial Unicode.ttf",
];

/// Draws detection overlays onto a copy of the source image.
///
/// Boxes are always drawn; label text needs a usable TrueType font. When none
/// is found the annotator degrades to box-only output rather than failing.
pub struct Annotator {
    font: Option<FontVec>,
}

impl Annotator {
    pub fn new(font_path: Option<&Path>) -> Self {
        let font = load_font(font_path);
        if font.is_none() {
            warn!("no label font found; boxes will be drawn without text");
        }
        Self { font }
    }

    /// Overlay `detections` onto a copy of `image`. An empty detection list
    /// returns the pixels unchanged.
    pub fn annotate(&self, image: &DynamicImage, detections: &[Detection]) -> RgbImage {
        let mut canvas = image.to_rgb8();
        let (width, height) = canvas.dimensions();

        for detection in detections {
            let bbox = detection.bbox.clamp(width as f32, height as f32);
            let x = bbox.x1.round() as i32;
            let y = bbox.y1.round() as i32;
            let w = bbox.width().round() as i32;
            let h = bbox.height().round() as i32;
            if w <= 0 || h <= 0 {
                continue;
            }

            let color = class_color(detection.class_id);
            for inset in 0..BOX_THICKNESS {
                let inner_w = w - 2 * inset;
                let inner_h = h - 2 * inset;
                if inner_w <= 0 || inner_h <= 0 {
                    break;
                }
                draw_hollow_rect_mut(
                    &mut canvas,
                    Rect::at(x + inset, y + inset).of_size(inner_w as u32, inner_h as u32),
                    color,
                );
            }

            if let Some(font) = &self.font {
                self.draw_label(&mut canvas, detection, x, y, color, font);
            }
        }

        canvas
    }

    fn draw_label(
        &self,
        canvas: &mut RgbImage,
        detection: &Detection,
        x: i32,
        y: i32,
        color: Rgb<u8>,
        font: &FontVec,
    ) {
        let text = format!(
            "{} {:.0}%",
            detection.label,
            detection.confidence * 100.0
        );
        let scale = PxScale::from(LABEL_SCALE);
        let (text_w, text_h) = text_size(scale, font, &text);
        let (text_w, text_h) = (text_w as i32, text_h as i32);

        // place the tag above the box, or inside it when clipped at the top
        let tag_y = if y >= text_h + 4 { y - text_h - 4 } else { y };
        draw_filled_rect_mut(
            canvas,
            Rect::at(x, tag_y).of_size((text_w + 6) as u32, (text_h + 4) as u32),
            color,
        );
        draw_text_mut(
            canvas,
            Rgb([255, 255, 255]),
            x + 3,
            tag_y + 2,
            scale,
            font,
            &text,
        );
    }
}

fn class_color(class_id: usize) -> Rgb<u8> {
    Rgb(PALETTE[class_id % PALETTE.len()])
}

fn load_font(configured: Option<&Path>) -> Option<FontVec> {
    let candidates = configured
        .map(Path::to_path_buf)
        .into_iter()
        .chain(FALLBACK_FONTS.iter().map(PathBuf::from));

    for candidate in candidates {
        let Ok(data) = fs::read(&candidate) else {
            continue;
        };
        match FontVec::try_from_vec(data) {
            Ok(font) => {
                debug!(path = %candidate.display(), "label font loaded");
                return Some(font);
            }
            Err(_) => warn!(path = %candidate.display(), "unusable label font, skipping"),
        }
    }
    None
}
