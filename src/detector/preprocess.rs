use image::{Rgb, RgbImage, imageops};
use ndarray::Array4;

/// Gray fill used for the padded border, the conventional YOLO value.
const PAD_COLOR: Rgb<u8> = Rgb([114, 114, 114]);

/// A source image resized into the model's square input, preserving aspect
/// ratio, with the bookkeeping needed to map predictions back.
#[derive(Debug)]
pub struct Letterbox {
    /// The padded square canvas fed to the model.
    pub image: RgbImage,
    /// Source-to-canvas scale factor.
    pub scale: f32,
    /// Horizontal padding on the left edge of the canvas, in pixels.
    pub pad_x: u32,
    /// Vertical padding on the top edge of the canvas, in pixels.
    pub pad_y: u32,
}

impl Letterbox {
    /// Map a canvas coordinate back to source-image pixels.
    pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.pad_x as f32) / self.scale,
            (y - self.pad_y as f32) / self.scale,
        )
    }
}

/// Resize `image` to fit a `size` x `size` canvas and center it on gray
/// padding.
pub fn letterbox(image: &RgbImage, size: u32) -> Letterbox {
    let (width, height) = image.dimensions();
    let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
    let scaled_w = ((width as f32 * scale).round() as u32).clamp(1, size);
    let scaled_h = ((height as f32 * scale).round() as u32).clamp(1, size);

    let resized = imageops::resize(image, scaled_w, scaled_h, imageops::FilterType::Triangle);

    let mut canvas = RgbImage::from_pixel(size, size, PAD_COLOR);
    let pad_x = (size - scaled_w) / 2;
    let pad_y = (size - scaled_h) / 2;
    imageops::overlay(&mut canvas, &resized, pad_x as i64, pad_y as i64);

    Letterbox {
        image: canvas,
        scale,
        pad_x,
        pad_y,
    }
}

/// Convert an RGB image to a normalized NCHW float tensor.
pub fn to_tensor(image: &RgbImage) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
    for (x, y, pixel) in image.enumerate_pixels() {
        for channel in 0..3 {
            tensor[[0, channel, y as usize, x as usize]] = pixel[channel] as f32 / 255.0;
        }
    }
    tensor
}
