//! Inference helpers: argmax mask construction and prediction rendering.

use crate::model::Unet;
use burn::tensor::{backend::Backend, Int, Tensor};
use image::{GrayImage, Luma, Rgb, RgbImage};
use std::path::Path;

/// Collapse a logit volume to a predicted-class mask, `[N, 1, H, W]`.
///
/// Pure argmax over the class dimension, no smoothing or thresholding.
/// Deterministic for fixed weights on inference backends; on an autodiff
/// backend dropout stays active, so convert with `AutodiffModule::valid`
/// first.
pub fn predict_mask<B: Backend>(model: &Unet<B>, images: Tensor<B, 4>) -> Tensor<B, 4, Int> {
    model.forward(images).argmax(1)
}

/// Extract per-pixel class indices from a `[N, 1, H, W]` mask tensor.
pub fn mask_indices<B: Backend>(mask: Tensor<B, 4, Int>) -> Vec<u8> {
    mask.float()
        .into_data()
        .to_vec::<f32>()
        .unwrap_or_default()
        .into_iter()
        .map(|v| v as u8)
        .collect()
}

/// Render class indices as a grayscale image, spreading the class range
/// over full luminance so small indices stay distinguishable.
pub fn mask_to_image(mask: &[u8], width: u32, height: u32, num_classes: usize) -> GrayImage {
    let span = num_classes.saturating_sub(1).max(1) as u32;
    let mut out = GrayImage::new(width, height);
    for (i, &class) in mask.iter().enumerate() {
        let x = i as u32 % width;
        let y = i as u32 / width;
        let v = ((class as u32 * 255) / span).min(255) as u8;
        out.put_pixel(x, y, Luma([v]));
    }
    out
}

fn chw_to_rgb(image_chw: &[f32], width: u32, height: u32) -> RgbImage {
    let plane = (width * height) as usize;
    let mut out = RgbImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let idx = (y * width + x) as usize;
            let px = |c: usize| (image_chw[c * plane + idx].clamp(0.0, 1.0) * 255.0) as u8;
            out.put_pixel(x, y, Rgb([px(0), px(1), px(2)]));
        }
    }
    out
}

/// Write an input / ground-truth / prediction strip to `path` as one PNG.
pub fn write_prediction_triple(
    image_chw: &[f32],
    truth: &[u8],
    prediction: &[u8],
    width: u32,
    height: u32,
    num_classes: usize,
    path: &Path,
) -> anyhow::Result<()> {
    let input = chw_to_rgb(image_chw, width, height);
    let truth = mask_to_image(truth, width, height, num_classes);
    let prediction = mask_to_image(prediction, width, height, num_classes);

    let mut strip = RgbImage::new(width * 3, height);
    for y in 0..height {
        for x in 0..width {
            strip.put_pixel(x, y, *input.get_pixel(x, y));
            let t = truth.get_pixel(x, y)[0];
            strip.put_pixel(width + x, y, Rgb([t, t, t]));
            let p = prediction.get_pixel(x, y)[0];
            strip.put_pixel(width * 2 + x, y, Rgb([p, p, p]));
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    strip.save(path)?;
    Ok(())
}
