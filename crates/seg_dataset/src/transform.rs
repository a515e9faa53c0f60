//! Decoding, normalization, and resizing of image/mask pairs.

use crate::types::{DatasetResult, SamplePair, SegDatasetError, SegSample};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma};

/// Collapse a mask raster to single-channel class indices by taking the
/// per-pixel maximum across channels.
///
/// Mask files replicate the class id across their channels, so the max
/// recovers it; an already-single-channel mask passes through unchanged.
pub fn collapse_to_classes(img: &DynamicImage) -> GrayImage {
    let rgb = img.to_rgb8();
    let mut out = GrayImage::new(rgb.width(), rgb.height());
    for (x, y, p) in rgb.enumerate_pixels() {
        out.put_pixel(x, y, Luma([p.0[0].max(p.0[1]).max(p.0[2])]));
    }
    out
}

/// Decode one pair and produce a normalized sample at `target` (width, height).
///
/// Both rasters are resized with nearest-neighbor interpolation; anything
/// else would blend neighboring class ids into labels that exist nowhere
/// in the dataset.
pub fn load_pair(pair: &SamplePair, target: (u32, u32)) -> DatasetResult<SegSample> {
    let (width, height) = target;

    let img = image::open(&pair.image_path)
        .map_err(|e| SegDatasetError::Image {
            path: pair.image_path.clone(),
            source: e,
        })?
        .to_rgb8();
    let img = image::imageops::resize(&img, width, height, FilterType::Nearest);

    let mask = image::open(&pair.mask_path).map_err(|e| SegDatasetError::Image {
        path: pair.mask_path.clone(),
        source: e,
    })?;
    let mask = collapse_to_classes(&mask);
    let mask = image::imageops::resize(&mask, width, height, FilterType::Nearest);

    let num_pixels = (width * height) as usize;
    let mut image_chw = Vec::with_capacity(3 * num_pixels);
    for c in 0..3 {
        for y in 0..height {
            for x in 0..width {
                image_chw.push(img.get_pixel(x, y)[c] as f32 / 255.0);
            }
        }
    }

    Ok(SegSample {
        image_chw,
        mask: mask.into_raw(),
        width,
        height,
    })
}
