//! Core types and error definitions for seg_dataset.

use std::path::PathBuf;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, SegDatasetError>;

#[derive(Debug, Error)]
pub enum SegDatasetError {
    #[error("io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image decode error at {}: {source}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("no mask found for image {}", .image.display())]
    MissingMask { image: PathBuf },
    #[error("no image/mask pairs found under {} / {}", .image_dir.display(), .mask_dir.display())]
    EmptyDataset {
        image_dir: PathBuf,
        mask_dir: PathBuf,
    },
}

/// An image file and the mask file sharing its stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplePair {
    pub image_path: PathBuf,
    pub mask_path: PathBuf,
}

/// A decoded, preprocessed sample at the target resolution.
#[derive(Debug, Clone)]
pub struct SegSample {
    /// Image in CHW layout, normalized to [0, 1].
    pub image_chw: Vec<f32>,
    /// Per-pixel class indices, row-major.
    pub mask: Vec<u8>,
    pub width: u32,
    pub height: u32,
}
