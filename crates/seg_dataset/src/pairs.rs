//! Pairing raw frames with their segmentation masks.

use crate::types::{DatasetResult, SamplePair, SegDatasetError};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const RASTER_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

fn is_raster(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| {
            RASTER_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

fn raster_files(dir: &Path) -> DatasetResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| SegDatasetError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;
    let mut files = Vec::new();
    for entry in entries {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        if path.is_file() && is_raster(&path) {
            files.push(path);
        }
    }
    Ok(files)
}

/// Scan an image directory and a mask directory and pair files by stem.
///
/// Pairing by stem rather than listing order means a missing or misnamed
/// mask surfaces as an error instead of silently mispairing frames.
pub fn index_pairs(image_dir: &Path, mask_dir: &Path) -> DatasetResult<Vec<SamplePair>> {
    let mut masks_by_stem: BTreeMap<String, PathBuf> = BTreeMap::new();
    for path in raster_files(mask_dir)? {
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            masks_by_stem.insert(stem.to_string(), path);
        }
    }

    let mut pairs = Vec::new();
    for image_path in raster_files(image_dir)? {
        let Some(stem) = image_path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let mask_path = masks_by_stem
            .get(stem)
            .cloned()
            .ok_or_else(|| SegDatasetError::MissingMask {
                image: image_path.clone(),
            })?;
        pairs.push(SamplePair {
            image_path,
            mask_path,
        });
    }
    pairs.sort_by(|a, b| a.image_path.cmp(&b.image_path));

    if pairs.is_empty() {
        return Err(SegDatasetError::EmptyDataset {
            image_dir: image_dir.to_path_buf(),
            mask_dir: mask_dir.to_path_buf(),
        });
    }
    Ok(pairs)
}
