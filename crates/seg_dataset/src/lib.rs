//! Dataset loading and Burn-compatible batching for road-scene segmentation.
//!
//! This crate provides utilities for:
//! - Pairing RGB frames with their segmentation masks on disk
//! - Decoding, normalizing, and resizing image/mask pairs
//! - Burn-compatible batch iteration with seeded shuffling

// Module declarations
pub mod batch;
pub mod pairs;
pub mod transform;
pub mod types;

// Re-export public API
pub use batch::{BatchIter, DatasetConfig, SegBatch};
pub use pairs::index_pairs;
pub use transform::{collapse_to_classes, load_pair};
pub use types::*;
