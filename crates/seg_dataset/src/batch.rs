//! Batch iteration for training and evaluation.

use crate::pairs::index_pairs;
use crate::transform::load_pair;
use crate::types::{DatasetResult, SamplePair, SegSample};
use burn::tensor::{backend::Backend, Int, Tensor, TensorData};
use rand::{seq::SliceRandom, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Resize all images and masks to this (width, height).
    pub target_size: (u32, u32),
    /// Shuffle samples before iteration.
    pub shuffle: bool,
    /// Seed for reproducible shuffling.
    pub seed: Option<u64>,
    /// Drop the last partial batch.
    pub drop_last: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            target_size: (128, 96),
            shuffle: true,
            seed: None,
            drop_last: false,
        }
    }
}

pub struct SegBatch<B: Backend> {
    /// Images, shape `[N, 3, H, W]`, values in [0, 1].
    pub images: Tensor<B, 4>,
    /// Class-index masks, shape `[N, 1, H, W]`.
    pub masks: Tensor<B, 4, Int>,
}

pub struct BatchIter {
    pairs: Vec<SamplePair>,
    cursor: usize,
    cfg: DatasetConfig,
    images_buf: Vec<f32>,
    masks_buf: Vec<i32>,
}

impl BatchIter {
    pub fn from_dirs(image_dir: &Path, mask_dir: &Path, cfg: DatasetConfig) -> DatasetResult<Self> {
        let pairs = index_pairs(image_dir, mask_dir)?;
        Self::from_pairs(pairs, cfg)
    }

    pub fn from_pairs(mut pairs: Vec<SamplePair>, cfg: DatasetConfig) -> DatasetResult<Self> {
        let mut rng = match cfg.seed {
            Some(seed) => rand::rngs::StdRng::seed_from_u64(seed),
            None => rand::rngs::StdRng::from_rng(&mut rand::rng()),
        };
        if cfg.shuffle {
            pairs.shuffle(&mut rng);
        }
        Ok(Self {
            pairs,
            cursor: 0,
            cfg,
            images_buf: Vec::new(),
            masks_buf: Vec::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Load and assemble the next batch, or `None` once exhausted.
    ///
    /// Decode failures are fatal; a corrupt file aborts iteration rather
    /// than silently shrinking the epoch.
    pub fn next_batch<B: Backend>(
        &mut self,
        batch_size: usize,
        device: &B::Device,
    ) -> DatasetResult<Option<SegBatch<B>>> {
        if self.cursor >= self.pairs.len() {
            return Ok(None);
        }
        let end = (self.cursor + batch_size).min(self.pairs.len());
        let slice = &self.pairs[self.cursor..end];
        self.cursor = end;

        let batch_len = slice.len();
        if self.cfg.drop_last && batch_len < batch_size {
            return Ok(None);
        }

        let target = self.cfg.target_size;
        let mut loaded: Vec<(usize, DatasetResult<SegSample>)> = slice
            .par_iter()
            .enumerate()
            .map(|(i, pair)| (i, load_pair(pair, target)))
            .collect();
        loaded.sort_by_key(|(i, _)| *i);

        let (width, height) = (target.0 as usize, target.1 as usize);
        self.images_buf.clear();
        self.masks_buf.clear();
        self.images_buf.reserve(batch_len * 3 * height * width);
        self.masks_buf.reserve(batch_len * height * width);
        for (_i, res) in loaded {
            let sample = res?;
            self.images_buf.extend_from_slice(&sample.image_chw);
            self.masks_buf.extend(sample.mask.iter().map(|&v| v as i32));
        }

        let images = Tensor::<B, 1>::from_floats(self.images_buf.as_slice(), device)
            .reshape([batch_len, 3, height, width]);
        let masks = Tensor::<B, 1, Int>::from_data(
            TensorData::new(self.masks_buf.clone(), [batch_len * height * width])
                .convert::<B::IntElem>(),
            device,
        )
        .reshape([batch_len, 1, height, width]);

        Ok(Some(SegBatch { images, masks }))
    }
}
