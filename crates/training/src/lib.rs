#![recursion_limit = "256"]

pub mod infer;
pub mod model;
pub mod trainer;

pub use infer::{mask_indices, mask_to_image, predict_mask, write_prediction_triple};
pub use model::{check_spatial, ConvBlock, Unet, UnetConfig, UpBlock, POOL_FACTOR};
pub use trainer::{
    load_unet_from_checkpoint, save_checkpoint, train, EpochStats, TrainConfig, TrainHistory,
};

/// Backend alias for training/eval (CPU NdArray).
pub type TrainBackend = burn::backend::ndarray::NdArray<f32>;
/// Autodiff wrapper used by the training loop.
pub type ADBackend = burn::backend::Autodiff<TrainBackend>;
