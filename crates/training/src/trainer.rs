//! Epoch loop, loss/accuracy accumulation, and checkpoint helpers.

use crate::model::{check_spatial, Unet, UnetConfig};
use crate::{ADBackend, TrainBackend};
use burn::module::Module;
use burn::nn::loss::{CrossEntropyLoss, CrossEntropyLossConfig};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::record::{BinFileRecorder, FullPrecisionSettings, RecorderError};
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};
use seg_dataset::{BatchIter, DatasetConfig, SamplePair};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub lr: f64,
    pub seed: Option<u64>,
    /// Optional JSONL sink; one serialized `EpochStats` appended per epoch.
    pub metrics_out: Option<PathBuf>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 40,
            batch_size: 32,
            lr: 1e-3,
            seed: None,
            metrics_out: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochStats {
    pub epoch: usize,
    pub loss: f32,
    pub accuracy: f32,
}

/// Per-epoch loss and pixel accuracy, accumulated for inspection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainHistory {
    pub epochs: Vec<EpochStats>,
}

/// Read a rank-1 scalar tensor back to the host. A failed readback is an
/// error, not a silent zero in the reported metrics.
fn read_scalar<B: Backend>(tensor: Tensor<B, 1>, what: &str) -> anyhow::Result<f32> {
    tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("failed to read {what} from backend: {e:?}"))?
        .first()
        .copied()
        .ok_or_else(|| anyhow::anyhow!("{what} tensor is empty"))
}

/// Flatten logits `[N, C, H, W]` and masks `[N, 1, H, W]` to the
/// `[N*H*W, C]` / `[N*H*W]` layout the sparse cross-entropy expects, and
/// compute pixel accuracy from the argmax predictions.
fn loss_and_accuracy<B: Backend>(
    loss_fn: &CrossEntropyLoss<B>,
    logits: Tensor<B, 4>,
    masks: Tensor<B, 4, Int>,
) -> anyhow::Result<(Tensor<B, 1>, f32)> {
    let [n, c, h, w] = logits.dims();
    let flat_logits = logits.permute([0, 2, 3, 1]).reshape([n * h * w, c]);
    let targets = masks.reshape([n * h * w]);

    let loss = loss_fn.forward(flat_logits.clone(), targets.clone());

    let preds = flat_logits.detach().argmax(1).reshape([n * h * w]);
    let accuracy = read_scalar(preds.equal(targets).int().float().mean(), "pixel accuracy")?;

    Ok((loss, accuracy))
}

/// Train the network over shuffled mini-batches for a fixed number of
/// epochs, mutating its parameters and returning the final model along
/// with the accumulated history.
pub fn train(
    mut model: Unet<ADBackend>,
    pairs: Vec<SamplePair>,
    data_cfg: DatasetConfig,
    cfg: &TrainConfig,
) -> anyhow::Result<(Unet<ADBackend>, TrainHistory)> {
    let (width, height) = data_cfg.target_size;
    check_spatial(height as usize, width as usize)?;

    let device = <ADBackend as Backend>::Device::default();
    let mut optim = AdamConfig::new().init();
    let loss_fn = CrossEntropyLossConfig::new().init(&device);
    let mut history = TrainHistory::default();

    for epoch in 0..cfg.epochs {
        // Vary the shuffle order per epoch while staying reproducible.
        let epoch_cfg = DatasetConfig {
            seed: cfg.seed.map(|s| s.wrapping_add(epoch as u64)),
            ..data_cfg.clone()
        };
        let mut iter = BatchIter::from_pairs(pairs.clone(), epoch_cfg)?;

        let mut losses = Vec::new();
        let mut accuracies = Vec::new();
        while let Some(batch) = iter.next_batch::<ADBackend>(cfg.batch_size, &device)? {
            let logits = model.forward(batch.images.clone());
            let (loss, accuracy) = loss_and_accuracy(&loss_fn, logits, batch.masks)?;

            let loss_scalar = read_scalar(loss.clone().detach(), "batch loss")?;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(cfg.lr, model, grads);

            losses.push(loss_scalar);
            accuracies.push(accuracy);
        }

        let avg = |values: &[f32]| {
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f32>() / values.len() as f32
            }
        };
        let stats = EpochStats {
            epoch,
            loss: avg(&losses),
            accuracy: avg(&accuracies),
        };
        println!(
            "epoch {}: avg loss {:.4}, pixel acc {:.4}",
            epoch + 1,
            stats.loss,
            stats.accuracy
        );
        if let Some(path) = &cfg.metrics_out {
            append_metrics(path, &stats)?;
        }
        history.epochs.push(stats);
    }

    Ok((model, history))
}

fn append_metrics(path: &Path, stats: &EpochStats) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", serde_json::to_string(stats)?)?;
    Ok(())
}

pub fn save_checkpoint<B: Backend>(model: &Unet<B>, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    model
        .clone()
        .save_file(path, &recorder)
        .map_err(|e| anyhow::anyhow!("failed to save checkpoint: {e}"))
}

pub fn load_unet_from_checkpoint<P: AsRef<Path>>(
    path: P,
    config: UnetConfig,
    device: &<TrainBackend as Backend>::Device,
) -> Result<Unet<TrainBackend>, RecorderError> {
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    Unet::<TrainBackend>::new(config, device).load_file(path.as_ref(), &recorder, device)
}
