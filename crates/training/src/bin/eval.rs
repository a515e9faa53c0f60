use clap::Parser;
use seg_dataset::{BatchIter, DatasetConfig};
use std::path::{Path, PathBuf};
use training::{
    check_spatial, load_unet_from_checkpoint, mask_indices, predict_mask, write_prediction_triple,
    TrainBackend, Unet, UnetConfig,
};

#[derive(Parser, Debug)]
#[command(
    name = "eval",
    about = "Evaluate a U-Net checkpoint on a dataset (per-pixel accuracy + prediction triples)"
)]
struct Args {
    /// Directory of RGB frames.
    #[arg(long, default_value = "data/CameraRGB")]
    image_dir: String,
    /// Directory of segmentation masks.
    #[arg(long, default_value = "data/CameraMask")]
    mask_dir: String,
    /// Checkpoint path to load.
    #[arg(long)]
    checkpoint: Option<String>,
    /// Base filter count (must match the trained checkpoint).
    #[arg(long, default_value_t = 32)]
    base_filters: usize,
    /// Number of segmentation classes (must match the trained checkpoint).
    #[arg(long, default_value_t = 23)]
    num_classes: usize,
    /// Target height (must be divisible by 16).
    #[arg(long, default_value_t = 96)]
    height: usize,
    /// Target width (must be divisible by 16).
    #[arg(long, default_value_t = 128)]
    width: usize,
    /// Batch size for evaluation.
    #[arg(long, default_value_t = 8)]
    batch_size: usize,
    /// Directory for input/truth/prediction strips.
    #[arg(long, default_value = "eval_out")]
    out_dir: PathBuf,
    /// How many prediction strips to write (0 disables).
    #[arg(long, default_value_t = 3)]
    num_triples: usize,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    check_spatial(args.height, args.width)?;

    let device = <TrainBackend as burn::tensor::backend::Backend>::Device::default();
    let config = UnetConfig {
        base_filters: args.base_filters,
        num_classes: args.num_classes,
        ..Default::default()
    };
    let model = match &args.checkpoint {
        Some(path) => load_unet_from_checkpoint(path, config, &device).unwrap_or_else(|e| {
            println!("Failed to load checkpoint {path}; using fresh model ({e})");
            Unet::<TrainBackend>::new(config, &device)
        }),
        None => {
            println!("No checkpoint provided; using fresh (untrained) model");
            Unet::<TrainBackend>::new(config, &device)
        }
    };

    let cfg = DatasetConfig {
        target_size: (args.width as u32, args.height as u32),
        shuffle: false,
        seed: None,
        drop_last: false,
    };
    let mut iter = BatchIter::from_dirs(Path::new(&args.image_dir), Path::new(&args.mask_dir), cfg)?;
    println!("evaluating {} image/mask pairs", iter.len());

    let plane = args.height * args.width;
    let mut correct = 0usize;
    let mut total = 0usize;
    let mut triples_written = 0usize;

    while let Some(batch) = iter.next_batch::<TrainBackend>(args.batch_size.max(1), &device)? {
        let batch_len = batch.images.dims()[0];
        let predicted = mask_indices(predict_mask(&model, batch.images.clone()));
        let truth = mask_indices(batch.masks);
        correct += predicted
            .iter()
            .zip(truth.iter())
            .filter(|(p, t)| p == t)
            .count();
        total += truth.len();

        if triples_written < args.num_triples {
            let images = batch
                .images
                .into_data()
                .to_vec::<f32>()
                .map_err(|e| anyhow::anyhow!("failed to read image batch: {e:?}"))?;
            for i in 0..batch_len {
                if triples_written >= args.num_triples {
                    break;
                }
                let out = args.out_dir.join(format!("triple_{triples_written:03}.png"));
                write_prediction_triple(
                    &images[i * 3 * plane..(i + 1) * 3 * plane],
                    &truth[i * plane..(i + 1) * plane],
                    &predicted[i * plane..(i + 1) * plane],
                    args.width as u32,
                    args.height as u32,
                    args.num_classes,
                    &out,
                )?;
                triples_written += 1;
            }
        }
    }

    let accuracy = if total > 0 {
        correct as f64 / total as f64
    } else {
        0.0
    };
    println!("pixel accuracy: {accuracy:.4} ({correct}/{total})");
    if triples_written > 0 {
        println!(
            "wrote {} prediction strips to {}",
            triples_written,
            args.out_dir.display()
        );
    }
    Ok(())
}
