use clap::Parser;
use seg_dataset::{index_pairs, DatasetConfig};
use std::path::{Path, PathBuf};
use training::{check_spatial, save_checkpoint, train, ADBackend, TrainConfig, Unet, UnetConfig};

#[derive(Parser, Debug)]
#[command(name = "train", about = "Train the road-scene U-Net segmenter")]
struct Args {
    /// Directory of RGB frames.
    #[arg(long, default_value = "data/CameraRGB")]
    image_dir: String,
    /// Directory of segmentation masks (paired with frames by file stem).
    #[arg(long, default_value = "data/CameraMask")]
    mask_dir: String,
    /// Number of epochs.
    #[arg(long, default_value_t = 40)]
    epochs: usize,
    /// Batch size.
    #[arg(long, default_value_t = 32)]
    batch_size: usize,
    /// Learning rate.
    #[arg(long, default_value_t = 1e-3)]
    lr: f64,
    /// Seed for weight init and shuffling (omit for nondeterministic runs).
    #[arg(long)]
    seed: Option<u64>,
    /// Base filter count; encoder stages use 1x/2x/4x/8x, bottleneck 16x.
    #[arg(long, default_value_t = 32)]
    base_filters: usize,
    /// Number of segmentation classes.
    #[arg(long, default_value_t = 23)]
    num_classes: usize,
    /// Target height (must be divisible by 16).
    #[arg(long, default_value_t = 96)]
    height: usize,
    /// Target width (must be divisible by 16).
    #[arg(long, default_value_t = 128)]
    width: usize,
    /// Checkpoint output path.
    #[arg(long, default_value = "checkpoints/unet.bin")]
    ckpt_out: String,
    /// Optional metrics output path (JSONL); appends per-epoch loss/accuracy.
    #[arg(long)]
    metrics_out: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    check_spatial(args.height, args.width)?;

    if let Some(seed) = args.seed {
        <ADBackend as burn::tensor::backend::Backend>::seed(seed);
    }

    let pairs = index_pairs(Path::new(&args.image_dir), Path::new(&args.mask_dir))?;
    println!("indexed {} image/mask pairs", pairs.len());

    let device = <ADBackend as burn::tensor::backend::Backend>::Device::default();
    let model = Unet::<ADBackend>::new(
        UnetConfig {
            base_filters: args.base_filters,
            num_classes: args.num_classes,
            ..Default::default()
        },
        &device,
    );

    let data_cfg = DatasetConfig {
        target_size: (args.width as u32, args.height as u32),
        shuffle: true,
        seed: args.seed,
        drop_last: false,
    };
    let train_cfg = TrainConfig {
        epochs: args.epochs,
        batch_size: args.batch_size.max(1),
        lr: args.lr,
        seed: args.seed,
        metrics_out: args.metrics_out,
    };

    let (model, history) = train(model, pairs, data_cfg, &train_cfg)?;
    if let Some(last) = history.epochs.last() {
        println!(
            "final epoch: loss {:.4}, pixel acc {:.4}",
            last.loss, last.accuracy
        );
    }

    save_checkpoint(&model, Path::new(&args.ckpt_out))?;
    println!("Saved checkpoint to {}", args.ckpt_out);
    Ok(())
}
