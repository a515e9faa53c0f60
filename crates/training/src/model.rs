//! Encoder-decoder network for per-pixel classification.
//!
//! Shapes:
//! - Input images: `[N, 3, H, W]`, values in [0, 1]
//! - Output logits: `[N, num_classes, H, W]` (no activation on the head)
//!
//! H and W must be divisible by [`POOL_FACTOR`] so each decoder stage can
//! concatenate with the matching encoder skip map.

use burn::module::{Ignored, Module};
use burn::nn::conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{Dropout, DropoutConfig, Initializer, PaddingConfig2d};
use burn::tensor::{activation::relu, backend::Backend, Tensor};

/// Cumulative pooling factor of the four encoder stages (2^4).
pub const POOL_FACTOR: usize = 16;

/// Configuration for the segmentation network.
#[derive(Debug, Clone, Copy)]
pub struct UnetConfig {
    pub in_channels: usize,
    pub base_filters: usize,
    pub num_classes: usize,
    /// Dropout probability on the deepest encoder stage and the bottleneck.
    pub dropout: f64,
}

impl Default for UnetConfig {
    fn default() -> Self {
        Self {
            in_channels: 3,
            base_filters: 32,
            num_classes: 23,
            dropout: 0.3,
        }
    }
}

/// Reject resolutions the encoder/decoder cannot round-trip exactly.
pub fn check_spatial(height: usize, width: usize) -> anyhow::Result<()> {
    if height % POOL_FACTOR != 0 || width % POOL_FACTOR != 0 {
        anyhow::bail!(
            "input resolution {height}x{width} must be divisible by {POOL_FACTOR} \
             for encoder and decoder skip maps to align"
        );
    }
    Ok(())
}

fn conv3x3<B: Backend>(channels: [usize; 2], device: &B::Device) -> Conv2d<B> {
    Conv2dConfig::new(channels, [3, 3])
        .with_padding(PaddingConfig2d::Same)
        .with_initializer(Initializer::KaimingNormal {
            gain: std::f64::consts::SQRT_2,
            fan_out_only: false,
        })
        .init(device)
}

/// Downsampling block: two 3x3 convolutions, optional dropout, optional
/// 2x2 max-pooling.
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    dropout: Option<Dropout>,
    pool: Option<MaxPool2d>,
}

impl<B: Backend> ConvBlock<B> {
    pub fn new(
        in_channels: usize,
        filters: usize,
        dropout: f64,
        pooling: bool,
        device: &B::Device,
    ) -> Self {
        Self {
            conv1: conv3x3([in_channels, filters], device),
            conv2: conv3x3([filters, filters], device),
            dropout: (dropout > 0.0).then(|| DropoutConfig::new(dropout).init()),
            pool: pooling.then(|| MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init()),
        }
    }

    /// Returns `(next, skip)`: the pooled volume for the next stage and
    /// the pre-pooling map retained for the mirror decoder stage. Without
    /// pooling both are the same map.
    pub fn forward(&self, input: Tensor<B, 4>) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let x = relu(self.conv1.forward(input));
        let x = relu(self.conv2.forward(x));
        let skip = match &self.dropout {
            Some(dropout) => dropout.forward(x),
            None => x,
        };
        let next = match &self.pool {
            Some(pool) => pool.forward(skip.clone()),
            None => skip.clone(),
        };
        (next, skip)
    }
}

/// Upsampling block: transposed convolution doubling H and W, channel
/// concat with the encoder skip map, then two 3x3 convolutions.
///
/// The skip map is expected to carry `filters` channels, which holds for
/// every stage of the mirrored topology built by [`Unet::new`].
#[derive(Module, Debug)]
pub struct UpBlock<B: Backend> {
    up: ConvTranspose2d<B>,
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
}

impl<B: Backend> UpBlock<B> {
    pub fn new(in_channels: usize, filters: usize, device: &B::Device) -> Self {
        // stride 2, padding 1, output padding 1: out = 2 * in exactly.
        let up = ConvTranspose2dConfig::new([in_channels, filters], [3, 3])
            .with_stride([2, 2])
            .with_padding([1, 1])
            .with_padding_out([1, 1])
            .init(device);
        Self {
            up,
            conv1: conv3x3([filters * 2, filters], device),
            conv2: conv3x3([filters, filters], device),
        }
    }

    pub fn forward(&self, expansive: Tensor<B, 4>, contractive: Tensor<B, 4>) -> Tensor<B, 4> {
        let up = self.up.forward(expansive);
        // Concat panics on spatial mismatch; check_spatial upstream makes
        // that unreachable for valid inputs.
        let merged = Tensor::cat(vec![up, contractive], 1);
        let x = relu(self.conv1.forward(merged));
        relu(self.conv2.forward(x))
    }
}

#[derive(Module, Debug)]
pub struct Unet<B: Backend> {
    down1: ConvBlock<B>,
    down2: ConvBlock<B>,
    down3: ConvBlock<B>,
    down4: ConvBlock<B>,
    bottleneck: ConvBlock<B>,
    up1: UpBlock<B>,
    up2: UpBlock<B>,
    up3: UpBlock<B>,
    up4: UpBlock<B>,
    head: Conv2d<B>,
    project: Conv2d<B>,
    pub config: Ignored<UnetConfig>,
}

impl<B: Backend> Unet<B> {
    pub fn new(config: UnetConfig, device: &B::Device) -> Self {
        let f = config.base_filters;
        Self {
            down1: ConvBlock::new(config.in_channels, f, 0.0, true, device),
            down2: ConvBlock::new(f, f * 2, 0.0, true, device),
            down3: ConvBlock::new(f * 2, f * 4, 0.0, true, device),
            down4: ConvBlock::new(f * 4, f * 8, config.dropout, true, device),
            bottleneck: ConvBlock::new(f * 8, f * 16, config.dropout, false, device),
            up1: UpBlock::new(f * 16, f * 8, device),
            up2: UpBlock::new(f * 8, f * 4, device),
            up3: UpBlock::new(f * 4, f * 2, device),
            up4: UpBlock::new(f * 2, f, device),
            head: conv3x3([f, f], device),
            project: Conv2dConfig::new([f, config.num_classes], [1, 1])
                .with_padding(PaddingConfig2d::Same)
                .init(device),
            config: Ignored(config),
        }
    }

    /// Forward pass producing raw per-pixel class logits.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let (x1, skip1) = self.down1.forward(input);
        let (x2, skip2) = self.down2.forward(x1);
        let (x3, skip3) = self.down3.forward(x2);
        let (x4, skip4) = self.down4.forward(x3);
        let (bottom, _) = self.bottleneck.forward(x4);

        let x = self.up1.forward(bottom, skip4);
        let x = self.up2.forward(x, skip3);
        let x = self.up3.forward(x, skip2);
        let x = self.up4.forward(x, skip1);

        let x = relu(self.head.forward(x));
        self.project.forward(x)
    }
}
