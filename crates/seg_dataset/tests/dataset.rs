use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use seg_dataset::{
    collapse_to_classes, index_pairs, load_pair, BatchIter, DatasetConfig, SegDatasetError,
};
use std::fs;
use std::path::Path;

type NdArray = burn::backend::ndarray::NdArray<f32>;

/// Writes an RGB frame and a channel-replicated class mask sharing `stem`.
fn write_pair(root: &Path, stem: &str, size: (u32, u32), class: u8) {
    let image_dir = root.join("CameraRGB");
    let mask_dir = root.join("CameraMask");
    fs::create_dir_all(&image_dir).unwrap();
    fs::create_dir_all(&mask_dir).unwrap();

    let (w, h) = size;
    let mut img = RgbImage::new(w, h);
    for (x, y, p) in img.enumerate_pixels_mut() {
        *p = Rgb([(x * 17 % 256) as u8, (y * 31 % 256) as u8, class.wrapping_mul(10)]);
    }
    img.save(image_dir.join(format!("{stem}.png"))).unwrap();

    let mask = RgbImage::from_pixel(w, h, Rgb([class, class, class]));
    mask.save(mask_dir.join(format!("{stem}.png"))).unwrap();
}

#[test]
fn index_pairs_matches_by_stem() {
    let tmp = tempfile::tempdir().unwrap();
    write_pair(tmp.path(), "frame_b", (4, 4), 1);
    write_pair(tmp.path(), "frame_a", (4, 4), 2);
    fs::write(tmp.path().join("CameraRGB").join("notes.txt"), "ignored").unwrap();

    let pairs = index_pairs(
        &tmp.path().join("CameraRGB"),
        &tmp.path().join("CameraMask"),
    )
    .unwrap();
    assert_eq!(pairs.len(), 2);
    for pair in &pairs {
        assert_eq!(pair.image_path.file_stem(), pair.mask_path.file_stem());
    }
    // Sorted by image path regardless of directory listing order.
    assert!(pairs[0].image_path < pairs[1].image_path);
}

#[test]
fn index_pairs_fails_on_missing_mask() {
    let tmp = tempfile::tempdir().unwrap();
    write_pair(tmp.path(), "frame_a", (4, 4), 1);
    let orphan = RgbImage::new(4, 4);
    orphan
        .save(tmp.path().join("CameraRGB").join("frame_orphan.png"))
        .unwrap();

    let err = index_pairs(
        &tmp.path().join("CameraRGB"),
        &tmp.path().join("CameraMask"),
    )
    .unwrap_err();
    assert!(matches!(err, SegDatasetError::MissingMask { .. }));
}

#[test]
fn index_pairs_fails_on_empty_dirs() {
    let tmp = tempfile::tempdir().unwrap();
    let image_dir = tmp.path().join("CameraRGB");
    let mask_dir = tmp.path().join("CameraMask");
    fs::create_dir_all(&image_dir).unwrap();
    fs::create_dir_all(&mask_dir).unwrap();

    let err = index_pairs(&image_dir, &mask_dir).unwrap_err();
    assert!(matches!(err, SegDatasetError::EmptyDataset { .. }));
}

#[test]
fn collapse_takes_channel_max() {
    let mut img = RgbImage::new(2, 1);
    img.put_pixel(0, 0, Rgb([3, 7, 5]));
    img.put_pixel(1, 0, Rgb([0, 0, 12]));
    let gray = collapse_to_classes(&DynamicImage::ImageRgb8(img));
    assert_eq!(gray.get_pixel(0, 0)[0], 7);
    assert_eq!(gray.get_pixel(1, 0)[0], 12);
}

#[test]
fn collapse_is_idempotent_on_single_channel() {
    let mut gray = GrayImage::new(3, 2);
    for (i, p) in gray.pixels_mut().enumerate() {
        *p = Luma([i as u8 * 4]);
    }
    let collapsed = collapse_to_classes(&DynamicImage::ImageLuma8(gray.clone()));
    assert_eq!(collapsed.into_raw(), gray.into_raw());
}

#[test]
fn load_pair_resizes_and_normalizes() {
    let tmp = tempfile::tempdir().unwrap();
    write_pair(tmp.path(), "frame", (10, 6), 9);
    let pairs = index_pairs(
        &tmp.path().join("CameraRGB"),
        &tmp.path().join("CameraMask"),
    )
    .unwrap();

    let sample = load_pair(&pairs[0], (4, 2)).unwrap();
    assert_eq!((sample.width, sample.height), (4, 2));
    assert_eq!(sample.image_chw.len(), 3 * 4 * 2);
    assert!(sample.image_chw.iter().all(|v| (0.0..=1.0).contains(v)));
    // Nearest-neighbor resize never invents new class ids.
    assert!(sample.mask.iter().all(|&v| v == 9));
}

#[test]
fn batch_iter_assembles_expected_shapes() {
    let tmp = tempfile::tempdir().unwrap();
    write_pair(tmp.path(), "frame_a", (20, 14), 1);
    write_pair(tmp.path(), "frame_b", (20, 14), 2);

    let cfg = DatasetConfig {
        target_size: (16, 16),
        shuffle: false,
        seed: None,
        drop_last: false,
    };
    let mut iter = BatchIter::from_dirs(
        &tmp.path().join("CameraRGB"),
        &tmp.path().join("CameraMask"),
        cfg,
    )
    .unwrap();
    assert_eq!(iter.len(), 2);

    let device = Default::default();
    let batch = iter.next_batch::<NdArray>(2, &device).unwrap().unwrap();
    assert_eq!(batch.images.dims(), [2, 3, 16, 16]);
    assert_eq!(batch.masks.dims(), [2, 1, 16, 16]);

    let mask_vals: Vec<f32> = batch.masks.float().into_data().to_vec().unwrap();
    let plane = 16 * 16;
    assert!(mask_vals[..plane].iter().all(|&v| v == 1.0));
    assert!(mask_vals[plane..].iter().all(|&v| v == 2.0));

    assert!(iter.next_batch::<NdArray>(2, &device).unwrap().is_none());
}

#[test]
fn seeded_shuffle_is_reproducible() {
    let tmp = tempfile::tempdir().unwrap();
    for (i, stem) in ["a", "b", "c", "d"].iter().enumerate() {
        write_pair(tmp.path(), stem, (8, 8), i as u8);
    }
    let pairs = index_pairs(
        &tmp.path().join("CameraRGB"),
        &tmp.path().join("CameraMask"),
    )
    .unwrap();

    let cfg = DatasetConfig {
        target_size: (8, 8),
        shuffle: true,
        seed: Some(7),
        drop_last: false,
    };
    let device = Default::default();
    let mut first = BatchIter::from_pairs(pairs.clone(), cfg.clone()).unwrap();
    let mut second = BatchIter::from_pairs(pairs, cfg).unwrap();
    let a = first.next_batch::<NdArray>(4, &device).unwrap().unwrap();
    let b = second.next_batch::<NdArray>(4, &device).unwrap().unwrap();
    assert_eq!(
        a.masks.float().into_data().to_vec::<f32>().unwrap(),
        b.masks.float().into_data().to_vec::<f32>().unwrap()
    );
}

#[test]
fn drop_last_skips_partial_batches() {
    let tmp = tempfile::tempdir().unwrap();
    for stem in ["a", "b", "c"] {
        write_pair(tmp.path(), stem, (8, 8), 1);
    }
    let cfg = DatasetConfig {
        target_size: (8, 8),
        shuffle: false,
        seed: None,
        drop_last: true,
    };
    let mut iter = BatchIter::from_dirs(
        &tmp.path().join("CameraRGB"),
        &tmp.path().join("CameraMask"),
        cfg,
    )
    .unwrap();

    let device = Default::default();
    let full = iter.next_batch::<NdArray>(2, &device).unwrap().unwrap();
    assert_eq!(full.images.dims()[0], 2);
    assert!(iter.next_batch::<NdArray>(2, &device).unwrap().is_none());
}
