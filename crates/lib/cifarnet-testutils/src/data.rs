use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use cifarnet_models::data::cifar::{CifarDataset, CifarItem, IMAGE_BYTES};

/// Builds `size` images whose labels cycle through `classes`. Each class gets its own base
/// brightness per channel with a little noise on top, so the classes are easy to tell apart.
pub fn synthetic_dataset(size: usize, classes: &[u8], seed: u64) -> CifarDataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let images = (0..size)
        .map(|index| {
            let label = classes[index % classes.len()];
            synthetic_item(label, &mut rng)
        })
        .collect();
    CifarDataset::with_images(images)
}

/// A single image for `label`. Labels outside the CIFAR range are allowed on purpose.
pub fn synthetic_item(label: u8, rng: &mut StdRng) -> CifarItem {
    let base = class_color(label);
    let pixels = (0..IMAGE_BYTES)
        .map(|i| {
            let noise: i16 = rng.gen_range(-12..=12);
            (base[i % 3] as i16 + noise).clamp(0, 255) as u8
        })
        .collect();
    CifarItem::new(pixels, label).expect("synthetic image has the cifar size")
}

fn class_color(label: u8) -> [u8; 3] {
    match label % 4 {
        0 => [220, 40, 40],
        1 => [40, 40, 220],
        2 => [40, 220, 40],
        _ => [128, 128, 128],
    }
}
