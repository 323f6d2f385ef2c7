use std::path::Path;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::{Dataset, HuggingfaceDatasetLoader};
use burn::prelude::Backend;
use burn::tensor::{Device, Int, Tensor, TensorData};
use image::load_from_memory;
use log::{debug, info};
use rusqlite::Connection;

use cifarnet_core::error::{PipelineError, Result};

pub const WIDTH: usize = 32;
pub const HEIGHT: usize = 32;
pub const CHANNELS: usize = 3;
pub const NUM_CLASSES: usize = 10;
pub const IMAGE_BYTES: usize = WIDTH * HEIGHT * CHANNELS;

pub const DEFAULT_DATASET: &str = "uoft-cs/cifar10";

/// A simple enum to define test and train data types.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BatchType {
    Test,
    Train,
}

impl BatchType {
    fn table(&self) -> &'static str {
        match self {
            BatchType::Test => "test",
            BatchType::Train => "train",
        }
    }
}

/// One CIFAR-10 sample. Pixels are stored row-major as `[height, width, channel]` bytes.
#[derive(Clone, Debug)]
pub struct CifarItem {
    image: Vec<u8>,
    label: u8,
}

impl CifarItem {
    pub fn new(image: Vec<u8>, label: u8) -> Result<Self> {
        if image.len() != IMAGE_BYTES {
            return Err(PipelineError::shape_mismatch(
                "cifar item",
                &[HEIGHT, WIDTH, CHANNELS],
                &[image.len()],
            ));
        }
        Ok(Self { image, label })
    }

    pub fn label(&self) -> u8 {
        self.label
    }
}

#[derive(Clone, Default, Debug)]
pub struct CifarDataset {
    pub images: Vec<CifarItem>,
}

impl CifarDataset {
    /// Reads a split from the Hugging Face dataset cache, downloading it on first use.
    pub fn load(dataset_id: &str, batch_type: BatchType, limit: Option<usize>) -> Result<Self> {
        info!("Loading the {} split of {}", batch_type.table(), dataset_id);
        let sql_file = HuggingfaceDatasetLoader::new(dataset_id)
            .db_file()
            .map_err(|e| PipelineError::Dataset(e.to_string()))?;
        let images = Self::read_from_db(&sql_file, batch_type, limit)?;
        info!("Loaded {} {} samples", images.len(), batch_type.table());
        Ok(Self { images })
    }

    pub fn with_images(images: Vec<CifarItem>) -> Self {
        Self { images }
    }

    fn read_from_db(
        sql_file: &Path,
        batch_type: BatchType,
        limit: Option<usize>,
    ) -> Result<Vec<CifarItem>> {
        let connection = Connection::open(sql_file).map_err(sql_error)?;
        let mut query = format!(
            "SELECT img_bytes, label FROM {} ORDER BY row_id",
            batch_type.table()
        );
        if let Some(limit) = limit {
            query.push_str(&format!(" LIMIT {}", limit));
        }
        debug!("Reading samples with `{}`", query);

        let mut statement = connection.prepare(&query).map_err(sql_error)?;
        let rows = statement
            .query_map([], |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, i64>(1)?)))
            .map_err(sql_error)?;

        let mut cifar_items = Vec::new();
        for row in rows {
            let (encoded, label) = row.map_err(sql_error)?;
            let pixels = load_from_memory(&encoded)
                .map_err(|e| PipelineError::Dataset(e.to_string()))?
                .into_rgb8()
                .into_raw();
            let label = u8::try_from(label).map_err(|_| PipelineError::LabelOutOfRange {
                label,
                num_classes: NUM_CLASSES,
            })?;
            cifar_items.push(CifarItem::new(pixels, label)?);
        }
        Ok(cifar_items)
    }
}

fn sql_error(error: rusqlite::Error) -> PipelineError {
    PipelineError::Dataset(error.to_string())
}

impl Dataset<CifarItem> for CifarDataset {
    fn get(&self, index: usize) -> Option<CifarItem> {
        self.images.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.images.len()
    }
}

// Maps raw [0, 1] pixels to [-1, 1].
const MEAN: [f32; 3] = [0.5, 0.5, 0.5];
const STD: [f32; 3] = [0.5, 0.5, 0.5];

/// Per-channel normalizer applied to every batch.
#[derive(Clone, Debug)]
pub struct Normalizer<B: Backend> {
    pub mean: Tensor<B, 4>,
    pub std: Tensor<B, 4>,
}

impl<B: Backend> Normalizer<B> {
    pub fn new(device: &Device<B>) -> Self {
        let mean = Tensor::<B, 1>::from_floats(MEAN, device).reshape([1, 3, 1, 1]);
        let std = Tensor::<B, 1>::from_floats(STD, device).reshape([1, 3, 1, 1]);
        Self { mean, std }
    }

    /// The input image should be in the range [0, 1].
    /// `output = (input - mean) / std`
    pub fn normalize(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        (input - self.mean.clone()) / self.std.clone()
    }
}

#[derive(Debug, Clone)]
pub struct CifarBatch<B: Backend> {
    /// `[batch, channels, height, width]`
    pub images: Tensor<B, 4>,
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> CifarBatch<B> {
    pub fn len(&self) -> usize {
        self.targets.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone)]
pub struct CifarBatcher<B: Backend> {
    normalizer: Normalizer<B>,
    device: B::Device,
}

impl<B: Backend> CifarBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        let normalizer = Normalizer::new(&device);
        Self { device, normalizer }
    }
}

impl<B: Backend> Batcher<CifarItem, CifarBatch<B>> for CifarBatcher<B> {
    fn batch(&self, items: Vec<CifarItem>) -> CifarBatch<B> {
        let batch_size = items.len();
        let targets: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let pixels: Vec<u8> = items.into_iter().flat_map(|item| item.image).collect();

        let images = TensorData::new(pixels, [batch_size, HEIGHT, WIDTH, CHANNELS]);
        let images = Tensor::<B, 4>::from_data(images.convert::<B::FloatElem>(), &self.device)
            .permute([0, 3, 1, 2])
            .div_scalar(255.0);
        let images = self.normalizer.normalize(images);

        let targets = TensorData::new(targets, [batch_size]);
        let targets = Tensor::<B, 1, Int>::from_data(targets.convert::<B::IntElem>(), &self.device);

        CifarBatch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    use super::*;

    type TestBackend = NdArray<f32>;

    #[test]
    fn item_rejects_wrong_pixel_count() {
        let result = CifarItem::new(vec![0; 28 * 28], 1);
        assert!(matches!(
            result,
            Err(PipelineError::ShapeMismatch { stage: "cifar item", .. })
        ));
    }

    #[test]
    fn batcher_builds_channel_first_normalized_images() {
        let device = Default::default();
        let batcher = CifarBatcher::<TestBackend>::new(device);
        let black = CifarItem::new(vec![0; IMAGE_BYTES], 3).unwrap();
        let white = CifarItem::new(vec![255; IMAGE_BYTES], 7).unwrap();

        let batch = batcher.batch(vec![black, white]);
        assert_eq!(batch.images.dims(), [2, CHANNELS, HEIGHT, WIDTH]);
        assert_eq!(batch.len(), 2);

        let targets = batch.targets.into_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert_eq!(targets, vec![3, 7]);

        let pixels = batch.images.into_data().to_vec::<f32>().unwrap();
        let (first, second) = pixels.split_at(IMAGE_BYTES);
        assert!(first.iter().all(|p| (p + 1.0).abs() < 1e-6));
        assert!(second.iter().all(|p| (p - 1.0).abs() < 1e-6));
    }

    #[test]
    fn batcher_keeps_channels_apart() {
        let device = Default::default();
        let batcher = CifarBatcher::<TestBackend>::new(device);
        // Red only: every third byte is set.
        let pixels = (0..IMAGE_BYTES)
            .map(|i| if i % CHANNELS == 0 { 255 } else { 0 })
            .collect();
        let batch = batcher.batch(vec![CifarItem::new(pixels, 0).unwrap()]);

        let red = batch.images.clone().narrow(1, 0, 1).mean().into_scalar();
        let green = batch.images.narrow(1, 1, 1).mean().into_scalar();
        assert!((red - 1.0).abs() < 1e-6);
        assert!((green + 1.0).abs() < 1e-6);
    }
}
