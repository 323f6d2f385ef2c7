use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use cifarnet_core::error::{PipelineError, Result};

/// Order in which a provider walks its dataset on every pass.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BatchOrder {
    /// A fresh permutation per pass, drawn from a generator seeded once at construction.
    Shuffled { seed: u64 },
    /// Dataset order, identical on every pass.
    Sequential,
}

/// Turns a dataset into fixed-size batches. Every call to [`BatchProvider::iter`] starts a new
/// pass that covers each sample exactly once; only the last batch of a pass may be smaller.
pub struct BatchProvider<I, O> {
    dataset: Box<dyn Dataset<I>>,
    batcher: Box<dyn Batcher<I, O>>,
    batch_size: usize,
    rng: Option<StdRng>,
    passes: usize,
}

impl<I, O> BatchProvider<I, O> {
    pub fn new<D, T>(dataset: D, batcher: T, batch_size: usize, order: BatchOrder) -> Result<Self>
    where
        D: Dataset<I> + 'static,
        T: Batcher<I, O> + 'static,
    {
        if batch_size == 0 {
            return Err(PipelineError::Config("batch size must be positive".to_string()));
        }
        let rng = match order {
            BatchOrder::Shuffled { seed } => Some(StdRng::seed_from_u64(seed)),
            BatchOrder::Sequential => None,
        };
        Ok(Self {
            dataset: Box::new(dataset),
            batcher: Box::new(batcher),
            batch_size,
            rng,
            passes: 0,
        })
    }

    pub fn num_items(&self) -> usize {
        self.dataset.len()
    }

    pub fn num_batches(&self) -> usize {
        self.num_items().div_ceil(self.batch_size)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of passes started so far.
    pub fn passes(&self) -> usize {
        self.passes
    }

    pub fn is_shuffled(&self) -> bool {
        self.rng.is_some()
    }

    pub fn iter(&mut self) -> BatchIter<'_, I, O> {
        let mut indices: Vec<usize> = (0..self.dataset.len()).collect();
        if let Some(rng) = self.rng.as_mut() {
            indices.shuffle(rng);
        }
        self.passes += 1;
        BatchIter {
            dataset: self.dataset.as_ref(),
            batcher: self.batcher.as_ref(),
            batch_size: self.batch_size,
            indices,
            cursor: 0,
        }
    }
}

/// One pass over the provider's dataset.
pub struct BatchIter<'a, I, O> {
    dataset: &'a dyn Dataset<I>,
    batcher: &'a dyn Batcher<I, O>,
    batch_size: usize,
    indices: Vec<usize>,
    cursor: usize,
}

impl<I, O> Iterator for BatchIter<'_, I, O> {
    type Item = Result<O>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.indices.len() {
            return None;
        }
        let end = usize::min(self.cursor + self.batch_size, self.indices.len());
        let chunk = &self.indices[self.cursor..end];
        self.cursor = end;

        let mut items = Vec::with_capacity(chunk.len());
        for &index in chunk {
            match self.dataset.get(index) {
                Some(item) => items.push(item),
                None => {
                    return Some(Err(PipelineError::Dataset(format!(
                        "no sample at index {} of {}",
                        index,
                        self.dataset.len()
                    ))));
                }
            }
        }
        Some(Ok(self.batcher.batch(items)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.indices.len() - self.cursor).div_ceil(self.batch_size);
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use burn::data::dataset::InMemDataset;

    use super::*;

    #[derive(Clone)]
    struct Collect;

    impl Batcher<usize, Vec<usize>> for Collect {
        fn batch(&self, items: Vec<usize>) -> Vec<usize> {
            items
        }
    }

    fn provider(
        size: usize,
        batch_size: usize,
        order: BatchOrder,
    ) -> BatchProvider<usize, Vec<usize>> {
        let dataset = InMemDataset::new((0..size).collect());
        BatchProvider::new(dataset, Collect, batch_size, order).unwrap()
    }

    #[test]
    fn last_batch_holds_the_remainder() {
        let mut provider = provider(10, 4, BatchOrder::Sequential);
        let sizes: Vec<usize> = provider.iter().map(|batch| batch.unwrap().len()).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(provider.num_batches(), 3);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let dataset = InMemDataset::new(vec![1usize, 2, 3]);
        let result = BatchProvider::new(dataset, Collect, 0, BatchOrder::Sequential);
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn shuffled_passes_differ() {
        let mut provider = provider(64, 64, BatchOrder::Shuffled { seed: 7 });
        let first: Vec<usize> = provider.iter().flat_map(|b| b.unwrap()).collect();
        let second: Vec<usize> = provider.iter().flat_map(|b| b.unwrap()).collect();
        assert_ne!(first, second);
        assert_eq!(provider.passes(), 2);
    }

    #[test]
    fn size_hint_counts_remaining_batches() {
        let mut provider = provider(9, 4, BatchOrder::Sequential);
        let mut iter = provider.iter();
        assert_eq!(iter.size_hint(), (3, Some(3)));
        iter.next();
        assert_eq!(iter.size_hint(), (2, Some(2)));
    }

    #[test]
    fn empty_dataset_yields_nothing() {
        let mut provider = provider(0, 4, BatchOrder::Sequential);
        assert_eq!(provider.iter().count(), 0);
    }
}
