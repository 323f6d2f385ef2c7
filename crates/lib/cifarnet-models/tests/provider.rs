use std::collections::HashMap;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::InMemDataset;

use cifarnet_models::data::cifar::CifarBatcher;
use cifarnet_models::data::provider::{BatchOrder, BatchProvider};
use cifarnet_testutils::data::synthetic_dataset;
use cifarnet_testutils::{test_device, TestBackend};

#[derive(Clone)]
struct SampleIds;

impl Batcher<usize, Vec<usize>> for SampleIds {
    fn batch(&self, items: Vec<usize>) -> Vec<usize> {
        items
    }
}

fn id_provider(size: usize, order: BatchOrder) -> BatchProvider<usize, Vec<usize>> {
    let dataset = InMemDataset::new((0..size).collect());
    BatchProvider::new(dataset, SampleIds, 128, order).unwrap()
}

#[test]
fn shuffled_pass_emits_every_sample_once() {
    let mut provider = id_provider(1000, BatchOrder::Shuffled { seed: 42 });
    for _ in 0..3 {
        let batches: Vec<Vec<usize>> = provider.iter().map(|batch| batch.unwrap()).collect();
        assert_eq!(batches.len(), 8);
        assert!(batches[..7].iter().all(|batch| batch.len() == 128));
        assert_eq!(batches[7].len(), 1000 - 7 * 128);

        let mut seen: Vec<usize> = batches.into_iter().flatten().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..1000).collect::<Vec<usize>>());
    }
}

#[test]
fn shuffled_order_is_reproducible_from_the_seed() {
    let mut first = id_provider(300, BatchOrder::Shuffled { seed: 9 });
    let mut second = id_provider(300, BatchOrder::Shuffled { seed: 9 });
    for _ in 0..2 {
        let a: Vec<usize> = first.iter().flat_map(|batch| batch.unwrap()).collect();
        let b: Vec<usize> = second.iter().flat_map(|batch| batch.unwrap()).collect();
        assert_eq!(a, b);
    }
}

#[test]
fn sequential_passes_repeat_exactly() {
    let mut provider = id_provider(300, BatchOrder::Sequential);
    let first: Vec<Vec<usize>> = provider.iter().map(|batch| batch.unwrap()).collect();
    let second: Vec<Vec<usize>> = provider.iter().map(|batch| batch.unwrap()).collect();
    assert_eq!(first, second);
    assert_eq!(
        first.into_iter().flatten().collect::<Vec<usize>>(),
        (0..300).collect::<Vec<usize>>()
    );
}

#[test]
fn shuffled_cifar_pass_keeps_the_label_histogram() {
    let dataset = synthetic_dataset(100, &[0, 1, 2, 3, 4], 5);
    let mut expected = HashMap::new();
    for item in &dataset.images {
        *expected.entry(item.label() as i64).or_insert(0) += 1;
    }

    let batcher = CifarBatcher::<TestBackend>::new(test_device());
    let mut provider =
        BatchProvider::new(dataset, batcher, 32, BatchOrder::Shuffled { seed: 1 }).unwrap();

    let mut found = HashMap::new();
    for batch in provider.iter() {
        let targets = batch.unwrap().targets.into_data().convert::<i64>();
        for label in targets.to_vec::<i64>().unwrap() {
            *found.entry(label).or_insert(0) += 1;
        }
    }
    assert_eq!(found, expected);
}
