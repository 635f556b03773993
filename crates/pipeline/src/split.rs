//! Seeded, class-stratified train/test split.

use log::info;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Row indices of each side of a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split row indices so both sides keep the class ratio of `labels`.
///
/// Each class is shuffled with a ChaCha8 stream seeded by `seed`, and
/// `round(class_size * test_ratio)` of it goes to the test side. The same
/// labels and seed always give the same split.
pub fn stratified_split(labels: &[u8], test_ratio: f64, seed: u64) -> Split {
    let ratio = test_ratio.clamp(0.0, 1.0);
    let mut class0 = Vec::new();
    let mut class1 = Vec::new();
    for (i, &label) in labels.iter().enumerate() {
        if label == 0 {
            class0.push(i);
        } else {
            class1.push(i);
        }
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    class0.shuffle(&mut rng);
    class1.shuffle(&mut rng);

    let test0 = (class0.len() as f64 * ratio).round() as usize;
    let test1 = (class1.len() as f64 * ratio).round() as usize;

    let mut test: Vec<usize> = class0[..test0].iter().chain(&class1[..test1]).copied().collect();
    let mut train: Vec<usize> = class0[test0..].iter().chain(&class1[test1..]).copied().collect();
    test.sort_unstable();
    train.sort_unstable();

    info!(
        "split: train={} ({}+{}) test={} ({}+{})",
        train.len(),
        class0.len() - test0,
        class1.len() - test1,
        test.len(),
        test0,
        test1
    );
    Split { train, test }
}
