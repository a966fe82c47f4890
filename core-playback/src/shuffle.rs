//! Shuffle order generation.
//!
//! Orders are built with an inside-out Fisher-Yates pass, optionally followed
//! by a swap that moves a pinned child to the front so the item currently
//! playing keeps playing when shuffle is switched on.

use bridge_traits::ShuffleOrder;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random permutation of `0..length`, with `pinned` (if present) first.
///
/// A `pinned` value outside `0..length` is ignored.
pub fn shuffled_indices<R: Rng + ?Sized>(
    rng: &mut R,
    length: usize,
    pinned: Option<usize>,
) -> Vec<usize> {
    let mut order = vec![0; length];
    for i in 0..length {
        let j = rng.gen_range(0..=i);
        order[i] = order[j];
        order[j] = i;
    }

    if let Some(pinned) = pinned {
        if let Some(pos) = order.iter().skip(1).position(|&index| index == pinned) {
            order.swap(0, pos + 1);
        }
    }

    order
}

/// Per-player source of shuffle orders.
#[derive(Debug)]
pub struct ShuffleGenerator {
    rng: StdRng,
}

impl ShuffleGenerator {
    /// Deterministic when `seed` is given, entropy-seeded otherwise.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    /// Order for a concatenation of `length` children.
    pub fn generate(&mut self, length: usize, pinned: Option<usize>) -> ShuffleOrder {
        let indices = shuffled_indices(&mut self.rng, length, pinned);
        let seed = self.rng.gen::<u64>();
        ShuffleOrder::new(indices, seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_permutation(order: &[usize]) -> bool {
        let mut sorted = order.to_vec();
        sorted.sort_unstable();
        sorted.iter().copied().eq(0..order.len())
    }

    #[test]
    fn test_pinned_child_comes_first() {
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let order = shuffled_indices(&mut rng, 5, Some(2));
            assert_eq!(order[0], 2, "seed {seed}");
            assert!(is_permutation(&order), "seed {seed}: {order:?}");
        }
    }

    #[test]
    fn test_unpinned_is_permutation() {
        for length in 0..12 {
            let mut rng = StdRng::seed_from_u64(length as u64);
            let order = shuffled_indices(&mut rng, length, None);
            assert_eq!(order.len(), length);
            assert!(is_permutation(&order));
        }
    }

    #[test]
    fn test_pin_out_of_range_is_ignored() {
        let mut rng = StdRng::seed_from_u64(3);
        let order = shuffled_indices(&mut rng, 4, Some(9));
        assert!(is_permutation(&order));
    }

    #[test]
    fn test_empty_and_single() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(shuffled_indices(&mut rng, 0, Some(0)).is_empty());
        assert_eq!(shuffled_indices(&mut rng, 1, Some(0)), vec![0]);
    }

    #[test]
    fn test_seeded_generator_is_reproducible() {
        let mut a = ShuffleGenerator::new(Some(42));
        let mut b = ShuffleGenerator::new(Some(42));
        for length in [3, 8, 20] {
            assert_eq!(a.generate(length, None), b.generate(length, None));
        }
    }

    #[test]
    fn test_orders_vary_across_draws() {
        let mut generator = ShuffleGenerator::new(Some(7));
        let orders: Vec<_> = (0..10).map(|_| generator.generate(8, None).indices).collect();
        assert!(orders.windows(2).any(|pair| pair[0] != pair[1]));
    }
}
