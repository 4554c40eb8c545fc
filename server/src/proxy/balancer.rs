use rand::Rng;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BalanceError {
    #[error("empty candidate pool")]
    EmptyPool,
}

/// Weighted candidate set for one request's dispatch loop. The table is
/// owned by that loop and mutated between picks: hard failures remove a
/// key, rate limits shave its weight.
#[derive(Debug, Clone, Default)]
pub struct WeightTable {
    weights: HashMap<i64, i64>,
}

impl WeightTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Weights below 1 are clamped so every inserted key stays pickable.
    pub fn insert(&mut self, key: i64, weight: i64) {
        self.weights.insert(key, weight.max(1));
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn weight_of(&self, key: i64) -> Option<i64> {
        self.weights.get(&key).copied()
    }

    /// Draws one key with probability weight/total. Entries are snapshotted
    /// before the draw so the scan sees a consistent ordering.
    pub fn pick(&self) -> Result<i64, BalanceError> {
        let entries: Vec<(i64, i64)> = self.weights.iter().map(|(k, w)| (*k, *w)).collect();
        if entries.is_empty() {
            return Err(BalanceError::EmptyPool);
        }
        let total: i64 = entries.iter().map(|(_, w)| w).sum();
        let draw = rand::rng().random_range(0..total);
        let mut acc = 0;
        for (key, weight) in &entries {
            acc += weight;
            if draw < acc {
                return Ok(*key);
            }
        }
        // draw < total == final acc, so the loop always returns.
        Err(BalanceError::EmptyPool)
    }

    /// Rate-limit response: shave a third off the weight, never below 1.
    /// The key stays selectable; only hard failures remove it.
    pub fn penalize(&mut self, key: i64) {
        if let Some(w) = self.weights.get_mut(&key) {
            *w = (*w - *w / 3).max(1);
        }
    }

    pub fn remove(&mut self, key: i64) {
        self.weights.remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pick_from_empty_table_fails() {
        let table = WeightTable::new();
        assert_eq!(table.pick(), Err(BalanceError::EmptyPool));
    }

    #[test]
    fn single_key_always_wins() {
        let mut table = WeightTable::new();
        table.insert(42, 5);
        for _ in 0..100 {
            assert_eq!(table.pick(), Ok(42));
        }
    }

    #[test]
    fn insert_clamps_weight_to_one() {
        let mut table = WeightTable::new();
        table.insert(1, 0);
        table.insert(2, -3);
        assert_eq!(table.weight_of(1), Some(1));
        assert_eq!(table.weight_of(2), Some(1));
    }

    #[test]
    fn penalize_shaves_a_third() {
        let mut table = WeightTable::new();
        table.insert(1, 6);
        table.penalize(1);
        assert_eq!(table.weight_of(1), Some(4));
        table.penalize(1);
        assert_eq!(table.weight_of(1), Some(3));
    }

    #[test]
    fn penalize_never_drops_below_one() {
        let mut table = WeightTable::new();
        table.insert(1, 1);
        for _ in 0..10 {
            table.penalize(1);
        }
        assert_eq!(table.weight_of(1), Some(1));
        assert_eq!(table.pick(), Ok(1));
    }

    #[test]
    fn removed_key_is_never_picked() {
        let mut table = WeightTable::new();
        table.insert(1, 1);
        table.insert(2, 1);
        table.remove(1);
        for _ in 0..100 {
            assert_eq!(table.pick(), Ok(2));
        }
        table.remove(2);
        assert_eq!(table.pick(), Err(BalanceError::EmptyPool));
    }

    #[test]
    fn pick_frequency_tracks_weights() {
        let mut table = WeightTable::new();
        table.insert(1, 1);
        table.insert(2, 3);

        let n = 20_000;
        let mut hits = 0usize;
        for _ in 0..n {
            if table.pick().unwrap() == 2 {
                hits += 1;
            }
        }
        // Expected 0.75; three-sigma for n=20k is well under 0.01.
        let freq = hits as f64 / n as f64;
        assert!((freq - 0.75).abs() < 0.03, "observed frequency {}", freq);
    }
}
