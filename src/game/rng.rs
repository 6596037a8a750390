//! Counted deterministic random generator owned by the match
//!
//! Every draw is counted, and the generator serializes as its seed plus
//! stream position, so a snapshot restores the exact same future sequence
//! and two peers can compare generator state as part of the checksum.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use serde::{Deserialize, Serialize};

/// Serialized form of [`MatchRng`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngPosition {
    pub seed: u64,
    pub draws: u64,
    pub word_pos: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "RngPosition", into = "RngPosition")]
pub struct MatchRng {
    seed: u64,
    draws: u64,
    inner: ChaCha12Rng,
}

impl MatchRng {
    pub fn new(seed: u64) -> Self {
        MatchRng {
            seed,
            draws: 0,
            inner: ChaCha12Rng::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of random operations performed so far
    pub fn draws(&self) -> u64 {
        self.draws
    }

    pub fn word_pos(&self) -> u64 {
        self.inner.get_word_pos() as u64
    }

    pub fn position(&self) -> RngPosition {
        RngPosition {
            seed: self.seed,
            draws: self.draws,
            word_pos: self.word_pos(),
        }
    }

    /// Jump to a position recorded by another instance with the same seed
    pub fn restore(&mut self, draws: u64, word_pos: u64) {
        self.draws = draws;
        self.inner.set_word_pos(word_pos as u128);
    }

    /// Uniform index in `0..n`; `n` must be non-zero
    pub fn below(&mut self, n: usize) -> usize {
        self.draws += 1;
        self.inner.gen_range(0..n)
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        self.draws += 1;
        items.shuffle(&mut self.inner);
    }

    /// `k` distinct indices out of `0..n`, in draw order
    pub fn sample(&mut self, n: usize, k: usize) -> Vec<usize> {
        self.draws += 1;
        rand::seq::index::sample(&mut self.inner, n, k.min(n)).into_vec()
    }
}

impl From<RngPosition> for MatchRng {
    fn from(pos: RngPosition) -> Self {
        let mut rng = MatchRng::new(pos.seed);
        rng.restore(pos.draws, pos.word_pos);
        rng
    }
}

impl From<MatchRng> for RngPosition {
    fn from(rng: MatchRng) -> Self {
        rng.position()
    }
}

impl PartialEq for MatchRng {
    fn eq(&self, other: &Self) -> bool {
        self.position() == other.position()
    }
}

impl Eq for MatchRng {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = MatchRng::new(7);
        let mut b = MatchRng::new(7);
        let xs: Vec<usize> = (0..20).map(|_| a.below(100)).collect();
        let ys: Vec<usize> = (0..20).map(|_| b.below(100)).collect();
        assert_eq!(xs, ys);
        assert_eq!(a.draws(), 20);
    }

    #[test]
    fn test_serde_resumes_stream() {
        let mut rng = MatchRng::new(42);
        let mut deck: Vec<u32> = (0..40).collect();
        rng.shuffle(&mut deck);
        rng.below(6);

        let json = serde_json::to_string(&rng).unwrap();
        let mut restored: MatchRng = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, rng);

        let expected: Vec<usize> = (0..10).map(|_| rng.below(1000)).collect();
        let actual: Vec<usize> = (0..10).map(|_| restored.below(1000)).collect();
        assert_eq!(expected, actual);
    }

    #[test]
    fn test_restore_matches_position() {
        let mut host = MatchRng::new(3);
        host.sample(10, 3);
        let pos = host.position();

        let mut peer = MatchRng::new(3);
        peer.restore(pos.draws, pos.word_pos);
        assert_eq!(peer, host);
        assert_eq!(peer.below(50), host.below(50));
    }

    #[test]
    fn test_sample_is_distinct() {
        let mut rng = MatchRng::new(9);
        let mut picks = rng.sample(5, 10);
        assert_eq!(picks.len(), 5);
        picks.sort();
        picks.dedup();
        assert_eq!(picks.len(), 5);
    }
}
