//! Host-Side Histogram Engine
//!
//! Counting sort over a bounded key domain needs no comparisons: it counts
//! how often each key occurs, prefix-sums the counts into position
//! boundaries, and rewrites the output directly from those boundaries.
//!
//! The count table is a flat, fixed-length array indexed by key value (no
//! hashing, no resizing). Its size is `KEY_SPACE` regardless of how many
//! elements are being sorted, so counting a slice takes O(slice length) time
//! and O(KEY_SPACE) space.

/// Number of distinct key values. Keys are `u16`, so the domain is fixed at
/// compile time and independent of the data.
pub const KEY_SPACE: usize = 1 << 16;

/// Occurrence counts for every key in the domain.
///
/// Used both for a single worker's local counts and for the merged global
/// counts after reduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    counts: Box<[u64]>,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    /// Create an empty histogram covering the full key domain.
    pub fn new() -> Self {
        Self {
            counts: vec![0u64; KEY_SPACE].into_boxed_slice(),
        }
    }

    /// Count key occurrences in `keys[start..end)` into this histogram.
    ///
    /// This is the host-side counting pass; each worker applies it to the
    /// host slice of its portion.
    ///
    /// Panics if the range is out of bounds for `keys`.
    pub fn count_range(&mut self, keys: &[u16], start: usize, end: usize) {
        for &key in &keys[start..end] {
            self.counts[key as usize] += 1;
        }
    }

    /// Record `occurrences` additional observations of `key`.
    pub fn add(&mut self, key: u16, occurrences: u64) {
        self.counts[key as usize] += occurrences;
    }

    /// Occurrence count recorded for `key`.
    pub fn count_of(&self, key: u16) -> u64 {
        self.counts[key as usize]
    }

    /// Elementwise-add another histogram into this one.
    ///
    /// Bucket addition is commutative and associative, so device/host
    /// partials and per-worker histograms can be merged in any order.
    pub fn merge(&mut self, other: &Histogram) {
        for (bucket, &count) in self.counts.iter_mut().zip(other.counts.iter()) {
            *bucket += count;
        }
    }

    /// Total number of observations across all buckets.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Convert counts into cumulative position boundaries with an in-place
    /// inclusive prefix sum.
    ///
    /// The sum is strictly sequential in key order; each boundary depends on
    /// the previous one.
    pub fn into_boundaries(mut self) -> Boundaries {
        let mut running = 0u64;
        for count in self.counts.iter_mut() {
            running += *count;
            *count = running;
        }

        Boundaries { ends: self.counts }
    }
}

/// Cumulative position boundaries: `end_of(k)` is the number of elements with
/// key <= k, i.e. the exclusive end index of key `k`'s range in sorted order.
///
/// Only constructed via [`Histogram::into_boundaries`], so the sequence is
/// non-decreasing and the final entry equals the total element count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundaries {
    ends: Box<[u64]>,
}

impl Boundaries {
    /// Exclusive end index of `key`'s range in the sorted sequence.
    pub fn end_of(&self, key: u16) -> u64 {
        self.ends[key as usize]
    }

    /// Total number of elements covered, i.e. the final boundary.
    pub fn total(&self) -> u64 {
        self.ends[KEY_SPACE - 1]
    }

    /// Rewrite `out` as the sorted sequence described by these boundaries.
    ///
    /// For each key `k`, fills `out[end_of(k - 1)..end_of(k))` with `k`.
    /// A key with zero occurrences yields an empty range and no writes.
    /// This is a pure function of the boundaries: re-running it always
    /// produces the identical sequence.
    pub fn reconstruct(&self, out: &mut [u16]) -> Result<(), String> {
        if self.total() != out.len() as u64 {
            return Err(format!(
                "cannot reconstruct {} elements from boundaries covering {}",
                out.len(),
                self.total()
            ));
        }

        let mut range_start = 0usize;
        for key in 0..KEY_SPACE {
            let range_end = self.ends[key] as usize;
            out[range_start..range_end].fill(key as u16);
            range_start = range_end;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_count_range_full_slice() {
        let keys = [3u16, 1, 3, 65535, 0, 3];
        let mut histogram = Histogram::new();
        histogram.count_range(&keys, 0, keys.len());

        assert_eq!(histogram.count_of(0), 1);
        assert_eq!(histogram.count_of(1), 1);
        assert_eq!(histogram.count_of(3), 3);
        assert_eq!(histogram.count_of(65535), 1);
        assert_eq!(histogram.count_of(2), 0);
    }

    #[test]
    fn test_count_range_suffix_only() {
        // Host slice is the suffix after the device cut.
        let keys = [7u16, 7, 7, 5, 5];
        let mut histogram = Histogram::new();
        histogram.count_range(&keys, 3, keys.len());

        assert_eq!(histogram.count_of(7), 0);
        assert_eq!(histogram.count_of(5), 2);
        assert_eq!(histogram.total(), 2);
    }

    #[test]
    fn test_count_range_empty_range() {
        let keys = [1u16, 2, 3];
        let mut histogram = Histogram::new();
        histogram.count_range(&keys, 2, 2);
        assert_eq!(histogram.total(), 0);
    }

    #[test]
    fn test_merge_is_elementwise_sum() {
        let mut a = Histogram::new();
        a.add(10, 2);
        a.add(20, 1);

        let mut b = Histogram::new();
        b.add(10, 3);
        b.add(30, 4);

        a.merge(&b);
        assert_eq!(a.count_of(10), 5);
        assert_eq!(a.count_of(20), 1);
        assert_eq!(a.count_of(30), 4);
        assert_eq!(a.total(), 10);
    }

    #[test]
    fn test_merge_order_irrelevant() {
        let mut first = Histogram::new();
        first.add(100, 1);
        let mut second = Histogram::new();
        second.add(200, 2);

        let mut ab = first.clone();
        ab.merge(&second);
        let mut ba = second.clone();
        ba.merge(&first);

        assert_eq!(ab, ba);
    }

    #[test]
    fn test_conservation_random_input() {
        let mut rng = rand::thread_rng();
        let keys: Vec<u16> = (0..10_000).map(|_| rng.gen()).collect();

        let mut histogram = Histogram::new();
        histogram.count_range(&keys, 0, keys.len());
        assert_eq!(histogram.total(), keys.len() as u64);
    }

    #[test]
    fn test_boundaries_are_monotonic() {
        let mut rng = rand::thread_rng();
        let keys: Vec<u16> = (0..5_000).map(|_| rng.gen()).collect();

        let mut histogram = Histogram::new();
        histogram.count_range(&keys, 0, keys.len());
        let boundaries = histogram.into_boundaries();

        let mut previous = 0u64;
        for key in 0..KEY_SPACE {
            let end = boundaries.end_of(key as u16);
            assert!(end >= previous, "boundaries must be non-decreasing");
            previous = end;
        }
        assert_eq!(boundaries.total(), keys.len() as u64);
    }

    #[test]
    fn test_reconstruct_simple() {
        let keys = [5u16, 1, 5, 2, 1, 1];
        let mut histogram = Histogram::new();
        histogram.count_range(&keys, 0, keys.len());

        let mut out = vec![0u16; keys.len()];
        histogram
            .into_boundaries()
            .reconstruct(&mut out)
            .unwrap();
        assert_eq!(out, vec![1, 1, 1, 2, 5, 5]);
    }

    #[test]
    fn test_reconstruct_skips_zero_count_keys() {
        // A zero bucket between two occupied buckets must yield an empty
        // range without corrupting its neighbors.
        let mut histogram = Histogram::new();
        histogram.add(3, 2);
        histogram.add(7, 1);
        let boundaries = histogram.into_boundaries();

        assert_eq!(boundaries.end_of(3), 2);
        assert_eq!(boundaries.end_of(5), 2); // empty range for key 5
        assert_eq!(boundaries.end_of(7), 3);

        let mut out = vec![0u16; 3];
        boundaries.reconstruct(&mut out).unwrap();
        assert_eq!(out, vec![3, 3, 7]);
    }

    #[test]
    fn test_reconstruct_is_idempotent() {
        let keys = [9u16, 4, 9, 65535, 0];
        let mut histogram = Histogram::new();
        histogram.count_range(&keys, 0, keys.len());
        let boundaries = histogram.into_boundaries();

        let mut first = vec![0u16; keys.len()];
        boundaries.reconstruct(&mut first).unwrap();

        let mut second = vec![1u16; keys.len()];
        boundaries.reconstruct(&mut second).unwrap();

        assert_eq!(first, second);
        assert_eq!(first, vec![0, 4, 9, 9, 65535]);
    }

    #[test]
    fn test_reconstruct_rejects_length_mismatch() {
        let mut histogram = Histogram::new();
        histogram.add(1, 4);
        let boundaries = histogram.into_boundaries();

        let mut too_short = vec![0u16; 3];
        assert!(boundaries.reconstruct(&mut too_short).is_err());
    }

    #[test]
    fn test_reconstruct_extreme_keys() {
        let mut histogram = Histogram::new();
        histogram.add(0, 2);
        histogram.add(65535, 2);
        let boundaries = histogram.into_boundaries();

        let mut out = vec![7u16; 4];
        boundaries.reconstruct(&mut out).unwrap();
        assert_eq!(out, vec![0, 0, 65535, 65535]);
    }
}
