//! Bounded selection of the K highest-counted urls from a stream.
//!
//! The engine keeps a min-heap of at most K candidates: the first K seed
//! the heap, and every later candidate either loses against the current
//! minimum and is dropped, or replaces it. That is O(n log K) time and
//! O(K) memory regardless of how long the stream is.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use anyhow::Result;

/// A url and how often it occurred.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UrlCount {
    pub url: String,
    pub count: u64,
}

/// Candidates order by count; on equal counts the lexicographically larger
/// url is the greater one and therefore ranks higher. All selection and
/// output ordering goes through this comparison, which keeps the final
/// ranking deterministic regardless of stream order.
impl Ord for UrlCount {
    fn cmp(&self, other: &UrlCount) -> Ordering {
        self.count
            .cmp(&other.count)
            .then_with(|| self.url.cmp(&other.url))
    }
}

impl PartialOrd for UrlCount {
    fn partial_cmp(&self, other: &UrlCount) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A min-heap of candidates, capped at `k` entries.
pub struct TopK {
    k: usize,
    heap: BinaryHeap<Reverse<UrlCount>>,
}

impl TopK {
    pub fn new(k: usize) -> TopK {
        TopK {
            k,
            heap: BinaryHeap::with_capacity(k),
        }
    }

    /// Builds a selection from a fallible candidate stream: the first `k`
    /// candidates are heapified in one go, the rest go through `offer`.
    /// The first candidate that fails to decode aborts the build.
    pub fn from_counts<I>(k: usize, counts: I) -> Result<TopK>
    where
        I: IntoIterator<Item = Result<UrlCount>>,
    {
        let mut it = counts.into_iter();
        let mut seed = Vec::new();
        for c in it.by_ref().take(k) {
            seed.push(Reverse(c?));
        }
        let mut top = TopK {
            k,
            heap: BinaryHeap::from(seed),
        };
        for c in it {
            top.offer(c?);
        }
        Ok(top)
    }

    /// Considers one candidate. While fewer than `k` entries are held it is
    /// simply inserted; afterwards it is dropped unless it beats the
    /// current minimum, which it then replaces in O(log k).
    pub fn offer(&mut self, cand: UrlCount) {
        if self.heap.len() < self.k {
            self.heap.push(Reverse(cand));
            return;
        }
        if let Some(mut min) = self.heap.peek_mut() {
            if cand > min.0 {
                *min = Reverse(cand);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Consumes the heap and returns the selected urls most-frequent-first:
    /// minima are removed in ascending order, then the order is reversed.
    pub fn into_descending(self) -> Vec<UrlCount> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(c)| c)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{TopK, UrlCount};

    fn uc(url: &str, count: u64) -> UrlCount {
        UrlCount {
            url: String::from(url),
            count,
        }
    }

    fn select(k: usize, cands: Vec<UrlCount>) -> Vec<UrlCount> {
        let mut top = TopK::new(k);
        for c in cands {
            top.offer(c);
        }
        top.into_descending()
    }

    #[test]
    fn test_selects_k_most_frequent() {
        let cands = vec![
            uc("e", 5),
            uc("b", 2),
            uc("g", 7),
            uc("a", 1),
            uc("f", 6),
            uc("c", 3),
            uc("d", 4),
        ];
        let got = select(3, cands);
        assert_eq!(got, vec![uc("g", 7), uc("f", 6), uc("e", 5)]);
    }

    #[test]
    fn test_fewer_candidates_than_k() {
        let got = select(10, vec![uc("a", 1), uc("c", 3), uc("b", 2)]);
        assert_eq!(got, vec![uc("c", 3), uc("b", 2), uc("a", 1)]);
    }

    #[test]
    fn test_tie_ranks_larger_url_first() {
        let got = select(3, vec![uc("a", 5), uc("b", 5), uc("c", 4)]);
        assert_eq!(got, vec![uc("b", 5), uc("a", 5), uc("c", 4)]);
    }

    #[test]
    fn test_tie_at_the_cut_is_order_independent() {
        // With k=1 and two equal counts, the larger url must win no matter
        // which side of the seed/offer boundary it arrives on.
        let got = select(1, vec![uc("a", 5), uc("b", 5)]);
        assert_eq!(got, vec![uc("b", 5)]);
        let got = select(1, vec![uc("b", 5), uc("a", 5)]);
        assert_eq!(got, vec![uc("b", 5)]);
    }

    #[test]
    fn test_ascending_stream_replaces_root_every_time() {
        let cands = (1..=100).map(|n| uc(&format!("url{:03}", n), n)).collect();
        let got = select(2, cands);
        assert_eq!(got, vec![uc("url100", 100), uc("url099", 99)]);
    }

    #[test]
    fn test_from_counts_matches_offer_loop() {
        let cands = vec![uc("x", 9), uc("y", 1), uc("z", 9), uc("w", 4)];
        let top = TopK::from_counts(2, cands.clone().into_iter().map(Ok)).unwrap();
        assert_eq!(top.into_descending(), select(2, cands));
    }

    #[test]
    fn test_zero_k_selects_nothing() {
        assert!(select(0, vec![uc("a", 1)]).is_empty());
    }
}
