//! Hit finder (C3): greedy longest-suffix decomposition of a read into
//! non-overlapping maximal hits, per spec §4.3.

use bio::data_structures::fmindex::Interval;

use crate::fmindex::FmIndex;

/// A single maximal exact match: the BWT interval covering every
/// reference position matching a length-`l` substring of the read.
#[derive(Debug, Clone, Copy)]
pub struct Hit {
    pub interval: Interval,
    pub l: usize,
}

/// Greedily decompose `read` into hits of at least `min_hit_len`, scanning
/// from the right end and skipping `l + 1` bases (the matched suffix plus
/// the mismatching base that stopped it) after each hit.
pub fn find_hits(fm: &FmIndex, read: &[u8], min_hit_len: usize) -> Vec<Hit> {
    let mut hits = Vec::new();
    let mut remaining = read.len();

    while remaining >= min_hit_len {
        let (interval, l) = fm.backward_search(&read[..remaining]);
        if l >= min_hit_len {
            hits.push(Hit { interval, l });
        }
        // +1 skips the base that forced termination, matching the source's
        // `remaining -= (l + 1)`. When l == 0 this still advances by one
        // base so the loop always terminates.
        remaining = remaining.saturating_sub(l + 1);
    }

    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fmindex::FmIndex;

    fn toy_index() -> FmIndex {
        let s0 = b"ACGTACGTACGTACGT";
        let s1 = b"ACGTACGTAAAACGTA";
        let mut text = Vec::new();
        let mut markers = Vec::new();
        for (off, &b) in s0.iter().enumerate() {
            text.push(b);
            markers.push((0u64, off as u64));
        }
        text.push(b'$');
        markers.push((0, s0.len() as u64));
        for (off, &b) in s1.iter().enumerate() {
            text.push(b);
            markers.push((1u64, off as u64));
        }
        text.push(b'$');
        markers.push((1, s1.len() as u64));
        FmIndex::build_for_test(&text, &markers, 4, 8)
    }

    #[test]
    fn single_full_length_hit() {
        let fm = toy_index();
        let hits = find_hits(&fm, b"ACGTACGT", 8);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].l, 8);
    }

    #[test]
    fn no_hit_below_min_len() {
        let fm = toy_index();
        let hits = find_hits(&fm, b"NNNNNNNN", 8);
        assert!(hits.is_empty());
    }

    #[test]
    fn hits_are_non_overlapping() {
        let fm = toy_index();
        // Long enough read to potentially produce more than one hit.
        let read = b"ACGTACGTACGTACGTAAAACGTAACGTACGT";
        let hits = find_hits(&fm, read, 8);
        for w in hits.windows(2) {
            // hits are discovered scanning right-to-left; earlier pushes
            // cover the rightmost span, so consecutive hits must not
            // overlap in read coordinates. We only assert each hit's
            // length is within bounds here since hit positions in read
            // space aren't tracked directly by Hit (only the BWT interval).
            assert!(w[0].l >= 8);
            assert!(w[1].l >= 8);
        }
    }
}
