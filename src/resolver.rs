//! Strand/mate resolver (C4): runs the hit finder on the four read
//! orientations and picks the winning strand, per spec §4.4.

use crate::alphabet::revcomp;
use crate::fmindex::FmIndex;
use crate::hitfinder::{find_hits, Hit};

/// Default `C` in `(l - C)^2` (spec §4.5): production indexes run with
/// `minHitLen >= 22 > C` so this never zeroes a real hit. Spec §8's own
/// worked example substitutes a smaller `C = 3` alongside `minHitLen = 8`
/// for its tiny two-reference toy index; callers pass `C` explicitly so
/// tests can use that illustrative value without touching the production
/// default.
pub const DEFAULT_SCORE_HIT_LEN_ADJUST: u64 = 15;

pub fn score_hit(l: usize, min_hit_len: usize, c: u64) -> u64 {
    if l < min_hit_len {
        return 0;
    }
    let l = l as u64;
    if l < c {
        return 0;
    }
    (l - c) * (l - c)
}

pub fn score_hits(hits: &[Hit], min_hit_len: usize, c: u64) -> u64 {
    hits.iter().map(|h| score_hit(h.l, min_hit_len, c)).sum()
}

/// Run the hit finder over all four orientations of `(r1, r2)` and return
/// the winning strand's hits. `r1`/`rc2` form the "forward" bag; `rc1`/`r2`
/// form the "reverse" bag. Ties favor forward.
pub fn resolve_strand(
    fm: &FmIndex,
    r1: &[u8],
    r2: Option<&[u8]>,
    min_hit_len: usize,
    c: u64,
) -> Vec<Hit> {
    let rc1 = revcomp(r1);

    let mut forward = find_hits(fm, r1, min_hit_len);
    let mut reverse = find_hits(fm, &rc1, min_hit_len);

    if let Some(r2) = r2 {
        let rc2 = revcomp(r2);
        forward.extend(find_hits(fm, &rc2, min_hit_len));
        reverse.extend(find_hits(fm, r2, min_hit_len));
    }

    let forward_score = score_hits(&forward, min_hit_len, c);
    let reverse_score = score_hits(&reverse, min_hit_len, c);

    if forward_score >= reverse_score {
        forward
    } else {
        reverse
    }
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
    fn score_hit_formula() {
        assert_eq!(
            score_hit(22, 22, DEFAULT_SCORE_HIT_LEN_ADJUST),
            (22u64 - 15).pow(2)
        );
        assert_eq!(score_hit(21, 22, DEFAULT_SCORE_HIT_LEN_ADJUST), 0);
    }

    #[test]
    fn score_hit_uses_tiny_example_adjustment() {
        // Spec §8's worked example: minHitLen = 8, C = 3, so an 8-base hit
        // scores (8-3)^2 = 25 instead of being zeroed by the production C.
        assert_eq!(score_hit(8, 8, 3), 25);
        assert_eq!(score_hit(8, 8, DEFAULT_SCORE_HIT_LEN_ADJUST), 0);
    }

    #[test]
    fn strand_symmetry_single_end() {
        let fm = toy_index();
        let forward_hits = resolve_strand(&fm, b"ACGTACGT", None, 8, 3);
        let rc = revcomp(b"ACGTACGT");
        let rc_hits = resolve_strand(&fm, &rc, None, 8, 3);
        assert_eq!(
            score_hits(&forward_hits, 8, 3),
            score_hits(&rc_hits, 8, 3)
        );
    }

    #[test]
    fn paired_mate_resolution_sums_both_mates() {
        // r1 = "AAAACGTA" occurs only in S1 (offset 8); r2 = "TACGTTTT" is
        // revcomp(r1), so the forward bag is {r1, revcomp(r2)} = {r1, r1}
        // (two identical length-8 hits, each scoring (8-3)^2 = 25) and the
        // reverse bag is {revcomp(r1), r2} = {r2, r2}, which occurs in
        // neither reference (no run of 4+ T's exists in S0 or S1) and
        // scores 0. Paired resolution must pool both mates' hits into one
        // bag per strand before picking the winner, so the forward total
        // is 50, not just r1's own 25.
        let fm = toy_index();
        let r1 = b"AAAACGTA";
        let r2 = b"TACGTTTT";
        assert_eq!(revcomp(r2), r1);
        assert_eq!(revcomp(r1), r2);

        let hits = resolve_strand(&fm, r1, Some(r2), 8, 3);
        assert_eq!(hits.len(), 2);
        let score = score_hits(&hits, 8, 3);
        assert_eq!(score, 50);
    }

    /// Generates a random reference/read base, the same `% N` match the
    /// teacher's `index.rs::random_database` uses, restricted to `ACGT`
    /// since the indexed alphabet never contains `N`.
    fn random_acgt_seq(rng: &mut impl rand::Rng, len: usize) -> Vec<u8> {
        (0..len)
            .map(|_| match rng.gen::<u8>() % 4 {
                0 => b'A',
                1 => b'C',
                2 => b'G',
                _ => b'T',
            })
            .collect()
    }

    fn random_toy_index(rng: &mut impl rand::Rng) -> FmIndex {
        let s0 = random_acgt_seq(rng, 40);
        let s1 = random_acgt_seq(rng, 40);
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

    /// Spec §8's "Paired symmetry" invariant, generalized: classifying a
    /// read forward or as its own reverse complement must score the same,
    /// over randomly generated references and reads (not just the two
    /// fixed toy scenarios above).
    #[quickcheck_macros::quickcheck]
    fn strand_symmetry_prop(seed: u64, read_len: u8) -> bool {
        use rand::SeedableRng;
        let read_len = (read_len % 24 + 8) as usize;
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let fm = random_toy_index(&mut rng);
        let read = random_acgt_seq(&mut rng, read_len);
        let rc = revcomp(&read);

        let forward = score_hits(&resolve_strand(&fm, &read, None, 8, 3), 8, 3);
        let reverse = score_hits(&resolve_strand(&fm, &rc, None, 8, 3), 8, 3);
        forward == reverse
    }
}
