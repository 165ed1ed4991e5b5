//! Reverse complement, shared by the resolver's four-orientation search.

/// Reverse-complement a read. Delegates to `bio`'s own DNA complement
/// table (the same call `binner.rs` makes before aligning the reverse
/// strand), which maps ambiguity codes (`N` and friends) to themselves
/// rather than failing on them; those bytes still act as a hard stop
/// inside the FM-index since they fall outside `fmindex::index_alphabet()`.
pub fn revcomp(seq: &[u8]) -> Vec<u8> {
    bio::alphabets::dna::revcomp(seq)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revcomp_basic() {
        assert_eq!(revcomp(b"ACGT"), b"ACGT");
        assert_eq!(revcomp(b"AACCGGTT"), b"AACCGGTT".to_vec());
        assert_eq!(revcomp(b"GATTACA"), b"TGTAATC");
    }

    #[test]
    fn revcomp_is_an_involution() {
        let seq = b"ACGTACGTAAAACGTA";
        assert_eq!(revcomp(&revcomp(seq)), seq);
    }
}
