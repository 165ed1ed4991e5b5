//! FM-index (C1): a thin domain layer over `bio`'s own BWT/Occ/suffix-array
//! machinery, built the same way `FofanovLab-mtsv_tools`'s `MGIndex`
//! builds its `suffix_array: SampledSuffixArray<BWT, Less, Occ>` — exact
//! match search and sampled-SA position recovery are `bio`'s job, not
//! ours. The only domain-specific piece kept here is the `regions` table
//! mapping a resolved raw text offset back to which reference sequence it
//! falls in (the same role the teacher's own `Bin` struct plays).

use std::io::{BufReader, BufWriter, Read, Write};

use bio::alphabets::Alphabet;
use bio::data_structures::bwt::{bwt, less, Less, Occ, BWT};
use bio::data_structures::fmindex::{BackwardSearchResult, FMIndex, FMIndexable, Interval};
use bio::data_structures::suffix_array::{suffix_array, SampledSuffixArray, SuffixArray};
use serde::{Deserialize, Serialize};

use crate::error::{ClassifierError, ClassifierResult};

const MAGIC: u32 = 0xC0FFEE01;
const VERSION: u32 = 2;

/// Number of BWT symbols between consecutive `Occ` rank checkpoints.
pub const DEFAULT_OCC_SAMPLE_RATE: usize = 32;
/// Number of suffix-array rows between consecutive retained samples.
pub const DEFAULT_SA_SAMPLE_RATE: usize = 8;

/// The five symbols this index ever indexes: separator plus the four
/// nucleotides. Anything else (`N`, lowercase, quality chars) falls
/// outside this alphabet, so `bio`'s rank structures never assign it a
/// valid code and backward search for it collapses to an empty interval —
/// the hard stop spec §4.1 requires, for free from the underlying crate.
pub fn index_alphabet() -> Alphabet {
    Alphabet::new(b"$ACGT")
}

/// A contiguous run of the concatenated reference text belonging to one
/// sequence id, the same bookkeeping the teacher's own `Bin` struct
/// carries alongside its FM-index.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Region {
    seq_id: u64,
    start: usize,
    end: usize,
}

/// The FM-index proper. Exact-match search, rank queries, and sampled-SA
/// position recovery are delegated entirely to `bio`'s
/// `SampledSuffixArray<BWT, Less, Occ>`; this struct only adds the
/// `regions` table and the `.1.cfr` framing around it.
#[derive(Serialize, Deserialize)]
pub struct FmIndex {
    sampled_sa: SampledSuffixArray<BWT, Less, Occ>,
    regions: Vec<Region>,
    len: usize,
}

impl FmIndex {
    pub fn len(&self) -> usize {
        self.len
    }

    /// Build the ephemeral `bio` `FMIndex` view over our sampled suffix
    /// array, the same `FMIndex::new(sa.bwt(), sa.less(), sa.occ())` call
    /// `mtsv-binner.rs` makes at query time rather than storing it
    /// alongside the data it borrows from.
    fn view(&self) -> FMIndex<&BWT, &Less, &Occ> {
        FMIndex::new(
            self.sampled_sa.bwt(),
            self.sampled_sa.less(),
            self.sampled_sa.occ(),
        )
    }

    /// Backward search over the rightmost `pattern.len()` bases. Returns
    /// the matched interval and how many bases (`l <= pattern.len()`)
    /// were consumed before the interval went empty (or `pattern.len()`
    /// on a complete match). A non-ACGT base still halts the search the
    /// moment it's encountered, since it's outside `index_alphabet()`.
    pub fn backward_search(&self, pattern: &[u8]) -> (Interval, usize) {
        if pattern.is_empty() {
            return (Interval { lower: 0, upper: 0 }, 0);
        }
        match self.view().backward_search(pattern.iter()) {
            BackwardSearchResult::Complete(interval) => (interval, pattern.len()),
            BackwardSearchResult::Partial(interval, l) => (interval, l),
            BackwardSearchResult::Absent => (Interval { lower: 0, upper: 0 }, 0),
        }
    }

    /// Resolve up to `cap` rows of `interval` (evenly spaced across the
    /// interval when it's larger than `cap`; every row when `cap` is
    /// `None`) to the sequence id each occurrence falls in.
    pub fn resolve_seq_ids(&self, interval: Interval, cap: Option<usize>) -> Vec<u64> {
        let size = interval.upper.saturating_sub(interval.lower);
        if size == 0 {
            return Vec::new();
        }
        let rows: Vec<usize> = match cap {
            Some(cap) if cap > 0 && cap < size => {
                (0..cap)
                    .map(|i| interval.lower + (i * size) / cap)
                    .collect()
            }
            _ => (interval.lower..interval.upper).collect(),
        };
        rows.iter()
            .map(|&row| {
                let single = Interval {
                    lower: row,
                    upper: row + 1,
                };
                let pos = single.occ(&self.sampled_sa)[0];
                self.seq_id_at(pos)
            })
            .collect()
    }

    fn seq_id_at(&self, pos: usize) -> u64 {
        let idx = self
            .regions
            .partition_point(|r| r.end <= pos);
        self.regions[idx].seq_id
    }

    /// Serialize to `<prefix>.1.cfr`: a thin magic/version header
    /// followed by a `bincode` encoding of the sampled suffix array and
    /// region table, matching the teacher's own `io::write_to_file`
    /// (`bincode::serialize_into` over a type deriving `Serialize`).
    pub fn write_to<W: Write>(&self, mut w: W) -> ClassifierResult<()> {
        w.write_all(&MAGIC.to_le_bytes())?;
        w.write_all(&VERSION.to_le_bytes())?;
        bincode::serialize_into(&mut w, self)
            .map_err(|e| ClassifierError::CorruptIndex(e.to_string()))
    }

    /// Read `<prefix>.1.cfr`; fails with `CorruptIndex` on magic/version
    /// mismatch or a `bincode` decode error, per spec §4.1.
    pub fn load<R: Read>(mut r: R) -> ClassifierResult<Self> {
        let magic = read_u32(&mut r)?;
        if magic != MAGIC {
            return Err(ClassifierError::CorruptIndex(format!(
                "bad magic: {:#x}",
                magic
            )));
        }
        let version = read_u32(&mut r)?;
        if version != VERSION {
            return Err(ClassifierError::CorruptIndex(format!(
                "unsupported index version: {}",
                version
            )));
        }
        bincode::deserialize_from(&mut r).map_err(|e| ClassifierError::CorruptIndex(e.to_string()))
    }

    pub fn write_to_file(&self, path: &str) -> ClassifierResult<()> {
        let f = std::fs::File::create(path)
            .map_err(|e| ClassifierError::IndexIo(path.to_string(), e))?;
        self.write_to(BufWriter::new(f))
    }

    pub fn load_from_file(path: &str) -> ClassifierResult<Self> {
        let f = std::fs::File::open(path)
            .map_err(|e| ClassifierError::IndexIo(path.to_string(), e))?;
        Self::load(BufReader::new(f))
    }

    /// Build an FM-index over `text` (already `$`-terminated per
    /// reference) for tests, following the teacher's own construction
    /// pipeline in `index.rs`: `suffix_array` -> `bwt` -> `less` ->
    /// `Occ::new` -> `sa.sample`. `sa_markers[i]` gives the `(seqId,
    /// offset)` for the suffix starting at raw text position `i`; only
    /// the seqId half is used, to derive `regions`.
    #[cfg(test)]
    pub fn build_for_test(
        text: &[u8],
        sa_markers: &[(u64, u64)],
        sa_sample_rate: usize,
        occ_sample_rate: usize,
    ) -> Self {
        assert_eq!(sa_markers.len(), text.len());
        let alphabet = index_alphabet();
        let seq = text.to_vec();
        let sa = suffix_array(&seq);
        let bwt_vec = bwt(&seq, &sa);
        let less_vec = less(&bwt_vec, &alphabet);
        let occ = Occ::new(&bwt_vec, occ_sample_rate, &alphabet);
        let sampled_sa = sa.sample(&seq, bwt_vec, less_vec, occ, sa_sample_rate);

        let mut regions = Vec::new();
        let mut start = 0usize;
        for i in 1..=sa_markers.len() {
            let boundary = i == sa_markers.len() || sa_markers[i].0 != sa_markers[start].0;
            if boundary {
                regions.push(Region {
                    seq_id: sa_markers[start].0,
                    start,
                    end: i,
                });
                start = i;
            }
        }

        FmIndex {
            sampled_sa,
            regions,
            len: text.len(),
        }
    }
}

fn read_u32<R: Read>(r: &mut R) -> ClassifierResult<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}
