//! Classifier facade (C6): loads the three index files and exposes the
//! single hot-path `query` operation, per spec §4.6.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::debug;

use crate::aggregator::{aggregate, AggregateResult};
use crate::catalog::Catalog;
use crate::error::{ClassifierError, ClassifierResult};
use crate::fmindex::FmIndex;
use crate::resolver::{resolve_strand, DEFAULT_SCORE_HIT_LEN_ADJUST};
use crate::taxonomy::Taxonomy;

/// Recognized classifier options (spec §4.6).
#[derive(Debug, Clone, Copy)]
pub struct ClassifierParams {
    /// Cap on the emitted tied list (`-k`).
    pub max_result: usize,
    /// Minimum hit length (`--min-hitlen`).
    pub min_hit_len: usize,
    /// SA-resolution cap multiplier (`--hitk-factor`); 0 = unlimited.
    pub max_result_per_hit_factor: usize,
    /// `C` in `(l - C)^2` (spec §4.5); production default is
    /// `DEFAULT_SCORE_HIT_LEN_ADJUST`, but a toy index with a small
    /// `min_hit_len` needs a smaller `C` to avoid zeroing every hit.
    pub hit_score_c: u64,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        ClassifierParams {
            max_result: 1,
            min_hit_len: 22,
            max_result_per_hit_factor: 40,
            hit_score_c: DEFAULT_SCORE_HIT_LEN_ADJUST,
        }
    }
}

/// A single read's classification outcome (spec §3 "Classifier result").
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassifyResult {
    pub score: u64,
    pub secondary_score: u64,
    pub best_match_cnt: u32,
    /// Ordered `(sequenceId, taxonId)` pairs sharing the primary score.
    pub seq_hits: Vec<(u64, u64)>,
    pub hit_length: u32,
    pub query_length: u32,
}

impl ClassifyResult {
    pub fn is_unclassified(&self) -> bool {
        self.seq_hits.is_empty()
    }
}

/// Loads a frozen index and answers `Query(r1, r2)` calls; no heap
/// allocation beyond the result's tied list and strand scratch buffers.
pub struct Classifier {
    fm: FmIndex,
    taxonomy: Taxonomy,
    catalog: Catalog,
    params: ClassifierParams,
}

impl Classifier {
    /// Assembles a classifier from already-loaded parts, for tests that
    /// build a toy index in memory rather than reading `.cfr` files.
    #[cfg(test)]
    pub fn from_parts(
        fm: FmIndex,
        taxonomy: Taxonomy,
        catalog: Catalog,
        params: ClassifierParams,
    ) -> Self {
        Classifier {
            fm,
            taxonomy,
            catalog,
            params,
        }
    }

    /// Opens `<index_prefix>.1.cfr`, `.2.cfr`, `.3.cfr`.
    pub fn init(index_prefix: &str, params: ClassifierParams) -> ClassifierResult<Self> {
        let fm_path = format!("{}.1.cfr", index_prefix);
        let tax_path = format!("{}.2.cfr", index_prefix);
        let cat_path = format!("{}.3.cfr", index_prefix);

        debug!("loading FM-index from {}", fm_path);
        let fm = FmIndex::load(BufReader::new(open(&fm_path)?))?;
        debug!("loading taxonomy from {}", tax_path);
        let taxonomy = Taxonomy::load(BufReader::new(open(&tax_path)?))?;
        debug!("loading sequence catalogue from {}", cat_path);
        let catalog = Catalog::load(BufReader::new(open(&cat_path)?))?;

        Ok(Classifier {
            fm,
            taxonomy,
            catalog,
            params,
        })
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    /// The only hot path: classify a single-end or paired-end read.
    pub fn query(&self, r1: &[u8], r2: Option<&[u8]>) -> ClassifyResult {
        let hits = resolve_strand(
            &self.fm,
            r1,
            r2,
            self.params.min_hit_len,
            self.params.hit_score_c,
        );
        let AggregateResult {
            best_score,
            second_score,
            best_seq_ids,
            best_match_cnt,
        } = aggregate(
            &self.fm,
            &hits,
            self.params.min_hit_len,
            self.params.max_result,
            self.params.max_result_per_hit_factor,
            self.params.hit_score_c,
        );

        let hit_length: u32 = hits.iter().map(|h| h.l as u32).sum();
        let query_length = (r1.len() + r2.map_or(0, |r| r.len())) as u32;

        let seq_hits = best_seq_ids
            .into_iter()
            .map(|seq_id| {
                let tax_id = self
                    .catalog
                    .get(seq_id)
                    .map(|entry| entry.tax_id)
                    .unwrap_or(0);
                (seq_id, tax_id)
            })
            .collect();

        ClassifyResult {
            score: best_score,
            secondary_score: second_score,
            best_match_cnt,
            seq_hits,
            hit_length,
            query_length,
        }
    }
}

fn open(path: &str) -> ClassifierResult<File> {
    File::open(Path::new(path)).map_err(|e| ClassifierError::IndexIo(path.to_owned(), e))
}
