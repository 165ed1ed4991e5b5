//! Aggregator (C5): turns a winning strand's hits into a per-read result:
//! best score, ties, and secondary score, per spec §4.5.

use std::collections::BTreeMap;

use crate::fmindex::FmIndex;
use crate::hitfinder::Hit;
use crate::resolver::score_hit;

/// The result of aggregating one read's hits, at the sequence-id level
/// (spec §9 open question 4: taxon-level LCA collapse is future work).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AggregateResult {
    pub best_score: u64,
    pub second_score: u64,
    /// Sequence ids tied at `best_score`, ascending, truncated to
    /// `max_result`.
    pub best_seq_ids: Vec<u64>,
    /// Cardinality of the tied set as emitted (post-truncation), used for
    /// `bestMatchCnt`/`numMatches` in the output record.
    pub best_match_cnt: u32,
}

/// Aggregate `hits` (the winning strand from the resolver) into per-seqId
/// scores, then select the best/second-best and the ascending tied set,
/// truncated to `max_result`. `hitk_factor` caps the number of SA positions
/// resolved per hit at `hitk_factor * max_result` (0 = unlimited); when a
/// hit's interval is larger, positions are sampled evenly (spec §4.5
/// Truncation). A hit that resolves to the same sequence id at more than
/// one position (a repetitive reference) still contributes its score once
/// per sequence id, not once per resolved position.
pub fn aggregate(
    fm: &FmIndex,
    hits: &[Hit],
    min_hit_len: usize,
    max_result: usize,
    hitk_factor: usize,
    c: u64,
) -> AggregateResult {
    let mut seq_id_score: BTreeMap<u64, u64> = BTreeMap::new();

    let cap = if hitk_factor == 0 {
        None
    } else {
        Some(hitk_factor * max_result.max(1))
    };

    for hit in hits {
        let score = score_hit(hit.l, min_hit_len, c);
        if score == 0 {
            continue;
        }
        let mut seq_ids = fm.resolve_seq_ids(hit.interval, cap);
        seq_ids.sort_unstable();
        seq_ids.dedup();
        for seq_id in seq_ids {
            *seq_id_score.entry(seq_id).or_insert(0) += score;
        }
    }

    let mut best_score = 0u64;
    let mut second_score = 0u64;
    for &score in seq_id_score.values() {
        if score > best_score {
            second_score = best_score;
            best_score = score;
        } else if score > second_score {
            second_score = score;
        }
    }

    if best_score == 0 {
        return AggregateResult::default();
    }

    let mut best_seq_ids: Vec<u64> = seq_id_score
        .iter()
        .filter(|&(_, &score)| score == best_score)
        .map(|(&seq_id, _)| seq_id)
        .collect();
    best_seq_ids.truncate(max_result);
    let best_match_cnt = best_seq_ids.len() as u32;

    AggregateResult {
        best_score,
        second_score,
        best_seq_ids,
        best_match_cnt,
    }
}
