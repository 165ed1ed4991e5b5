//! Pipeline orchestrator (C7): reads batches of up to `1024*T` records and
//! runs one of three topologies selected by total thread count `T`, per
//! spec §4.7. Per spec §9, threading uses plain OS threads with a fork/join
//! barrier per batch — no work-stealing, channels, or condition variables.
//! `std::thread::scope` gives us the fork/join barrier without `Arc` or
//! `unsafe`, since the classifier/taxonomy/batches all outlive the scope.

use log::debug;

use crate::classifier::{Classifier, ClassifyResult};
use crate::error::ClassifierResult;
use crate::feeder::{ReadRecord, RecordFeeder};
use crate::sink::ResultSink;

pub fn batch_size(threads: usize) -> usize {
    1024 * threads.max(1)
}

/// Divides `batch` across `worker_count` threads by `i mod worker_count ==
/// tid` (static round-robin, per spec §4.7's partitioning rationale) and
/// classifies each read. Returns results in input order.
fn classify_batch_parallel(
    classifier: &Classifier,
    batch: &[ReadRecord],
    worker_count: usize,
) -> Vec<ClassifyResult> {
    let worker_count = worker_count.max(1);
    let mut results: Vec<Option<ClassifyResult>> = (0..batch.len()).map(|_| None).collect();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..worker_count)
            .map(|tid| {
                scope.spawn(move || {
                    let mut partial = Vec::new();
                    let mut i = tid;
                    while i < batch.len() {
                        let rec = &batch[i];
                        let result = classifier.query(&rec.seq, rec.mate_seq.as_deref());
                        partial.push((i, result));
                        i += worker_count;
                    }
                    partial
                })
            })
            .collect();

        for handle in handles {
            for (i, result) in handle.join().expect("classify worker panicked") {
                results[i] = Some(result);
            }
        }
    });

    results
        .into_iter()
        .map(|r| r.expect("every batch index assigned by round-robin partition"))
        .collect()
}

fn write_batch<S: ResultSink>(
    sink: &mut S,
    batch: &[ReadRecord],
    results: &[ClassifyResult],
) -> ClassifierResult<()> {
    for (rec, result) in batch.iter().zip(results.iter()) {
        sink.write_result(rec, result)?;
    }
    Ok(())
}

/// Runs the classification pipeline end to end: writes the sink header,
/// picks a topology from `threads` (spec §4.7 table), and drives batches
/// until the feeder reports an empty batch.
pub fn run<F, S>(classifier: &Classifier, feeder: &mut F, sink: &mut S, threads: usize) -> ClassifierResult<()>
where
    F: RecordFeeder + Send,
    S: ResultSink,
{
    sink.write_header()?;
    let threads = threads.max(1);
    if threads <= 7 {
        run_serial(classifier, feeder, sink, threads)
    } else if threads <= 12 {
        run_double_buffer(classifier, feeder, sink, threads)
    } else {
        run_triple_buffer(classifier, feeder, sink, threads)
    }
}

/// T <= 7: no dedicated input/output threads. The calling thread does
/// input and output; `threads` classify workers split each batch.
fn run_serial<F, S>(classifier: &Classifier, feeder: &mut F, sink: &mut S, threads: usize) -> ClassifierResult<()>
where
    F: RecordFeeder,
    S: ResultSink,
{
    loop {
        let batch = feeder.next_batch(batch_size(threads))?;
        if batch.is_empty() {
            break;
        }
        debug!("serial: classifying batch of {} reads", batch.len());
        let results = classify_batch_parallel(classifier, &batch, threads);
        write_batch(sink, &batch, &results)?;
    }
    Ok(())
}

/// 8 <= T <= 12: one dedicated input thread double-buffers reads while
/// `T-1` classify threads process the other buffer; the calling thread
/// drives the join barrier and writes output in order.
fn run_double_buffer<F, S>(classifier: &Classifier, feeder: &mut F, sink: &mut S, threads: usize) -> ClassifierResult<()>
where
    F: RecordFeeder + Send,
    S: ResultSink,
{
    let classify_threads = threads - 1;
    let sz = batch_size(threads);

    let mut buffers: [Vec<ReadRecord>; 2] = [Vec::new(), Vec::new()];
    buffers[0] = feeder.next_batch(sz)?;
    let mut tag = 0usize;

    while !buffers[tag].is_empty() {
        let next_tag = 1 - tag;
        let mut fetch_result: ClassifierResult<Vec<ReadRecord>> = Ok(Vec::new());

        let classified = std::thread::scope(|scope| {
            let feeder_ref = &mut *feeder;
            let input_handle = scope.spawn(move || feeder_ref.next_batch(sz));
            let classified = classify_batch_parallel(classifier, &buffers[tag], classify_threads);
            fetch_result = input_handle.join().expect("input thread panicked");
            classified
        });

        write_batch(sink, &buffers[tag], &classified)?;
        buffers[next_tag] = fetch_result?;
        tag = next_tag;
    }
    Ok(())
}

/// T >= 13: input, classify, and output overlap across three buffers. This
/// thread acts as the spec's dedicated "output thread" role (writing the
/// previous batch's already-classified results) while a spawned input
/// thread fills the next buffer and spawned classify workers process the
/// current one — the three roles the spec's table assigns to separate
/// threads run concurrently within one fork/join barrier per iteration,
/// matching the described overlap without an extra idle OS thread.
fn run_triple_buffer<F, S>(classifier: &Classifier, feeder: &mut F, sink: &mut S, threads: usize) -> ClassifierResult<()>
where
    F: RecordFeeder + Send,
    S: ResultSink,
{
    let classify_threads = threads - 2;
    let sz = batch_size(threads);

    let mut buffers: [Vec<ReadRecord>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    let mut pending: [Option<Vec<ClassifyResult>>; 3] = [None, None, None];

    buffers[0] = feeder.next_batch(sz)?;
    if buffers[0].is_empty() {
        return Ok(());
    }

    let mut tag = 0usize;
    loop {
        if buffers[tag].is_empty() {
            break;
        }
        let next_tag = (tag + 1) % 3;
        let prev_tag = (tag + 2) % 3;

        let mut fetch_result: ClassifierResult<Vec<ReadRecord>> = Ok(Vec::new());
        let mut write_result: ClassifierResult<()> = Ok(());

        let classified = std::thread::scope(|scope| {
            let feeder_ref = &mut *feeder;
            let input_handle = scope.spawn(move || feeder_ref.next_batch(sz));
            let classify_handle =
                scope.spawn(|| classify_batch_parallel(classifier, &buffers[tag], classify_threads));

            if let Some(results) = pending[prev_tag].take() {
                write_result = write_batch(sink, &buffers[prev_tag], &results);
            }

            fetch_result = input_handle.join().expect("input thread panicked");
            classify_handle.join().expect("classify worker panicked")
        });

        write_result?;
        pending[tag] = Some(classified);
        buffers[next_tag] = fetch_result?;
        tag = next_tag;
    }

    // Exactly one batch's results lag the loop by one iteration: the one
    // classified just before the feeder reported an empty buffer and broke
    // the loop, one slot behind the current `tag`.
    let drain_tag = (tag + 2) % 3;
    if let Some(results) = pending[drain_tag].take() {
        write_batch(sink, &buffers[drain_tag], &results)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::classifier::ClassifierParams;
    use crate::fmindex::FmIndex;
    use crate::taxonomy::{Rank, Taxonomy};
    use std::sync::Mutex;

    fn toy_classifier(max_result: usize) -> Classifier {
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
        let fm = FmIndex::build_for_test(&text, &markers, 4, 8);
        let taxonomy = Taxonomy::build_for_test(
            vec![0, 0],
            vec![Rank::Species, Rank::Species],
            vec!["S0".into(), "S1".into()],
            vec![100, 200],
        );
        let catalog = Catalog::build_for_test(vec![
            (0, 100, s0.len() as u64, "S0"),
            (1, 200, s1.len() as u64, "S1"),
        ]);
        Classifier::from_parts(
            fm,
            taxonomy,
            catalog,
            ClassifierParams {
                max_result,
                min_hit_len: 8,
                max_result_per_hit_factor: 40,
                hit_score_c: 3,
            },
        )
    }

    struct VecFeeder {
        batches: Vec<Vec<ReadRecord>>,
    }

    impl RecordFeeder for VecFeeder {
        fn next_batch(&mut self, _max: usize) -> ClassifierResult<Vec<ReadRecord>> {
            if self.batches.is_empty() {
                Ok(Vec::new())
            } else {
                Ok(self.batches.remove(0))
            }
        }
    }

    struct CollectSink {
        rows: Mutex<Vec<String>>,
    }

    impl ResultSink for CollectSink {
        fn write_header(&mut self) -> ClassifierResult<()> {
            Ok(())
        }

        fn write_result(
            &mut self,
            record: &ReadRecord,
            result: &ClassifyResult,
        ) -> ClassifierResult<()> {
            self.rows
                .lock()
                .unwrap()
                .push(format!("{}:{}", record.id, result.score));
            Ok(())
        }
    }

    fn make_records(ids: &[&str]) -> Vec<ReadRecord> {
        ids.iter()
            .map(|id| ReadRecord {
                id: id.to_string(),
                seq: b"ACGTACGT".to_vec(),
                mate_seq: None,
                barcode: None,
                umi: None,
            })
            .collect()
    }

    #[test]
    fn serial_topology_preserves_order() {
        let classifier = toy_classifier(2);
        let mut feeder = VecFeeder {
            batches: vec![make_records(&["a", "b", "c", "d", "e"])],
        };
        let mut sink = CollectSink {
            rows: Mutex::new(Vec::new()),
        };
        run(&classifier, &mut feeder, &mut sink, 4).unwrap();
        let rows = sink.rows.into_inner().unwrap();
        assert_eq!(rows, vec!["a:25", "b:25", "c:25", "d:25", "e:25"]);
    }

    #[test]
    fn double_buffer_topology_preserves_order() {
        let classifier = toy_classifier(2);
        let mut feeder = VecFeeder {
            batches: vec![make_records(&["a", "b", "c"]), make_records(&["d", "e"])],
        };
        let mut sink = CollectSink {
            rows: Mutex::new(Vec::new()),
        };
        run(&classifier, &mut feeder, &mut sink, 9).unwrap();
        let rows = sink.rows.into_inner().unwrap();
        assert_eq!(rows, vec!["a:25", "b:25", "c:25", "d:25", "e:25"]);
    }

    #[test]
    fn triple_buffer_topology_preserves_order() {
        let classifier = toy_classifier(2);
        let mut feeder = VecFeeder {
            batches: vec![
                make_records(&["a", "b"]),
                make_records(&["c", "d"]),
                make_records(&["e"]),
            ],
        };
        let mut sink = CollectSink {
            rows: Mutex::new(Vec::new()),
        };
        run(&classifier, &mut feeder, &mut sink, 13).unwrap();
        let rows = sink.rows.into_inner().unwrap();
        assert_eq!(rows, vec!["a:25", "b:25", "c:25", "d:25", "e:25"]);
    }
}
