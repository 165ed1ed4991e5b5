//! Feeder interface (collaborator boundary, spec §6): the orchestrator
//! consumes already-parsed records from a `RecordFeeder`. Actual fastq/fasta
//! parsing, barcode whitelist correction, barcode translation, and
//! read-pair merging are feeder-side concerns and out of scope per spec §1;
//! this module defines the contract plus a `FastxFeeder` that wraps `bio`'s
//! parsers for the common case.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use bio::io::{fasta, fastq};
use flate2::read::GzDecoder;

use crate::error::{ClassifierError, ClassifierResult};

/// One already-parsed input record, batched by the pipeline orchestrator.
#[derive(Debug, Clone)]
pub struct ReadRecord {
    pub id: String,
    pub seq: Vec<u8>,
    pub mate_seq: Option<Vec<u8>>,
    pub barcode: Option<BarcodeStatus>,
    pub umi: Option<String>,
}

/// How a feeder reports a record's barcode: already whitelist-corrected, or
/// `NotInWhitelist` (spec §7 `BarcodeNotInWhitelist`: recovered, not fatal —
/// the sink prints the literal `"N"` for this record's barcode column).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BarcodeStatus {
    Corrected(String),
    NotInWhitelist,
}

impl BarcodeStatus {
    pub fn as_output_str(&self) -> &str {
        match self {
            BarcodeStatus::Corrected(s) => s,
            BarcodeStatus::NotInWhitelist => "N",
        }
    }
}

/// A feeder delivers batches of up to `max` records; batch sizes across all
/// record streams (read, mate, barcode, UMI) must agree, or the orchestrator
/// raises `MateMismatch` (spec §6).
pub trait RecordFeeder {
    fn next_batch(&mut self, max: usize) -> ClassifierResult<Vec<ReadRecord>>;
}

/// One `segment:start:end` clause of `--read-format` (spec SUPPLEMENTED
/// FEATURES): describes how to slice a logical segment out of an
/// interleaved raw record. `end == None` means "to end of record".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadFormatSegment {
    pub kind: SegmentKind,
    pub start: usize,
    pub end: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    R1,
    R2,
    Barcode,
    Umi,
}

/// Parses the `--read-format` CLI value into segment descriptors. Slicing a
/// raw record according to these descriptors is a feeder-side concern
/// (out of scope); this only validates the descriptor eagerly so a malformed
/// `--read-format` is a `Usage` error, not a mid-batch surprise.
pub fn parse_read_format(spec: &str) -> ClassifierResult<Vec<ReadFormatSegment>> {
    spec.split(',')
        .map(|clause| parse_read_format_segment(clause.trim()))
        .collect()
}

fn parse_read_format_segment(clause: &str) -> ClassifierResult<ReadFormatSegment> {
    let parts: Vec<&str> = clause.split(':').collect();
    if parts.len() != 3 {
        return Err(ClassifierError::Usage(format!(
            "malformed --read-format clause: {}",
            clause
        )));
    }
    let kind = match parts[0] {
        "r1" => SegmentKind::R1,
        "r2" => SegmentKind::R2,
        "bc" => SegmentKind::Barcode,
        "um" => SegmentKind::Umi,
        other => {
            return Err(ClassifierError::Usage(format!(
                "unknown --read-format segment: {}",
                other
            )))
        }
    };
    let start = parts[1]
        .parse::<usize>()
        .map_err(|_| ClassifierError::Usage(format!("bad start offset in: {}", clause)))?;
    let end_raw = parts[2]
        .parse::<i64>()
        .map_err(|_| ClassifierError::Usage(format!("bad end offset in: {}", clause)))?;
    let end = if end_raw == -1 {
        None
    } else if end_raw < 0 {
        return Err(ClassifierError::Usage(format!(
            "negative end offset other than -1 in: {}",
            clause
        )));
    } else {
        Some(end_raw as usize)
    };
    Ok(ReadFormatSegment { kind, start, end })
}

/// Transparently decompresses gzip input by sniffing the magic bytes,
/// leaving plain files untouched.
pub fn open_maybe_gz(path: &str) -> ClassifierResult<Box<dyn Read + Send>> {
    let mut file = File::open(Path::new(path)).map_err(ClassifierError::InputIo)?;
    let mut magic = [0u8; 2];
    let read_len = file.read(&mut magic).map_err(ClassifierError::InputIo)?;
    file.seek(SeekFrom::Start(0))
        .map_err(ClassifierError::InputIo)?;

    if read_len == 2 && magic == [0x1f, 0x8b] {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

enum FastxReader {
    Fasta(fasta::Records<Box<dyn Read + Send>>),
    Fastq(fastq::Records<Box<dyn Read + Send>>),
}

/// Reads single-end or paired-end FASTA/FASTQ (optionally gzipped),
/// batching records for the pipeline orchestrator. Barcode/UMI files, when
/// present, are read as one id-per-line text streams aligned by record
/// order with the main read stream.
pub struct FastxFeeder {
    r1: FastxReader,
    r2: Option<FastxReader>,
    barcode_lines: Option<std::io::Lines<std::io::BufReader<Box<dyn Read + Send>>>>,
    umi_lines: Option<std::io::Lines<std::io::BufReader<Box<dyn Read + Send>>>>,
}

impl FastxFeeder {
    pub fn new_single_end(path: &str, is_fastq: bool) -> ClassifierResult<Self> {
        let reader = Self::open_reader(path, is_fastq)?;
        Ok(FastxFeeder {
            r1: reader,
            r2: None,
            barcode_lines: None,
            umi_lines: None,
        })
    }

    pub fn new_paired_end(path1: &str, path2: &str, is_fastq: bool) -> ClassifierResult<Self> {
        let r1 = Self::open_reader(path1, is_fastq)?;
        let r2 = Self::open_reader(path2, is_fastq)?;
        Ok(FastxFeeder {
            r1,
            r2: Some(r2),
            barcode_lines: None,
            umi_lines: None,
        })
    }

    pub fn with_barcode_file(mut self, path: &str) -> ClassifierResult<Self> {
        use std::io::BufRead;
        let reader = std::io::BufReader::new(open_maybe_gz(path)?);
        self.barcode_lines = Some(reader.lines());
        Ok(self)
    }

    pub fn with_umi_file(mut self, path: &str) -> ClassifierResult<Self> {
        use std::io::BufRead;
        let reader = std::io::BufReader::new(open_maybe_gz(path)?);
        self.umi_lines = Some(reader.lines());
        Ok(self)
    }

    fn open_reader(path: &str, is_fastq: bool) -> ClassifierResult<FastxReader> {
        let stream = open_maybe_gz(path)?;
        Ok(if is_fastq {
            FastxReader::Fastq(fastq::Reader::new(stream).records())
        } else {
            FastxReader::Fasta(fasta::Reader::new(stream).records())
        })
    }

    fn next_record(reader: &mut FastxReader) -> ClassifierResult<Option<(String, Vec<u8>)>> {
        match reader {
            FastxReader::Fasta(records) => match records.next() {
                None => Ok(None),
                Some(r) => {
                    let rec = r?;
                    Ok(Some((rec.id().to_owned(), rec.seq().to_owned())))
                }
            },
            FastxReader::Fastq(records) => match records.next() {
                None => Ok(None),
                Some(r) => {
                    let rec = r?;
                    Ok(Some((rec.id().to_owned(), rec.seq().to_owned())))
                }
            },
        }
    }

    fn next_line(
        lines: &mut Option<std::io::Lines<std::io::BufReader<Box<dyn Read + Send>>>>,
    ) -> ClassifierResult<Option<String>> {
        match lines {
            None => Ok(None),
            Some(it) => match it.next() {
                None => Ok(None),
                Some(line) => Ok(Some(line.map_err(ClassifierError::InputIo)?)),
            },
        }
    }
}

impl RecordFeeder for FastxFeeder {
    fn next_batch(&mut self, max: usize) -> ClassifierResult<Vec<ReadRecord>> {
        let mut batch = Vec::with_capacity(max);
        for _ in 0..max {
            let r1_next = match Self::next_record(&mut self.r1)? {
                None => break,
                Some(r) => r,
            };
            let r2_next = match &mut self.r2 {
                Some(r2) => Self::next_record(r2)?,
                None => None,
            };
            if self.r2.is_some() && r2_next.is_none() {
                return Err(ClassifierError::MateMismatch {
                    r1_count: batch.len() + 1,
                    r2_count: batch.len(),
                });
            }

            let barcode = Self::next_line(&mut self.barcode_lines)?.map(|line| {
                if line == "N" {
                    BarcodeStatus::NotInWhitelist
                } else {
                    BarcodeStatus::Corrected(line)
                }
            });
            let umi = Self::next_line(&mut self.umi_lines)?;

            batch.push(ReadRecord {
                id: r1_next.0,
                seq: r1_next.1,
                mate_seq: r2_next.map(|(_, seq)| seq),
                barcode,
                umi,
            });
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_read_format_descriptor() {
        let segs = parse_read_format("r1:0:-1,bc:0:16,um:16:24").unwrap();
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[0].kind, SegmentKind::R1);
        assert_eq!(segs[0].end, None);
        assert_eq!(segs[1].kind, SegmentKind::Barcode);
        assert_eq!(segs[2].start, 16);
        assert_eq!(segs[2].end, Some(24));
    }

    #[test]
    fn rejects_malformed_read_format() {
        assert!(parse_read_format("bogus").is_err());
        assert!(parse_read_format("xx:0:-1").is_err());
        assert!(parse_read_format("r1:a:-1").is_err());
    }

    #[test]
    fn barcode_status_output() {
        assert_eq!(
            BarcodeStatus::Corrected("ACGT".into()).as_output_str(),
            "ACGT"
        );
        assert_eq!(BarcodeStatus::NotInWhitelist.as_output_str(), "N");
    }
}
