//! Sink interface (collaborator boundary, spec §6): writes one tabular row
//! per tied sequence hit, or exactly one "unclassified" row when a read has
//! no hits.

use std::io::Write;

use crate::classifier::ClassifyResult;
use crate::error::ClassifierResult;
use crate::feeder::ReadRecord;

/// Receives finished classification results; actual serialization is the
/// only thing a `ResultSink` owns (spec §1: "result serialization ... out
/// of scope" refers to feeder-originated report post-processing, not this
/// per-read row format, which the spec's external interface defines
/// directly).
pub trait ResultSink {
    fn write_header(&mut self) -> ClassifierResult<()>;
    fn write_result(&mut self, record: &ReadRecord, result: &ClassifyResult) -> ClassifierResult<()>;
}

/// Tab-separated writer matching spec §6's column layout. `include_barcode`
/// / `include_umi` append optional trailing columns when the run carries
/// barcode/UMI streams.
pub struct TabularSink<W: Write> {
    writer: W,
    include_barcode: bool,
    include_umi: bool,
}

impl<W: Write> TabularSink<W> {
    pub fn new(writer: W, include_barcode: bool, include_umi: bool) -> Self {
        TabularSink {
            writer,
            include_barcode,
            include_umi,
        }
    }

    fn write_row(
        &mut self,
        record: &ReadRecord,
        result: &ClassifyResult,
        seq_id: &str,
        tax_id: u64,
    ) -> ClassifierResult<()> {
        write!(
            self.writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            record.id,
            seq_id,
            tax_id,
            result.score,
            result.secondary_score,
            result.hit_length,
            result.query_length,
            result.best_match_cnt.max(1),
        )?;
        if self.include_barcode {
            let barcode = record
                .barcode
                .as_ref()
                .map(|b| b.as_output_str())
                .unwrap_or("N");
            write!(self.writer, "\t{}", barcode)?;
        }
        if self.include_umi {
            write!(self.writer, "\t{}", record.umi.as_deref().unwrap_or("N"))?;
        }
        writeln!(self.writer)?;
        Ok(())
    }
}

impl<W: Write> ResultSink for TabularSink<W> {
    fn write_header(&mut self) -> ClassifierResult<()> {
        write!(
            self.writer,
            "readID\tseqID\ttaxID\tscore\t2ndBestScore\thitLength\tqueryLength\tnumMatches"
        )?;
        if self.include_barcode {
            write!(self.writer, "\tbarcode")?;
        }
        if self.include_umi {
            write!(self.writer, "\tUMI")?;
        }
        writeln!(self.writer)?;
        Ok(())
    }

    fn write_result(&mut self, record: &ReadRecord, result: &ClassifyResult) -> ClassifierResult<()> {
        if result.is_unclassified() {
            return self.write_row(record, result, "unclassified", 0);
        }
        for &(seq_id, tax_id) in &result.seq_hits {
            self.write_row(record, result, &seq_id.to_string(), tax_id)?;
        }
        Ok(())
    }
}
