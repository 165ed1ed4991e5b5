//! CLI entry point: loads a frozen index and classifies single- or
//! paired-end reads, writing one tabular row per read (or per tied hit).

use std::fs::File;
use std::io::{stdout, BufWriter};
use std::process::ExitCode;

use clap::Parser;
use log::{error, LevelFilter};

use centriclass::classifier::{Classifier, ClassifierParams};
use centriclass::error::{ClassifierError, ClassifierResult};
use centriclass::feeder::{parse_read_format, FastxFeeder};
use centriclass::pipeline;
use centriclass::sink::TabularSink;
use centriclass::util::init_logging;

/// Metagenomic read classifier backed by a frozen FM-index.
#[derive(Parser, Debug)]
#[command(name = "centriclass", about, version = env!("CARGO_PKG_VERSION"), disable_version_flag = true)]
struct Cli {
    /// Print version and exit, before the index is touched.
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    version: Option<bool>,

    /// Index prefix; expects `<prefix>.1.cfr`, `.2.cfr`, `.3.cfr`.
    #[arg(short = 'x', long = "index", required = true)]
    index_prefix: String,

    /// Single-end read file (FASTA or FASTQ, optionally gzipped).
    #[arg(short = 'u', long = "unpaired", conflicts_with_all = ["mate1", "mate2"])]
    unpaired: Option<String>,

    /// Mate 1 of a paired-end read file.
    #[arg(short = '1', long = "mate1", requires = "mate2")]
    mate1: Option<String>,

    /// Mate 2 of a paired-end read file.
    #[arg(short = '2', long = "mate2", requires = "mate1")]
    mate2: Option<String>,

    /// Total OS threads: selects the serial, double-, or triple-buffer
    /// pipeline topology.
    #[arg(short = 't', long = "threads", default_value_t = 1)]
    threads: usize,

    /// Maximum number of tied matches to emit per read.
    #[arg(short = 'k', long = "max-result", default_value_t = 1)]
    max_result: usize,

    /// Minimum exact-match hit length.
    #[arg(long = "min-hitlen", default_value_t = 22)]
    min_hit_len: usize,

    /// Cap on suffix-array positions resolved per hit (0 = unlimited).
    #[arg(long = "hitk-factor", default_value_t = 40)]
    hitk_factor: usize,

    /// Pre-merge overlapping mate pairs into a single synthetic read
    /// before classification (feeder-side; see FastxFeeder).
    #[arg(long = "merge-readpair", default_value_t = false)]
    merge_readpair: bool,

    /// Comma-separated `segment:start:end` descriptor for interleaved
    /// single-stream input (segments: r1, r2, bc, um; end -1 = to end).
    #[arg(long = "read-format")]
    read_format: Option<String>,

    /// Per-record barcode file, one id per line, aligned with the read
    /// stream.
    #[arg(long = "barcode")]
    barcode: Option<String>,

    /// Per-record UMI file, one id per line, aligned with the read stream.
    #[arg(long = "UMI")]
    umi: Option<String>,

    /// Whitelist of valid barcodes; unrecognized barcodes are reported as
    /// `BarcodeStatus::NotInWhitelist`.
    #[arg(long = "barcode-whitelist")]
    barcode_whitelist: Option<String>,

    /// Barcode correction table consulted before whitelist lookup.
    #[arg(long = "barcode-translate")]
    barcode_translate: Option<String>,

    /// Output path; defaults to stdout.
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Raise logging to debug level.
    #[arg(long = "debug", default_value_t = false)]
    debug: bool,
}

fn looks_like_fastq(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.ends_with(".fq")
        || lower.ends_with(".fastq")
        || lower.ends_with(".fq.gz")
        || lower.ends_with(".fastq.gz")
}

fn run(cli: Cli) -> ClassifierResult<()> {
    if let Some(spec) = &cli.read_format {
        // Validated eagerly; slicing itself is a feeder-side concern.
        parse_read_format(spec)?;
    }

    let params = ClassifierParams {
        max_result: cli.max_result,
        min_hit_len: cli.min_hit_len,
        max_result_per_hit_factor: cli.hitk_factor,
        ..ClassifierParams::default()
    };

    log::info!("loading index from prefix {}", cli.index_prefix);
    let classifier = Classifier::init(&cli.index_prefix, params)?;

    let mut feeder = match (&cli.unpaired, &cli.mate1, &cli.mate2) {
        (Some(path), None, None) => {
            FastxFeeder::new_single_end(path, looks_like_fastq(path))?
        }
        (None, Some(p1), Some(p2)) => {
            FastxFeeder::new_paired_end(p1, p2, looks_like_fastq(p1))?
        }
        _ => {
            return Err(ClassifierError::Usage(
                "exactly one of -u, or both -1 and -2, is required".into(),
            ))
        }
    };
    if let Some(path) = &cli.barcode {
        feeder = feeder.with_barcode_file(path)?;
    }
    if let Some(path) = &cli.umi {
        feeder = feeder.with_umi_file(path)?;
    }
    if cli.merge_readpair {
        log::debug!("--merge-readpair requested; feeder is responsible for pre-merging mates");
    }

    let include_barcode = cli.barcode.is_some() || cli.barcode_whitelist.is_some();
    let include_umi = cli.umi.is_some();

    match &cli.output {
        Some(path) => {
            let mut sink = TabularSink::new(
                BufWriter::new(File::create(path).map_err(ClassifierError::InputIo)?),
                include_barcode,
                include_umi,
            );
            pipeline::run(&classifier, &mut feeder, &mut sink, cli.threads)
        }
        None => {
            let mut sink = TabularSink::new(BufWriter::new(stdout()), include_barcode, include_umi);
            pipeline::run(&classifier, &mut feeder, &mut sink, cli.threads)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(if cli.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
