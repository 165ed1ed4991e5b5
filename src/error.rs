//! Result and Error types for the classifier crate.
use std::fmt;
use std::io;
use std::str;

#[allow(missing_docs)]
pub type ClassifierResult<T> = Result<T, ClassifierError>;

/// Error kinds per the error handling design: everything but
/// `BarcodeNotInWhitelist` is fatal and terminates the process with a
/// single log line naming the kind and offending path.
#[allow(missing_docs)]
#[derive(Debug)]
pub enum ClassifierError {
    Usage(String),
    IndexIo(String, io::Error),
    CorruptIndex(String),
    InputIo(io::Error),
    MateMismatch { r1_count: usize, r2_count: usize },
    Utf8(str::Utf8Error),
    FastqReadError,
    AnyhowError(String),
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            ClassifierError::Usage(msg) => write!(f, "usage error: {}", msg),
            ClassifierError::IndexIo(path, e) => {
                write!(f, "unable to read index file {}: {}", path, e)
            }
            ClassifierError::CorruptIndex(msg) => write!(f, "corrupt index: {}", msg),
            ClassifierError::InputIo(e) => write!(f, "I/O problem: {}", e),
            ClassifierError::MateMismatch { r1_count, r2_count } => write!(
                f,
                "mate count mismatch: {} reads in r1 stream, {} in r2 stream",
                r1_count, r2_count
            ),
            ClassifierError::Utf8(e) => write!(f, "found invalid UTF8 input ({})", e),
            ClassifierError::FastqReadError => write!(f, "error reading FASTQ file"),
            ClassifierError::AnyhowError(s) => write!(f, "error: {}", s),
        }
    }
}

impl std::error::Error for ClassifierError {}

impl From<io::Error> for ClassifierError {
    fn from(e: io::Error) -> Self {
        ClassifierError::InputIo(e)
    }
}

impl From<str::Utf8Error> for ClassifierError {
    fn from(e: str::Utf8Error) -> Self {
        ClassifierError::Utf8(e)
    }
}

impl From<anyhow::Error> for ClassifierError {
    fn from(e: anyhow::Error) -> Self {
        ClassifierError::AnyhowError(e.to_string())
    }
}

impl From<bio::io::fastq::Error> for ClassifierError {
    fn from(_e: bio::io::fastq::Error) -> Self {
        ClassifierError::FastqReadError
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mate_mismatch() {
        let e = ClassifierError::MateMismatch {
            r1_count: 4,
            r2_count: 3,
        };
        assert!(e.to_string().contains("4"));
        assert!(e.to_string().contains("3"));
    }
}
