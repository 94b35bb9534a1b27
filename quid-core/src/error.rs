//! Typed failure taxonomy for the extraction pipeline
//!
//! Every run ends in exactly one of these; no stage retries and no stage
//! swallows an error. Presentation (dialogs, retry prompts) is strictly a
//! caller concern.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    /// Rejected before any extraction begins.
    #[error("file is {size} bytes, over the {limit} byte upload limit")]
    FileTooLarge { size: u64, limit: u64 },

    /// Extension/MIME not recognized; rejected before extraction.
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// Corrupt or password-protected document; fatal for the run.
    #[error("document could not be read: {0}")]
    DocumentUnreadable(String),

    /// OCR engine error or zero recognized text on an image-only path.
    #[error("OCR failed: {0}")]
    OcrFailure(String),

    /// Extraction ran but assembly produced zero records.
    #[error(
        "no transactions found — the document may not contain a recognizable statement table"
    )]
    NoTransactionsFound,

    /// Quality score under the acceptance threshold.
    #[error("extraction quality too low: scored {score}, minimum is {minimum}")]
    LowQualityExtraction { score: u32, minimum: u32 },

    /// No candidate date format matched any sample. Correctable: the
    /// caller may supply a format and re-invoke.
    #[error("could not detect a date format from {sampled} sample value(s)")]
    DateFormatUndetected { sampled: usize },

    /// Cooperative cancellation observed at a page/OCR boundary.
    #[error("parsing was cancelled")]
    Cancelled,
}
