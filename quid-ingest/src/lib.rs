//! quid-ingest: statement extraction pipeline
//!
//! Turns heterogeneous statement uploads (CSV, XLS/XLSX, PDF, scans,
//! plain text) into normalized transactions with a quality score. Entry
//! point: [`StatementParser`].

pub mod assemble;
pub mod columns;
pub mod ocr;
pub mod pdf_text;
pub mod pipeline;
pub mod table;
pub mod tabular;
pub mod types;

pub use columns::{
    ColumnRole, MappingSuggestion, RoleAssignment, detect_account_type, detect_bank,
    suggest_mapping,
};
pub use ocr::{OcrEngine, TesseractOcr};
pub use pipeline::{MAX_UPLOAD_BYTES, StatementParser};
pub use table::{ReconstructOptions, reconstruct_table};
pub use types::{
    AnchorRole, ColumnAnchor, DocumentKind, ParseOutcome, PositionedTextItem, RawDocument,
};
