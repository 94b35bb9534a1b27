//! Intermediate artifacts of the extraction pipeline
//!
//! Everything here lives for exactly one pipeline run: the orchestrator
//! creates it, the downstream stage consumes it, nothing is cached across
//! documents.

use quid_core::{AccountKind, ParsedTransaction, QualityReport};
use serde::{Deserialize, Serialize};

/// Input kinds the pipeline dispatches on, inferred from the filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentKind {
    Csv,
    Xls,
    Xlsx,
    Pdf,
    Image,
    Text,
}

impl DocumentKind {
    /// Infer the kind from a filename extension. `None` means the
    /// pipeline rejects the file before extraction.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = filename.rsplit('.').next()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "xls" => Some(Self::Xls),
            "xlsx" => Some(Self::Xlsx),
            "pdf" => Some(Self::Pdf),
            "jpg" | "jpeg" | "png" | "heic" => Some(Self::Image),
            "txt" => Some(Self::Text),
            _ => None,
        }
    }
}

/// The raw upload. Consumed once; discarded when the run completes.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub bytes: Vec<u8>,
    pub filename: String,
}

impl RawDocument {
    pub fn new(bytes: Vec<u8>, filename: impl Into<String>) -> Self {
        Self { bytes, filename: filename.into() }
    }
}

/// A text fragment with its page coordinates, produced by native PDF
/// extraction. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedTextItem {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub page: usize,
}

/// An ordered run of items sharing a vertical coordinate within the
/// clustering tolerance. Items are ordered left to right.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextRow {
    pub items: Vec<PositionedTextItem>,
}

impl TextRow {
    /// Vertical coordinate of the row (its lead item's y).
    pub fn y(&self) -> f32 {
        self.items.first().map(|i| i.y).unwrap_or(0.0)
    }

    pub fn page(&self) -> usize {
        self.items.first().map(|i| i.page).unwrap_or(0)
    }

    /// Row text with single-space joints, for keyword scans.
    pub fn joined(&self) -> String {
        self.items
            .iter()
            .map(|i| i.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Semantic roles a reconstructed table column can hold. At most one
/// anchor per role per document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnchorRole {
    TransactionDate,
    ProcessDate,
    Description,
    Amount,
    Balance,
}

/// A role bound to the horizontal coordinate of its header token.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnAnchor {
    pub role: AnchorRole,
    pub x: f32,
}

/// One data row after column assignment, still textual.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconstructedRow {
    pub date: Option<String>,
    pub process_date: Option<String>,
    pub description: Vec<String>,
    pub amount: Option<String>,
    pub balance: Option<String>,
    pub page: usize,
}

impl ReconstructedRow {
    pub fn description_text(&self) -> String {
        self.description.join(" ")
    }
}

/// Successful pipeline result: transactions plus everything the caller
/// needs to render a review screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseOutcome {
    pub transactions: Vec<ParsedTransaction>,
    /// Column mapping suggestion (tabular inputs only); confidences are
    /// canonical [0,1]
    pub mapping: Option<crate::columns::MappingSuggestion>,
    /// Detected provider, best effort
    pub bank: Option<String>,
    pub account_kind: AccountKind,
    /// Debt-path extras, nullable
    pub starting_balance: Option<f64>,
    pub interest_rate: Option<f64>,
    pub quality: QualityReport,
}
