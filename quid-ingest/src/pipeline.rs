//! Pipeline orchestrator
//!
//! Owns one document's run end to end: size gate, kind dispatch, stage
//! sequencing with progress, quality gating, and the mapping of every
//! internal failure onto the typed error taxonomy. All intermediate
//! artifacts die with the run; nothing is cached across documents.

use quid_core::{
    CancelToken, DigitalChecks, MIN_ACCEPTABLE_SCORE, ParseError, ParsedTransaction, PeriodHint,
    ProgressSink, ProgressUpdate, Stage, score_digital, score_scanned,
};

use crate::assemble::{
    AssemblyStats, assemble_from_text, assemble_reconstructed, detect_interest_rate,
    detect_starting_balance,
};
use crate::columns::{detect_account_type, detect_bank};
use crate::ocr::{OCR_PAGE_CAP, OcrEngine, TesseractOcr};
use crate::pdf_text::{self, NATIVE_TEXT_MIN_CHARS};
use crate::table::{ReconstructOptions, cluster_rows, reconstruct_table};
use crate::tabular;
use crate::types::{DocumentKind, ParseOutcome, RawDocument, TextRow};

/// Uploads over this limit are rejected before any parsing begins.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Which scorer applies to the assembled result.
enum ScorePath {
    Digital,
    Scanned,
}

/// One-document statement parser. Construct, optionally inject an OCR
/// engine, cancel token or period hint, then call [`parse`](Self::parse).
pub struct StatementParser {
    ocr: Box<dyn OcrEngine>,
    cancel: CancelToken,
    period: Option<PeriodHint>,
}

impl Default for StatementParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementParser {
    pub fn new() -> Self {
        Self {
            ocr: Box::new(TesseractOcr::default()),
            cancel: CancelToken::new(),
            period: None,
        }
    }

    pub fn with_ocr_engine(mut self, engine: Box<dyn OcrEngine>) -> Self {
        self.ocr = engine;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Override the statement-period hint used to resolve year-less dates.
    pub fn with_period_hint(mut self, hint: PeriodHint) -> Self {
        self.period = Some(hint);
        self
    }

    fn check_cancelled(&self) -> Result<(), ParseError> {
        if self.cancel.is_cancelled() {
            Err(ParseError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn hint_for(&self, text: &str) -> PeriodHint {
        self.period
            .or_else(|| PeriodHint::from_text(text))
            .unwrap_or_else(PeriodHint::current)
    }

    /// Run the pipeline on one document.
    pub fn parse(
        &self,
        doc: &RawDocument,
        sink: &dyn ProgressSink,
    ) -> Result<ParseOutcome, ParseError> {
        if doc.bytes.len() as u64 > MAX_UPLOAD_BYTES {
            return Err(ParseError::FileTooLarge {
                size: doc.bytes.len() as u64,
                limit: MAX_UPLOAD_BYTES,
            });
        }
        let kind = DocumentKind::from_filename(&doc.filename)
            .ok_or_else(|| ParseError::UnsupportedFileType(doc.filename.clone()))?;
        self.check_cancelled()?;

        tracing::debug!(filename = %doc.filename, ?kind, "starting pipeline run");
        sink.report(ProgressUpdate::new(
            Stage::Extracting,
            format!("Reading {}", doc.filename),
            0,
        ));

        let outcome = match kind {
            DocumentKind::Csv | DocumentKind::Xls | DocumentKind::Xlsx => {
                self.run_tabular(kind, doc, sink)?
            }
            DocumentKind::Pdf => self.run_pdf(doc, sink)?,
            DocumentKind::Image => self.run_image(doc, sink)?,
            DocumentKind::Text => self.run_text(doc, sink)?,
        };

        if outcome.transactions.is_empty() {
            return Err(ParseError::NoTransactionsFound);
        }
        if !outcome.quality.acceptable() {
            return Err(ParseError::LowQualityExtraction {
                score: outcome.quality.score,
                minimum: MIN_ACCEPTABLE_SCORE,
            });
        }

        sink.report(ProgressUpdate::new(Stage::Scoring, "Finished", 100));
        Ok(outcome)
    }

    fn run_tabular(
        &self,
        kind: DocumentKind,
        doc: &RawDocument,
        sink: &dyn ProgressSink,
    ) -> Result<ParseOutcome, ParseError> {
        let hint = self.period.unwrap_or_else(PeriodHint::current);
        let parsed = tabular::parse_tabular(kind, &doc.bytes, hint)?;
        sink.report(ProgressUpdate::new(
            Stage::Assembling,
            format!("Assembled {} transaction(s)", parsed.transactions.len()),
            70,
        ));
        self.check_cancelled()?;

        // The balance before the first listed transaction stands in for a
        // printed opening balance.
        let starting_balance = parsed
            .transactions
            .first()
            .and_then(|t| t.balance.map(|b| b - t.amount));

        sink.report(ProgressUpdate::new(Stage::Scoring, "Scoring extraction", 90));
        let quality = score_digital(&DigitalChecks {
            transactions: parsed.transactions.len(),
            rows_seen: parsed.stats.rows_seen,
            valid_dates: parsed.stats.valid_dates,
            valid_balances: parsed.stats.valid_balances,
            valid_amounts: parsed.stats.valid_amounts,
            has_starting_balance: starting_balance.is_some(),
            has_interest_rate: false,
        });

        let sample_text = parsed.descriptions.join("\n");
        Ok(ParseOutcome {
            account_kind: detect_account_type(&parsed.descriptions),
            bank: detect_bank(&doc.filename, &sample_text),
            transactions: parsed.transactions,
            mapping: Some(parsed.mapping),
            starting_balance,
            interest_rate: None,
            quality,
        })
    }

    fn run_pdf(
        &self,
        doc: &RawDocument,
        sink: &dyn ProgressSink,
    ) -> Result<ParseOutcome, ParseError> {
        let items = pdf_text::extract_positioned(&doc.bytes, sink, &self.cancel)?;

        if pdf_text::total_chars(&items) < NATIVE_TEXT_MIN_CHARS {
            tracing::debug!("native text below threshold, switching to OCR");
            let text = self.ocr_document_text(doc, sink)?;
            return self.finish_from_text(doc, &text, ScorePath::Scanned, sink);
        }

        sink.report(ProgressUpdate::new(Stage::Reconstructing, "Reconstructing table", 55));
        self.check_cancelled()?;

        let full_text = rows_as_text(&cluster_rows(&items, ReconstructOptions::default()));
        let reconstructed = reconstruct_table(&items, ReconstructOptions::default())
            .or_else(|| reconstruct_table(&items, ReconstructOptions::wide()));

        match reconstructed {
            Some(rows) => {
                sink.report(ProgressUpdate::new(
                    Stage::Assembling,
                    "Assembling transactions",
                    70,
                ));
                let hint = self.hint_for(&full_text);
                let (transactions, stats) = assemble_reconstructed(&rows, hint);
                Ok(self.finish(doc, transactions, stats, &full_text, ScorePath::Digital, sink))
            }
            // No recognizable header anywhere: fall back to pattern
            // matching over the page text in reading order.
            None => self.finish_from_text(doc, &full_text, ScorePath::Digital, sink),
        }
    }

    fn ocr_document_text(
        &self,
        doc: &RawDocument,
        sink: &dyn ProgressSink,
    ) -> Result<String, ParseError> {
        let page_count = pdf_text::page_count(&doc.bytes)?.clamp(1, OCR_PAGE_CAP);
        let mut text = String::new();
        for page in 0..page_count {
            self.check_cancelled()?;
            sink.report(ProgressUpdate::new(
                Stage::Extracting,
                format!("Recognizing page {} of {page_count}", page + 1),
                (10 + (page + 1) * 40 / page_count) as u8,
            ));
            text.push_str(&self.ocr.recognize_pdf_page(&doc.bytes, page)?);
            text.push('\n');
        }
        if text.trim().is_empty() {
            return Err(ParseError::OcrFailure(
                "no text was recognized on any page".to_string(),
            ));
        }
        Ok(text)
    }

    fn run_image(
        &self,
        doc: &RawDocument,
        sink: &dyn ProgressSink,
    ) -> Result<ParseOutcome, ParseError> {
        self.check_cancelled()?;
        sink.report(ProgressUpdate::new(Stage::Extracting, "Recognizing image", 20));
        let text = self.ocr.recognize_image(&doc.bytes)?;
        if text.trim().is_empty() {
            return Err(ParseError::OcrFailure("no text was recognized".to_string()));
        }
        self.finish_from_text(doc, &text, ScorePath::Scanned, sink)
    }

    fn run_text(
        &self,
        doc: &RawDocument,
        sink: &dyn ProgressSink,
    ) -> Result<ParseOutcome, ParseError> {
        let text = String::from_utf8_lossy(&doc.bytes).into_owned();
        self.finish_from_text(doc, &text, ScorePath::Digital, sink)
    }

    fn finish_from_text(
        &self,
        doc: &RawDocument,
        text: &str,
        path: ScorePath,
        sink: &dyn ProgressSink,
    ) -> Result<ParseOutcome, ParseError> {
        sink.report(ProgressUpdate::new(Stage::Assembling, "Matching transaction lines", 70));
        self.check_cancelled()?;
        let hint = self.hint_for(text);
        let (transactions, stats) = assemble_from_text(text, hint);
        Ok(self.finish(doc, transactions, stats, text, path, sink))
    }

    fn finish(
        &self,
        doc: &RawDocument,
        transactions: Vec<ParsedTransaction>,
        stats: AssemblyStats,
        text: &str,
        path: ScorePath,
        sink: &dyn ProgressSink,
    ) -> ParseOutcome {
        let starting_balance = detect_starting_balance(text);
        let interest_rate = detect_interest_rate(text);

        sink.report(ProgressUpdate::new(Stage::Scoring, "Scoring extraction", 90));
        let quality = match path {
            ScorePath::Digital => score_digital(&DigitalChecks {
                transactions: transactions.len(),
                rows_seen: stats.rows_seen,
                valid_dates: stats.valid_dates,
                valid_balances: stats.valid_balances,
                valid_amounts: stats.valid_amounts,
                has_starting_balance: starting_balance.is_some(),
                has_interest_rate: interest_rate.is_some(),
            }),
            ScorePath::Scanned => score_scanned(
                stats.rows_seen,
                stats.valid_dates,
                stats.nontrivial_descriptions,
                stats.valid_balances,
                stats.valid_amounts,
            ),
        };

        let descriptions: Vec<&str> =
            transactions.iter().map(|t| t.description.as_str()).collect();

        ParseOutcome {
            account_kind: detect_account_type(&descriptions),
            bank: detect_bank(&doc.filename, text),
            transactions,
            mapping: None,
            starting_balance,
            interest_rate,
            quality,
        }
    }
}

fn rows_as_text(rows: &[TextRow]) -> String {
    rows.iter().map(|r| r.joined()).collect::<Vec<_>>().join("\n")
}
