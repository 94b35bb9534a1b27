//! Transaction assembly: textual rows to normalized records
//!
//! A transaction needs a valid date and a parseable amount; rows missing
//! either are dropped with a debug trace, never emitted half-filled and
//! never fatal. Sign convention: an explicit CR marker (inline or folded
//! in from a continuation row) negates the magnitude, everything else
//! stays a positive charge.

use chrono::NaiveDate;
use quid_core::{
    DateFormat, ParsedTransaction, PeriodHint, detect_date_format, month_number, parse_amount,
    resolve_year,
};
use regex::Regex;

use crate::types::ReconstructedRow;

/// Counts collected during assembly, feeding the quality scorers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyStats {
    pub rows_seen: usize,
    pub valid_dates: usize,
    pub valid_amounts: usize,
    pub valid_balances: usize,
    pub nontrivial_descriptions: usize,
}

fn is_nontrivial_description(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.len() > 3 && trimmed.chars().any(|c| c.is_alphabetic())
}

/// `"12 Mar"`, `"12 March"` or `"Mar 12"`: day and month with no year.
fn parse_day_month(token: &str) -> Option<(u32, u32)> {
    let parts: Vec<&str> = token.split_whitespace().collect();
    if parts.len() != 2 {
        return None;
    }
    if let Ok(day) = parts[0].parse::<u32>() {
        return month_number(parts[1]).map(|m| (day, m));
    }
    if let Ok(day) = parts[1].parse::<u32>() {
        return month_number(parts[0]).map(|m| (day, m));
    }
    None
}

/// Resolve one date cell: the detected column format first, then a
/// year-less day/month token against the statement period.
pub(crate) fn parse_date_cell(
    cell: &str,
    format: Option<&'static DateFormat>,
    hint: PeriodHint,
) -> Option<NaiveDate> {
    let cell = cell.trim();
    if let Some(fmt) = format {
        if let Some(date) = fmt.parse(cell) {
            return Some(date);
        }
    }
    if let Some((day, month)) = parse_day_month(cell) {
        return NaiveDate::from_ymd_opt(resolve_year(month, hint), month, day);
    }
    None
}

fn has_credit_marker(amount_cell: &str) -> bool {
    Regex::new(r"(?i)\bCR\b")
        .map(|re| re.is_match(amount_cell))
        .unwrap_or(false)
}

pub(crate) fn signed_amount(amount_cell: &str) -> f64 {
    let magnitude = parse_amount(amount_cell);
    if has_credit_marker(amount_cell) {
        -magnitude.abs()
    } else {
        magnitude
    }
}

/// Assemble reconstructed table rows into transactions.
pub fn assemble_reconstructed(
    rows: &[ReconstructedRow],
    hint: PeriodHint,
) -> (Vec<ParsedTransaction>, AssemblyStats) {
    let date_cells: Vec<&str> = rows.iter().filter_map(|r| r.date.as_deref()).collect();
    let format = detect_date_format(&date_cells);

    let mut stats = AssemblyStats { rows_seen: rows.len(), ..AssemblyStats::default() };
    let mut out = Vec::new();

    for row in rows {
        let date = row
            .date
            .as_deref()
            .and_then(|cell| parse_date_cell(cell, format, hint));
        let amount = row.amount.as_deref().map(signed_amount);
        let balance = row
            .balance
            .as_deref()
            .map(parse_amount)
            .filter(|b| b.is_finite());
        let description = row.description_text();

        if date.is_some() {
            stats.valid_dates += 1;
        }
        if amount.map(f64::is_finite).unwrap_or(false) {
            stats.valid_amounts += 1;
        }
        if balance.is_some() {
            stats.valid_balances += 1;
        }
        if is_nontrivial_description(&description) {
            stats.nontrivial_descriptions += 1;
        }

        let (Some(date), Some(amount)) = (date, amount) else {
            tracing::debug!(row = ?row, "dropping row without date and amount");
            continue;
        };
        if !amount.is_finite() {
            tracing::debug!(row = ?row, "dropping row with unparseable amount");
            continue;
        }

        let process_date = row
            .process_date
            .as_deref()
            .and_then(|cell| parse_date_cell(cell, format, hint));

        out.push(ParsedTransaction {
            date,
            process_date,
            description,
            amount,
            balance,
            creditor: None,
        });
    }
    (out, stats)
}

/// Pattern fallback for text with no reconstructable table (OCR output,
/// plain-text exports): one combined expression over every line, matching
/// a date token, free text, and a trailing amount with an optional CR.
pub fn assemble_from_text(text: &str, hint: PeriodHint) -> (Vec<ParsedTransaction>, AssemblyStats) {
    let line_re = Regex::new(concat!(
        r"(?m)^\s*",
        r"(?P<date>\d{1,2}[/.\-]\d{1,2}[/.\-]\d{2,4}",
        r"|\d{1,2}\s+[A-Za-z]{3,9}(?:\s+\d{4})?",
        r"|[A-Za-z]{3,9}\s+\d{1,2})",
        r"\s+(?P<desc>.*?)",
        r"\s+(?P<amount>\(?-?\s?[£$€]?\s?[\d,]+\.\d{2}\)?)",
        r"\s*(?P<cr>CR)?\s*$",
    ))
    .expect("fallback row pattern is valid");

    let date_tokens: Vec<String> = line_re
        .captures_iter(text)
        .map(|c| c["date"].to_string())
        .collect();
    let format = detect_date_format(&date_tokens);

    let mut stats = AssemblyStats::default();
    let mut out = Vec::new();

    for caps in line_re.captures_iter(text) {
        stats.rows_seen += 1;

        let date = parse_date_cell(&caps["date"], format, hint);
        let mut amount = signed_amount(&caps["amount"]);
        if caps.name("cr").is_some() {
            amount = -amount.abs();
        }
        let description = caps["desc"].trim().to_string();

        if date.is_some() {
            stats.valid_dates += 1;
        }
        if amount.is_finite() {
            stats.valid_amounts += 1;
        }
        if is_nontrivial_description(&description) {
            stats.nontrivial_descriptions += 1;
        }

        let Some(date) = date else {
            tracing::debug!(line = &caps["date"], "dropping line with unresolvable date");
            continue;
        };
        if !amount.is_finite() {
            continue;
        }

        out.push(ParsedTransaction::new(date, description, amount));
    }
    (out, stats)
}

/// Opening balance printed above the table, when the statement has one.
pub fn detect_starting_balance(text: &str) -> Option<f64> {
    let re = Regex::new(concat!(
        r"(?i)(?:balance\s+)?(?:brought\s+forward|opening\s+balance|starting\s+balance|",
        r"previous\s+balance|balance\s+from\s+previous\s+statement)",
        r"\D{0,24}?(?P<value>[£$€]?\s?[\d,]+\.\d{2})",
    ))
    .expect("starting balance pattern is valid");
    re.captures(text)
        .map(|c| parse_amount(&c["value"]))
        .filter(|v| v.is_finite())
}

/// An interest/AER percentage quoted anywhere in the document.
pub fn detect_interest_rate(text: &str) -> Option<f64> {
    let contextual = Regex::new(
        r"(?i)(?:interest|rate|AER|APR)[^%\n]{0,40}?(?P<value>\d{1,2}(?:\.\d{1,3})?)\s?%",
    )
    .expect("interest pattern is valid");
    let suffixed = Regex::new(r"(?i)(?P<value>\d{1,2}(?:\.\d{1,3})?)\s?%\s?(?:AER|APR|gross)")
        .expect("suffixed interest pattern is valid");

    contextual
        .captures(text)
        .or_else(|| suffixed.captures(text))
        .and_then(|c| c["value"].parse::<f64>().ok())
}
