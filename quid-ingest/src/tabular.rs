//! Spreadsheet and CSV statement parsing
//!
//! Tabular inputs arrive as a uniform string grid (csv for text exports,
//! calamine for workbook binaries), the column detector suggests a role
//! mapping, and assembly applies the statement sign conventions: a signed
//! amount column, split debit/credit columns, or balance-delta inference
//! when only a balance column exists.

use quid_core::{ParseError, PeriodHint, detect_date_format, parse_amount};
use std::io::Cursor;

use calamine::{Data, Reader, Xls, Xlsx};
use quid_core::ParsedTransaction;

use crate::assemble::{AssemblyStats, parse_date_cell, signed_amount};
use crate::columns::{ColumnRole, MappingSuggestion, suggest_mapping};
use crate::types::DocumentKind;

/// Everything the tabular path hands back to the orchestrator.
#[derive(Debug, Clone)]
pub struct TabularParse {
    pub transactions: Vec<ParsedTransaction>,
    pub mapping: MappingSuggestion,
    pub stats: AssemblyStats,
    /// Description cells, for account-type detection.
    pub descriptions: Vec<String>,
}

fn unreadable(e: impl std::fmt::Display) -> ParseError {
    ParseError::DocumentUnreadable(e.to_string())
}

/// Load any tabular kind into a row-major string grid.
pub fn load_grid(kind: DocumentKind, bytes: &[u8]) -> Result<Vec<Vec<String>>, ParseError> {
    match kind {
        DocumentKind::Csv => load_csv(bytes),
        DocumentKind::Xls => {
            let workbook = Xls::new(Cursor::new(bytes)).map_err(unreadable)?;
            load_workbook(workbook)
        }
        DocumentKind::Xlsx => {
            let workbook = Xlsx::new(Cursor::new(bytes)).map_err(unreadable)?;
            load_workbook(workbook)
        }
        _ => Err(ParseError::UnsupportedFileType(format!("{kind:?} is not tabular"))),
    }
}

fn load_csv(bytes: &[u8]) -> Result<Vec<Vec<String>>, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_reader(bytes);

    let mut grid = Vec::new();
    for record in reader.records() {
        let record = record.map_err(unreadable)?;
        grid.push(record.iter().map(|cell| cell.trim().to_string()).collect());
    }
    Ok(grid)
}

fn load_workbook<RS, R>(mut workbook: R) -> Result<Vec<Vec<String>>, ParseError>
where
    RS: std::io::Read + std::io::Seek,
    R: Reader<RS>,
    R::Error: std::fmt::Display,
{
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ParseError::DocumentUnreadable("workbook has no sheets".to_string()))?
        .map_err(unreadable)?;
    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect())
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

/// Find the header: the first row naming a date-like column, falling back
/// to the first row with more than one populated cell.
fn locate_header(grid: &[Vec<String>]) -> Option<usize> {
    let scan = grid.len().min(20);
    for (idx, row) in grid[..scan].iter().enumerate() {
        if row.iter().any(|cell| cell.to_lowercase().contains("date")) {
            return Some(idx);
        }
    }
    grid[..scan]
        .iter()
        .position(|row| row.iter().filter(|c| !c.is_empty()).count() > 1)
}

fn column_index(headers: &[String], mapping: &MappingSuggestion, role: ColumnRole) -> Option<usize> {
    let header = mapping.header_for(role)?;
    headers.iter().position(|h| h == header)
}

/// Parse a tabular document end to end.
pub fn parse_tabular(
    kind: DocumentKind,
    bytes: &[u8],
    hint: PeriodHint,
) -> Result<TabularParse, ParseError> {
    let grid = load_grid(kind, bytes)?;
    parse_grid(&grid, hint)
}

pub fn parse_grid(grid: &[Vec<String>], hint: PeriodHint) -> Result<TabularParse, ParseError> {
    let Some(header_idx) = locate_header(grid) else {
        // No header at all still reports the missing mandatory roles.
        return Ok(TabularParse {
            transactions: Vec::new(),
            mapping: suggest_mapping(&[], &[]),
            stats: AssemblyStats::default(),
            descriptions: Vec::new(),
        });
    };

    let headers = &grid[header_idx];
    let data: Vec<&Vec<String>> = grid[header_idx + 1..]
        .iter()
        .filter(|row| row.iter().any(|c| !c.is_empty()))
        .collect();
    let data_owned: Vec<Vec<String>> = data.iter().map(|r| (*r).clone()).collect();
    let mapping = suggest_mapping(headers, &data_owned);

    let date_col = column_index(headers, &mapping, ColumnRole::Date);
    let desc_col = column_index(headers, &mapping, ColumnRole::Description);
    let amount_col = column_index(headers, &mapping, ColumnRole::Amount);
    let debit_col = column_index(headers, &mapping, ColumnRole::Debit);
    let credit_col = column_index(headers, &mapping, ColumnRole::Credit);
    let balance_col = column_index(headers, &mapping, ColumnRole::Balance);

    // A validator-only hit can map Amount onto the balance column (or
    // Description onto the date column); the stronger interpretation wins.
    let amount_col = amount_col.filter(|c| Some(*c) != balance_col);
    let desc_col = desc_col
        .filter(|c| Some(*c) != date_col && Some(*c) != balance_col && Some(*c) != amount_col);

    let cell = |row: &Vec<String>, col: Option<usize>| -> Option<String> {
        col.and_then(|c| row.get(c)).map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
    };

    let date_samples: Vec<String> =
        data.iter().filter_map(|row| cell(row, date_col)).take(20).collect();
    let format = detect_date_format(&date_samples);

    let mut stats = AssemblyStats { rows_seen: data.len(), ..AssemblyStats::default() };
    let mut transactions = Vec::new();
    let mut descriptions = Vec::new();
    let mut previous_balance: Option<f64> = None;

    for row in &data {
        let date = cell(row, date_col).and_then(|value| parse_date_cell(&value, format, hint));
        let description = cell(row, desc_col).unwrap_or_default();
        let balance = cell(row, balance_col)
            .map(|v| parse_amount(&v))
            .filter(|v| v.is_finite());

        // Sign resolution: amount column, then split debit/credit
        // columns, then balance delta.
        let amount = if let Some(value) = cell(row, amount_col) {
            let parsed = signed_amount(&value);
            parsed.is_finite().then_some(parsed)
        } else if debit_col.is_some() || credit_col.is_some() {
            match (cell(row, debit_col), cell(row, credit_col)) {
                (Some(debit), _) if parse_amount(&debit).is_finite() => {
                    Some(parse_amount(&debit).abs())
                }
                (_, Some(credit)) if parse_amount(&credit).is_finite() => {
                    Some(-parse_amount(&credit).abs())
                }
                _ => None,
            }
        } else {
            // First data row has no prior balance to diff against.
            match (previous_balance, balance) {
                (Some(prev), Some(current)) => Some(current - prev),
                _ => None,
            }
        };
        previous_balance = balance.or(previous_balance);

        if date.is_some() {
            stats.valid_dates += 1;
        }
        if amount.is_some() {
            stats.valid_amounts += 1;
        }
        if balance.is_some() {
            stats.valid_balances += 1;
        }
        if description.len() > 3 {
            stats.nontrivial_descriptions += 1;
        }
        if !description.is_empty() {
            descriptions.push(description.clone());
        }

        let (Some(date), Some(amount)) = (date, amount) else {
            tracing::debug!(?row, "dropping tabular row without date and amount");
            continue;
        };

        transactions.push(ParsedTransaction {
            date,
            process_date: None,
            description,
            amount,
            balance,
            creditor: None,
        });
    }

    // The date column exists but nothing in it parsed: surface the
    // correctable condition instead of an opaque empty result.
    if transactions.is_empty() && format.is_none() && !date_samples.is_empty() {
        return Err(ParseError::DateFormatUndetected { sampled: date_samples.len() });
    }

    Ok(TabularParse { transactions, mapping, stats, descriptions })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn hint() -> PeriodHint {
        PeriodHint::new(2025, 6)
    }

    #[test]
    fn test_csv_minimal_date_balance() {
        let csv = b"Date,Balance\n\
01/02/2025,1000.00\n\
03/02/2025,950.00\n\
10/02/2025,900.00\n\
11/02/2025,850.00\n\
20/02/2025,800.00\n";
        let parsed = parse_tabular(DocumentKind::Csv, csv, hint()).unwrap();

        assert_eq!(parsed.mapping.header_for(ColumnRole::Date), Some("Date"));
        assert_eq!(parsed.mapping.header_for(ColumnRole::Balance), Some("Balance"));
        assert!(parsed.mapping.viable());

        // Deltas: four transactions of -50 each; the first row has no
        // prior balance.
        assert_eq!(parsed.transactions.len(), 4);
        assert!(parsed.transactions.iter().all(|t| t.amount == -50.0));
        assert_eq!(parsed.transactions[0].date, NaiveDate::from_ymd_opt(2025, 2, 3).unwrap());
    }

    #[test]
    fn test_csv_full_export_with_debit_credit() {
        let csv = b"Transaction Date,Narrative,Money Out,Money In,Balance\n\
01/02/2025,TESCO STORES 3211,23.40,,976.60\n\
02/02/2025,GREGGS PLC,4.10,,972.50\n\
03/02/2025,PAYROLL ACME LTD,,1500.00,2472.50\n";
        let parsed = parse_tabular(DocumentKind::Csv, csv, hint()).unwrap();

        assert_eq!(parsed.transactions.len(), 3);
        assert_eq!(parsed.transactions[0].amount, 23.40);
        assert_eq!(parsed.transactions[2].amount, -1500.00);
        assert_eq!(parsed.transactions[2].balance, Some(2472.50));
        assert_eq!(parsed.stats.valid_balances, 3);
    }

    #[test]
    fn test_csv_amount_column_with_cr_marker() {
        let csv = b"Date,Description,Amount\n\
01/02/2025,CARD PAYMENT,45.00\n\
02/02/2025,DIRECT DEBIT REFUND,12.00 CR\n";
        let parsed = parse_tabular(DocumentKind::Csv, csv, hint()).unwrap();
        assert_eq!(parsed.transactions[0].amount, 45.00);
        assert_eq!(parsed.transactions[1].amount, -12.00);
    }

    #[test]
    fn test_preamble_rows_before_header() {
        // Export tools prepend blank/metadata rows before the header.
        let csv = b"Statement for account 00112233,,\n,,\nDate,Description,Amount\n\
01/02/2025,COSTA COFFEE,3.20\n";
        let parsed = parse_tabular(DocumentKind::Csv, csv, hint()).unwrap();
        assert_eq!(parsed.transactions.len(), 1);
        assert_eq!(parsed.transactions[0].description, "COSTA COFFEE");
    }

    #[test]
    fn test_undetectable_dates_surface_typed_error() {
        let csv = b"Date,Amount\nnot-a-date,10.00\nstill-not,12.00\n";
        let err = parse_tabular(DocumentKind::Csv, csv, hint()).unwrap_err();
        assert!(matches!(err, ParseError::DateFormatUndetected { sampled: 2 }));
    }

    #[test]
    fn test_empty_grid_yields_empty_parse() {
        let parsed = parse_tabular(DocumentKind::Csv, b"", hint()).unwrap();
        assert!(parsed.transactions.is_empty());
        assert!(!parsed.mapping.viable());
    }
}
