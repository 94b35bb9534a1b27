//! Column role detection for tabular statements
//!
//! Spreadsheet exports name their columns a hundred different ways. A
//! typed scoring table maps each header to a semantic role: exact keyword
//! +100, substring keyword +50 each, pattern +30 each, and +20 when the
//! column's sample values satisfy the role's validator. The best header
//! per role wins; a role nothing scores on stays unmapped. New roles are
//! added by extending the table, not by branching.

use quid_core::{AccountKind, detect_date_format, parse_amount};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How many data rows feed the role validators.
pub const ROLE_SAMPLE_ROWS: usize = 10;

/// How many description values the account-type detector inspects.
pub const ACCOUNT_TYPE_SAMPLES: usize = 20;

/// Score for an exact header keyword hit; substring and pattern hits and
/// a validator pass stack on top of it.
const EXACT_SCORE: u32 = 100;
const SUBSTRING_SCORE: u32 = 50;
const PATTERN_SCORE: u32 = 30;
const VALIDATOR_SCORE: u32 = 20;

/// A perfect single hit of every kind; used to normalize confidences
/// into [0,1].
const FULL_SCORE: u32 = EXACT_SCORE + SUBSTRING_SCORE;

/// Semantic roles a source column can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColumnRole {
    Date,
    Description,
    Amount,
    Debit,
    Credit,
    Balance,
    Reference,
}

struct RoleSpec {
    role: ColumnRole,
    exact: &'static [&'static str],
    substrings: &'static [&'static str],
    patterns: &'static [&'static str],
    validator: fn(&[&str]) -> bool,
}

const ROLE_SPECS: &[RoleSpec] = &[
    RoleSpec {
        role: ColumnRole::Date,
        exact: &["date", "transaction date", "trans date", "posting date", "value date"],
        substrings: &["date", "when"],
        patterns: &[r"(?i)^date\b"],
        validator: samples_look_like_dates,
    },
    RoleSpec {
        role: ColumnRole::Description,
        exact: &["description", "details", "transaction details", "narrative", "memo"],
        substrings: &["desc", "detail", "narrat", "reference/description", "particulars"],
        patterns: &[r"(?i)payee|merchant"],
        validator: samples_look_like_descriptions,
    },
    RoleSpec {
        role: ColumnRole::Amount,
        exact: &["amount", "value", "transaction amount"],
        substrings: &["amount", "amt"],
        patterns: &[r"(?i)amount\s*\(?[£$€]", r"(?i)^£"],
        validator: samples_parse_as_numbers,
    },
    RoleSpec {
        role: ColumnRole::Debit,
        exact: &["debit", "money out", "paid out", "withdrawals"],
        substrings: &["debit"],
        patterns: &[r"(?i)paid\s*out|money\s*out|withdraw"],
        validator: samples_parse_as_numbers,
    },
    RoleSpec {
        role: ColumnRole::Credit,
        exact: &["credit", "money in", "paid in", "deposits"],
        substrings: &["credit"],
        patterns: &[r"(?i)paid\s*in|money\s*in|deposit"],
        validator: samples_parse_as_numbers,
    },
    RoleSpec {
        role: ColumnRole::Balance,
        exact: &["balance", "running balance", "closing balance"],
        substrings: &["balance", "bal"],
        patterns: &[r"(?i)balance"],
        validator: samples_parse_as_numbers,
    },
    RoleSpec {
        role: ColumnRole::Reference,
        exact: &["reference", "ref", "transaction id"],
        substrings: &["ref"],
        patterns: &[r"(?i)^ref|transaction\s*id"],
        validator: samples_look_like_references,
    },
];

fn non_empty<'a>(samples: &'a [&'a str]) -> Vec<&'a str> {
    samples.iter().map(|s| s.trim()).filter(|s| !s.is_empty()).collect()
}

fn samples_look_like_dates(samples: &[&str]) -> bool {
    let values = non_empty(samples);
    !values.is_empty() && detect_date_format(&values).is_some()
}

/// Every sampled value must be number-shaped (a single stray text cell
/// disqualifies a balance/amount column). `parse_amount` alone is too
/// permissive here: it ignores separators, so date strings survive it.
fn samples_parse_as_numbers(samples: &[&str]) -> bool {
    let values = non_empty(samples);
    !values.is_empty() && values.iter().all(|v| looks_numeric(v))
}

fn looks_numeric(value: &str) -> bool {
    let re = Regex::new(r"^\(?[-+]?\s?[£$€]?\s?[\d,]+(\.\d{1,4})?\)?(\s?CR)?$");
    re.map(|re| re.is_match(value.trim())).unwrap_or(false) && parse_amount(value).is_finite()
}

/// Descriptions are near-unique free text: cardinality above 30% of the
/// sampled rows, and not a numeric column in disguise.
fn samples_look_like_descriptions(samples: &[&str]) -> bool {
    let values = non_empty(samples);
    if values.is_empty() {
        return false;
    }
    let distinct: HashSet<&str> = values.iter().copied().collect();
    let cardinality = distinct.len() as f32 / values.len() as f32;
    let numeric = values.iter().filter(|v| looks_numeric(v)).count();
    cardinality > 0.3 && numeric * 2 < values.len()
}

fn samples_look_like_references(samples: &[&str]) -> bool {
    let values = non_empty(samples);
    !values.is_empty()
        && values
            .iter()
            .filter(|v| !v.contains(' ') && v.chars().any(|c| c.is_ascii_digit()))
            .count()
            * 2
            >= values.len()
}

/// One suggested role assignment. Confidence is canonical [0,1];
/// presentation layers convert to percentages themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub role: ColumnRole,
    pub header: String,
    pub confidence: f32,
}

/// The detector's suggestion for one tabular document. Missing mandatory
/// roles are reported, never thrown — confirmation is the caller's
/// review step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingSuggestion {
    pub assignments: Vec<RoleAssignment>,
    /// `Date`, and `Amount` standing in for the amount/balance group,
    /// when nothing satisfied them.
    pub missing_mandatory: Vec<ColumnRole>,
}

impl MappingSuggestion {
    pub fn header_for(&self, role: ColumnRole) -> Option<&str> {
        self.assignments
            .iter()
            .find(|a| a.role == role)
            .map(|a| a.header.as_str())
    }

    pub fn viable(&self) -> bool {
        self.missing_mandatory.is_empty()
    }
}

fn score_header(spec: &RoleSpec, header: &str, samples: &[&str]) -> u32 {
    let lower = header.trim().to_lowercase();
    let mut score = 0;

    if spec.exact.iter().any(|k| *k == lower) {
        score += EXACT_SCORE;
    }
    score += spec.substrings.iter().filter(|k| lower.contains(**k)).count() as u32 * SUBSTRING_SCORE;
    score += spec
        .patterns
        .iter()
        .filter(|p| Regex::new(p).map(|re| re.is_match(&lower)).unwrap_or(false))
        .count() as u32
        * PATTERN_SCORE;
    if (spec.validator)(samples) {
        score += VALIDATOR_SCORE;
    }
    score
}

/// Score every (header, role) pair and suggest the best mapping.
///
/// `rows` are data rows aligned with `headers`; only the first
/// [`ROLE_SAMPLE_ROWS`] feed the validators.
pub fn suggest_mapping(headers: &[String], rows: &[Vec<String>]) -> MappingSuggestion {
    let sample_rows = &rows[..rows.len().min(ROLE_SAMPLE_ROWS)];

    let mut assignments = Vec::new();
    for spec in ROLE_SPECS {
        let mut best: Option<(usize, u32)> = None;
        for (idx, header) in headers.iter().enumerate() {
            let samples: Vec<&str> = sample_rows
                .iter()
                .map(|r| r.get(idx).map(String::as_str).unwrap_or(""))
                .collect();
            let score = score_header(spec, header, &samples);
            if score > 0 && best.map(|(_, s)| score > s).unwrap_or(true) {
                best = Some((idx, score));
            }
        }
        if let Some((idx, score)) = best {
            assignments.push(RoleAssignment {
                role: spec.role,
                header: headers[idx].clone(),
                confidence: (score as f32 / FULL_SCORE as f32).min(1.0),
            });
        }
    }

    let has = |role: ColumnRole| assignments.iter().any(|a| a.role == role);
    let mut missing_mandatory = Vec::new();
    if !has(ColumnRole::Date) {
        missing_mandatory.push(ColumnRole::Date);
    }
    let amount_like = has(ColumnRole::Amount)
        || has(ColumnRole::Balance)
        || has(ColumnRole::Debit)
        || has(ColumnRole::Credit);
    if !amount_like {
        missing_mandatory.push(ColumnRole::Amount);
    }

    MappingSuggestion { assignments, missing_mandatory }
}

/// Category keyword sets checked in priority order; first hit wins.
/// `Savings` is the fallback for unrecognized statements.
pub fn detect_account_type<S: AsRef<str>>(descriptions: &[S]) -> AccountKind {
    const RULES: &[(AccountKind, &str)] = &[
        (AccountKind::LifetimeIsa, r"(?i)\blifetime isa\b|\blisa\b"),
        (AccountKind::Isa, r"(?i)\bisa\b|individual savings"),
        (AccountKind::PremiumBonds, r"(?i)premium bonds?|\bernie\b|prize draw"),
        (
            AccountKind::CurrentAccount,
            r"(?i)current account|direct debit|card purchase|standing order|contactless",
        ),
        (AccountKind::Savings, r"(?i)savings|deposit account|easy access"),
    ];

    let joined = descriptions
        .iter()
        .take(ACCOUNT_TYPE_SAMPLES)
        .map(|d| d.as_ref())
        .collect::<Vec<_>>()
        .join("\n");

    for (kind, pattern) in RULES {
        if Regex::new(pattern).map(|re| re.is_match(&joined)).unwrap_or(false) {
            return *kind;
        }
    }
    AccountKind::Savings
}

/// Fixed provider keyword table: filename first, then document text.
pub fn detect_bank(filename: &str, sample_text: &str) -> Option<String> {
    const PROVIDERS: &[(&str, &[&str])] = &[
        ("Barclays", &["barclays"]),
        ("HSBC", &["hsbc"]),
        ("Lloyds", &["lloyds"]),
        ("NatWest", &["natwest", "national westminster"]),
        ("Santander", &["santander"]),
        ("Halifax", &["halifax"]),
        ("Nationwide", &["nationwide"]),
        ("Monzo", &["monzo"]),
        ("Starling", &["starling"]),
        ("NS&I", &["ns&i", "national savings and investments"]),
        ("American Express", &["american express", "amex"]),
        ("Capital One", &["capital one"]),
    ];

    let filename = filename.to_lowercase();
    let text = sample_text.to_lowercase();
    for (name, keywords) in PROVIDERS {
        if keywords.iter().any(|k| filename.contains(k)) {
            return Some((*name).to_string());
        }
    }
    for (name, keywords) in PROVIDERS {
        if keywords.iter().any(|k| text.contains(k)) {
            return Some((*name).to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(headers: &[&str], rows: &[&[&str]]) -> (Vec<String>, Vec<Vec<String>>) {
        (
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_minimal_viable_date_balance_csv() {
        let (headers, rows) = grid(
            &["Date", "Balance"],
            &[
                &["01/02/2025", "1000.00"],
                &["03/02/2025", "950.00"],
                &["10/02/2025", "900.00"],
                &["11/02/2025", "850.00"],
                &["20/02/2025", "800.00"],
            ],
        );
        let mapping = suggest_mapping(&headers, &rows);
        assert_eq!(mapping.header_for(ColumnRole::Date), Some("Date"));
        assert_eq!(mapping.header_for(ColumnRole::Balance), Some("Balance"));
        assert!(mapping.viable(), "no mandatory role should be missing");
    }

    #[test]
    fn test_full_bank_export() {
        let (headers, rows) = grid(
            &["Transaction Date", "Narrative", "Money Out", "Money In", "Balance"],
            &[
                &["01/02/2025", "TESCO STORES 3211", "23.40", "", "976.60"],
                &["02/02/2025", "GREGGS PLC", "4.10", "", "972.50"],
                &["03/02/2025", "PAYROLL ACME LTD", "", "1500.00", "2472.50"],
            ],
        );
        let mapping = suggest_mapping(&headers, &rows);
        assert_eq!(mapping.header_for(ColumnRole::Date), Some("Transaction Date"));
        assert_eq!(mapping.header_for(ColumnRole::Description), Some("Narrative"));
        assert_eq!(mapping.header_for(ColumnRole::Debit), Some("Money Out"));
        assert_eq!(mapping.header_for(ColumnRole::Credit), Some("Money In"));
        assert_eq!(mapping.header_for(ColumnRole::Balance), Some("Balance"));
        assert!(mapping.viable());
    }

    #[test]
    fn test_missing_mandatory_reported_not_thrown() {
        let (headers, rows) = grid(
            &["Narrative", "Reference"],
            &[&["TESCO", "A100"], &["GREGGS", "A101"]],
        );
        let mapping = suggest_mapping(&headers, &rows);
        assert!(!mapping.viable());
        assert!(mapping.missing_mandatory.contains(&ColumnRole::Date));
        assert!(mapping.missing_mandatory.contains(&ColumnRole::Amount));
    }

    #[test]
    fn test_confidence_in_unit_range() {
        let (headers, rows) = grid(
            &["Date", "Amount"],
            &[&["01/02/2025", "12.00"], &["02/02/2025", "13.00"]],
        );
        let mapping = suggest_mapping(&headers, &rows);
        for a in &mapping.assignments {
            assert!((0.0..=1.0).contains(&a.confidence), "{:?}", a);
        }
    }

    #[test]
    fn test_account_type_keywords() {
        let descs = vec!["Lifetime ISA bonus payment".to_string(), "Deposit".to_string()];
        assert_eq!(detect_account_type(&descs), AccountKind::LifetimeIsa);

        let descs = vec!["ISA subscription 2024/25".to_string()];
        assert_eq!(detect_account_type(&descs), AccountKind::Isa);

        let descs = vec!["Premium Bonds prize".to_string()];
        assert_eq!(detect_account_type(&descs), AccountKind::PremiumBonds);

        let descs = vec!["CARD PURCHASE TESCO".to_string()];
        assert_eq!(detect_account_type(&descs), AccountKind::CurrentAccount);

        let descs = vec!["interest earned".to_string()];
        assert_eq!(detect_account_type(&descs), AccountKind::Savings);
    }

    #[test]
    fn test_bank_from_filename_then_text() {
        assert_eq!(
            detect_bank("barclays_jan_2025.pdf", "").as_deref(),
            Some("Barclays")
        );
        assert_eq!(
            detect_bank("statement.pdf", "Monzo Bank Ltd account summary").as_deref(),
            Some("Monzo")
        );
        assert_eq!(detect_bank("statement.pdf", "no provider here"), None);
    }
}
