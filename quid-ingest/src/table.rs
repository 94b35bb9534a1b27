//! Table reconstruction from positioned text
//!
//! Native PDF extraction yields text fragments with coordinates but no
//! table structure. Reconstruction runs in three passes: cluster fragments
//! into visual rows by vertical proximity, find the header row(s) and bind
//! a column anchor per semantic role, then assign every data item to the
//! nearest anchor.

use regex::Regex;

use crate::types::{AnchorRole, ColumnAnchor, PositionedTextItem, ReconstructedRow, TextRow};

/// Vertical window for two fragments to share a row. PDF statement body
/// text sits on baselines 9–12 units apart, so 3 units separates rows
/// while absorbing sub-unit baseline jitter.
pub const ROW_CLUSTER_TOLERANCE: f32 = 3.0;

/// Wider clustering window for noisier multi-column layouts where cells
/// of one logical row sit on slightly different baselines.
pub const WIDE_ROW_CLUSTER_TOLERANCE: f32 = 8.0;

/// Maximum horizontal distance between an item and an anchor. Statement
/// columns are at least ~100 units apart at 10 pt, so half of that keeps
/// assignment unambiguous while tolerating right-aligned numerics.
pub const ANCHOR_MATCH_TOLERANCE: f32 = 50.0;

/// Tunable tolerances for one reconstruction pass.
#[derive(Debug, Clone, Copy)]
pub struct ReconstructOptions {
    pub row_tolerance: f32,
    pub anchor_tolerance: f32,
}

impl Default for ReconstructOptions {
    fn default() -> Self {
        Self { row_tolerance: ROW_CLUSTER_TOLERANCE, anchor_tolerance: ANCHOR_MATCH_TOLERANCE }
    }
}

impl ReconstructOptions {
    pub fn wide() -> Self {
        Self { row_tolerance: WIDE_ROW_CLUSTER_TOLERANCE, ..Self::default() }
    }
}

/// Group items into rows by vertical proximity: an item joins the first
/// row on its page whose lead item is within tolerance, otherwise it
/// opens a new row. Every item lands in exactly one row. Rows come back
/// ordered page-first then top-to-bottom (descending y), items
/// left-to-right.
pub fn cluster_rows(items: &[PositionedTextItem], options: ReconstructOptions) -> Vec<TextRow> {
    let mut rows: Vec<TextRow> = Vec::new();

    for item in items {
        let slot = rows.iter_mut().find(|row| {
            row.page() == item.page && (row.y() - item.y).abs() <= options.row_tolerance
        });
        match slot {
            Some(row) => row.items.push(item.clone()),
            None => rows.push(TextRow { items: vec![item.clone()] }),
        }
    }

    for row in &mut rows {
        row.items
            .sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));
    }
    rows.sort_by(|a, b| {
        a.page()
            .cmp(&b.page())
            .then(b.y().partial_cmp(&a.y()).unwrap_or(std::cmp::Ordering::Equal))
    });
    rows
}

fn is_date_header(text: &str) -> bool {
    text.to_lowercase().contains("date")
}

fn is_description_header(text: &str) -> bool {
    let lower = text.to_lowercase();
    ["description", "details", "narrative", "particulars"]
        .iter()
        .any(|k| lower.contains(k))
}

fn is_amount_header(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("amount")
        || lower.contains('£')
        || lower.contains("money out")
        || lower.contains("paid out")
}

fn is_balance_header(text: &str) -> bool {
    text.to_lowercase().contains("balance")
}

/// A detected header: the role anchors plus where data rows begin.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderMatch {
    pub anchors: Vec<ColumnAnchor>,
    pub data_start: usize,
}

impl HeaderMatch {
    pub fn anchor(&self, role: AnchorRole) -> Option<ColumnAnchor> {
        self.anchors.iter().copied().find(|a| a.role == role)
    }
}

fn collect_anchors(rows: &[&TextRow]) -> Vec<ColumnAnchor> {
    let mut anchors: Vec<ColumnAnchor> = Vec::new();
    let mut push = |role: AnchorRole, x: f32| {
        if !anchors.iter().any(|a| a.role == role) {
            anchors.push(ColumnAnchor { role, x });
        }
    };

    let mut date_seen = false;
    for row in rows {
        for item in &row.items {
            if is_date_header(&item.text) {
                if !date_seen {
                    push(AnchorRole::TransactionDate, item.x);
                    date_seen = true;
                } else {
                    push(AnchorRole::ProcessDate, item.x);
                }
            } else if is_description_header(&item.text) {
                push(AnchorRole::Description, item.x);
            } else if is_balance_header(&item.text) {
                push(AnchorRole::Balance, item.x);
            } else if is_amount_header(&item.text) {
                push(AnchorRole::Amount, item.x);
            }
        }
    }
    anchors
}

/// Scan rows for the table header.
///
/// A row carrying date-like, description-like and amount-like tokens is a
/// complete header. When the amount/currency marker sits alone on the next
/// visual row (the split-header layout some providers print), both rows
/// jointly form the header and data begins one row later still.
pub fn find_header(rows: &[TextRow]) -> Option<HeaderMatch> {
    for (idx, row) in rows.iter().enumerate() {
        let has_date = row.items.iter().any(|i| is_date_header(&i.text));
        let has_desc = row.items.iter().any(|i| is_description_header(&i.text));
        if !(has_date && has_desc) {
            continue;
        }

        let has_amount = row.items.iter().any(|i| is_amount_header(&i.text));
        if has_amount {
            return Some(HeaderMatch {
                anchors: collect_anchors(&[row]),
                data_start: idx + 1,
            });
        }

        // Split header: amount marker on the immediately following row.
        if let Some(next) = rows.get(idx + 1) {
            if next.items.iter().any(|i| is_amount_header(&i.text)) {
                return Some(HeaderMatch {
                    anchors: collect_anchors(&[row, next]),
                    data_start: idx + 2,
                });
            }
        }
    }
    None
}

/// Non-data rows a statement repeats between transactions.
fn is_skippable(row: &TextRow) -> bool {
    let joined = row.joined();
    let header_like = row.items.iter().any(|i| is_date_header(&i.text))
        && row.items.iter().any(|i| is_description_header(&i.text));
    if header_like {
        return true;
    }
    let banner =
        Regex::new(r"(?i)^(page \d+ of \d+|continued( overleaf)?|transaction details|your transactions)$");
    banner.map(|re| re.is_match(joined.trim())).unwrap_or(false)
}

fn is_credit_marker(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.eq_ignore_ascii_case("cr") || trimmed.eq_ignore_ascii_case("credit")
}

/// Assign every data row's items to the nearest anchor.
///
/// Items matching no anchor within tolerance default to the description
/// column (the widest, left-dominant one). A row holding only a credit
/// marker under the amount anchor is folded into the preceding
/// transaction's amount instead of opening a new row.
pub fn assign_columns(
    rows: &[TextRow],
    header: &HeaderMatch,
    options: ReconstructOptions,
) -> Vec<ReconstructedRow> {
    let mut out: Vec<ReconstructedRow> = Vec::new();

    for row in rows {
        if is_skippable(row) {
            tracing::debug!(row = %row.joined(), "skipping non-data row");
            continue;
        }

        // Continuation: a lone credit marker modifying the prior row.
        if row.items.len() == 1 && is_credit_marker(&row.items[0].text) {
            if let Some(prev) = out.last_mut() {
                if let Some(amount) = prev.amount.take() {
                    prev.amount = Some(format!("{amount} CR"));
                }
            }
            continue;
        }

        let mut rec = ReconstructedRow { page: row.page(), ..ReconstructedRow::default() };
        for item in &row.items {
            let nearest = header
                .anchors
                .iter()
                .map(|a| (a, (a.x - item.x).abs()))
                .filter(|(_, d)| *d <= options.anchor_tolerance)
                .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

            let slot = match nearest {
                Some((anchor, _)) => anchor.role,
                None => AnchorRole::Description,
            };
            match slot {
                AnchorRole::TransactionDate if rec.date.is_none() => {
                    rec.date = Some(item.text.clone())
                }
                AnchorRole::ProcessDate if rec.process_date.is_none() => {
                    rec.process_date = Some(item.text.clone())
                }
                AnchorRole::Amount if rec.amount.is_none() => {
                    rec.amount = Some(item.text.clone())
                }
                AnchorRole::Balance if rec.balance.is_none() => {
                    rec.balance = Some(item.text.clone())
                }
                _ => rec.description.push(item.text.clone()),
            }
        }

        if !rec.description.is_empty()
            || rec.date.is_some()
            || rec.amount.is_some()
            || rec.balance.is_some()
        {
            out.push(rec);
        }
    }
    out
}

/// Full reconstruction: cluster, locate the header, assign columns.
/// `None` when no header row exists (the caller falls back to pattern
/// matching over plain text).
pub fn reconstruct_table(
    items: &[PositionedTextItem],
    options: ReconstructOptions,
) -> Option<Vec<ReconstructedRow>> {
    let rows = cluster_rows(items, options);
    let header = find_header(&rows)?;
    Some(assign_columns(&rows[header.data_start..], &header, options))
}
