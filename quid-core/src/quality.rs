//! Extraction quality scoring
//!
//! Every pipeline run ends with a bounded [0,100] score. The score gates
//! success (below [`MIN_ACCEPTABLE_SCORE`] the run fails) and drives the
//! caller's confidence indicator, so it must be cheap, deterministic and
//! monotone in extraction completeness.

use serde::{Deserialize, Serialize};

/// Minimum score for a pipeline run to count as a success.
pub const MIN_ACCEPTABLE_SCORE: u32 = 30;

/// Score plus the raw counts that produced it. Attached 1:1 to a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Bounded [0,100]
    pub score: u32,
    pub rows_found: usize,
    pub valid_dates: usize,
    pub valid_balances: usize,
    pub valid_amounts: usize,
}

impl QualityReport {
    pub fn acceptable(&self) -> bool {
        self.score >= MIN_ACCEPTABLE_SCORE
    }
}

/// Inputs to the digital-statement checklist.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigitalChecks {
    /// Assembled transaction count.
    pub transactions: usize,
    /// Data rows the extractor saw, including ones assembly dropped.
    pub rows_seen: usize,
    pub valid_dates: usize,
    pub valid_balances: usize,
    pub valid_amounts: usize,
    pub has_starting_balance: bool,
    pub has_interest_rate: bool,
}

/// Checklist scorer for the digital/native extraction path.
///
/// Independent weighted checks accumulate from zero: transactions found
/// (+40, +10 more at 5, +10 more at 10), a starting balance (+20), an
/// interest/AER figure (+10), and every seen row carrying a valid date
/// (+10). Capped at 100.
pub fn score_digital(checks: &DigitalChecks) -> QualityReport {
    let mut score: u32 = 0;
    if checks.transactions >= 1 {
        score += 40;
    }
    if checks.transactions >= 5 {
        score += 10;
    }
    if checks.transactions >= 10 {
        score += 10;
    }
    if checks.has_starting_balance {
        score += 20;
    }
    if checks.has_interest_rate {
        score += 10;
    }
    if checks.rows_seen > 0 && checks.valid_dates == checks.rows_seen {
        score += 10;
    }

    QualityReport {
        score: score.min(100),
        rows_found: checks.transactions,
        valid_dates: checks.valid_dates,
        valid_balances: checks.valid_balances,
        valid_amounts: checks.valid_amounts,
    }
}

/// Weighted-ratio scorer for page-rendered/scanned statements.
///
/// Scanned extractions rarely hit every checklist item, so instead of
/// absolute checks each dimension contributes its achieved ratio times a
/// weight, and the sum is scaled to [0,100].
pub fn score_scanned(
    rows_found: usize,
    valid_dates: usize,
    nontrivial_descriptions: usize,
    valid_balances: usize,
    valid_amounts: usize,
) -> QualityReport {
    // weight per dimension: rows present, date validity, description
    // non-triviality, balance presence, amount presence
    const WEIGHTS: [f64; 5] = [30.0, 25.0, 15.0, 15.0, 15.0];

    let ratio = |n: usize| {
        if rows_found == 0 {
            0.0
        } else {
            n as f64 / rows_found as f64
        }
    };

    let achieved = WEIGHTS[0] * if rows_found > 0 { 1.0 } else { 0.0 }
        + WEIGHTS[1] * ratio(valid_dates)
        + WEIGHTS[2] * ratio(nontrivial_descriptions)
        + WEIGHTS[3] * ratio(valid_balances)
        + WEIGHTS[4] * ratio(valid_amounts);
    let maximum: f64 = WEIGHTS.iter().sum();

    QualityReport {
        score: ((achieved / maximum) * 100.0).round().min(100.0) as u32,
        rows_found,
        valid_dates,
        valid_balances,
        valid_amounts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full(n: usize) -> DigitalChecks {
        DigitalChecks {
            transactions: n,
            rows_seen: n,
            valid_dates: n,
            valid_balances: n,
            valid_amounts: n,
            has_starting_balance: false,
            has_interest_rate: false,
        }
    }

    #[test]
    fn test_digital_empty_scores_zero() {
        let report = score_digital(&DigitalChecks::default());
        assert_eq!(report.score, 0);
        assert!(!report.acceptable());
    }

    #[test]
    fn test_digital_checklist_accumulates() {
        // 12 rows, all dated, plus both document signals:
        // 40 + 10 + 10 + 20 + 10 + 10 = 100
        let checks = DigitalChecks {
            has_starting_balance: true,
            has_interest_rate: true,
            ..full(12)
        };
        assert_eq!(score_digital(&checks).score, 100);

        // 3 transactions, one seen row undated: 40 + 20 + 10 = 70
        let checks = DigitalChecks {
            transactions: 3,
            rows_seen: 4,
            valid_dates: 3,
            valid_balances: 3,
            valid_amounts: 3,
            has_starting_balance: true,
            has_interest_rate: true,
        };
        assert_eq!(score_digital(&checks).score, 70);
    }

    #[test]
    fn test_digital_monotone_in_rows() {
        // Adding one more fully-valid transaction never lowers the score.
        let mut last = 0;
        for n in 1..=15 {
            let report = score_digital(&full(n));
            assert!(report.score >= last, "score dropped at {n} rows");
            last = report.score;
        }
    }

    #[test]
    fn test_scanned_ratio_score() {
        // Everything present and valid maxes out.
        let report = score_scanned(10, 10, 10, 10, 10);
        assert_eq!(report.score, 100);

        // No rows at all scores zero.
        assert_eq!(score_scanned(0, 0, 0, 0, 0).score, 0);

        // Dates half-valid, no balances: 30 + 12.5 + 15 + 0 + 15 = 72.5 -> 73
        let report = score_scanned(10, 5, 10, 0, 10);
        assert_eq!(report.score, 73);
        assert!(report.acceptable());
    }

    #[test]
    fn test_threshold() {
        let report = score_digital(&DigitalChecks { transactions: 1, rows_seen: 1, ..DigitalChecks::default() });
        assert_eq!(report.score, 40);
        assert!(report.acceptable());

        let low = QualityReport {
            score: 29,
            rows_found: 0,
            valid_dates: 0,
            valid_balances: 0,
            valid_amounts: 0,
        };
        assert!(!low.acceptable());
    }
}
