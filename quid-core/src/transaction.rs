//! Normalized transaction types shared by every extraction path

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Normalized output of statement extraction (layout-agnostic)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedTransaction {
    pub date: NaiveDate,
    /// Processing/posting date where the statement separates it from the
    /// transaction date (card statements mostly)
    pub process_date: Option<NaiveDate>,
    pub description: String,
    /// Positive number means charge/spend; negative means credit/repayment.
    pub amount: f64,
    /// Running balance when the statement prints one
    pub balance: Option<f64>,
    /// Creditor/payee label, best effort
    pub creditor: Option<String>,
}

impl ParsedTransaction {
    pub fn new(date: NaiveDate, description: impl Into<String>, amount: f64) -> Self {
        Self {
            date,
            process_date: None,
            description: description.into(),
            amount,
            balance: None,
            creditor: None,
        }
    }
}

/// Account category inferred from statement descriptions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountKind {
    #[serde(rename = "isa")]
    Isa,
    #[serde(rename = "lifetime-isa")]
    LifetimeIsa,
    #[serde(rename = "premium-bonds")]
    PremiumBonds,
    #[serde(rename = "current-account")]
    CurrentAccount,
    #[default]
    #[serde(rename = "savings")]
    Savings,
}

impl AccountKind {
    pub fn label(&self) -> &'static str {
        match self {
            AccountKind::Isa => "ISA",
            AccountKind::LifetimeIsa => "Lifetime ISA",
            AccountKind::PremiumBonds => "Premium Bonds",
            AccountKind::CurrentAccount => "Current Account",
            AccountKind::Savings => "Savings",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_round_trip() {
        let txn = ParsedTransaction {
            date: NaiveDate::from_ymd_opt(2025, 3, 12).unwrap(),
            process_date: None,
            description: "TESCO STORES 3211".to_string(),
            amount: 23.40,
            balance: Some(410.22),
            creditor: None,
        };
        let json = serde_json::to_string(&txn).unwrap();
        let back: ParsedTransaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, txn);
    }

    #[test]
    fn test_account_kind_labels() {
        assert_eq!(AccountKind::default(), AccountKind::Savings);
        assert_eq!(AccountKind::PremiumBonds.label(), "Premium Bonds");
    }
}
