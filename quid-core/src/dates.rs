//! Date format inference for statement columns
//!
//! Statements never declare their date format. We test sample values
//! against an ordered candidate table and keep whichever format parses
//! the most of them. UK statements dominate our inputs, so day/month/year
//! variants sit ahead of month/day/year in the table.

use chrono::{Datelike, NaiveDate, NaiveDateTime};

/// Upper bound on how many sample values format detection inspects.
pub const MAX_FORMAT_SAMPLES: usize = 20;

/// Parsed years outside this range are treated as misparses (a
/// month/day/year string read as day/month/year often lands here).
const YEAR_MIN: i32 = 1900;
const YEAR_MAX: i32 = 2100;

/// One candidate date format: a chrono pattern plus whether it carries a
/// time component.
#[derive(Debug, PartialEq, Eq)]
pub struct DateFormat {
    pub pattern: &'static str,
    pub has_time: bool,
}

/// Candidate formats in priority order. Ties in match count resolve to
/// the earlier entry, which is what encodes the UK bias.
pub const DATE_FORMATS: &[DateFormat] = &[
    DateFormat { pattern: "%d/%m/%Y", has_time: false },
    DateFormat { pattern: "%d/%m/%y", has_time: false },
    DateFormat { pattern: "%d-%m-%Y", has_time: false },
    DateFormat { pattern: "%d.%m.%Y", has_time: false },
    DateFormat { pattern: "%m/%d/%Y", has_time: false },
    DateFormat { pattern: "%m/%d/%y", has_time: false },
    DateFormat { pattern: "%Y-%m-%d", has_time: false },
    DateFormat { pattern: "%d %b %Y", has_time: false },
    DateFormat { pattern: "%d %B %Y", has_time: false },
    DateFormat { pattern: "%b %d %Y", has_time: false },
    DateFormat { pattern: "%d/%m/%Y %H:%M", has_time: true },
    DateFormat { pattern: "%d/%m/%Y %H:%M:%S", has_time: true },
    DateFormat { pattern: "%Y-%m-%d %H:%M:%S", has_time: true },
    DateFormat { pattern: "%Y-%m-%dT%H:%M:%S", has_time: true },
];

impl DateFormat {
    /// Parse a single value with this format.
    pub fn parse(&self, value: &str) -> Option<NaiveDate> {
        let value = value.trim();
        if self.has_time {
            NaiveDateTime::parse_from_str(value, self.pattern)
                .ok()
                .map(|dt| dt.date())
        } else {
            NaiveDate::parse_from_str(value, self.pattern).ok()
        }
    }

    fn parses_plausibly(&self, value: &str) -> bool {
        self.parse(value)
            .map(|d| (YEAR_MIN..=YEAR_MAX).contains(&d.year()))
            .unwrap_or(false)
    }
}

/// Pick the format matching the most samples (year range [1900, 2100]).
///
/// Inspects at most [`MAX_FORMAT_SAMPLES`] values. Returns `None` when no
/// candidate parses a single sample.
pub fn detect_date_format<S: AsRef<str>>(samples: &[S]) -> Option<&'static DateFormat> {
    let samples = &samples[..samples.len().min(MAX_FORMAT_SAMPLES)];

    let mut best: Option<(&'static DateFormat, usize)> = None;
    for format in DATE_FORMATS {
        let matches = samples
            .iter()
            .filter(|s| format.parses_plausibly(s.as_ref()))
            .count();
        if matches > 0 && best.map(|(_, n)| matches > n).unwrap_or(true) {
            best = Some((format, matches));
        }
    }
    best.map(|(f, _)| f)
}

/// Result of stripping the time component off a detected format.
///
/// `apply` reparses a value with the original format and reformats it
/// date-only; values the original format cannot parse pass through
/// unchanged.
#[derive(Debug)]
pub struct DateOnly {
    pub format: &'static DateFormat,
    source: &'static DateFormat,
}

impl DateOnly {
    pub fn apply(&self, value: &str) -> String {
        if !self.source.has_time {
            return value.to_string();
        }
        match self.source.parse(value) {
            Some(d) => d.format(self.format.pattern).to_string(),
            None => value.to_string(),
        }
    }
}

/// Derive the date-only counterpart of `format`.
///
/// Time-carrying patterns in [`DATE_FORMATS`] are date patterns extended
/// with a time suffix, so the counterpart is found by prefix.
pub fn date_only(format: &'static DateFormat) -> DateOnly {
    if !format.has_time {
        return DateOnly { format, source: format };
    }
    let prefix = format
        .pattern
        .split_once(" %H")
        .or_else(|| format.pattern.split_once("T%H"))
        .map(|(date_part, _)| date_part)
        .unwrap_or(format.pattern);
    let date_format = DATE_FORMATS
        .iter()
        .find(|f| !f.has_time && f.pattern == prefix)
        .unwrap_or(format);
    DateOnly { format: date_format, source: format }
}

/// The statement period's end point, used to resolve year-less dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodHint {
    pub end_year: i32,
    pub end_month: u32,
}

impl PeriodHint {
    pub fn new(end_year: i32, end_month: u32) -> Self {
        Self { end_year, end_month }
    }

    /// Derive a hint from explicit 4-digit years in the document text.
    /// Statements print the period somewhere ("01 March 2025 to 31 May
    /// 2025"); the largest plausible year is the period end.
    pub fn from_text(text: &str) -> Option<Self> {
        let mut best: Option<i32> = None;
        for token in text.split(|c: char| !c.is_ascii_digit()) {
            if token.len() == 4 {
                if let Ok(year) = token.parse::<i32>() {
                    if (YEAR_MIN..=YEAR_MAX).contains(&year) && best.map(|b| year > b).unwrap_or(true)
                    {
                        best = Some(year);
                    }
                }
            }
        }
        best.map(|year| Self { end_year: year, end_month: 12 })
    }

    /// Hint anchored to today, for documents with no printed year at all.
    pub fn current() -> Self {
        let today = chrono::Utc::now().date_naive();
        Self { end_year: today.year(), end_month: today.month() }
    }
}

/// Resolve the year of a year-less month token against the statement
/// period: months past the period's end month belong to the prior year.
pub fn resolve_year(month: u32, hint: PeriodHint) -> i32 {
    if month > hint.end_month {
        hint.end_year - 1
    } else {
        hint.end_year
    }
}

/// Map a short or full English month name to its number.
pub fn month_number(name: &str) -> Option<u32> {
    let lower = name.to_ascii_lowercase();
    let n = match lower.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(n)
}
