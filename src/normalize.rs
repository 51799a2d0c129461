//! Row normalization: raw text records into typed transactions with a derived age

use crate::error::{AnalyticsError, Result};
use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Column names the input table must carry.
pub const REQUIRED_COLUMNS: [&str; 4] = ["account_id", "txn_amount", "txn_ts", "date_of_birth"];

const TIMESTAMP_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// One input row as text, before any parsing. `None` marks an absent cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawTransaction {
    pub account_id: Option<String>,
    pub txn_amount: Option<String>,
    pub txn_ts: Option<String>,
    pub date_of_birth: Option<String>,
}

impl RawTransaction {
    pub fn new(
        account_id: impl Into<String>,
        txn_amount: impl Into<String>,
        txn_ts: impl Into<String>,
        date_of_birth: impl Into<String>,
    ) -> Self {
        Self {
            account_id: Some(account_id.into()),
            txn_amount: Some(txn_amount.into()),
            txn_ts: Some(txn_ts.into()),
            date_of_birth: Some(date_of_birth.into()),
        }
    }
}

/// A parsed transaction. Immutable once produced by [`Normalizer::normalize`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub account_id: String,
    pub txn_amount: f64,
    pub txn_ts: NaiveDateTime,
    pub date_of_birth: NaiveDate,
    /// Reference year minus birth year; month and day are ignored.
    pub age: i32,
}

/// What to do with a row that fails to parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RowPolicy {
    /// Reject the whole input on the first bad row.
    #[default]
    FailFast,
    /// Drop bad rows, logging a warning for each one.
    SkipInvalid,
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    reference_year: i32,
    policy: RowPolicy,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(Local::now().year())
    }
}

impl Normalizer {
    pub fn new(reference_year: i32) -> Self {
        Self {
            reference_year,
            policy: RowPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RowPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn reference_year(&self) -> i32 {
        self.reference_year
    }

    pub fn policy(&self) -> RowPolicy {
        self.policy
    }

    /// Parse every row. Fails with [`AnalyticsError::EmptyInput`] when nothing survives.
    pub fn normalize(&self, rows: &[RawTransaction]) -> Result<Vec<Transaction>> {
        let mut transactions = Vec::with_capacity(rows.len());
        let mut skipped = 0usize;

        for (record, row) in rows.iter().enumerate() {
            match self.normalize_row(record, row) {
                Ok(txn) => transactions.push(txn),
                Err(err) if self.policy == RowPolicy::SkipInvalid && err.is_parse_error() => {
                    log::warn!("skipping {err}");
                    skipped += 1;
                }
                Err(err) => return Err(err),
            }
        }

        if skipped > 0 {
            log::warn!("skipped {skipped} of {} rows", rows.len());
        }
        if transactions.is_empty() {
            return Err(AnalyticsError::EmptyInput);
        }

        log::debug!(
            "normalized {} transactions (reference year {})",
            transactions.len(),
            self.reference_year
        );
        Ok(transactions)
    }

    fn normalize_row(&self, record: usize, row: &RawTransaction) -> Result<Transaction> {
        let account_id = required(record, "account_id", &row.account_id)?.to_string();

        let amount_text = required(record, "txn_amount", &row.txn_amount)?;
        let txn_amount = amount_text
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| AnalyticsError::Parse {
                record,
                field: "txn_amount",
                reason: format!("is not a finite number: '{amount_text}'"),
            })?;

        let ts_text = required(record, "txn_ts", &row.txn_ts)?;
        let txn_ts = parse_timestamp(ts_text).ok_or_else(|| AnalyticsError::Parse {
            record,
            field: "txn_ts",
            reason: format!("is not a timestamp: '{ts_text}'"),
        })?;

        let dob_text = required(record, "date_of_birth", &row.date_of_birth)?;
        let date_of_birth = parse_date(dob_text).ok_or_else(|| AnalyticsError::Parse {
            record,
            field: "date_of_birth",
            reason: format!("is not a date: '{dob_text}'"),
        })?;

        Ok(Transaction {
            account_id,
            txn_amount,
            txn_ts,
            date_of_birth,
            age: self.reference_year - date_of_birth.year(),
        })
    }
}

fn required<'a>(
    record: usize,
    field: &'static str,
    value: &'a Option<String>,
) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text),
        _ => Err(AnalyticsError::Parse {
            record,
            field,
            reason: "is missing".to_string(),
        }),
    }
}

/// Parse a timestamp; a bare date maps to midnight.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| parse_plain_date(text).map(|d| d.and_time(NaiveTime::MIN)))
}

/// Parse a calendar date; a full timestamp is accepted and truncated to its date.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    parse_plain_date(text).or_else(|| parse_timestamp(text).map(|ts| ts.date()))
}

fn parse_plain_date(text: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, amount: &str, ts: &str, dob: &str) -> RawTransaction {
        RawTransaction::new(id, amount, ts, dob)
    }

    #[test]
    fn test_normalize_derives_age_from_year_only() {
        let normalizer = Normalizer::new(2024);
        let txns = normalizer
            .normalize(&[row("A", "100", "2023-01-01", "1990-12-31")])
            .unwrap();

        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0].age, 34);
        assert_eq!(txns[0].txn_amount, 100.0);
        assert_eq!(
            txns[0].txn_ts,
            NaiveDate::from_ymd_opt(2023, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2023, 2, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        for text in [
            "2023-02-01 08:30:00",
            "2023-02-01T08:30:00",
            "2023-02-01T08:30:00Z",
            "2023-02-01 08:30",
            "02/01/2023 08:30:00",
        ] {
            assert_eq!(parse_timestamp(text), Some(expected), "{text}");
        }
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_date_accepts_timestamp_text() {
        let expected = NaiveDate::from_ymd_opt(1985, 6, 15);
        assert_eq!(parse_date("1985-06-15"), expected);
        assert_eq!(parse_date("06/15/1985"), expected);
        assert_eq!(parse_date("1985-06-15 00:00:00"), expected);
        assert!(parse_date("1985-13-40").is_none());
    }

    #[test]
    fn test_fail_fast_on_bad_row() {
        let normalizer = Normalizer::new(2024);
        let rows = [
            row("A", "100", "2023-01-01", "1990-01-01"),
            row("B", "abc", "2023-01-01", "1990-01-01"),
        ];

        let err = normalizer.normalize(&rows).unwrap_err();
        match err {
            AnalyticsError::Parse { record, field, .. } => {
                assert_eq!(record, 1);
                assert_eq!(field, "txn_amount");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_non_finite_amount_and_missing_fields() {
        let normalizer = Normalizer::new(2024);
        assert!(normalizer
            .normalize(&[row("A", "NaN", "2023-01-01", "1990-01-01")])
            .unwrap_err()
            .is_parse_error());

        let mut missing = row("A", "1", "2023-01-01", "1990-01-01");
        missing.date_of_birth = None;
        assert!(normalizer.normalize(&[missing]).unwrap_err().is_parse_error());

        let blank_id = row("  ", "1", "2023-01-01", "1990-01-01");
        assert!(normalizer.normalize(&[blank_id]).unwrap_err().is_parse_error());
    }

    #[test]
    fn test_skip_invalid_policy() {
        let normalizer = Normalizer::new(2024).with_policy(RowPolicy::SkipInvalid);
        let rows = [
            row("A", "100", "2023-01-01", "1990-01-01"),
            row("B", "50", "not a date", "1990-01-01"),
        ];

        let txns = normalizer.normalize(&rows).unwrap();
        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0].account_id, "A");
    }

    #[test]
    fn test_empty_input() {
        let normalizer = Normalizer::new(2024);
        assert!(matches!(
            normalizer.normalize(&[]),
            Err(AnalyticsError::EmptyInput)
        ));

        let lenient = Normalizer::new(2024).with_policy(RowPolicy::SkipInvalid);
        let rows = [row("A", "x", "2023-01-01", "1990-01-01")];
        assert!(matches!(
            lenient.normalize(&rows),
            Err(AnalyticsError::EmptyInput)
        ));
    }
}
