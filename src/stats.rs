//! Descriptive statistics, percentile trimming and histogram binning

use crate::aggregate::AccountAggregate;
use crate::error::{AnalyticsError, Result};
use crate::features::Feature;
use crate::normalize::Transaction;
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;

/// count / mean / std / min / quartiles / max for one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub name: String,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; undefined for a single value.
    pub std: Option<f64>,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

/// One equal-width histogram bin. The last bin of a histogram is closed on the right.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Summarize `values`, which must be non-empty and finite.
pub fn describe(name: &str, values: &[f64]) -> Result<Summary> {
    if values.is_empty() {
        return Err(AnalyticsError::EmptyInput);
    }
    let sorted = sorted_finite(values)?;
    let count = sorted.len();
    let mean = sorted.iter().sum::<f64>() / count as f64;
    let std = (count > 1).then(|| {
        let ss: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (count - 1) as f64).sqrt()
    });

    Ok(Summary {
        name: name.to_string(),
        count,
        mean,
        std,
        min: sorted[0],
        q25: quantile_sorted(&sorted, 0.25),
        median: quantile_sorted(&sorted, 0.5),
        q75: quantile_sorted(&sorted, 0.75),
        max: sorted[count - 1],
    })
}

/// Quantile with linear interpolation between closest ranks.
pub fn quantile(values: &[f64], q: f64) -> Result<f64> {
    validate_fraction(q)?;
    if values.is_empty() {
        return Err(AnalyticsError::EmptyInput);
    }
    Ok(quantile_sorted(&sorted_finite(values)?, q))
}

fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Keep the values inside the closed interval between the `lower` and `upper`
/// quantiles, preserving input order.
pub fn trim_to_quantiles(values: &[f64], lower: f64, upper: f64) -> Result<Vec<f64>> {
    validate_fraction(lower)?;
    validate_fraction(upper)?;
    if lower > upper {
        return Err(AnalyticsError::InvalidParameter(format!(
            "lower trim bound {lower} exceeds upper bound {upper}"
        )));
    }
    if values.is_empty() {
        return Err(AnalyticsError::EmptyInput);
    }

    let sorted = sorted_finite(values)?;
    let lo = quantile_sorted(&sorted, lower);
    let hi = quantile_sorted(&sorted, upper);
    Ok(values.iter().copied().filter(|v| (lo..=hi).contains(v)).collect())
}

/// Equal-width histogram over `[min, max]`.
///
/// A constant input `v` yields `bins` bins spanning `[v - 0.5, v + 0.5]`,
/// with every value counted in the bin that holds `v`.
pub fn histogram(values: &[f64], bins: usize) -> Result<Vec<Bin>> {
    if bins == 0 {
        return Err(AnalyticsError::InvalidParameter(
            "histogram needs at least one bin".to_string(),
        ));
    }
    if values.is_empty() {
        return Err(AnalyticsError::EmptyInput);
    }
    let sorted = sorted_finite(values)?;

    let (mut min, mut max) = (sorted[0], sorted[sorted.len() - 1]);
    if min == max {
        min -= 0.5;
        max += 0.5;
    }
    let width = (max - min) / bins as f64;

    let mut counts = vec![0usize; bins];
    for v in &sorted {
        let idx = (((v - min) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    Ok(counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| Bin {
            lower: min + width * i as f64,
            upper: if i + 1 == bins { max } else { min + width * (i + 1) as f64 },
            count,
        })
        .collect())
}

/// Count occurrences of each distinct value.
pub fn value_counts<K: Ord>(values: impl IntoIterator<Item = K>) -> BTreeMap<K, usize> {
    let mut counts = BTreeMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    counts
}

fn validate_fraction(q: f64) -> Result<()> {
    if (0.0..=1.0).contains(&q) {
        Ok(())
    } else {
        Err(AnalyticsError::InvalidParameter(format!(
            "quantile {q} is outside [0, 1]"
        )))
    }
}

fn sorted_finite(values: &[f64]) -> Result<Vec<f64>> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(AnalyticsError::InvalidParameter(
            "statistics require finite values".to_string(),
        ));
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Ok(sorted)
}

/// Distribution summaries over transactions and accounts.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsReporter {
    /// Lower quantile kept by the amount trim (default 1st percentile).
    pub trim_lower: f64,
    /// Upper quantile kept by the amount trim (default 99th percentile).
    pub trim_upper: f64,
    /// Bins for the transaction-level age histogram.
    pub age_bins: usize,
    /// Bins for the trimmed amount histogram.
    pub amount_bins: usize,
    /// Bins for the end balance histogram.
    pub balance_bins: usize,
    /// Bins for the transactions-per-user histogram.
    pub transactions_bins: usize,
}

impl Default for StatisticsReporter {
    fn default() -> Self {
        Self {
            trim_lower: 0.01,
            trim_upper: 0.99,
            age_bins: 30,
            amount_bins: 50,
            balance_bins: 50,
            transactions_bins: 50,
        }
    }
}

impl StatisticsReporter {
    pub fn with_trim(mut self, lower: f64, upper: f64) -> Self {
        self.trim_lower = lower;
        self.trim_upper = upper;
        self
    }

    /// Summary of a transaction column: `txn_amount` or `age`.
    pub fn transaction_summary(
        &self,
        transactions: &[Transaction],
        column: &str,
    ) -> Result<Summary> {
        let values: Vec<f64> = match column {
            "txn_amount" => transactions.iter().map(|t| t.txn_amount).collect(),
            "age" => transactions.iter().map(|t| f64::from(t.age)).collect(),
            other => {
                return Err(AnalyticsError::InvalidParameter(format!(
                    "unknown transaction column '{other}'"
                )))
            }
        };
        describe(column, &values)
    }

    /// Summary of a numeric account column; missing values are left out.
    pub fn account_summary(&self, accounts: &[AccountAggregate], column: &str) -> Result<Summary> {
        let feature = Feature::from_str(column)?;
        let values: Vec<f64> = accounts.iter().filter_map(|a| feature.value(a)).collect();
        describe(feature.name(), &values)
    }

    /// Age, amount and transactions-per-user summaries, in that order.
    pub fn standard_summaries(
        &self,
        transactions: &[Transaction],
        accounts: &[AccountAggregate],
    ) -> Result<Vec<Summary>> {
        Ok(vec![
            self.transaction_summary(transactions, "age")?,
            self.transaction_summary(transactions, "txn_amount")?,
            self.account_summary(accounts, Feature::TotalTransactions.name())?,
        ])
    }

    /// Amounts between the configured trim quantiles, for display only.
    pub fn trimmed_amounts(&self, transactions: &[Transaction]) -> Result<Vec<f64>> {
        let amounts: Vec<f64> = transactions.iter().map(|t| t.txn_amount).collect();
        trim_to_quantiles(&amounts, self.trim_lower, self.trim_upper)
    }

    pub fn age_histogram(&self, transactions: &[Transaction]) -> Result<Vec<Bin>> {
        let ages: Vec<f64> = transactions.iter().map(|t| f64::from(t.age)).collect();
        histogram(&ages, self.age_bins)
    }

    /// Number of account holders at each age.
    pub fn account_age_counts(&self, accounts: &[AccountAggregate]) -> BTreeMap<i32, usize> {
        value_counts(accounts.iter().map(|a| a.age))
    }

    pub fn amount_histogram(&self, transactions: &[Transaction]) -> Result<Vec<Bin>> {
        histogram(&self.trimmed_amounts(transactions)?, self.amount_bins)
    }

    pub fn end_balance_histogram(&self, accounts: &[AccountAggregate]) -> Result<Vec<Bin>> {
        let balances: Vec<f64> = accounts.iter().map(|a| a.end_balance).collect();
        histogram(&balances, self.balance_bins)
    }

    pub fn transactions_per_user_histogram(
        &self,
        accounts: &[AccountAggregate],
    ) -> Result<Vec<Bin>> {
        let counts: Vec<f64> = accounts.iter().map(|a| a.total_transactions as f64).collect();
        histogram(&counts, self.transactions_bins)
    }
}
