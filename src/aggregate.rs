//! Per-account aggregation of normalized transactions

use crate::error::{AnalyticsError, Result};
use crate::normalize::Transaction;
use polars::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;

/// Summary features for one account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountAggregate {
    pub account_id: String,
    pub total_transactions: usize,
    pub average_transaction_size: f64,
    /// Signed sum of all amounts, assuming a zero opening balance.
    pub end_balance: f64,
    /// `None` when the account has no debits.
    pub average_debit: Option<f64>,
    /// `None` when the account has no credits.
    pub average_credit: Option<f64>,
    pub age: i32,
}

/// Build a frame with one row per transaction: `account_id`, `txn_amount`, `age`.
pub fn transactions_frame(transactions: &[Transaction]) -> Result<DataFrame> {
    let account_ids: Vec<&str> = transactions.iter().map(|t| t.account_id.as_str()).collect();
    let amounts: Vec<f64> = transactions.iter().map(|t| t.txn_amount).collect();
    let ages: Vec<i64> = transactions.iter().map(|t| i64::from(t.age)).collect();

    let df = df!(
        "account_id" => account_ids,
        "txn_amount" => amounts,
        "age" => ages
    )?;
    Ok(df)
}

/// Group transactions by account.
///
/// # Arguments
/// * `transactions` - Normalized transactions, in input order
///
/// # Returns
/// One aggregate per distinct account, sorted by id; ids that are both
/// integers compare numerically. The first age seen for an account wins.
pub fn aggregate_accounts(transactions: &[Transaction]) -> Result<Vec<AccountAggregate>> {
    if transactions.is_empty() {
        return Err(AnalyticsError::EmptyInput);
    }

    let amount = || col("txn_amount");
    let grouped = transactions_frame(transactions)?
        .lazy()
        .group_by_stable([col("account_id")])
        .agg([
            amount()
                .count()
                .cast(DataType::Int64)
                .alias("total_transactions"),
            amount().mean().alias("average_transaction_size"),
            amount().sum().alias("end_balance"),
            amount()
                .filter(amount().lt(lit(0.0)))
                .mean()
                .alias("average_debit"),
            amount()
                .filter(amount().gt(lit(0.0)))
                .mean()
                .alias("average_credit"),
            col("age").first().alias("age"),
        ])
        .collect()?;

    let mut accounts = accounts_from_frame(&grouped)?;
    accounts.sort_by(|a, b| compare_account_ids(&a.account_id, &b.account_id));

    log::debug!(
        "aggregated {} transactions into {} accounts",
        transactions.len(),
        accounts.len()
    );
    Ok(accounts)
}

fn accounts_from_frame(df: &DataFrame) -> Result<Vec<AccountAggregate>> {
    let ids = df.column("account_id")?.str()?;
    let counts = df.column("total_transactions")?.i64()?;
    let means = df.column("average_transaction_size")?.f64()?;
    let balances = df.column("end_balance")?.f64()?;
    let debits = df.column("average_debit")?.f64()?;
    let credits = df.column("average_credit")?.f64()?;
    let ages = df.column("age")?.i64()?;

    (0..df.height())
        .map(|row| -> Result<AccountAggregate> {
            let age = required(ages.get(row), "age")?;
            Ok(AccountAggregate {
                account_id: required(ids.get(row), "account_id")?.to_string(),
                total_transactions: required(counts.get(row), "total_transactions")? as usize,
                average_transaction_size: required(means.get(row), "average_transaction_size")?,
                end_balance: required(balances.get(row), "end_balance")?,
                average_debit: debits.get(row),
                average_credit: credits.get(row),
                age: i32::try_from(age).map_err(|_| {
                    AnalyticsError::InvalidParameter(format!("age {age} is out of range"))
                })?,
            })
        })
        .collect()
}

fn required<T>(value: Option<T>, column: &str) -> Result<T> {
    value.ok_or_else(|| {
        AnalyticsError::InvalidParameter(format!("aggregate column '{column}' has a null value"))
    })
}

/// Order account ids numerically when both parse as integers, lexically otherwise.
pub fn compare_account_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
