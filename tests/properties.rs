//! Property tests for the aggregation and segmentation laws

use ndarray::Array2;
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use txnsegment::{aggregate_accounts, Normalizer, RawTransaction, Segmenter};

fn raw_rows() -> impl Strategy<Value = Vec<RawTransaction>> {
    // Amounts are whole quarters so every partial sum is exact in any order.
    prop::collection::vec((0u8..8, -20_000i64..20_000, 1950i32..2005), 1..60).prop_map(|rows| {
        rows.into_iter()
            .map(|(account, quarters, birth_year)| {
                RawTransaction::new(
                    format!("acct-{account}"),
                    format!("{:.2}", quarters as f64 / 4.0),
                    "2023-06-01 12:00:00",
                    format!("{birth_year}-01-01"),
                )
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn aggregation_laws(rows in raw_rows()) {
        let txns = Normalizer::new(2024).normalize(&rows).unwrap();
        let accounts = aggregate_accounts(&txns).unwrap();

        // One row per distinct account.
        let distinct: HashSet<&str> = txns.iter().map(|t| t.account_id.as_str()).collect();
        prop_assert_eq!(accounts.len(), distinct.len());

        // Transaction counts are conserved.
        let total: usize = accounts.iter().map(|a| a.total_transactions).sum();
        prop_assert_eq!(total, txns.len());

        // End balance is exactly the signed sum of the account's amounts.
        let mut sums: HashMap<&str, f64> = HashMap::new();
        for t in &txns {
            *sums.entry(t.account_id.as_str()).or_insert(0.0) += t.txn_amount;
        }
        for a in &accounts {
            prop_assert_eq!(a.end_balance, sums[a.account_id.as_str()]);
            prop_assert!(a.average_debit.map_or(true, |d| d < 0.0));
            prop_assert!(a.average_credit.map_or(true, |c| c > 0.0));
        }
    }

    #[test]
    fn segmentation_is_pure_and_repeatable(
        values in prop::collection::vec(-100.0f64..100.0, 16..40),
        k in 2usize..5,
    ) {
        let rows = values.len() / 2;
        let matrix = Array2::from_shape_vec((rows, 2), values[..rows * 2].to_vec()).unwrap();
        let before = matrix.clone();
        let segmenter = Segmenter::default();

        let first = segmenter.segment(&matrix, k).unwrap();
        let _ = segmenter.segment(&matrix, k + 2).unwrap();
        let second = segmenter.segment(&matrix, k).unwrap();

        prop_assert_eq!(&matrix, &before);
        prop_assert_eq!(&first.labels, &second.labels);
        prop_assert!(first.labels.iter().all(|&l| l < k));
    }
}
