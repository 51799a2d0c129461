//! Caller-facing output tables: labeled accounts, cluster profiles and
//! histogram-ready distributions

use crate::aggregate::AccountAggregate;
use crate::error::{AnalyticsError, Result};
use crate::features::Feature;
use crate::model::Segmentation;
use crate::stats::{value_counts, Bin, Summary};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// An account row with its cluster label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledAccount {
    #[serde(flatten)]
    pub account: AccountAggregate,
    pub cluster: usize,
}

/// Size and raw-unit feature means of one cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterProfile {
    pub cluster: usize,
    pub size: usize,
    /// Feature name to mean over the cluster's members; missing values are skipped.
    pub feature_means: BTreeMap<&'static str, Option<f64>>,
}

/// Point for an average-transaction-size vs end-balance scatter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub average_transaction_size: f64,
    pub end_balance: f64,
    pub cluster: usize,
}

/// Everything one clustering run hands back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentedAccounts {
    pub n_clusters: usize,
    pub inertia: f64,
    pub centroids: Vec<Vec<f64>>,
    pub accounts: Vec<LabeledAccount>,
    pub cluster_sizes: BTreeMap<usize, usize>,
    pub profiles: Vec<ClusterProfile>,
}

impl SegmentedAccounts {
    /// Join cluster labels onto the aggregate table row by row.
    pub fn build(
        accounts: &[AccountAggregate],
        segmentation: &Segmentation,
        features: &[Feature],
    ) -> Result<Self> {
        if accounts.len() != segmentation.labels.len() {
            return Err(AnalyticsError::InvalidParameter(format!(
                "{} accounts but {} cluster labels",
                accounts.len(),
                segmentation.labels.len()
            )));
        }

        let labeled: Vec<LabeledAccount> = accounts
            .iter()
            .zip(segmentation.labels.iter())
            .map(|(account, &cluster)| LabeledAccount {
                account: account.clone(),
                cluster,
            })
            .collect();

        let profiles = (0..segmentation.n_clusters)
            .map(|cluster| cluster_profile(&labeled, cluster, features))
            .collect();

        Ok(Self {
            n_clusters: segmentation.n_clusters,
            inertia: segmentation.inertia,
            centroids: segmentation
                .centroids
                .outer_iter()
                .map(|row| row.to_vec())
                .collect(),
            cluster_sizes: value_counts(labeled.iter().map(|a| a.cluster)),
            accounts: labeled,
            profiles,
        })
    }

    pub fn scatter_points(&self) -> Vec<ScatterPoint> {
        self.accounts
            .iter()
            .map(|a| ScatterPoint {
                average_transaction_size: a.account.average_transaction_size,
                end_balance: a.account.end_balance,
                cluster: a.cluster,
            })
            .collect()
    }
}

fn cluster_profile(
    labeled: &[LabeledAccount],
    cluster: usize,
    features: &[Feature],
) -> ClusterProfile {
    let members: Vec<&AccountAggregate> = labeled
        .iter()
        .filter(|a| a.cluster == cluster)
        .map(|a| &a.account)
        .collect();

    let feature_means = features
        .iter()
        .map(|f| {
            let values: Vec<f64> = members.iter().filter_map(|a| f.value(a)).collect();
            let mean = (!values.is_empty())
                .then(|| values.iter().sum::<f64>() / values.len() as f64);
            (f.name(), mean)
        })
        .collect();

    ClusterProfile {
        cluster,
        size: members.len(),
        feature_means,
    }
}

/// Binned data for each dashboard chart.
#[derive(Debug, Clone, Serialize)]
pub struct Distributions {
    pub age: Vec<Bin>,
    pub account_ages: BTreeMap<i32, usize>,
    pub trimmed_amount: Vec<Bin>,
    pub end_balance: Vec<Bin>,
    pub transactions_per_user: Vec<Bin>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub transaction_count: usize,
    pub account_count: usize,
    pub features: Vec<Feature>,
    pub summaries: Vec<Summary>,
    pub distributions: Distributions,
    pub segmentation: SegmentedAccounts,
    pub scatter: Vec<ScatterPoint>,
}

impl DashboardReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        log::info!("report written to {}", path.as_ref().display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};

    fn account(id: &str, txns: usize, bal: f64, debit: Option<f64>) -> AccountAggregate {
        AccountAggregate {
            account_id: id.to_string(),
            total_transactions: txns,
            average_transaction_size: bal / txns as f64,
            end_balance: bal,
            average_debit: debit,
            average_credit: Some(bal),
            age: 30,
        }
    }

    fn segmentation(labels: Vec<usize>) -> Segmentation {
        Segmentation {
            n_clusters: 3,
            labels: Array1::from(labels),
            centroids: Array2::zeros((3, 2)),
            inertia: 1.5,
        }
    }

    #[test]
    fn test_build_labels_and_profiles() {
        let accounts = vec![
            account("1", 2, 10.0, Some(-5.0)),
            account("2", 4, 30.0, None),
            account("3", 1, 100.0, None),
        ];
        let features = [Feature::EndBalance, Feature::AverageDebit];
        let seg =
            SegmentedAccounts::build(&accounts, &segmentation(vec![0, 0, 2]), &features).unwrap();

        assert_eq!(seg.accounts[2].cluster, 2);
        assert_eq!(seg.cluster_sizes.get(&0), Some(&2));
        assert_eq!(seg.cluster_sizes.get(&1), None);

        assert_eq!(seg.profiles.len(), 3);
        assert_eq!(seg.profiles[0].size, 2);
        assert_eq!(seg.profiles[0].feature_means["end_balance"], Some(20.0));
        assert_eq!(seg.profiles[0].feature_means["average_debit"], Some(-5.0));
        assert_eq!(seg.profiles[1].size, 0);
        assert_eq!(seg.profiles[1].feature_means["end_balance"], None);
        assert_eq!(seg.profiles[2].feature_means["average_debit"], None);

        let scatter = seg.scatter_points();
        assert_eq!(scatter[1].average_transaction_size, 7.5);
        assert_eq!(scatter[1].cluster, 0);
    }

    #[test]
    fn test_label_count_mismatch() {
        let accounts = vec![account("1", 1, 1.0, None)];
        let result =
            SegmentedAccounts::build(&accounts, &segmentation(vec![0, 1]), &Feature::DEFAULT);
        assert!(result.is_err());
    }

    #[test]
    fn test_labeled_account_serializes_flat() {
        let labeled = LabeledAccount {
            account: account("7", 1, 5.0, None),
            cluster: 1,
        };
        let json = serde_json::to_value(&labeled).unwrap();
        assert_eq!(json["account_id"], "7");
        assert_eq!(json["cluster"], 1);
        assert!(json["average_debit"].is_null());
    }
}
