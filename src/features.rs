//! Feature selection, mean imputation and standardization

use crate::aggregate::AccountAggregate;
use crate::error::{AnalyticsError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Numeric account columns that can feed the clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    TotalTransactions,
    AverageTransactionSize,
    EndBalance,
    Age,
    AverageDebit,
    AverageCredit,
}

impl Feature {
    /// The feature set used for segmentation unless the caller asks otherwise.
    pub const DEFAULT: [Feature; 4] = [
        Feature::TotalTransactions,
        Feature::AverageTransactionSize,
        Feature::EndBalance,
        Feature::Age,
    ];

    pub const ALL: [Feature; 6] = [
        Feature::TotalTransactions,
        Feature::AverageTransactionSize,
        Feature::EndBalance,
        Feature::Age,
        Feature::AverageDebit,
        Feature::AverageCredit,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::TotalTransactions => "total_transactions",
            Self::AverageTransactionSize => "average_transaction_size",
            Self::EndBalance => "end_balance",
            Self::Age => "age",
            Self::AverageDebit => "average_debit",
            Self::AverageCredit => "average_credit",
        }
    }

    /// Read this feature from an account; `None` means missing.
    pub fn value(&self, account: &AccountAggregate) -> Option<f64> {
        match self {
            Self::TotalTransactions => Some(account.total_transactions as f64),
            Self::AverageTransactionSize => Some(account.average_transaction_size),
            Self::EndBalance => Some(account.end_balance),
            Self::Age => Some(f64::from(account.age)),
            Self::AverageDebit => account.average_debit,
            Self::AverageCredit => account.average_credit,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Feature::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| AnalyticsError::InvalidParameter(format!("unknown feature '{s}'")))
    }
}

/// Parse a comma separated feature list such as `"age,end_balance"`.
pub fn parse_feature_list(text: &str) -> Result<Vec<Feature>> {
    let features = text
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(Feature::from_str)
        .collect::<Result<Vec<_>>>()?;
    validate_features(&features)?;
    Ok(features)
}

fn validate_features(features: &[Feature]) -> Result<()> {
    if features.is_empty() {
        return Err(AnalyticsError::InvalidParameter(
            "at least one feature is required".to_string(),
        ));
    }
    for (i, f) in features.iter().enumerate() {
        if features[..i].contains(f) {
            return Err(AnalyticsError::InvalidParameter(format!(
                "feature '{f}' listed twice"
            )));
        }
    }
    Ok(())
}

/// Replaces missing entries with the column mean of the present ones.
#[derive(Debug, Clone, PartialEq)]
pub struct MeanImputer {
    pub means: Array1<f64>,
}

impl MeanImputer {
    /// `columns[j][i]` is the value of feature `j` for row `i`.
    pub fn fit(columns: &[Vec<Option<f64>>], features: &[Feature]) -> Result<Self> {
        let means = columns
            .iter()
            .zip(features)
            .map(|(column, feature)| {
                let present: Vec<f64> = column.iter().flatten().copied().collect();
                if present.is_empty() {
                    return Err(AnalyticsError::UndefinedFeature {
                        feature: feature.name(),
                    });
                }
                Ok(present.iter().sum::<f64>() / present.len() as f64)
            })
            .collect::<Result<Vec<f64>>>()?;
        Ok(Self {
            means: Array1::from(means),
        })
    }

    pub fn transform(&self, columns: &[Vec<Option<f64>>]) -> Result<Array2<f64>> {
        let n_rows = columns.first().map_or(0, Vec::len);
        let n_cols = self.means.len();
        if columns.len() != n_cols {
            return Err(AnalyticsError::InvalidParameter(format!(
                "expected {n_cols} feature columns, got {}",
                columns.len()
            )));
        }

        let mut data = Vec::with_capacity(n_rows * n_cols);
        for i in 0..n_rows {
            for (j, column) in columns.iter().enumerate() {
                data.push(column[i].unwrap_or(self.means[j]));
            }
        }
        Ok(Array2::from_shape_vec((n_rows, n_cols), data)?)
    }
}

/// Column-wise standardization to zero mean and unit (population) variance.
///
/// Constant columns keep a scale of 1 so they map to all zeros.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    pub scale: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(data: &Array2<f64>) -> Self {
        let n_cols = data.ncols();
        let mean = data
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(n_cols));
        let scale = data
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > f64::EPSILON { s } else { 1.0 });
        Self { mean, scale }
    }

    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        (data - &self.mean) / &self.scale
    }
}

/// Fitted imputation and scaling parameters for one feature list.
#[derive(Debug, Clone, PartialEq)]
pub struct FeaturePreparer {
    features: Vec<Feature>,
    imputer: MeanImputer,
    scaler: StandardScaler,
}

impl FeaturePreparer {
    /// Learn imputation means, then scaling statistics over the imputed data.
    pub fn fit(accounts: &[AccountAggregate], features: &[Feature]) -> Result<Self> {
        validate_features(features)?;
        if accounts.is_empty() {
            return Err(AnalyticsError::EmptyInput);
        }

        let columns = feature_columns(accounts, features);
        let imputer = MeanImputer::fit(&columns, features)?;
        let imputed = imputer.transform(&columns)?;
        let scaler = StandardScaler::fit(&imputed);

        Ok(Self {
            features: features.to_vec(),
            imputer,
            scaler,
        })
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn imputer(&self) -> &MeanImputer {
        &self.imputer
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    /// Apply the fitted parameters to a set of accounts.
    pub fn transform(&self, accounts: &[AccountAggregate]) -> Result<Array2<f64>> {
        let columns = feature_columns(accounts, &self.features);
        let imputed = self.imputer.transform(&columns)?;
        Ok(self.scaler.transform(&imputed))
    }

    /// Apply the fitted parameters to a single raw feature vector.
    pub fn transform_values(&self, values: &[Option<f64>]) -> Result<Array1<f64>> {
        if values.len() != self.features.len() {
            return Err(AnalyticsError::InvalidParameter(format!(
                "expected {} feature values, got {}",
                self.features.len(),
                values.len()
            )));
        }
        let columns: Vec<Vec<Option<f64>>> = values.iter().map(|v| vec![*v]).collect();
        let imputed = self.imputer.transform(&columns)?;
        Ok(self.scaler.transform(&imputed).row(0).to_owned())
    }
}

fn feature_columns(accounts: &[AccountAggregate], features: &[Feature]) -> Vec<Vec<Option<f64>>> {
    features
        .iter()
        .map(|f| accounts.iter().map(|a| f.value(a)).collect())
        .collect()
}

/// Standardized feature matrix plus the parameters that produced it.
#[derive(Debug, Clone)]
pub struct PreparedFeatures {
    /// One row per account, in the order of the aggregate table.
    pub matrix: Array2<f64>,
    pub account_ids: Vec<String>,
    pub preparer: FeaturePreparer,
}

/// Fit a [`FeaturePreparer`] on `accounts` and transform them in one go.
pub fn prepare_features(
    accounts: &[AccountAggregate],
    features: &[Feature],
) -> Result<PreparedFeatures> {
    let preparer = FeaturePreparer::fit(accounts, features)?;
    let matrix = preparer.transform(accounts)?;
    log::debug!(
        "prepared feature matrix {:?} over [{}]",
        matrix.shape(),
        features.iter().map(Feature::name).collect::<Vec<_>>().join(", ")
    );

    Ok(PreparedFeatures {
        matrix,
        account_ids: accounts.iter().map(|a| a.account_id.clone()).collect(),
        preparer,
    })
}

/// Memoizes prepared features by (input fingerprint, feature list).
#[derive(Debug, Default)]
pub struct FeatureCache {
    entries: HashMap<(u64, Vec<Feature>), Arc<PreparedFeatures>>,
}

impl FeatureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_prepare(
        &mut self,
        fingerprint: u64,
        accounts: &[AccountAggregate],
        features: &[Feature],
    ) -> Result<Arc<PreparedFeatures>> {
        let key = (fingerprint, features.to_vec());
        if let Some(hit) = self.entries.get(&key) {
            log::debug!("feature cache hit for input {fingerprint:016x}");
            return Ok(Arc::clone(hit));
        }

        let prepared = Arc::new(prepare_features(accounts, features)?);
        self.entries.insert(key, Arc::clone(&prepared));
        Ok(prepared)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
