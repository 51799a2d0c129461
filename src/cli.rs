//! Command-line interface definitions and argument parsing

use crate::error::{AnalyticsError, Result};
use crate::features::{parse_feature_list, Feature};
use crate::model::{Segmenter, DEFAULT_MAX_ITERS, DEFAULT_SEED, DEFAULT_TOLERANCE};
use crate::normalize::RowPolicy;
use crate::pipeline::PipelineConfig;
use crate::stats::StatisticsReporter;
use clap::Parser;

/// Account analytics and k-means segmentation over a transaction CSV
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV (account_id, txn_amount, txn_ts, date_of_birth)
    #[arg(short, long, default_value = "txn_history.csv")]
    pub input: String,

    /// Number of clusters for K-Means
    #[arg(short = 'k', long, default_value_t = 4)]
    pub clusters: usize,

    /// Extra cluster counts to re-run on the same features, e.g. "3,6"
    #[arg(long, value_delimiter = ',')]
    pub recluster: Vec<usize>,

    /// Maximum iterations for K-Means
    #[arg(long, default_value_t = DEFAULT_MAX_ITERS)]
    pub max_iters: u64,

    /// Tolerance for K-Means convergence
    #[arg(long, default_value_t = DEFAULT_TOLERANCE)]
    pub tolerance: f64,

    /// Random seed for centroid initialization
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Comma separated feature list used for clustering
    #[arg(long, default_value = "total_transactions,average_transaction_size,end_balance,age")]
    pub features: String,

    /// Drop unparseable rows with a warning instead of rejecting the file
    #[arg(long)]
    pub skip_invalid: bool,

    /// Year ages are computed against (defaults to the current year)
    #[arg(long)]
    pub reference_year: Option<i32>,

    /// Lower quantile kept in the amount distribution
    #[arg(long, default_value_t = 0.01)]
    pub trim_lower: f64,

    /// Upper quantile kept in the amount distribution
    #[arg(long, default_value_t = 0.99)]
    pub trim_upper: f64,

    /// Write the full report as JSON to this path
    #[arg(short, long)]
    pub output: Option<String>,

    /// Classify a hypothetical account: one value per feature, comma separated.
    /// Leave a slot empty to impute it, e.g. --predict "12,35.5,,41"
    #[arg(short, long)]
    pub predict: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn feature_list(&self) -> Result<Vec<Feature>> {
        parse_feature_list(&self.features)
    }

    /// Build the pipeline configuration described by the flags.
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::default()
            .with_features(self.feature_list()?)
            .with_segmenter(
                Segmenter::default()
                    .with_seed(self.seed)
                    .with_max_iters(self.max_iters)
                    .with_tolerance(self.tolerance),
            )
            .with_reporter(
                StatisticsReporter::default().with_trim(self.trim_lower, self.trim_upper),
            );

        if let Some(year) = self.reference_year {
            config = config.with_reference_year(year);
        }
        if self.skip_invalid {
            config = config.with_row_policy(RowPolicy::SkipInvalid);
        }
        Ok(config)
    }

    /// Parse the predict string into one optional value per feature.
    pub fn parse_predict_values(&self) -> Result<Option<Vec<Option<f64>>>> {
        let Some(ref predict_str) = self.predict else {
            return Ok(None);
        };

        let expected = self.feature_list()?.len();
        let parts: Vec<&str> = predict_str.split(',').map(str::trim).collect();
        if parts.len() != expected {
            return Err(AnalyticsError::InvalidParameter(format!(
                "predict needs {expected} comma separated values, got {}",
                parts.len()
            )));
        }

        let values = parts
            .into_iter()
            .map(|part| {
                if part.is_empty() {
                    return Ok(None);
                }
                part.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .map(Some)
                    .ok_or_else(|| {
                        AnalyticsError::InvalidParameter(format!("invalid predict value: {part}"))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["txnsegment"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = args(&[]);
        assert_eq!(args.clusters, 4);
        assert_eq!(args.seed, 42);
        assert!(args.recluster.is_empty());
        assert_eq!(args.feature_list().unwrap(), Feature::DEFAULT.to_vec());

        let config = args.pipeline_config().unwrap();
        assert_eq!(config.normalizer.policy(), RowPolicy::FailFast);
        assert_eq!(config.reporter.trim_lower, 0.01);
    }

    #[test]
    fn test_pipeline_config_from_flags() {
        let args = args(&[
            "--skip-invalid",
            "--reference-year",
            "2020",
            "--seed",
            "7",
            "--recluster",
            "3,6",
            "--features",
            "age,end_balance",
        ]);
        let config = args.pipeline_config().unwrap();

        assert_eq!(args.recluster, vec![3, 6]);
        assert_eq!(config.normalizer.policy(), RowPolicy::SkipInvalid);
        assert_eq!(config.normalizer.reference_year(), 2020);
        assert_eq!(config.segmenter.seed, 7);
        assert_eq!(config.features, vec![Feature::Age, Feature::EndBalance]);
    }

    #[test]
    fn test_parse_predict_values() {
        let mut args = args(&["--predict", "12,35.5,,41"]);
        assert_eq!(
            args.parse_predict_values().unwrap(),
            Some(vec![Some(12.0), Some(35.5), None, Some(41.0)])
        );

        args.predict = None;
        assert_eq!(args.parse_predict_values().unwrap(), None);

        args.predict = Some("1,2".to_string());
        assert!(args.parse_predict_values().is_err());

        args.predict = Some("1,2,x,4".to_string());
        assert!(args.parse_predict_values().is_err());
    }

    #[test]
    fn test_non_integer_cluster_count_is_rejected() {
        assert!(Args::try_parse_from(["txnsegment", "-k", "2.5"]).is_err());
    }
}
