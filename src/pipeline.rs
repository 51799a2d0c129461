//! One analytics run over a single input snapshot

use crate::aggregate::{aggregate_accounts, AccountAggregate};
use crate::data::load_raw_transactions;
use crate::error::Result;
use crate::features::{Feature, FeatureCache, PreparedFeatures};
use crate::model::{Segmentation, Segmenter};
use crate::normalize::{Normalizer, RawTransaction, RowPolicy, Transaction};
use crate::report::{DashboardReport, Distributions, SegmentedAccounts};
use crate::stats::{StatisticsReporter, Summary};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Arc;

/// Settings for every stage of the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Reference year for ages and the bad-row policy.
    pub normalizer: Normalizer,
    /// Account features fed to clustering, in matrix column order.
    pub features: Vec<Feature>,
    /// K-Means settings shared by every `segment` call.
    pub segmenter: Segmenter,
    /// Trim bounds and bin counts for the distributions.
    pub reporter: StatisticsReporter,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            normalizer: Normalizer::default(),
            features: Feature::DEFAULT.to_vec(),
            segmenter: Segmenter::default(),
            reporter: StatisticsReporter::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.normalizer = Normalizer::new(year).with_policy(self.normalizer.policy());
        self
    }

    pub fn with_row_policy(mut self, policy: RowPolicy) -> Self {
        self.normalizer = self.normalizer.with_policy(policy);
        self
    }

    pub fn with_features(mut self, features: Vec<Feature>) -> Self {
        self.features = features;
        self
    }

    pub fn with_segmenter(mut self, segmenter: Segmenter) -> Self {
        self.segmenter = segmenter;
        self
    }

    pub fn with_reporter(mut self, reporter: StatisticsReporter) -> Self {
        self.reporter = reporter;
        self
    }
}

/// Normalized transactions and account aggregates for one input, plus the
/// memoized feature matrix that clustering runs share.
///
/// Each session owns its data; nothing is shared between sessions.
#[derive(Debug)]
pub struct AnalyticsSession {
    config: PipelineConfig,
    fingerprint: u64,
    transactions: Vec<Transaction>,
    accounts: Vec<AccountAggregate>,
    cache: FeatureCache,
}

impl AnalyticsSession {
    /// Normalize and aggregate `rows`.
    pub fn from_raw(rows: &[RawTransaction], config: PipelineConfig) -> Result<Self> {
        let transactions = config.normalizer.normalize(rows)?;
        let accounts = aggregate_accounts(&transactions)?;
        let fingerprint = fingerprint(rows);

        log::info!(
            "loaded {} transactions across {} accounts",
            transactions.len(),
            accounts.len()
        );

        Ok(Self {
            config,
            fingerprint,
            transactions,
            accounts,
            cache: FeatureCache::new(),
        })
    }

    pub fn load_csv(path: impl AsRef<Path>, config: PipelineConfig) -> Result<Self> {
        let rows = load_raw_transactions(path)?;
        Self::from_raw(&rows, config)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn accounts(&self) -> &[AccountAggregate] {
        &self.accounts
    }

    /// Standardized features for the configured feature list, computed once.
    pub fn prepared_features(&mut self) -> Result<Arc<PreparedFeatures>> {
        self.cache
            .get_or_prepare(self.fingerprint, &self.accounts, &self.config.features)
    }

    /// Cluster the accounts into `n_clusters` groups.
    pub fn segment(&mut self, n_clusters: usize) -> Result<(Segmentation, SegmentedAccounts)> {
        let prepared = self.prepared_features()?;
        let segmentation = self.config.segmenter.segment(&prepared.matrix, n_clusters)?;
        let segmented =
            SegmentedAccounts::build(&self.accounts, &segmentation, prepared.preparer.features())?;
        log::info!(
            "segmented {} accounts into {} clusters",
            self.accounts.len(),
            n_clusters
        );
        Ok((segmentation, segmented))
    }

    /// Age, amount and transactions-per-user summaries.
    pub fn summaries(&self) -> Result<Vec<Summary>> {
        self.config
            .reporter
            .standard_summaries(&self.transactions, &self.accounts)
    }

    pub fn distributions(&self) -> Result<Distributions> {
        let reporter = &self.config.reporter;
        Ok(Distributions {
            age: reporter.age_histogram(&self.transactions)?,
            account_ages: reporter.account_age_counts(&self.accounts),
            trimmed_amount: reporter.amount_histogram(&self.transactions)?,
            end_balance: reporter.end_balance_histogram(&self.accounts)?,
            transactions_per_user: reporter.transactions_per_user_histogram(&self.accounts)?,
        })
    }

    /// Full dashboard payload for a given cluster count.
    pub fn report(&mut self, n_clusters: usize) -> Result<DashboardReport> {
        let (_, segmentation) = self.segment(n_clusters)?;
        Ok(DashboardReport {
            transaction_count: self.transactions.len(),
            account_count: self.accounts.len(),
            features: self.config.features.clone(),
            summaries: self.summaries()?,
            distributions: self.distributions()?,
            scatter: segmentation.scatter_points(),
            segmentation,
        })
    }
}

fn fingerprint(rows: &[RawTransaction]) -> u64 {
    let mut hasher = DefaultHasher::new();
    rows.hash(&mut hasher);
    hasher.finish()
}
