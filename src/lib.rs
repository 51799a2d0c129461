//! txnsegment: account analytics and behavioral segmentation for bank
//! transaction data
//!
//! Raw rows are normalized into typed transactions, grouped into per-account
//! aggregates, standardized, and clustered with K-Means. Descriptive statistics
//! and histogram-ready distributions are computed alongside.

pub mod aggregate;
pub mod cli;
pub mod data;
pub mod error;
pub mod features;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod stats;

// Re-export public items for easier access
pub use aggregate::{aggregate_accounts, transactions_frame, AccountAggregate};
pub use cli::Args;
pub use data::load_raw_transactions;
pub use error::{AnalyticsError, Result};
pub use features::{prepare_features, Feature, FeaturePreparer, PreparedFeatures};
pub use model::{Segmentation, Segmenter};
pub use normalize::{Normalizer, RawTransaction, RowPolicy, Transaction};
pub use pipeline::{AnalyticsSession, PipelineConfig};
pub use report::{DashboardReport, LabeledAccount, SegmentedAccounts};
pub use stats::{describe, histogram, trim_to_quantiles, StatisticsReporter, Summary};
