//! txnsegment: transaction analytics and customer segmentation CLI
//!
//! Loads a transaction CSV, prints descriptive statistics, clusters accounts
//! and optionally writes the full report as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Instant;
use txnsegment::report::SegmentedAccounts;
use txnsegment::stats::Summary;
use txnsegment::{AnalyticsSession, Args};

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let start_time = Instant::now();
    let config = args.pipeline_config()?;

    let mut session = AnalyticsSession::load_csv(&args.input, config)
        .with_context(|| format!("failed to load {}", args.input))?;
    println!(
        "✓ Data loaded: {} transactions, {} accounts",
        session.transactions().len(),
        session.accounts().len()
    );

    println!("\n=== Descriptive Statistics ===");
    for summary in session.summaries()? {
        print_summary(&summary);
    }

    let (_, segmented) = session.segment(args.clusters)?;
    print_cluster_statistics(&segmented, session.accounts().len());

    for &k in &args.recluster {
        let (_, segmented) = session.segment(k)?;
        print_cluster_statistics(&segmented, session.accounts().len());
    }

    if let Some(values) = args.parse_predict_values()? {
        run_prediction(&mut session, args.clusters, &values)?;
    }

    if let Some(ref output) = args.output {
        session.report(args.clusters)?.write_json(output)?;
        println!("\nReport saved to: {output}");
    }

    log::info!("pipeline finished in {:.2}s", start_time.elapsed().as_secs_f64());
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn print_summary(summary: &Summary) {
    let std = summary
        .std
        .map_or_else(|| "undefined".to_string(), |s| format!("{s:.2}"));
    println!(
        "{:<20} count={} mean={:.2} std={} min={:.2} 25%={:.2} 50%={:.2} 75%={:.2} max={:.2}",
        summary.name,
        summary.count,
        summary.mean,
        std,
        summary.min,
        summary.q25,
        summary.median,
        summary.q75,
        summary.max
    );
}

fn print_cluster_statistics(segmented: &SegmentedAccounts, total_accounts: usize) {
    println!("\n=== Cluster Statistics (k = {}) ===", segmented.n_clusters);
    println!("Within-cluster sum of squares: {:.2}", segmented.inertia);
    for profile in &segmented.profiles {
        let percentage = (profile.size as f64 / total_accounts as f64) * 100.0;
        let means: Vec<String> = profile
            .feature_means
            .iter()
            .map(|(name, mean)| match mean {
                Some(m) => format!("{name}={m:.2}"),
                None => format!("{name}=n/a"),
            })
            .collect();
        println!(
            "Cluster {}: {} accounts ({:.1}%)  {}",
            profile.cluster,
            profile.size,
            percentage,
            means.join(" ")
        );
    }
}

fn run_prediction(
    session: &mut AnalyticsSession,
    n_clusters: usize,
    values: &[Option<f64>],
) -> Result<()> {
    let prepared = session.prepared_features()?;
    let (segmentation, _) = session.segment(n_clusters)?;
    let scaled = prepared.preparer.transform_values(values)?;
    let cluster = segmentation.predict(&scaled)?;

    println!("\n✓ Predicted Cluster: {cluster}");
    println!(
        "  Cluster size: {} accounts",
        segmentation.cluster_sizes()[cluster]
    );
    Ok(())
}
