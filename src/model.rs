//! K-Means segmentation of standardized account features

use crate::error::{AnalyticsError, Result};
use linfa::prelude::*;
use linfa::DatasetBase;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2, ArrayView1};
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_MAX_ITERS: u64 = 300;
pub const DEFAULT_TOLERANCE: f64 = 1e-4;
pub const DEFAULT_RUNS: usize = 10;

/// K-Means settings. Every call to [`Segmenter::segment`] reseeds from `seed`,
/// so identical input and `k` always yield identical labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Segmenter {
    /// Iteration cap for each run.
    pub max_iters: u64,
    /// Convergence threshold on centroid movement.
    pub tolerance: f64,
    /// Seed for k-means++ initialisation.
    pub seed: u64,
    /// Independent k-means++ restarts; the lowest inertia run is kept.
    pub n_runs: usize,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self {
            max_iters: DEFAULT_MAX_ITERS,
            tolerance: DEFAULT_TOLERANCE,
            seed: DEFAULT_SEED,
            n_runs: DEFAULT_RUNS,
        }
    }
}

/// Result of one clustering run.
#[derive(Debug, Clone, PartialEq)]
pub struct Segmentation {
    pub n_clusters: usize,
    /// Cluster label per input row, each in `0..n_clusters`.
    pub labels: Array1<usize>,
    /// Centroids in standardized feature space.
    pub centroids: Array2<f64>,
    /// Within-cluster sum of squares.
    pub inertia: f64,
}

impl Segmenter {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_iters(mut self, max_iters: u64) -> Self {
        self.max_iters = max_iters;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Cluster the rows of `features` into `n_clusters` groups.
    ///
    /// # Arguments
    /// * `features` - Standardized matrix, one row per account
    /// * `n_clusters` - Number of clusters, at least 2 and at most the row count
    ///
    /// # Returns
    /// Labels, centroids and inertia. `features` is only read; re-running with
    /// another `k` is independent of any earlier run.
    pub fn segment(&self, features: &Array2<f64>, n_clusters: usize) -> Result<Segmentation> {
        self.validate(features, n_clusters)?;

        let dataset = DatasetBase::from(features.clone());
        let rng = Pcg64Mcg::seed_from_u64(self.seed);

        let model = KMeans::params_with(n_clusters, rng, L2Dist)
            .max_n_iterations(self.max_iters)
            .tolerance(self.tolerance)
            .n_runs(self.n_runs)
            .fit(&dataset)
            .map_err(|e| AnalyticsError::Clustering(e.to_string()))?;

        let labels: Array1<usize> = model.predict(features);
        let centroids = model.centroids().clone();
        let inertia = compute_inertia(features, &labels, &centroids);

        log::debug!(
            "k-means with k={} over {} rows: inertia {:.4}",
            n_clusters,
            features.nrows(),
            inertia
        );

        Ok(Segmentation {
            n_clusters,
            labels,
            centroids,
            inertia,
        })
    }

    fn validate(&self, features: &Array2<f64>, n_clusters: usize) -> Result<()> {
        if n_clusters < 2 {
            return Err(AnalyticsError::InvalidParameter(format!(
                "cluster count must be at least 2, got {n_clusters}"
            )));
        }
        if self.max_iters == 0 || self.n_runs == 0 {
            return Err(AnalyticsError::InvalidParameter(
                "iteration cap and run count must be positive".to_string(),
            ));
        }
        if !(self.tolerance > 0.0) {
            return Err(AnalyticsError::InvalidParameter(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if features.nrows() == 0 {
            return Err(AnalyticsError::EmptyInput);
        }
        if features.nrows() < n_clusters {
            return Err(AnalyticsError::InsufficientData {
                requested: n_clusters,
                available: features.nrows(),
            });
        }
        if features.iter().any(|v| !v.is_finite()) {
            return Err(AnalyticsError::InvalidParameter(
                "feature matrix contains non-finite values".to_string(),
            ));
        }
        Ok(())
    }
}

impl Segmentation {
    /// Assign a standardized point to its nearest centroid.
    pub fn predict(&self, features: &Array1<f64>) -> Result<usize> {
        if features.len() != self.centroids.ncols() {
            return Err(AnalyticsError::InvalidParameter(format!(
                "feature vector must have {} dimensions, got {}",
                self.centroids.ncols(),
                features.len()
            )));
        }

        let mut min_distance = f64::INFINITY;
        let mut closest_cluster = 0;
        for (cluster_idx, centroid) in self.centroids.outer_iter().enumerate() {
            let distance = squared_distance(&features.view(), &centroid);
            if distance < min_distance {
                min_distance = distance;
                closest_cluster = cluster_idx;
            }
        }

        Ok(closest_cluster)
    }

    /// Number of rows assigned to each cluster, indexed by label.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters];
        for &label in self.labels.iter() {
            if label < self.n_clusters {
                sizes[label] += 1;
            }
        }
        sizes
    }
}

fn compute_inertia(features: &Array2<f64>, labels: &Array1<usize>, centroids: &Array2<f64>) -> f64 {
    labels
        .iter()
        .enumerate()
        .filter(|&(_, &cluster)| cluster < centroids.nrows())
        .map(|(i, &cluster)| squared_distance(&features.row(i), &centroids.row(cluster)))
        .sum()
}

fn squared_distance(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_groups() -> Array2<f64> {
        Array2::from_shape_vec((6, 1), vec![0.0, 0.1, 0.2, 10.0, 10.1, 10.2]).unwrap()
    }

    fn spread_points() -> Array2<f64> {
        Array2::from_shape_vec(
            (8, 2),
            vec![
                -1.0, -1.0, //
                -1.1, -0.9, //
                1.0, 1.0, //
                0.9, 1.2, //
                -1.0, 1.0, //
                -0.8, 1.1, //
                1.0, -1.0, //
                1.1, -1.2,
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_separates_well_separated_groups() {
        let seg = Segmenter::default().segment(&two_groups(), 2).unwrap();

        assert_eq!(seg.labels.len(), 6);
        let low = seg.labels[0];
        let high = seg.labels[3];
        assert_ne!(low, high);
        assert!(seg.labels.iter().take(3).all(|&l| l == low));
        assert!(seg.labels.iter().skip(3).all(|&l| l == high));
        assert_eq!(seg.cluster_sizes(), {
            let mut sizes = vec![0, 0];
            sizes[low] = 3;
            sizes[high] = 3;
            sizes
        });
    }

    #[test]
    fn test_deterministic_for_same_seed() {
        let points = spread_points();
        let segmenter = Segmenter::default();
        let first = segmenter.segment(&points, 4).unwrap();
        let second = segmenter.segment(&points, 4).unwrap();

        assert_eq!(first.labels, second.labels);
        assert_eq!(first.centroids, second.centroids);
        assert!(first.labels.iter().all(|&l| l < 4));
    }

    #[test]
    fn test_recluster_leaves_matrix_untouched() {
        let points = spread_points();
        let before = points.clone();
        let segmenter = Segmenter::default();

        let four = segmenter.segment(&points, 4).unwrap();
        let six = segmenter.segment(&points, 6).unwrap();
        assert_eq!(points, before);
        assert_eq!(four.n_clusters, 4);
        assert_eq!(six.cluster_sizes().iter().sum::<usize>(), 8);

        let again = segmenter.segment(&points, 4).unwrap();
        assert_eq!(four.labels, again.labels);
    }

    #[test]
    fn test_invalid_cluster_count() {
        let result = Segmenter::default().segment(&two_groups(), 1);
        assert!(matches!(result, Err(AnalyticsError::InvalidParameter(_))));
    }

    #[test]
    fn test_insufficient_data() {
        let result = Segmenter::default().segment(&two_groups(), 7);
        assert!(matches!(
            result,
            Err(AnalyticsError::InsufficientData {
                requested: 7,
                available: 6
            })
        ));
    }

    #[test]
    fn test_predict_nearest_centroid() {
        let seg = Segmenter::default().segment(&two_groups(), 2).unwrap();
        let near_low = seg.predict(&Array1::from(vec![0.05])).unwrap();
        let near_high = seg.predict(&Array1::from(vec![9.0])).unwrap();

        assert_eq!(near_low, seg.labels[0]);
        assert_eq!(near_high, seg.labels[5]);
        assert!(seg.predict(&Array1::from(vec![1.0, 2.0])).is_err());
    }

    #[test]
    fn test_inertia_is_finite_and_small_for_tight_groups() {
        let seg = Segmenter::default().segment(&two_groups(), 2).unwrap();
        assert!(seg.inertia.is_finite());
        assert!(seg.inertia < 0.1);
    }
}
