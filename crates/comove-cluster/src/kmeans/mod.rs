//! K-means clustering with seeded restarts.
//!
//! Each restart runs Lloyd's algorithm from a fresh initialization:
//!
//! 1. pick k initial centroids ([`InitMethod`])
//! 2. assign every row to its nearest centroid (squared Euclidean distance,
//!    lowest centroid index on ties)
//! 3. move every centroid to the mean of its rows
//! 4. repeat 2-3 until no assignment changes or the iteration cap is reached
//!
//! The best restart is the one with the lowest inertia; on equal inertia the
//! earlier attempt wins. Every attempt draws from its own generator seeded from
//! `(seed, k, attempt)`, so a fit depends only on its inputs and never on
//! scheduling.

mod init;
mod lloyd;

pub use init::InitMethod;

use crate::error::{ClusterError, Result};
use crate::metrics::{nearest_centroid, squared_distance};
use ndarray::{Array2, ArrayView1};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// K-means configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansConfig {
    /// Number of valid restarts to compare (default: 10)
    pub n_init: usize,
    /// Lloyd iteration cap per restart (default: 300)
    pub max_iterations: usize,
    /// Extra attempts allowed to replace degenerate restarts (default: 10)
    pub max_degenerate_retries: usize,
    /// Initialization strategy (default: k-means++)
    pub init: InitMethod,
    /// Base seed for the per-attempt generators (default: 42)
    pub seed: u64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            n_init: 10,
            max_iterations: 300,
            max_degenerate_retries: 10,
            init: InitMethod::default(),
            seed: 42,
        }
    }
}

impl KMeansConfig {
    /// Check that the configuration can produce a fit.
    pub fn validate(&self) -> Result<()> {
        if self.n_init == 0 {
            return Err(ClusterError::InvalidParameter(
                "n_init must be at least 1".to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(ClusterError::InvalidParameter(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Upper bound on the number of attempts for one k.
    pub const fn max_attempts(&self) -> usize {
        self.n_init + self.max_degenerate_retries
    }
}

/// Result of fitting k-means to a matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    /// Number of clusters
    pub k: usize,
    /// Cluster centroids (k x columns)
    pub centroids: Array2<f64>,
    /// Cluster index of every row, in row order
    pub labels: Vec<usize>,
    /// Sum of squared distances from each row to its centroid
    pub inertia: f64,
    /// Lloyd iterations of the winning restart
    pub iterations: usize,
    /// Attempt index of the winning restart (0 when started from given centroids)
    pub restart: usize,
    /// Whether the winning restart stopped because assignments were stable
    pub converged: bool,
}

impl KMeansFit {
    /// Nearest centroid for a new vector.
    pub fn predict(&self, row: ArrayView1<'_, f64>) -> Result<usize> {
        if row.len() != self.centroids.ncols() {
            return Err(ClusterError::DimensionMismatch {
                expected: self.centroids.ncols(),
                actual: row.len(),
            });
        }
        Ok(nearest_centroid(row, &self.centroids).0)
    }

    /// Number of rows in each cluster.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k];
        for &label in &self.labels {
            if let Some(size) = sizes.get_mut(label) {
                *size += 1;
            }
        }
        sizes
    }

    /// Row farthest from its assigned centroid, with its squared distance.
    ///
    /// Rows whose label has no centroid are skipped. Ties keep the lowest row.
    pub fn farthest_row(&self, data: &Array2<f64>) -> Option<(usize, f64)> {
        data.outer_iter()
            .zip(self.labels.iter())
            .enumerate()
            .filter(|(_, (_, label))| **label < self.centroids.nrows())
            .map(|(i, (row, &label))| (i, squared_distance(row, self.centroids.row(label))))
            .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
                Some((_, best_d)) if best_d >= d => best,
                _ => Some((i, d)),
            })
    }

    /// Same partition with `row` moved into a new cluster of its own.
    ///
    /// Centroids are the means of the new partition, so the inertia is at
    /// most this fit's inertia less the row's squared distance.
    pub(crate) fn split_off(&self, data: &Array2<f64>, row: usize) -> Result<Self> {
        let k = self.k + 1;
        let mut labels = self.labels.clone();
        if let Some(label) = labels.get_mut(row) {
            *label = self.k;
        }

        let run = lloyd::settle(data.view(), labels, k).map_err(|cluster| {
            ClusterError::DegenerateCluster {
                k,
                cluster,
                attempt: 0,
            }
        })?;

        Ok(Self {
            k,
            centroids: run.centroids,
            labels: run.labels,
            inertia: run.inertia,
            iterations: run.iterations,
            restart: 0,
            converged: run.converged,
        })
    }

    /// Row indices belonging to `cluster`.
    pub fn members(&self, cluster: usize) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, label)| **label == cluster)
            .map(|(i, _)| i)
            .collect()
    }
}

/// K-means engine.
///
/// The engine holds only configuration; the matrix is passed to every call,
/// so one engine can fit many k values concurrently.
#[derive(Debug, Clone)]
pub struct KMeansEngine {
    config: KMeansConfig,
}

impl Default for KMeansEngine {
    fn default() -> Self {
        Self {
            config: KMeansConfig::default(),
        }
    }
}

impl KMeansEngine {
    /// Create a new engine.
    pub fn new(config: KMeansConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Get the configuration.
    pub const fn config(&self) -> &KMeansConfig {
        &self.config
    }

    /// Fit `k` clusters to the rows of `data`.
    ///
    /// # Errors
    /// * `InvalidClusterCount` unless `1 <= k <= data.nrows()`
    /// * `NonFiniteInput` if any cell is NaN or infinite
    /// * `ConvergenceFailure` if every attempt left a cluster empty
    pub fn fit(&self, data: &Array2<f64>, k: usize) -> Result<KMeansFit> {
        let rows = data.nrows();
        if k == 0 || k > rows {
            return Err(ClusterError::InvalidClusterCount { k, rows });
        }
        check_finite(data)?;

        let mut best: Option<KMeansFit> = None;
        let mut valid = 0;
        let mut attempts = 0;

        while valid < self.config.n_init && attempts < self.config.max_attempts() {
            let attempt = attempts;
            attempts += 1;

            match self.attempt(data, k, attempt) {
                Ok(fit) => {
                    valid += 1;
                    tracing::debug!(k, attempt, inertia = fit.inertia, "k-means restart");
                    if best.as_ref().is_none_or(|b| fit.inertia < b.inertia) {
                        best = Some(fit);
                    }
                }
                Err(err) => tracing::debug!(k, attempt, %err, "discarding restart"),
            }
        }

        let fit = best.ok_or(ClusterError::ConvergenceFailure { k, attempts })?;
        if !fit.converged {
            tracing::debug!(k, iterations = fit.iterations, "best restart hit the iteration cap");
        }
        Ok(fit)
    }

    /// Run Lloyd's algorithm once from the given starting centroids.
    ///
    /// k is the number of centroid rows. No restarts are made.
    ///
    /// # Errors
    /// * `InvalidClusterCount` unless `1 <= k <= data.nrows()`
    /// * `DimensionMismatch` if the centroids and rows differ in width
    /// * `NonFiniteInput` if any cell is NaN or infinite
    /// * `DegenerateCluster` if a cluster loses all of its rows
    pub fn fit_from(&self, data: &Array2<f64>, centroids: Array2<f64>) -> Result<KMeansFit> {
        let k = centroids.nrows();
        let rows = data.nrows();
        if k == 0 || k > rows {
            return Err(ClusterError::InvalidClusterCount { k, rows });
        }
        if centroids.ncols() != data.ncols() {
            return Err(ClusterError::DimensionMismatch {
                expected: data.ncols(),
                actual: centroids.ncols(),
            });
        }
        check_finite(data)?;

        let run = lloyd::run(data.view(), centroids, self.config.max_iterations).map_err(
            |cluster| ClusterError::DegenerateCluster {
                k,
                cluster,
                attempt: 0,
            },
        )?;
        tracing::debug!(
            k,
            inertia = run.inertia,
            iterations = run.iterations,
            "k-means from centroids"
        );

        Ok(KMeansFit {
            k,
            centroids: run.centroids,
            labels: run.labels,
            inertia: run.inertia,
            iterations: run.iterations,
            restart: 0,
            converged: run.converged,
        })
    }

    fn attempt(&self, data: &Array2<f64>, k: usize, attempt: usize) -> Result<KMeansFit> {
        let mut rng = StdRng::seed_from_u64(attempt_seed(self.config.seed, k, attempt));
        let rows = self.config.init.choose(data.view(), k, &mut rng);
        let centroids = init::centroids_from_rows(data.view(), &rows);

        let run = lloyd::run(data.view(), centroids, self.config.max_iterations).map_err(
            |cluster| ClusterError::DegenerateCluster {
                k,
                cluster,
                attempt,
            },
        )?;

        Ok(KMeansFit {
            k,
            centroids: run.centroids,
            labels: run.labels,
            inertia: run.inertia,
            iterations: run.iterations,
            restart: attempt,
            converged: run.converged,
        })
    }
}

/// Reject matrices with NaN or infinite cells.
pub fn check_finite(data: &Array2<f64>) -> Result<()> {
    match data.indexed_iter().find(|(_, v)| !v.is_finite()) {
        Some(((row, column), _)) => Err(ClusterError::NonFiniteInput { row, column }),
        None => Ok(()),
    }
}

const fn attempt_seed(seed: u64, k: usize, attempt: usize) -> u64 {
    seed ^ (k as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (attempt as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::total_sum_of_squares;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use ndarray::array;
    use rstest::rstest;

    fn abc() -> Array2<f64> {
        array![
            [0.01, -0.02, 0.015, 0.0],
            [0.01, -0.02, 0.015, 0.0],
            [-0.5, 0.5, -0.3, 0.4],
        ]
    }

    #[rstest]
    #[case::plus_plus(InitMethod::KMeansPlusPlus)]
    #[case::random_rows(InitMethod::RandomRows)]
    fn test_identical_rows_share_a_cluster(#[case] init: InitMethod) {
        let engine = KMeansEngine::new(KMeansConfig {
            n_init: 5,
            init,
            ..Default::default()
        })
        .unwrap();

        let fit = engine.fit(&abc(), 2).unwrap();

        assert_eq!(fit.labels[0], fit.labels[1]);
        assert_ne!(fit.labels[0], fit.labels[2]);
        assert_abs_diff_eq!(fit.inertia, 0.0, epsilon = 1e-12);
        assert_eq!(fit.cluster_sizes().iter().copied().max(), Some(2));
    }

    #[test]
    fn test_single_cluster_is_total_sum_of_squares() {
        let data = array![[1.0, 2.0], [3.0, -1.0], [0.5, 0.5], [4.0, 4.0], [-2.0, 1.0]];
        let fit = KMeansEngine::default().fit(&data, 1).unwrap();

        assert_relative_eq!(fit.inertia, total_sum_of_squares(&data), epsilon = 1e-12);
        assert!(fit.labels.iter().all(|&l| l == 0));
    }

    #[test]
    fn test_k_equals_rows_gives_zero_inertia() {
        let data = array![[1.0, 2.0], [3.0, -1.0], [0.5, 0.5], [4.0, 4.0]];
        let fit = KMeansEngine::default().fit(&data, 4).unwrap();

        assert_abs_diff_eq!(fit.inertia, 0.0, epsilon = 1e-12);
        assert_eq!(fit.cluster_sizes(), vec![1, 1, 1, 1]);
    }

    #[rstest]
    #[case(0)]
    #[case(4)]
    fn test_invalid_cluster_count(#[case] k: usize) {
        let err = KMeansEngine::default().fit(&abc(), k).unwrap_err();
        assert_eq!(err, ClusterError::InvalidClusterCount { k, rows: 3 });
    }

    #[test]
    fn test_empty_matrix() {
        let data = Array2::<f64>::zeros((0, 3));
        let err = KMeansEngine::default().fit(&data, 1).unwrap_err();
        assert!(matches!(err, ClusterError::InvalidClusterCount { rows: 0, .. }));
    }

    #[test]
    fn test_non_finite_input() {
        let data = array![[0.0, 1.0], [f64::NAN, 2.0]];
        let err = KMeansEngine::default().fit(&data, 1).unwrap_err();
        assert_eq!(err, ClusterError::NonFiniteInput { row: 1, column: 0 });
    }

    #[test]
    fn test_more_clusters_than_distinct_rows_fails() {
        // Two distinct rows cannot populate three clusters.
        let data = array![[1.0], [1.0], [2.0]];
        let engine = KMeansEngine::new(KMeansConfig {
            n_init: 2,
            max_degenerate_retries: 3,
            ..Default::default()
        })
        .unwrap();

        let err = engine.fit(&data, 3).unwrap_err();
        assert_eq!(err, ClusterError::ConvergenceFailure { k: 3, attempts: 5 });
    }

    #[test]
    fn test_seeded_runs_are_identical() {
        let data = array![
            [0.3, 0.1],
            [0.2, 0.4],
            [-0.1, 0.9],
            [1.5, -0.2],
            [1.1, 0.0],
            [-0.7, -0.8],
            [0.0, 0.0],
        ];
        let engine = KMeansEngine::default();

        let first = engine.fit(&data, 3).unwrap();
        let second = engine.fit(&data, 3).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_predict() {
        let data = array![[0.0, 0.0], [0.1, 0.0], [5.0, 5.0], [5.1, 5.0]];
        let fit = KMeansEngine::default().fit(&data, 2).unwrap();

        let near_origin = fit.predict(array![0.2, -0.1].view()).unwrap();
        assert_eq!(near_origin, fit.labels[0]);
        assert_eq!(fit.members(near_origin), vec![0, 1]);

        let err = fit.predict(array![1.0].view()).unwrap_err();
        assert!(matches!(err, ClusterError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_invalid_config() {
        let err = KMeansEngine::new(KMeansConfig {
            n_init: 0,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ClusterError::InvalidParameter(_)));
    }

    #[test]
    fn test_config_serde_defaults() {
        let config: KMeansConfig = serde_json::from_str(r#"{"n_init": 3}"#).unwrap();
        assert_eq!(config.n_init, 3);
        assert_eq!(config.max_iterations, 300);
        assert_eq!(config.init, InitMethod::KMeansPlusPlus);
    }

    #[test]
    fn test_fit_from_converges_from_given_centroids() {
        let data = array![[0.0, 0.0], [0.0, 1.0], [10.0, 10.0], [10.0, 11.0]];
        let engine = KMeansEngine::default();

        let fit = engine.fit_from(&data, array![[1.0, 1.0], [9.0, 9.0]]).unwrap();

        assert_eq!(fit.k, 2);
        assert_eq!(fit.labels, vec![0, 0, 1, 1]);
        assert_relative_eq!(fit.inertia, 1.0, epsilon = 1e-12);
        assert!(fit.converged);
    }

    #[test]
    fn test_fit_from_rejects_bad_centroids() {
        let data = array![[0.0, 0.0], [1.0, 1.0]];
        let engine = KMeansEngine::default();

        let err = engine.fit_from(&data, array![[0.0], [1.0]]).unwrap_err();
        assert!(matches!(err, ClusterError::DimensionMismatch { expected: 2, actual: 1 }));

        let err = engine.fit_from(&data, Array2::zeros((0, 2))).unwrap_err();
        assert_eq!(err, ClusterError::InvalidClusterCount { k: 0, rows: 2 });

        let err = engine
            .fit_from(&data, array![[0.5, 0.5], [0.5, 0.5]])
            .unwrap_err();
        assert!(matches!(err, ClusterError::DegenerateCluster { k: 2, cluster: 1, .. }));
    }

    #[test]
    fn test_cluster_sizes_skips_labels_without_centroid() {
        let fit = KMeansFit {
            k: 2,
            centroids: array![[0.0], [1.0]],
            labels: vec![0, 1, 5, 1],
            inertia: 0.0,
            iterations: 1,
            restart: 0,
            converged: true,
        };

        assert_eq!(fit.cluster_sizes(), vec![1, 2]);
        assert_eq!(fit.members(5), vec![2]);
    }

    #[test]
    fn test_farthest_row_and_split() {
        let data = array![[0.0], [1.0], [2.0], [10.0], [16.0]];
        let fit = KMeansEngine::default()
            .fit_from(&data, array![[1.0], [13.0]])
            .unwrap();
        assert_relative_eq!(fit.inertia, 20.0, epsilon = 1e-12);

        let (row, distance) = fit.farthest_row(&data).unwrap();
        assert_eq!(row, 3);
        assert_relative_eq!(distance, 9.0, epsilon = 1e-12);

        let split = fit.split_off(&data, row).unwrap();
        assert_eq!(split.k, 3);
        assert_eq!(split.labels, vec![0, 0, 0, 2, 1]);
        assert_eq!(split.cluster_sizes(), vec![3, 1, 1]);
        assert!(split.inertia <= fit.inertia - distance + 1e-12);
    }
}
