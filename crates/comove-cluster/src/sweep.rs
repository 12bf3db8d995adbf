//! Cluster-count sweep.
//!
//! Fits the k-means engine once per k over an inclusive range and collects
//! the (k, inertia) curve used for elbow-style selection. Each k is an
//! independent fit over the same matrix, so the sweep can fan out over a
//! bounded worker pool. A failing k is recorded and never aborts the others;
//! k values not finished when the deadline elapses are reported as pending.
//!
//! Independent fits can disagree: the best k+1 restart may land above the
//! best k fit. Once every k is in, each such pair is refitted from the k
//! fit's centroids plus the row farthest from its centroid, which cannot end
//! above inertia(k), so the collected curve never rises with k.

use crate::error::{ClusterError, Result};
use crate::kmeans::{KMeansEngine, KMeansFit, check_finite};
use crate::metrics::silhouette_score;
use futures::future::{self, FutureExt};
use futures::stream::{self, StreamExt};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Relative slack when checking that inertia does not increase with k.
const MONOTONICITY_TOLERANCE: f64 = 1e-9;

/// Sweep configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Smallest k, inclusive (default: 2)
    pub k_min: usize,
    /// Largest k, inclusive (default: 30)
    pub k_max: usize,
    /// Maximum number of k values fitted at once (default: 4)
    pub workers: usize,
    /// Wall-clock budget for the whole sweep in seconds (default: none)
    pub timeout_secs: Option<u64>,
    /// Also compute the silhouette score per k (default: false)
    pub silhouette: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            k_min: 2,
            k_max: 30,
            workers: 4,
            timeout_secs: None,
            silhouette: false,
        }
    }
}

impl SweepConfig {
    /// Check the k range and worker count.
    pub fn validate(&self) -> Result<()> {
        if self.k_min == 0 {
            return Err(ClusterError::InvalidParameter(
                "k_min must be at least 1".to_string(),
            ));
        }
        if self.k_min > self.k_max {
            return Err(ClusterError::InvalidParameter(format!(
                "k_min ({}) must not exceed k_max ({})",
                self.k_min, self.k_max
            )));
        }
        if self.workers == 0 {
            return Err(ClusterError::InvalidParameter(
                "workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Swept k values.
    pub const fn ks(&self) -> RangeInclusive<usize> {
        self.k_min..=self.k_max
    }

    /// Copy with `k_max` lowered to `rows` if it exceeds it.
    pub fn capped_at(&self, rows: usize) -> Self {
        Self {
            k_max: self.k_max.min(rows),
            ..self.clone()
        }
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// One point of the scree curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    /// Number of clusters
    pub k: usize,
    /// Inertia of the best restart
    pub inertia: f64,
    /// Mean silhouette coefficient, when requested and defined
    pub silhouette: Option<f64>,
    /// Lloyd iterations of the best restart
    pub iterations: usize,
}

/// A k whose fit failed.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepFailure {
    /// Cluster count that failed
    pub k: usize,
    /// Underlying error
    pub error: ClusterError,
}

impl std::fmt::Display for SweepFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "k={}: {}", self.k, self.error)
    }
}

/// Outcome of a sweep.
#[derive(Debug, Clone, Default)]
pub struct SweepResult {
    points: Vec<SweepPoint>,
    fits: BTreeMap<usize, KMeansFit>,
    failures: Vec<SweepFailure>,
    pending: Vec<usize>,
}

impl SweepResult {
    /// Curve points of every completed k, ascending by k.
    pub fn points(&self) -> &[SweepPoint] {
        &self.points
    }

    /// (k, inertia) pairs, ascending by k.
    pub fn inertia_curve(&self) -> Vec<(usize, f64)> {
        self.points.iter().map(|p| (p.k, p.inertia)).collect()
    }

    /// Best fit for a completed k.
    pub fn fit(&self, k: usize) -> Option<&KMeansFit> {
        self.fits.get(&k)
    }

    /// Take ownership of the best fit for a completed k.
    pub fn into_fit(mut self, k: usize) -> Option<KMeansFit> {
        self.fits.remove(&k)
    }

    /// k values whose fit failed, ascending by k.
    pub fn failures(&self) -> &[SweepFailure] {
        &self.failures
    }

    /// k values not completed before the deadline, ascending.
    pub fn pending(&self) -> &[usize] {
        &self.pending
    }

    /// True when every swept k completed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.pending.is_empty()
    }

    /// Adjacent completed k pairs `(k_a, k_b)` where inertia increased.
    pub fn monotonicity_violations(&self) -> Vec<(usize, usize)> {
        self.points
            .windows(2)
            .filter(|w| w[1].inertia > w[0].inertia * (1.0 + MONOTONICITY_TOLERANCE) + f64::EPSILON)
            .map(|w| (w[0].k, w[1].k))
            .collect()
    }

    fn record(&mut self, k: usize, outcome: Result<(SweepPoint, KMeansFit)>) {
        match outcome {
            Ok((point, fit)) => {
                tracing::debug!(k, inertia = point.inertia, "sweep point");
                self.points.push(point);
                self.fits.insert(k, fit);
            }
            Err(error) => {
                tracing::warn!(k, %error, "k failed");
                self.failures.push(SweepFailure { k, error });
            }
        }
    }

    /// Refit every completed k whose inertia exceeds that of the previous
    /// completed k, growing the previous fit one farthest row at a time.
    fn repair_monotonicity(&mut self, engine: &KMeansEngine, data: &Array2<f64>, silhouette: bool) {
        self.points.sort_by_key(|p| p.k);

        for i in 1..self.points.len() {
            let (lower, upper) = (&self.points[i - 1], &self.points[i]);
            if upper.inertia <= lower.inertia {
                continue;
            }
            let (k_a, k_b, before) = (lower.k, upper.k, upper.inertia);

            let mut grown = self.fits.get(&k_a).cloned();
            while let Some(fit) = grown.as_ref().filter(|f| f.k < k_b) {
                grown = warm_start(engine, data, fit);
            }
            let Some(fit) = grown.filter(|f| f.k == k_b && f.inertia < before) else {
                continue;
            };

            tracing::debug!(k = k_b, before, after = fit.inertia, "inertia lowered by warm start");
            self.points[i] = point_for(data, &fit, silhouette);
            self.fits.insert(k_b, fit);
        }
    }

    fn finish(mut self, ks: RangeInclusive<usize>) -> Self {
        self.points.sort_by_key(|p| p.k);
        self.failures.sort_by_key(|f| f.k);

        let failed: Vec<usize> = self.failures.iter().map(|f| f.k).collect();
        self.pending = ks
            .filter(|k| !self.fits.contains_key(k) && !failed.contains(k))
            .collect();

        if !self.pending.is_empty() {
            tracing::warn!(pending = ?self.pending, "sweep deadline elapsed");
        }
        for (a, b) in self.monotonicity_violations() {
            tracing::warn!(k_a = a, k_b = b, "inertia increased with k");
        }
        tracing::info!(
            completed = self.points.len(),
            failed = self.failures.len(),
            pending = self.pending.len(),
            "sweep finished"
        );

        self
    }
}

/// Runs the k-means engine over a range of cluster counts.
#[derive(Debug, Clone)]
pub struct ModelSweep {
    engine: KMeansEngine,
    config: SweepConfig,
}

impl ModelSweep {
    /// Create a sweep.
    pub fn new(engine: KMeansEngine, config: SweepConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { engine, config })
    }

    /// Get the configuration.
    pub const fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Get the engine.
    pub const fn engine(&self) -> &KMeansEngine {
        &self.engine
    }

    /// Sequential sweep in ascending k.
    ///
    /// # Errors
    /// Fails up front with `InvalidClusterCount` if `k_max` exceeds the row
    /// count, or `NonFiniteInput`. Per-k failures are collected instead.
    pub fn run(&self, data: &Array2<f64>) -> Result<SweepResult> {
        self.run_with_progress(data, |_| {})
    }

    /// Sequential sweep, calling `progress` with each finished k.
    pub fn run_with_progress(
        &self,
        data: &Array2<f64>,
        mut progress: impl FnMut(usize),
    ) -> Result<SweepResult> {
        self.check_input(data)?;

        let deadline = self.config.timeout().map(|t| Instant::now() + t);
        let mut result = SweepResult::default();

        for k in self.config.ks() {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }
            result.record(k, fit_one(&self.engine, data, k, self.config.silhouette));
            progress(k);
        }

        result.repair_monotonicity(&self.engine, data, self.config.silhouette);
        Ok(result.finish(self.config.ks()))
    }

    /// Concurrent sweep on the tokio blocking pool.
    pub async fn run_concurrent(&self, data: Arc<Array2<f64>>) -> Result<SweepResult> {
        self.run_concurrent_with_progress(data, |_| {}).await
    }

    /// Concurrent sweep, calling `progress` with each finished k.
    ///
    /// At most `workers` k values run at once. When the deadline elapses the
    /// sweep stops collecting; k values still running are reported pending
    /// and their workers finish in the background.
    pub async fn run_concurrent_with_progress(
        &self,
        data: Arc<Array2<f64>>,
        mut progress: impl FnMut(usize),
    ) -> Result<SweepResult> {
        self.check_input(&data)?;

        let silhouette = self.config.silhouette;
        let tasks = stream::iter(self.config.ks())
            .map(|k| {
                let engine = self.engine.clone();
                let data = Arc::clone(&data);
                async move {
                    let outcome =
                        tokio::task::spawn_blocking(move || fit_one(&engine, &data, k, silhouette))
                            .await
                            .unwrap_or_else(|e| {
                                Err(ClusterError::Worker {
                                    k,
                                    message: e.to_string(),
                                })
                            });
                    (k, outcome)
                }
            })
            .buffer_unordered(self.config.workers);

        let deadline = match self.config.timeout() {
            Some(timeout) => tokio::time::sleep(timeout).boxed(),
            None => future::pending::<()>().boxed(),
        };
        let mut tasks = tasks.take_until(deadline);

        let mut result = SweepResult::default();
        while let Some((k, outcome)) = tasks.next().await {
            result.record(k, outcome);
            progress(k);
        }

        result.repair_monotonicity(&self.engine, &data, silhouette);
        Ok(result.finish(self.config.ks()))
    }

    fn check_input(&self, data: &Array2<f64>) -> Result<()> {
        let rows = data.nrows();
        if self.config.k_max > rows {
            return Err(ClusterError::InvalidClusterCount {
                k: self.config.k_max,
                rows,
            });
        }
        check_finite(data)?;

        tracing::info!(
            rows,
            columns = data.ncols(),
            k_min = self.config.k_min,
            k_max = self.config.k_max,
            "starting sweep"
        );
        Ok(())
    }
}

fn fit_one(
    engine: &KMeansEngine,
    data: &Array2<f64>,
    k: usize,
    silhouette: bool,
) -> Result<(SweepPoint, KMeansFit)> {
    let fit = engine.fit(data, k)?;
    let point = point_for(data, &fit, silhouette);
    Ok((point, fit))
}

fn point_for(data: &Array2<f64>, fit: &KMeansFit, silhouette: bool) -> SweepPoint {
    SweepPoint {
        k: fit.k,
        inertia: fit.inertia,
        silhouette: if silhouette {
            silhouette_score(data, &fit.labels, fit.k)
        } else {
            None
        },
        iterations: fit.iterations,
    }
}

/// Fit with one more cluster, seeded by the row farthest from its centroid.
///
/// Runs Lloyd from the fit's centroids plus that row. If a cluster empties
/// on the way, the row is split off into its own cluster instead.
fn warm_start(engine: &KMeansEngine, data: &Array2<f64>, fit: &KMeansFit) -> Option<KMeansFit> {
    let (row, distance) = fit.farthest_row(data)?;
    if distance <= 0.0 {
        return None;
    }

    let mut centroids = fit.centroids.clone();
    centroids.push_row(data.row(row)).ok()?;

    match engine.fit_from(data, centroids) {
        Ok(grown) => Some(grown),
        Err(error) => {
            tracing::debug!(k = fit.k + 1, %error, "warm start degenerate, splitting farthest row");
            fit.split_off(data, row).ok()
        }
    }
}
