//! Lloyd iterations for a single restart.

use crate::metrics::{inertia, nearest_centroid};
use ndarray::{Array2, ArrayView2};

/// Outcome of one restart that kept every cluster populated.
#[derive(Debug, Clone)]
pub(crate) struct LloydRun {
    pub(crate) centroids: Array2<f64>,
    pub(crate) labels: Vec<usize>,
    pub(crate) inertia: f64,
    pub(crate) iterations: usize,
    pub(crate) converged: bool,
}

/// Alternate assignment and centroid update until no label changes or the
/// iteration cap is reached.
///
/// Returns `Err(cluster)` with the first cluster left without rows.
pub(crate) fn run(
    data: ArrayView2<'_, f64>,
    mut centroids: Array2<f64>,
    max_iterations: usize,
) -> Result<LloydRun, usize> {
    let k = centroids.nrows();
    let mut labels = vec![usize::MAX; data.nrows()];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iterations {
        iterations += 1;

        let changed = assign(data, &centroids, &mut labels);
        let counts = cluster_counts(&labels, k);
        if let Some(empty) = counts.iter().position(|&c| c == 0) {
            return Err(empty);
        }
        if !changed {
            converged = true;
            break;
        }

        centroids = update(data, &labels, &counts);
    }

    let inertia = inertia(&data, &labels, &centroids);

    Ok(LloydRun {
        centroids,
        labels,
        inertia,
        iterations,
        converged,
    })
}

/// Centroids and inertia of a fixed assignment, without iterating.
///
/// Returns `Err(cluster)` with the first cluster that has no rows.
pub(crate) fn settle(
    data: ArrayView2<'_, f64>,
    labels: Vec<usize>,
    k: usize,
) -> Result<LloydRun, usize> {
    let counts = cluster_counts(&labels, k);
    if let Some(empty) = counts.iter().position(|&c| c == 0) {
        return Err(empty);
    }
    let centroids = update(data, &labels, &counts);
    let inertia = inertia(&data, &labels, &centroids);

    Ok(LloydRun {
        centroids,
        labels,
        inertia,
        iterations: 0,
        converged: false,
    })
}

fn assign(data: ArrayView2<'_, f64>, centroids: &Array2<f64>, labels: &mut [usize]) -> bool {
    let mut changed = false;
    for (row, label) in data.outer_iter().zip(labels.iter_mut()) {
        let (nearest, _) = nearest_centroid(row, centroids);
        if *label != nearest {
            *label = nearest;
            changed = true;
        }
    }
    changed
}

fn cluster_counts(labels: &[usize], k: usize) -> Vec<usize> {
    let mut counts = vec![0; k];
    for &label in labels {
        counts[label] += 1;
    }
    counts
}

fn update(data: ArrayView2<'_, f64>, labels: &[usize], counts: &[usize]) -> Array2<f64> {
    let mut centroids = Array2::<f64>::zeros((counts.len(), data.ncols()));

    for (row, &label) in data.outer_iter().zip(labels.iter()) {
        let mut sum = centroids.row_mut(label);
        sum += &row;
    }
    for (mut centroid, &count) in centroids.outer_iter_mut().zip(counts.iter()) {
        centroid /= count as f64;
    }

    centroids
}
