//! Cluster quality metrics.
//!
//! All distances are squared Euclidean unless stated otherwise, computed in
//! double precision.

use ndarray::{Array2, ArrayBase, ArrayView1, Axis, Data, Ix2};

/// Squared Euclidean distance between two vectors of equal length.
pub fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Index of the nearest centroid, lowest index on ties.
pub fn nearest_centroid(row: ArrayView1<'_, f64>, centroids: &Array2<f64>) -> (usize, f64) {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;

    for (j, centroid) in centroids.outer_iter().enumerate() {
        let d = squared_distance(row, centroid);
        if d < best_distance {
            best_distance = d;
            best = j;
        }
    }

    (best, best_distance)
}

/// Within-cluster sum of squares.
///
/// Sum over rows of the squared distance to the assigned centroid. This is a
/// sum, not a mean: values for matrices with different row counts are not
/// comparable without normalization.
pub fn inertia<S>(data: &ArrayBase<S, Ix2>, labels: &[usize], centroids: &Array2<f64>) -> f64
where
    S: Data<Elem = f64>,
{
    data.outer_iter()
        .zip(labels.iter())
        .map(|(row, &label)| squared_distance(row, centroids.row(label)))
        .sum()
}

/// Sum of squared distances from every row to the mean row.
///
/// Equal to the inertia of the single-cluster partition. Zero for an empty
/// matrix.
pub fn total_sum_of_squares(data: &Array2<f64>) -> f64 {
    let Some(mean) = data.mean_axis(Axis(0)) else {
        return 0.0;
    };

    data.outer_iter()
        .map(|row| squared_distance(row, mean.view()))
        .sum()
}

/// Mean silhouette coefficient over all rows.
///
/// For row i with mean intra-cluster distance a(i) and smallest mean distance
/// to another cluster b(i), s(i) = (b - a) / max(a, b). Rows in singleton
/// clusters score 0. Returns `None` unless there are at least two non-empty
/// clusters and more rows than clusters. Cost is quadratic in the row count.
pub fn silhouette_score(data: &Array2<f64>, labels: &[usize], k: usize) -> Option<f64> {
    let n = data.nrows();
    if labels.len() != n || k < 2 || n <= k {
        return None;
    }

    let mut sizes = vec![0usize; k];
    for &label in labels {
        *sizes.get_mut(label)? += 1;
    }
    if sizes.iter().filter(|&&s| s > 0).count() < 2 {
        return None;
    }

    let mut total = 0.0;
    let mut sums = vec![0.0; k];

    for i in 0..n {
        sums.iter_mut().for_each(|s| *s = 0.0);
        let row = data.row(i);

        for j in 0..n {
            if i != j {
                sums[labels[j]] += squared_distance(row, data.row(j)).sqrt();
            }
        }

        let own = labels[i];
        if sizes[own] <= 1 {
            continue;
        }

        let a = sums[own] / (sizes[own] - 1) as f64;
        let b = (0..k)
            .filter(|&c| c != own && sizes[c] > 0)
            .map(|c| sums[c] / sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);

        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }

    Some(total / n as f64)
}
