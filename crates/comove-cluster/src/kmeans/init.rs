//! Centroid initialization.

use crate::metrics::squared_distance;
use ndarray::{Array2, ArrayView2};
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Strategy for choosing the initial centroids of one restart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitMethod {
    /// k-means++: first centroid uniform, each next one sampled with
    /// probability proportional to its squared distance from the nearest
    /// centroid chosen so far.
    #[default]
    KMeansPlusPlus,
    /// k distinct rows sampled uniformly without replacement.
    RandomRows,
}

impl InitMethod {
    /// Row indices of the initial centroids.
    pub(crate) fn choose(self, data: ArrayView2<'_, f64>, k: usize, rng: &mut StdRng) -> Vec<usize> {
        match self {
            Self::KMeansPlusPlus => plus_plus(data, k, rng),
            Self::RandomRows => rand::seq::index::sample(rng, data.nrows(), k).into_vec(),
        }
    }
}

/// Copy the chosen rows into a centroid matrix.
pub(crate) fn centroids_from_rows(data: ArrayView2<'_, f64>, rows: &[usize]) -> Array2<f64> {
    let mut centroids = Array2::zeros((rows.len(), data.ncols()));
    for (c, &r) in rows.iter().enumerate() {
        centroids.row_mut(c).assign(&data.row(r));
    }
    centroids
}

fn plus_plus(data: ArrayView2<'_, f64>, k: usize, rng: &mut StdRng) -> Vec<usize> {
    let n = data.nrows();
    let mut chosen = Vec::with_capacity(k);
    chosen.push(rng.gen_range(0..n));

    let mut min_distances = vec![f64::INFINITY; n];

    while chosen.len() < k {
        let last = data.row(chosen[chosen.len() - 1]);
        for (i, row) in data.outer_iter().enumerate() {
            let d = squared_distance(row, last);
            if d < min_distances[i] {
                min_distances[i] = d;
            }
        }

        // All remaining rows coincide with a chosen centroid: fall back to a
        // uniform draw, the restart will then be degenerate.
        let next = match WeightedIndex::new(&min_distances) {
            Ok(weights) => weights.sample(rng),
            Err(_) => rng.gen_range(0..n),
        };
        chosen.push(next);
    }

    chosen
}
