//! Symbol-labelled cluster model.

use crate::error::{ClusterError, Result};
use crate::kmeans::KMeansFit;
use ndarray::Array2;
use std::collections::HashMap;

/// A chosen partition of symbols into k clusters.
///
/// Immutable once built. Assignment order follows the row order of the
/// matrix the model was fitted on.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterModel {
    k: usize,
    centroids: Array2<f64>,
    assignment: Vec<(String, usize)>,
    index: HashMap<String, usize>,
    inertia: f64,
}

impl ClusterModel {
    /// Build a model from explicit parts.
    ///
    /// # Errors
    /// `InvalidParameter` if a label is not below `k`, a symbol repeats, or
    /// the centroid matrix does not have `k` rows.
    pub fn new(
        k: usize,
        centroids: Array2<f64>,
        assignment: Vec<(String, usize)>,
        inertia: f64,
    ) -> Result<Self> {
        if centroids.nrows() != k {
            return Err(ClusterError::InvalidParameter(format!(
                "expected {k} centroid rows, got {}",
                centroids.nrows()
            )));
        }

        let mut index = HashMap::with_capacity(assignment.len());
        for (position, (symbol, cluster)) in assignment.iter().enumerate() {
            if *cluster >= k {
                return Err(ClusterError::InvalidParameter(format!(
                    "cluster {cluster} of {symbol} is out of range for k={k}"
                )));
            }
            if index.insert(symbol.clone(), position).is_some() {
                return Err(ClusterError::InvalidParameter(format!(
                    "symbol {symbol} assigned twice"
                )));
            }
        }

        Ok(Self {
            k,
            centroids,
            assignment,
            index,
            inertia,
        })
    }

    /// Label the rows of a fit with the symbols of the fitted matrix.
    pub fn from_fit(symbols: &[String], fit: KMeansFit) -> Result<Self> {
        if symbols.len() != fit.labels.len() {
            return Err(ClusterError::SymbolCountMismatch {
                symbols: symbols.len(),
                rows: fit.labels.len(),
            });
        }

        let assignment = symbols.iter().cloned().zip(fit.labels).collect();
        Self::new(fit.k, fit.centroids, assignment, fit.inertia)
    }

    /// Number of clusters.
    pub const fn k(&self) -> usize {
        self.k
    }

    /// Cluster centroids, one row per cluster.
    pub const fn centroids(&self) -> &Array2<f64> {
        &self.centroids
    }

    /// (symbol, cluster) pairs in model order.
    pub fn assignment(&self) -> &[(String, usize)] {
        &self.assignment
    }

    /// Within-cluster sum of squares.
    pub const fn inertia(&self) -> f64 {
        self.inertia
    }

    /// Number of assigned symbols.
    pub fn len(&self) -> usize {
        self.assignment.len()
    }

    /// True when no symbol is assigned.
    pub fn is_empty(&self) -> bool {
        self.assignment.is_empty()
    }

    /// Cluster of a symbol.
    pub fn cluster_of(&self, symbol: &str) -> Option<usize> {
        self.index.get(symbol).map(|&i| self.assignment[i].1)
    }

    /// Symbols of one cluster, in model order.
    pub fn members(&self, cluster: usize) -> Vec<&str> {
        self.assignment
            .iter()
            .filter(|(_, c)| *c == cluster)
            .map(|(s, _)| s.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn fit() -> KMeansFit {
        KMeansFit {
            k: 2,
            centroids: array![[0.0], [1.0]],
            labels: vec![1, 0, 1],
            inertia: 0.5,
            iterations: 2,
            restart: 0,
            converged: true,
        }
    }

    #[test]
    fn test_from_fit() {
        let symbols = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let model = ClusterModel::from_fit(&symbols, fit()).unwrap();

        assert_eq!(model.k(), 2);
        assert_eq!(model.len(), 3);
        assert_eq!(model.cluster_of("A"), Some(1));
        assert_eq!(model.cluster_of("B"), Some(0));
        assert_eq!(model.cluster_of("Z"), None);
        assert_eq!(model.members(1), vec!["A", "C"]);
    }

    #[test]
    fn test_symbol_count_mismatch() {
        let symbols = vec!["A".to_string()];
        let err = ClusterModel::from_fit(&symbols, fit()).unwrap_err();
        assert_eq!(err, ClusterError::SymbolCountMismatch { symbols: 1, rows: 3 });
    }

    #[test]
    fn test_rejects_out_of_range_label() {
        let err = ClusterModel::new(1, array![[0.0]], vec![("A".to_string(), 1)], 0.0).unwrap_err();
        assert!(matches!(err, ClusterError::InvalidParameter(_)));
    }

    #[test]
    fn test_empty_model() {
        let model = ClusterModel::new(1, array![[0.0]], Vec::new(), 0.0).unwrap();
        assert!(model.is_empty());
    }
}
