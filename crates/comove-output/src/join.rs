//! Join of cluster labels with projection coordinates and company metadata.
//!
//! - projection points: inner join, symbols without a point are excluded
//! - metadata: left join, symbols without metadata keep empty company/sector
//!
//! Rows follow the assignment order of the cluster model. If a symbol appears
//! more than once in the points or the metadata, the first occurrence is used.

use comove_cluster::ClusterModel;
use comove_data::{CompanyMetadata, ProjectionPoint};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Errors that can occur while joining.
#[derive(Debug, Error)]
pub enum JoinError {
    /// The cluster model assigns no symbol.
    #[error("Cluster model has an empty assignment")]
    EmptyAssignment,

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}

/// One symbol of the final segmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationResult {
    /// Ticker symbol.
    pub symbol: String,
    /// Cluster index in `[0, k)`.
    pub cluster_id: usize,
    /// First projection coordinate.
    pub x: f64,
    /// Second projection coordinate.
    pub y: f64,
    /// Company name, if metadata was available.
    pub company: Option<String>,
    /// Sector, if metadata was available.
    pub sector: Option<String>,
}

/// Per-cluster size and sector composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    /// Cluster index.
    pub cluster_id: usize,
    /// Number of rows in the cluster.
    pub size: usize,
    /// Mean projection coordinate of the members.
    pub center: (f64, f64),
    /// (sector, count), most frequent first. Missing sectors are omitted.
    pub sectors: Vec<(String, usize)>,
}

impl ClusterSummary {
    /// Most frequent sector, if any member has one.
    pub fn dominant_sector(&self) -> Option<&str> {
        self.sectors.first().map(|(s, _)| s.as_str())
    }
}

/// Joined segmentation with bookkeeping of excluded and incomplete symbols.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationTable {
    k: usize,
    rows: Vec<SegmentationResult>,
    missing_projection: Vec<String>,
    missing_metadata: Vec<String>,
}

impl SegmentationTable {
    /// Number of clusters of the underlying model.
    pub const fn k(&self) -> usize {
        self.k
    }

    /// Result rows.
    pub fn rows(&self) -> &[SegmentationResult] {
        &self.rows
    }

    /// Number of result rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when no symbol had a projection point.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Symbols excluded because they had no projection point.
    pub fn missing_projection(&self) -> &[String] {
        &self.missing_projection
    }

    /// Included symbols that had no metadata.
    pub fn missing_metadata(&self) -> &[String] {
        &self.missing_metadata
    }

    /// Row of a symbol.
    pub fn get(&self, symbol: &str) -> Option<&SegmentationResult> {
        self.rows.iter().find(|r| r.symbol == symbol)
    }

    /// Output frame with columns `symbol`, `cluster_id`, `x`, `y`, `company`, `sector`.
    pub fn to_dataframe(&self) -> Result<DataFrame, JoinError> {
        let symbols: Vec<&str> = self.rows.iter().map(|r| r.symbol.as_str()).collect();
        let clusters: Vec<u64> = self.rows.iter().map(|r| r.cluster_id as u64).collect();
        let xs: Vec<f64> = self.rows.iter().map(|r| r.x).collect();
        let ys: Vec<f64> = self.rows.iter().map(|r| r.y).collect();
        let companies: Vec<Option<&str>> =
            self.rows.iter().map(|r| r.company.as_deref()).collect();
        let sectors: Vec<Option<&str>> = self.rows.iter().map(|r| r.sector.as_deref()).collect();

        Ok(DataFrame::new(vec![
            Column::new("symbol".into(), symbols),
            Column::new("cluster_id".into(), clusters),
            Column::new("x".into(), xs),
            Column::new("y".into(), ys),
            Column::new("company".into(), companies),
            Column::new("sector".into(), sectors),
        ])?)
    }

    /// Size, center and sector composition of every cluster with rows.
    pub fn cluster_summaries(&self) -> Vec<ClusterSummary> {
        let mut groups: BTreeMap<usize, Vec<&SegmentationResult>> = BTreeMap::new();
        for row in &self.rows {
            groups.entry(row.cluster_id).or_default().push(row);
        }

        groups
            .into_iter()
            .map(|(cluster_id, members)| {
                let size = members.len();
                let center = (
                    members.iter().map(|r| r.x).sum::<f64>() / size as f64,
                    members.iter().map(|r| r.y).sum::<f64>() / size as f64,
                );

                let mut counts: HashMap<&str, usize> = HashMap::new();
                for sector in members.iter().filter_map(|r| r.sector.as_deref()) {
                    *counts.entry(sector).or_insert(0) += 1;
                }
                let mut sectors: Vec<(String, usize)> = counts
                    .into_iter()
                    .map(|(s, c)| (s.to_string(), c))
                    .collect();
                sectors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

                ClusterSummary {
                    cluster_id,
                    size,
                    center,
                    sectors,
                }
            })
            .collect()
    }
}

/// Merges cluster labels with projection points and company metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClusterProjectionJoiner;

impl ClusterProjectionJoiner {
    /// Create a new joiner.
    pub const fn new() -> Self {
        Self
    }

    /// Join `model` with `points` and `metadata`.
    ///
    /// # Errors
    /// `EmptyAssignment` if the model assigns no symbol.
    pub fn join(
        &self,
        model: &ClusterModel,
        points: &[ProjectionPoint],
        metadata: &[CompanyMetadata],
    ) -> Result<SegmentationTable, JoinError> {
        if model.is_empty() {
            return Err(JoinError::EmptyAssignment);
        }

        let points = first_by_symbol(points, |p| &p.symbol, "projection point");
        let metadata = first_by_symbol(metadata, |m| &m.symbol, "metadata");

        let mut table = SegmentationTable {
            k: model.k(),
            rows: Vec::with_capacity(model.len()),
            missing_projection: Vec::new(),
            missing_metadata: Vec::new(),
        };

        for (symbol, cluster) in model.assignment() {
            let Some(point) = points.get(symbol.as_str()) else {
                table.missing_projection.push(symbol.clone());
                continue;
            };
            let meta = metadata.get(symbol.as_str());
            if meta.is_none() {
                table.missing_metadata.push(symbol.clone());
            }

            table.rows.push(SegmentationResult {
                symbol: symbol.clone(),
                cluster_id: *cluster,
                x: point.x,
                y: point.y,
                company: meta.map(|m| m.company.clone()),
                sector: meta.map(|m| m.sector.clone()),
            });
        }

        if !table.missing_projection.is_empty() {
            tracing::warn!(
                symbols = ?table.missing_projection,
                "excluding symbols without projection point"
            );
        }
        if !table.missing_metadata.is_empty() {
            tracing::debug!(
                symbols = ?table.missing_metadata,
                "symbols without metadata"
            );
        }
        tracing::info!(rows = table.rows.len(), k = table.k, "joined segmentation");

        Ok(table)
    }
}

fn first_by_symbol<'a, T>(
    records: &'a [T],
    symbol: impl Fn(&T) -> &String,
    kind: &str,
) -> HashMap<&'a str, &'a T> {
    let mut index: HashMap<&str, &T> = HashMap::with_capacity(records.len());
    for record in records {
        let key = symbol(record).as_str();
        if index.contains_key(key) {
            tracing::warn!(symbol = key, kind, "duplicate record ignored");
        } else {
            index.insert(key, record);
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn model(assignment: &[(&str, usize)]) -> ClusterModel {
        ClusterModel::new(
            2,
            Array2::zeros((2, 3)),
            assignment.iter().map(|(s, c)| (s.to_string(), *c)).collect(),
            0.0,
        )
        .unwrap()
    }

    #[test]
    fn test_inner_join_on_points_left_join_on_metadata() {
        let model = model(&[("A", 0), ("B", 0), ("C", 1)]);
        let points = vec![ProjectionPoint::new("A", 1.0, 2.0), ProjectionPoint::new("C", -1.0, 0.5)];
        let metadata = vec![CompanyMetadata::new("A", "Alpha Inc", "Technology")];

        let table = ClusterProjectionJoiner::new()
            .join(&model, &points, &metadata)
            .unwrap();

        assert_eq!(table.len(), 2);
        assert!(table.get("B").is_none());
        assert_eq!(table.missing_projection(), &["B".to_string()]);
        assert_eq!(table.missing_metadata(), &["C".to_string()]);

        let c = table.get("C").unwrap();
        assert_eq!(c.cluster_id, 1);
        assert_eq!(c.company, None);
        assert_eq!(c.sector, None);

        let a = table.get("A").unwrap();
        assert_eq!(a.company.as_deref(), Some("Alpha Inc"));
        assert_eq!((a.x, a.y), (1.0, 2.0));
    }

    #[test]
    fn test_empty_assignment() {
        let model = ClusterModel::new(1, Array2::zeros((1, 1)), Vec::new(), 0.0).unwrap();
        let err = ClusterProjectionJoiner::new()
            .join(&model, &[], &[])
            .unwrap_err();
        assert!(matches!(err, JoinError::EmptyAssignment));
    }

    #[test]
    fn test_first_duplicate_wins() {
        let model = model(&[("A", 0)]);
        let points = vec![ProjectionPoint::new("A", 1.0, 1.0), ProjectionPoint::new("A", 9.0, 9.0)];
        let metadata = vec![
            CompanyMetadata::new("A", "First", "Energy"),
            CompanyMetadata::new("A", "Second", "Utilities"),
        ];

        let table = ClusterProjectionJoiner::new()
            .join(&model, &points, &metadata)
            .unwrap();

        let a = table.get("A").unwrap();
        assert_eq!(a.x, 1.0);
        assert_eq!(a.company.as_deref(), Some("First"));
    }

    #[test]
    fn test_rows_follow_assignment_order() {
        let model = model(&[("Z", 1), ("A", 0), ("M", 1)]);
        let points = vec![
            ProjectionPoint::new("A", 0.0, 0.0),
            ProjectionPoint::new("M", 0.0, 0.0),
            ProjectionPoint::new("Z", 0.0, 0.0),
        ];

        let table = ClusterProjectionJoiner::new().join(&model, &points, &[]).unwrap();
        let order: Vec<&str> = table.rows().iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(order, vec!["Z", "A", "M"]);
    }

    #[test]
    fn test_cluster_summaries() {
        let model = model(&[("A", 0), ("B", 0), ("C", 0), ("D", 1)]);
        let points = vec![
            ProjectionPoint::new("A", 0.0, 0.0),
            ProjectionPoint::new("B", 2.0, 0.0),
            ProjectionPoint::new("C", 1.0, 3.0),
            ProjectionPoint::new("D", 5.0, 5.0),
        ];
        let metadata = vec![
            CompanyMetadata::new("A", "A Co", "Energy"),
            CompanyMetadata::new("B", "B Co", "Energy"),
            CompanyMetadata::new("C", "C Co", "Utilities"),
        ];

        let table = ClusterProjectionJoiner::new()
            .join(&model, &points, &metadata)
            .unwrap();
        let summaries = table.cluster_summaries();

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].size, 3);
        assert_eq!(summaries[0].center, (1.0, 1.0));
        assert_eq!(summaries[0].dominant_sector(), Some("Energy"));
        assert_eq!(
            summaries[0].sectors,
            vec![("Energy".to_string(), 2), ("Utilities".to_string(), 1)]
        );
        assert_eq!(summaries[1].dominant_sector(), None);
    }

    #[test]
    fn test_to_dataframe() {
        let model = model(&[("A", 0), ("B", 1)]);
        let points = vec![ProjectionPoint::new("A", 1.0, 2.0), ProjectionPoint::new("B", 3.0, 4.0)];
        let metadata = vec![CompanyMetadata::new("A", "Alpha", "Tech")];

        let df = ClusterProjectionJoiner::new()
            .join(&model, &points, &metadata)
            .unwrap()
            .to_dataframe()
            .unwrap();

        assert_eq!(df.shape(), (2, 6));
        let companies = df.column("company").unwrap().str().unwrap();
        assert_eq!(companies.get(0), Some("Alpha"));
        assert_eq!(companies.get(1), None);
    }
}
