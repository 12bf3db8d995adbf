//! Terminal and Markdown reports for sweeps and segmentations.

use crate::join::{ClusterSummary, SegmentationTable};
use chrono::{DateTime, Utc};
use comove_cluster::SweepResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Members listed per cluster in the terminal table before truncating.
const MAX_LISTED_MEMBERS: usize = 8;

/// One row of the scree table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeRow {
    /// Number of clusters.
    pub k: usize,
    /// Inertia of the best restart.
    pub inertia: f64,
    /// Inertia drop from the previous completed k.
    pub delta: Option<f64>,
    /// `delta` as a percentage of the previous inertia.
    pub improvement_pct: Option<f64>,
    /// Mean silhouette coefficient, when computed.
    pub silhouette: Option<f64>,
}

/// Scree (elbow) report of a sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeReport {
    /// Report generation timestamp.
    pub generated_at: DateTime<Utc>,
    /// Completed k values, ascending.
    pub rows: Vec<ScreeRow>,
    /// (k, error message) for every failed k.
    pub failures: Vec<(usize, String)>,
    /// k values not completed before the deadline.
    pub pending: Vec<usize>,
}

impl ScreeReport {
    /// Build the report from a sweep outcome.
    pub fn from_sweep(result: &SweepResult) -> Self {
        let mut rows = Vec::with_capacity(result.points().len());
        let mut previous: Option<f64> = None;

        for point in result.points() {
            let delta = previous.map(|p| p - point.inertia);
            let improvement_pct = previous
                .zip(delta)
                .filter(|(p, _)| p.abs() > 1e-12)
                .map(|(p, d)| d / p * 100.0);

            rows.push(ScreeRow {
                k: point.k,
                inertia: point.inertia,
                delta,
                improvement_pct,
                silhouette: point.silhouette,
            });
            previous = Some(point.inertia);
        }

        Self {
            generated_at: Utc::now(),
            rows,
            failures: result
                .failures()
                .iter()
                .map(|f| (f.k, f.error.to_string()))
                .collect(),
            pending: result.pending().to_vec(),
        }
    }

    fn has_silhouette(&self) -> bool {
        self.rows.iter().any(|r| r.silhouette.is_some())
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str("\nScree Curve\n");
        output.push_str(&"=".repeat(80));
        output.push('\n');
        output.push_str(&format!(
            "{:>6} {:>18} {:>18} {:>14} {:>12}\n",
            "k", "Inertia", "Delta", "Improvement", "Silhouette"
        ));
        output.push_str(&"-".repeat(80));
        output.push('\n');

        for row in &self.rows {
            output.push_str(&format!(
                "{:>6} {:>18.6} {:>18} {:>14} {:>12}\n",
                row.k,
                row.inertia,
                fmt_opt(row.delta, 6),
                row.improvement_pct
                    .map_or_else(|| "-".to_string(), |v| format!("{v:.2}%")),
                fmt_opt(row.silhouette, 4),
            ));
        }

        if !self.failures.is_empty() {
            output.push_str("\nFailed:\n");
            output.push_str(&"-".repeat(80));
            output.push('\n');
            for (k, error) in &self.failures {
                output.push_str(&format!("  k={k:<4} {error}\n"));
            }
        }
        if !self.pending.is_empty() {
            output.push_str(&format!("\nPending (deadline elapsed): {:?}\n", self.pending));
        }

        output.push_str(&"=".repeat(80));
        output.push('\n');
        output
    }

    /// Format as Markdown for documentation.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str("# Scree Curve\n\n");
        output.push_str(&format!(
            "**Generated:** {}\n\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));

        let silhouette = self.has_silhouette();
        output.push_str("## Inertia by k\n\n");
        if silhouette {
            output.push_str("| k | Inertia | Delta | Improvement | Silhouette |\n");
            output.push_str("|---|---------|-------|-------------|------------|\n");
        } else {
            output.push_str("| k | Inertia | Delta | Improvement |\n");
            output.push_str("|---|---------|-------|-------------|\n");
        }
        for row in &self.rows {
            output.push_str(&format!(
                "| {} | {:.6} | {} | {} |",
                row.k,
                row.inertia,
                fmt_opt(row.delta, 6),
                row.improvement_pct
                    .map_or_else(|| "-".to_string(), |v| format!("{v:.2}%")),
            ));
            if silhouette {
                output.push_str(&format!(" {} |", fmt_opt(row.silhouette, 4)));
            }
            output.push('\n');
        }

        if !self.failures.is_empty() {
            output.push_str("\n## Failed\n\n");
            for (k, error) in &self.failures {
                output.push_str(&format!("- **k={k}:** {error}\n"));
            }
        }
        if !self.pending.is_empty() {
            output.push_str("\n## Pending\n\n");
            let ks: Vec<String> = self.pending.iter().map(ToString::to_string).collect();
            output.push_str(&format!("Not completed before the deadline: {}\n", ks.join(", ")));
        }

        output
    }

    /// Convert report to JSON string.
    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for ScreeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scree curve ({} points)", self.rows.len())?;
        for row in &self.rows {
            writeln!(f, "  k={:<4} inertia={:.6}", row.k, row.inertia)?;
        }
        if !self.failures.is_empty() {
            writeln!(f, "  failed: {}", self.failures.len())?;
        }
        if !self.pending.is_empty() {
            writeln!(f, "  pending: {:?}", self.pending)?;
        }
        Ok(())
    }
}

/// Cluster composition report of a segmentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationReport {
    /// Report generation timestamp.
    pub generated_at: DateTime<Utc>,
    /// Number of clusters of the model.
    pub k: usize,
    /// Symbols in the segmentation.
    pub n_symbols: usize,
    /// Per-cluster summaries, ascending by cluster id.
    pub clusters: Vec<ClusterSummary>,
    /// Member symbols by cluster id.
    pub members: BTreeMap<usize, Vec<String>>,
    /// Symbols excluded for lack of a projection point.
    pub missing_projection: Vec<String>,
    /// Included symbols without metadata.
    pub missing_metadata: Vec<String>,
}

impl SegmentationReport {
    /// Build the report from a joined segmentation.
    pub fn from_table(table: &SegmentationTable) -> Self {
        let mut members: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for row in table.rows() {
            members.entry(row.cluster_id).or_default().push(row.symbol.clone());
        }

        Self {
            generated_at: Utc::now(),
            k: table.k(),
            n_symbols: table.len(),
            clusters: table.cluster_summaries(),
            members,
            missing_projection: table.missing_projection().to_vec(),
            missing_metadata: table.missing_metadata().to_vec(),
        }
    }

    fn members_of(&self, cluster_id: usize) -> &[String] {
        self.members
            .get(&cluster_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "\nSegmentation: {} symbols in {} clusters\n",
            self.n_symbols, self.k
        ));
        output.push_str(&"=".repeat(80));
        output.push('\n');
        output.push_str(&format!(
            "{:<8} {:>6} {:>12} {:>12}  {:<20}\n",
            "Cluster", "Size", "Center X", "Center Y", "Dominant Sector"
        ));
        output.push_str(&"-".repeat(80));
        output.push('\n');

        for cluster in &self.clusters {
            output.push_str(&format!(
                "{:<8} {:>6} {:>12.4} {:>12.4}  {:<20}\n",
                cluster.cluster_id,
                cluster.size,
                cluster.center.0,
                cluster.center.1,
                cluster.dominant_sector().unwrap_or("-"),
            ));

            let members = self.members_of(cluster.cluster_id);
            let listed: Vec<&str> = members
                .iter()
                .take(MAX_LISTED_MEMBERS)
                .map(String::as_str)
                .collect();
            let more = members.len().saturating_sub(MAX_LISTED_MEMBERS);
            if more > 0 {
                output.push_str(&format!("         {} (+{more} more)\n", listed.join(", ")));
            } else {
                output.push_str(&format!("         {}\n", listed.join(", ")));
            }
        }

        if !self.missing_projection.is_empty() {
            output.push_str(&format!(
                "\nExcluded (no projection point): {}\n",
                self.missing_projection.join(", ")
            ));
        }

        output.push_str(&"=".repeat(80));
        output.push('\n');
        output
    }

    /// Format as Markdown for documentation.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str("# Segmentation Report\n\n");
        output.push_str(&format!(
            "**Generated:** {}\n\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        output.push_str(&format!("- **Clusters:** {}\n", self.k));
        output.push_str(&format!("- **Symbols:** {}\n", self.n_symbols));
        if !self.missing_projection.is_empty() {
            output.push_str(&format!(
                "- **Excluded (no projection point):** {}\n",
                self.missing_projection.len()
            ));
        }
        if !self.missing_metadata.is_empty() {
            output.push_str(&format!(
                "- **Without metadata:** {}\n",
                self.missing_metadata.len()
            ));
        }
        output.push('\n');

        output.push_str("## Clusters\n\n");
        output.push_str("| Cluster | Size | Center | Sectors |\n");
        output.push_str("|---------|------|--------|---------|\n");
        for cluster in &self.clusters {
            let sectors: Vec<String> = cluster
                .sectors
                .iter()
                .map(|(s, c)| format!("{s} ({c})"))
                .collect();
            output.push_str(&format!(
                "| {} | {} | ({:.4}, {:.4}) | {} |\n",
                cluster.cluster_id,
                cluster.size,
                cluster.center.0,
                cluster.center.1,
                if sectors.is_empty() { "-".to_string() } else { sectors.join(", ") },
            ));
        }

        for cluster in &self.clusters {
            output.push_str(&format!("\n### Cluster {}\n\n", cluster.cluster_id));
            output.push_str(&self.members_of(cluster.cluster_id).join(", "));
            output.push('\n');
        }

        output
    }

    /// Convert report to JSON string.
    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the Markdown rendering to `path`.
    pub fn save_markdown(&self, path: &Path) -> Result<(), ReportError> {
        std::fs::write(path, self.to_markdown())?;
        Ok(())
    }
}

impl fmt::Display for SegmentationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Segmentation: {} symbols, k={}", self.n_symbols, self.k)?;
        for cluster in &self.clusters {
            writeln!(
                f,
                "  cluster {}: {} members ({})",
                cluster.cluster_id,
                cluster.size,
                cluster.dominant_sector().unwrap_or("no sector")
            )?;
        }
        Ok(())
    }
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.precision$}"))
}
