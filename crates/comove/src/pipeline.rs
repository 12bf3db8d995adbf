//! The segmentation pipeline as explicit stages.
//!
//! ```text
//! prices -> build_returns -> assemble_matrix -> run_sweep (scree curve)
//!                                            -> fit_model(k) -> project -> segment
//! ```
//!
//! Every stage takes its inputs by reference and returns a new value, so any
//! stage can be rerun or replaced in isolation.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use comove_cluster::{ClusterModel, KMeansEngine, ModelSweep, SweepResult};
use comove_data::{
    CompanyMetadata, DataError, FillPolicy, MatrixAssembler, PriceObservation, ProjectionPoint,
    ReturnMatrix, ReturnObservation, ReturnSeriesBuilder, ReturnSeriesConfig,
};
use comove_embed::{PcaProjection, ProjectionService, project_points};
use comove_output::{ClusterProjectionJoiner, SegmentationTable};
use std::sync::Arc;

/// Returns of the symbols that could be converted.
#[derive(Debug, Clone, Default)]
pub struct ReturnStage {
    /// Returns grouped by symbol.
    pub returns: Vec<ReturnObservation>,
    /// Symbols excluded for having fewer than two prices.
    pub excluded: Vec<String>,
}

/// Convert prices into returns.
///
/// With `skip_insufficient_history`, symbols with fewer than two prices are
/// excluded and listed in [`ReturnStage::excluded`]; otherwise the first one
/// aborts. Any other per-symbol error always aborts.
pub fn build_returns(
    config: &ReturnSeriesConfig,
    skip_insufficient_history: bool,
    prices: &[PriceObservation],
) -> Result<ReturnStage> {
    let batch = ReturnSeriesBuilder::new(config.clone()).build(prices);

    let mut stage = ReturnStage {
        returns: batch.returns,
        excluded: Vec::new(),
    };
    for failure in batch.failures {
        match failure {
            DataError::InsufficientHistory { symbol, observations }
                if skip_insufficient_history =>
            {
                tracing::warn!(%symbol, observations, "excluding symbol with insufficient history");
                stage.excluded.push(symbol);
            }
            other => return Err(PipelineError::Returns(other)),
        }
    }

    tracing::info!(
        returns = stage.returns.len(),
        excluded = stage.excluded.len(),
        "built return series"
    );
    Ok(stage)
}

/// Assemble the symbol x date matrix.
pub fn assemble_matrix(policy: FillPolicy, returns: &[ReturnObservation]) -> Result<ReturnMatrix> {
    MatrixAssembler::new(policy)
        .assemble(returns)
        .map_err(PipelineError::Matrix)
}

fn sweep_for(config: &PipelineConfig, matrix: &ReturnMatrix) -> Result<ModelSweep> {
    let engine = KMeansEngine::new(config.kmeans.clone()).map_err(PipelineError::Sweep)?;
    let sweep_config = config.sweep.capped_at(matrix.n_symbols());
    if sweep_config.k_max < config.sweep.k_max {
        tracing::info!(
            k_max = sweep_config.k_max,
            requested = config.sweep.k_max,
            "k_max capped at symbol count"
        );
    }
    ModelSweep::new(engine, sweep_config).map_err(PipelineError::Sweep)
}

/// Sequential sweep over the configured k range, capped at the symbol count.
///
/// Individual k failures are reported in the result, not as an error.
pub fn run_sweep(
    config: &PipelineConfig,
    matrix: &ReturnMatrix,
    progress: impl FnMut(usize),
) -> Result<SweepResult> {
    sweep_for(config, matrix)?
        .run_with_progress(matrix.values(), progress)
        .map_err(PipelineError::Sweep)
}

/// Concurrent sweep on the tokio blocking pool.
pub async fn run_sweep_concurrent(
    config: &PipelineConfig,
    matrix: &ReturnMatrix,
    progress: impl FnMut(usize),
) -> Result<SweepResult> {
    let sweep = sweep_for(config, matrix)?;
    sweep
        .run_concurrent_with_progress(Arc::new(matrix.values().clone()), progress)
        .await
        .map_err(PipelineError::Sweep)
}

/// Cluster model for `k`, reusing the sweep's fit when it has one.
pub fn fit_model(
    config: &PipelineConfig,
    matrix: &ReturnMatrix,
    k: usize,
    sweep: Option<&SweepResult>,
) -> Result<ClusterModel> {
    let cluster_err = |source| PipelineError::Cluster { k, source };

    let fit = match sweep.and_then(|s| s.fit(k)) {
        Some(fit) => {
            tracing::debug!(k, "reusing sweep fit");
            fit.clone()
        }
        None => KMeansEngine::new(config.kmeans.clone())
            .and_then(|engine| engine.fit(matrix.values(), k))
            .map_err(cluster_err)?,
    };

    let model = ClusterModel::from_fit(matrix.symbols(), fit).map_err(cluster_err)?;
    tracing::info!(k, inertia = model.inertia(), "fitted cluster model");
    Ok(model)
}

/// 2-D points for every matrix row.
pub fn project<S>(service: &S, matrix: &ReturnMatrix) -> Result<Vec<ProjectionPoint>>
where
    S: ProjectionService + ?Sized,
{
    Ok(project_points(service, matrix.symbols(), matrix.values())?)
}

/// Join the model with projection points and metadata.
pub fn segment(
    model: &ClusterModel,
    points: &[ProjectionPoint],
    metadata: &[CompanyMetadata],
) -> Result<SegmentationTable> {
    Ok(ClusterProjectionJoiner::new().join(model, points, metadata)?)
}

/// A validated configuration with the pipeline stages bound to it.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Validate `config` and create a pipeline.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Get the configuration.
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// See [`build_returns`].
    pub fn build_returns(&self, prices: &[PriceObservation]) -> Result<ReturnStage> {
        build_returns(
            &self.config.returns,
            self.config.skip_insufficient_history,
            prices,
        )
    }

    /// See [`assemble_matrix`].
    pub fn assemble_matrix(&self, returns: &[ReturnObservation]) -> Result<ReturnMatrix> {
        assemble_matrix(self.config.fill_policy, returns)
    }

    /// Prices straight to the return matrix.
    pub fn matrix_from_prices(&self, prices: &[PriceObservation]) -> Result<ReturnMatrix> {
        let stage = self.build_returns(prices)?;
        self.assemble_matrix(&stage.returns)
    }

    /// See [`run_sweep`].
    pub fn run_sweep(&self, matrix: &ReturnMatrix) -> Result<SweepResult> {
        run_sweep(&self.config, matrix, |_| {})
    }

    /// See [`run_sweep_concurrent`].
    pub async fn run_sweep_concurrent(&self, matrix: &ReturnMatrix) -> Result<SweepResult> {
        run_sweep_concurrent(&self.config, matrix, |_| {}).await
    }

    /// See [`fit_model`].
    pub fn fit_model(
        &self,
        matrix: &ReturnMatrix,
        k: usize,
        sweep: Option<&SweepResult>,
    ) -> Result<ClusterModel> {
        fit_model(&self.config, matrix, k, sweep)
    }

    /// Project with the built-in PCA.
    pub fn project(&self, matrix: &ReturnMatrix) -> Result<Vec<ProjectionPoint>> {
        let pca = PcaProjection::new(self.config.pca.clone())?;
        project(&pca, matrix)
    }

    /// See [`segment`].
    pub fn segment(
        &self,
        model: &ClusterModel,
        points: &[ProjectionPoint],
        metadata: &[CompanyMetadata],
    ) -> Result<SegmentationTable> {
        segment(model, points, metadata)
    }

    /// Prices to segmentation for a chosen `k`.
    ///
    /// Uses `points` when given, otherwise the built-in PCA projection.
    pub fn segment_prices(
        &self,
        prices: &[PriceObservation],
        metadata: &[CompanyMetadata],
        k: usize,
        points: Option<&[ProjectionPoint]>,
    ) -> Result<SegmentationTable> {
        let matrix = self.matrix_from_prices(prices)?;
        let model = self.fit_model(&matrix, k, None)?;
        let projected;
        let points = match points {
            Some(points) => points,
            None => {
                projected = self.project(&matrix)?;
                &projected
            }
        };
        self.segment(&model, points, metadata)
    }
}
