//! Pipeline configuration from a JSON file plus command-line overrides.

use chrono::NaiveDate;
use clap::Args;
use comove::{FillPolicy, PipelineConfig, SweepConfig};
use std::path::PathBuf;

/// Inputs and options shared by every pipeline command.
#[derive(Debug, Args)]
pub(crate) struct InputArgs {
    /// CSV of adjusted prices with columns symbol,date,adjusted_price
    #[arg(long)]
    pub(crate) prices: PathBuf,

    /// JSON pipeline configuration (see `comove config`)
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,

    /// Discard prices dated before this day (YYYY-MM-DD)
    #[arg(long)]
    pub(crate) min_date: Option<NaiveDate>,

    /// Drop symbols missing any date instead of filling with zero returns
    #[arg(long)]
    pub(crate) drop_incomplete: bool,

    /// Fail on symbols with fewer than two prices instead of excluding them
    #[arg(long)]
    pub(crate) strict_history: bool,

    /// Base seed of the k-means restarts
    #[arg(long)]
    pub(crate) seed: Option<u64>,

    /// Valid k-means restarts per k
    #[arg(long)]
    pub(crate) restarts: Option<usize>,
}

impl InputArgs {
    /// Configuration file (or defaults) with the flags applied on top.
    pub(crate) fn resolve(&self) -> comove::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(min_date) = self.min_date {
            config.returns.min_date = Some(min_date);
        }
        if self.drop_incomplete {
            config.fill_policy = FillPolicy::DropIncomplete;
        }
        if self.strict_history {
            config.skip_insufficient_history = false;
        }
        if let Some(seed) = self.seed {
            config.kmeans.seed = seed;
        }
        if let Some(restarts) = self.restarts {
            config.kmeans.n_init = restarts;
        }

        Ok(config)
    }
}

/// Sweep range and scheduling overrides.
#[derive(Debug, Args)]
pub(crate) struct SweepArgs {
    /// Smallest k
    #[arg(long)]
    pub(crate) k_min: Option<usize>,

    /// Largest k (capped at the number of symbols)
    #[arg(long)]
    pub(crate) k_max: Option<usize>,

    /// k values fitted concurrently
    #[arg(long)]
    pub(crate) workers: Option<usize>,

    /// Stop the sweep after this many seconds
    #[arg(long)]
    pub(crate) timeout_secs: Option<u64>,

    /// Also compute the silhouette score of every k
    #[arg(long)]
    pub(crate) silhouette: bool,
}

impl SweepArgs {
    pub(crate) fn apply(&self, sweep: &mut SweepConfig) {
        if let Some(k_min) = self.k_min {
            sweep.k_min = k_min;
        }
        if let Some(k_max) = self.k_max {
            sweep.k_max = k_max;
        }
        if let Some(workers) = self.workers {
            sweep.workers = workers;
        }
        if self.timeout_secs.is_some() {
            sweep.timeout_secs = self.timeout_secs;
        }
        if self.silhouette {
            sweep.silhouette = true;
        }
    }
}
