//! Daily percentage returns from adjusted price series.
//!
//! For each symbol the retained prices (on or after the configured minimum
//! date) are sorted by date and every adjacent pair produces one return:
//!
//! r_i = (p_i - p_{i-1}) / p_{i-1}
//!
//! The first retained price has no predecessor and produces no return, so a
//! symbol needs at least two retained prices.

use crate::error::{DataError, Result};
use crate::types::{PriceObservation, ReturnObservation};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration for the return series builder
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnSeriesConfig {
    /// Observations strictly before this date are discarded (default: keep all)
    pub min_date: Option<NaiveDate>,
}

/// Converts per-symbol price series into per-symbol daily returns.
#[derive(Debug, Clone, Default)]
pub struct ReturnSeriesBuilder {
    config: ReturnSeriesConfig,
}

/// Outcome of building returns for a mixed set of symbols.
///
/// Symbols that fail are reported in `failures`, one error per symbol, and
/// contribute nothing to `returns`. Whether to exclude them or abort is up to
/// the caller.
#[derive(Debug, Default)]
pub struct ReturnBatch {
    /// Returns of every symbol that succeeded, grouped by symbol in first-seen order.
    pub returns: Vec<ReturnObservation>,
    /// One error per failing symbol.
    pub failures: Vec<DataError>,
}

impl ReturnBatch {
    /// True when no symbol failed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Symbols that failed, in first-seen order.
    pub fn failed_symbols(&self) -> Vec<&str> {
        self.failures.iter().filter_map(DataError::symbol).collect()
    }

    /// Convert into a plain result, failing with the first symbol error.
    pub fn into_result(self) -> Result<Vec<ReturnObservation>> {
        match self.failures.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(self.returns),
        }
    }
}

impl ReturnSeriesBuilder {
    /// Create a new builder with the given configuration
    pub const fn new(config: ReturnSeriesConfig) -> Self {
        Self { config }
    }

    /// Create a builder that discards observations before `min_date`.
    pub const fn with_min_date(min_date: NaiveDate) -> Self {
        Self::new(ReturnSeriesConfig {
            min_date: Some(min_date),
        })
    }

    /// Get the configuration.
    pub const fn config(&self) -> &ReturnSeriesConfig {
        &self.config
    }

    /// Build the return series of a single symbol.
    ///
    /// `prices` are the observations of `symbol`, in any order.
    ///
    /// # Errors
    /// * `InsufficientHistory` if fewer than two prices remain after the cutoff
    /// * `InvalidPrice` if a retained price is not a positive finite number
    /// * `DuplicateObservation` if two retained prices share a date
    pub fn build_symbol(
        &self,
        symbol: &str,
        prices: &[PriceObservation],
    ) -> Result<Vec<ReturnObservation>> {
        self.returns_for(symbol, prices.iter().collect())
    }

    /// Build returns for a sequence mixing several symbols.
    pub fn build(&self, prices: &[PriceObservation]) -> ReturnBatch {
        let mut order: Vec<&str> = Vec::new();
        let mut groups: HashMap<&str, Vec<&PriceObservation>> = HashMap::new();

        for price in prices {
            groups
                .entry(price.symbol.as_str())
                .or_insert_with(|| {
                    order.push(price.symbol.as_str());
                    Vec::new()
                })
                .push(price);
        }

        let mut batch = ReturnBatch::default();
        for symbol in order {
            let group = groups.remove(symbol).unwrap_or_default();
            match self.returns_for(symbol, group) {
                Ok(returns) => batch.returns.extend(returns),
                Err(err) => batch.failures.push(err),
            }
        }

        tracing::debug!(
            returns = batch.returns.len(),
            failures = batch.failures.len(),
            "built return series"
        );

        batch
    }

    fn returns_for(
        &self,
        symbol: &str,
        prices: Vec<&PriceObservation>,
    ) -> Result<Vec<ReturnObservation>> {
        let mut retained: Vec<&PriceObservation> = prices
            .into_iter()
            .filter(|p| self.config.min_date.is_none_or(|cutoff| p.date >= cutoff))
            .collect();

        if let Some(bad) = retained
            .iter()
            .find(|p| !(p.adjusted_price.is_finite() && p.adjusted_price > 0.0))
        {
            return Err(DataError::InvalidPrice {
                symbol: symbol.to_string(),
                date: bad.date,
                price: bad.adjusted_price,
            });
        }

        retained.sort_by_key(|p| p.date);

        if let Some(pair) = retained.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(DataError::DuplicateObservation {
                symbol: symbol.to_string(),
                date: pair[0].date,
            });
        }

        if retained.len() < 2 {
            return Err(DataError::InsufficientHistory {
                symbol: symbol.to_string(),
                observations: retained.len(),
            });
        }

        let returns = retained
            .windows(2)
            .map(|w| {
                let prev = w[0].adjusted_price;
                ReturnObservation::new(symbol, w[1].date, (w[1].adjusted_price - prev) / prev)
            })
            .collect();

        Ok(returns)
    }
}

/// Rebuild a price path from an initial price and a symbol's returns.
///
/// The output starts with `initial` and has one more element than `returns`.
pub fn reconstruct_prices(initial: f64, returns: &[ReturnObservation]) -> Vec<f64> {
    let mut prices = Vec::with_capacity(returns.len() + 1);
    prices.push(initial);

    let mut current = initial;
    for r in returns {
        current *= 1.0 + r.pct_return;
        prices.push(current);
    }

    prices
}
