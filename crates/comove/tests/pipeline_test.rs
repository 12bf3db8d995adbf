//! End-to-end runs of the segmentation pipeline.

use approx::assert_relative_eq;
use chrono::NaiveDate;
use comove::{
    CompanyMetadata, CsvMetadataFile, CsvPriceFile, ExportFormat, Exporter, FillPolicy,
    MetadataSource, Pipeline, PipelineConfig, PriceObservation, PriceSource, ProjectionPoint,
    ScreeReport, Stage,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rstest::rstest;
use std::io::Write;
use tempfile::NamedTempFile;

fn day(n: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(u64::from(n))
}

fn path_from_returns(symbol: &str, returns: &[f64]) -> Vec<PriceObservation> {
    let mut price = 100.0;
    let mut out = vec![PriceObservation::new(symbol, day(0), price)];
    for (i, r) in returns.iter().enumerate() {
        price *= 1.0 + r;
        out.push(PriceObservation::new(symbol, day(i as u32 + 1), price));
    }
    out
}

/// Two groups moving in opposite directions, three symbols each.
fn two_group_universe() -> Vec<PriceObservation> {
    let base = [0.02, -0.01, 0.03, -0.02, 0.01, 0.015, -0.025];
    let mut prices = Vec::new();
    for (i, symbol) in ["TECH1", "TECH2", "TECH3"].iter().enumerate() {
        let noise = 0.001 * i as f64;
        let returns: Vec<f64> = base.iter().map(|r| r + noise).collect();
        prices.extend(path_from_returns(symbol, &returns));
    }
    for (i, symbol) in ["UTIL1", "UTIL2", "UTIL3"].iter().enumerate() {
        let noise = 0.001 * i as f64;
        let returns: Vec<f64> = base.iter().map(|r| -r + noise).collect();
        prices.extend(path_from_returns(symbol, &returns));
    }
    prices
}

fn metadata() -> Vec<CompanyMetadata> {
    vec![
        CompanyMetadata::new("TECH1", "Tech One", "Technology"),
        CompanyMetadata::new("TECH2", "Tech Two", "Technology"),
        CompanyMetadata::new("UTIL1", "Util One", "Utilities"),
        CompanyMetadata::new("UTIL2", "Util Two", "Utilities"),
        CompanyMetadata::new("UTIL3", "Util Three", "Utilities"),
    ]
}

fn config(k_min: usize, k_max: usize) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.sweep.k_min = k_min;
    config.sweep.k_max = k_max;
    config
}

#[test]
fn test_sweep_curve_is_monotone() {
    let pipeline = Pipeline::new(config(1, 6)).unwrap();
    let matrix = pipeline.matrix_from_prices(&two_group_universe()).unwrap();
    assert_eq!(matrix.n_symbols(), 6);
    assert_eq!(matrix.n_dates(), 7);

    let sweep = pipeline.run_sweep(&matrix).unwrap();
    assert!(sweep.is_complete());

    let curve = sweep.inertia_curve();
    assert_eq!(curve.len(), 6);
    for window in curve.windows(2) {
        assert!(window[1].1 <= window[0].1 + 1e-12);
    }
    assert!(curve.iter().all(|(_, inertia)| *inertia >= 0.0));
    // Six distinct rows and k = 6.
    assert_relative_eq!(curve[5].1, 0.0, epsilon = 1e-15);
}

/// 40 symbols with independent uniform daily returns in [-5%, 5%).
fn noise_universe(seed: u64) -> Vec<PriceObservation> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..40)
        .flat_map(|i| {
            let returns: Vec<f64> = (0..30).map(|_| rng.gen_range(-0.05..0.05)).collect();
            path_from_returns(&format!("S{i:02}"), &returns)
        })
        .collect()
}

#[test]
fn test_sweep_curve_is_monotone_without_structure() {
    let pipeline = Pipeline::new(config(1, 40)).unwrap();
    let matrix = pipeline.matrix_from_prices(&noise_universe(12)).unwrap();
    assert_eq!(matrix.values().dim(), (40, 30));

    let sweep = pipeline.run_sweep(&matrix).unwrap();
    assert!(sweep.monotonicity_violations().is_empty());
    for window in sweep.inertia_curve().windows(2) {
        assert!(window[1].1 <= window[0].1, "k={} to k={}", window[0].0, window[1].0);
    }
}

#[test]
fn test_k_max_is_capped_at_symbol_count() {
    let pipeline = Pipeline::new(config(2, 30)).unwrap();
    let matrix = pipeline.matrix_from_prices(&two_group_universe()).unwrap();

    let sweep = pipeline.run_sweep(&matrix).unwrap();
    let ks: Vec<usize> = sweep.points().iter().map(|p| p.k).collect();
    assert_eq!(ks, vec![2, 3, 4, 5, 6]);
}

#[test]
fn test_segment_groups_co_moving_symbols() {
    let pipeline = Pipeline::new(config(2, 4)).unwrap();
    let matrix = pipeline.matrix_from_prices(&two_group_universe()).unwrap();
    let sweep = pipeline.run_sweep(&matrix).unwrap();

    let model = pipeline.fit_model(&matrix, 2, Some(&sweep)).unwrap();
    let points = pipeline.project(&matrix).unwrap();
    let table = pipeline.segment(&model, &points, &metadata()).unwrap();

    assert_eq!(table.len(), 6);
    let tech = table.get("TECH1").unwrap().cluster_id;
    let util = table.get("UTIL1").unwrap().cluster_id;
    assert_ne!(tech, util);
    for symbol in ["TECH2", "TECH3"] {
        assert_eq!(table.get(symbol).unwrap().cluster_id, tech);
    }
    for symbol in ["UTIL2", "UTIL3"] {
        assert_eq!(table.get(symbol).unwrap().cluster_id, util);
    }

    // Left join on metadata.
    assert_eq!(table.get("TECH3").unwrap().sector, None);
    assert_eq!(table.missing_metadata(), &["TECH3".to_string()]);

    // The two groups are far apart on the first axis.
    let tech_x = table.get("TECH1").unwrap().x;
    let util_x = table.get("UTIL1").unwrap().x;
    assert!((tech_x - util_x).abs() > 0.01);
}

#[test]
fn test_external_points_inner_join() {
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let points = vec![
        ProjectionPoint::new("TECH1", 0.0, 0.0),
        ProjectionPoint::new("UTIL1", 1.0, 1.0),
    ];

    let table = pipeline
        .segment_prices(&two_group_universe(), &metadata(), 2, Some(&points))
        .unwrap();

    assert_eq!(table.len(), 2);
    assert_eq!(table.missing_projection().len(), 4);
}

#[test]
fn test_fit_is_reused_from_sweep() {
    let pipeline = Pipeline::new(config(2, 3)).unwrap();
    let matrix = pipeline.matrix_from_prices(&two_group_universe()).unwrap();
    let sweep = pipeline.run_sweep(&matrix).unwrap();

    let reused = pipeline.fit_model(&matrix, 3, Some(&sweep)).unwrap();
    let fresh = pipeline.fit_model(&matrix, 3, None).unwrap();
    assert_eq!(reused.assignment(), fresh.assignment());
    assert_eq!(reused.inertia(), fresh.inertia());
}

#[test]
fn test_missing_date_filled_with_zero() {
    // X has no price on day 2, so no return on day 2.
    let prices = vec![
        PriceObservation::new("X", day(0), 10.0),
        PriceObservation::new("X", day(1), 11.0),
        PriceObservation::new("X", day(3), 12.1),
        PriceObservation::new("Y", day(0), 20.0),
        PriceObservation::new("Y", day(1), 21.0),
        PriceObservation::new("Y", day(2), 22.0),
        PriceObservation::new("Y", day(3), 23.0),
    ];

    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let matrix = pipeline.matrix_from_prices(&prices).unwrap();

    assert_eq!(matrix.values().dim(), (2, 3));
    assert_eq!(matrix.get("X", day(2)), Some(0.0));
    assert_relative_eq!(matrix.get("X", day(3)).unwrap(), 0.1, epsilon = 1e-12);
}

#[rstest]
#[case(FillPolicy::Zero, vec!["X", "Y"])]
#[case(FillPolicy::DropIncomplete, vec!["Y"])]
fn test_fill_policy(#[case] policy: FillPolicy, #[case] symbols: Vec<&str>) {
    let prices = vec![
        PriceObservation::new("X", day(0), 10.0),
        PriceObservation::new("X", day(2), 11.0),
        PriceObservation::new("Y", day(0), 20.0),
        PriceObservation::new("Y", day(1), 21.0),
        PriceObservation::new("Y", day(2), 22.0),
    ];
    let mut config = PipelineConfig::default();
    config.fill_policy = policy;

    let matrix = Pipeline::new(config)
        .unwrap()
        .matrix_from_prices(&prices)
        .unwrap();
    assert_eq!(matrix.symbols(), symbols.as_slice());
    assert_eq!(matrix.n_dates(), 2);
}

#[test]
fn test_error_reports_stage_and_k() {
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let matrix = pipeline.matrix_from_prices(&two_group_universe()).unwrap();

    let err = pipeline.fit_model(&matrix, 7, None).unwrap_err();
    assert_eq!(err.stage(), Stage::Cluster);
    assert_eq!(err.k(), Some(7));
    assert!(err.to_string().contains("k=7"));
}

#[test]
fn test_csv_sources_to_exported_segmentation() {
    let mut price_file = NamedTempFile::new().unwrap();
    writeln!(price_file, "symbol,date,adjusted_close").unwrap();
    for p in two_group_universe() {
        writeln!(price_file, "{},{},{}", p.symbol, p.date, p.adjusted_price).unwrap();
    }
    let mut meta_file = NamedTempFile::new().unwrap();
    writeln!(meta_file, "symbol,company,sector").unwrap();
    writeln!(meta_file, "TECH1,Tech One,Technology").unwrap();

    let prices = CsvPriceFile::new(price_file.path()).load().unwrap();
    let metadata = CsvMetadataFile::new(meta_file.path()).load().unwrap();

    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let table = pipeline.segment_prices(&prices, &metadata, 2, None).unwrap();
    assert_eq!(table.len(), 6);

    let csv = table.export_to_string(ExportFormat::Csv).unwrap();
    assert!(csv.starts_with("symbol,cluster_id,x,y,company,sector"));
    assert!(csv.contains("TECH1,"));
    assert!(csv.contains("Tech One,Technology"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_sweep_matches_sequential() {
    let pipeline = Pipeline::new(config(1, 6)).unwrap();
    let matrix = pipeline.matrix_from_prices(&two_group_universe()).unwrap();

    let sequential = pipeline.run_sweep(&matrix).unwrap();
    let concurrent = pipeline.run_sweep_concurrent(&matrix).await.unwrap();

    assert_eq!(sequential.inertia_curve(), concurrent.inertia_curve());

    let report = ScreeReport::from_sweep(&concurrent);
    assert_eq!(report.rows.len(), 6);
    assert!(report.to_markdown().contains("| 6 |"));
}
