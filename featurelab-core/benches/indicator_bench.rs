//! Criterion benchmarks for the feature pipeline hot paths.
//!
//! 1. Full default catalog through the engine
//! 2. Lag + rolling feature derivation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use featurelab_core::data::provider::RawBar;
use featurelab_core::{
    add_technical_indicators, bars_to_frame, calculate_rolling_statistics, create_lag_features,
    IndicatorRegistry,
};

fn make_raw_bars(n: usize) -> Vec<RawBar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.1).sin() * 10.0;
            RawBar {
                date: base_date + chrono::Duration::days(i as i64),
                open: close - 0.3,
                high: close + 1.5,
                low: close - 1.5,
                close,
                volume: Some(1_000_000 + (i as u64 % 500_000)),
            }
        })
        .collect()
}

fn bench_indicator_engine(c: &mut Criterion) {
    let registry = IndicatorRegistry::default();
    let mut group = c.benchmark_group("indicator_engine");
    for n in [252usize, 2520] {
        let df = bars_to_frame(&make_raw_bars(n)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n), &df, |b, df| {
            b.iter(|| add_technical_indicators(black_box(df), &registry))
        });
    }
    group.finish();
}

fn bench_feature_derivation(c: &mut Criterion) {
    let df = bars_to_frame(&make_raw_bars(2520)).unwrap();
    c.bench_function("lag_and_rolling_2520", |b| {
        b.iter(|| {
            let lagged = create_lag_features(black_box(&df), "close", 5).unwrap();
            calculate_rolling_statistics(&lagged, "close", 10).unwrap()
        })
    });
}

criterion_group!(benches, bench_indicator_engine, bench_feature_derivation);
criterion_main!(benches);
