//! Integration benchmark for the reading pipeline.
//!
//! Benchmarks the full application loop using the same pattern as the unit
//! tests in app.rs: a fake scanner feeding readings through `run_with_io`.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use miscale_listener::app::{Options, Scanner, run_with_io};
use miscale_listener::{
    MacAddress, MeasureState, ReadingResult, ScanConfig, ScanError, WeightReading, WeightUnit,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

const TEST_MAC: MacAddress = MacAddress([0xC8, 0x47, 0x8C, 0x01, 0x23, 0x45]);

fn reading(state: MeasureState, tenths_of_kg: u16) -> WeightReading {
    WeightReading {
        state,
        unit: WeightUnit::Kilograms,
        tenths_of_kg,
    }
}

/// A fake scanner that yields pre-decoded readings, like the one in app.rs tests.
struct FakeScanner {
    results: Mutex<Vec<ReadingResult>>,
}

impl FakeScanner {
    fn new(results: Vec<ReadingResult>) -> Self {
        Self {
            results: Mutex::new(results),
        }
    }
}

impl Scanner for FakeScanner {
    fn start_scan(
        &self,
        _config: ScanConfig,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<ReadingResult>, ScanError>> + Send + '_>>
    {
        let results = std::mem::take(&mut *self.results.lock().unwrap());
        Box::pin(async move {
            let (tx, rx) = mpsc::channel::<ReadingResult>(results.len().max(1));
            tokio::spawn(async move {
                for r in results {
                    let _ = tx.send(r).await;
                }
            });
            Ok(rx)
        })
    }
}

fn default_options() -> Options {
    Options {
        address: TEST_MAC,
        device: 0,
        throttle: None,
        verbose: false,
    }
}

/// A weigh-in as the scale broadcasts it: settling values, then stable.
fn weigh_in(len: usize) -> Vec<ReadingResult> {
    (0..len)
        .map(|i| {
            if i + 1 == len {
                Ok(reading(MeasureState::Stable, 680))
            } else {
                Ok(reading(MeasureState::Active, 650 + (i as u16 % 30)))
            }
        })
        .collect()
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    let rt = Runtime::new().unwrap();

    for batch_size in [1, 10, 100] {
        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            &batch_size,
            |b, &size| {
                b.iter(|| {
                    let scanner = FakeScanner::new(weigh_in(size));
                    let options = default_options();
                    let mut out = Vec::<u8>::with_capacity(16 * size);

                    rt.block_on(async {
                        run_with_io(options, &scanner, &mut out).await.unwrap();
                    });

                    black_box(out)
                })
            },
        );
    }

    group.finish();
}

/// Throttled pipeline: many identical idle broadcasts, one line out.
fn bench_throttled_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("throttled_pipeline");
    let rt = Runtime::new().unwrap();

    let results: Vec<ReadingResult> = (0..100)
        .map(|_| Ok(reading(MeasureState::Idle, 680)))
        .collect();

    group.throughput(Throughput::Elements(100));
    group.bench_function("100_idle_broadcasts", |b| {
        b.iter(|| {
            let scanner = FakeScanner::new(results.iter().map(|r| clone_result(r)).collect());
            let mut options = default_options();
            options.throttle = Some(std::time::Duration::from_secs(3600));

            let mut out = Vec::<u8>::with_capacity(16);

            rt.block_on(async {
                run_with_io(options, &scanner, &mut out).await.unwrap();
            });

            debug_assert_eq!(out.iter().filter(|&&b| b == b'\n').count(), 1);

            black_box(out)
        })
    });

    group.finish();
}

fn clone_result(r: &ReadingResult) -> ReadingResult {
    match r {
        Ok(reading) => Ok(*reading),
        Err(_) => unreachable!("benchmark inputs carry no errors"),
    }
}

criterion_group!(benches, bench_pipeline, bench_throttled_pipeline);
criterion_main!(benches);
