use rand::Rng;
use std::path::PathBuf;

use chrono::{Duration, TimeZone, Utc};
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use swathinfo::record::{Beam, Flag, FormatInfo, NavFix, Ping, SwathFile};
use swathinfo::{FormatHint, LonFlip, Registry, Report, Style, Summary};

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").unwrap());
    path.push(name);
    path
}

/// Pings along a northbound track with randomly flagged beams.
fn random_pings(num: usize, beams: usize) -> Vec<Ping> {
    let mut rng = rand::thread_rng();
    let start = Utc.with_ymd_and_hms(2001, 11, 5, 0, 0, 0).unwrap();
    (0..num)
        .map(|i| {
            let mut ping = Ping::new(
                start + Duration::seconds(i as i64),
                NavFix {
                    longitude: -124.5,
                    latitude: 40.8 + i as f64 * 1e-5,
                    speed: 4.0,
                    heading: 0.0,
                    sonar_depth: 5.0,
                    altitude: 0.0,
                },
            );
            ping.beams = (0..beams)
                .map(|b| {
                    let flag = match rng.gen_range(0..100) {
                        0..=2 => Flag::Zero,
                        3..=5 => Flag::Flagged,
                        _ => Flag::Good,
                    };
                    let across = (b as f64 - beams as f64 / 2.0) * 15.0;
                    Beam::new(rng.gen_range(400.0..500.0), across, flag)
                        .with_amplitude(rng.gen_range(0.0..100.0))
                })
                .collect();
            ping
        })
        .collect()
}

fn bench_summary(c: &mut Criterion) {
    let pings = random_pings(1000, 59);
    let mut group = c.benchmark_group("summary");
    group.throughput(Throughput::Elements((pings.len() * 59) as u64));
    group.bench_function("add", |b| {
        b.iter(|| {
            let mut summary = Summary::default();
            for ping in &pings {
                summary.add(ping);
            }
            summary
        });
    });
    group.finish();
}

fn bench_decode_hydrosweep(c: &mut Criterion) {
    let path = fixture_path("tests/fixtures/TN136HS.309.snipped.mb21");
    let registry = Registry::default();
    let decoder = registry.resolve(FormatHint::Id(21), &path).unwrap();

    let mut group = c.benchmark_group("decode");
    group.bench_function("hsatlraw", |b| {
        b.iter(|| {
            let pings = decoder.open(&path, LonFlip::Centered).unwrap();
            assert_eq!(pings.map_while(Result::ok).count(), 2);
        });
    });
    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let summary = random_pings(10, 59)
        .iter()
        .fold(Summary::default(), Summary::fold);
    let file = SwathFile {
        path: "bench.mb21".into(),
        format: FormatInfo {
            id: 21,
            name: "MBF_HSATLRAW".into(),
            description: "Raw Hydrosweep".into(),
            attributes: "bench".into(),
        },
    };
    let report = Report::new(&file, &summary);

    let mut group = c.benchmark_group("render");
    group.bench_function("text", |b| b.iter(|| report.render(Style::Text).unwrap()));
    group.bench_function("json", |b| b.iter(|| report.render(Style::Json).unwrap()));
    group.finish();
}

criterion_group!(benches, bench_summary, bench_decode_hydrosweep, bench_render);
criterion_main!(benches);
