//! Selection and configuration rewrite benchmarks

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use nordswitch::conf::IpsecConf;
use nordswitch::stats::{fastest, LoadReport, ServerLoad};
use std::hint::black_box;

const SAMPLE_CONF: &str = "\
config setup
  charondebug=\"ike 1\"

conn %default
  keyexchange=ikev2
  ike=aes256-sha256-modp2048

conn vpn1
  left=%defaultroute
  leftsourceip=%config
  right=us123.nordvpn.com
  rightsubnet=0.0.0.0/0
  auto=add";

fn synthetic_report(size: usize) -> LoadReport {
    (0..size)
        .map(|i| {
            (
                format!("server{i:04}.nordvpn.com"),
                ServerLoad {
                    percent: (i % 97) as u8,
                },
            )
        })
        .collect()
}

fn bench_fastest(c: &mut Criterion) {
    let mut group = c.benchmark_group("fastest");
    for size in [10, 100, 1000] {
        let report = synthetic_report(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &report, |b, report| {
            b.iter(|| fastest(black_box(report)));
        });
    }
    group.finish();
}

fn bench_rewrite_endpoint(c: &mut Criterion) {
    c.bench_function("rewrite_endpoint", |b| {
        b.iter_batched(
            || IpsecConf::from_content(SAMPLE_CONF),
            |mut conf| {
                black_box(conf.rewrite_endpoint("us999.nordvpn.com"));
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_fastest, bench_rewrite_endpoint);
criterion_main!(benches);
