use std::time::Duration;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use warden_api::rate_limit::{RateLimitConfig, RateLimiter};

fn limiter() -> RateLimiter {
    RateLimiter::new(&RateLimitConfig {
        requests_per_second: 1_000_000,
        burst: 1_000_000,
        max_clients: 100_000,
        idle_ttl: Duration::from_secs(600),
    })
    .unwrap()
}

fn bench_single_client(c: &mut Criterion) {
    let rl = limiter();
    c.bench_function("rate_limit_allow_hot_client", |b| {
        b.iter(|| black_box(rl.allow(black_box("203.0.113.7"))))
    });
}

fn bench_many_clients(c: &mut Criterion) {
    let rl = limiter();
    let clients: Vec<String> = (0..10_000).map(|i| format!("10.0.{}.{}", i / 256, i % 256)).collect();
    let mut i = 0usize;
    c.bench_function("rate_limit_allow_10k_clients", |b| {
        b.iter(|| {
            i = (i + 1) % clients.len();
            black_box(rl.allow(&clients[i]))
        })
    });
}

criterion_group!(benches, bench_single_client, bench_many_clients);
criterion_main!(benches);
