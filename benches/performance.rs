use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

use account_manager::cache::{CacheStats, InMemoryAccountCache};
use account_manager::config::LockSettings;
use account_manager::id_generator::{IdGenerator, SnowflakeIdGenerator};
use account_manager::lock::{lock_order, InMemoryLockManager};
use account_manager::models::{normalize_amount, Account};
use account_manager::observability::LatencyTimer;
use account_manager::repositories::InMemoryAccountRepository;
use account_manager::services::{AccountService, TransferRequest};

fn seeded_service(accounts: usize) -> (AccountService, Vec<String>) {
    let store = InMemoryAccountRepository::new();
    let numbers: Vec<String> = (0..accounts).map(|i| format!("BENCH-{:04}", i)).collect();
    for (i, number) in numbers.iter().enumerate() {
        let mut account = Account::new(i as i64 + 1, number.clone(), "Bench".into(), "0".into());
        account.balance = Decimal::new(1_000_000_000, 2);
        store.put(account);
    }

    let service = AccountService::new(
        Arc::new(store),
        Arc::new(InMemoryLockManager::new(Duration::from_micros(100))),
        Arc::new(InMemoryAccountCache::new()),
        Arc::new(SnowflakeIdGenerator::new(1)),
        LockSettings::default(),
        Duration::from_secs(600),
    );
    (service, numbers)
}

fn benchmark_transfers(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("Failed to build runtime");
    let mut group = c.benchmark_group("transfer");
    group.measurement_time(Duration::from_secs(10));

    for accounts in [2usize, 16, 128].iter() {
        let (service, numbers) = seeded_service(*accounts);
        let service = Arc::new(service);

        group.bench_with_input(
            BenchmarkId::new("in_memory_sequential", accounts),
            accounts,
            |b, &accounts| {
                let mut i = 0usize;
                b.to_async(&runtime).iter(|| {
                    let from = numbers[i % accounts].clone();
                    let to = numbers[(i + 1) % accounts].clone();
                    i += 1;
                    let service = service.clone();
                    async move {
                        let receipt = service
                            .transfer_funds(TransferRequest {
                                from_account: from,
                                to_account: to,
                                amount: Decimal::new(1, 2),
                            })
                            .await;
                        black_box(receipt)
                    }
                });
            },
        );
    }

    group.finish();
}

fn benchmark_id_generation(c: &mut Criterion) {
    let generator = SnowflakeIdGenerator::new(1);

    c.bench_function("snowflake_next_id", |b| {
        b.iter(|| black_box(generator.next_id()));
    });
}

fn benchmark_amount_handling(c: &mut Criterion) {
    let mut group = c.benchmark_group("amount");

    group.bench_function("normalize_amount", |b| {
        b.iter(|| normalize_amount(black_box(Decimal::new(123_456, 3))))
    });

    group.bench_function("debit_credit_pair", |b| {
        let mut source = Account::new(1, "A".into(), "A".into(), "1".into());
        let mut destination = Account::new(2, "B".into(), "B".into(), "2".into());
        source.balance = Decimal::new(i64::MAX / 4, 2);
        let amount = Decimal::new(1, 2);

        b.iter(|| {
            let _ = source.debit(black_box(amount));
            destination.credit(black_box(amount));
        });
    });

    group.finish();
}

fn benchmark_lock_order(c: &mut Criterion) {
    c.bench_function("lock_order", |b| {
        b.iter(|| black_box(lock_order(black_box("6222000000002"), black_box("6222000000001"))));
    });
}

fn benchmark_cache_stats(c: &mut Criterion) {
    let stats = CacheStats::new();

    c.bench_function("cache_stats_record_hit", |b| {
        b.iter(|| stats.record_hit());
    });
}

fn benchmark_latency_timer(c: &mut Criterion) {
    c.bench_function("latency_timer", |b| {
        b.iter(|| {
            let timer = LatencyTimer::new();
            black_box(timer.elapsed_ms())
        });
    });
}

criterion_group!(
    benches,
    benchmark_transfers,
    benchmark_id_generation,
    benchmark_amount_handling,
    benchmark_lock_order,
    benchmark_cache_stats,
    benchmark_latency_timer,
);
criterion_main!(benches);
