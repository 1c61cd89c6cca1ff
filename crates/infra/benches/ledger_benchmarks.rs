use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::runtime::Runtime;
use walletd_core::{AccountId, Amount, Currency, TransactionId};
use walletd_fraud::{
    classify, screen, FraudContext, FraudLimits, MovementRequest, RequestOrigin, ScanRules,
};
use walletd_infra::{
    Deposit, InMemoryWalletStore, LedgerService, LedgerSettings, ReceiverRef, Transfer,
};
use walletd_wallet::{NewTransaction, Transaction, TransactionType};

type Ledger = LedgerService<Arc<InMemoryWalletStore>>;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn limits() -> FraudLimits {
    FraudLimits {
        max_daily_transfer: Decimal::MAX,
        ..FraudLimits::default()
    }
}

fn context(amount: Decimal, kind: TransactionType) -> FraudContext {
    screen(
        &[],
        &MovementRequest { amount, kind },
        &limits(),
        RequestOrigin::default(),
        Utc::now(),
    )
    .unwrap()
}

async fn funded_pair(ledger: &Ledger) -> (AccountId, AccountId) {
    let a = ledger.open_account("a", "a@bench.test").await.unwrap().id_typed();
    let b = ledger.open_account("b", "b@bench.test").await.unwrap().id_typed();
    ledger
        .deposit(Deposit {
            account: a,
            amount: dec!(10000),
            currency: Currency::Usd,
            description: None,
            fraud: Some(context(dec!(10000), TransactionType::Deposit)),
        })
        .await
        .unwrap();
    (a, b)
}

fn fresh_ledger() -> Ledger {
    LedgerService::new(
        Arc::new(InMemoryWalletStore::default()),
        limits(),
        LedgerSettings::default(),
    )
}

fn bench_movement_latency(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("movement_latency");

    group.bench_function("deposit", |b| {
        let ledger = fresh_ledger();
        let (a, _) = rt.block_on(funded_pair(&ledger));
        b.iter(|| {
            let receipt = rt
                .block_on(ledger.deposit(Deposit {
                    account: a,
                    amount: dec!(1),
                    currency: Currency::Usd,
                    description: None,
                    fraud: Some(context(dec!(1), TransactionType::Deposit)),
                }))
                .unwrap();
            black_box(receipt);
        });
    });

    // Fresh accounts per batch so the daily-limit window stays small.
    group.bench_function("transfer", |b| {
        b.iter_batched(
            || {
                let ledger = fresh_ledger();
                let (a, b) = rt.block_on(funded_pair(&ledger));
                (ledger, a, b)
            },
            |(ledger, a, b)| {
                let receipt = rt
                    .block_on(ledger.transfer(Transfer {
                        sender: a,
                        receiver: ReceiverRef::Id(b),
                        amount: dec!(5),
                        currency: Currency::Usd,
                        description: None,
                        fraud: Some(context(dec!(5), TransactionType::Transfer)),
                    }))
                    .unwrap();
                black_box(receipt);
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn history(size: usize, sender: AccountId, receiver: AccountId) -> Vec<Transaction> {
    let now = Utc::now();
    (0..size)
        .map(|i| {
            Transaction::transfer(
                sender,
                receiver,
                NewTransaction {
                    id: TransactionId::new(),
                    amount: Amount::new(Decimal::from(1 + i % 100)).unwrap(),
                    currency: Currency::Usd,
                    description: None,
                    metadata: None,
                    created_at: now - Duration::minutes(i as i64 % 600),
                },
            )
            .and_then(|tx| tx.completed(now))
            .unwrap()
        })
        .collect()
}

fn bench_fraud_rules(c: &mut Criterion) {
    let mut group = c.benchmark_group("fraud_rules");
    let sender = AccountId::new();
    let receiver = AccountId::new();

    for size in [10usize, 100, 1000].iter() {
        let txs = history(*size, sender, receiver);
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("gate_screen", size), &txs, |b, txs| {
            let request = MovementRequest {
                amount: dec!(10),
                kind: TransactionType::Transfer,
            };
            let limits = limits();
            b.iter(|| {
                black_box(screen(txs, &request, &limits, RequestOrigin::default(), Utc::now()))
            });
        });

        group.bench_with_input(BenchmarkId::new("scanner_classify", size), &txs, |b, txs| {
            let rules = ScanRules::default();
            b.iter(|| black_box(classify(txs, &rules)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_movement_latency, bench_fraud_rules);
criterion_main!(benches);
