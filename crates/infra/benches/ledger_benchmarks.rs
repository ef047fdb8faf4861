use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use splitledger_balances::GroupBalanceSummary;
use splitledger_core::{
    Aggregate, AggregateId, Currency, GroupId, Money, PaymentId, SplitId, UserId,
};
use splitledger_events::{EventEnvelope, InMemoryEventBus};
use splitledger_expenses::{
    CreateExpense, Expense, ExpenseCommand, ExpenseId, RecordPayment, SplitStrategy,
    compute_shares,
};
use splitledger_infra::command_dispatcher::CommandDispatcher;
use splitledger_infra::event_store::{EventStore, InMemoryEventStore, UncommittedEvent};
use splitledger_infra::projections::{ExpenseFeedProjection, ExpenseReadModel};
use splitledger_infra::read_model::InMemoryGroupStore;
use std::sync::Arc;

fn usd(minor: i64) -> Money {
    Money::from_minor_units(minor, Currency::Usd)
}

fn create_cmd(
    group_id: GroupId,
    expense_id: ExpenseId,
    paid_by: UserId,
    participants: &[UserId],
    amount: Money,
) -> CreateExpense {
    CreateExpense {
        group_id,
        expense_id,
        paid_by_user_id: paid_by,
        created_by_user_id: paid_by,
        amount,
        description: "benchmark expense".to_string(),
        notes: None,
        split_strategy: SplitStrategy::Equal,
        expense_date: Utc::now(),
        participant_user_ids: participants.to_vec(),
        split_ids: participants.iter().map(|_| SplitId::new()).collect(),
        self_payment_id: PaymentId::new(),
        occurred_at: Utc::now(),
    }
}

fn setup_dispatcher() -> CommandDispatcher<
    InMemoryEventStore,
    Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>,
> {
    let store = InMemoryEventStore::new();
    let bus: Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>> =
        Arc::new(InMemoryEventBus::new());
    CommandDispatcher::new(store, bus)
}

fn bench_command_execution_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("command_execution_latency");
    group.sample_size(1000);

    // Benchmark: CreateExpense command (first command, no history)
    group.bench_function("create_expense_fresh", |b| {
        let dispatcher = setup_dispatcher();
        let group_id = GroupId::new();
        let payer = UserId::new();
        let participants = vec![payer, UserId::new(), UserId::new()];

        b.iter(|| {
            let expense_id = ExpenseId::new(AggregateId::new());
            let cmd = create_cmd(
                group_id,
                expense_id,
                payer,
                black_box(&participants),
                usd(9999),
            );
            dispatcher
                .dispatch(
                    group_id,
                    expense_id.0,
                    "expenses.expense",
                    ExpenseCommand::CreateExpense(cmd),
                    |_, id| Expense::empty(ExpenseId::new(id)),
                )
                .unwrap();
        });
    });

    // Benchmark: RecordPayment command after creation (with growing history)
    group.bench_function("record_payment_with_history", |b| {
        let dispatcher = setup_dispatcher();
        let group_id = GroupId::new();
        let expense_id = ExpenseId::new(AggregateId::new());
        let debtor = UserId::new();

        // One huge share, settled one minor unit at a time.
        let cmd = create_cmd(
            group_id,
            expense_id,
            UserId::new(),
            &[debtor],
            usd(1_000_000_000_000),
        );
        let split_id = cmd.split_ids[0];
        dispatcher
            .dispatch(
                group_id,
                expense_id.0,
                "expenses.expense",
                ExpenseCommand::CreateExpense(cmd),
                |_, id| Expense::empty(ExpenseId::new(id)),
            )
            .unwrap();

        b.iter(|| {
            dispatcher
                .dispatch(
                    group_id,
                    expense_id.0,
                    "expenses.expense",
                    ExpenseCommand::RecordPayment(RecordPayment {
                        group_id,
                        expense_id,
                        split_id,
                        payment_id: PaymentId::new(),
                        amount: black_box(usd(1)),
                        occurred_at: Utc::now(),
                    }),
                    |_, id| Expense::empty(ExpenseId::new(id)),
                )
                .unwrap();
        });
    });

    group.finish();
}

fn bench_split_computation(c: &mut Criterion) {
    let mut group = c.benchmark_group("split_computation");

    for participant_count in [2usize, 10, 50, 100].iter() {
        group.throughput(Throughput::Elements(*participant_count as u64));

        let participants: Vec<UserId> = (0..*participant_count).map(|_| UserId::new()).collect();

        group.bench_with_input(
            BenchmarkId::new("equal", participant_count),
            &participants,
            |b, participants| {
                b.iter(|| {
                    compute_shares(
                        black_box(usd(1_000_003)),
                        &SplitStrategy::Equal,
                        participants,
                    )
                    .unwrap()
                });
            },
        );

        let mut weights = vec![100 / *participant_count as u32; *participant_count];
        weights[0] += 100 % *participant_count as u32;
        let strategy = SplitStrategy::Percentage { weights };

        group.bench_with_input(
            BenchmarkId::new("percentage", participant_count),
            &participants,
            |b, participants| {
                b.iter(|| {
                    compute_shares(black_box(usd(1_000_003)), &strategy, participants).unwrap()
                });
            },
        );
    }

    group.finish();
}

fn bench_projection_rebuild_speed(c: &mut Criterion) {
    let mut group = c.benchmark_group("projection_rebuild_speed");

    for event_count in [10, 100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::new("rebuild_from_events", event_count),
            event_count,
            |b, &count| {
                let store = InMemoryEventStore::new();
                let group_id = GroupId::new();
                let expense_id = ExpenseId::new(AggregateId::new());
                let debtor = UserId::new();

                // Drive the aggregate to generate a realistic history, then
                // append it so every envelope carries a real sequence number.
                let mut expense = Expense::empty(expense_id);
                let cmd = create_cmd(
                    group_id,
                    expense_id,
                    UserId::new(),
                    &[debtor],
                    usd(count as i64 * 2),
                );
                let split_id = cmd.split_ids[0];
                let mut history = expense
                    .handle(&ExpenseCommand::CreateExpense(cmd))
                    .unwrap();
                for event in &history {
                    expense.apply(event);
                }
                for _ in 0..(count - 1) {
                    let events = expense
                        .handle(&ExpenseCommand::RecordPayment(RecordPayment {
                            group_id,
                            expense_id,
                            split_id,
                            payment_id: PaymentId::new(),
                            amount: usd(1),
                            occurred_at: Utc::now(),
                        }))
                        .unwrap();
                    for event in &events {
                        expense.apply(event);
                    }
                    history.extend(events);
                }

                let uncommitted: Vec<UncommittedEvent> = history
                    .iter()
                    .map(|ev| {
                        UncommittedEvent::from_typed(
                            group_id,
                            expense_id.0,
                            "expenses.expense",
                            uuid::Uuid::now_v7(),
                            ev,
                        )
                        .unwrap()
                    })
                    .collect();
                let all_envelopes: Vec<EventEnvelope<serde_json::Value>> = store
                    .append(uncommitted, splitledger_core::ExpectedVersion::Any)
                    .unwrap()
                    .iter()
                    .map(|stored| stored.to_envelope())
                    .collect();

                let read_model_store: Arc<InMemoryGroupStore<ExpenseId, ExpenseReadModel>> =
                    Arc::new(InMemoryGroupStore::new());
                let projection = ExpenseFeedProjection::new(read_model_store);

                b.iter(|| {
                    projection
                        .rebuild_from_scratch(black_box(all_envelopes.clone()))
                        .unwrap();
                });
            },
        );
    }

    group.finish();
}

fn bench_balance_recompute(c: &mut Criterion) {
    let mut group = c.benchmark_group("balance_recompute");

    for expense_count in [10usize, 100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::new("project_group", expense_count),
            expense_count,
            |b, &count| {
                let group_id = GroupId::new();
                let members: Vec<UserId> = (0..4).map(|_| UserId::new()).collect();

                let expenses: Vec<Expense> = (0..count)
                    .map(|i| {
                        let payer = members[i % members.len()];
                        let expense_id = ExpenseId::new(AggregateId::new());
                        let cmd = create_cmd(group_id, expense_id, payer, &members, usd(4003));
                        let mut expense = Expense::empty(expense_id);
                        for event in expense
                            .handle(&ExpenseCommand::CreateExpense(cmd))
                            .unwrap()
                        {
                            expense.apply(&event);
                        }
                        expense
                    })
                    .collect();

                b.iter(|| GroupBalanceSummary::project(black_box(&expenses)).unwrap());
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_command_execution_latency,
    bench_split_computation,
    bench_projection_rebuild_speed,
    bench_balance_recompute
);
criterion_main!(benches);
