//! The ledger application service.
//!
//! `LedgerService` is the one front door for a deployment: it validates
//! membership, serializes writes per group, runs commands through the
//! dispatcher, keeps the expense feed projection current for
//! read-your-writes queries, and answers balance queries with a
//! version-guarded cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use splitledger_balances::GroupBalanceSummary;
use splitledger_core::{
    Aggregate, AggregateId, GroupId, LedgerError, Money, PaymentId, SplitId, UserId,
};
use splitledger_events::{EventBus, EventEnvelope};
use splitledger_expenses::{
    CreateExpense, Expense, ExpenseCommand, ExpenseEvent, ExpenseId, RecordPayment, SplitStrategy,
};
use splitledger_infra::command_dispatcher::CommandDispatcher;
use splitledger_infra::event_store::{EventStore, StoredEvent};
use splitledger_infra::projections::{ExpenseFeedProjection, ExpenseReadModel, SplitReadModel};
use splitledger_infra::read_model::InMemoryGroupStore;

use crate::error::ServiceError;
use crate::membership::MembershipDirectory;

const EXPENSE_AGGREGATE: &str = "expenses.expense";

/// Input for creating an expense. Ids for the expense, its splits and the
/// payer's own settlement are allocated by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewExpense {
    pub group_id: GroupId,
    pub paid_by_user_id: UserId,
    pub created_by_user_id: UserId,
    pub amount: Money,
    pub description: String,
    pub notes: Option<String>,
    pub split_strategy: SplitStrategy,
    pub expense_date: DateTime<Utc>,
    pub participant_user_ids: Vec<UserId>,
}

/// One settlement payment, as read back from an expense stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentView {
    pub payment_id: PaymentId,
    pub split_id: SplitId,
    pub expense_id: ExpenseId,
    pub amount: Money,
    pub paid_at: DateTime<Utc>,
}

/// Per-group write serialization.
///
/// Commands for the same group run one at a time so optimistic concurrency
/// conflicts stay an anomaly signal instead of a routine retry path. Reads
/// never touch these locks.
#[derive(Debug, Default)]
struct GroupLocks {
    inner: Mutex<HashMap<GroupId, Arc<Mutex<()>>>>,
}

impl GroupLocks {
    /// Handle to the mutex serializing writes for one group. Created lazily,
    /// never removed.
    fn handle(&self, group_id: GroupId) -> Result<Arc<Mutex<()>>, ServiceError> {
        let mut locks = self
            .inner
            .lock()
            .map_err(|_| ServiceError::Concurrency("group lock table poisoned".to_string()))?;
        Ok(Arc::clone(locks.entry(group_id).or_default()))
    }
}

/// Application service for the expense ledger.
///
/// Writes go through the command dispatcher and are then applied to the
/// in-process expense feed before returning, so a caller always reads its own
/// writes. The dispatcher still publishes every committed event on the bus
/// for any external consumers.
///
/// Balance queries fold the group's full event history through the balance
/// engine; the result is cached keyed by the group's event-store version and
/// reused until the next append invalidates it.
pub struct LedgerService<S, B, M>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    M: MembershipDirectory,
{
    dispatcher: CommandDispatcher<Arc<S>, B>,
    store: Arc<S>,
    feed: ExpenseFeedProjection<Arc<InMemoryGroupStore<ExpenseId, ExpenseReadModel>>>,
    directory: M,
    locks: GroupLocks,
    balance_cache: RwLock<HashMap<GroupId, (u64, GroupBalanceSummary)>>,
}

impl<S, B, M> LedgerService<S, B, M>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    M: MembershipDirectory,
{
    pub fn new(store: Arc<S>, bus: B, directory: M) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(Arc::clone(&store), bus),
            store,
            feed: ExpenseFeedProjection::new(Arc::new(InMemoryGroupStore::new())),
            directory,
            locks: GroupLocks::default(),
            balance_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Create an expense and return its read model.
    ///
    /// The payer, the creator and every participant must be members of the
    /// group. Split validation (positive amount, duplicate participants,
    /// exact/percentage totals) happens in the aggregate; rejections surface
    /// as `ServiceError::Domain`.
    pub fn create_expense(&self, new_expense: NewExpense) -> Result<ExpenseReadModel, ServiceError> {
        let group_id = new_expense.group_id;
        self.ensure_member(group_id, new_expense.paid_by_user_id)?;
        self.ensure_member(group_id, new_expense.created_by_user_id)?;
        for user_id in &new_expense.participant_user_ids {
            self.ensure_member(group_id, *user_id)?;
        }

        let expense_id = ExpenseId::new(AggregateId::new());
        let split_ids: Vec<SplitId> = new_expense
            .participant_user_ids
            .iter()
            .map(|_| SplitId::new())
            .collect();
        let amount = new_expense.amount;

        let command = ExpenseCommand::CreateExpense(CreateExpense {
            group_id,
            expense_id,
            paid_by_user_id: new_expense.paid_by_user_id,
            created_by_user_id: new_expense.created_by_user_id,
            amount: new_expense.amount,
            description: new_expense.description,
            notes: new_expense.notes,
            split_strategy: new_expense.split_strategy,
            expense_date: new_expense.expense_date,
            participant_user_ids: new_expense.participant_user_ids,
            split_ids,
            self_payment_id: PaymentId::new(),
            occurred_at: Utc::now(),
        });

        self.execute(group_id, expense_id, command).map_err(|e| {
            tracing::warn!(%group_id, %expense_id, error = %e, "create_expense failed");
            e
        })?;

        tracing::info!(%group_id, %expense_id, amount = %amount, "expense created");

        self.feed
            .get(group_id, &expense_id)
            .ok_or_else(|| ServiceError::Projection("expense read model missing after create".to_string()))
    }

    /// Record a settlement payment against a split and return the split's
    /// updated read model.
    ///
    /// `paid_at` is caller-supplied so payments can be backdated; history
    /// order is recording order regardless.
    pub fn record_payment(
        &self,
        split_id: SplitId,
        amount: Money,
        paid_at: DateTime<Utc>,
    ) -> Result<SplitReadModel, ServiceError> {
        let (group_id, expense_id) = self
            .feed
            .split_ref(split_id)
            .ok_or(ServiceError::Domain(LedgerError::NotFound))?;

        let command = ExpenseCommand::RecordPayment(RecordPayment {
            group_id,
            expense_id,
            split_id,
            payment_id: PaymentId::new(),
            amount,
            occurred_at: paid_at,
        });

        self.execute(group_id, expense_id, command).map_err(|e| {
            tracing::warn!(%group_id, %split_id, error = %e, "record_payment failed");
            e
        })?;

        tracing::info!(%group_id, %split_id, amount = %amount, "payment recorded");

        self.feed
            .get(group_id, &expense_id)
            .and_then(|rm| rm.splits.into_iter().find(|s| s.split_id == split_id))
            .ok_or_else(|| ServiceError::Projection("split read model missing after payment".to_string()))
    }

    /// Fetch one expense by id.
    pub fn get_expense(&self, expense_id: ExpenseId) -> Result<ExpenseReadModel, ServiceError> {
        let group_id = self
            .feed
            .expense_group(expense_id)
            .ok_or(ServiceError::Domain(LedgerError::NotFound))?;
        self.feed
            .get(group_id, &expense_id)
            .ok_or(ServiceError::Domain(LedgerError::NotFound))
    }

    /// All of a group's expenses, newest first (by expense date, then by
    /// creation time).
    pub fn list_group_expenses(&self, group_id: GroupId) -> Vec<ExpenseReadModel> {
        let mut expenses = self.feed.list(group_id);
        expenses.sort_by(|a, b| {
            b.expense_date
                .cmp(&a.expense_date)
                .then(b.created_at.cmp(&a.created_at))
        });
        expenses
    }

    /// Net who-owes-whom summary for a group.
    ///
    /// Rehydrates every expense in the group from the event store and folds
    /// them through the balance engine. The summary is cached keyed by the
    /// group's event-store version; any append to the group invalidates it.
    pub fn get_group_balances(&self, group_id: GroupId) -> Result<GroupBalanceSummary, ServiceError> {
        let version = self.store.group_version(group_id)?;

        if let Ok(cache) = self.balance_cache.read() {
            if let Some((cached_version, summary)) = cache.get(&group_id) {
                if *cached_version == version {
                    return Ok(summary.clone());
                }
            }
        }

        let expenses = self.rehydrate_group(group_id)?;
        let summary = GroupBalanceSummary::project(&expenses)?;

        // Cache only if no append raced the computation.
        let after = self.store.group_version(group_id)?;
        if after == version {
            if let Ok(mut cache) = self.balance_cache.write() {
                cache.insert(group_id, (version, summary.clone()));
            }
        }

        Ok(summary)
    }

    /// Settlement payments recorded against one split, in recording order.
    /// Includes the payer's own share when it was settled at creation.
    pub fn list_split_payments(&self, split_id: SplitId) -> Result<Vec<PaymentView>, ServiceError> {
        let (group_id, expense_id) = self
            .feed
            .split_ref(split_id)
            .ok_or(ServiceError::Domain(LedgerError::NotFound))?;

        let stream = self.store.load_stream(group_id, expense_id.0)?;
        let mut payments = Vec::new();
        for stored in stream {
            let ev: ExpenseEvent = serde_json::from_value(stored.payload)
                .map_err(|e| ServiceError::Deserialize(e.to_string()))?;
            if let ExpenseEvent::SettlementRecorded(e) = ev {
                if e.split_id == split_id {
                    payments.push(PaymentView {
                        payment_id: e.payment_id,
                        split_id: e.split_id,
                        expense_id: e.expense_id,
                        amount: e.amount,
                        paid_at: e.occurred_at,
                    });
                }
            }
        }
        Ok(payments)
    }

    /// Monotonic count of events appended for the group. Changes exactly when
    /// the group's history changes, so it doubles as a cheap staleness check
    /// for anything derived from that history.
    pub fn group_version(&self, group_id: GroupId) -> Result<u64, ServiceError> {
        Ok(self.store.group_version(group_id)?)
    }

    /// Rebuild the expense feed for a group by replaying its full history
    /// from the event store. Meant for process start, when the in-process
    /// read models are empty.
    pub fn rebuild_group_feed(&self, group_id: GroupId) -> Result<(), ServiceError> {
        let events = self.store.load_group(group_id)?;
        let envelopes: Vec<EventEnvelope<JsonValue>> =
            events.iter().map(StoredEvent::to_envelope).collect();
        self.feed.rebuild_from_scratch(envelopes)?;
        tracing::info!(%group_id, "expense feed rebuilt from event store");
        Ok(())
    }

    fn ensure_member(&self, group_id: GroupId, user_id: UserId) -> Result<(), ServiceError> {
        if self.directory.is_member(group_id, user_id) {
            Ok(())
        } else {
            Err(ServiceError::NotAMember { group_id, user_id })
        }
    }

    /// Run a command under the group's write lock and fold the committed
    /// events into the expense feed.
    fn execute(
        &self,
        group_id: GroupId,
        expense_id: ExpenseId,
        command: ExpenseCommand,
    ) -> Result<(), ServiceError> {
        let lock = self.locks.handle(group_id)?;
        let _guard = lock
            .lock()
            .map_err(|_| ServiceError::Concurrency("group write lock poisoned".to_string()))?;

        let committed = self.dispatcher.dispatch(
            group_id,
            expense_id.0,
            EXPENSE_AGGREGATE,
            command,
            |_, id| Expense::empty(ExpenseId::new(id)),
        )?;

        for stored in &committed {
            self.feed.apply_envelope(&stored.to_envelope())?;
            tracing::debug!(
                sequence = stored.sequence_number,
                event_type = %stored.event_type,
                "expense feed advanced"
            );
        }
        Ok(())
    }

    /// Rehydrate every expense aggregate in a group from its stored events.
    fn rehydrate_group(&self, group_id: GroupId) -> Result<Vec<Expense>, ServiceError> {
        let events = self.store.load_group(group_id)?;
        let mut expenses: HashMap<AggregateId, Expense> = HashMap::new();
        for stored in events {
            if stored.aggregate_type != EXPENSE_AGGREGATE {
                continue;
            }
            let ev: ExpenseEvent = serde_json::from_value(stored.payload)
                .map_err(|e| ServiceError::Deserialize(e.to_string()))?;
            expenses
                .entry(stored.aggregate_id)
                .or_insert_with(|| Expense::empty(ExpenseId::new(stored.aggregate_id)))
                .apply(&ev);
        }
        Ok(expenses.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use splitledger_core::{Currency, Member};
    use splitledger_events::InMemoryEventBus;
    use splitledger_infra::event_store::InMemoryEventStore;

    use crate::membership::InMemoryMembershipDirectory;

    type TestService = LedgerService<
        InMemoryEventStore,
        Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>,
        Arc<InMemoryMembershipDirectory>,
    >;

    fn usd(minor_units: i64) -> Money {
        Money::from_minor_units(minor_units, Currency::Usd)
    }

    fn eur(minor_units: i64) -> Money {
        Money::from_minor_units(minor_units, Currency::Eur)
    }

    fn setup() -> (TestService, Arc<InMemoryMembershipDirectory>) {
        // Logs honor RUST_LOG when debugging tests.
        splitledger_observability::init();
        let directory = Arc::new(InMemoryMembershipDirectory::new());
        let store = Arc::new(InMemoryEventStore::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let service = LedgerService::new(store, bus, Arc::clone(&directory));
        (service, directory)
    }

    fn seeded_group(directory: &InMemoryMembershipDirectory, count: usize) -> (GroupId, Vec<UserId>) {
        let group_id = GroupId::new();
        let users: Vec<UserId> = (0..count).map(|_| UserId::new()).collect();
        for (i, user) in users.iter().enumerate() {
            directory.add_member(
                group_id,
                Member::new(*user, format!("user-{i}"), format!("user-{i}@example.com")),
            );
        }
        (group_id, users)
    }

    fn equal_expense(
        group_id: GroupId,
        payer: UserId,
        participants: &[UserId],
        amount: Money,
    ) -> NewExpense {
        NewExpense {
            group_id,
            paid_by_user_id: payer,
            created_by_user_id: payer,
            amount,
            description: "dinner".to_string(),
            notes: None,
            split_strategy: SplitStrategy::Equal,
            expense_date: Utc::now(),
            participant_user_ids: participants.to_vec(),
        }
    }

    #[test]
    fn creating_an_expense_returns_its_read_model() {
        let (service, directory) = setup();
        let (group_id, users) = seeded_group(&directory, 2);

        let rm = service
            .create_expense(equal_expense(group_id, users[0], &users, usd(1000)))
            .unwrap();

        assert_eq!(rm.group_id, group_id);
        assert_eq!(rm.paid_by_user_id, users[0]);
        assert_eq!(rm.amount, usd(1000));
        assert_eq!(rm.splits.len(), 2);
        // The payer's own half settles at creation.
        assert_eq!(rm.total_settled, usd(500));
        assert!(!rm.is_settled);

        // Creation plus the payer's self-settlement.
        assert_eq!(service.group_version(group_id).unwrap(), 2);
    }

    #[test]
    fn every_party_must_be_a_group_member() {
        let (service, directory) = setup();
        let (group_id, users) = seeded_group(&directory, 2);
        let outsider = UserId::new();

        let mut participants = users.clone();
        participants.push(outsider);
        let err = service
            .create_expense(equal_expense(group_id, users[0], &participants, usd(900)))
            .unwrap_err();
        match err {
            ServiceError::NotAMember { user_id, .. } => assert_eq!(user_id, outsider),
            other => panic!("expected NotAMember, got {other:?}"),
        }

        let mut by_outsider = equal_expense(group_id, users[0], &users, usd(900));
        by_outsider.created_by_user_id = outsider;
        assert!(matches!(
            service.create_expense(by_outsider),
            Err(ServiceError::NotAMember { .. })
        ));

        // Nothing was appended.
        assert_eq!(service.group_version(group_id).unwrap(), 0);
    }

    #[test]
    fn equal_split_balances_show_who_owes_whom() {
        let (service, directory) = setup();
        let (group_id, users) = seeded_group(&directory, 2);

        service
            .create_expense(equal_expense(group_id, users[0], &users, usd(1000)))
            .unwrap();

        let summary = service.get_group_balances(group_id).unwrap();
        assert_eq!(summary.edges.len(), 1);
        assert_eq!(summary.edges[0].debtor, users[1]);
        assert_eq!(summary.edges[0].creditor, users[0]);
        assert_eq!(summary.edges[0].amount, usd(500));

        let debtor = summary.users.iter().find(|u| u.user_id == users[1]).unwrap();
        assert_eq!(debtor.total_owed, usd(500));
        assert_eq!(debtor.total_due, usd(0));
    }

    #[test]
    fn payments_settle_a_split_and_clear_the_balance() {
        let (service, directory) = setup();
        let (group_id, users) = seeded_group(&directory, 2);

        let rm = service
            .create_expense(equal_expense(group_id, users[0], &users, usd(1000)))
            .unwrap();
        let debtor_split = rm.splits.iter().find(|s| s.user_id == users[1]).unwrap();

        let after_first = service
            .record_payment(debtor_split.split_id, usd(200), Utc::now())
            .unwrap();
        assert_eq!(after_first.settled_amount, usd(200));
        assert!(!after_first.is_settled);

        let summary = service.get_group_balances(group_id).unwrap();
        assert_eq!(summary.edges[0].amount, usd(300));

        let after_second = service
            .record_payment(debtor_split.split_id, usd(300), Utc::now())
            .unwrap();
        assert!(after_second.is_settled);

        let summary = service.get_group_balances(group_id).unwrap();
        assert!(summary.edges.is_empty());
        assert!(summary.users.is_empty());

        let rm = service.get_expense(rm.expense_id).unwrap();
        assert!(rm.is_settled);
        assert_eq!(rm.total_settled, usd(1000));
    }

    #[test]
    fn overpayment_is_rejected_and_changes_nothing() {
        let (service, directory) = setup();
        let (group_id, users) = seeded_group(&directory, 2);

        let rm = service
            .create_expense(equal_expense(group_id, users[0], &users, usd(1000)))
            .unwrap();
        let debtor_split = rm.splits.iter().find(|s| s.user_id == users[1]).unwrap();

        service
            .record_payment(debtor_split.split_id, usd(400), Utc::now())
            .unwrap();
        let before = service.get_group_balances(group_id).unwrap();
        let version = service.group_version(group_id).unwrap();

        let err = service
            .record_payment(debtor_split.split_id, usd(200), Utc::now())
            .unwrap_err();
        match err {
            ServiceError::Domain(LedgerError::Overpayment {
                remaining,
                attempted,
                ..
            }) => {
                assert_eq!(remaining, usd(100));
                assert_eq!(attempted, usd(200));
            }
            other => panic!("expected overpayment, got {other:?}"),
        }

        assert_eq!(service.group_version(group_id).unwrap(), version);
        assert_eq!(service.get_group_balances(group_id).unwrap(), before);
    }

    #[test]
    fn unknown_splits_and_expenses_are_not_found() {
        let (service, _directory) = setup();

        assert!(matches!(
            service.record_payment(SplitId::new(), usd(100), Utc::now()),
            Err(ServiceError::Domain(LedgerError::NotFound))
        ));
        assert!(matches!(
            service.list_split_payments(SplitId::new()),
            Err(ServiceError::Domain(LedgerError::NotFound))
        ));
        assert!(matches!(
            service.get_expense(ExpenseId::new(AggregateId::new())),
            Err(ServiceError::Domain(LedgerError::NotFound))
        ));
    }

    #[test]
    fn expenses_list_newest_first() {
        let (service, directory) = setup();
        let (group_id, users) = seeded_group(&directory, 2);

        let date = Utc::now();
        let mut older = equal_expense(group_id, users[0], &users, usd(100));
        older.expense_date = date - chrono::Duration::days(2);
        older.description = "older".to_string();

        let mut tied_first = equal_expense(group_id, users[0], &users, usd(200));
        tied_first.expense_date = date;
        tied_first.description = "tied first".to_string();

        let mut tied_second = equal_expense(group_id, users[0], &users, usd(300));
        tied_second.expense_date = date;
        tied_second.description = "tied second".to_string();

        service.create_expense(tied_first).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        service.create_expense(older).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        service.create_expense(tied_second).unwrap();

        let listed = service.list_group_expenses(group_id);
        let descriptions: Vec<&str> = listed.iter().map(|e| e.description.as_str()).collect();
        assert_eq!(descriptions, vec!["tied second", "tied first", "older"]);
    }

    #[test]
    fn balances_are_cached_until_the_group_changes() {
        let (service, directory) = setup();
        let (group_id, users) = seeded_group(&directory, 3);

        let rm = service
            .create_expense(equal_expense(group_id, users[0], &users, usd(900)))
            .unwrap();

        let version = service.group_version(group_id).unwrap();
        let first = service.get_group_balances(group_id).unwrap();
        let cached = service.get_group_balances(group_id).unwrap();
        assert_eq!(first, cached);
        assert_eq!(service.group_version(group_id).unwrap(), version);

        let debtor_split = rm.splits.iter().find(|s| s.user_id == users[1]).unwrap();
        service
            .record_payment(debtor_split.split_id, usd(300), Utc::now())
            .unwrap();

        assert!(service.group_version(group_id).unwrap() > version);
        let refreshed = service.get_group_balances(group_id).unwrap();
        assert_ne!(first, refreshed);
    }

    #[test]
    fn a_self_paid_expense_settles_immediately() {
        let (service, directory) = setup();
        let (group_id, users) = seeded_group(&directory, 1);

        let rm = service
            .create_expense(equal_expense(group_id, users[0], &users, usd(750)))
            .unwrap();
        assert!(rm.is_settled);
        assert_eq!(rm.total_settled, usd(750));

        let summary = service.get_group_balances(group_id).unwrap();
        assert_eq!(summary, GroupBalanceSummary::default());
    }

    #[test]
    fn payment_history_is_in_recording_order() {
        let (service, directory) = setup();
        let (group_id, users) = seeded_group(&directory, 2);

        let rm = service
            .create_expense(equal_expense(group_id, users[0], &users, usd(1000)))
            .unwrap();
        let debtor_split = rm.splits.iter().find(|s| s.user_id == users[1]).unwrap();
        let payer_split = rm.splits.iter().find(|s| s.user_id == users[0]).unwrap();

        // Backdated payment recorded first still lists first.
        let last_week = Utc::now() - chrono::Duration::days(7);
        let yesterday = Utc::now() - chrono::Duration::days(1);
        service
            .record_payment(debtor_split.split_id, usd(200), last_week)
            .unwrap();
        service
            .record_payment(debtor_split.split_id, usd(300), yesterday)
            .unwrap();

        let history = service.list_split_payments(debtor_split.split_id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].amount, usd(200));
        assert_eq!(history[0].paid_at, last_week);
        assert_eq!(history[1].amount, usd(300));
        assert_eq!(history[1].paid_at, yesterday);
        assert!(history
            .iter()
            .all(|p| p.split_id == debtor_split.split_id && p.expense_id == rm.expense_id));

        let self_history = service.list_split_payments(payer_split.split_id).unwrap();
        assert_eq!(self_history.len(), 1);
        assert_eq!(self_history[0].amount, usd(500));
    }

    #[test]
    fn mixed_currency_groups_cannot_be_netted() {
        let (service, directory) = setup();
        let (group_id, users) = seeded_group(&directory, 2);

        service
            .create_expense(equal_expense(group_id, users[0], &users, usd(1000)))
            .unwrap();
        service
            .create_expense(equal_expense(group_id, users[1], &users, eur(800)))
            .unwrap();

        assert!(matches!(
            service.get_group_balances(group_id),
            Err(ServiceError::Domain(LedgerError::CurrencyMismatch { .. }))
        ));
    }

    #[test]
    fn a_new_service_over_the_same_store_rebuilds_its_feed() {
        splitledger_observability::init();
        let directory = Arc::new(InMemoryMembershipDirectory::new());
        let store = Arc::new(InMemoryEventStore::new());
        let service = LedgerService::new(
            Arc::clone(&store),
            Arc::new(InMemoryEventBus::new()),
            Arc::clone(&directory),
        );
        let (group_id, users) = seeded_group(&directory, 2);
        let created = service
            .create_expense(equal_expense(group_id, users[0], &users, usd(1000)))
            .unwrap();

        let restarted: TestService =
            LedgerService::new(store, Arc::new(InMemoryEventBus::new()), directory);
        assert!(matches!(
            restarted.get_expense(created.expense_id),
            Err(ServiceError::Domain(LedgerError::NotFound))
        ));

        restarted.rebuild_group_feed(group_id).unwrap();
        assert_eq!(restarted.get_expense(created.expense_id).unwrap(), created);

        // Writes work against the rebuilt feed.
        let debtor_split = created
            .splits
            .iter()
            .find(|s| s.user_id == users[1])
            .unwrap();
        let split = restarted
            .record_payment(debtor_split.split_id, usd(500), Utc::now())
            .unwrap();
        assert!(split.is_settled);
    }
}
