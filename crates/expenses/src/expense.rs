use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use splitledger_core::{
    Aggregate, AggregateId, AggregateRoot, GroupId, LedgerError, Money, PaymentId, SplitId, UserId,
};
use splitledger_events::Event;

use crate::calculator;
use crate::split::{SettlementPayment, Split, SplitStrategy};

/// Expense identifier (group-scoped via `group_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpenseId(pub AggregateId);

impl ExpenseId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ExpenseId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: Expense.
///
/// An expense is immutable once created; the only state that changes afterward
/// is settlement progress on its splits, driven by `SettlementRecorded` events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expense {
    id: ExpenseId,
    group_id: Option<GroupId>,
    paid_by: Option<UserId>,
    created_by: Option<UserId>,
    amount: Option<Money>,
    description: String,
    notes: Option<String>,
    strategy: Option<SplitStrategy>,
    expense_date: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    splits: Vec<Split>,
    payments: Vec<SettlementPayment>,
    version: u64,
    created: bool,
}

impl Expense {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ExpenseId) -> Self {
        Self {
            id,
            group_id: None,
            paid_by: None,
            created_by: None,
            amount: None,
            description: String::new(),
            notes: None,
            strategy: None,
            expense_date: None,
            created_at: None,
            updated_at: None,
            splits: Vec::new(),
            payments: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ExpenseId {
        self.id
    }

    pub fn group_id(&self) -> Option<GroupId> {
        self.group_id
    }

    pub fn paid_by_user_id(&self) -> Option<UserId> {
        self.paid_by
    }

    pub fn created_by_user_id(&self) -> Option<UserId> {
        self.created_by
    }

    pub fn amount(&self) -> Option<Money> {
        self.amount
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn split_strategy(&self) -> Option<&SplitStrategy> {
        self.strategy.as_ref()
    }

    pub fn expense_date(&self) -> Option<DateTime<Utc>> {
        self.expense_date
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Business time of the most recent settlement, if any.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn splits(&self) -> &[Split] {
        &self.splits
    }

    pub fn split(&self, split_id: SplitId) -> Option<&Split> {
        self.splits.iter().find(|s| s.split_id == split_id)
    }

    /// Settlement payments in the order they were recorded (including the
    /// payer's own share settled at creation).
    pub fn payments(&self) -> &[SettlementPayment] {
        &self.payments
    }

    /// Sum of settled amounts across all splits.
    pub fn settled_total(&self) -> Option<Money> {
        let amount = self.amount?;
        let sum: i64 = self
            .splits
            .iter()
            .map(|s| s.settled_amount.minor_units())
            .sum();
        Some(Money::from_minor_units(sum, amount.currency()))
    }

    /// An expense is settled exactly when every split is settled.
    pub fn is_settled(&self) -> bool {
        self.created && self.splits.iter().all(|s| s.is_settled)
    }
}

impl AggregateRoot for Expense {
    type Id = ExpenseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateExpense.
///
/// Identifiers (`expense_id`, `split_ids`, `self_payment_id`) are allocated by
/// the caller so that handling stays pure and replayable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateExpense {
    pub group_id: GroupId,
    pub expense_id: ExpenseId,
    pub paid_by_user_id: UserId,
    pub created_by_user_id: UserId,
    pub amount: Money,
    pub description: String,
    pub notes: Option<String>,
    pub split_strategy: SplitStrategy,
    pub expense_date: DateTime<Utc>,
    pub participant_user_ids: Vec<UserId>,
    /// One split id per participant, in participant order.
    pub split_ids: Vec<SplitId>,
    /// Payment id used when the payer participates and their own share is
    /// settled at creation. Unused otherwise.
    pub self_payment_id: PaymentId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub group_id: GroupId,
    pub expense_id: ExpenseId,
    pub split_id: SplitId,
    pub payment_id: PaymentId,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpenseCommand {
    CreateExpense(CreateExpense),
    RecordPayment(RecordPayment),
}

/// Event: ExpenseCreated.
///
/// Carries the fully computed splits so the expense (and every read model) can
/// be rebuilt without re-running the calculator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseCreated {
    pub group_id: GroupId,
    pub expense_id: ExpenseId,
    pub paid_by_user_id: UserId,
    pub created_by_user_id: UserId,
    pub amount: Money,
    pub description: String,
    pub notes: Option<String>,
    pub split_strategy: SplitStrategy,
    pub expense_date: DateTime<Utc>,
    pub splits: Vec<Split>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SettlementRecorded.
///
/// Carries the post-payment running totals (`new_settled_amount` for the
/// split, `new_settled_total` for the expense) so projections can update
/// without re-deriving them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRecorded {
    pub group_id: GroupId,
    pub expense_id: ExpenseId,
    pub split_id: SplitId,
    pub payment_id: PaymentId,
    pub amount: Money,
    pub new_settled_amount: Money,
    pub new_settled_total: Money,
    pub split_settled: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpenseEvent {
    ExpenseCreated(ExpenseCreated),
    SettlementRecorded(SettlementRecorded),
}

impl Event for ExpenseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ExpenseEvent::ExpenseCreated(_) => "expenses.expense.created",
            ExpenseEvent::SettlementRecorded(_) => "expenses.expense.settlement_recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ExpenseEvent::ExpenseCreated(e) => e.occurred_at,
            ExpenseEvent::SettlementRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Expense {
    type Command = ExpenseCommand;
    type Event = ExpenseEvent;
    type Error = LedgerError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ExpenseEvent::ExpenseCreated(e) => {
                self.id = e.expense_id;
                self.group_id = Some(e.group_id);
                self.paid_by = Some(e.paid_by_user_id);
                self.created_by = Some(e.created_by_user_id);
                self.amount = Some(e.amount);
                self.description = e.description.clone();
                self.notes = e.notes.clone();
                self.strategy = Some(e.split_strategy.clone());
                self.expense_date = Some(e.expense_date);
                self.created_at = Some(e.occurred_at);
                self.splits = e.splits.clone();
                self.payments = Vec::new();
                self.created = true;
            }
            ExpenseEvent::SettlementRecorded(e) => {
                if let Some(split) = self.splits.iter_mut().find(|s| s.split_id == e.split_id) {
                    split.settled_amount = e.new_settled_amount;
                    split.is_settled = e.split_settled;
                }
                self.payments.push(SettlementPayment {
                    payment_id: e.payment_id,
                    split_id: e.split_id,
                    amount: e.amount,
                    paid_at: e.occurred_at,
                });
                self.updated_at = Some(e.occurred_at);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ExpenseCommand::CreateExpense(cmd) => self.handle_create(cmd),
            ExpenseCommand::RecordPayment(cmd) => self.handle_record_payment(cmd),
        }
    }
}

impl Expense {
    fn ensure_group(&self, group_id: GroupId) -> Result<(), LedgerError> {
        if !self.created {
            return Ok(());
        }
        if self.group_id != Some(group_id) {
            return Err(LedgerError::conflict("group mismatch"));
        }
        Ok(())
    }

    fn ensure_expense_id(&self, expense_id: ExpenseId) -> Result<(), LedgerError> {
        if self.id != expense_id {
            return Err(LedgerError::conflict("expense id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateExpense) -> Result<Vec<ExpenseEvent>, LedgerError> {
        if self.created {
            return Err(LedgerError::conflict("expense already exists"));
        }

        if cmd.split_ids.len() != cmd.participant_user_ids.len() {
            return Err(LedgerError::invalid_split(
                "one split id per participant is required",
            ));
        }
        for (i, split_id) in cmd.split_ids.iter().enumerate() {
            if cmd.split_ids[..i].contains(split_id) {
                return Err(LedgerError::invalid_split("split ids must be unique"));
            }
        }

        let shares =
            calculator::compute_shares(cmd.amount, &cmd.split_strategy, &cmd.participant_user_ids)?;

        let currency = cmd.amount.currency();
        let splits: Vec<Split> = cmd
            .participant_user_ids
            .iter()
            .zip(cmd.split_ids.iter())
            .zip(shares.iter())
            .map(|((user_id, split_id), share)| Split {
                split_id: *split_id,
                user_id: *user_id,
                share_amount: *share,
                settled_amount: Money::zero(currency),
                // A zero share has nothing left to settle.
                is_settled: share.is_zero(),
            })
            .collect();

        let mut events = vec![ExpenseEvent::ExpenseCreated(ExpenseCreated {
            group_id: cmd.group_id,
            expense_id: cmd.expense_id,
            paid_by_user_id: cmd.paid_by_user_id,
            created_by_user_id: cmd.created_by_user_id,
            amount: cmd.amount,
            description: cmd.description.clone(),
            notes: cmd.notes.clone(),
            split_strategy: cmd.split_strategy.clone(),
            expense_date: cmd.expense_date,
            splits: splits.clone(),
            occurred_at: cmd.occurred_at,
        })];

        // The payer's own share is settled immediately: they covered it when
        // they paid the bill.
        if let Some(own) = splits
            .iter()
            .find(|s| s.user_id == cmd.paid_by_user_id)
            .filter(|s| s.share_amount.is_positive())
        {
            events.push(ExpenseEvent::SettlementRecorded(SettlementRecorded {
                group_id: cmd.group_id,
                expense_id: cmd.expense_id,
                split_id: own.split_id,
                payment_id: cmd.self_payment_id,
                amount: own.share_amount,
                new_settled_amount: own.share_amount,
                new_settled_total: own.share_amount,
                split_settled: true,
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }

    fn handle_record_payment(&self, cmd: &RecordPayment) -> Result<Vec<ExpenseEvent>, LedgerError> {
        if !self.created {
            return Err(LedgerError::not_found());
        }
        self.ensure_group(cmd.group_id)?;
        self.ensure_expense_id(cmd.expense_id)?;

        let split = self
            .split(cmd.split_id)
            .ok_or_else(LedgerError::not_found)?;

        if !cmd.amount.is_positive() {
            return Err(LedgerError::invalid_amount(
                "payment amount must be positive",
            ));
        }

        if self.payments.iter().any(|p| p.payment_id == cmd.payment_id) {
            return Err(LedgerError::conflict("payment id already recorded"));
        }

        let new_settled_amount = split.settled_amount.checked_add(cmd.amount)?;
        if new_settled_amount.minor_units() > split.share_amount.minor_units() {
            return Err(LedgerError::Overpayment {
                split_id: cmd.split_id,
                remaining: split.remaining(),
                attempted: cmd.amount,
            });
        }

        let settled_total = self.settled_total().ok_or_else(LedgerError::not_found)?;
        let new_settled_total = settled_total.checked_add(cmd.amount)?;

        Ok(vec![ExpenseEvent::SettlementRecorded(SettlementRecorded {
            group_id: cmd.group_id,
            expense_id: cmd.expense_id,
            split_id: cmd.split_id,
            payment_id: cmd.payment_id,
            amount: cmd.amount,
            new_settled_amount,
            new_settled_total,
            split_settled: new_settled_amount == split.share_amount,
            occurred_at: cmd.occurred_at,
        })])
    }
}
