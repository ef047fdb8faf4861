use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

use splitledger_core::{AggregateId, GroupId, Money, SplitId, UserId};
use splitledger_events::EventEnvelope;
use splitledger_expenses::{ExpenseEvent, ExpenseId, SplitStrategy};

use crate::projections::cursor_store::{InMemoryCursorStore, ProjectionCursorStore};
use crate::read_model::GroupStore;

/// Per-split settlement progress within an expense read model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitReadModel {
    pub split_id: SplitId,
    pub expense_id: ExpenseId,
    pub user_id: UserId,
    pub share_amount: Money,
    pub settled_amount: Money,
    pub is_settled: bool,
}

/// Queryable expense read model (header + splits).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseReadModel {
    pub expense_id: ExpenseId,
    pub group_id: GroupId,
    pub paid_by_user_id: UserId,
    pub created_by_user_id: UserId,
    pub amount: Money,
    pub description: String,
    pub notes: Option<String>,
    pub split_strategy: SplitStrategy,
    pub expense_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub total_settled: Money,
    pub is_settled: bool,
    pub splits: Vec<SplitReadModel>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    group_id: GroupId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Error)]
pub enum ExpenseFeedError {
    #[error("failed to deserialize expense event: {0}")]
    Deserialize(String),
    #[error("group isolation violation: {0}")]
    GroupIsolation(String),
    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Projection maintaining the expense feed read model plus lookup indexes
/// (`split_id` → owning group and expense, `expense_id` → owning group).
///
/// The indexes exist because settlements and expense lookups are keyed by
/// bare ids at the API surface; without them every call would need a scan
/// over the group's expenses.
#[derive(Debug)]
pub struct ExpenseFeedProjection<S, C = InMemoryCursorStore>
where
    S: GroupStore<ExpenseId, ExpenseReadModel>,
{
    store: S,
    cursors: RwLock<HashMap<CursorKey, u64>>,
    cursor_store: Option<Arc<C>>,
    projection_name: String,
    split_index: RwLock<HashMap<SplitId, (GroupId, ExpenseId)>>,
    expense_index: RwLock<HashMap<ExpenseId, GroupId>>,
}

impl<S> ExpenseFeedProjection<S>
where
    S: GroupStore<ExpenseId, ExpenseReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
            cursor_store: None,
            projection_name: "expenses.feed".to_string(),
            split_index: RwLock::new(HashMap::new()),
            expense_index: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_persistent_cursors<C: ProjectionCursorStore + 'static>(
        self,
        cursor_store: Arc<C>,
        projection_name: impl Into<String>,
    ) -> ExpenseFeedProjection<S, C> {
        ExpenseFeedProjection {
            store: self.store,
            cursors: RwLock::new(HashMap::new()),
            cursor_store: Some(cursor_store),
            projection_name: projection_name.into(),
            split_index: self.split_index,
            expense_index: self.expense_index,
        }
    }
}

impl<S, C> ExpenseFeedProjection<S, C>
where
    S: GroupStore<ExpenseId, ExpenseReadModel>,
    C: ProjectionCursorStore + 'static,
{
    fn get_cursor(&self, group_id: GroupId, aggregate_id: AggregateId) -> u64 {
        if let Some(ref cursor_store) = self.cursor_store {
            cursor_store
                .get_cursor(group_id, aggregate_id, &self.projection_name)
                .unwrap_or(0)
        } else {
            match self.cursors.read() {
                Ok(cursors) => *cursors
                    .get(&CursorKey {
                        group_id,
                        aggregate_id,
                    })
                    .unwrap_or(&0),
                Err(_) => 0,
            }
        }
    }

    fn update_cursor(&self, group_id: GroupId, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.insert(
                CursorKey {
                    group_id,
                    aggregate_id,
                },
                seq,
            );
        }
        if let Some(ref cursor_store) = self.cursor_store {
            cursor_store.update_cursor(group_id, aggregate_id, &self.projection_name, seq);
        }
    }

    fn clear_cursors(&self, group_id: GroupId) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.retain(|k, _| k.group_id != group_id);
        }
        if let Some(ref cursor_store) = self.cursor_store {
            cursor_store.clear_cursors(group_id, &self.projection_name);
        }
    }

    fn index_splits(&self, group_id: GroupId, rm: &ExpenseReadModel) {
        if let Ok(mut index) = self.split_index.write() {
            for split in &rm.splits {
                index.insert(split.split_id, (group_id, rm.expense_id));
            }
        }
    }

    pub fn get(&self, group_id: GroupId, expense_id: &ExpenseId) -> Option<ExpenseReadModel> {
        self.store.get(group_id, expense_id)
    }

    pub fn list(&self, group_id: GroupId) -> Vec<ExpenseReadModel> {
        self.store.list(group_id)
    }

    /// Resolve a split id to its owning (group, expense).
    pub fn split_ref(&self, split_id: SplitId) -> Option<(GroupId, ExpenseId)> {
        let index = self.split_index.read().ok()?;
        index.get(&split_id).copied()
    }

    /// Resolve an expense id to its owning group.
    pub fn expense_group(&self, expense_id: ExpenseId) -> Option<GroupId> {
        let index = self.expense_index.read().ok()?;
        index.get(&expense_id).copied()
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ExpenseFeedError> {
        if envelope.aggregate_type() != "expenses.expense" {
            return Ok(());
        }

        let group_id = envelope.group_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let last = self.get_cursor(group_id, aggregate_id);
        if seq == 0 {
            return Err(ExpenseFeedError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(());
        }
        if seq != last + 1 && last != 0 {
            return Err(ExpenseFeedError::NonMonotonicSequence { last, found: seq });
        }

        let ev: ExpenseEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ExpenseFeedError::Deserialize(e.to_string()))?;

        let (event_group, expense_id) = match &ev {
            ExpenseEvent::ExpenseCreated(e) => (e.group_id, e.expense_id),
            ExpenseEvent::SettlementRecorded(e) => (e.group_id, e.expense_id),
        };

        if event_group != group_id {
            return Err(ExpenseFeedError::GroupIsolation(
                "event group_id does not match envelope group_id".to_string(),
            ));
        }
        if expense_id.0 != aggregate_id {
            return Err(ExpenseFeedError::GroupIsolation(
                "event expense_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            ExpenseEvent::ExpenseCreated(e) => {
                let splits: Vec<SplitReadModel> = e
                    .splits
                    .iter()
                    .map(|s| SplitReadModel {
                        split_id: s.split_id,
                        expense_id: e.expense_id,
                        user_id: s.user_id,
                        share_amount: s.share_amount,
                        settled_amount: s.settled_amount,
                        is_settled: s.is_settled,
                    })
                    .collect();

                let rm = ExpenseReadModel {
                    expense_id: e.expense_id,
                    group_id: e.group_id,
                    paid_by_user_id: e.paid_by_user_id,
                    created_by_user_id: e.created_by_user_id,
                    amount: e.amount,
                    description: e.description,
                    notes: e.notes,
                    split_strategy: e.split_strategy,
                    expense_date: e.expense_date,
                    created_at: e.occurred_at,
                    updated_at: None,
                    total_settled: Money::zero(e.amount.currency()),
                    is_settled: splits.iter().all(|s| s.is_settled),
                    splits,
                };
                self.index_splits(group_id, &rm);
                if let Ok(mut index) = self.expense_index.write() {
                    index.insert(e.expense_id, group_id);
                }
                self.store.upsert(group_id, e.expense_id, rm);
            }
            ExpenseEvent::SettlementRecorded(e) => {
                let Some(mut rm) = self.store.get(group_id, &e.expense_id) else {
                    // A settlement always follows the creation event in its
                    // stream, so this is only reachable if the read model was
                    // lost out-of-band. A rebuild heals it; skip the cursor so
                    // replays of this event are not silently dropped.
                    tracing::warn!(
                        expense_id = %e.expense_id,
                        split_id = %e.split_id,
                        "settlement for unknown expense read model, skipping"
                    );
                    return Ok(());
                };

                let Some(split) = rm.splits.iter_mut().find(|s| s.split_id == e.split_id) else {
                    tracing::warn!(
                        expense_id = %e.expense_id,
                        split_id = %e.split_id,
                        "settlement for unknown split, skipping"
                    );
                    return Ok(());
                };
                split.settled_amount = e.new_settled_amount;
                split.is_settled = e.split_settled;

                rm.total_settled = e.new_settled_total;
                rm.is_settled = rm.splits.iter().all(|s| s.is_settled);
                rm.updated_at = Some(e.occurred_at);
                self.store.upsert(group_id, e.expense_id, rm);
            }
        }

        self.update_cursor(group_id, aggregate_id, seq);
        Ok(())
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ExpenseFeedError> {
        let mut envs: Vec<_> = envelopes.into_iter().collect();

        {
            let mut groups = envs.iter().map(|e| e.group_id()).collect::<Vec<_>>();
            groups.sort_by_key(|g| *g.as_uuid().as_bytes());
            groups.dedup();
            for g in groups {
                self.store.clear_group(g);
                self.clear_cursors(g);
                if let Ok(mut index) = self.split_index.write() {
                    index.retain(|_, (owner, _)| *owner != g);
                }
                if let Ok(mut index) = self.expense_index.write() {
                    index.retain(|_, owner| *owner != g);
                }
            }
        }

        envs.sort_by_key(|e| {
            (
                *e.group_id().as_uuid().as_bytes(),
                *e.aggregate_id().as_uuid().as_bytes(),
                e.sequence_number(),
            )
        });

        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}
