mod cursor_store;
mod expense_feed;

pub use cursor_store::{InMemoryCursorStore, ProjectionCursorStore};
pub use expense_feed::{
    ExpenseFeedError, ExpenseFeedProjection, ExpenseReadModel, SplitReadModel,
};
