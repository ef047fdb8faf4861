mod group_store;

pub use group_store::{GroupStore, InMemoryGroupStore};
