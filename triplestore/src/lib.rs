//! Triple-store abstraction driven by the replay harness.
//!
//! The harness only needs a narrow contract from its backing store: bracket
//! a unit of work in a transaction, read all statements matching an object,
//! and add new statements. This crate defines that contract as object-safe
//! async traits plus an in-memory implementation used both by the binary
//! and by tests.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

mod error;
mod memory;

pub use crate::error::{StoreError, StoreResult};
pub use crate::memory::MemoryStore;

use std::fmt::Debug;
use std::sync::Arc;

/// A single (subject, predicate, object) statement.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Statement {
    /// The subject entity identifier.
    pub subject: String,
    /// The relation identifier.
    pub predicate: String,
    /// The object entity identifier.
    pub object: String,
}

impl Statement {
    /// Creates a statement from its three components.
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }
}

/// A type-erased [`Store`] instance shared across worker tasks.
pub type SharedStore = Arc<dyn Store>;

/// A triple store that can execute transactional units of work.
#[async_trait::async_trait]
pub trait Store: Debug + Send + Sync + 'static {
    /// The store name, used for diagnostics.
    fn name(&self) -> &'static str;

    /// Begins a new transaction.
    ///
    /// Reads issued through the returned handle see a consistent snapshot
    /// of previously committed statements; writes are buffered until
    /// [`StoreTransaction::commit`].
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;
}

/// One unit of work against a [`Store`].
///
/// Dropping the handle without calling [`commit`](Self::commit) discards
/// all buffered writes.
#[async_trait::async_trait]
pub trait StoreTransaction: Send {
    /// Returns all committed statements whose object matches `object`.
    async fn query_by_object(&mut self, object: &str) -> StoreResult<Vec<Statement>>;

    /// Buffers a new statement for insertion at commit time.
    async fn add_statement(
        &mut self,
        subject: &str,
        predicate: &str,
        object: &str,
    ) -> StoreResult<()>;

    /// Atomically applies all buffered writes.
    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
