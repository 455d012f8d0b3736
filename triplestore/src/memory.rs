//! In-memory triple store.
//!
//! This provides a [`Store`] backed by a `HashMap` keyed by object,
//! removing the need for an external database in the binary and in tests.
//! The store is [`Clone`] so tests can hold a handle for direct inspection
//! while the harness owns a shared copy.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::StoreResult;
use crate::{Statement, Store, StoreTransaction};

/// Committed statements, indexed by object for the read path.
#[derive(Debug, Default)]
struct Tables {
    by_object: HashMap<String, Vec<(String, String)>>,
    len: usize,
}

impl Tables {
    fn matches(&self, object: &str) -> Vec<Statement> {
        match self.by_object.get(object) {
            Some(entries) => entries
                .iter()
                .map(|(subject, predicate)| Statement::new(subject, predicate, object))
                .collect(),
            None => Vec::new(),
        }
    }

    fn insert(&mut self, statement: Statement) {
        self.by_object
            .entry(statement.object)
            .or_default()
            .push((statement.subject, statement.predicate));
        self.len += 1;
    }
}

/// An in-memory [`Store`].
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of committed statements.
    pub fn statement_count(&self) -> usize {
        self.tables.lock().unwrap().len
    }

    /// Returns all committed statements matching the given object,
    /// bypassing the transaction machinery.
    pub fn statements_with_object(&self, object: &str) -> Vec<Statement> {
        self.tables.lock().unwrap().matches(object)
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        Ok(Box::new(MemoryTransaction {
            tables: Arc::clone(&self.tables),
            staged: Vec::new(),
        }))
    }
}

/// A transaction on a [`MemoryStore`].
///
/// Reads go against the committed tables; writes are staged locally and
/// applied under the table lock on commit, so a commit is atomic with
/// respect to concurrent readers.
#[derive(Debug)]
struct MemoryTransaction {
    tables: Arc<Mutex<Tables>>,
    staged: Vec<Statement>,
}

#[async_trait::async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn query_by_object(&mut self, object: &str) -> StoreResult<Vec<Statement>> {
        Ok(self.tables.lock().unwrap().matches(object))
    }

    async fn add_statement(
        &mut self,
        subject: &str,
        predicate: &str,
        object: &str,
    ) -> StoreResult<()> {
        self.staged.push(Statement::new(subject, predicate, object));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTransaction { tables, staged } = *self;
        let mut tables = tables.lock().unwrap();
        for statement in staged {
            tables.insert(statement);
        }
        Ok(())
    }
}
