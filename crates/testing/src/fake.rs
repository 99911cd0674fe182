//! Scripted database that records every call
//!
//! Useful for checking which statements the engine issues, and in which
//! order, without a real database.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use strata_migrate::{DatabaseError, DatabasePool, DatabaseResult, DatabaseRow, DatabaseTransaction, DatabaseValue};

/// One recorded call
#[derive(Debug, Clone, PartialEq)]
pub enum FakeEvent {
    Execute(String),
    Fetch(String),
    Begin,
    TxExecute(String, Vec<DatabaseValue>),
    Script(String),
    Commit,
    Rollback,
}

#[derive(Debug, Default)]
struct FakeState {
    events: Vec<FakeEvent>,
    fetch_responses: VecDeque<Vec<DatabaseRow>>,
    fail_script_containing: Option<String>,
    fail_commit: bool,
}

/// Database double; cloned handles share the recorded events
#[derive(Debug, Clone, Default)]
pub struct FakeDatabase {
    state: Arc<Mutex<FakeState>>,
}

impl FakeDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the rows returned by the next `fetch_all`; an empty queue returns no rows
    pub fn push_fetch_response(&self, rows: Vec<DatabaseRow>) {
        self.lock().fetch_responses.push_back(rows);
    }

    /// Fail any script whose text contains `needle`
    pub fn fail_script_containing(&self, needle: impl Into<String>) {
        self.lock().fail_script_containing = Some(needle.into());
    }

    /// Fail every commit
    pub fn fail_commit(&self) {
        self.lock().fail_commit = true;
    }

    /// All calls recorded so far
    pub fn events(&self) -> Vec<FakeEvent> {
        self.lock().events.clone()
    }

    /// Scripts executed so far, in order
    pub fn scripts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                FakeEvent::Script(script) => Some(script),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, event: FakeEvent) {
        self.lock().events.push(event);
    }
}

#[async_trait]
impl DatabasePool for FakeDatabase {
    async fn execute(&self, sql: &str, _params: &[DatabaseValue]) -> DatabaseResult<u64> {
        self.record(FakeEvent::Execute(sql.to_string()));
        Ok(0)
    }

    async fn fetch_all(&self, sql: &str, _params: &[DatabaseValue]) -> DatabaseResult<Vec<DatabaseRow>> {
        let mut state = self.lock();
        state.events.push(FakeEvent::Fetch(sql.to_string()));
        Ok(state.fetch_responses.pop_front().unwrap_or_default())
    }

    async fn begin_transaction(&self) -> DatabaseResult<Box<dyn DatabaseTransaction>> {
        self.record(FakeEvent::Begin);
        Ok(Box::new(FakeTransaction { db: self.clone() }))
    }
}

struct FakeTransaction {
    db: FakeDatabase,
}

#[async_trait]
impl DatabaseTransaction for FakeTransaction {
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<u64> {
        self.db.record(FakeEvent::TxExecute(sql.to_string(), params.to_vec()));
        Ok(1)
    }

    async fn execute_script(&mut self, script: &str) -> DatabaseResult<()> {
        let mut state = self.db.lock();
        state.events.push(FakeEvent::Script(script.to_string()));

        match &state.fail_script_containing {
            Some(needle) if script.contains(needle.as_str()) => {
                Err(DatabaseError::Other(format!("scripted failure on '{}'", needle)))
            }
            _ => Ok(()),
        }
    }

    async fn commit(self: Box<Self>) -> DatabaseResult<()> {
        let mut state = self.db.lock();
        if state.fail_commit {
            return Err(DatabaseError::Other("scripted commit failure".to_string()));
        }
        state.events.push(FakeEvent::Commit);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> DatabaseResult<()> {
        self.db.record(FakeEvent::Rollback);
        Ok(())
    }
}
