//! Test support: a scripted native engine
//!
//! Unit tests drive the stepper and the handle lifecycle against an
//! engine whose step outcomes are scripted up front, with shared counters
//! observing exactly-once resource release. Integration tests in
//! `tests/` use the real SQLite engine instead.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::connection::Connection;
use crate::engine::{EngineConnection, EngineStatement, StepOutcome};
use crate::error::{Result, SqlError};
use crate::scheduler::Scheduler;

/// Shared counters observing native-resource lifecycle from tests.
#[derive(Debug, Default)]
pub(crate) struct EngineProbe {
    pub(crate) prepares: AtomicUsize,
    pub(crate) steps: AtomicUsize,
    pub(crate) finalizes: AtomicUsize,
    pub(crate) closes: AtomicUsize,
}

pub(crate) fn probe() -> Arc<EngineProbe> {
    Arc::new(EngineProbe::default())
}

/// Connection whose prepared statements are scripted in call order.
pub(crate) struct ScriptedConnection {
    statements: VecDeque<ScriptedStatement>,
    probe: Arc<EngineProbe>,
}

impl EngineConnection for ScriptedConnection {
    fn prepare(&mut self, _sql: &str) -> Result<Box<dyn EngineStatement>> {
        self.probe.prepares.fetch_add(1, Ordering::SeqCst);
        match self.statements.pop_front() {
            Some(stmt) => Ok(Box::new(stmt)),
            None => Err(SqlError::Prepare(
                "no scripted statement remaining".to_string(),
            )),
        }
    }
}

impl Drop for ScriptedConnection {
    fn drop(&mut self) {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Statement replaying a fixed sequence of step outcomes and rows.
pub(crate) struct ScriptedStatement {
    columns: Vec<String>,
    outcomes: VecDeque<StepOutcome>,
    rows: VecDeque<Vec<Option<String>>>,
    current: Option<Vec<Option<String>>>,
    finalized: bool,
    probe: Arc<EngineProbe>,
}

impl ScriptedStatement {
    pub(crate) fn new(
        columns: Vec<String>,
        outcomes: Vec<StepOutcome>,
        rows: Vec<Vec<Option<String>>>,
        probe: Arc<EngineProbe>,
    ) -> Self {
        Self {
            columns,
            outcomes: outcomes.into(),
            rows: rows.into(),
            current: None,
            finalized: false,
            probe,
        }
    }
}

impl EngineStatement for ScriptedStatement {
    fn step(&mut self) -> StepOutcome {
        self.probe.steps.fetch_add(1, Ordering::SeqCst);
        let outcome = self.outcomes.pop_front().unwrap_or(StepOutcome::Done);
        if outcome == StepOutcome::Row {
            self.current = self.rows.pop_front();
        }
        outcome
    }

    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_name(&self, index: usize) -> String {
        self.columns
            .get(index)
            .cloned()
            .unwrap_or_else(|| "?".to_string())
    }

    fn column_text(&self, index: usize) -> Option<String> {
        self.current
            .as_ref()
            .and_then(|row| row.get(index).cloned().flatten())
    }

    fn finalize(&mut self) {
        if !self.finalized {
            self.finalized = true;
            self.probe.finalizes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Drop for ScriptedStatement {
    fn drop(&mut self) {
        self.finalize();
    }
}

/// A plain SELECT script: one Row outcome per row, then Done.
pub(crate) fn script_select(
    probe: &Arc<EngineProbe>,
    columns: &[&str],
    rows: Vec<Vec<Option<String>>>,
) -> ScriptedStatement {
    let mut outcomes = vec![StepOutcome::Row; rows.len()];
    outcomes.push(StepOutcome::Done);
    ScriptedStatement::new(
        columns.iter().map(|c| c.to_string()).collect(),
        outcomes,
        rows,
        probe.clone(),
    )
}

/// Handle over a scripted connection with an empty statement script.
pub(crate) fn scripted_connection(probe: &Arc<EngineProbe>) -> Connection {
    let (conn, _scheduler) = scripted_connection_with_scheduler(probe, Vec::new());
    conn
}

/// Handle over a scripted connection, returning its scheduler as well.
pub(crate) fn scripted_connection_with_scheduler(
    probe: &Arc<EngineProbe>,
    statements: Vec<ScriptedStatement>,
) -> (Connection, Arc<Scheduler>) {
    let scheduler = Arc::new(Scheduler::new());
    let native = ScriptedConnection {
        statements: statements.into(),
        probe: probe.clone(),
    };
    let conn = Connection::from_native(Box::new(native), scheduler.clone());
    (conn, scheduler)
}
