//! Statement stepper
//!
//! The resumable state machine at the heart of the crate. One stepper
//! binds one prepared statement, one connection handle and one row
//! consumer, and advances the native engine one step at a time under the
//! cooperative scheduler:
//!
//! ```text
//! Init ──► ColumnSetup ──► Stepping ──► Done
//!   │                        │  ▲
//!   │ (USED held elsewhere)  │  │ (row delivered, same tick)
//!   ▼                        ▼  │
//! yield                    yield on Busy
//! ```
//!
//! Completion always finalizes the native statement exactly once and
//! releases the connection's USED flag exactly once, even when no row was
//! produced, the consumer is absent, or the stepper is dropped mid-flight.
//!
//! Any non-busy, non-row step status routes to Done exactly like running
//! out of rows. A mid-query engine failure is therefore indistinguishable
//! from clean completion to the caller, and partial results already
//! delivered remain valid. This mirrors the engine-agnostic stepping
//! contract as it stands; it is deliberate, not an oversight to patch
//! around.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::connection::Connection;
use crate::engine::{EngineStatement, StepOutcome};
use crate::row::Row;
use crate::scheduler::{Resumable, Tick};

/// Row consumer installed by the facade. Invoked synchronously, in engine
/// order, never after the stepper reaches Done.
pub(crate) type RowSink = Box<dyn FnMut(Row) + Send>;

/// Completion hook fired exactly once when the stepper reaches Done.
pub(crate) type DoneHook = Box<dyn FnOnce() + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Waiting to acquire the connection's USED flag.
    Init,
    /// Capturing column names, once, before the first row.
    ColumnSetup,
    /// Driving the native step primitive.
    Stepping,
    /// Terminal; native resources released.
    Done,
}

/// Resumable unit advancing one prepared statement.
pub(crate) struct Stepper {
    /// The statement; taken exactly once on finish.
    stmt: Option<Box<dyn EngineStatement>>,

    /// Row consumer; absent means a deliberate no-op execution.
    sink: Option<RowSink>,

    /// Fired once on completion (future-mode resolution).
    on_done: Option<DoneHook>,

    /// Column names, captured once in ColumnSetup.
    columns: Arc<[String]>,

    phase: Phase,

    /// Whether this stepper currently holds the connection's USED flag.
    holds_used: bool,

    rows_delivered: u64,

    /// Handle clone keeping the native connection alive for the life of
    /// the statement.
    conn: Connection,
}

impl Stepper {
    pub(crate) fn new(
        conn: Connection,
        stmt: Box<dyn EngineStatement>,
        sink: Option<RowSink>,
        on_done: Option<DoneHook>,
    ) -> Self {
        Self {
            stmt: Some(stmt),
            sink,
            on_done,
            columns: Vec::new().into(),
            phase: Phase::Init,
            holds_used: false,
            rows_delivered: 0,
            conn,
        }
    }

    /// Release everything this stepper owns. Every release is guarded so
    /// repeated calls (resume after Done, Drop after finish) are no-ops.
    fn finish(&mut self) {
        if let Some(mut stmt) = self.stmt.take() {
            stmt.finalize();
            debug!(rows = self.rows_delivered, "statement finished");
        }
        if self.holds_used {
            self.conn.release();
            self.holds_used = false;
        }
        if let Some(hook) = self.on_done.take() {
            hook();
        }
        self.phase = Phase::Done;
    }
}

impl Resumable for Stepper {
    fn resume(&mut self) -> Tick {
        loop {
            match self.phase {
                Phase::Init => {
                    if !self.conn.try_acquire() {
                        // Another statement holds the connection; retry
                        // on a later tick.
                        trace!("connection in use, yielding");
                        return Tick::Continue;
                    }
                    self.holds_used = true;

                    if self.sink.is_none() {
                        // Absent consumer: deliberate no-op execution,
                        // not an error.
                        debug!("no row consumer, finalizing without stepping");
                        self.finish();
                        return Tick::Stop;
                    }
                    self.phase = Phase::ColumnSetup;
                }

                Phase::ColumnSetup => {
                    let Some(stmt) = self.stmt.as_ref() else {
                        self.finish();
                        return Tick::Stop;
                    };
                    let names: Vec<String> = (0..stmt.column_count())
                        .map(|i| stmt.column_name(i))
                        .collect();
                    self.columns = names.into();
                    self.phase = Phase::Stepping;
                }

                Phase::Stepping => {
                    let Some(stmt) = self.stmt.as_mut() else {
                        self.finish();
                        return Tick::Stop;
                    };
                    match stmt.step() {
                        StepOutcome::Busy => {
                            trace!("statement busy, yielding");
                            return Tick::Continue;
                        }
                        StepOutcome::Row => {
                            let cells: Vec<Option<String>> = (0..self.columns.len())
                                .map(|i| stmt.column_text(i))
                                .collect();
                            let row = Row::new(self.columns.clone(), cells);
                            self.rows_delivered += 1;
                            if let Some(sink) = self.sink.as_mut() {
                                sink(row);
                            }
                            // Drain further committed rows on this same
                            // tick before yielding.
                        }
                        StepOutcome::Done | StepOutcome::Other(_) => {
                            self.finish();
                            return Tick::Stop;
                        }
                    }
                }

                Phase::Done => return Tick::Stop,
            }
        }
    }
}

impl Drop for Stepper {
    fn drop(&mut self) {
        // A stepper discarded mid-flight must not leak the statement or
        // the USED flag.
        self.finish();
    }
}
