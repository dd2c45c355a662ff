//! Connection handles and the execution facade
//!
//! A [`Connection`] is a cheaply clonable, shared-owned handle to one
//! native engine connection. All clones (and every stepper spawned from
//! them) share one inner state; the native connection is released exactly
//! once, when the last owner drops.
//!
//! Handle state is three independent boolean facets, not one mutually
//! exclusive mode: `open` records a successful native open, `used` is the
//! per-connection mutual-exclusion flag held by at most one stepper at a
//! time, and `closed` marks the handle terminal. USED combines freely
//! with OPEN; CLOSED is never cleared.
//!
//! The facade methods choose the delivery mode for one SQL statement:
//! [`Connection::emit`] streams rows into a callback as the scheduler
//! ticks, [`Connection::resolve`] materializes them behind a
//! [`QueryFuture`], and [`Connection::wait`] is the blocking convenience
//! that drives the scheduler until that future settles.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::engine::sqlite::SqliteConnection;
use crate::engine::{EngineConnection, EngineStatement};
use crate::error::{Result, SqlError};
use crate::future::QueryFuture;
use crate::row::Row;
use crate::scheduler::Scheduler;
use crate::stepper::{DoneHook, RowSink, Stepper};

/// Independent state facets of a connection handle.
#[derive(Debug, Clone, Copy)]
struct HandleState {
    /// A native open succeeded.
    open: bool,
    /// A stepper currently owns the connection.
    used: bool,
    /// Terminal; the handle can never execute again.
    closed: bool,
}

/// State shared by every clone of one handle.
struct ConnectionInner {
    /// The native connection; `None` once released.
    native: Mutex<Option<Box<dyn EngineConnection>>>,

    /// State facets, mutated under one lock so USED acquisition is a
    /// single test-and-set.
    state: Mutex<HandleState>,

    /// Scheduler that steppers for this handle are registered with.
    /// Absent only on the null-object default handle.
    scheduler: Option<Arc<Scheduler>>,
}

impl ConnectionInner {
    /// Release the native connection. Guarded by the `Option` so the
    /// release happens exactly once no matter how often this runs.
    fn free(&self) {
        if self.native.lock().take().is_some() {
            self.state.lock().closed = true;
            debug!("native connection released");
        }
    }
}

impl Drop for ConnectionInner {
    fn drop(&mut self) {
        self.free();
    }
}

/// Shared-owned handle to one native engine connection.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    /// Open a database at `path`, creating the file if necessary.
    ///
    /// Statements executed through the returned handle are registered
    /// with `scheduler` and advance as it ticks.
    pub fn open(scheduler: Arc<Scheduler>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let native = SqliteConnection::open(path)?;
        debug!(path = %path.display(), "connection opened");
        Ok(Self::from_native(Box::new(native), scheduler))
    }

    /// Open a private in-memory database.
    pub fn open_in_memory(scheduler: Arc<Scheduler>) -> Result<Self> {
        let native = SqliteConnection::open(Path::new(":memory:"))?;
        debug!("in-memory connection opened");
        Ok(Self::from_native(Box::new(native), scheduler))
    }

    pub(crate) fn from_native(
        native: Box<dyn EngineConnection>,
        scheduler: Arc<Scheduler>,
    ) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                native: Mutex::new(Some(native)),
                state: Mutex::new(HandleState {
                    open: true,
                    used: false,
                    closed: false,
                }),
                scheduler: Some(scheduler),
            }),
        }
    }

    /// Whether the handle is terminal.
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Whether a stepper currently owns the connection.
    pub fn is_used(&self) -> bool {
        self.inner.state.lock().used
    }

    /// Whether the handle can accept new statements.
    pub fn is_available(&self) -> bool {
        !self.is_closed()
    }

    /// Mark the handle closed.
    ///
    /// Idempotent. Does not release native resources; those go when the
    /// last owner (handle clone or in-flight stepper) drops. A statement
    /// already mid-flight runs to its natural completion.
    pub fn close(&self) {
        let mut state = self.inner.state.lock();
        if !state.closed {
            state.closed = true;
            debug!("connection closed");
        }
    }

    /// Test-and-set the USED flag. At most one stepper holds it.
    pub(crate) fn try_acquire(&self) -> bool {
        let mut state = self.inner.state.lock();
        if state.used {
            false
        } else {
            state.used = true;
            true
        }
    }

    /// Clear the USED flag. Idempotent.
    pub(crate) fn release(&self) {
        self.inner.state.lock().used = false;
    }

    /// Execute `sql`, streaming each result row into `on_row`.
    ///
    /// Setup errors (empty SQL, closed handle, preparation failure) are
    /// returned synchronously and `on_row` is never invoked. On success
    /// this returns immediately; rows are delivered as the scheduler
    /// ticks, after any statement already holding the connection
    /// completes.
    ///
    /// `on_row` runs synchronously on the scheduler thread. It may issue
    /// new statements, but must not wait on this same connection: the
    /// connection is held until the current statement completes.
    pub fn emit<F>(&self, sql: &str, on_row: F) -> Result<()>
    where
        F: FnMut(Row) + Send + 'static,
    {
        let (stmt, scheduler) = self.prepare_checked(sql)?;
        let sink: RowSink = Box::new(on_row);
        scheduler.register(Stepper::new(self.clone(), stmt, Some(sink), None));
        Ok(())
    }

    /// Execute `sql`, materializing every result row behind a future.
    ///
    /// Setup errors produce an already-rejected future; nothing reaches
    /// the scheduler in that case.
    pub fn resolve(&self, sql: &str) -> QueryFuture {
        let (stmt, scheduler) = match self.prepare_checked(sql) {
            Ok(prepared) => prepared,
            Err(error) => return QueryFuture::rejected(error),
        };

        let future = QueryFuture::pending();
        let rows: Arc<Mutex<Vec<Row>>> = Arc::new(Mutex::new(Vec::new()));

        let sink_rows = Arc::clone(&rows);
        let sink: RowSink = Box::new(move |row| sink_rows.lock().push(row));

        let done_future = future.clone();
        let on_done: DoneHook = Box::new(move || {
            let rows = std::mem::take(&mut *rows.lock());
            done_future.resolve(rows);
        });

        scheduler.register(Stepper::new(self.clone(), stmt, Some(sink), Some(on_done)));
        future
    }

    /// Execute `sql` and block until every row is materialized.
    ///
    /// Convenience over [`Connection::resolve`]: drives the scheduler
    /// tick-by-tick until the future settles, then unwraps it.
    pub fn wait(&self, sql: &str) -> Result<Vec<Row>> {
        let future = self.resolve(sql);
        loop {
            if let Some(result) = future.result() {
                return result;
            }
            let Some(scheduler) = self.inner.scheduler.as_ref() else {
                return Err(SqlError::Internal(
                    "query pending without a scheduler".to_string(),
                ));
            };
            if scheduler.tick() == 0 {
                return Err(SqlError::Internal(
                    "scheduler went idle before the query settled".to_string(),
                ));
            }
        }
    }

    /// Shared setup for both delivery modes: validate, then prepare.
    /// Every error kind is synchronous; the native engine is not touched
    /// unless validation passes.
    fn prepare_checked(&self, sql: &str) -> Result<(Box<dyn EngineStatement>, Arc<Scheduler>)> {
        if sql.trim().is_empty() {
            return Err(SqlError::Closed("empty SQL text".to_string()));
        }
        if self.is_closed() {
            return Err(SqlError::Closed("connection is closed".to_string()));
        }
        let scheduler = self
            .inner
            .scheduler
            .clone()
            .ok_or_else(|| SqlError::Closed("connection has no scheduler".to_string()))?;

        let mut native = self.inner.native.lock();
        let conn = native
            .as_mut()
            .ok_or_else(|| SqlError::Closed("native connection already released".to_string()))?;
        let stmt = conn.prepare(sql)?;
        Ok((stmt, scheduler))
    }
}

impl Default for Connection {
    /// A null-object placeholder: CLOSED, no native connection, never
    /// executable.
    fn default() -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                native: Mutex::new(None),
                state: Mutex::new(HandleState {
                    open: false,
                    used: false,
                    closed: true,
                }),
                scheduler: None,
            }),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Connection")
            .field("open", &state.open)
            .field("used", &state.used)
            .field("closed", &state.closed)
            .finish()
    }
}
