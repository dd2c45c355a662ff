//! Query futures
//!
//! A [`QueryFuture`] is a plain settled-or-pending value carrier for a
//! materialized query result. It is not a `std::future::Future`; the
//! cooperative scheduler has no waker machinery, so consumers poll
//! [`QueryFuture::result`] between ticks (or let [`Connection::wait`]
//! do it for them).
//!
//! [`Connection::wait`]: crate::connection::Connection::wait

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::SqlError;
use crate::row::Row;

#[derive(Debug)]
enum FutureState {
    Pending,
    Resolved(Vec<Row>),
    Rejected(SqlError),
}

/// Pending, resolved or rejected result of a future-mode query.
///
/// Clones share one settled state; the first settle wins and later
/// attempts are ignored.
#[derive(Debug, Clone)]
pub struct QueryFuture {
    state: Arc<Mutex<FutureState>>,
}

impl QueryFuture {
    /// A future awaiting resolution by a running stepper.
    pub(crate) fn pending() -> Self {
        Self {
            state: Arc::new(Mutex::new(FutureState::Pending)),
        }
    }

    /// A future rejected before any stepper was created (setup errors).
    pub(crate) fn rejected(error: SqlError) -> Self {
        Self {
            state: Arc::new(Mutex::new(FutureState::Rejected(error))),
        }
    }

    /// Fulfil the future with the accumulated rows. First settle wins.
    pub(crate) fn resolve(&self, rows: Vec<Row>) {
        let mut state = self.state.lock();
        if matches!(*state, FutureState::Pending) {
            *state = FutureState::Resolved(rows);
        }
    }

    /// Whether the future has been resolved or rejected.
    pub fn is_settled(&self) -> bool {
        !matches!(*self.state.lock(), FutureState::Pending)
    }

    /// The settled result, or `None` while still pending.
    pub fn result(&self) -> Option<Result<Vec<Row>, SqlError>> {
        match &*self.state.lock() {
            FutureState::Pending => None,
            FutureState::Resolved(rows) => Some(Ok(rows.clone())),
            FutureState::Rejected(error) => Some(Err(error.clone())),
        }
    }
}
