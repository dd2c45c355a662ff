#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # stepline
//!
//! Stepline drives an embedded SQL engine's statement execution through a
//! non-blocking interface inside a single-threaded cooperative runtime.
//! SQL goes in as text; rows come back either incrementally through a
//! callback or materialized behind a future, while the host thread is
//! never blocked: the engine advances one step per scheduler tick.
//!
//! ## Guarantees
//!
//! - **One statement per connection**: each handle executes at most one
//!   statement at a time; a second statement cooperatively waits its turn.
//! - **Exactly-once release**: native statements are finalized exactly
//!   once, and the native connection is closed exactly once, when its
//!   last shared owner drops.
//! - **Engine order**: rows of one statement are delivered in the
//!   engine's natural result order, with SQL NULL carried by a fixed
//!   sentinel value rather than a missing key.
//! - **Never block**: a busy engine or a contended connection yields back
//!   to the scheduler and retries on a later tick.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use stepline::{Connection, Scheduler};
//!
//! fn main() -> stepline::Result<()> {
//!     let scheduler = Arc::new(Scheduler::new());
//!     let conn = Connection::open(Arc::clone(&scheduler), "app.db")?;
//!
//!     // Blocking convenience: materialize every row.
//!     conn.wait("CREATE TABLE events(id, payload)")?;
//!     conn.wait("INSERT INTO events VALUES(1, 'hello')")?;
//!     let rows = conn.wait("SELECT * FROM events")?;
//!     assert_eq!(rows[0].get("payload"), Some("hello"));
//!
//!     // Streaming: rows arrive as the scheduler ticks.
//!     conn.emit("SELECT * FROM events", |row| {
//!         println!("id={:?}", row.get("id"));
//!     })?;
//!     scheduler.run_until_idle();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`connection`]: shared-owned connection handles and the execution
//!   facade (`emit` / `resolve` / `wait`)
//! - [`scheduler`]: the cooperative tick scheduler and the [`Resumable`]
//!   contract
//! - [`engine`]: the native engine boundary (SQLite behind a trait seam)
//! - [`row`]: the row model and the NULL sentinel
//! - [`future`]: pending/resolved/rejected result carriers
//! - [`error`]: error types and the `Result` alias

// Deny .unwrap() in production code to prevent panics on the scheduler
// thread. Test code is exempt.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]

pub mod connection;
pub mod engine;
pub mod error;
pub mod future;
pub mod row;
pub mod scheduler;

pub(crate) mod stepper;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::Connection;
pub use error::{Result, SqlError};
pub use future::QueryFuture;
pub use row::{Row, NULL_VALUE};
pub use scheduler::{Resumable, Scheduler, SchedulerConfig, SchedulerStats, Tick};
