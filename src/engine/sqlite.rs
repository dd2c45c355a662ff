//! SQLite implementation of the engine boundary
//!
//! Wraps the raw C API re-exported by `rusqlite` as `rusqlite::ffi`. The
//! safe `rusqlite` surface folds `SQLITE_BUSY` into its error type, but the
//! stepper needs busy as a first-class status it can yield on, so the
//! stepping seam talks to `sqlite3_step` directly.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::path::Path;
use std::ptr;

use rusqlite::ffi;
use tracing::debug;

use super::{EngineConnection, EngineStatement, StepOutcome};
use crate::error::{Result, SqlError};

/// An open `sqlite3*` handle.
pub struct SqliteConnection {
    db: *mut ffi::sqlite3,
}

// The raw handle is only ever used behind the connection handle's lock.
unsafe impl Send for SqliteConnection {}

impl SqliteConnection {
    /// Open a database file, creating it if necessary.
    ///
    /// On failure the engine's own error message is surfaced as
    /// [`SqlError::Open`] and no usable handle exists.
    pub fn open(path: &Path) -> Result<Self> {
        let c_path = CString::new(path.to_string_lossy().as_bytes())
            .map_err(|_| SqlError::Open("database path contains a NUL byte".to_string()))?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        let rc = unsafe { ffi::sqlite3_open(c_path.as_ptr(), &mut db) };
        if rc != ffi::SQLITE_OK {
            // SQLite allocates a handle even on failure so the message can
            // be read; it must still be closed.
            let message = if db.is_null() {
                "out of memory".to_string()
            } else {
                let message = unsafe { last_error(db) };
                unsafe { ffi::sqlite3_close(db) };
                message
            };
            return Err(SqlError::Open(message));
        }

        debug!(path = %path.display(), "opened sqlite database");
        Ok(Self { db })
    }
}

impl EngineConnection for SqliteConnection {
    fn prepare(&mut self, sql: &str) -> Result<Box<dyn EngineStatement>> {
        let c_sql = CString::new(sql)
            .map_err(|_| SqlError::Prepare("SQL text contains a NUL byte".to_string()))?;

        let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(self.db, c_sql.as_ptr(), -1, &mut stmt, ptr::null_mut())
        };
        if rc != ffi::SQLITE_OK {
            return Err(SqlError::Prepare(unsafe { last_error(self.db) }));
        }
        if stmt.is_null() {
            // Prepare reports success for input containing no statement,
            // such as a lone comment.
            return Err(SqlError::Internal(
                "statement preparation yielded no statement".to_string(),
            ));
        }

        Ok(Box::new(SqliteStatement { stmt }))
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        if !self.db.is_null() {
            unsafe { ffi::sqlite3_close(self.db) };
            self.db = ptr::null_mut();
            debug!("closed sqlite database");
        }
    }
}

/// A prepared `sqlite3_stmt*`.
pub struct SqliteStatement {
    stmt: *mut ffi::sqlite3_stmt,
}

// Statements are owned by exactly one stepper at a time.
unsafe impl Send for SqliteStatement {}

impl EngineStatement for SqliteStatement {
    fn step(&mut self) -> StepOutcome {
        match unsafe { ffi::sqlite3_step(self.stmt) } {
            ffi::SQLITE_BUSY => StepOutcome::Busy,
            ffi::SQLITE_ROW => StepOutcome::Row,
            ffi::SQLITE_DONE => StepOutcome::Done,
            code => StepOutcome::Other(code),
        }
    }

    fn column_count(&self) -> usize {
        unsafe { ffi::sqlite3_column_count(self.stmt) as usize }
    }

    fn column_name(&self, index: usize) -> String {
        let name = unsafe { ffi::sqlite3_column_name(self.stmt, index as c_int) };
        if name.is_null() {
            "?".to_string()
        } else {
            unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned()
        }
    }

    fn column_text(&self, index: usize) -> Option<String> {
        let text = unsafe { ffi::sqlite3_column_text(self.stmt, index as c_int) };
        if text.is_null() {
            return None;
        }
        // Length from the engine, not strlen: TEXT values may contain
        // embedded NUL bytes.
        let len = unsafe { ffi::sqlite3_column_bytes(self.stmt, index as c_int) } as usize;
        let bytes = unsafe { std::slice::from_raw_parts(text, len) };
        Some(String::from_utf8_lossy(bytes).into_owned())
    }

    fn finalize(&mut self) {
        if !self.stmt.is_null() {
            unsafe { ffi::sqlite3_finalize(self.stmt) };
            self.stmt = ptr::null_mut();
        }
    }
}

impl Drop for SqliteStatement {
    fn drop(&mut self) {
        self.finalize();
    }
}

unsafe fn last_error(db: *mut ffi::sqlite3) -> String {
    let msg: *const c_char = ffi::sqlite3_errmsg(db);
    if msg.is_null() {
        "unknown sqlite error".to_string()
    } else {
        CStr::from_ptr(msg).to_string_lossy().into_owned()
    }
}
