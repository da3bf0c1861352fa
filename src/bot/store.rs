//! Persistent SQLite registry of chats that sent /start.

use rusqlite::{Connection, params};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Errors from the identity store.
#[derive(Debug)]
pub enum StoreError {
    /// Called before `connect()` or after `disconnect()`.
    Unavailable,
    Sqlite(rusqlite::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable => write!(f, "storage unavailable: not connected"),
            StoreError::Sqlite(e) => write!(f, "sqlite error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Unavailable => None,
            StoreError::Sqlite(e) => Some(e),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Sqlite(e)
    }
}

/// Where the database lives.
#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

/// Set of chat identities backed by one SQLite connection.
///
/// The connection only exists between `connect()` and `disconnect()`;
/// everything else fails with [`StoreError::Unavailable`] outside that window.
pub struct IdentityStore {
    location: Location,
    conn: Mutex<Option<Connection>>,
}

impl IdentityStore {
    /// Create a closed store bound to a database file.
    pub fn new(path: PathBuf) -> Self {
        Self { location: Location::File(path), conn: Mutex::new(None) }
    }

    /// Create a closed store that will open an in-memory database.
    pub fn in_memory() -> Self {
        Self { location: Location::Memory, conn: Mutex::new(None) }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Open the connection. Reconnecting an open store is a no-op.
    pub fn connect(&self) -> Result<(), StoreError> {
        let mut guard = self.lock();
        if guard.is_some() {
            return Ok(());
        }
        let conn = match &self.location {
            Location::File(path) => {
                info!("Opening identity store at {:?}", path);
                Connection::open(path)?
            }
            Location::Memory => Connection::open_in_memory()?,
        };
        *guard = Some(conn);
        Ok(())
    }

    /// Close the connection. Safe to call more than once.
    pub fn disconnect(&self) -> Result<(), StoreError> {
        let Some(conn) = self.lock().take() else {
            return Ok(());
        };
        conn.close().map_err(|(_, e)| StoreError::Sqlite(e))?;
        info!("Identity store closed");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.lock().is_some()
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let guard = self.lock();
        let conn = guard.as_ref().ok_or(StoreError::Unavailable)?;
        Ok(f(conn)?)
    }

    /// Create the users table if it does not exist yet.
    pub fn create_table(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY,
                    user_id INTEGER NOT NULL UNIQUE
                );
            "#,
            )
        })
    }

    /// Register a chat. Returns `true` when the chat was not known before.
    pub fn add_identity(&self, chat_id: i64) -> Result<bool, StoreError> {
        let inserted = self.with_conn(|conn| {
            conn.execute("INSERT OR IGNORE INTO users (user_id) VALUES (?1)", params![chat_id])
        })?;
        if inserted > 0 {
            info!("📥 Registered chat {}", chat_id);
        } else {
            debug!("Chat {} already registered", chat_id);
        }
        Ok(inserted > 0)
    }

    /// Every registered chat, in no particular order.
    pub fn list_identities(&self) -> Result<Vec<i64>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT user_id FROM users")?;
            let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
            rows.collect()
        })
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get::<_, i64>(0))
        })
        .map(|n| n as usize)
    }
}
