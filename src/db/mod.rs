mod from_row;
pub mod queries;
mod schema;

pub use schema::init_db;

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::PaymentSecret;
use crate::error::Result;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Public origin used to build shareable payment links
    pub base_url: String,
    pub payment_secret: PaymentSecret,
}

/// Open a connection pool and make sure the schema exists.
///
/// `":memory:"` gives a single-connection in-memory database (every SQLite
/// memory connection is its own database, so the pool cannot grow).
pub fn create_pool(path: &str) -> Result<DbPool> {
    let (manager, max_size) = if path == ":memory:" {
        (SqliteConnectionManager::memory(), 1)
    } else {
        (SqliteConnectionManager::file(path), 8)
    };
    let manager = manager.with_init(|conn| {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))
    });

    let pool = Pool::builder().max_size(max_size).build(manager)?;
    {
        let conn = pool.get()?;
        init_db(&conn)?;
    }
    Ok(pool)
}
