use std::time::Duration;

use diesel::{
    SqliteConnection,
    connection::SimpleConnection,
    r2d2::{ConnectionManager, CustomizeConnection, Pool},
};

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

/// Applied to every connection handed out by the pool. SQLite leaves foreign
/// key enforcement off by default, and the `ON DELETE SET NULL` references
/// between matches depend on it.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionOptions {
    pub busy_timeout: Duration,
}

impl ConnectionOptions {
    pub fn apply(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<(), diesel::result::Error> {
        conn.batch_execute(&format!(
            "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {};",
            self.busy_timeout.as_millis()
        ))
    }
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error>
    for ConnectionOptions
{
    fn on_acquire(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<(), diesel::r2d2::Error> {
        self.apply(conn).map_err(diesel::r2d2::Error::QueryError)
    }
}

pub fn make_pool(
    db_url: &str,
    max_size: u32,
    options: ConnectionOptions,
) -> Result<DbPool, diesel::r2d2::PoolError> {
    Pool::builder()
        // every in-memory connection would otherwise be its own database
        .max_size(if db_url == ":memory:" { 1 } else { max_size })
        .connection_customizer(Box::new(options))
        .build(ConnectionManager::<SqliteConnection>::new(db_url))
}
