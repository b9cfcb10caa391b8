//! JSON handlers. Diesel is blocking, so every handler moves its work onto
//! the blocking pool together with a pooled connection.

use diesel::SqliteConnection;
use tokio::task::spawn_blocking;

use crate::{error::EngineError, state::DbPool, util_resp::FailureResponse};

pub mod brackets;
pub mod matches;
pub mod participants;
pub mod schedule;
pub mod venues;

pub(crate) async fn with_conn<T, F>(
    pool: DbPool,
    f: F,
) -> Result<T, FailureResponse>
where
    T: Send + 'static,
    F: FnOnce(&mut SqliteConnection) -> Result<T, EngineError> + Send + 'static,
{
    spawn_blocking(move || -> Result<T, FailureResponse> {
        let mut conn = pool.get()?;
        Ok(f(&mut *conn)?)
    })
    .await?
}
