//! Shared test fixtures.

use std::time::Duration;

use diesel::{Connection, SqliteConnection};
use diesel_migrations::MigrationHarness;

use crate::{
    MIGRATIONS,
    state::{ConnectionOptions, DbPool, make_pool},
    tournaments::{
        matches::{
            Match, MatchDraft, SlotDraft, manage::create_match,
            validate::FanOutPolicy,
        },
        regions::create_region,
        teams::{NewTeam, create_team},
    },
};


const OPTIONS: ConnectionOptions = ConnectionOptions {
    busy_timeout: Duration::from_millis(1000),
};

/// A fresh in-memory database with all migrations applied.
pub fn test_conn() -> SqliteConnection {
    let mut conn = SqliteConnection::establish(":memory:").unwrap();
    OPTIONS.apply(&mut conn).unwrap();
    conn.run_pending_migrations(MIGRATIONS).unwrap();
    conn
}

pub fn test_pool() -> DbPool {
    let pool = make_pool(":memory:", 1, OPTIONS).unwrap();
    pool.get().unwrap().run_pending_migrations(MIGRATIONS).unwrap();
    pool
}

pub struct Fixture {
    pub region_id: String,
}

impl Fixture {
    pub fn new(conn: &mut SqliteConnection) -> Fixture {
        let region = create_region("North", "navy", conn).unwrap();
        Fixture {
            region_id: region.id,
        }
    }

    /// Creates a team in the fixture's region and returns its id.
    pub fn team(&self, name: &str, conn: &mut SqliteConnection) -> String {
        create_team(
            &NewTeam {
                name: name.to_string(),
                region_id: self.region_id.clone(),
                ..Default::default()
            },
            conn,
        )
        .unwrap()
        .id
    }

    pub fn create(
        &self,
        number: i64,
        home: SlotDraft,
        away: SlotDraft,
        conn: &mut SqliteConnection,
    ) -> Match {
        create_match(
            &MatchDraft {
                match_number: number,
                home,
                away,
                ..Default::default()
            },
            FanOutPolicy::All,
            conn,
        )
        .unwrap()
    }
}
