use diesel::{
    SqliteConnection, connection::LoadConnection, prelude::*, sqlite::Sqlite,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::EngineError,
    schema::{regions, teams},
    tournaments::regions::Region,
    validation::is_valid_name,
};

#[derive(
    Queryable,
    Selectable,
    Insertable,
    Serialize,
    Deserialize,
    Clone,
    Debug,
    PartialEq,
    Eq,
)]
#[diesel(table_name = teams)]
#[diesel(check_for_backend(Sqlite))]
pub struct Team {
    pub id: String,
    pub name: String,
    pub region_id: String,
    /// Short display marker, e.g. an emoji or abbreviation.
    pub marker: Option<String>,
    pub rank: Option<i64>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct NewTeam {
    pub name: String,
    pub region_id: String,
    #[serde(default)]
    pub marker: Option<String>,
    #[serde(default)]
    pub rank: Option<i64>,
}

impl Team {
    #[tracing::instrument(skip(conn))]
    pub fn fetch(
        team_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Team, EngineError> {
        let ret = teams::table
            .filter(teams::id.eq(team_id))
            .select(Team::as_select())
            .first::<Team>(conn)
            .optional()?
            .ok_or_else(|| EngineError::not_found("team", team_id));

        tracing::trace!("ok? {}", ret.is_ok());

        ret
    }

    pub fn by_name(
        name: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Team, EngineError> {
        teams::table
            .filter(teams::name.eq(name))
            .select(Team::as_select())
            .first::<Team>(conn)
            .optional()?
            .ok_or_else(|| EngineError::not_found("team", name))
    }

    /// Ordered by region, then rank (unranked last), then name.
    pub fn list(
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Vec<Team>, EngineError> {
        Ok(teams::table
            .inner_join(regions::table)
            .order_by((
                regions::name.asc(),
                teams::rank.is_null(),
                teams::rank.asc(),
                teams::name.asc(),
            ))
            .select(Team::as_select())
            .load::<Team>(conn)?)
    }
}

#[tracing::instrument(skip(conn))]
pub fn create_team(
    new: &NewTeam,
    conn: &mut SqliteConnection,
) -> Result<Team, EngineError> {
    is_valid_name("name", &new.name)?;
    conn.immediate_transaction(|conn| {
        Region::fetch(&new.region_id, conn)?;
        let team = Team {
            id: Uuid::now_v7().to_string(),
            name: new.name.trim().to_string(),
            region_id: new.region_id.clone(),
            marker: new.marker.clone().filter(|m| !m.trim().is_empty()),
            rank: new.rank,
        };
        diesel::insert_into(teams::table)
            .values(&team)
            .execute(conn)?;
        Ok(team)
    })
}

/// Slots holding the team fall back: a fixed slot becomes empty and a derived
/// slot becomes pending again.
#[tracing::instrument(skip(conn))]
pub fn delete_team(
    team_id: &str,
    conn: &mut SqliteConnection,
) -> Result<(), EngineError> {
    let deleted = diesel::delete(teams::table.filter(teams::id.eq(team_id)))
        .execute(conn)?;
    match deleted {
        0 => Err(EngineError::not_found("team", team_id)),
        _ => Ok(()),
    }
}
