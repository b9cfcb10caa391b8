use diesel::{
    SqliteConnection, connection::LoadConnection, prelude::*, sqlite::Sqlite,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::EngineError,
    schema::{regions, teams},
    tournaments::teams::Team,
    validation::{is_valid_color, is_valid_name},
};

#[derive(
    Queryable,
    Selectable,
    Insertable,
    Serialize,
    Deserialize,
    Debug,
    Clone,
    PartialEq,
    Eq,
)]
#[diesel(table_name = regions)]
#[diesel(check_for_backend(Sqlite))]
pub struct Region {
    pub id: String,
    pub name: String,
    pub color: String,
}

impl Region {
    pub fn fetch(
        region_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Region, EngineError> {
        regions::table
            .filter(regions::id.eq(region_id))
            .select(Region::as_select())
            .first::<Region>(conn)
            .optional()?
            .ok_or_else(|| EngineError::not_found("region", region_id))
    }

    pub fn list(
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Vec<Region>, EngineError> {
        Ok(regions::table
            .order_by(regions::name.asc())
            .select(Region::as_select())
            .load::<Region>(conn)?)
    }

    pub fn teams(
        &self,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Vec<Team>, EngineError> {
        Ok(teams::table
            .filter(teams::region_id.eq(&self.id))
            .order_by((
                teams::rank.is_null(),
                teams::rank.asc(),
                teams::name.asc(),
            ))
            .select(Team::as_select())
            .load::<Team>(conn)?)
    }
}

#[tracing::instrument(skip(conn))]
pub fn create_region(
    name: &str,
    color: &str,
    conn: &mut SqliteConnection,
) -> Result<Region, EngineError> {
    is_valid_name("name", name)?;
    is_valid_color(color)?;

    let region = Region {
        id: Uuid::now_v7().to_string(),
        name: name.trim().to_string(),
        color: color.to_string(),
    };
    diesel::insert_into(regions::table)
        .values(&region)
        .execute(conn)?;
    Ok(region)
}
