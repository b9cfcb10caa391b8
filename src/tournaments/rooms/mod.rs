use diesel::{
    SqliteConnection, connection::LoadConnection, prelude::*, sqlite::Sqlite,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::EngineError, schema::rooms, validation::is_valid_name,
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
#[diesel(table_name = rooms)]
#[diesel(check_for_backend(Sqlite))]
pub struct Room {
    pub id: String,
    pub name: String,
    /// Reference to a map image of the venue.
    pub map_url: Option<String>,
}

impl Room {
    pub fn fetch(
        room_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Room, EngineError> {
        rooms::table
            .filter(rooms::id.eq(room_id))
            .select(Room::as_select())
            .first::<Room>(conn)
            .optional()?
            .ok_or_else(|| EngineError::not_found("room", room_id))
    }

    pub fn by_name(
        name: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Room, EngineError> {
        rooms::table
            .filter(rooms::name.eq(name))
            .select(Room::as_select())
            .first::<Room>(conn)
            .optional()?
            .ok_or_else(|| EngineError::not_found("room", name))
    }

    pub fn list(
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Vec<Room>, EngineError> {
        Ok(rooms::table
            .order_by(rooms::name.asc())
            .select(Room::as_select())
            .load::<Room>(conn)?)
    }
}

#[tracing::instrument(skip(conn))]
pub fn create_room(
    name: &str,
    map_url: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Room, EngineError> {
    is_valid_name("name", name)?;
    let room = Room {
        id: Uuid::now_v7().to_string(),
        name: name.trim().to_string(),
        map_url: map_url.map(str::to_string),
    };
    diesel::insert_into(rooms::table)
        .values(&room)
        .execute(conn)?;
    Ok(room)
}

/// Matches scheduled in the room become unscheduled.
#[tracing::instrument(skip(conn))]
pub fn delete_room(
    room_id: &str,
    conn: &mut SqliteConnection,
) -> Result<(), EngineError> {
    match diesel::delete(rooms::table.filter(rooms::id.eq(room_id)))
        .execute(conn)?
    {
        0 => Err(EngineError::not_found("room", room_id)),
        _ => Ok(()),
    }
}
