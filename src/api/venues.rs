use axum::{Extension, Json, extract::Path};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;

use crate::{
    api::with_conn,
    state::DbPool,
    tournaments::{
        matches::view::{MatchView, room_matches as matches_in_room},
        rooms::{self, Room},
        timeslots::{self, Timeslot},
    },
    util_resp::{StandardResponse, created, success},
};

#[derive(Deserialize, Debug)]
pub struct CreateRoomForm {
    name: String,
    #[serde(default)]
    map_url: Option<String>,
}

pub async fn create_room(
    Extension(pool): Extension<DbPool>,
    Json(form): Json<CreateRoomForm>,
) -> StandardResponse<Room> {
    created(
        with_conn(pool, move |conn| {
            rooms::create_room(&form.name, form.map_url.as_deref(), conn)
        })
        .await?,
    )
}

pub async fn list_rooms(
    Extension(pool): Extension<DbPool>,
) -> StandardResponse<Vec<Room>> {
    success(with_conn(pool, |conn| Room::list(conn)).await?)
}

pub async fn room_matches(
    Path(room_id): Path<String>,
    Extension(pool): Extension<DbPool>,
) -> StandardResponse<Vec<MatchView>> {
    success(with_conn(pool, move |conn| matches_in_room(&room_id, conn)).await?)
}

#[derive(Deserialize, Debug)]
pub struct CreateTimeslotForm {
    start_time: NaiveDateTime,
}

pub async fn create_timeslot(
    Extension(pool): Extension<DbPool>,
    Json(form): Json<CreateTimeslotForm>,
) -> StandardResponse<Timeslot> {
    created(
        with_conn(pool, move |conn| {
            timeslots::create_timeslot(form.start_time, conn)
        })
        .await?,
    )
}

pub async fn list_timeslots(
    Extension(pool): Extension<DbPool>,
) -> StandardResponse<Vec<Timeslot>> {
    success(with_conn(pool, |conn| Timeslot::list(conn)).await?)
}

#[derive(Deserialize, Debug)]
pub struct GenerateTimeslotsForm {
    date: NaiveDate,
    time: NaiveTime,
    interval_minutes: i64,
    count: u32,
}

pub async fn generate_timeslots(
    Extension(pool): Extension<DbPool>,
    Json(form): Json<GenerateTimeslotsForm>,
) -> StandardResponse<Vec<Timeslot>> {
    created(
        with_conn(pool, move |conn| {
            timeslots::generate_timeslots(
                form.date,
                form.time,
                form.interval_minutes,
                form.count,
                conn,
            )
        })
        .await?,
    )
}
