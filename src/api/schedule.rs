use axum::{Extension, Json, extract::Path};
use serde::Deserialize;

use crate::{
    api::with_conn,
    state::DbPool,
    tournaments::{
        matches::Match,
        schedule::{self, AvailableSlot},
    },
    util_resp::{StandardResponse, success},
};

#[derive(Deserialize, Debug)]
pub struct AssignForm {
    timeslot_id: String,
    room_id: String,
}

pub async fn assign(
    Path(match_id): Path<String>,
    Extension(pool): Extension<DbPool>,
    Json(form): Json<AssignForm>,
) -> StandardResponse<Match> {
    success(
        with_conn(pool, move |conn| {
            schedule::assign(&match_id, &form.timeslot_id, &form.room_id, conn)
        })
        .await?,
    )
}

pub async fn unassign(
    Path(match_id): Path<String>,
    Extension(pool): Extension<DbPool>,
) -> StandardResponse<Match> {
    success(
        with_conn(pool, move |conn| schedule::unassign(&match_id, conn))
            .await?,
    )
}

pub async fn available(
    Extension(pool): Extension<DbPool>,
) -> StandardResponse<Vec<AvailableSlot>> {
    success(with_conn(pool, |conn| schedule::load_available_slots(conn)).await?)
}
