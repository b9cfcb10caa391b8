use axum::{Extension, Json, extract::Path};
use serde::Deserialize;

use crate::{
    api::with_conn,
    state::DbPool,
    tournaments::{
        brackets::{self, Bracket, BracketRound},
        matches::view::{BracketView, bracket_view},
    },
    util_resp::{StandardResponse, created, success},
};

#[derive(Deserialize, Debug)]
pub struct CreateBracketForm {
    name: String,
    #[serde(default)]
    priority: i64,
}

pub async fn create_bracket(
    Extension(pool): Extension<DbPool>,
    Json(form): Json<CreateBracketForm>,
) -> StandardResponse<Bracket> {
    created(
        with_conn(pool, move |conn| {
            brackets::create_bracket(&form.name, form.priority, conn)
        })
        .await?,
    )
}

pub async fn list_brackets(
    Extension(pool): Extension<DbPool>,
) -> StandardResponse<Vec<Bracket>> {
    success(with_conn(pool, |conn| Bracket::list(conn)).await?)
}

#[derive(Deserialize, Debug)]
pub struct CreateRoundForm {
    name: String,
    seq: i64,
}

pub async fn create_round(
    Path(bracket_id): Path<String>,
    Extension(pool): Extension<DbPool>,
    Json(form): Json<CreateRoundForm>,
) -> StandardResponse<BracketRound> {
    created(
        with_conn(pool, move |conn| {
            brackets::create_round(&bracket_id, &form.name, form.seq, conn)
        })
        .await?,
    )
}

pub async fn view_bracket(
    Path(bracket_id): Path<String>,
    Extension(pool): Extension<DbPool>,
) -> StandardResponse<BracketView> {
    success(with_conn(pool, move |conn| bracket_view(&bracket_id, conn)).await?)
}
