use axum::{Extension, Json, extract::Path};
use serde::Serialize;

use crate::{
    api::with_conn,
    state::DbPool,
    tournaments::matches::{
        Match, MatchDraft, MatchResult, Side, manage,
        propagate::PropagationReport,
        slots::{self, ResolvedSlot},
        validate::FanOutPolicy,
        view::{self, MatchView},
    },
    util_resp::{StandardResponse, bad_request, created, success},
};

pub async fn create_match(
    Extension(pool): Extension<DbPool>,
    Extension(policy): Extension<FanOutPolicy>,
    Json(draft): Json<MatchDraft>,
) -> StandardResponse<Match> {
    created(
        with_conn(pool, move |conn| manage::create_match(&draft, policy, conn))
            .await?,
    )
}

pub async fn list_matches(
    Extension(pool): Extension<DbPool>,
) -> StandardResponse<Vec<MatchView>> {
    success(with_conn(pool, |conn| view::list_matches(conn)).await?)
}

pub async fn ready_matches(
    Extension(pool): Extension<DbPool>,
) -> StandardResponse<Vec<MatchView>> {
    success(with_conn(pool, |conn| view::ready_matches(conn)).await?)
}

pub async fn get_match(
    Path(match_id): Path<String>,
    Extension(pool): Extension<DbPool>,
) -> StandardResponse<MatchView> {
    success(
        with_conn(pool, move |conn| view::match_view(&match_id, conn)).await?,
    )
}

pub async fn update_match(
    Path(match_id): Path<String>,
    Extension(pool): Extension<DbPool>,
    Extension(policy): Extension<FanOutPolicy>,
    Json(draft): Json<MatchDraft>,
) -> StandardResponse<Match> {
    success(
        with_conn(pool, move |conn| {
            manage::update_match(&match_id, &draft, policy, conn)
        })
        .await?,
    )
}

#[derive(Serialize, Debug)]
pub struct Deleted {
    pub cleared_slots: usize,
}

pub async fn delete_match(
    Path(match_id): Path<String>,
    Extension(pool): Extension<DbPool>,
) -> StandardResponse<Deleted> {
    let cleared_slots =
        with_conn(pool, move |conn| manage::delete_match(&match_id, conn))
            .await?;
    success(Deleted { cleared_slots })
}

pub async fn set_result(
    Path(match_id): Path<String>,
    Extension(pool): Extension<DbPool>,
    Extension(policy): Extension<FanOutPolicy>,
    Json(result): Json<MatchResult>,
) -> StandardResponse<PropagationReport> {
    success(
        with_conn(pool, move |conn| {
            manage::set_result(&match_id, &result, policy, conn)
        })
        .await?,
    )
}

pub async fn clear_result(
    Path(match_id): Path<String>,
    Extension(pool): Extension<DbPool>,
    Extension(policy): Extension<FanOutPolicy>,
) -> StandardResponse<PropagationReport> {
    success(
        with_conn(pool, move |conn| {
            manage::clear_result(&match_id, policy, conn)
        })
        .await?,
    )
}

#[derive(Serialize, Debug)]
pub struct SlotBody {
    pub slot: ResolvedSlot,
    pub label: String,
    pub short_label: Option<String>,
}

pub async fn resolve_slot(
    Path((match_id, side)): Path<(String, String)>,
    Extension(pool): Extension<DbPool>,
) -> StandardResponse<SlotBody> {
    let side = side.parse::<Side>().map_err(bad_request)?;
    let slot =
        with_conn(pool, move |conn| slots::resolve_slot(&match_id, side, conn))
            .await?;
    success(SlotBody {
        label: slot.to_string(),
        short_label: slot.short_label(),
        slot,
    })
}
