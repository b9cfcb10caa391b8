use axum::{Extension, Json, extract::Path};
use serde::Deserialize;

use crate::{
    api::with_conn,
    state::DbPool,
    tournaments::{
        matches::view::{MatchView, team_matches as matches_of_team},
        regions::{self, Region},
        teams::{self, NewTeam, Team},
    },
    util_resp::{StandardResponse, created, no_content, success},
};

#[derive(Deserialize, Debug)]
pub struct CreateRegionForm {
    name: String,
    color: String,
}

pub async fn create_region(
    Extension(pool): Extension<DbPool>,
    Json(form): Json<CreateRegionForm>,
) -> StandardResponse<Region> {
    created(
        with_conn(pool, move |conn| {
            regions::create_region(&form.name, &form.color, conn)
        })
        .await?,
    )
}

pub async fn list_regions(
    Extension(pool): Extension<DbPool>,
) -> StandardResponse<Vec<Region>> {
    success(with_conn(pool, |conn| Region::list(conn)).await?)
}

pub async fn region_teams(
    Path(region_id): Path<String>,
    Extension(pool): Extension<DbPool>,
) -> StandardResponse<Vec<Team>> {
    success(
        with_conn(pool, move |conn| {
            Region::fetch(&region_id, conn)?.teams(conn)
        })
        .await?,
    )
}

pub async fn create_team(
    Extension(pool): Extension<DbPool>,
    Json(form): Json<NewTeam>,
) -> StandardResponse<Team> {
    created(with_conn(pool, move |conn| teams::create_team(&form, conn)).await?)
}

pub async fn list_teams(
    Extension(pool): Extension<DbPool>,
) -> StandardResponse<Vec<Team>> {
    success(with_conn(pool, |conn| Team::list(conn)).await?)
}

pub async fn delete_team(
    Path(team_id): Path<String>,
    Extension(pool): Extension<DbPool>,
) -> StandardResponse<()> {
    with_conn(pool, move |conn| teams::delete_team(&team_id, conn)).await?;
    no_content()
}

pub async fn team_matches(
    Path(team_id): Path<String>,
    Extension(pool): Extension<DbPool>,
) -> StandardResponse<Vec<MatchView>> {
    success(with_conn(pool, move |conn| matches_of_team(&team_id, conn)).await?)
}
