//! Brackets and rounds group matches for display. They play no part in
//! propagation.

use diesel::{
    SqliteConnection, connection::LoadConnection, prelude::*, sqlite::Sqlite,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::EngineError,
    schema::{bracket_rounds, brackets},
    validation::is_valid_name,
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
#[diesel(table_name = brackets)]
#[diesel(check_for_backend(Sqlite))]
pub struct Bracket {
    pub id: String,
    pub name: String,
    /// Lower values are shown first.
    pub priority: i64,
}

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
#[diesel(table_name = bracket_rounds)]
#[diesel(check_for_backend(Sqlite))]
pub struct BracketRound {
    pub id: String,
    pub bracket_id: String,
    pub name: String,
    pub seq: i64,
}

impl Bracket {
    pub fn fetch(
        bracket_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Bracket, EngineError> {
        brackets::table
            .filter(brackets::id.eq(bracket_id))
            .select(Bracket::as_select())
            .first::<Bracket>(conn)
            .optional()?
            .ok_or_else(|| EngineError::not_found("bracket", bracket_id))
    }

    pub fn list(
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Vec<Bracket>, EngineError> {
        Ok(brackets::table
            .order_by((brackets::priority.asc(), brackets::name.asc()))
            .select(Bracket::as_select())
            .load::<Bracket>(conn)?)
    }

    pub fn rounds(
        &self,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Vec<BracketRound>, EngineError> {
        Ok(bracket_rounds::table
            .filter(bracket_rounds::bracket_id.eq(&self.id))
            .order_by((bracket_rounds::seq.asc(), bracket_rounds::name.asc()))
            .select(BracketRound::as_select())
            .load::<BracketRound>(conn)?)
    }
}

impl BracketRound {
    pub fn fetch(
        round_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<BracketRound, EngineError> {
        bracket_rounds::table
            .filter(bracket_rounds::id.eq(round_id))
            .select(BracketRound::as_select())
            .first::<BracketRound>(conn)
            .optional()?
            .ok_or_else(|| EngineError::not_found("round", round_id))
    }

    pub fn by_name(
        name: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Vec<BracketRound>, EngineError> {
        Ok(bracket_rounds::table
            .filter(bracket_rounds::name.eq(name))
            .select(BracketRound::as_select())
            .load::<BracketRound>(conn)?)
    }
}

#[tracing::instrument(skip(conn))]
pub fn create_bracket(
    name: &str,
    priority: i64,
    conn: &mut SqliteConnection,
) -> Result<Bracket, EngineError> {
    is_valid_name("name", name)?;
    let bracket = Bracket {
        id: Uuid::now_v7().to_string(),
        name: name.trim().to_string(),
        priority,
    };
    diesel::insert_into(brackets::table)
        .values(&bracket)
        .execute(conn)?;
    Ok(bracket)
}

/// Round names are unique within their bracket.
#[tracing::instrument(skip(conn))]
pub fn create_round(
    bracket_id: &str,
    name: &str,
    seq: i64,
    conn: &mut SqliteConnection,
) -> Result<BracketRound, EngineError> {
    is_valid_name("name", name)?;
    conn.immediate_transaction(|conn| {
        Bracket::fetch(bracket_id, conn)?;
        let round = BracketRound {
            id: Uuid::now_v7().to_string(),
            bracket_id: bracket_id.to_string(),
            name: name.trim().to_string(),
            seq,
        };
        diesel::insert_into(bracket_rounds::table)
            .values(&round)
            .execute(conn)?;
        Ok(round)
    })
}
