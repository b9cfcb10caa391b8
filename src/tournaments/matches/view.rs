use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use serde::Serialize;

use crate::{
    error::EngineError,
    schema::matches,
    tournaments::{
        brackets::{Bracket, BracketRound},
        matches::{
            Match, MatchRow, Side,
            graph::MatchGraph,
            slots::{ResolvedSlot, filled_slots},
        },
        rooms::Room,
        teams::Team,
    },
};

/// A match together with both of its slots resolved for display.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct MatchView {
    #[serde(flatten)]
    pub m: Match,
    pub home_resolved: ResolvedSlot,
    pub away_resolved: ResolvedSlot,
    pub filled: u8,
}

impl MatchView {
    fn new(m: Match, graph: &MatchGraph) -> Self {
        MatchView {
            home_resolved: graph.resolve(&m, Side::Home),
            away_resolved: graph.resolve(&m, Side::Away),
            filled: filled_slots(&m),
            m,
        }
    }

    pub fn is_ready(&self) -> bool {
        !self.m.is_complete && self.filled == 2
    }
}

fn views(
    graph: &MatchGraph,
    keep: impl Fn(&Match) -> bool,
) -> Vec<MatchView> {
    graph
        .iter()
        .filter(|m| keep(m))
        .map(|m| MatchView::new(m.clone(), graph))
        .collect()
}

pub fn match_view(
    match_id: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<MatchView, EngineError> {
    let graph = MatchGraph::load(conn)?;
    let m = graph
        .get(match_id)
        .cloned()
        .ok_or_else(|| EngineError::not_found("match", match_id))?;
    Ok(MatchView::new(m, &graph))
}

pub fn list_matches(
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<Vec<MatchView>, EngineError> {
    Ok(views(&MatchGraph::load(conn)?, |_| true))
}

/// Incomplete matches with both slots holding a team.
pub fn ready_matches(
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<Vec<MatchView>, EngineError> {
    Ok(views(&MatchGraph::load(conn)?, |m| {
        !m.is_complete && filled_slots(m) == 2
    }))
}

/// Every incomplete match, in the order a scorekeeper works through them.
pub fn scorekeeper_queue(
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<Vec<MatchView>, EngineError> {
    Ok(views(&MatchGraph::load(conn)?, |m| !m.is_complete))
}

/// Matches in which the team currently occupies a slot.
pub fn team_matches(
    team_id: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<Vec<MatchView>, EngineError> {
    Team::fetch(team_id, conn)?;
    Ok(views(&MatchGraph::load(conn)?, |m| m.has_team(team_id)))
}

pub fn room_matches(
    room_id: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<Vec<MatchView>, EngineError> {
    Room::fetch(room_id, conn)?;
    Ok(views(&MatchGraph::load(conn)?, |m| {
        m.room_id.as_deref() == Some(room_id)
    }))
}

#[derive(Serialize, Debug, Clone)]
pub struct RoundView {
    #[serde(flatten)]
    pub round: BracketRound,
    pub matches: Vec<MatchView>,
}

#[derive(Serialize, Debug, Clone)]
pub struct BracketView {
    #[serde(flatten)]
    pub bracket: Bracket,
    pub rounds: Vec<RoundView>,
}

/// Rounds by sequence number, each with its matches by match number.
#[tracing::instrument(skip(conn))]
pub fn bracket_view(
    bracket_id: &str,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<BracketView, EngineError> {
    let bracket = Bracket::fetch(bracket_id, conn)?;
    let rounds = bracket.rounds(conn)?;

    let round_ids = rounds.iter().map(|r| r.id.as_str()).collect::<Vec<_>>();
    let in_bracket = matches::table
        .filter(matches::round_id.eq_any(round_ids))
        .order_by(matches::match_number.asc())
        .select(MatchRow::as_select())
        .load::<MatchRow>(conn)?
        .into_iter()
        .map(Match::from)
        .collect::<Vec<_>>();

    // sources may live in other brackets, so resolve against every match
    let graph = MatchGraph::load(conn)?;
    let rounds = rounds
        .into_iter()
        .map(|round| RoundView {
            matches: in_bracket
                .iter()
                .filter(|m| m.round_id.as_deref() == Some(round.id.as_str()))
                .map(|m| MatchView::new(m.clone(), &graph))
                .collect(),
            round,
        })
        .collect();

    Ok(BracketView { bracket, rounds })
}
