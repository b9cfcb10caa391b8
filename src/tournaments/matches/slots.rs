//! Display resolution of match slots. Nothing in here writes to the store.

use std::fmt;

use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use serde::Serialize;

use crate::{
    error::EngineError,
    schema::matches,
    tournaments::matches::{Match, Selector, Side, Slot, graph::MatchGraph},
};

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolvedSlot {
    Team {
        team_id: String,
    },
    /// Awaiting the result of the identified source match.
    Pending {
        source_match_number: i64,
        selector: Selector,
    },
    Empty,
}

impl ResolvedSlot {
    /// Compact bracket label, e.g. `W7` or `L7`.
    pub fn short_label(&self) -> Option<String> {
        match self {
            ResolvedSlot::Pending {
                source_match_number,
                selector,
            } => Some(format!("{}{}", selector.prefix(), source_match_number)),
            _ => None,
        }
    }

    pub fn is_filled(&self) -> bool {
        matches!(self, ResolvedSlot::Team { .. })
    }
}

impl fmt::Display for ResolvedSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedSlot::Team { team_id } => f.write_str(team_id),
            ResolvedSlot::Pending {
                source_match_number,
                selector: Selector::Winner,
            } => write!(f, "winner of match {source_match_number}"),
            ResolvedSlot::Pending {
                source_match_number,
                selector: Selector::Loser,
            } => write!(f, "loser of match {source_match_number}"),
            ResolvedSlot::Empty => f.write_str("TBD"),
        }
    }
}

/// Resolves one slot given a way to look up match numbers. A derived slot
/// whose source cannot be found resolves to [`ResolvedSlot::Empty`].
pub fn resolve(
    m: &Match,
    side: Side,
    number_of: impl Fn(&str) -> Option<i64>,
) -> ResolvedSlot {
    match m.slot(side) {
        Slot::Empty => ResolvedSlot::Empty,
        Slot::Direct { team_id }
        | Slot::Derived {
            team_id: Some(team_id),
            ..
        } => ResolvedSlot::Team {
            team_id: team_id.clone(),
        },
        Slot::Derived {
            source_id,
            selector,
            team_id: None,
        } => match number_of(source_id) {
            Some(source_match_number) => ResolvedSlot::Pending {
                source_match_number,
                selector: *selector,
            },
            None => ResolvedSlot::Empty,
        },
    }
}

/// Number of slots (0, 1 or 2) holding a concrete team.
pub fn filled_slots(m: &Match) -> u8 {
    Side::BOTH
        .iter()
        .filter(|side| m.slot(**side).team_id().is_some())
        .count() as u8
}

pub fn is_ready(m: &Match) -> bool {
    filled_slots(m) == 2
}

impl MatchGraph {
    pub fn resolve(&self, m: &Match, side: Side) -> ResolvedSlot {
        resolve(m, side, |id| self.number_of(id))
    }
}

#[tracing::instrument(skip(conn))]
pub fn resolve_slot(
    match_id: &str,
    side: Side,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<ResolvedSlot, EngineError> {
    let m = Match::fetch(match_id, conn)?;

    let source_number = match m.slot(side) {
        Slot::Derived {
            source_id,
            team_id: None,
            ..
        } => matches::table
            .filter(matches::id.eq(source_id))
            .select(matches::match_number)
            .first::<i64>(conn)
            .optional()?,
        _ => None,
    };

    Ok(resolve(&m, side, |_| source_number))
}
