//! Matches and the slot model.
//!
//! A match has two slots (home and away). Each slot is either a fixed team, a
//! team derived from the outcome of an earlier match, or empty. The store keeps
//! a slot as three nullable columns (`*_team_id`, `*_source_id`,
//! `*_take_winner`); everything outside this module works with [`Slot`].

use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use serde::{Deserialize, Serialize};

use crate::{error::EngineError, schema::matches};

pub mod graph;
pub mod manage;
pub mod propagate;
pub mod slots;
pub mod validate;
pub mod view;

#[derive(
    Serialize,
    Deserialize,
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Home, Side::Away];

    pub fn other(self) -> Side {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home,
        }
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "home" => Ok(Side::Home),
            "away" => Ok(Side::Away),
            other => Err(format!("`{other}` is not a side (home or away)")),
        }
    }
}

/// Which team of the source match feeds a derived slot.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    Winner,
    Loser,
}

impl Selector {
    pub fn from_take_winner(take_winner: bool) -> Self {
        if take_winner {
            Selector::Winner
        } else {
            Selector::Loser
        }
    }

    pub fn take_winner(self) -> bool {
        matches!(self, Selector::Winner)
    }

    pub fn prefix(self) -> char {
        match self {
            Selector::Winner => 'W',
            Selector::Loser => 'L',
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Slot {
    #[default]
    Empty,
    Direct { team_id: String },
    /// `team_id` is filled in by propagation once the source is decided.
    Derived {
        source_id: String,
        selector: Selector,
        team_id: Option<String>,
    },
}

impl Slot {
    pub fn team_id(&self) -> Option<&str> {
        match self {
            Slot::Empty => None,
            Slot::Direct { team_id } => Some(team_id),
            Slot::Derived { team_id, .. } => team_id.as_deref(),
        }
    }

    pub fn source(&self) -> Option<(&str, Selector)> {
        match self {
            Slot::Derived {
                source_id,
                selector,
                ..
            } => Some((source_id, *selector)),
            _ => None,
        }
    }

    fn from_columns(
        team_id: Option<String>,
        source_id: Option<String>,
        take_winner: Option<bool>,
    ) -> Slot {
        match (source_id, take_winner, team_id) {
            (Some(source_id), Some(take_winner), team_id) => Slot::Derived {
                source_id,
                selector: Selector::from_take_winner(take_winner),
                team_id,
            },
            (None, None, Some(team_id)) => Slot::Direct { team_id },
            // A selector left behind by `ON DELETE SET NULL` on the source (or
            // a source without a selector, which the validator never writes)
            // is treated as an unassigned slot.
            _ => Slot::Empty,
        }
    }

    fn columns(&self) -> (Option<String>, Option<String>, Option<bool>) {
        match self {
            Slot::Empty => (None, None, None),
            Slot::Direct { team_id } => (Some(team_id.clone()), None, None),
            Slot::Derived {
                source_id,
                selector,
                team_id,
            } => (
                team_id.clone(),
                Some(source_id.clone()),
                Some(selector.take_winner()),
            ),
        }
    }
}

/// A slot as submitted by a caller, before validation. Mirrors the three
/// stored columns so that malformed combinations can be reported.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct SlotDraft {
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub source_match_id: Option<String>,
    #[serde(default)]
    pub take_winner: Option<bool>,
}

impl SlotDraft {
    pub fn team(team_id: impl Into<String>) -> Self {
        SlotDraft {
            team_id: Some(team_id.into()),
            ..Default::default()
        }
    }

    pub fn winner_of(source_match_id: impl Into<String>) -> Self {
        SlotDraft {
            source_match_id: Some(source_match_id.into()),
            take_winner: Some(true),
            ..Default::default()
        }
    }

    pub fn loser_of(source_match_id: impl Into<String>) -> Self {
        SlotDraft {
            source_match_id: Some(source_match_id.into()),
            take_winner: Some(false),
            ..Default::default()
        }
    }

    /// Only meaningful once the draft has passed validation.
    pub(crate) fn to_slot(&self) -> Slot {
        match (&self.team_id, &self.source_match_id, self.take_winner) {
            (_, Some(source_id), Some(take_winner)) => Slot::Derived {
                source_id: source_id.clone(),
                selector: Selector::from_take_winner(take_winner),
                team_id: None,
            },
            (Some(team_id), None, None) => Slot::Direct {
                team_id: team_id.clone(),
            },
            _ => Slot::Empty,
        }
    }
}

impl From<&Slot> for SlotDraft {
    fn from(slot: &Slot) -> Self {
        match slot {
            Slot::Empty => SlotDraft::default(),
            Slot::Direct { team_id } => SlotDraft::team(team_id.clone()),
            Slot::Derived {
                source_id,
                selector,
                ..
            } => SlotDraft {
                team_id: None,
                source_match_id: Some(source_id.clone()),
                take_winner: Some(selector.take_winner()),
            },
        }
    }
}

/// The structural fields of a match, used for both create and update.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchDraft {
    pub match_number: i64,
    #[serde(default)]
    pub round_id: Option<String>,
    #[serde(default)]
    pub timeslot_id: Option<String>,
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub home: SlotDraft,
    #[serde(default)]
    pub away: SlotDraft,
}

impl MatchDraft {
    pub fn slot(&self, side: Side) -> &SlotDraft {
        match side {
            Side::Home => &self.home,
            Side::Away => &self.away,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchResult {
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    pub is_complete: bool,
}

impl MatchResult {
    pub fn complete(home_score: i64, away_score: i64) -> Self {
        MatchResult {
            home_score: Some(home_score),
            away_score: Some(away_score),
            is_complete: true,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// Not yet complete.
    Pending,
    /// Complete with equal scores; nothing propagates.
    Tie,
    Decided { winner: Side },
}

#[derive(
    Queryable, Selectable, Insertable, AsChangeset, Clone, Debug, PartialEq,
)]
#[diesel(table_name = matches)]
#[diesel(check_for_backend(Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct MatchRow {
    pub id: String,
    pub match_number: i64,
    pub round_id: Option<String>,
    pub timeslot_id: Option<String>,
    pub room_id: Option<String>,
    pub home_team_id: Option<String>,
    pub home_source_id: Option<String>,
    pub home_take_winner: Option<bool>,
    pub away_team_id: Option<String>,
    pub away_source_id: Option<String>,
    pub away_take_winner: Option<bool>,
    pub is_complete: bool,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Match {
    pub id: String,
    pub match_number: i64,
    pub round_id: Option<String>,
    pub timeslot_id: Option<String>,
    pub room_id: Option<String>,
    pub home: Slot,
    pub away: Slot,
    pub is_complete: bool,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
}

impl From<MatchRow> for Match {
    fn from(row: MatchRow) -> Self {
        Match {
            home: Slot::from_columns(
                row.home_team_id,
                row.home_source_id,
                row.home_take_winner,
            ),
            away: Slot::from_columns(
                row.away_team_id,
                row.away_source_id,
                row.away_take_winner,
            ),
            id: row.id,
            match_number: row.match_number,
            round_id: row.round_id,
            timeslot_id: row.timeslot_id,
            room_id: row.room_id,
            is_complete: row.is_complete,
            home_score: row.home_score,
            away_score: row.away_score,
        }
    }
}

impl From<&Match> for MatchRow {
    fn from(m: &Match) -> Self {
        let (home_team_id, home_source_id, home_take_winner) = m.home.columns();
        let (away_team_id, away_source_id, away_take_winner) = m.away.columns();
        MatchRow {
            id: m.id.clone(),
            match_number: m.match_number,
            round_id: m.round_id.clone(),
            timeslot_id: m.timeslot_id.clone(),
            room_id: m.room_id.clone(),
            home_team_id,
            home_source_id,
            home_take_winner,
            away_team_id,
            away_source_id,
            away_take_winner,
            is_complete: m.is_complete,
            home_score: m.home_score,
            away_score: m.away_score,
        }
    }
}

impl Match {
    pub fn slot(&self, side: Side) -> &Slot {
        match side {
            Side::Home => &self.home,
            Side::Away => &self.away,
        }
    }

    pub fn slot_mut(&mut self, side: Side) -> &mut Slot {
        match side {
            Side::Home => &mut self.home,
            Side::Away => &mut self.away,
        }
    }

    pub fn result(&self) -> MatchResult {
        MatchResult {
            home_score: self.home_score,
            away_score: self.away_score,
            is_complete: self.is_complete,
        }
    }

    /// Strictly higher score wins; equal scores decide nothing.
    pub fn outcome(&self) -> Outcome {
        match (self.is_complete, self.home_score, self.away_score) {
            (true, Some(home), Some(away)) if home > away => Outcome::Decided {
                winner: Side::Home,
            },
            (true, Some(home), Some(away)) if home < away => Outcome::Decided {
                winner: Side::Away,
            },
            (true, Some(_), Some(_)) => Outcome::Tie,
            _ => Outcome::Pending,
        }
    }

    /// The team that a slot deriving `selector` from this match receives.
    pub fn team_for(&self, selector: Selector) -> Option<&str> {
        match self.outcome() {
            Outcome::Decided { winner } => match selector {
                Selector::Winner => self.slot(winner).team_id(),
                Selector::Loser => self.slot(winner.other()).team_id(),
            },
            Outcome::Pending | Outcome::Tie => None,
        }
    }

    /// The derived slots of this match, home first.
    pub fn sources(&self) -> impl Iterator<Item = (Side, &str, Selector)> {
        Side::BOTH.into_iter().filter_map(move |side| {
            self.slot(side)
                .source()
                .map(|(source_id, selector)| (side, source_id, selector))
        })
    }

    pub fn has_team(&self, team_id: &str) -> bool {
        Side::BOTH
            .iter()
            .any(|side| self.slot(*side).team_id() == Some(team_id))
    }

    #[tracing::instrument(skip(conn))]
    pub fn fetch(
        match_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Match, EngineError> {
        matches::table
            .filter(matches::id.eq(match_id))
            .select(MatchRow::as_select())
            .first::<MatchRow>(conn)
            .optional()?
            .map(Match::from)
            .ok_or_else(|| EngineError::not_found("match", match_id))
    }

    pub fn load_all(
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Vec<Match>, EngineError> {
        Ok(matches::table
            .order_by(matches::match_number.asc())
            .select(MatchRow::as_select())
            .load::<MatchRow>(conn)?
            .into_iter()
            .map(Match::from)
            .collect())
    }

    /// Matches with a slot deriving from `source_id`, by match number.
    pub fn dependents_of(
        source_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Vec<Match>, EngineError> {
        Ok(matches::table
            .filter(
                matches::home_source_id
                    .eq(source_id)
                    .or(matches::away_source_id.eq(source_id)),
            )
            .order_by(matches::match_number.asc())
            .select(MatchRow::as_select())
            .load::<MatchRow>(conn)?
            .into_iter()
            .map(Match::from)
            .collect())
    }
}
