//! Pushes the outcome of a match into every slot derived from it.
//!
//! Propagation is re-run from scratch each time a match's result (or the
//! teams in its own slots) change: every dependent slot is overwritten with
//! whatever the current outcome says it should hold, which may be `None`.
//! Running it twice against the same state writes the same values. Filling a
//! slot never triggers further propagation; only result changes do.

use diesel::{SqliteConnection, prelude::*};
use itertools::Itertools;
use serde::Serialize;

use crate::{
    error::{EngineError, ValidationError},
    schema::matches,
    tournaments::matches::{Match, Outcome, Selector, Side, Slot},
};

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct SlotUpdate {
    pub match_id: String,
    pub match_number: i64,
    pub side: Side,
    pub selector: Selector,
    pub previous_team_id: Option<String>,
    pub team_id: Option<String>,
    pub changed: bool,
    /// The dependent already has a recorded result, which may now refer to
    /// different teams.
    pub dependent_complete: bool,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct PropagationReport {
    pub match_id: String,
    pub match_number: i64,
    pub outcome: Outcome,
    pub winner_team_id: Option<String>,
    pub loser_team_id: Option<String>,
    pub updates: Vec<SlotUpdate>,
}

impl PropagationReport {
    pub fn changed(&self) -> impl Iterator<Item = &SlotUpdate> {
        self.updates.iter().filter(|u| u.changed)
    }
}

/// Must run inside the transaction that wrote `source`'s result.
#[tracing::instrument(skip_all, fields(source = source.match_number))]
pub(crate) fn propagate_in_tx(
    conn: &mut SqliteConnection,
    source: &Match,
) -> Result<PropagationReport, EngineError> {
    let dependents = Match::dependents_of(&source.id, conn)?;

    for (selector, count) in dependents
        .iter()
        .flat_map(|d| d.sources())
        .filter(|(_, source_id, _)| *source_id == source.id)
        .map(|(_, _, selector)| selector)
        .counts()
    {
        if count > 1 {
            tracing::warn!(
                ?selector,
                count,
                "outcome feeds more than one slot; filling all of them"
            );
        }
    }

    let mut updates = Vec::new();
    for mut dependent in dependents {
        let (dependent_id, dependent_number, dependent_complete) = (
            dependent.id.clone(),
            dependent.match_number,
            dependent.is_complete,
        );
        let mut changed = false;
        for side in Side::BOTH {
            let Slot::Derived {
                source_id,
                selector,
                team_id,
            } = dependent.slot_mut(side)
            else {
                continue;
            };
            if *source_id != source.id {
                continue;
            }

            let next = source.team_for(*selector).map(str::to_owned);
            let previous = std::mem::replace(team_id, next.clone());
            let slot_changed = previous != next;
            changed |= slot_changed;

            tracing::trace!(
                dependent = dependent_number,
                ?side,
                ?previous,
                ?next,
                "derived slot"
            );

            updates.push(SlotUpdate {
                match_id: dependent_id.clone(),
                match_number: dependent_number,
                side,
                selector: *selector,
                previous_team_id: previous,
                team_id: next,
                changed: slot_changed,
                dependent_complete,
            });
        }

        if !changed {
            continue;
        }
        ensure_distinct_teams(&dependent)?;
        write_slot_teams(conn, &dependent)?;

        if dependent_complete {
            tracing::warn!(
                dependent = dependent_number,
                "overwrote a slot of a match that already has a result"
            );
        }
    }

    let report = PropagationReport {
        match_id: source.id.clone(),
        match_number: source.match_number,
        outcome: source.outcome(),
        winner_team_id: source.team_for(Selector::Winner).map(str::to_owned),
        loser_team_id: source.team_for(Selector::Loser).map(str::to_owned),
        updates,
    };

    tracing::info!(
        outcome = ?report.outcome,
        touched = report.updates.len(),
        changed = report.changed().count(),
        "propagated result"
    );

    Ok(report)
}

/// Fills the derived slots of `m` from sources that already have a result.
/// Used when a derived slot is created or re-pointed after its source has
/// been played.
pub(crate) fn pull_from_sources_in_tx(
    conn: &mut SqliteConnection,
    m: &mut Match,
) -> Result<(), EngineError> {
    let mut changed = false;
    for side in Side::BOTH {
        let Slot::Derived {
            source_id,
            selector,
            team_id,
        } = m.slot_mut(side)
        else {
            continue;
        };
        let source = Match::fetch(source_id, conn)?;
        let next = source.team_for(*selector).map(str::to_owned);
        if *team_id != next {
            *team_id = next;
            changed = true;
        }
    }

    if changed {
        ensure_distinct_teams(m)?;
        write_slot_teams(conn, m)?;
    }
    Ok(())
}

fn ensure_distinct_teams(m: &Match) -> Result<(), ValidationError> {
    match (m.home.team_id(), m.away.team_id()) {
        (Some(home), Some(away)) if home == away => {
            Err(ValidationError::SameTeam)
        }
        _ => Ok(()),
    }
}

fn write_slot_teams(
    conn: &mut SqliteConnection,
    m: &Match,
) -> Result<(), EngineError> {
    diesel::update(matches::table.filter(matches::id.eq(&m.id)))
        .set((
            matches::home_team_id.eq(m.home.team_id()),
            matches::away_team_id.eq(m.away.team_id()),
        ))
        .execute(conn)?;
    Ok(())
}
