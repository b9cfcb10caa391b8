//! Allocation of matches to (timeslot, room) pairs. A pair holds at most one
//! match; the store enforces this with a unique index as well, so a lost race
//! between checking and assigning surfaces as [`EngineError::Conflict`].

use std::collections::HashSet;

use chrono::NaiveDateTime;
use diesel::{
    SqliteConnection, connection::LoadConnection, prelude::*, sqlite::Sqlite,
};
use itertools::iproduct;
use serde::Serialize;

use crate::{
    error::{EngineError, ValidationError},
    schema::matches,
    tournaments::{
        matches::Match, rooms::Room, timeslots::Timeslot,
    },
};

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AvailableSlot {
    pub timeslot_id: String,
    pub start_time: NaiveDateTime,
    pub room_id: String,
    pub room_name: String,
}

/// Every (timeslot, room) pair not used by a match, by start time and then
/// in the order `rooms` is given.
pub fn available_slots(
    timeslots: &[Timeslot],
    rooms: &[Room],
    matches: &[Match],
) -> Vec<AvailableSlot> {
    let taken = matches
        .iter()
        .filter_map(|m| {
            Some((m.timeslot_id.as_deref()?, m.room_id.as_deref()?))
        })
        .collect::<HashSet<_>>();

    let mut timeslots = timeslots.iter().collect::<Vec<_>>();
    timeslots.sort_by_key(|t| t.start_time);

    iproduct!(timeslots, rooms)
        .filter(|(t, r)| !taken.contains(&(t.id.as_str(), r.id.as_str())))
        .map(|(t, r)| AvailableSlot {
            timeslot_id: t.id.clone(),
            start_time: t.start_time,
            room_id: r.id.clone(),
            room_name: r.name.clone(),
        })
        .collect()
}

pub fn load_available_slots(
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<Vec<AvailableSlot>, EngineError> {
    let timeslots = Timeslot::list(conn)?;
    let rooms = Room::list(conn)?;
    let matches = Match::load_all(conn)?;
    Ok(available_slots(&timeslots, &rooms, &matches))
}

/// Fails with `SLOT_CONFLICT` if a match other than `match_id` already holds
/// the pair. A match with only one of the two set never conflicts.
pub(crate) fn ensure_pair_free(
    match_id: Option<&str>,
    timeslot_id: Option<&str>,
    room_id: Option<&str>,
    conn: &mut impl LoadConnection<Backend = Sqlite>,
) -> Result<(), EngineError> {
    let (Some(timeslot_id), Some(room_id)) = (timeslot_id, room_id) else {
        return Ok(());
    };

    let holder = matches::table
        .filter(matches::timeslot_id.eq(timeslot_id))
        .filter(matches::room_id.eq(room_id))
        .select(matches::id)
        .first::<String>(conn)
        .optional()?;

    match holder {
        Some(holder) if Some(holder.as_str()) != match_id => {
            tracing::debug!(%holder, "pair already assigned");
            Err(ValidationError::SlotConflict.into())
        }
        _ => Ok(()),
    }
}

#[tracing::instrument(skip(conn))]
pub fn assign(
    match_id: &str,
    timeslot_id: &str,
    room_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Match, EngineError> {
    conn.immediate_transaction(|conn| {
        let m = Match::fetch(match_id, conn)?;
        Timeslot::fetch(timeslot_id, conn)?;
        Room::fetch(room_id, conn)?;
        ensure_pair_free(
            Some(match_id),
            Some(timeslot_id),
            Some(room_id),
            conn,
        )?;

        diesel::update(matches::table.filter(matches::id.eq(match_id)))
            .set((
                matches::timeslot_id.eq(timeslot_id),
                matches::room_id.eq(room_id),
            ))
            .execute(conn)?;

        tracing::info!(number = m.match_number, "assigned match");
        Ok(Match {
            timeslot_id: Some(timeslot_id.to_string()),
            room_id: Some(room_id.to_string()),
            ..m
        })
    })
}

#[tracing::instrument(skip(conn))]
pub fn unassign(
    match_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Match, EngineError> {
    conn.immediate_transaction(|conn| {
        let m = Match::fetch(match_id, conn)?;
        diesel::update(matches::table.filter(matches::id.eq(match_id)))
            .set((
                matches::timeslot_id.eq(None::<String>),
                matches::room_id.eq(None::<String>),
            ))
            .execute(conn)?;
        Ok(Match {
            timeslot_id: None,
            room_id: None,
            ..m
        })
    })
}
