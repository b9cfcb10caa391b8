use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use diesel::{
    SqliteConnection, connection::LoadConnection, prelude::*, sqlite::Sqlite,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{EngineError, ValidationError},
    schema::timeslots,
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
#[diesel(table_name = timeslots)]
#[diesel(check_for_backend(Sqlite))]
pub struct Timeslot {
    pub id: String,
    pub start_time: NaiveDateTime,
}

impl Timeslot {
    pub fn fetch(
        timeslot_id: &str,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Timeslot, EngineError> {
        timeslots::table
            .filter(timeslots::id.eq(timeslot_id))
            .select(Timeslot::as_select())
            .first::<Timeslot>(conn)
            .optional()?
            .ok_or_else(|| EngineError::not_found("timeslot", timeslot_id))
    }

    pub fn at(
        start_time: NaiveDateTime,
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Option<Timeslot>, EngineError> {
        Ok(timeslots::table
            .filter(timeslots::start_time.eq(start_time))
            .select(Timeslot::as_select())
            .first::<Timeslot>(conn)
            .optional()?)
    }

    /// Ascending by start time.
    pub fn list(
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Vec<Timeslot>, EngineError> {
        Ok(timeslots::table
            .order_by(timeslots::start_time.asc())
            .select(Timeslot::as_select())
            .load::<Timeslot>(conn)?)
    }
}

#[tracing::instrument(skip(conn))]
pub fn create_timeslot(
    start_time: NaiveDateTime,
    conn: &mut SqliteConnection,
) -> Result<Timeslot, EngineError> {
    let timeslot = Timeslot {
        id: Uuid::now_v7().to_string(),
        start_time,
    };
    diesel::insert_into(timeslots::table)
        .values(&timeslot)
        .execute(conn)?;
    Ok(timeslot)
}

/// Creates `count` timeslots `interval_minutes` apart, starting at
/// `date`/`time`. Start times that already exist are skipped, so running the
/// same generation twice creates nothing the second time. Returns only the
/// timeslots that were created.
#[tracing::instrument(skip(conn))]
pub fn generate_timeslots(
    date: NaiveDate,
    time: NaiveTime,
    interval_minutes: i64,
    count: u32,
    conn: &mut SqliteConnection,
) -> Result<Vec<Timeslot>, EngineError> {
    if interval_minutes <= 0 {
        return Err(ValidationError::invalid(
            "interval_minutes",
            "must be positive",
        )
        .into());
    }
    if count == 0 {
        return Ok(Vec::new());
    }

    let start = NaiveDateTime::new(date, time);
    let interval = TimeDelta::try_minutes(interval_minutes).ok_or_else(|| {
        ValidationError::invalid("interval_minutes", "interval is too long")
    })?;
    let nth = |i: u32| {
        i32::try_from(i)
            .ok()
            .and_then(|i| interval.checked_mul(i))
            .and_then(|offset| start.checked_add_signed(offset))
            .ok_or_else(|| {
                ValidationError::invalid(
                    "count",
                    "timeslots would run past the last representable date",
                )
            })
    };
    // start times only grow, so the last one bounds the rest
    nth(count - 1)?;

    conn.immediate_transaction(|conn| {
        let mut created = Vec::new();
        for i in 0..count {
            let start_time = nth(i)?;
            if Timeslot::at(start_time, conn)?.is_some() {
                tracing::debug!(%start_time, "timeslot exists, skipping");
                continue;
            }
            let timeslot = Timeslot {
                id: Uuid::now_v7().to_string(),
                start_time,
            };
            diesel::insert_into(timeslots::table)
                .values(&timeslot)
                .execute(conn)?;
            created.push(timeslot);
        }
        tracing::info!(created = created.len(), "generated timeslots");
        Ok(created)
    })
}

#[tracing::instrument(skip(conn))]
pub fn delete_timeslot(
    timeslot_id: &str,
    conn: &mut SqliteConnection,
) -> Result<(), EngineError> {
    match diesel::delete(timeslots::table.filter(timeslots::id.eq(timeslot_id)))
        .execute(conn)?
    {
        0 => Err(EngineError::not_found("timeslot", timeslot_id)),
        _ => Ok(()),
    }
}
