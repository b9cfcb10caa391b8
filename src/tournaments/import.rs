//! Bulk creation of matches from CSV.
//!
//! Expected header:
//!
//! ```text
//! match_number,timeslot,room,round,
//!     home_team,home_source,home_take,away_team,away_source,away_take
//! ```
//!
//! Teams, rooms and rounds are referred to by name, timeslots by their start
//! (`2025-03-01 09:30`) and sources by match number. Every row goes through
//! the same path as a single match creation, inside one transaction.

use std::io::Read;

use chrono::NaiveDateTime;
use diesel::{SqliteConnection, prelude::*};
use serde::Deserialize;

use crate::{
    error::{EngineError, ValidationError},
    schema::matches,
    tournaments::{
        brackets::BracketRound,
        matches::{
            Match, MatchDraft, SlotDraft, manage::create_match_in_tx,
            validate::FanOutPolicy,
        },
        rooms::Room,
        teams::Team,
        timeslots::Timeslot,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("line {line}: {source}")]
    Row {
        line: u64,
        #[source]
        source: EngineError,
    },
    #[error("malformed csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

#[derive(Deserialize, Debug, Clone)]
struct ImportRow {
    match_number: i64,
    timeslot: Option<String>,
    room: Option<String>,
    round: Option<String>,
    home_team: Option<String>,
    home_source: Option<i64>,
    home_take: Option<String>,
    away_team: Option<String>,
    away_source: Option<i64>,
    away_take: Option<String>,
}

#[tracing::instrument(skip_all)]
pub fn import_matches(
    reader: impl Read,
    policy: FanOutPolicy,
    conn: &mut SqliteConnection,
) -> Result<Vec<Match>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let row: ImportRow = record.deserialize(Some(&headers))?;
        rows.push((line, row));
    }
    // sources must exist before the rows that derive from them
    rows.sort_by_key(|(_, row)| row.match_number);

    conn.immediate_transaction(|conn| {
        let mut created = Vec::with_capacity(rows.len());
        for (line, row) in &rows {
            let m = to_draft(row, conn)
                .and_then(|draft| create_match_in_tx(&draft, policy, conn))
                .map_err(|source| ImportError::Row {
                    line: *line,
                    source,
                })?;
            created.push(m);
        }
        tracing::info!(created = created.len(), "imported matches");
        Ok(created)
    })
}

fn to_draft(
    row: &ImportRow,
    conn: &mut SqliteConnection,
) -> Result<MatchDraft, EngineError> {
    let timeslot_id = match &row.timeslot {
        Some(start) => {
            let start_time =
                NaiveDateTime::parse_from_str(start, "%Y-%m-%d %H:%M")
                    .map_err(|e| {
                        ValidationError::invalid("timeslot", e.to_string())
                    })?;
            let timeslot =
                Timeslot::at(start_time, conn)?.ok_or_else(|| {
                    EngineError::not_found("timeslot", start.clone())
                })?;
            Some(timeslot.id)
        }
        None => None,
    };
    let room_id = match &row.room {
        Some(name) => Some(Room::by_name(name, conn)?.id),
        None => None,
    };
    let round_id = match &row.round {
        Some(name) => {
            let mut rounds = BracketRound::by_name(name, conn)?;
            match rounds.len() {
                0 => return Err(EngineError::not_found("round", name.clone())),
                1 => rounds.pop().map(|r| r.id),
                _ => {
                    return Err(ValidationError::invalid(
                        "round",
                        format!(
                            "`{name}` names a round in more than one bracket"
                        ),
                    )
                    .into());
                }
            }
        }
        None => None,
    };

    Ok(MatchDraft {
        match_number: row.match_number,
        round_id,
        timeslot_id,
        room_id,
        home: slot_draft(
            "home_take",
            row.home_team.as_deref(),
            row.home_source,
            row.home_take.as_deref(),
            conn,
        )?,
        away: slot_draft(
            "away_take",
            row.away_team.as_deref(),
            row.away_source,
            row.away_take.as_deref(),
            conn,
        )?,
    })
}

fn slot_draft(
    take_field: &'static str,
    team: Option<&str>,
    source_number: Option<i64>,
    take: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<SlotDraft, EngineError> {
    let team_id = match team {
        Some(name) => Some(Team::by_name(name, conn)?.id),
        None => None,
    };
    let source_match_id = match source_number {
        Some(number) => Some(
            matches::table
                .filter(matches::match_number.eq(number))
                .select(matches::id)
                .first::<String>(conn)
                .optional()?
                .ok_or_else(|| {
                    EngineError::not_found("match", number.to_string())
                })?,
        ),
        None => None,
    };
    let take_winner = match take.map(str::to_ascii_lowercase).as_deref() {
        None => None,
        Some("w" | "winner") => Some(true),
        Some("l" | "loser") => Some(false),
        Some(other) => {
            return Err(ValidationError::invalid(
                take_field,
                format!("`{other}` is neither W nor L"),
            )
            .into());
        }
    };

    Ok(SlotDraft {
        team_id,
        source_match_id,
        take_winner,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test::{Fixture, test_conn},
        tournaments::{
            matches::{Selector, Slot},
            rooms::create_room,
        },
    };

    fn import(
        csv: &str,
        conn: &mut SqliteConnection,
    ) -> Result<Vec<Match>, ImportError> {
        import_matches(csv.as_bytes(), FanOutPolicy::All, conn)
    }

    const HEADER: &str = "match_number,timeslot,room,round,\
                          home_team,home_source,home_take,\
                          away_team,away_source,away_take\n";

    #[test]
    fn imports_out_of_order_rows() {
        let mut conn = test_conn();
        let f = Fixture::new(&mut conn);
        f.team("Alpha", &mut conn);
        f.team("Bravo", &mut conn);
        create_room("Hall", None, &mut conn).unwrap();

        let csv = format!(
            "{HEADER}\
             2,,Hall,,,1,W,,1,loser\n\
             1,,,,Alpha,,,Bravo,,\n"
        );
        let created = import(&csv, &mut conn).unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(created[0].match_number, 1);

        let second = &created[1];
        assert!(second.room_id.is_some());
        assert_eq!(
            second.away,
            Slot::Derived {
                source_id: created[0].id.clone(),
                selector: Selector::Loser,
                team_id: None
            }
        );
    }

    #[test]
    fn bad_row_rolls_back_everything() {
        let mut conn = test_conn();
        let f = Fixture::new(&mut conn);
        f.team("Alpha", &mut conn);

        let csv = format!(
            "{HEADER}\
             1,,,,Alpha,,,,,\n\
             2,,,,Alpha,,,Alpha,,\n"
        );
        let err = import(&csv, &mut conn).unwrap_err();
        match err {
            ImportError::Row { line, source } => {
                assert_eq!(line, 3);
                assert!(matches!(
                    source,
                    EngineError::Validation(ValidationError::SameTeam)
                ));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(Match::load_all(&mut conn).unwrap().is_empty());
    }

    #[test]
    fn unknown_names_are_reported() {
        let mut conn = test_conn();
        let csv = format!("{HEADER}1,,,,Nobody,,,,,\n");
        let err = import(&csv, &mut conn).unwrap_err();
        assert!(matches!(
            err,
            ImportError::Row {
                line: 2,
                source: EngineError::NotFound { entity: "team", .. }
            }
        ));

        let csv = format!("{HEADER}1,,,,,,X,,,\n");
        let err = import(&csv, &mut conn).unwrap_err();
        assert!(matches!(
            err,
            ImportError::Row {
                source: EngineError::Validation(ValidationError::InvalidField {
                    field: "home_take",
                    ..
                }),
                ..
            }
        ));
    }
}
