//! Writes to the match table. Every public function here runs inside a single
//! `BEGIN IMMEDIATE` transaction: validation, the write and any propagation
//! commit together or not at all.

use diesel::{SqliteConnection, prelude::*};
use uuid::Uuid;

use crate::{
    error::{EngineError, ValidationError},
    schema::matches,
    tournaments::{
        brackets::BracketRound,
        matches::{
            Match, MatchDraft, MatchResult, MatchRow, Side, Slot, SlotDraft,
            graph::MatchGraph,
            propagate::{
                PropagationReport, propagate_in_tx, pull_from_sources_in_tx,
            },
            validate::{Candidate, FanOutPolicy, validate},
        },
        rooms::Room,
        schedule::ensure_pair_free,
        teams::Team,
        timeslots::Timeslot,
    },
};

#[tracing::instrument(skip(conn))]
pub fn create_match(
    draft: &MatchDraft,
    policy: FanOutPolicy,
    conn: &mut SqliteConnection,
) -> Result<Match, EngineError> {
    conn.immediate_transaction(|conn| create_match_in_tx(draft, policy, conn))
}

pub(crate) fn create_match_in_tx(
    draft: &MatchDraft,
    policy: FanOutPolicy,
    conn: &mut SqliteConnection,
) -> Result<Match, EngineError> {
    let graph = MatchGraph::load(conn)?;
    check_references(draft, &graph, conn)?;
    ensure_number_free(draft.match_number, None, &graph)?;

    let result = MatchResult::default();
    validate(
        &Candidate {
            id: None,
            match_number: draft.match_number,
            home: &draft.home,
            away: &draft.away,
            result: &result,
        },
        &graph,
        policy,
    )?;
    ensure_pair_free(
        None,
        draft.timeslot_id.as_deref(),
        draft.room_id.as_deref(),
        conn,
    )?;

    let mut m = Match {
        id: Uuid::now_v7().to_string(),
        match_number: draft.match_number,
        round_id: draft.round_id.clone(),
        timeslot_id: draft.timeslot_id.clone(),
        room_id: draft.room_id.clone(),
        home: draft.home.to_slot(),
        away: draft.away.to_slot(),
        is_complete: false,
        home_score: None,
        away_score: None,
    };
    diesel::insert_into(matches::table)
        .values(&MatchRow::from(&m))
        .execute(conn)?;
    pull_from_sources_in_tx(conn, &mut m)?;

    tracing::info!(number = m.match_number, id = %m.id, "created match");
    Ok(m)
}

/// Replaces the structural fields of a match. The recorded result is kept,
/// and if the match is complete its outcome is propagated again, since the
/// teams it was decided between may have changed.
#[tracing::instrument(skip(conn))]
pub fn update_match(
    match_id: &str,
    draft: &MatchDraft,
    policy: FanOutPolicy,
    conn: &mut SqliteConnection,
) -> Result<Match, EngineError> {
    conn.immediate_transaction(|conn| {
        let existing = Match::fetch(match_id, conn)?;
        let graph = MatchGraph::load(conn)?;
        check_references(draft, &graph, conn)?;
        ensure_number_free(draft.match_number, Some(match_id), &graph)?;

        let result = existing.result();
        validate(
            &Candidate {
                id: Some(match_id),
                match_number: draft.match_number,
                home: &draft.home,
                away: &draft.away,
                result: &result,
            },
            &graph,
            policy,
        )?;
        ensure_pair_free(
            Some(match_id),
            draft.timeslot_id.as_deref(),
            draft.room_id.as_deref(),
            conn,
        )?;

        let mut m = Match {
            match_number: draft.match_number,
            round_id: draft.round_id.clone(),
            timeslot_id: draft.timeslot_id.clone(),
            room_id: draft.room_id.clone(),
            home: keep_resolved(&existing.home, &draft.home),
            away: keep_resolved(&existing.away, &draft.away),
            ..existing
        };
        diesel::update(matches::table.filter(matches::id.eq(match_id)))
            .set(&MatchRow::from(&m))
            .execute(conn)?;
        pull_from_sources_in_tx(conn, &mut m)?;

        if m.is_complete {
            propagate_in_tx(conn, &m)?;
        }
        Ok(m)
    })
}

/// Sets (or clears) a match's result and propagates its outcome.
#[tracing::instrument(skip(conn))]
pub fn set_result(
    match_id: &str,
    result: &MatchResult,
    policy: FanOutPolicy,
    conn: &mut SqliteConnection,
) -> Result<PropagationReport, EngineError> {
    conn.immediate_transaction(|conn| {
        let existing = Match::fetch(match_id, conn)?;
        let graph = MatchGraph::load(conn)?;

        let (home, away) =
            (SlotDraft::from(&existing.home), SlotDraft::from(&existing.away));
        validate(
            &Candidate {
                id: Some(match_id),
                match_number: existing.match_number,
                home: &home,
                away: &away,
                result,
            },
            &graph,
            policy,
        )?;

        diesel::update(matches::table.filter(matches::id.eq(match_id)))
            .set((
                matches::is_complete.eq(result.is_complete),
                matches::home_score.eq(result.home_score),
                matches::away_score.eq(result.away_score),
            ))
            .execute(conn)?;

        let m = Match {
            is_complete: result.is_complete,
            home_score: result.home_score,
            away_score: result.away_score,
            ..existing
        };
        propagate_in_tx(conn, &m)
    })
}

/// Marks the match complete with the given scores.
pub fn record_result(
    match_id: &str,
    home_score: i64,
    away_score: i64,
    policy: FanOutPolicy,
    conn: &mut SqliteConnection,
) -> Result<PropagationReport, EngineError> {
    set_result(
        match_id,
        &MatchResult::complete(home_score, away_score),
        policy,
        conn,
    )
}

/// Un-marks completion; slots filled from this match become pending again.
pub fn clear_result(
    match_id: &str,
    policy: FanOutPolicy,
    conn: &mut SqliteConnection,
) -> Result<PropagationReport, EngineError> {
    set_result(match_id, &MatchResult::default(), policy, conn)
}

/// Deletes a match. Slots that derived from it are cleared back to empty
/// rather than left pointing at nothing. Returns the number of cleared slots.
#[tracing::instrument(skip(conn))]
pub fn delete_match(
    match_id: &str,
    conn: &mut SqliteConnection,
) -> Result<usize, EngineError> {
    conn.immediate_transaction(|conn| {
        Match::fetch(match_id, conn)?;

        let mut cleared = 0;
        for mut dependent in Match::dependents_of(match_id, conn)? {
            for side in Side::BOTH {
                if dependent
                    .slot(side)
                    .source()
                    .is_some_and(|(source_id, _)| source_id == match_id)
                {
                    *dependent.slot_mut(side) = Slot::Empty;
                    cleared += 1;
                }
            }
            diesel::update(matches::table.filter(matches::id.eq(&dependent.id)))
                .set(&MatchRow::from(&dependent))
                .execute(conn)?;
        }

        diesel::delete(matches::table.filter(matches::id.eq(match_id)))
            .execute(conn)?;
        tracing::info!(cleared, "deleted match");
        Ok(cleared)
    })
}

/// A derived slot that still points at the same outcome keeps the team
/// already propagated into it.
fn keep_resolved(existing: &Slot, draft: &SlotDraft) -> Slot {
    match (existing, draft.to_slot()) {
        (
            Slot::Derived {
                source_id,
                selector,
                team_id,
            },
            Slot::Derived {
                source_id: next_source,
                selector: next_selector,
                ..
            },
        ) if *source_id == next_source && *selector == next_selector => {
            Slot::Derived {
                source_id: next_source,
                selector: next_selector,
                team_id: team_id.clone(),
            }
        }
        (_, slot) => slot,
    }
}

fn ensure_number_free(
    number: i64,
    id: Option<&str>,
    graph: &MatchGraph,
) -> Result<(), ValidationError> {
    match graph.by_number(number) {
        Some(other) if Some(other.id.as_str()) != id => {
            Err(ValidationError::invalid(
                "match_number",
                format!("{number} is already in use"),
            ))
        }
        _ => Ok(()),
    }
}

fn check_references(
    draft: &MatchDraft,
    graph: &MatchGraph,
    conn: &mut SqliteConnection,
) -> Result<(), EngineError> {
    if let Some(round_id) = &draft.round_id {
        BracketRound::fetch(round_id, conn)?;
    }
    if let Some(timeslot_id) = &draft.timeslot_id {
        Timeslot::fetch(timeslot_id, conn)?;
    }
    if let Some(room_id) = &draft.room_id {
        Room::fetch(room_id, conn)?;
    }
    for slot in [&draft.home, &draft.away] {
        if let Some(team_id) = &slot.team_id {
            Team::fetch(team_id, conn)?;
        }
        if let Some(source_id) = &slot.source_match_id
            && graph.get(source_id).is_none()
        {
            return Err(EngineError::not_found("match", source_id.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test::{Fixture, test_conn},
        tournaments::matches::{
            Outcome, Selector,
            slots::{ResolvedSlot, is_ready, resolve_slot},
        },
    };

    const ALL: FanOutPolicy = FanOutPolicy::All;

    fn draft(number: i64, home: SlotDraft, away: SlotDraft) -> MatchDraft {
        MatchDraft {
            match_number: number,
            home,
            away,
            ..Default::default()
        }
    }

    fn create(
        number: i64,
        home: SlotDraft,
        away: SlotDraft,
        conn: &mut SqliteConnection,
    ) -> Match {
        create_match(&draft(number, home, away), ALL, conn).unwrap()
    }

    fn team_in(
        id: &str,
        side: Side,
        conn: &mut SqliteConnection,
    ) -> Option<String> {
        Match::fetch(id, conn)
            .unwrap()
            .slot(side)
            .team_id()
            .map(str::to_string)
    }

    #[test]
    fn winner_and_loser_propagate() {
        let mut conn = test_conn();
        let f = Fixture::new(&mut conn);
        let (a, b) = (f.team("A", &mut conn), f.team("B", &mut conn));

        let s = create(1, SlotDraft::team(&a), SlotDraft::team(&b), &mut conn);
        let win = create(
            2,
            SlotDraft::winner_of(&s.id),
            SlotDraft::default(),
            &mut conn,
        );
        let lose = create(
            3,
            SlotDraft::loser_of(&s.id),
            SlotDraft::default(),
            &mut conn,
        );

        let report = record_result(&s.id, 10, 3, ALL, &mut conn).unwrap();
        assert_eq!(report.outcome, Outcome::Decided { winner: Side::Home });
        assert_eq!(report.winner_team_id.as_deref(), Some(a.as_str()));
        assert_eq!(report.changed().count(), 2);

        assert_eq!(team_in(&win.id, Side::Home, &mut conn), Some(a.clone()));
        assert_eq!(team_in(&lose.id, Side::Home, &mut conn), Some(b.clone()));
    }

    #[test]
    fn recording_twice_is_idempotent() {
        let mut conn = test_conn();
        let f = Fixture::new(&mut conn);
        let (a, b) = (f.team("A", &mut conn), f.team("B", &mut conn));

        let s = create(1, SlotDraft::team(&a), SlotDraft::team(&b), &mut conn);
        create(
            2,
            SlotDraft::winner_of(&s.id),
            SlotDraft::loser_of(&s.id),
            &mut conn,
        );

        record_result(&s.id, 10, 3, ALL, &mut conn).unwrap();
        let before = Match::load_all(&mut conn).unwrap();
        let again = record_result(&s.id, 10, 3, ALL, &mut conn).unwrap();
        let after = Match::load_all(&mut conn).unwrap();

        assert_eq!(before, after);
        assert_eq!(again.updates.len(), 2);
        assert_eq!(again.changed().count(), 0);
    }

    #[test]
    fn tie_leaves_dependents_pending() {
        let mut conn = test_conn();
        let f = Fixture::new(&mut conn);
        let (a, b) = (f.team("A", &mut conn), f.team("B", &mut conn));

        let s = create(7, SlotDraft::team(&a), SlotDraft::team(&b), &mut conn);
        let d = create(
            8,
            SlotDraft::winner_of(&s.id),
            SlotDraft::loser_of(&s.id),
            &mut conn,
        );

        let report = record_result(&s.id, 5, 5, ALL, &mut conn).unwrap();
        assert_eq!(report.outcome, Outcome::Tie);
        assert_eq!(report.winner_team_id, None);

        assert_eq!(
            resolve_slot(&d.id, Side::Home, &mut conn).unwrap(),
            ResolvedSlot::Pending {
                source_match_number: 7,
                selector: Selector::Winner
            }
        );
        assert_eq!(
            resolve_slot(&d.id, Side::Away, &mut conn)
                .unwrap()
                .short_label()
                .as_deref(),
            Some("L7")
        );
    }

    #[test]
    fn editing_result_flips_dependents() {
        let mut conn = test_conn();
        let f = Fixture::new(&mut conn);
        let (a, b) = (f.team("A", &mut conn), f.team("B", &mut conn));

        let s = create(1, SlotDraft::team(&a), SlotDraft::team(&b), &mut conn);
        let w = create(
            2,
            SlotDraft::winner_of(&s.id),
            SlotDraft::default(),
            &mut conn,
        );
        let l = create(
            3,
            SlotDraft::default(),
            SlotDraft::loser_of(&s.id),
            &mut conn,
        );

        record_result(&s.id, 10, 3, ALL, &mut conn).unwrap();
        let report = record_result(&s.id, 3, 10, ALL, &mut conn).unwrap();

        assert_eq!(team_in(&w.id, Side::Home, &mut conn), Some(b.clone()));
        assert_eq!(team_in(&l.id, Side::Away, &mut conn), Some(a.clone()));
        let flipped = report.changed().collect::<Vec<_>>();
        assert_eq!(flipped.len(), 2);
        assert_eq!(flipped[0].previous_team_id.as_deref(), Some(a.as_str()));
    }

    #[test]
    fn clearing_result_unresolves_dependents() {
        let mut conn = test_conn();
        let f = Fixture::new(&mut conn);
        let (a, b) = (f.team("A", &mut conn), f.team("B", &mut conn));

        let s = create(1, SlotDraft::team(&a), SlotDraft::team(&b), &mut conn);
        let d = create(
            2,
            SlotDraft::winner_of(&s.id),
            SlotDraft::default(),
            &mut conn,
        );

        record_result(&s.id, 2, 1, ALL, &mut conn).unwrap();
        clear_result(&s.id, ALL, &mut conn).unwrap();

        assert_eq!(team_in(&d.id, Side::Home, &mut conn), None);
        let s = Match::fetch(&s.id, &mut conn).unwrap();
        assert!(!s.is_complete);
        assert_eq!(s.home_score, None);
    }

    #[test]
    fn propagation_does_not_recurse_or_autocomplete() {
        let mut conn = test_conn();
        let f = Fixture::new(&mut conn);
        let (a, b, c) = (
            f.team("A", &mut conn),
            f.team("B", &mut conn),
            f.team("C", &mut conn),
        );

        let s = create(1, SlotDraft::team(&a), SlotDraft::team(&b), &mut conn);
        let semi = create(
            2,
            SlotDraft::winner_of(&s.id),
            SlotDraft::team(&c),
            &mut conn,
        );
        let fin = create(
            3,
            SlotDraft::winner_of(&semi.id),
            SlotDraft::default(),
            &mut conn,
        );

        record_result(&s.id, 1, 0, ALL, &mut conn).unwrap();

        let semi = Match::fetch(&semi.id, &mut conn).unwrap();
        assert!(is_ready(&semi));
        assert!(!semi.is_complete);
        assert_eq!(team_in(&fin.id, Side::Home, &mut conn), None);
    }

    #[test]
    fn rejected_result_leaves_state_untouched() {
        let mut conn = test_conn();
        let f = Fixture::new(&mut conn);
        let (a, b) = (f.team("A", &mut conn), f.team("B", &mut conn));
        let s = create(1, SlotDraft::team(&a), SlotDraft::team(&b), &mut conn);

        // no half-scored match, whether or not it claims to be complete
        for is_complete in [true, false] {
            let err = set_result(
                &s.id,
                &MatchResult {
                    home_score: Some(4),
                    away_score: None,
                    is_complete,
                },
                ALL,
                &mut conn,
            )
            .unwrap_err();
            assert!(matches!(
                err,
                EngineError::Validation(ValidationError::IncompleteScore)
            ));
            assert_eq!(Match::fetch(&s.id, &mut conn).unwrap(), s);
        }
    }

    #[test]
    fn same_team_on_propagation_rolls_back() {
        let mut conn = test_conn();
        let f = Fixture::new(&mut conn);
        let (a, b, c) = (
            f.team("A", &mut conn),
            f.team("B", &mut conn),
            f.team("C", &mut conn),
        );

        // a misconfigured graph: A plays in both feeder matches
        let s1 = create(1, SlotDraft::team(&a), SlotDraft::team(&b), &mut conn);
        let s2 = create(2, SlotDraft::team(&a), SlotDraft::team(&c), &mut conn);
        let d = create(
            3,
            SlotDraft::winner_of(&s1.id),
            SlotDraft::winner_of(&s2.id),
            &mut conn,
        );

        record_result(&s1.id, 3, 0, ALL, &mut conn).unwrap();
        let err = record_result(&s2.id, 3, 0, ALL, &mut conn).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::SameTeam)
        ));

        assert!(!Match::fetch(&s2.id, &mut conn).unwrap().is_complete);
        assert_eq!(team_in(&d.id, Side::Away, &mut conn), None);
    }

    #[test]
    fn fan_out_fills_every_dependent() {
        let mut conn = test_conn();
        let f = Fixture::new(&mut conn);
        let (a, b) = (f.team("A", &mut conn), f.team("B", &mut conn));
        let s = create(1, SlotDraft::team(&a), SlotDraft::team(&b), &mut conn);
        let d2 = create(
            5,
            SlotDraft::winner_of(&s.id),
            SlotDraft::default(),
            &mut conn,
        );
        let d1 = create(
            4,
            SlotDraft::default(),
            SlotDraft::winner_of(&s.id),
            &mut conn,
        );

        let report = record_result(&s.id, 0, 9, ALL, &mut conn).unwrap();
        let order = report
            .updates
            .iter()
            .map(|u| u.match_number)
            .collect::<Vec<_>>();
        assert_eq!(order, vec![4, 5]);
        assert_eq!(team_in(&d1.id, Side::Away, &mut conn), Some(b.clone()));
        assert_eq!(team_in(&d2.id, Side::Home, &mut conn), Some(b));

        let err = create_match(
            &draft(6, SlotDraft::winner_of(&s.id), SlotDraft::default()),
            FanOutPolicy::Exclusive,
            &mut conn,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::SharedSource)
        ));
    }

    #[test]
    fn late_derivation_pulls_existing_result() {
        let mut conn = test_conn();
        let f = Fixture::new(&mut conn);
        let (a, b) = (f.team("A", &mut conn), f.team("B", &mut conn));
        let s = create(1, SlotDraft::team(&a), SlotDraft::team(&b), &mut conn);
        record_result(&s.id, 1, 2, ALL, &mut conn).unwrap();

        let d = create(
            2,
            SlotDraft::loser_of(&s.id),
            SlotDraft::default(),
            &mut conn,
        );
        assert_eq!(d.home.team_id(), Some(a.as_str()));
        assert_eq!(team_in(&d.id, Side::Home, &mut conn), Some(a));
    }

    #[test]
    fn updating_teams_of_a_complete_match_repropagates() {
        let mut conn = test_conn();
        let f = Fixture::new(&mut conn);
        let (a, b, c) = (
            f.team("A", &mut conn),
            f.team("B", &mut conn),
            f.team("C", &mut conn),
        );
        let s = create(1, SlotDraft::team(&a), SlotDraft::team(&b), &mut conn);
        let d = create(
            2,
            SlotDraft::winner_of(&s.id),
            SlotDraft::default(),
            &mut conn,
        );
        record_result(&s.id, 6, 1, ALL, &mut conn).unwrap();

        let updated = update_match(
            &s.id,
            &draft(1, SlotDraft::team(&c), SlotDraft::team(&b)),
            ALL,
            &mut conn,
        )
        .unwrap();
        assert!(updated.is_complete);
        assert_eq!(team_in(&d.id, Side::Home, &mut conn), Some(c));
    }

    #[test]
    fn update_keeps_ordering_invariant() {
        let mut conn = test_conn();
        let s = create(
            3,
            SlotDraft::default(),
            SlotDraft::default(),
            &mut conn,
        );
        create(4, SlotDraft::winner_of(&s.id), SlotDraft::default(), &mut conn);

        let err = update_match(
            &s.id,
            &draft(8, SlotDraft::default(), SlotDraft::default()),
            ALL,
            &mut conn,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::SourceOrder)
        ));

        let err = create_match(
            &draft(4, SlotDraft::default(), SlotDraft::default()),
            ALL,
            &mut conn,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::InvalidField {
                field: "match_number",
                ..
            })
        ));
    }

    #[test]
    fn unknown_references_are_not_found() {
        let mut conn = test_conn();
        let err = create_match(
            &draft(1, SlotDraft::team("nope"), SlotDraft::default()),
            ALL,
            &mut conn,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { entity: "team", .. }));

        let err = create_match(
            &draft(2, SlotDraft::winner_of("nope"), SlotDraft::default()),
            ALL,
            &mut conn,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { entity: "match", .. }));

        let err = record_result("nope", 1, 0, ALL, &mut conn).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[test]
    fn deleting_a_source_clears_dependent_slots() {
        let mut conn = test_conn();
        let f = Fixture::new(&mut conn);
        let (a, b) = (f.team("A", &mut conn), f.team("B", &mut conn));
        let s = create(1, SlotDraft::team(&a), SlotDraft::team(&b), &mut conn);
        let d = create(
            2,
            SlotDraft::winner_of(&s.id),
            SlotDraft::loser_of(&s.id),
            &mut conn,
        );
        record_result(&s.id, 1, 0, ALL, &mut conn).unwrap();

        assert_eq!(delete_match(&s.id, &mut conn).unwrap(), 2);
        let d = Match::fetch(&d.id, &mut conn).unwrap();
        assert_eq!(d.home, Slot::Empty);
        assert_eq!(d.away, Slot::Empty);
    }

    #[test]
    fn deleting_a_team_falls_back_per_slot_kind() {
        let mut conn = test_conn();
        let f = Fixture::new(&mut conn);
        let (a, b) = (f.team("A", &mut conn), f.team("B", &mut conn));
        let s = create(1, SlotDraft::team(&a), SlotDraft::team(&b), &mut conn);
        let d = create(
            2,
            SlotDraft::winner_of(&s.id),
            SlotDraft::default(),
            &mut conn,
        );
        record_result(&s.id, 1, 0, ALL, &mut conn).unwrap();

        crate::tournaments::teams::delete_team(&a, &mut conn).unwrap();

        assert_eq!(Match::fetch(&s.id, &mut conn).unwrap().home, Slot::Empty);
        assert_eq!(
            Match::fetch(&d.id, &mut conn).unwrap().home,
            Slot::Derived {
                source_id: s.id.clone(),
                selector: Selector::Winner,
                team_id: None
            }
        );
    }
}
