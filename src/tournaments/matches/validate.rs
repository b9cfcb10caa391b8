//! Structural checks run before every write to the match table.

use serde::{Deserialize, Serialize};

use crate::{
    error::ValidationError,
    tournaments::matches::{
        MatchResult, Selector, SlotDraft, graph::MatchGraph,
    },
};

/// How propagation treats several matches deriving the same outcome of one
/// source match.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FanOutPolicy {
    /// Every dependent is filled, in ascending match number.
    #[default]
    All,
    /// A (source, selector) pair may feed at most one slot.
    Exclusive,
}

/// A match as it would look after the write.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    /// `None` when the match is being created.
    pub id: Option<&'a str>,
    pub match_number: i64,
    pub home: &'a SlotDraft,
    pub away: &'a SlotDraft,
    pub result: &'a MatchResult,
}

impl<'a> Candidate<'a> {
    fn slots(&self) -> [&'a SlotDraft; 2] {
        [self.home, self.away]
    }
}

/// Checks the candidate against the existing matches, stopping at the first
/// violation. `graph` may contain the pre-write version of the candidate.
///
/// Source matches are assumed to exist; callers report unknown ids as
/// not-found before validating.
pub fn validate(
    candidate: &Candidate<'_>,
    graph: &MatchGraph,
    policy: FanOutPolicy,
) -> Result<(), ValidationError> {
    if candidate.match_number <= 0 {
        return Err(ValidationError::invalid(
            "match_number",
            "must be a positive integer",
        ));
    }

    if let (Some(home), Some(away)) =
        (&candidate.home.team_id, &candidate.away.team_id)
        && home == away
    {
        return Err(ValidationError::SameTeam);
    }

    if let (
        Some(home_source),
        Some(home_take),
        Some(away_source),
        Some(away_take),
    ) = (
        &candidate.home.source_match_id,
        candidate.home.take_winner,
        &candidate.away.source_match_id,
        candidate.away.take_winner,
    ) && home_source == away_source
        && home_take == away_take
    {
        return Err(ValidationError::DuplicateSource);
    }

    // complete means both scores, incomplete means neither
    let result = candidate.result;
    let scored = [result.home_score, result.away_score]
        .iter()
        .filter(|s| s.is_some())
        .count();
    let expected = if result.is_complete { 2 } else { 0 };
    if scored != expected {
        return Err(ValidationError::IncompleteScore);
    }

    check_source_order(candidate, graph)?;

    if candidate
        .slots()
        .iter()
        .any(|s| s.source_match_id.is_some() && s.take_winner.is_none())
    {
        return Err(ValidationError::MissingSelector);
    }

    if candidate.slots().iter().any(|s| {
        (s.team_id.is_some() && s.source_match_id.is_some())
            || (s.source_match_id.is_none() && s.take_winner.is_some())
    }) {
        return Err(ValidationError::MixedSlot);
    }

    if policy == FanOutPolicy::Exclusive {
        check_exclusive(candidate, graph)?;
    }

    Ok(())
}

fn check_source_order(
    candidate: &Candidate<'_>,
    graph: &MatchGraph,
) -> Result<(), ValidationError> {
    for slot in candidate.slots() {
        let Some(source_id) = &slot.source_match_id else {
            continue;
        };
        if Some(source_id.as_str()) == candidate.id {
            return Err(ValidationError::SourceOrder);
        }
        if let Some(number) = graph.number_of(source_id)
            && number >= candidate.match_number
        {
            return Err(ValidationError::SourceOrder);
        }
    }

    // renumbering must not overtake a match that already consumes this one
    if let Some(id) = candidate.id
        && graph
            .dependents(id)
            .iter()
            .any(|e| {
                e.target_id != id && e.target_number <= candidate.match_number
            })
    {
        return Err(ValidationError::SourceOrder);
    }

    Ok(())
}

fn check_exclusive(
    candidate: &Candidate<'_>,
    graph: &MatchGraph,
) -> Result<(), ValidationError> {
    for slot in candidate.slots() {
        let (Some(source_id), Some(take_winner)) =
            (&slot.source_match_id, slot.take_winner)
        else {
            continue;
        };
        let taken = graph
            .derivations_of(source_id, Selector::from_take_winner(take_winner))
            .iter()
            .any(|e| Some(e.target_id) != candidate.id);
        if taken {
            return Err(ValidationError::SharedSource);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tournaments::matches::{Match, Slot};

    fn stored(id: &str, number: i64, home: Slot, away: Slot) -> Match {
        Match {
            id: id.into(),
            match_number: number,
            round_id: None,
            timeslot_id: None,
            room_id: None,
            home,
            away,
            is_complete: false,
            home_score: None,
            away_score: None,
        }
    }

    fn graph() -> MatchGraph {
        MatchGraph::from_matches([
            stored("m5", 5, Slot::Empty, Slot::Empty),
            stored("m6", 6, Slot::Empty, Slot::Empty),
            stored(
                "m9",
                9,
                Slot::Derived {
                    source_id: "m5".into(),
                    selector: Selector::Winner,
                    team_id: None,
                },
                Slot::Empty,
            ),
        ])
    }

    fn check(
        number: i64,
        home: SlotDraft,
        away: SlotDraft,
        result: MatchResult,
    ) -> Result<(), ValidationError> {
        validate(
            &Candidate {
                id: None,
                match_number: number,
                home: &home,
                away: &away,
                result: &result,
            },
            &graph(),
            FanOutPolicy::All,
        )
    }

    #[test]
    fn accepts_well_formed_match() {
        assert_eq!(
            check(
                10,
                SlotDraft::winner_of("m5"),
                SlotDraft::loser_of("m5"),
                MatchResult::default()
            ),
            Ok(())
        );
        assert_eq!(
            check(
                1,
                SlotDraft::team("a"),
                SlotDraft::default(),
                MatchResult::default()
            ),
            Ok(())
        );
    }

    #[test]
    fn rejects_same_team() {
        assert_eq!(
            check(
                10,
                SlotDraft::team("a"),
                SlotDraft::team("a"),
                MatchResult::default()
            ),
            Err(ValidationError::SameTeam)
        );
    }

    #[test]
    fn rejects_duplicate_source() {
        assert_eq!(
            check(
                10,
                SlotDraft::winner_of("m5"),
                SlotDraft::winner_of("m5"),
                MatchResult::default()
            ),
            Err(ValidationError::DuplicateSource)
        );
    }

    #[test]
    fn rejects_complete_without_scores() {
        let result = MatchResult {
            home_score: Some(3),
            away_score: None,
            is_complete: true,
        };
        assert_eq!(
            check(10, SlotDraft::team("a"), SlotDraft::team("b"), result),
            Err(ValidationError::IncompleteScore)
        );
    }

    #[test]
    fn rejects_scores_on_incomplete_match() {
        for (home_score, away_score) in [(Some(4), None), (Some(4), Some(2))] {
            let result = MatchResult {
                home_score,
                away_score,
                is_complete: false,
            };
            assert_eq!(
                check(10, SlotDraft::team("a"), SlotDraft::team("b"), result),
                Err(ValidationError::IncompleteScore)
            );
        }
    }

    #[test]
    fn rejects_source_with_equal_or_greater_number() {
        assert_eq!(
            check(
                5,
                SlotDraft::winner_of("m5"),
                SlotDraft::default(),
                MatchResult::default()
            ),
            Err(ValidationError::SourceOrder)
        );
        assert_eq!(
            check(
                4,
                SlotDraft::default(),
                SlotDraft::loser_of("m6"),
                MatchResult::default()
            ),
            Err(ValidationError::SourceOrder)
        );
    }

    #[test]
    fn rejects_renumbering_past_a_dependent() {
        let (home, away, result) = (
            SlotDraft::default(),
            SlotDraft::default(),
            MatchResult::default(),
        );
        let candidate = Candidate {
            id: Some("m5"),
            match_number: 9,
            home: &home,
            away: &away,
            result: &result,
        };
        assert_eq!(
            validate(&candidate, &graph(), FanOutPolicy::All),
            Err(ValidationError::SourceOrder)
        );
    }

    #[test]
    fn rejects_self_reference() {
        let (home, away, result) = (
            SlotDraft::winner_of("m6"),
            SlotDraft::default(),
            MatchResult::default(),
        );
        let candidate = Candidate {
            id: Some("m6"),
            match_number: 7,
            home: &home,
            away: &away,
            result: &result,
        };
        assert_eq!(
            validate(&candidate, &graph(), FanOutPolicy::All),
            Err(ValidationError::SourceOrder)
        );
    }

    #[test]
    fn rejects_missing_selector() {
        let home = SlotDraft {
            source_match_id: Some("m5".into()),
            ..Default::default()
        };
        assert_eq!(
            check(10, home, SlotDraft::default(), MatchResult::default()),
            Err(ValidationError::MissingSelector)
        );
    }

    #[test]
    fn rejects_mixed_slots() {
        let home = SlotDraft {
            team_id: Some("a".into()),
            ..SlotDraft::winner_of("m5")
        };
        assert_eq!(
            check(10, home, SlotDraft::default(), MatchResult::default()),
            Err(ValidationError::MixedSlot)
        );

        let away = SlotDraft {
            take_winner: Some(true),
            ..Default::default()
        };
        assert_eq!(
            check(10, SlotDraft::default(), away, MatchResult::default()),
            Err(ValidationError::MixedSlot)
        );
    }

    #[test]
    fn first_violation_wins() {
        // same team and an incomplete score: SAME_TEAM is checked first
        let result = MatchResult {
            is_complete: true,
            ..Default::default()
        };
        assert_eq!(
            check(10, SlotDraft::team("a"), SlotDraft::team("a"), result),
            Err(ValidationError::SameTeam)
        );
    }

    #[test]
    fn exclusive_policy_rejects_shared_source() {
        let (home, away, result) = (
            SlotDraft::winner_of("m5"),
            SlotDraft::default(),
            MatchResult::default(),
        );
        let candidate = Candidate {
            id: None,
            match_number: 12,
            home: &home,
            away: &away,
            result: &result,
        };
        assert_eq!(validate(&candidate, &graph(), FanOutPolicy::All), Ok(()));
        assert_eq!(
            validate(&candidate, &graph(), FanOutPolicy::Exclusive),
            Err(ValidationError::SharedSource)
        );

        // the match already holding the derivation may keep it
        let candidate = Candidate {
            id: Some("m9"),
            match_number: 9,
            ..candidate
        };
        assert_eq!(
            validate(&candidate, &graph(), FanOutPolicy::Exclusive),
            Ok(())
        );
    }
}
