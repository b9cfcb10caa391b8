use std::collections::{BTreeMap, HashMap};

use diesel::{connection::LoadConnection, sqlite::Sqlite};

use crate::{
    error::EngineError,
    tournaments::matches::{Match, Selector, Side},
};

/// A derived slot seen as a labelled edge from the source match to the match
/// that consumes its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge<'a> {
    pub source_id: &'a str,
    pub target_id: &'a str,
    pub target_number: i64,
    pub side: Side,
    pub selector: Selector,
}

/// In-memory adjacency view of the match table, built on demand. Acyclicity
/// is guaranteed by source numbers being strictly smaller, so no cycle
/// detection happens here.
#[derive(Debug, Default)]
pub struct MatchGraph {
    matches: HashMap<String, Match>,
    by_number: BTreeMap<i64, String>,
}

impl MatchGraph {
    pub fn load(
        conn: &mut impl LoadConnection<Backend = Sqlite>,
    ) -> Result<Self, EngineError> {
        Ok(Self::from_matches(Match::load_all(conn)?))
    }

    pub fn from_matches(matches: impl IntoIterator<Item = Match>) -> Self {
        let mut graph = MatchGraph::default();
        for m in matches {
            graph.by_number.insert(m.match_number, m.id.clone());
            graph.matches.insert(m.id.clone(), m);
        }
        graph
    }

    pub fn get(&self, id: &str) -> Option<&Match> {
        self.matches.get(id)
    }

    pub fn number_of(&self, id: &str) -> Option<i64> {
        self.get(id).map(|m| m.match_number)
    }

    pub fn by_number(&self, number: i64) -> Option<&Match> {
        self.by_number.get(&number).and_then(|id| self.get(id))
    }

    /// All matches in ascending match number.
    pub fn iter(&self) -> impl Iterator<Item = &Match> {
        self.by_number
            .values()
            .filter_map(move |id| self.matches.get(id))
    }

    pub fn edges(&self) -> impl Iterator<Item = Edge<'_>> {
        self.iter().flat_map(|target| {
            target
                .sources()
                .map(move |(side, source_id, selector)| Edge {
                    source_id,
                    target_id: &target.id,
                    target_number: target.match_number,
                    side,
                    selector,
                })
        })
    }

    /// Edges leaving `source_id`, ordered by target match number with the
    /// home slot before the away slot.
    pub fn dependents(&self, source_id: &str) -> Vec<Edge<'_>> {
        self.edges().filter(|e| e.source_id == source_id).collect()
    }

    pub fn derivations_of(
        &self,
        source_id: &str,
        selector: Selector,
    ) -> Vec<Edge<'_>> {
        self.edges()
            .filter(|e| e.source_id == source_id && e.selector == selector)
            .collect()
    }
}
