//! Read-only views of a [`Bracket`].
//!
//! A [`BracketView`] contains all rounds of a bracket, ordered by round and then by the index of
//! the match within its round. Teams are resolved to their names. With the `serde` feature the
//! view serializes into the export format:
//!
//! ```json
//! {
//!   "tournament": "Spring Cup",
//!   "rounds": [
//!     [{ "id": 1, "round": 1, "match_number": 1, "team1": "A", "team2": "B",
//!        "score1": 2, "score2": 1, "winner": "A" }]
//!   ]
//! }
//! ```
//!
//! Values that are not known yet are `null`.
use std::collections::HashMap;

use crate::{Bracket, Match, MatchId, Team, TeamId, Tournament};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An ordered view of all matches in a bracket.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BracketView {
    /// The name of the tournament.
    pub tournament: String,
    pub rounds: Vec<Vec<MatchView>>,
}

impl BracketView {
    /// Creates a new `BracketView` of `bracket`. Teams that are missing from `teams` are
    /// rendered as absent.
    pub fn new(tournament: &Tournament, bracket: &Bracket, teams: &[Team]) -> Self {
        let names: HashMap<TeamId, &str> = teams
            .iter()
            .map(|team| (team.id, team.name.as_str()))
            .collect();

        let rounds = bracket
            .rounds()
            .map(|round| {
                round
                    .iter()
                    .map(|m| MatchView::new(m, |id| names.get(&id).copied()))
                    .collect()
            })
            .collect();

        Self {
            tournament: tournament.name.clone(),
            rounds,
        }
    }

    /// Returns the view of the final match.
    pub fn final_match(&self) -> Option<&MatchView> {
        self.rounds.last().and_then(|round| round.last())
    }
}

/// A single match in a [`BracketView`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MatchView {
    pub id: MatchId,
    pub round: u32,
    pub match_number: u32,
    pub team1: Option<String>,
    pub team2: Option<String>,
    pub score1: Option<u32>,
    pub score2: Option<u32>,
    pub winner: Option<String>,
}

impl MatchView {
    fn new<'a, F>(r#match: &Match, name: F) -> Self
    where
        F: Fn(TeamId) -> Option<&'a str>,
    {
        let resolve = |id: Option<&TeamId>| id.and_then(|id| name(*id)).map(str::to_owned);

        Self {
            id: r#match.id,
            round: r#match.round,
            match_number: r#match.index,
            team1: resolve(r#match.entrants[0].entrant()),
            team2: resolve(r#match.entrants[1].entrant()),
            score1: r#match.scores[0],
            score2: r#match.scores[1],
            winner: resolve(r#match.winner.as_ref()),
        }
    }
}
