//! The writes made by generating a bracket and recording a result.
//!
//! Every fallible step (building, resuming and scoring the bracket) runs while planning. A plan
//! only exists once all of them succeeded, so applying it is the only part that touches the
//! tables.
use knockout_core::{Bracket, BracketBuilder, Chance, Match, MatchId, Propagation, TeamId};
use knockout_core::TournamentId;

use super::rows::MatchRow;
use crate::Error;

/// A single write to the `matches` table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Write {
    /// Removes all matches of the tournament.
    DeleteMatches(TournamentId),
    InsertMatch(MatchRow),
    /// Updates the teams, scores and winner of an existing match.
    UpdateMatch(MatchRow),
}

/// The result of an operation together with the writes that persist it.
#[derive(Clone, Debug)]
pub struct Plan<T> {
    pub output: T,
    pub writes: Vec<Write>,
}

/// Plans replacing the bracket of `tournament_id` with a new bracket of `teams`.
pub fn generate<C, F>(
    tournament_id: TournamentId,
    size: usize,
    teams: Vec<TeamId>,
    chance: &mut C,
    next_id: F,
) -> Result<Plan<Bracket>, Error>
where
    C: Chance + ?Sized,
    F: FnMut() -> MatchId,
{
    let bracket = BracketBuilder::new(tournament_id, size)?.build(teams, chance, next_id)?;

    let mut writes = Vec::with_capacity(bracket.matches().len() + 1);
    writes.push(Write::DeleteMatches(tournament_id));
    writes.extend(
        bracket
            .matches()
            .iter()
            .map(|m| Write::InsertMatch(MatchRow::from_match(m))),
    );

    Ok(Plan {
        output: bracket,
        writes,
    })
}

/// Plans recording the result of the match `id` within the persisted `matches`.
pub fn record_result<C>(
    tournament_id: TournamentId,
    size: usize,
    matches: Vec<Match>,
    id: MatchId,
    scores: (u32, u32),
    chance: &mut C,
) -> Result<Plan<Propagation>, Error>
where
    C: Chance + ?Sized,
{
    let mut bracket = Bracket::resume(tournament_id, size, matches)?;
    let propagation = bracket.record_result(id, scores.0, scores.1, chance)?;

    let writes = propagation
        .changed()
        .filter_map(|id| bracket.get(id))
        .map(|m| Write::UpdateMatch(MatchRow::from_match(m)))
        .collect();

    Ok(Plan {
        output: propagation,
        writes,
    })
}
