use knockout_core::{MatchId, TeamId, TournamentId};
use snowflaked::sync::Generator;

const INSTANCE: u16 = 0;

static TOURNAMENT: Generator = Generator::new_unchecked(INSTANCE);
static TEAM: Generator = Generator::new_unchecked(INSTANCE);
static MATCH: Generator = Generator::new_unchecked(INSTANCE);

#[inline]
pub fn tournament() -> TournamentId {
    TournamentId(TOURNAMENT.generate())
}

#[inline]
pub fn team() -> TeamId {
    TeamId(TEAM.generate())
}

#[inline]
pub fn next_match() -> MatchId {
    MatchId(MATCH.generate())
}
