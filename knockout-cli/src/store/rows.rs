use knockout_core::{EntrantSpot, ForwardLink, Match, MatchId, Slot, Team, TeamId, TournamentId};
use sqlx::mysql::MySqlRow;
use sqlx::Row;

use crate::Error;

/// The columns of a single row in the `matches` table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchRow {
    pub id: u64,
    pub tournament_id: u64,
    pub round: u32,
    pub match_number: u32,
    pub team1: Option<u64>,
    pub team2: Option<u64>,
    pub score1: Option<u32>,
    pub score2: Option<u32>,
    pub winner: Option<u64>,
    pub next_match_id: Option<u64>,
    pub next_slot: Option<u8>,
}

impl MatchRow {
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            tournament_id: row.try_get("tournament_id")?,
            round: row.try_get("round")?,
            match_number: row.try_get("match_number")?,
            team1: row.try_get("team1")?,
            team2: row.try_get("team2")?,
            score1: row.try_get("score1")?,
            score2: row.try_get("score2")?,
            winner: row.try_get("winner")?,
            next_match_id: row.try_get("next_match_id")?,
            next_slot: row.try_get("next_slot")?,
        })
    }

    pub fn from_match(r#match: &Match) -> Self {
        let team = |slot| r#match.spot(slot).entrant().map(|team: &TeamId| team.0);

        Self {
            id: r#match.id.0,
            tournament_id: r#match.tournament_id.0,
            round: r#match.round,
            match_number: r#match.index,
            team1: team(Slot::First),
            team2: team(Slot::Second),
            score1: r#match.score(Slot::First),
            score2: r#match.score(Slot::Second),
            winner: r#match.winner.map(|team| team.0),
            next_match_id: r#match.next.map(|link| link.match_id.0),
            next_slot: r#match.next.map(|link| link.slot.to_u8()),
        }
    }

    /// Converts the row into a [`Match`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corrupted`] if the row contains an incomplete or invalid link.
    pub fn into_match(self) -> Result<Match, Error> {
        let next = match (self.next_match_id, self.next_slot) {
            (Some(id), Some(slot)) => {
                let slot = Slot::try_from(slot)
                    .map_err(|err| Error::Corrupted(format!("match {}: {}", self.id, err)))?;

                Some(ForwardLink {
                    match_id: MatchId(id),
                    slot,
                })
            }
            (None, None) => None,
            _ => {
                return Err(Error::Corrupted(format!(
                    "match {}: incomplete link",
                    self.id
                )))
            }
        };

        let mut r#match = Match::new(
            MatchId(self.id),
            TournamentId(self.tournament_id),
            self.round,
            self.match_number,
            [
                EntrantSpot::new(self.team1.map(TeamId)),
                EntrantSpot::new(self.team2.map(TeamId)),
            ],
        );
        r#match.scores = [self.score1, self.score2];
        r#match.winner = self.winner.map(TeamId);
        r#match.next = next;

        Ok(r#match)
    }
}

pub fn team_from_row(row: &MySqlRow) -> Result<Team, sqlx::Error> {
    let id = row.try_get("id")?;
    let name = row.try_get("name")?;
    let asset = row.try_get("asset")?;

    Ok(Team {
        id: TeamId(id),
        name,
        asset,
    })
}

#[cfg(test)]
mod tests {
    use knockout_core::{BracketBuilder, MatchId, Slot, TeamId, TournamentId};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::MatchRow;
    use crate::Error;

    fn row() -> MatchRow {
        MatchRow {
            id: 10,
            tournament_id: 1,
            round: 1,
            match_number: 2,
            team1: Some(3),
            team2: Some(4),
            score1: Some(2),
            score2: Some(5),
            winner: Some(4),
            next_match_id: Some(11),
            next_slot: Some(2),
        }
    }

    #[test]
    fn test_match_row_into_match() {
        let m = row().into_match().unwrap();

        assert_eq!(m.id, MatchId(10));
        assert_eq!(m.index, 2);
        assert_eq!(m.spot(Slot::Second).entrant(), Some(&TeamId(4)));
        assert_eq!(m.scores, [Some(2), Some(5)]);
        assert_eq!(m.winner, Some(TeamId(4)));
        assert_eq!(m.next.unwrap().match_id, MatchId(11));
        assert_eq!(m.next.unwrap().slot, Slot::Second);

        assert_eq!(MatchRow::from_match(&m), row());
    }

    #[test]
    fn test_match_row_bracket() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut next = 0;

        let bracket = BracketBuilder::new(TournamentId(1), 8)
            .unwrap()
            .build((1..=8).map(TeamId).collect(), &mut rng, || {
                next += 1;
                MatchId(next)
            })
            .unwrap();

        for m in bracket.matches() {
            let row = MatchRow::from_match(m);
            assert_eq!(row.next_match_id.is_some(), row.next_slot.is_some());
            assert_eq!(&row.into_match().unwrap(), m);
        }
    }

    #[test]
    fn test_match_row_corrupted() {
        let mut invalid_slot = row();
        invalid_slot.next_slot = Some(3);
        assert!(matches!(
            invalid_slot.into_match(),
            Err(Error::Corrupted(_))
        ));

        let mut incomplete = row();
        incomplete.next_match_id = None;
        assert!(matches!(incomplete.into_match(), Err(Error::Corrupted(_))));
    }
}
