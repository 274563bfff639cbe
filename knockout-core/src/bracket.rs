use std::cmp::Ordering;
use std::collections::HashMap;
use std::iter::FusedIterator;

use crate::utils::{validate_size, NumExt};
use crate::{Chance, EntrantSpot, Error, ForwardLink, Match, MatchId, Result, Slot};
use crate::{TeamId, TournamentId};

/// All matches of a single elimination tournament.
///
/// Matches are stored sorted by round and index and are addressed by their [`MatchId`]. The
/// winner of a match is moved into the next match using the [`ForwardLink`] stored in every
/// match except the final.
#[derive(Clone, Debug)]
pub struct Bracket {
    tournament_id: TournamentId,
    size: usize,
    matches: Vec<Match>,
    index: HashMap<MatchId, usize>,
}

impl Bracket {
    pub(crate) fn new_unchecked(
        tournament_id: TournamentId,
        size: usize,
        matches: Vec<Match>,
    ) -> Self {
        let index = matches
            .iter()
            .enumerate()
            .map(|(position, m)| (m.id, position))
            .collect();

        Self {
            tournament_id,
            size,
            matches,
            index,
        }
    }

    /// Resumes the bracket from existing matches, e.g. matches loaded from a store. The
    /// `matches` can be in any order.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if `size` is invalid, `matches` has an invalid number of matches
    /// for `size`, a match belongs to another tournament, or the rounds, indices and links of the
    /// matches don't form a complete bracket.
    pub fn resume(
        tournament_id: TournamentId,
        size: usize,
        mut matches: Vec<Match>,
    ) -> Result<Self> {
        validate_size(size)?;

        log::debug!(
            "Trying to resume bracket of tournament {} with {} matches",
            tournament_id,
            matches.len()
        );

        let expected = size - 1;
        let found = matches.len();
        if found != expected {
            return Err(Error::InvalidNumberOfMatches { expected, found });
        }

        matches.sort_by_key(|m| (m.round, m.index));

        let this = Self::new_unchecked(tournament_id, size, matches);
        this.validate()?;

        Ok(this)
    }

    /// Checks that the matches form a complete bracket: round `r` contains the matches with the
    /// indices `1..=size >> r` and the match at 0-based position `k` links into position `k / 2`
    /// of the next round.
    fn validate(&self) -> Result<()> {
        let round_count = self.round_count();
        let mut expected = self.size / 2;

        for (round, matches) in self.rounds().enumerate() {
            for (position, m) in matches.iter().enumerate() {
                if m.tournament_id != self.tournament_id {
                    return Err(Error::ForeignMatch {
                        id: m.id,
                        tournament_id: m.tournament_id,
                    });
                }

                if m.round as usize != round + 1
                    || m.index as usize != position + 1
                    || position >= expected
                    || self.index.get(&m.id) != Some(&self.position(round, position))
                {
                    return Err(Error::InvalidPosition(m.id));
                }

                let link = match m.next {
                    Some(link) => link,
                    None if round + 1 == round_count => continue,
                    None => return Err(Error::MissingLink(m.id)),
                };

                let valid = match self.get(link.match_id) {
                    Some(target) => {
                        target.round == m.round + 1
                            && target.index as usize == position / 2 + 1
                            && link.slot == Slot::from_position(position)
                    }
                    None => false,
                };

                if !valid {
                    return Err(Error::InvalidLink {
                        id: m.id,
                        target: link.match_id,
                    });
                }
            }

            expected /= 2;
        }

        Ok(())
    }

    /// Returns the offset of the match at `position` in the 0-based `round`.
    fn position(&self, round: usize, position: usize) -> usize {
        // Round `r` starts after `size - (size >> r)` matches.
        self.size - (self.size >> round) + position
    }

    #[inline]
    pub fn tournament_id(&self) -> TournamentId {
        self.tournament_id
    }

    /// Returns the number of teams in the bracket.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn round_count(&self) -> usize {
        self.size.ilog2_ceil()
    }

    /// Returns all matches, sorted by round and index.
    #[inline]
    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    /// Returns the match with the given `id`.
    #[inline]
    pub fn get(&self, id: MatchId) -> Option<&Match> {
        self.index.get(&id).map(|position| &self.matches[*position])
    }

    /// Returns an iterator over all rounds, starting at the first round.
    #[inline]
    pub fn rounds(&self) -> Rounds<'_> {
        Rounds {
            matches: &self.matches,
        }
    }

    /// Returns the final match of the bracket.
    #[inline]
    pub fn final_match(&self) -> Option<&Match> {
        self.matches.last()
    }

    /// Returns the champion of the bracket. This is `None` until the final has a winner.
    #[inline]
    pub fn champion(&self) -> Option<TeamId> {
        self.final_match().and_then(|m| m.winner)
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.champion().is_some()
    }

    /// Records the result of the match `id` and moves the winner into the next match.
    ///
    /// The team with the higher score wins. A tie is decided using `chance`. Recording the
    /// result of a match again overwrites the previous result.
    ///
    /// Only the next match is updated, it is never scored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no match with `id` exists and [`Error::MatchNotReady`] if
    /// the teams of the match are not known yet. If the result would change the winner of the
    /// match and the next match was already decided, [`Error::DownstreamDecided`] is returned.
    /// The bracket is never changed when an error is returned.
    pub fn record_result<C>(
        &mut self,
        id: MatchId,
        score1: u32,
        score2: u32,
        chance: &mut C,
    ) -> Result<Propagation>
    where
        C: Chance + ?Sized,
    {
        let position = *self.index.get(&id).ok_or(Error::NotFound(id))?;
        let r#match = &self.matches[position];

        let (first, second) = match r#match.entrants {
            [EntrantSpot::Entrant(first), EntrantSpot::Entrant(second)] => (first, second),
            _ => return Err(Error::MatchNotReady(id)),
        };

        let winner = match score1.cmp(&score2) {
            Ordering::Greater => first,
            Ordering::Less => second,
            Ordering::Equal => match chance.pick() {
                Slot::First => first,
                Slot::Second => second,
            },
        };

        let next = match r#match.next {
            Some(link) => {
                let target = *self.index.get(&link.match_id).ok_or(Error::InvalidLink {
                    id,
                    target: link.match_id,
                })?;

                let next_match = &self.matches[target];
                if next_match.is_decided() && next_match.spot(link.slot).entrant() != Some(&winner)
                {
                    return Err(Error::DownstreamDecided(next_match.id));
                }

                Some((target, link))
            }
            None => None,
        };

        log::debug!(
            "Match {} ended {}:{}, winner is team {}",
            id,
            score1,
            score2,
            winner
        );

        let r#match = &mut self.matches[position];
        r#match.scores = [Some(score1), Some(score2)];
        r#match.winner = Some(winner);

        if let Some((target, link)) = next {
            log::debug!("Next match is {} (slot {})", link.match_id, link.slot.to_u8());

            *self.matches[target].spot_mut(link.slot) = EntrantSpot::Entrant(winner);
        }

        Ok(Propagation {
            id,
            winner,
            next: next.map(|(_, link)| link),
        })
    }
}

/// The changes made by [`Bracket::record_result`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Propagation {
    /// The match that was scored.
    pub id: MatchId,
    pub winner: TeamId,
    /// The spot the winner was moved into, if the match was not the final.
    pub next: Option<ForwardLink>,
}

impl Propagation {
    /// Returns the ids of all matches that were changed.
    pub fn changed(&self) -> impl Iterator<Item = MatchId> {
        std::iter::once(self.id).chain(self.next.map(|link| link.match_id))
    }
}

/// An iterator over the rounds of a [`Bracket`]. Every item contains all matches of a round,
/// ordered by their index.
#[derive(Clone, Debug)]
pub struct Rounds<'a> {
    matches: &'a [Match],
}

impl<'a> Iterator for Rounds<'a> {
    type Item = &'a [Match];

    fn next(&mut self) -> Option<Self::Item> {
        let round = self.matches.first()?.round;

        let end = self
            .matches
            .iter()
            .position(|m| m.round != round)
            .unwrap_or(self.matches.len());

        let (head, tail) = self.matches.split_at(end);
        self.matches = tail;
        Some(head)
    }
}

impl<'a> FusedIterator for Rounds<'a> {}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::{Bracket, Propagation};
    use crate::tests::{ids, Scripted};
    use crate::{teams, BracketBuilder, EntrantSpot, Error, ForwardLink, Match, MatchId, Slot};
    use crate::{TeamId, TournamentId};

    const A: TeamId = TeamId(1);
    const B: TeamId = TeamId(2);
    const C: TeamId = TeamId(3);
    const D: TeamId = TeamId(4);

    /// Builds the bracket `(C vs A), (D vs B)` with the ids 1, 2 and the final 3.
    fn bracket(chance: &mut Scripted) -> Bracket {
        BracketBuilder::new(TournamentId(1), 4)
            .unwrap()
            .build(teams![1, 2, 3, 4], chance, ids(1))
            .unwrap()
    }

    #[test]
    fn test_record_result_first_wins() {
        let mut chance = Scripted::new(vec![2, 0, 3, 1]);
        let mut bracket = bracket(&mut chance);

        let res = bracket.record_result(MatchId(1), 2, 1, &mut chance).unwrap();
        assert_eq!(
            res,
            Propagation {
                id: MatchId(1),
                winner: C,
                next: Some(ForwardLink {
                    match_id: MatchId(3),
                    slot: Slot::First,
                }),
            }
        );
        assert_eq!(res.changed().collect::<Vec<_>>(), [MatchId(1), MatchId(3)]);

        let m = bracket.get(MatchId(1)).unwrap();
        assert_eq!(m.scores, [Some(2), Some(1)]);
        assert_eq!(m.winner, Some(C));

        let next = bracket.get(MatchId(3)).unwrap();
        assert_eq!(next.entrants, [EntrantSpot::Entrant(C), EntrantSpot::TBD]);
        assert_eq!(next.winner, None);
        assert_eq!(next.scores, [None, None]);
    }

    #[test]
    fn test_record_result_second_wins() {
        let mut chance = Scripted::new(vec![2, 0, 3, 1]);
        let mut bracket = bracket(&mut chance);

        let res = bracket.record_result(MatchId(2), 0, 3, &mut chance).unwrap();
        assert_eq!(res.winner, B);

        let next = bracket.get(MatchId(3)).unwrap();
        assert_eq!(next.entrants, [EntrantSpot::TBD, EntrantSpot::Entrant(B)]);
    }

    #[test]
    fn test_record_result_not_ready() {
        let mut chance = Scripted::new(vec![0, 1, 2, 3]);
        let mut bracket = bracket(&mut chance);
        let before = bracket.matches().to_vec();

        assert_eq!(
            bracket
                .record_result(MatchId(3), 1, 0, &mut chance)
                .unwrap_err(),
            Error::MatchNotReady(MatchId(3))
        );

        // Only one slot filled.
        bracket.record_result(MatchId(1), 1, 0, &mut chance).unwrap();
        let before_second = bracket.matches().to_vec();
        assert_ne!(before, before_second);

        assert_eq!(
            bracket
                .record_result(MatchId(3), 1, 0, &mut chance)
                .unwrap_err(),
            Error::MatchNotReady(MatchId(3))
        );
        assert_eq!(bracket.matches(), before_second);
    }

    #[test]
    fn test_record_result_not_found() {
        let mut chance = Scripted::new(vec![0, 1, 2, 3]);
        let mut bracket = bracket(&mut chance);

        assert_eq!(
            bracket
                .record_result(MatchId(99), 1, 0, &mut chance)
                .unwrap_err(),
            Error::NotFound(MatchId(99))
        );
    }

    #[test]
    fn test_record_result_tie() {
        let mut chance = Scripted::new(vec![0, 1, 2, 3]).pick(Slot::Second);
        let mut bracket = bracket(&mut chance);

        let res = bracket.record_result(MatchId(1), 1, 1, &mut chance).unwrap();
        assert_eq!(res.winner, B);
        assert_eq!(
            bracket.get(MatchId(3)).unwrap().entrants,
            [EntrantSpot::Entrant(B), EntrantSpot::TBD]
        );

        // A seeded rng always picks one of the two teams.
        for seed in 0..32 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut bracket = bracket.clone();

            let res = bracket.record_result(MatchId(2), 4, 4, &mut rng).unwrap();
            assert!(res.winner == C || res.winner == D);
            assert_eq!(
                *bracket.get(MatchId(3)).unwrap().spot(Slot::Second),
                EntrantSpot::Entrant(res.winner)
            );
        }
    }

    #[test]
    fn test_record_result_overwrite() {
        let mut chance = Scripted::new(vec![0, 1, 2, 3]);
        let mut bracket = bracket(&mut chance);

        bracket.record_result(MatchId(1), 3, 0, &mut chance).unwrap();
        bracket.record_result(MatchId(1), 0, 3, &mut chance).unwrap();

        let m = bracket.get(MatchId(1)).unwrap();
        assert_eq!(m.scores, [Some(0), Some(3)]);
        assert_eq!(m.winner, Some(B));
        assert_eq!(
            *bracket.get(MatchId(3)).unwrap().spot(Slot::First),
            EntrantSpot::Entrant(B)
        );
    }

    #[test]
    fn test_record_result_downstream_decided() {
        // (A vs B), (C vs D)
        let mut chance = Scripted::new(vec![0, 1, 2, 3]);
        let mut bracket = bracket(&mut chance);

        bracket.record_result(MatchId(1), 2, 0, &mut chance).unwrap();
        bracket.record_result(MatchId(2), 2, 0, &mut chance).unwrap();
        bracket.record_result(MatchId(3), 1, 0, &mut chance).unwrap();
        assert_eq!(bracket.champion(), Some(A));

        let before = bracket.matches().to_vec();

        // Changing the winner of a match whose next match is decided is rejected.
        assert_eq!(
            bracket
                .record_result(MatchId(1), 0, 2, &mut chance)
                .unwrap_err(),
            Error::DownstreamDecided(MatchId(3))
        );
        assert_eq!(bracket.matches(), before);

        // Correcting the score without changing the winner is fine.
        bracket.record_result(MatchId(1), 5, 1, &mut chance).unwrap();
        assert_eq!(bracket.get(MatchId(1)).unwrap().scores, [Some(5), Some(1)]);
        assert_eq!(bracket.champion(), Some(A));
    }

    #[test]
    fn test_end_to_end() {
        // [A, B, C, D] => [C, A, D, B]
        let mut chance = Scripted::new(vec![2, 0, 3, 1]);
        let mut bracket = bracket(&mut chance);

        let rounds: Vec<_> = bracket.rounds().collect();
        assert_eq!(rounds.len(), 2);
        assert_eq!(rounds[0].len(), 2);
        assert_eq!(rounds[1].len(), 1);

        assert_eq!(
            rounds[0][0].entrants,
            [EntrantSpot::Entrant(C), EntrantSpot::Entrant(A)]
        );
        assert_eq!(rounds[0][0].index, 1);
        assert_eq!(
            rounds[0][1].entrants,
            [EntrantSpot::Entrant(D), EntrantSpot::Entrant(B)]
        );
        assert_eq!(rounds[0][1].index, 2);
        assert_eq!(rounds[1][0].entrants, [EntrantSpot::TBD, EntrantSpot::TBD]);
        assert_eq!(rounds[1][0].index, 1);

        let final_id = rounds[1][0].id;
        assert_eq!(
            rounds[0][0].next,
            Some(ForwardLink {
                match_id: final_id,
                slot: Slot::First
            })
        );
        assert_eq!(
            rounds[0][1].next,
            Some(ForwardLink {
                match_id: final_id,
                slot: Slot::Second
            })
        );

        bracket.record_result(MatchId(1), 2, 1, &mut chance).unwrap();
        assert_eq!(bracket.get(MatchId(1)).unwrap().winner, Some(C));
        assert_eq!(bracket.champion(), None);

        bracket.record_result(MatchId(2), 0, 3, &mut chance).unwrap();
        assert_eq!(bracket.get(MatchId(2)).unwrap().winner, Some(B));
        assert_eq!(
            bracket.get(final_id).unwrap().entrants,
            [EntrantSpot::Entrant(C), EntrantSpot::Entrant(B)]
        );

        let res = bracket
            .record_result(final_id, 1, 1, &mut StdRng::seed_from_u64(3))
            .unwrap();
        assert!(res.winner == C || res.winner == B);
        assert_eq!(res.next, None);
        assert_eq!(bracket.champion(), Some(res.winner));
        assert!(bracket.is_complete());
    }

    #[test]
    fn test_resume() {
        let mut chance = Scripted::new(vec![0, 1, 2, 3, 4, 5, 6, 7]);
        let original = BracketBuilder::new(TournamentId(1), 8)
            .unwrap()
            .build(teams![1, 2, 3, 4, 5, 6, 7, 8], &mut chance, ids(1))
            .unwrap();

        let mut matches = original.matches().to_vec();
        matches.reverse();

        let bracket = Bracket::resume(TournamentId(1), 8, matches).unwrap();
        assert_eq!(bracket.matches(), original.matches());
        assert_eq!(bracket.get(MatchId(7)).unwrap().round, 3);

        let mut matches = original.matches().to_vec();
        matches.pop();
        assert_eq!(
            Bracket::resume(TournamentId(1), 8, matches).unwrap_err(),
            Error::InvalidNumberOfMatches {
                expected: 7,
                found: 6
            }
        );

        let mut matches = original.matches().to_vec();
        matches[0].next = Some(ForwardLink {
            match_id: MatchId(7),
            slot: Slot::First,
        });
        assert_eq!(
            Bracket::resume(TournamentId(1), 8, matches).unwrap_err(),
            Error::InvalidLink {
                id: MatchId(1),
                target: MatchId(7)
            }
        );

        assert_eq!(
            Bracket::resume(TournamentId(1), 6, Vec::<Match>::new()).unwrap_err(),
            Error::InvalidSize(6)
        );
    }

    #[test]
    fn test_resume_invalid_shape() {
        let mut chance = Scripted::new(vec![0, 1, 2, 3]);
        let original = bracket(&mut chance);

        // Both semi-finals feed the first slot of the final.
        let mut matches = original.matches().to_vec();
        matches[1].next = Some(ForwardLink {
            match_id: MatchId(3),
            slot: Slot::First,
        });
        assert_eq!(
            Bracket::resume(TournamentId(1), 4, matches).unwrap_err(),
            Error::InvalidLink {
                id: MatchId(2),
                target: MatchId(3)
            }
        );

        let mut matches = original.matches().to_vec();
        matches[2].tournament_id = TournamentId(99);
        assert_eq!(
            Bracket::resume(TournamentId(1), 4, matches).unwrap_err(),
            Error::ForeignMatch {
                id: MatchId(3),
                tournament_id: TournamentId(99)
            }
        );

        let mut matches = original.matches().to_vec();
        matches[0].next = None;
        assert_eq!(
            Bracket::resume(TournamentId(1), 4, matches).unwrap_err(),
            Error::MissingLink(MatchId(1))
        );

        let mut matches = original.matches().to_vec();
        matches[2].next = Some(ForwardLink {
            match_id: MatchId(1),
            slot: Slot::First,
        });
        assert_eq!(
            Bracket::resume(TournamentId(1), 4, matches).unwrap_err(),
            Error::InvalidLink {
                id: MatchId(3),
                target: MatchId(1)
            }
        );

        let mut matches = original.matches().to_vec();
        matches[1].index = 1;
        assert_eq!(
            Bracket::resume(TournamentId(1), 4, matches).unwrap_err(),
            Error::InvalidPosition(MatchId(2))
        );

        let mut matches = original.matches().to_vec();
        matches[1].id = MatchId(1);
        assert_eq!(
            Bracket::resume(TournamentId(1), 4, matches).unwrap_err(),
            Error::InvalidPosition(MatchId(1))
        );
    }

    #[test]
    fn test_resume_and_finish() {
        let mut chance = Scripted::new(vec![2, 0, 3, 1]).pick(Slot::Second);
        let original = bracket(&mut chance);

        let mut bracket =
            Bracket::resume(TournamentId(1), 4, original.matches().to_vec()).unwrap();
        assert_eq!(bracket.tournament_id(), TournamentId(1));

        bracket.record_result(MatchId(1), 2, 1, &mut chance).unwrap();
        bracket.record_result(MatchId(2), 0, 3, &mut chance).unwrap();

        let mut bracket = Bracket::resume(TournamentId(1), 4, bracket.matches().to_vec()).unwrap();
        bracket.record_result(MatchId(3), 1, 1, &mut chance).unwrap();
        assert_eq!(bracket.champion(), Some(B));
    }

    #[test]
    fn test_rounds() {
        let bracket = Bracket::new_unchecked(TournamentId(1), 2, Vec::new());
        assert_eq!(bracket.rounds().count(), 0);
        assert_eq!(bracket.champion(), None);

        let mut chance = Scripted::new(vec![1, 0]);
        let mut bracket = BracketBuilder::new(TournamentId(1), 2)
            .unwrap()
            .build(teams![1, 2], &mut chance, ids(1))
            .unwrap();

        assert_eq!(bracket.rounds().count(), 1);
        assert_eq!(bracket.final_match().unwrap().next, None);

        bracket.record_result(MatchId(1), 0, 1, &mut chance).unwrap();
        assert_eq!(bracket.champion(), Some(A));
    }
}
