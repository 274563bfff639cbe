use crate::utils::{validate_size, NumExt};
use crate::{Bracket, Chance, EntrantSpot, Error, ForwardLink, Match, MatchId, Result, Slot};
use crate::{TeamId, TournamentId};

/// Builds new [`Bracket`]s for a fixed number of teams.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BracketBuilder {
    tournament_id: TournamentId,
    size: usize,
}

impl BracketBuilder {
    /// Creates a new `BracketBuilder` for the tournament `tournament_id` with `size` teams.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSize`] if `size` is not a power of two or smaller than 2.
    pub fn new(tournament_id: TournamentId, size: usize) -> Result<Self> {
        validate_size(size)?;

        Ok(Self {
            tournament_id,
            size,
        })
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the number of rounds of the bracket.
    #[inline]
    pub fn round_count(&self) -> usize {
        self.size.ilog2_ceil()
    }

    /// Builds a new bracket from `teams`.
    ///
    /// The teams are shuffled using `chance` and paired in order for the first round. All
    /// following rounds are created without any teams. `next_id` is called once for every match
    /// in the bracket, before any links between the matches are computed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SizeMismatch`] if the number of `teams` is not equal to the size of the
    /// bracket. `next_id` is never called in that case.
    pub fn build<C, F>(
        &self,
        mut teams: Vec<TeamId>,
        chance: &mut C,
        mut next_id: F,
    ) -> Result<Bracket>
    where
        C: Chance + ?Sized,
        F: FnMut() -> MatchId,
    {
        if teams.len() != self.size {
            return Err(Error::SizeMismatch {
                expected: self.size,
                found: teams.len(),
            });
        }

        log::debug!(
            "Creating new bracket for tournament {} with {} teams",
            self.tournament_id,
            teams.len()
        );

        chance.shuffle(&mut teams);

        let mut matches = Vec::with_capacity(self.size - 1);

        for (index, pair) in teams.chunks_exact(2).enumerate() {
            matches.push(Match::new(
                next_id(),
                self.tournament_id,
                1,
                index as u32 + 1,
                [EntrantSpot::Entrant(pair[0]), EntrantSpot::Entrant(pair[1])],
            ));
        }

        // Offset of the first match of every round in `matches`.
        let mut offsets = vec![0];

        let mut num_matches = self.size / 2;
        for round in 2..=self.round_count() {
            offsets.push(matches.len());
            num_matches /= 2;

            for index in 0..num_matches {
                matches.push(Match::new(
                    next_id(),
                    self.tournament_id,
                    round as u32,
                    index as u32 + 1,
                    [EntrantSpot::TBD, EntrantSpot::TBD],
                ));
            }
        }

        // Link every match to the next round. The final has no following round.
        for window in offsets.windows(2) {
            let (start, next_start) = (window[0], window[1]);

            for position in 0..next_start - start {
                let target = matches[next_start + position / 2].id;

                matches[start + position].next = Some(ForwardLink {
                    match_id: target,
                    slot: Slot::from_position(position),
                });
            }
        }

        log::debug!("Created new bracket with {} matches", matches.len());

        // `matches` is sorted by round and index and every link targets the following round.
        Ok(Bracket::new_unchecked(self.tournament_id, self.size, matches))
    }
}
