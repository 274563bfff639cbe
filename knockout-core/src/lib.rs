//! # knockout-core
//!
//! This crate contains the engine behind single elimination brackets: building the bracket from
//! a list of teams and moving the winners of finished matches forward until a champion is found.
//!
//! Important types:
//! - [`BracketBuilder`]: Creates a new, randomly paired [`Bracket`] for a fixed power-of-two size.
//! - [`Bracket`]: An arena of all [`Match`]es of a tournament, indexed by [`MatchId`]. Results are
//! recorded using [`Bracket::record_result`].
//! - [`Match`]: A match between two teams. Every match except the final has a [`ForwardLink`]
//! to the match its winner advances into.
//! - [`EntrantSpot`]: A *spot* within a match, which either contains a team or is still
//! to-be-decided.
//! - [`Chance`]: The source of randomness used for pairing and tie-breaks.
//! - [`render::BracketView`]: A read-only, ordered projection of a bracket that can be exported.
//!
//! ## Feature Flags
//!
//! `serde`: Adds `Serialize` and `Deserialize` impls to almost all types.
//!
mod bracket;
mod builder;
mod chance;
pub mod render;
mod utils;

pub use bracket::{Bracket, Propagation, Rounds};
pub use builder::BracketBuilder;
pub use chance::Chance;

use chrono::{DateTime, Utc};
use thiserror::Error;

use std::fmt::{self, Display, Formatter};
use std::result;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

macro_rules! id {
    ($name:ident, $id:ty) => {
        #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        #[repr(transparent)]
        pub struct $name(pub $id);

        impl Display for $name {
            #[inline]
            fn fmt(&self, f: &mut Formatter) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl AsRef<$id> for $name {
            #[inline]
            fn as_ref(&self) -> &$id {
                &self.0
            }
        }

        impl From<$id> for $name {
            #[inline]
            fn from(id: $id) -> Self {
                Self(id)
            }
        }

        impl FromStr for $name {
            type Err = <$id as FromStr>::Err;

            #[inline]
            fn from_str(s: &str) -> result::Result<Self, Self::Err> {
                Ok(Self(s.parse::<$id>()?))
            }
        }
    };
}

id!(TournamentId, u64);
id!(TeamId, u64);
id!(MatchId, u64);

/// An `Result<T>` using [`enum@Error`] as an error type.
pub type Result<T> = result::Result<T, Error>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("invalid bracket size {0}: must be a power of two of at least 2")]
    InvalidSize(usize),
    #[error("size mismatch: expected {expected} teams, found {found}")]
    SizeMismatch { expected: usize, found: usize },
    #[error("match {0} is not ready: both teams must be known")]
    MatchNotReady(MatchId),
    #[error("match {0} not found")]
    NotFound(MatchId),
    #[error("match {0} has already been decided with the previous winner")]
    DownstreamDecided(MatchId),
    #[error("invalid number of matches: expected {expected}, found {found}")]
    InvalidNumberOfMatches { expected: usize, found: usize },
    #[error("invalid link: match {id} refers to match {target}")]
    InvalidLink { id: MatchId, target: MatchId },
    #[error("match {0} has no link to the next round")]
    MissingLink(MatchId),
    #[error("match {0} has an invalid round or index")]
    InvalidPosition(MatchId),
    #[error("match {id} belongs to tournament {tournament_id}")]
    ForeignMatch {
        id: MatchId,
        tournament_id: TournamentId,
    },
}

/// A team that can be enrolled into tournaments.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Team {
    pub id: TeamId,
    /// The unique name of the team.
    pub name: String,
    /// A reference to an image or similar displayed next to the name.
    pub asset: Option<String>,
}

impl Team {
    #[inline]
    pub fn new<T>(id: TeamId, name: T) -> Self
    where
        T: ToString,
    {
        Self {
            id,
            name: name.to_string(),
            asset: None,
        }
    }
}

/// A tournament with a fixed number of teams.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    /// The game that is played in the tournament.
    pub game: String,
    size: usize,
    pub created: DateTime<Utc>,
}

impl Tournament {
    /// Creates a new `Tournament`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSize`] if `size` is not a power of two or smaller than 2.
    pub fn new<T, U>(
        id: TournamentId,
        name: T,
        game: U,
        size: usize,
        created: DateTime<Utc>,
    ) -> Result<Self>
    where
        T: ToString,
        U: ToString,
    {
        utils::validate_size(size)?;

        Ok(Self {
            id,
            name: name.to_string(),
            game: game.to_string(),
            size,
            created,
        })
    }

    /// Returns the declared number of teams in the tournament.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }
}

/// One of the two spots in a [`Match`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "u8", try_from = "u8"))]
pub enum Slot {
    First,
    Second,
}

impl Slot {
    /// Returns the slot a match at the 0-based position `index` within its round feeds in the
    /// next round.
    #[inline]
    pub fn from_position(index: usize) -> Self {
        if index % 2 == 0 {
            Self::First
        } else {
            Self::Second
        }
    }

    /// Returns the 0-based array index of the slot.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
        }
    }

    #[inline]
    pub fn to_u8(self) -> u8 {
        match self {
            Self::First => 1,
            Self::Second => 2,
        }
    }

    #[inline]
    pub fn from_u8(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::First),
            2 => Some(Self::Second),
            _ => None,
        }
    }
}

impl From<Slot> for u8 {
    #[inline]
    fn from(slot: Slot) -> Self {
        slot.to_u8()
    }
}

impl TryFrom<u8> for Slot {
    type Error = InvalidSlot;

    #[inline]
    fn try_from(n: u8) -> result::Result<Self, Self::Error> {
        Self::from_u8(n).ok_or(InvalidSlot(n))
    }
}

#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid slot {0}: expected 1 or 2")]
pub struct InvalidSlot(pub u8);

/// The match and slot that the winner of a [`Match`] advances into.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ForwardLink {
    pub match_id: MatchId,
    pub slot: Slot,
}

/// A spot for a team in the bracket.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EntrantSpot<T> {
    Entrant(T),
    TBD,
}

impl<T> EntrantSpot<T> {
    /// Creates a new `EntrantSpot` from an [`Option`]. A `Some(T)` value will translate into
    /// a `Entrant(T)` value, a `None` value will translate into a `TBD` value.
    pub fn new(entrant: Option<T>) -> Self {
        match entrant {
            Some(entrant) => Self::Entrant(entrant),
            None => Self::TBD,
        }
    }

    /// Returns `true` if the `EntrantSpot` is [`Entrant`].
    ///
    /// # Examples
    ///
    /// ```
    /// # use knockout_core::EntrantSpot;
    /// let spot = EntrantSpot::Entrant(());
    /// assert!(spot.is_entrant());
    /// ```
    /// [`Entrant`]: Self::Entrant
    pub fn is_entrant(&self) -> bool {
        matches!(self, Self::Entrant(_))
    }

    /// Returns the entrant, or `None` if the spot is still to-be-decided.
    pub fn entrant(&self) -> Option<&T> {
        match self {
            Self::Entrant(entrant) => Some(entrant),
            Self::TBD => None,
        }
    }
}

/// A match between two teams.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Match {
    pub id: MatchId,
    pub tournament_id: TournamentId,
    /// The round of the match, starting at 1 for the first round.
    pub round: u32,
    /// The 1-based position of the match within its round.
    pub index: u32,
    pub entrants: [EntrantSpot<TeamId>; 2],
    pub scores: [Option<u32>; 2],
    pub winner: Option<TeamId>,
    /// The match the winner advances into. This is `None` for the final.
    pub next: Option<ForwardLink>,
}

impl Match {
    /// Creates a new `Match` without any results.
    pub fn new(
        id: MatchId,
        tournament_id: TournamentId,
        round: u32,
        index: u32,
        entrants: [EntrantSpot<TeamId>; 2],
    ) -> Self {
        Self {
            id,
            tournament_id,
            round,
            index,
            entrants,
            scores: [None, None],
            winner: None,
            next: None,
        }
    }

    /// Returns a reference to the spot at `slot`.
    #[inline]
    pub fn spot(&self, slot: Slot) -> &EntrantSpot<TeamId> {
        &self.entrants[slot.index()]
    }

    /// Returns a mutable reference to the spot at `slot`.
    #[inline]
    pub fn spot_mut(&mut self, slot: Slot) -> &mut EntrantSpot<TeamId> {
        &mut self.entrants[slot.index()]
    }

    #[inline]
    pub fn score(&self, slot: Slot) -> Option<u32> {
        self.scores[slot.index()]
    }

    /// Returns `true` if both teams of the match are known.
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.entrants.iter().all(EntrantSpot::is_entrant)
    }

    /// Returns `true` if the match has a recorded winner.
    #[inline]
    pub fn is_decided(&self) -> bool {
        self.winner.is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use chrono::{TimeZone, Utc};

    use super::{Chance, EntrantSpot, Error, Slot, TeamId, Tournament, TournamentId};

    #[macro_export]
    macro_rules! teams {
        ($($x:expr),*) => {
            vec![$($crate::TeamId($x)),*]
        };
    }

    /// A [`Chance`] which applies a fixed permutation and returns scripted tie-breaks.
    #[derive(Clone, Debug, Default)]
    pub struct Scripted {
        /// After shuffling, position `i` contains the item previously at `order[i]`.
        pub order: Vec<usize>,
        pub picks: VecDeque<Slot>,
    }

    impl Scripted {
        pub fn new(order: Vec<usize>) -> Self {
            Self {
                order,
                picks: VecDeque::new(),
            }
        }

        pub fn pick(mut self, slot: Slot) -> Self {
            self.picks.push_back(slot);
            self
        }
    }

    impl Chance for Scripted {
        fn shuffle<T>(&mut self, items: &mut [T]) {
            assert_eq!(items.len(), self.order.len());

            for i in 0..items.len() {
                let mut j = self.order[i];
                while j < i {
                    j = self.order[j];
                }

                items.swap(i, j);
            }
        }

        fn pick(&mut self) -> Slot {
            self.picks.pop_front().unwrap_or(Slot::First)
        }
    }

    /// Returns a sequential id generator starting at `start`.
    pub fn ids(start: u64) -> impl FnMut() -> crate::MatchId {
        let mut next = start;
        move || {
            let id = crate::MatchId(next);
            next += 1;
            id
        }
    }

    #[test]
    fn test_scripted_shuffle() {
        let mut items = vec!['A', 'B', 'C', 'D'];
        Scripted::new(vec![2, 0, 3, 1]).shuffle(&mut items);
        assert_eq!(items, ['C', 'A', 'D', 'B']);

        let mut items = vec![0, 1, 2, 3, 4, 5, 6, 7];
        Scripted::new(vec![7, 6, 5, 4, 3, 2, 1, 0]).shuffle(&mut items);
        assert_eq!(items, [7, 6, 5, 4, 3, 2, 1, 0]);

        let mut items = vec![0, 1, 2, 3];
        Scripted::new(vec![1, 2, 3, 0]).shuffle(&mut items);
        assert_eq!(items, [1, 2, 3, 0]);
    }

    #[test]
    fn test_tournament_size() {
        let created = Utc.timestamp_opt(1_650_000_000, 0).unwrap();

        for size in [2, 4, 8, 16, 64] {
            let tournament =
                Tournament::new(TournamentId(1), "Cup", "Rocket League", size, created).unwrap();
            assert_eq!(tournament.size(), size);
        }

        for size in [0, 1, 3, 6, 12, 100] {
            assert_eq!(
                Tournament::new(TournamentId(1), "Cup", "Rocket League", size, created)
                    .unwrap_err(),
                Error::InvalidSize(size)
            );
        }
    }

    #[test]
    fn test_entrant_spot() {
        let spot = EntrantSpot::new(Some(TeamId(3)));
        assert!(spot.is_entrant());
        assert_eq!(spot.entrant(), Some(&TeamId(3)));

        let spot = EntrantSpot::<TeamId>::new(None);
        assert_eq!(spot, EntrantSpot::TBD);
        assert_eq!(spot.entrant(), None);
    }

    #[test]
    fn test_slot() {
        assert_eq!(Slot::from_position(0), Slot::First);
        assert_eq!(Slot::from_position(1), Slot::Second);
        assert_eq!(Slot::from_position(6), Slot::First);
        assert_eq!(Slot::from_u8(2), Some(Slot::Second));
        assert_eq!(Slot::from_u8(0), None);
        assert_eq!(Slot::try_from(3_u8), Err(crate::InvalidSlot(3)));
        assert_eq!(u8::from(Slot::First), 1);
        assert_eq!(TeamId(5).to_string(), "5");
        assert_eq!("42".parse::<TeamId>().unwrap(), TeamId(42));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_slot_serde() {
        use serde_test::{assert_tokens, Token};

        assert_tokens(&Slot::First, &[Token::U8(1)]);
        assert_tokens(&Slot::Second, &[Token::U8(2)]);
        assert_tokens(&TeamId(7), &[Token::U64(7)]);
    }
}
