use rand::seq::SliceRandom;
use rand::Rng;

use crate::Slot;

/// The source of randomness for a bracket.
///
/// [`Chance`] is implemented for every [`Rng`]. Use a seeded rng (e.g. `StdRng::seed_from_u64`)
/// to get reproducible brackets.
pub trait Chance {
    /// Shuffles `items` in place. Every permutation should be equally likely.
    fn shuffle<T>(&mut self, items: &mut [T]);

    /// Picks one of the two slots with equal probability. This decides ties.
    fn pick(&mut self) -> Slot;
}

impl<R> Chance for R
where
    R: Rng,
{
    #[inline]
    fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(self);
    }

    #[inline]
    fn pick(&mut self) -> Slot {
        if self.gen_bool(0.5) {
            Slot::First
        } else {
            Slot::Second
        }
    }
}
