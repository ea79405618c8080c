//! Die rolls.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of die values for one room.
///
/// Every room owns its own instance. Implementations must only return
/// values in `1..=6`; anything else is rejected by the scheduler.
pub trait Dice: Send + 'static {
    fn roll(&mut self) -> u8;
}

/// Fair six-sided die backed by an OS-seeded [`StdRng`].
#[derive(Debug)]
pub struct RandomDice {
    rng: StdRng,
}

impl RandomDice {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic die for reproducing a sequence.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomDice {
    fn default() -> Self {
        Self::new()
    }
}

impl Dice for RandomDice {
    fn roll(&mut self) -> u8 {
        self.rng.random_range(1..=6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_dice_stays_in_range() {
        let mut dice = RandomDice::new();
        for _ in 0..1_000 {
            let v = dice.roll();
            assert!((1..=6).contains(&v), "rolled {v}");
        }
    }

    #[test]
    fn test_seeded_dice_repeat() {
        let mut a = RandomDice::seeded(42);
        let mut b = RandomDice::seeded(42);
        let xs: Vec<u8> = (0..20).map(|_| a.roll()).collect();
        let ys: Vec<u8> = (0..20).map(|_| b.roll()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_random_dice_hits_every_face() {
        let mut dice = RandomDice::seeded(7);
        let mut seen = [false; 6];
        for _ in 0..600 {
            seen[usize::from(dice.roll() - 1)] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }
}
