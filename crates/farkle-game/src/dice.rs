//! Where dice values come from.

use std::collections::VecDeque;
use std::fmt;

use rand::Rng;

/// A source of die faces.
///
/// Each game owns one. Production games use [`RandomDice`]; tests plug in
/// [`ScriptedDice`] to get reproducible throws.
pub trait DiceSource: Send + fmt::Debug {
    /// Rolls `count` dice, returning one face (1 to 6) per die.
    fn roll(&mut self, count: usize) -> Vec<u8>;
}

/// Fair six-sided dice, each die drawn independently.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomDice;

impl DiceSource for RandomDice {
    fn roll(&mut self, count: usize) -> Vec<u8> {
        let mut rng = rand::rng();
        (0..count).map(|_| rng.random_range(1..=6)).collect()
    }
}

/// Dice that replay a fixed sequence of faces.
///
/// Faces are consumed in order across throws. Once the script runs out
/// every die shows 2, which never scores.
#[derive(Debug, Default, Clone)]
pub struct ScriptedDice {
    faces: VecDeque<u8>,
}

impl ScriptedDice {
    pub fn new(faces: impl IntoIterator<Item = u8>) -> Self {
        Self {
            faces: faces.into_iter().collect(),
        }
    }

    /// Number of scripted faces not yet rolled.
    pub fn remaining(&self) -> usize {
        self.faces.len()
    }
}

impl DiceSource for ScriptedDice {
    fn roll(&mut self, count: usize) -> Vec<u8> {
        (0..count)
            .map(|_| self.faces.pop_front().unwrap_or(2))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_dice_faces_in_range() {
        let mut dice = RandomDice;
        let faces = dice.roll(600);
        assert_eq!(faces.len(), 600);
        assert!(faces.iter().all(|f| (1..=6).contains(f)));
    }

    #[test]
    fn test_random_dice_zero_count() {
        assert!(RandomDice.roll(0).is_empty());
    }

    #[test]
    fn test_scripted_dice_consumes_across_throws() {
        let mut dice = ScriptedDice::new([1, 5, 3, 4, 6]);
        assert_eq!(dice.roll(2), vec![1, 5]);
        assert_eq!(dice.roll(2), vec![3, 4]);
        assert_eq!(dice.remaining(), 1);
    }

    #[test]
    fn test_scripted_dice_exhausted_rolls_twos() {
        let mut dice = ScriptedDice::new([1]);
        assert_eq!(dice.roll(3), vec![1, 2, 2]);
    }
}
