//! Starting words for new chains.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Supplies the word that seeds each chain.
pub trait WordSource: Send {
    fn next_word(&mut self) -> String;
}

const WORDS: &[&str] = &[
    "airplane", "alligator", "anchor", "astronaut", "backpack", "balloon", "banana", "bathtub",
    "beard", "beehive", "bicycle", "binoculars", "birthday cake", "blender", "bowling", "broom",
    "bulldozer", "butterfly", "cactus", "campfire", "candle", "cannon", "carousel", "castle",
    "caterpillar", "chandelier", "chimney", "circus", "cloud", "compass", "cowboy", "crab",
    "crown", "cupcake", "dentist", "dinosaur", "dragon", "drum", "eclipse", "elephant",
    "escalator", "fireworks", "fishbowl", "flamingo", "fountain", "garden gnome", "ghost",
    "giraffe", "glasses", "hammock", "haunted house", "hedgehog", "helicopter", "igloo",
    "jellyfish", "juggler", "kangaroo", "ketchup", "kite", "ladder", "lawnmower", "lighthouse",
    "lobster", "magician", "mermaid", "microscope", "mummy", "mushroom", "ninja", "octopus",
    "origami", "owl", "paintbrush", "parachute", "peacock", "penguin", "piano", "pirate",
    "pizza", "popcorn", "pyramid", "rainbow", "robot", "rocket", "roller coaster", "sandcastle",
    "scarecrow", "seesaw", "shark", "skateboard", "snowman", "spaghetti", "spider web",
    "submarine", "sunflower", "surfer", "teapot", "telescope", "tornado", "tractor",
    "treasure chest", "trampoline", "unicorn", "vampire", "volcano", "waffle", "waterfall",
    "werewolf", "windmill", "wizard", "yo-yo", "zebra", "zipper",
];

/// Picks words at random from a built-in list of easy-to-draw things.
pub struct RandomWords {
    rng: StdRng,
}

impl RandomWords {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomWords {
    fn default() -> Self {
        Self::new()
    }
}

impl WordSource for RandomWords {
    fn next_word(&mut self) -> String {
        WORDS
            .choose(&mut self.rng)
            .copied()
            .unwrap_or("doodle")
            .to_string()
    }
}

/// Hands out a fixed list of words in order, wrapping around.
pub struct FixedWords {
    words: Vec<String>,
    next: usize,
}

impl FixedWords {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            words: words.into_iter().map(Into::into).collect(),
            next: 0,
        }
    }
}

impl WordSource for FixedWords {
    fn next_word(&mut self) -> String {
        if self.words.is_empty() {
            return String::new();
        }
        let word = self.words[self.next % self.words.len()].clone();
        self.next += 1;
        word
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_words_come_from_list() {
        let mut words = RandomWords::with_seed(42);
        for _ in 0..50 {
            let word = words.next_word();
            assert!(WORDS.contains(&word.as_str()), "unexpected word {}", word);
        }
    }

    #[test]
    fn test_random_words_seeded_are_repeatable() {
        let mut a = RandomWords::with_seed(7);
        let mut b = RandomWords::with_seed(7);
        for _ in 0..10 {
            assert_eq!(a.next_word(), b.next_word());
        }
    }

    #[test]
    fn test_fixed_words_wrap() {
        let mut words = FixedWords::new(["one", "two"]);
        assert_eq!(words.next_word(), "one");
        assert_eq!(words.next_word(), "two");
        assert_eq!(words.next_word(), "one");
    }

    #[test]
    fn test_fixed_words_empty() {
        let mut words = FixedWords::new(Vec::<String>::new());
        assert_eq!(words.next_word(), "");
    }
}
