use crate::error::{
    Error,
    Result,
};
use alloy::primitives::U256;
use rand::Rng;
use std::{
    fmt,
    str::FromStr,
};

pub const ALPHABET: [char; 16] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f',
];

/// One lowercase hexadecimal symbol, the unit a bet is placed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Guess(char);

impl Guess {
    pub fn new(symbol: char) -> Result<Self> {
        if ALPHABET.contains(&symbol) {
            Ok(Self(symbol))
        } else {
            Err(Error::InvalidGuess(symbol.to_string()))
        }
    }

    pub fn random(rng: &mut impl Rng) -> Self {
        Self(ALPHABET[rng.random_range(0..ALPHABET.len())])
    }

    pub fn as_char(self) -> char {
        self.0
    }
}

impl FromStr for Guess {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(symbol), None) => Self::new(symbol),
            _ => Err(Error::InvalidGuess(s.to_string())),
        }
    }
}

impl fmt::Display for Guess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuessMode {
    Manual(Guess),
    Random,
}

impl GuessMode {
    /// Guess for the next iteration; random mode draws independently each time.
    pub fn pick(&self, rng: &mut impl Rng) -> Guess {
        match self {
            GuessMode::Manual(guess) => *guess,
            GuessMode::Random => Guess::random(rng),
        }
    }
}

impl fmt::Display for GuessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuessMode::Manual(guess) => write!(f, "manual (guess {guess})"),
            GuessMode::Random => write!(f, "random"),
        }
    }
}

/// A single bet as it will be submitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BetRequest {
    pub guess: Guess,
    pub amount: U256,
}
