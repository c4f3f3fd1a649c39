/// Hand category, weakest to strongest.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
pub enum Ranking {
    HighCard = 0,
    OnePair,
    TwoPair,
    Trips,
    Straight,
    Flush,
    FullHouse,
    Quads,
    StraightFlush,
}

impl std::fmt::Display for Ranking {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::HighCard => "High Card",
                Self::OnePair => "One Pair",
                Self::TwoPair => "Two Pair",
                Self::Trips => "Three of a Kind",
                Self::Straight => "Straight",
                Self::Flush => "Flush",
                Self::FullHouse => "Full House",
                Self::Quads => "Four of a Kind",
                Self::StraightFlush => "Straight Flush",
            }
        )
    }
}

/// A fully-evaluated hand strength for showdown comparison.
///
/// Lexicographic order: category first, then a category-specific kicker
/// payload packed so that the derived `Ord` resolves ties correctly
/// (pair ranks above kicker masks, etc.).
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Strength {
    ranking: Ranking,
    kickers: u32,
}

impl Strength {
    pub fn ranking(&self) -> Ranking {
        self.ranking
    }
    pub fn kickers(&self) -> u32 {
        self.kickers
    }
}

impl From<(Ranking, u32)> for Strength {
    fn from((ranking, kickers): (Ranking, u32)) -> Self {
        Self { ranking, kickers }
    }
}

impl std::fmt::Display for Strength {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:<16}{:>6x}", self.ranking, self.kickers)
    }
}
