use super::card::Card;
use super::hand::Hand;
use super::street::Street;

/// The community cards: 0, 3, 4, or 5 of them.
#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Board(Hand);

impl Board {
    pub const fn empty() -> Self {
        Self(Hand::empty())
    }
    pub fn size(&self) -> usize {
        self.0.size()
    }
    pub fn contains(&self, card: &Card) -> bool {
        self.0.contains(card)
    }
    /// Adds revealed cards. Panics past a full board.
    pub fn reveal(self, cards: Hand) -> Self {
        debug_assert!(!self.0.collides(&cards));
        let next = self.0.union(cards);
        assert!(next.size() <= 5, "board overfull");
        Self(next)
    }
    /// The street implied by the number of cards showing.
    pub fn street(&self) -> Street {
        match self.size() {
            0 => Street::Pref,
            3 => Street::Flop,
            4 => Street::Turn,
            5 => Street::Rive,
            n => unreachable!("{} community cards", n),
        }
    }
    pub fn cards(&self) -> Hand {
        self.0
    }
}

impl From<Hand> for Board {
    fn from(hand: Hand) -> Self {
        debug_assert!(matches!(hand.size(), 0 | 3 | 4 | 5));
        Self(hand)
    }
}
impl From<Board> for Hand {
    fn from(board: Board) -> Self {
        board.0
    }
}

impl TryFrom<&str> for Board {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let hand = Hand::try_from(s)?;
        match hand.size() {
            0 | 3 | 4 | 5 => Ok(Self(hand)),
            n => Err(format!("a board has 0, 3, 4, or 5 cards, got {}", n)),
        }
    }
}

impl std::fmt::Display for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn street_tracks_size() {
        let board = Board::try_from("2c 7h Jd").unwrap();
        assert_eq!(board.street(), Street::Flop);
        let board = board.reveal(Hand::try_from("As").unwrap());
        assert_eq!(board.street(), Street::Turn);
    }

    #[test]
    fn rejects_invalid_sizes() {
        assert!(Board::try_from("2c 7h").is_err());
    }
}
