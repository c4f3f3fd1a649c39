use super::rank::Rank;
use super::suit::Suit;
use gto_core::Arbitrary;

/// A playing card encoded as a single byte.
///
/// The 52 cards are bijectively mapped to `0..52` as `rank * 4 + suit`,
/// which sorts cards by rank first and suit second. The rest of the
/// workspace relies on that total order.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Card(u8);

impl Card {
    pub const COUNT: usize = 52;
    /// Extracts the rank component.
    pub fn rank(&self) -> Rank {
        Rank::from(self.0 / 4)
    }
    /// Extracts the suit component.
    pub fn suit(&self) -> Suit {
        Suit::from(self.0 % 4)
    }
    /// Parses a string of concatenated two-character card notations.
    pub fn parse(s: &str) -> Result<Vec<Self>, String> {
        s.replace(char::is_whitespace, "")
            .chars()
            .collect::<Vec<_>>()
            .chunks(2)
            .map(|pair| pair.iter().collect::<String>())
            .map(|pair| Self::try_from(pair.as_str()))
            .collect()
    }
}

impl From<(Rank, Suit)> for Card {
    fn from((r, s): (Rank, Suit)) -> Self {
        Self(u8::from(r) * 4 + u8::from(s))
    }
}

/// u8 isomorphism: a card's position in the sorted deck.
impl From<Card> for u8 {
    fn from(c: Card) -> u8 {
        c.0
    }
}
impl From<u8> for Card {
    fn from(n: u8) -> Self {
        debug_assert!((n as usize) < Self::COUNT);
        Self(n)
    }
}

/// u64 representation: a single bit turned on, for set membership in `Hand`.
impl From<Card> for u64 {
    fn from(c: Card) -> u64 {
        1 << u8::from(c)
    }
}

impl TryFrom<&str> for Card {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.trim().len() {
            2 => {
                let rank = Rank::try_from(&s.trim()[0..1])?;
                let suit = Suit::try_from(&s.trim()[1..2])?;
                Ok(Card::from((rank, suit)))
            }
            _ => Err(format!("expected 2 characters: {}", s)),
        }
    }
}
impl TryFrom<String> for Card {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::try_from(s.as_str())
    }
}
impl From<Card> for String {
    fn from(c: Card) -> Self {
        c.to_string()
    }
}

impl std::fmt::Display for Card {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}{}", self.rank(), self.suit())
    }
}

impl Arbitrary for Card {
    fn random() -> Self {
        Self(rand::random_range(0..Self::COUNT as u8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bijective_rank_suit() {
        let card = Card::random();
        assert_eq!(card, Card::from((card.rank(), card.suit())));
    }

    #[test]
    fn bijective_u8() {
        let card = Card::random();
        assert_eq!(card, Card::from(u8::from(card)));
    }

    #[test]
    fn bijective_str() {
        let card = Card::random();
        assert_eq!(card, Card::try_from(card.to_string().as_str()).unwrap());
    }

    #[test]
    fn ordered_by_rank_then_suit() {
        let low = Card::try_from("2c").unwrap();
        let mid = Card::try_from("2s").unwrap();
        let high = Card::try_from("As").unwrap();
        assert!(low < mid);
        assert!(mid < high);
    }
}
