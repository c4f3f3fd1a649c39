use super::card::Card;
use super::rank::Rank;
use super::suit::Suit;

/// An unordered set of cards as a 52-bit mask.
///
/// Bit `i` is set when card `i` is present. Union, difference, and membership
/// are single instructions, which matters in the Monte Carlo rollout loops.
#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hand(u64);

impl Hand {
    /// Mask with every card in the deck present.
    pub const fn mask() -> u64 {
        (1 << Card::COUNT) - 1
    }
    pub const fn empty() -> Self {
        Self(0)
    }
    pub const fn full() -> Self {
        Self(Self::mask())
    }
    pub fn size(&self) -> usize {
        self.0.count_ones() as usize
    }
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
    pub fn contains(&self, card: &Card) -> bool {
        self.0 & u64::from(*card) != 0
    }
    pub fn add(self, card: Card) -> Self {
        Self(self.0 | u64::from(card))
    }
    pub fn remove(self, card: Card) -> Self {
        Self(self.0 & !u64::from(card))
    }
    /// Set union.
    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
    /// Cards in `self` but not `other`.
    pub fn minus(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
    /// True when the two sets share a card.
    pub fn collides(&self, other: &Self) -> bool {
        self.0 & other.0 != 0
    }
    /// 13-bit mask of ranks present.
    pub fn ranks(&self) -> u16 {
        self.into_iter()
            .fold(0u16, |m, c| m | (1 << u8::from(c.rank())))
    }
    /// Count of cards per rank.
    pub fn rank_counts(&self) -> [u8; Rank::COUNT] {
        self.into_iter().fold([0u8; Rank::COUNT], |mut m, c| {
            m[u8::from(c.rank()) as usize] += 1;
            m
        })
    }
    /// 13-bit rank mask per suit.
    pub fn suit_ranks(&self) -> [u16; Suit::COUNT] {
        self.into_iter().fold([0u16; Suit::COUNT], |mut m, c| {
            m[u8::from(c.suit()) as usize] |= 1 << u8::from(c.rank());
            m
        })
    }
}

impl From<Hand> for u64 {
    fn from(hand: Hand) -> Self {
        hand.0
    }
}
impl From<u64> for Hand {
    fn from(mask: u64) -> Self {
        Self(mask & Self::mask())
    }
}
impl From<Card> for Hand {
    fn from(card: Card) -> Self {
        Self(u64::from(card))
    }
}
impl FromIterator<Card> for Hand {
    fn from_iter<I: IntoIterator<Item = Card>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::add)
    }
}

impl IntoIterator for Hand {
    type Item = Card;
    type IntoIter = HandIter;
    fn into_iter(self) -> Self::IntoIter {
        HandIter(self.0)
    }
}

/// Iterates cards in ascending (rank, suit) order.
pub struct HandIter(u64);
impl Iterator for HandIter {
    type Item = Card;
    fn next(&mut self) -> Option<Self::Item> {
        if self.0 == 0 {
            None
        } else {
            let i = self.0.trailing_zeros() as u8;
            self.0 &= self.0 - 1;
            Some(Card::from(i))
        }
    }
}

impl TryFrom<&str> for Hand {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Card::parse(s).map(|cards| cards.into_iter().collect())
    }
}
impl TryFrom<String> for Hand {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::try_from(s.as_str())
    }
}
impl From<Hand> for String {
    fn from(hand: Hand) -> Self {
        hand.to_string()
    }
}

impl std::fmt::Display for Hand {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut cards = self.into_iter().peekable();
        while let Some(card) = cards.next() {
            write!(f, "{}", card)?;
            if cards.peek().is_some() {
                write!(f, " ")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_remove_round_trip() {
        let card = Card::try_from("Qh").unwrap();
        let hand = Hand::empty().add(card);
        assert!(hand.contains(&card));
        assert!(hand.remove(card).is_empty());
    }

    #[test]
    fn bijective_str() {
        let hand = Hand::try_from("2c Th As").unwrap();
        assert_eq!(hand, Hand::try_from(hand.to_string().as_str()).unwrap());
        assert_eq!(hand.size(), 3);
    }

    #[test]
    fn minus_removes_collisions() {
        let a = Hand::try_from("2c 3c 4c").unwrap();
        let b = Hand::try_from("3c").unwrap();
        assert!(a.collides(&b));
        assert_eq!(a.minus(b).size(), 2);
        assert!(!a.minus(b).collides(&b));
    }

    #[test]
    fn rank_counts_sees_pairs() {
        let hand = Hand::try_from("Ah As 2c").unwrap();
        assert_eq!(hand.rank_counts()[u8::from(Rank::Ace) as usize], 2);
    }
}
