use super::card::Card;
use super::hand::Hand;

/// A player's two private cards, stored high card first.
///
/// Ordering is canonicalized at construction so `(As, Kd)` and `(Kd, As)`
/// compare and hash identically.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Hole {
    hi: Card,
    lo: Card,
}

impl Hole {
    pub fn hi(&self) -> Card {
        self.hi
    }
    pub fn lo(&self) -> Card {
        self.lo
    }
    pub fn suited(&self) -> bool {
        self.hi.suit() == self.lo.suit()
    }
    pub fn paired(&self) -> bool {
        self.hi.rank() == self.lo.rank()
    }
}

impl From<(Card, Card)> for Hole {
    fn from((a, b): (Card, Card)) -> Self {
        debug_assert!(a != b);
        if a > b {
            Self { hi: a, lo: b }
        } else {
            Self { hi: b, lo: a }
        }
    }
}

impl From<Hole> for Hand {
    fn from(hole: Hole) -> Self {
        Hand::from(hole.hi).add(hole.lo)
    }
}

impl TryFrom<&str> for Hole {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match Card::parse(s)?.as_slice() {
            &[a, b] if a != b => Ok(Self::from((a, b))),
            _ => Err(format!("expected two distinct cards: {}", s)),
        }
    }
}

impl std::fmt::Display for Hole {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} {}", self.hi, self.lo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_insensitive() {
        let a = Card::try_from("As").unwrap();
        let k = Card::try_from("Kd").unwrap();
        assert_eq!(Hole::from((a, k)), Hole::from((k, a)));
    }

    #[test]
    fn classifies_suited_and_paired() {
        assert!(Hole::try_from("Ah Kh").unwrap().suited());
        assert!(!Hole::try_from("Ah Kd").unwrap().suited());
        assert!(Hole::try_from("Ah Ad").unwrap().paired());
    }
}
