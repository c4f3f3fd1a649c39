use super::card::Card;
use super::hand::Hand;
use super::hole::Hole;
use super::street::Street;
use rand::rngs::SmallRng;

/// A mutable deck of cards supporting seeded random draws.
///
/// Draws take the RNG explicitly so Monte Carlo rollouts and task-level hand
/// sampling stay reproducible from a seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deck(Hand);

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}

impl Deck {
    /// A fresh 52-card deck.
    pub fn new() -> Self {
        Self(Hand::full())
    }
    /// A deck with the given cards already dealt out.
    pub fn without(dead: Hand) -> Self {
        Self(Hand::full().minus(dead))
    }
    pub fn size(&self) -> usize {
        self.0.size()
    }
    pub fn contains(&self, card: &Card) -> bool {
        self.0.contains(card)
    }
    /// Draws and removes a uniformly random card.
    pub fn draw(&mut self, rng: &mut SmallRng) -> Card {
        debug_assert!(self.0.size() > 0);
        let i = rand::Rng::random_range(rng, 0..self.0.size());
        let card = self
            .0
            .into_iter()
            .nth(i)
            .expect("index within deck size");
        self.0 = self.0.remove(card);
        card
    }
    /// Deals the cards revealed when the given street arrives.
    pub fn deal(&mut self, street: Street, rng: &mut SmallRng) -> Hand {
        (0..street.n_revealed())
            .map(|_| self.draw(rng))
            .collect()
    }
    /// Deals two cards as a player's hole cards.
    pub fn hole(&mut self, rng: &mut SmallRng) -> Hole {
        let a = self.draw(rng);
        let b = self.draw(rng);
        Hole::from((a, b))
    }
}

impl From<Deck> for Hand {
    fn from(deck: Deck) -> Self {
        deck.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn draws_are_distinct() {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut deck = Deck::new();
        let mut seen = Hand::empty();
        for _ in 0..52 {
            let card = deck.draw(&mut rng);
            assert!(!seen.contains(&card));
            seen = seen.add(card);
        }
        assert_eq!(seen, Hand::full());
    }

    #[test]
    fn draws_are_reproducible() {
        let a = Deck::new().draw(&mut SmallRng::seed_from_u64(42));
        let b = Deck::new().draw(&mut SmallRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn without_excludes_dead_cards() {
        let dead = Hand::try_from("As Ks Qs").unwrap();
        let deck = Deck::without(dead);
        assert_eq!(deck.size(), 49);
        assert!(!deck.contains(&Card::try_from("As").unwrap()));
    }
}
