use gto_cards::Hole;
use gto_core::*;

/// A player's betting status within a hand.
///
/// - `Betting` — active and still making decisions
/// - `Shoving` — all-in, in the pot but out of decisions
/// - `Folding` — out of the hand
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub enum SeatState {
    Betting,
    Shoving,
    Folding,
}

impl SeatState {
    /// Still competing for the pot.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Betting | Self::Shoving)
    }
    /// Can still be asked to act.
    pub fn is_actable(&self) -> bool {
        matches!(self, Self::Betting)
    }
}

/// A player's state at the table.
///
/// `cards` is optional: abstract states used for tree shaping carry no private
/// cards, and the engine deals them in before traversal.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Seat {
    state: SeatState,
    stack: Chips,
    stake: Chips,
    spent: Chips,
    cards: Option<Hole>,
}

impl Seat {
    pub fn new(stack: Chips) -> Self {
        Self {
            state: SeatState::Betting,
            stack,
            stake: 0,
            spent: 0,
            cards: None,
        }
    }
    /// Chips behind, not yet committed.
    pub fn stack(&self) -> Chips {
        self.stack
    }
    /// Chips committed this street.
    pub fn stake(&self) -> Chips {
        self.stake
    }
    /// Total chips committed this hand. Monotone non-decreasing.
    pub fn spent(&self) -> Chips {
        self.spent
    }
    pub fn state(&self) -> SeatState {
        self.state
    }
    pub fn cards(&self) -> Option<Hole> {
        self.cards
    }
    pub fn folded(&self) -> bool {
        matches!(self.state, SeatState::Folding)
    }
    /// Commits chips from stack to pot; flips to Shoving when the stack
    /// empties.
    pub fn bet(&mut self, bet: Chips) {
        debug_assert!(bet <= self.stack);
        self.stack -= bet;
        self.stake += bet;
        self.spent += bet;
        if self.stack == 0 {
            self.state = SeatState::Shoving;
        }
    }
    pub fn fold(&mut self) {
        self.state = SeatState::Folding;
    }
    pub fn reset_stake(&mut self) {
        self.stake = 0;
    }
    pub fn reset_cards(&mut self, cards: Hole) {
        self.cards = Some(cards);
    }
}

impl std::fmt::Display for Seat {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} ${:<8} {}",
            match self.state {
                SeatState::Betting => "P",
                SeatState::Shoving => "S",
                SeatState::Folding => "F",
            },
            unchips(self.stack),
            self.cards.map(|c| c.to_string()).unwrap_or_default(),
        )
    }
}
