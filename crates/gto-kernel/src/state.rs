use crate::*;
use gto_cards::*;
use gto_core::*;
use rand::rngs::SmallRng;

/// Whose move it is: a player decision, a card reveal, or nobody's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    Choice(Position),
    Chance,
    Terminal,
}

impl Turn {
    pub fn is_chance(&self) -> bool {
        matches!(self, Self::Chance)
    }
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal)
    }
}

/// The memoryless state of a poker hand.
///
/// Encodes everything needed to determine legal actions and compute payoffs:
/// seats, pot, board, whose turn it is, and the betting level bookkeeping the
/// minimum-raise rule depends on. It deliberately does not record the action
/// history; traversals that need a path carry it alongside.
///
/// Transitions are functional: [`apply`](Self::apply) and
/// [`reveal`](Self::reveal) return a new state, so tree walks need no undo
/// logic.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct GameState {
    config: GameConfig,
    seats: Vec<Seat>,
    board: Board,
    pot: Chips,
    street: Street,
    button: Position,
    actor: Position,
    /// Players who still owe an action this street.
    pending: usize,
    /// Street bet level before the most recent raise, for min-raise sizing.
    prev_level: Chips,
}

/// Construction.
impl GameState {
    /// The canonical hand start: blinds posted, preflop action pending.
    pub fn root(config: GameConfig) -> Result<Self, KernelError> {
        if !(2..=9).contains(&config.players) {
            return Err(KernelError::InvalidConfig(format!(
                "{} players",
                config.players
            )));
        }
        if config.small_blind <= 0 || config.big_blind < config.small_blind || config.stack <= 0 {
            return Err(KernelError::InvalidConfig(String::from(
                "blinds and stacks must be positive",
            )));
        }
        let n = config.players;
        let mut seats = vec![Seat::new(config.stack); n];
        // heads-up: the button posts the small blind and acts first preflop
        let sb = if n == 2 { 0 } else { 1 };
        let bb = if n == 2 { 1 } else { 2 };
        let post_sb = config.small_blind.min(seats[sb].stack());
        let post_bb = config.big_blind.min(seats[bb].stack());
        seats[sb].bet(post_sb);
        seats[bb].bet(post_bb);
        let mut state = Self {
            pot: post_sb + post_bb,
            pending: seats.iter().filter(|s| s.state().is_actable()).count(),
            seats,
            board: Board::empty(),
            street: Street::Pref,
            button: 0,
            actor: 0,
            prev_level: 0,
            config,
        };
        state.actor = match n {
            2 => 0,
            _ => state.next_actable(bb),
        };
        Ok(state)
    }
    /// Deals hole cards to every seat from a seeded deck, honoring an
    /// optional pre-sampled hand for one player.
    pub fn deal_holes(mut self, rng: &mut SmallRng, fixed: Option<(Position, Hole)>) -> Self {
        let mut dead = self.board.cards();
        if let Some((_, hole)) = fixed {
            dead = dead.union(Hand::from(hole));
        }
        let mut deck = Deck::without(dead);
        for (i, seat) in self.seats.iter_mut().enumerate() {
            match fixed {
                Some((p, hole)) if p == i => seat.reset_cards(hole),
                _ => seat.reset_cards(deck.hole(rng)),
            }
        }
        self
    }
}

/// Public state accessors.
impl GameState {
    pub fn config(&self) -> &GameConfig {
        &self.config
    }
    pub fn n(&self) -> usize {
        self.seats.len()
    }
    pub fn pot(&self) -> Chips {
        self.pot
    }
    pub fn board(&self) -> Board {
        self.board
    }
    pub fn street(&self) -> Street {
        self.street
    }
    pub fn button(&self) -> Position {
        self.button
    }
    pub fn seats(&self) -> &[Seat] {
        &self.seats
    }
    /// Highest street bet at the moment.
    pub fn max_bet(&self) -> Chips {
        self.seats.iter().map(Seat::stake).max().unwrap_or(0)
    }
    /// Players still competing for the pot.
    pub fn active(&self) -> usize {
        self.seats.iter().filter(|s| s.state().is_active()).count()
    }
    /// Determines whether it's a player's turn, a card reveal, or the end.
    pub fn turn(&self) -> Turn {
        if self.active() <= 1 {
            Turn::Terminal
        } else if self.pending > 0 {
            Turn::Choice(self.actor)
        } else if self.street == Street::Rive {
            Turn::Terminal
        } else {
            Turn::Chance
        }
    }
    fn next_actable(&self, from: Position) -> Position {
        (1..=self.n())
            .map(|k| (from + k) % self.n())
            .find(|&i| self.seats[i].state().is_actable())
            .expect("an actable seat exists while action is pending")
    }
}

/// Legality and transitions.
impl GameState {
    /// Legal actions for the player to act. Empty at chance and terminal
    /// states.
    ///
    /// Order is deterministic (fold, then check/call, then raises
    /// ascending) because information-set identity depends on it.
    pub fn legal(&self) -> Vec<Action> {
        let cp = match self.turn() {
            Turn::Choice(p) => p,
            _ => return Vec::new(),
        };
        let seat = &self.seats[cp];
        let max_bet = self.max_bet();
        let to_call = max_bet - seat.stake();
        let stack = seat.stack();
        let mut actions = Vec::new();
        if to_call > 0 {
            actions.push(Action::Fold);
        }
        if to_call == 0 {
            actions.push(Action::Check);
        } else if to_call <= stack {
            actions.push(Action::Call(to_call));
        }
        if stack > to_call {
            let min_total = max_bet + (max_bet - self.prev_level);
            let min_added = (min_total - seat.stake()).min(stack);
            let mut raises = self
                .config
                .bet_fractions
                .iter()
                .map(|&f| self.config.fraction_of(self.pot, f))
                .filter(|&a| a >= min_added && a <= stack && a > to_call)
                .collect::<Vec<_>>();
            raises.sort_unstable();
            raises.dedup();
            let floor = raises.first().copied().unwrap_or(min_added);
            if stack > floor && !raises.contains(&stack) {
                raises.push(stack);
            }
            actions.extend(raises.into_iter().map(Action::Raise));
        }
        actions
    }
    /// Applies a player action, returning the successor state.
    pub fn apply(&self, action: Action) -> Result<Self, KernelError> {
        let cp = match self.turn() {
            Turn::Choice(p) => p,
            _ => return Err(KernelError::NoActionPending),
        };
        if !self.legal().contains(&action) {
            return Err(KernelError::IllegalAction(action));
        }
        let mut next = self.clone();
        match action {
            Action::Fold => {
                next.seats[cp].fold();
                next.pending -= 1;
            }
            Action::Check => {
                next.pending -= 1;
            }
            Action::Call(n) => {
                next.seats[cp].bet(n);
                next.pot += n;
                next.pending -= 1;
            }
            Action::Raise(n) => {
                next.prev_level = self.max_bet();
                next.seats[cp].bet(n);
                next.pot += n;
                next.pending = next
                    .seats
                    .iter()
                    .enumerate()
                    .filter(|(i, s)| *i != cp && s.state().is_actable())
                    .count();
            }
        }
        if next.pending > 0 {
            next.actor = next.next_actable(cp);
        }
        Ok(next)
    }
    /// Reveals the next street's community cards at a chance node.
    pub fn reveal(&self, cards: Hand) -> Result<Self, KernelError> {
        if !self.turn().is_chance() {
            return Err(KernelError::NoRevealPending);
        }
        let expected = self.street.next().n_revealed();
        if cards.size() != expected {
            return Err(KernelError::InvalidConfig(format!(
                "expected {} cards for the {}",
                expected,
                self.street.next()
            )));
        }
        if cards.collides(&self.dead()) {
            return Err(KernelError::CardCollision);
        }
        let mut next = self.clone();
        next.board = next.board.reveal(cards);
        next.street = next.board.street();
        next.prev_level = 0;
        for seat in next.seats.iter_mut() {
            seat.reset_stake();
        }
        let actable = next.seats.iter().filter(|s| s.state().is_actable()).count();
        // betting is closed when at most one player can still act
        next.pending = if actable >= 2 { actable } else { 0 };
        if next.pending > 0 {
            next.actor = next.next_actable(next.button);
        }
        Ok(next)
    }
    /// Samples the next street's cards from the live deck.
    pub fn reveal_random(&self, rng: &mut SmallRng) -> Result<Self, KernelError> {
        if !self.turn().is_chance() {
            return Err(KernelError::NoRevealPending);
        }
        let mut deck = Deck::without(self.dead());
        let cards = deck.deal(self.street.next(), rng);
        self.reveal(cards)
    }
    /// All cards visible to the dealer: board plus every dealt hole.
    fn dead(&self) -> Hand {
        self.seats
            .iter()
            .filter_map(Seat::cards)
            .map(Hand::from)
            .fold(self.board.cards(), Hand::union)
    }
}

/// Settlement.
impl GameState {
    /// Net payoff per player at a terminal state, in chips.
    ///
    /// A lone survivor collects the pot; otherwise active hands go to
    /// showdown and ties split the pot equally. Every payoff nets out the
    /// player's total investment, so the vector sums to zero.
    pub fn payoffs(&self, evaluator: &dyn Evaluate) -> Result<Vec<Utility>, KernelError> {
        if !self.turn().is_terminal() {
            return Err(KernelError::NotTerminal);
        }
        let active = self
            .seats
            .iter()
            .enumerate()
            .filter(|(_, s)| s.state().is_active())
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        let mut awards = vec![0.0; self.n()];
        if let [winner] = active.as_slice() {
            awards[*winner] = unchips(self.pot);
        } else {
            let mut strengths = Vec::with_capacity(active.len());
            for &i in active.iter() {
                let hole = self.seats[i]
                    .cards()
                    .ok_or(KernelError::MissingHand(i))?;
                let seven = Hand::from(hole).union(self.board.cards());
                strengths.push(evaluator.strength(seven)?);
            }
            let best = strengths.iter().max().copied().expect("showdown hands");
            let winners = active
                .iter()
                .zip(strengths.iter())
                .filter(|(_, s)| **s == best)
                .map(|(i, _)| *i)
                .collect::<Vec<_>>();
            let share = unchips(self.pot) / winners.len() as f64;
            for w in winners {
                awards[w] = share;
            }
        }
        Ok(self
            .seats
            .iter()
            .zip(awards)
            .map(|(seat, award)| award - unchips(seat.spent()))
            .collect())
    }
}

impl std::fmt::Display for GameState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} ${} [{}]", self.street, unchips(self.pot), self.board)?;
        for seat in self.seats.iter() {
            write!(f, " | {}", seat)?;
        }
        Ok(())
    }
}
