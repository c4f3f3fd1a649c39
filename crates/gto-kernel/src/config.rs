use gto_core::*;

/// Pot fractions are stored in permille so bet sizing stays integral:
/// 500 is a half-pot bet, 1000 a full pot.
pub type Permille = u32;

/// Default raise sizing grid: third, half, three-quarter, and full pot.
pub const DEFAULT_FRACTIONS: [Permille; 4] = [330, 500, 750, 1_000];

/// Static table configuration shared by every state in one game tree.
///
/// Chip fields are milli-chips; use [`gto_core::chips`] at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct GameConfig {
    pub players: usize,
    pub stack: Chips,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub bet_fractions: Vec<Permille>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            players: 2,
            stack: chips(100.0),
            small_blind: chips(0.5),
            big_blind: chips(1.0),
            bet_fractions: DEFAULT_FRACTIONS.to_vec(),
        }
    }
}

impl GameConfig {
    /// Heads-up with the given stack in big blinds, for tests and demos.
    pub fn heads_up(stack: f64) -> Self {
        Self {
            stack: chips(stack),
            ..Self::default()
        }
    }
    /// Pot-fraction raise amount in milli-chips, rounded to the nearest.
    pub fn fraction_of(&self, pot: Chips, fraction: Permille) -> Chips {
        (pot * fraction as Chips + 500) / 1_000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_rounds_to_nearest() {
        let config = GameConfig::default();
        // a third of a 1.0-chip pot is 0.33 chips
        assert_eq!(config.fraction_of(chips(1.0), 330), chips(0.33));
        // half of 1.5 rounds cleanly
        assert_eq!(config.fraction_of(chips(1.5), 500), chips(0.75));
    }
}
