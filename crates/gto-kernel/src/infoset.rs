use gto_cards::Street;
use gto_core::*;

use crate::KernelError;

/// Canonical identity of an information set.
///
/// Everything the acting player can distinguish, nothing they cannot:
/// their seat, the street, the board's texture class, the abstracted action
/// history, and their private hand bucket. States that share a key are
/// guaranteed to present identical legal-action lists in identical order,
/// because the action ladder is a pure function of the history the key
/// embeds.
///
/// The canonical byte form is the `Display` string
/// `{player}|{street}|{class}|{history}|{bucket}`; history bytes never
/// contain `|`, so parsing is unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InfoSetKey {
    player: u8,
    street: Street,
    board_class: u8,
    history: String,
    bucket: u16,
}

impl InfoSetKey {
    pub fn new(
        player: Position,
        street: Street,
        board_class: u8,
        history: String,
        bucket: u16,
    ) -> Self {
        debug_assert!(!history.contains('|'));
        Self {
            player: player as u8,
            street,
            board_class,
            history,
            bucket,
        }
    }
    pub fn player(&self) -> Position {
        self.player as Position
    }
    pub fn street(&self) -> Street {
        self.street
    }
    pub fn bucket(&self) -> u16 {
        self.bucket
    }
    pub fn history(&self) -> &str {
        &self.history
    }
    /// Canonical byte encoding for checkpoints and wire maps.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KernelError> {
        let s = std::str::from_utf8(bytes)
            .map_err(|_| KernelError::MalformedKey(String::from_utf8_lossy(bytes).into_owned()))?;
        Self::try_from(s)
    }
}

impl std::fmt::Display for InfoSetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{:x}",
            self.player, self.street, self.board_class, self.history, self.bucket
        )
    }
}

impl TryFrom<&str> for InfoSetKey {
    type Error = KernelError;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let broken = || KernelError::MalformedKey(s.to_string());
        let mut parts = s.split('|');
        let player = parts.next().and_then(|p| p.parse().ok()).ok_or_else(broken)?;
        let street = match parts.next().ok_or_else(broken)? {
            "P" => Street::Pref,
            "F" => Street::Flop,
            "T" => Street::Turn,
            "R" => Street::Rive,
            _ => return Err(broken()),
        };
        let board_class = parts.next().and_then(|p| p.parse().ok()).ok_or_else(broken)?;
        let history = parts.next().ok_or_else(broken)?.to_string();
        let bucket = parts
            .next()
            .and_then(|p| u16::from_str_radix(p, 16).ok())
            .ok_or_else(broken)?;
        if parts.next().is_some() {
            return Err(broken());
        }
        Ok(Self {
            player,
            street,
            board_class,
            history,
            bucket,
        })
    }
}

impl serde::Serialize for InfoSetKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
impl<'de> serde::Deserialize<'de> for InfoSetKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::try_from(s.as_str()).map_err(serde::de::Error::custom)
    }
}

/// Accumulated regret and strategy weight for one information set.
///
/// Both vectors are sized to the abstracted action list; the arity is fixed
/// at creation and every delta folded in must match it.
#[derive(Debug, Clone, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct InfoSetNode {
    pub regret_sum: Vec<Utility>,
    pub strategy_sum: Vec<Utility>,
}

impl InfoSetNode {
    pub fn new(arity: usize) -> Self {
        Self {
            regret_sum: vec![0.0; arity],
            strategy_sum: vec![0.0; arity],
        }
    }
    pub fn arity(&self) -> usize {
        self.regret_sum.len()
    }
    /// Immediate strategy via regret matching: positive regrets normalized,
    /// uniform when none are positive.
    pub fn policy(&self) -> Vec<Probability> {
        regret_match(&self.regret_sum)
    }
    /// Long-run average strategy: normalized strategy weight, uniform when
    /// nothing has accumulated.
    pub fn average(&self) -> Vec<Probability> {
        let total = self.strategy_sum.iter().sum::<Utility>();
        if total <= 0.0 {
            uniform(self.arity())
        } else {
            self.strategy_sum.iter().map(|w| w / total).collect()
        }
    }
    /// Folds a task's deltas into the running sums.
    pub fn accumulate(&mut self, regret: &[Utility], strategy: &[Utility]) -> Result<(), KernelError> {
        if regret.len() != self.arity() || strategy.len() != self.arity() {
            return Err(KernelError::ArityMismatch {
                expected: self.arity(),
                got: regret.len().max(strategy.len()),
            });
        }
        for (sum, d) in self.regret_sum.iter_mut().zip(regret) {
            *sum += d;
        }
        for (sum, d) in self.strategy_sum.iter_mut().zip(strategy) {
            *sum += d;
        }
        Ok(())
    }
    /// Clamps cumulative regrets at zero (regret-matching-plus).
    pub fn clamp_nonnegative(&mut self) {
        for r in self.regret_sum.iter_mut() {
            *r = r.max(0.0);
        }
    }
}

/// Regret matching over a regret vector.
pub fn regret_match(regrets: &[Utility]) -> Vec<Probability> {
    let positive = regrets.iter().map(|r| r.max(0.0)).collect::<Vec<_>>();
    let total = positive.iter().sum::<Utility>();
    if total <= 0.0 {
        uniform(regrets.len())
    } else {
        positive.into_iter().map(|r| r / total).collect()
    }
}

/// The uniform distribution over `n` actions.
pub fn uniform(n: usize) -> Vec<Probability> {
    vec![1.0 / n.max(1) as Probability; n]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> InfoSetKey {
        InfoSetKey::new(1, Street::Flop, 23, String::from("C500.X/R1500"), 172)
    }

    #[test]
    fn bijective_str() {
        let k = key();
        assert_eq!(k, InfoSetKey::try_from(k.to_string().as_str()).unwrap());
    }

    #[test]
    fn bijective_bytes() {
        let k = key();
        assert_eq!(k, InfoSetKey::from_bytes(&k.to_bytes()).unwrap());
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(InfoSetKey::try_from("1|F|23").is_err());
        assert!(InfoSetKey::try_from("x|F|23|h|a0").is_err());
    }

    #[test]
    fn policy_matches_positive_regret() {
        let mut node = InfoSetNode::new(3);
        node.accumulate(&[3.0, 1.0, -2.0], &[0.0; 3]).unwrap();
        let policy = node.policy();
        assert!((policy[0] - 0.75).abs() < 1e-12);
        assert!((policy[1] - 0.25).abs() < 1e-12);
        assert_eq!(policy[2], 0.0);
    }

    #[test]
    fn policy_is_uniform_without_positive_regret() {
        let node = InfoSetNode::new(4);
        assert_eq!(node.policy(), vec![0.25; 4]);
        assert_eq!(node.average(), vec![0.25; 4]);
    }

    #[test]
    fn accumulate_rejects_arity_mismatch() {
        let mut node = InfoSetNode::new(2);
        assert!(node.accumulate(&[1.0], &[1.0]).is_err());
    }

    #[test]
    fn clamp_floors_regret_at_zero() {
        let mut node = InfoSetNode::new(2);
        node.accumulate(&[-5.0, 2.0], &[0.0; 2]).unwrap();
        node.clamp_nonnegative();
        assert_eq!(node.regret_sum, vec![0.0, 2.0]);
    }
}
