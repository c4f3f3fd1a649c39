use super::hand::Hand;
use super::strength::Ranking;
use super::strength::Strength;

/// Pure hand-strength evaluation: best five-card hand from 5–7 cards.
///
/// The solver engine only ever sees this trait; swapping in a lookup-table
/// evaluator is a one-line change at process assembly.
pub trait Evaluate: Send + Sync {
    fn strength(&self, cards: Hand) -> Result<Strength, EvaluatorError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EvaluatorError {
    #[error("need at least 5 cards to evaluate, got {0}")]
    TooFewCards(usize),
    #[error("evaluator failure: {0}")]
    Failed(String),
}

/// The bundled rank-counting evaluator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Showdown;

impl Evaluate for Showdown {
    fn strength(&self, cards: Hand) -> Result<Strength, EvaluatorError> {
        match cards.size() {
            n if n < 5 => Err(EvaluatorError::TooFewCards(n)),
            _ => Ok(evaluate(cards)),
        }
    }
}

fn evaluate(cards: Hand) -> Strength {
    let counts = cards.rank_counts();
    let ranks = cards.ranks();
    let suits = cards.suit_ranks();

    if let Some(high) = suits
        .iter()
        .filter(|m| m.count_ones() >= 5)
        .filter_map(|m| straight_high(*m))
        .max()
    {
        return Strength::from((Ranking::StraightFlush, high as u32));
    }
    if let Some(q) = highest_with_count(&counts, 4) {
        let kick = top_bits(ranks & !(1 << q), 1);
        return Strength::from((Ranking::Quads, (q as u32) << 16 | kick as u32));
    }
    if let Some(t) = highest_with_count(&counts, 3) {
        let pair = (0..13u8)
            .rev()
            .filter(|&r| r != t)
            .find(|&r| counts[r as usize] >= 2);
        if let Some(p) = pair {
            return Strength::from((Ranking::FullHouse, (t as u32) << 16 | p as u32));
        }
    }
    if let Some(m) = suits.iter().find(|m| m.count_ones() >= 5) {
        return Strength::from((Ranking::Flush, top_bits(*m, 5) as u32));
    }
    if let Some(high) = straight_high(ranks) {
        return Strength::from((Ranking::Straight, high as u32));
    }
    if let Some(t) = highest_with_count(&counts, 3) {
        let kick = top_bits(ranks & !(1 << t), 2);
        return Strength::from((Ranking::Trips, (t as u32) << 16 | kick as u32));
    }
    let mut pairs = (0..13u8).rev().filter(|&r| counts[r as usize] >= 2);
    match (pairs.next(), pairs.next()) {
        (Some(hi), Some(lo)) => {
            let kick = top_bits(ranks & !(1 << hi) & !(1 << lo), 1);
            Strength::from((
                Ranking::TwoPair,
                (hi as u32) << 20 | (lo as u32) << 16 | kick as u32,
            ))
        }
        (Some(p), None) => {
            let kick = top_bits(ranks & !(1 << p), 3);
            Strength::from((Ranking::OnePair, (p as u32) << 16 | kick as u32))
        }
        _ => Strength::from((Ranking::HighCard, top_bits(ranks, 5) as u32)),
    }
}

/// Highest rank present in a run of five consecutive ranks, wheel included.
fn straight_high(mask: u16) -> Option<u8> {
    for high in (4..=12u8).rev() {
        let window = 0b11111u16 << (high - 4);
        if mask & window == window {
            return Some(high);
        }
    }
    // A-5-4-3-2: ace plays low, five high
    const WHEEL: u16 = 0b1_0000_0000_1111;
    if mask & WHEEL == WHEEL {
        return Some(3);
    }
    None
}

fn highest_with_count(counts: &[u8; 13], n: u8) -> Option<u8> {
    (0..13u8).rev().find(|&r| counts[r as usize] >= n)
}

/// Keeps only the `n` highest set bits of a rank mask.
fn top_bits(mask: u16, n: u32) -> u16 {
    let mut kept = 0u16;
    let mut mask = mask;
    for _ in 0..n {
        if mask == 0 {
            break;
        }
        let top = 15 - mask.leading_zeros() as u16;
        kept |= 1 << top;
        mask &= !(1 << top);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strength(s: &str) -> Strength {
        Showdown.strength(Hand::try_from(s).unwrap()).unwrap()
    }

    #[test]
    fn rejects_short_hands() {
        assert!(Showdown
            .strength(Hand::try_from("2c 3c").unwrap())
            .is_err());
    }

    #[test]
    fn categories_order() {
        let straight_flush = strength("6h 7h 8h 9h Th 2c 2d");
        let quads = strength("Ac Ad Ah As Kc 2c 3d");
        let boat = strength("Ac Ad Ah Ks Kc 2c 3d");
        let flush = strength("2h 5h 9h Jh Kh Ac 2d");
        let straight = strength("4c 5d 6h 7s 8c Ah 2d");
        let trips = strength("9c 9d 9h As Kc 2c 3d");
        let two_pair = strength("9c 9d Kh Ks 2c 3d 4h");
        let pair = strength("9c 9d Ah Ks 2c 3d 5h");
        let high = strength("2c 5d 9h Js Kc Ah 7d");
        let hands = [
            high,
            pair,
            two_pair,
            trips,
            straight,
            flush,
            boat,
            quads,
            straight_flush,
        ];
        assert!(hands.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn wheel_is_the_lowest_straight() {
        let wheel = strength("Ac 2d 3h 4s 5c 9h Jd");
        let six_high = strength("2d 3h 4s 5c 6h 9d Jc");
        assert_eq!(wheel.ranking(), Ranking::Straight);
        assert!(wheel < six_high);
    }

    #[test]
    fn kickers_break_pair_ties() {
        let better = strength("9c 9d Ah Ks Qc 3d 5h");
        let worse = strength("9h 9s Ah Ks Jc 3d 5h");
        assert!(worse < better);
    }

    #[test]
    fn identical_boards_tie() {
        assert_eq!(
            strength("Ac Kd Qh Js Tc 2d 2h"),
            strength("Ac Kd Qh Js Tc 3d 3h")
        );
    }
}
