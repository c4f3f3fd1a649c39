use gto_cards::*;

/// Collapses a board into a small equivalence class for information-set
/// identity.
///
/// Two boards that are isomorphic under suit relabelling land in the same
/// class. The encoding is additive: the card count is the base, with flat
/// offsets for paired, monotone, and completed-straight textures.
pub fn board_class(board: &Board) -> u8 {
    let cards = board.cards();
    let mut class = board.size() as u8;
    if cards.rank_counts().iter().any(|&c| c >= 2) {
        class += 10;
    }
    if board.size() >= 3 && monotone(cards) {
        class += 20;
    }
    if straighted(cards.ranks()) {
        class += 30;
    }
    class
}

/// Every card shares one suit.
fn monotone(cards: Hand) -> bool {
    cards
        .suit_ranks()
        .iter()
        .any(|m| m.count_ones() as usize == cards.size())
}

/// Five consecutive ranks on the board, wheel included.
fn straighted(ranks: u16) -> bool {
    const WHEEL: u16 = 0b1_0000_0000_1111;
    (0..=8).any(|lo| {
        let window = 0b11111u16 << lo;
        ranks & window == window
    }) || ranks & WHEEL == WHEEL
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(s: &str) -> u8 {
        board_class(&Board::try_from(s).unwrap())
    }

    #[test]
    fn bases_on_card_count() {
        assert_eq!(class(""), 0);
        assert_eq!(class("2c 7h Jd"), 3);
        assert_eq!(class("2c 7h Jd As"), 4);
    }

    #[test]
    fn flags_compose() {
        assert_eq!(class("2c 2h Jd"), 13);
        assert_eq!(class("2h 7h Jh"), 23);
        assert_eq!(class("2h 2d 7d Kd Ad"), 15); // paired but not monotone
        assert_eq!(class("4c 5d 6h 7s 8c"), 35);
    }

    #[test]
    fn suit_relabelling_is_invariant() {
        assert_eq!(class("2h 7h Jh"), class("2s 7s Js"));
        assert_eq!(class("2c 7h Jd"), class("2d 7s Jc"));
    }

    #[test]
    fn wheel_counts_as_straight_texture() {
        assert_eq!(class("Ac 2d 3h 4s 5c"), 35);
    }
}
