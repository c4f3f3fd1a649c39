/// A card suit.
///
/// Suits carry no strength ordering in poker; the derived order exists only
/// to give cards a total order for canonicalization.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
pub enum Suit {
    Club = 0,
    Diamond,
    Heart,
    Spade,
}

impl Suit {
    pub const COUNT: usize = 4;
    pub const fn all() -> [Self; 4] {
        [Self::Club, Self::Diamond, Self::Heart, Self::Spade]
    }
}

impl From<u8> for Suit {
    fn from(n: u8) -> Self {
        Self::all()[n as usize % Self::COUNT]
    }
}
impl From<Suit> for u8 {
    fn from(s: Suit) -> Self {
        s as u8
    }
}

impl TryFrom<&str> for Suit {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.trim().to_lowercase().as_str() {
            "c" => Ok(Self::Club),
            "d" => Ok(Self::Diamond),
            "h" => Ok(Self::Heart),
            "s" => Ok(Self::Spade),
            _ => Err(format!("invalid suit: {}", s)),
        }
    }
}

impl std::fmt::Display for Suit {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Club => "c",
                Self::Diamond => "d",
                Self::Heart => "h",
                Self::Spade => "s",
            }
        )
    }
}
