use gto_core::*;

/// A player decision at a betting node.
///
/// `Call` and `Raise` carry the chips **added to the pot by this action**,
/// not the resulting street bet level. That single convention is enforced
/// everywhere: legality, transitions, and the wire encoding.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Action {
    Fold,
    Check,
    Call(Chips),
    Raise(Chips),
}

impl Action {
    /// True for raise actions.
    pub fn is_aggro(&self) -> bool {
        matches!(self, Self::Raise(_))
    }
    /// True for fold or check.
    pub fn is_passive(&self) -> bool {
        matches!(self, Self::Fold | Self::Check)
    }
    /// Chips this action moves into the pot.
    pub fn added(&self) -> Chips {
        match *self {
            Self::Call(n) | Self::Raise(n) => n,
            Self::Fold | Self::Check => 0,
        }
    }
    /// Compact symbol for history serialization (e.g. "C1000", "R3000").
    pub fn symbol(&self) -> String {
        match self {
            Self::Fold => String::from("F"),
            Self::Check => String::from("X"),
            Self::Call(n) => format!("C{}", n),
            Self::Raise(n) => format!("R{}", n),
        }
    }
}

impl TryFrom<&str> for Action {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let s = s.trim();
        match s.split_at(s.len().min(1)) {
            ("F", "") => Ok(Self::Fold),
            ("X", "") => Ok(Self::Check),
            ("C", n) => n
                .parse()
                .map(Self::Call)
                .map_err(|_| format!("invalid call amount: {}", s)),
            ("R", n) => n
                .parse()
                .map(Self::Raise)
                .map_err(|_| format!("invalid raise amount: {}", s)),
            _ => Err(format!("invalid action: {}", s)),
        }
    }
}
impl TryFrom<String> for Action {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::try_from(s.as_str())
    }
}
impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.symbol()
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Fold => write!(f, "FOLD"),
            Self::Check => write!(f, "CHECK"),
            Self::Call(n) => write!(f, "CALL {}", unchips(*n)),
            Self::Raise(n) => write!(f, "RAISE {}", unchips(*n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bijective_symbol() {
        for action in [
            Action::Fold,
            Action::Check,
            Action::Call(chips(1.0)),
            Action::Raise(chips(2.5)),
        ] {
            assert_eq!(action, Action::try_from(action.symbol().as_str()).unwrap());
        }
    }

    #[test]
    fn serde_uses_symbols() {
        let json = serde_json::to_string(&Action::Raise(chips(3.0))).unwrap();
        assert_eq!(json, "\"R3000\"");
    }
}
