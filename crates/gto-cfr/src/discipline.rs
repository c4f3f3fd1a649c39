use gto_core::*;

use crate::Variant;

/// Discounting parameters for the vanilla-family update schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Discount {
    /// Exponent on the iteration index: fresh regret deltas are scaled by
    /// `t^(-alpha)`.
    pub alpha: f64,
    /// Reserved for asymmetric schedules; unused by the symmetric default.
    pub beta: f64,
}

impl Default for Discount {
    fn default() -> Self {
        Self {
            alpha: 1.5,
            beta: 0.5,
        }
    }
}

/// The per-variant update rules, expressed as three hooks over one shared
/// traversal.
///
/// | hook | vanilla | chance sampling | plus |
/// |---|---|---|---|
/// | `action_weighting` | `t^(-α)` when discounted | same | 1 |
/// | `adjust_regret` | identity | identity | clamp at 0 |
/// | `strategy_weighting` | 1 | 1 | `t` |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Discipline {
    variant: Variant,
    discount: Option<Discount>,
}

impl Discipline {
    pub fn new(variant: Variant, discount: Option<Discount>) -> Self {
        // regret-matching-plus never discounts
        let discount = match variant {
            Variant::Plus => None,
            _ => discount,
        };
        Self { variant, discount }
    }
    pub fn variant(&self) -> Variant {
        self.variant
    }
    /// Scale applied to freshly computed regret deltas.
    pub fn action_weighting(&self, epoch: Epoch) -> Utility {
        match self.discount {
            Some(d) => (epoch.max(1) as f64).powf(-d.alpha),
            None => 1.0,
        }
    }
    /// Rule applied to cumulative regret after a delta is folded in.
    pub fn adjust_regret(&self, regret: Utility) -> Utility {
        match self.variant {
            Variant::Plus => regret.max(0.0),
            _ => regret,
        }
    }
    /// Scale applied to strategy-sum accumulation.
    pub fn strategy_weighting(&self, epoch: Epoch) -> Utility {
        match self.variant {
            Variant::Plus => epoch.max(1) as Utility,
            _ => 1.0,
        }
    }
    /// Whether non-updating players' actions are sampled rather than
    /// enumerated.
    pub fn samples_opponents(&self) -> bool {
        matches!(self.variant, Variant::ChanceSampling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plus_ignores_discounting() {
        let d = Discipline::new(Variant::Plus, Some(Discount::default()));
        assert_eq!(d.action_weighting(100), 1.0);
        assert_eq!(d.adjust_regret(-3.0), 0.0);
        assert_eq!(d.strategy_weighting(5), 5.0);
    }

    #[test]
    fn vanilla_discount_decays() {
        let d = Discipline::new(Variant::Vanilla, Some(Discount::default()));
        assert!(d.action_weighting(2) > d.action_weighting(10));
        assert_eq!(d.adjust_regret(-3.0), -3.0);
        assert_eq!(d.strategy_weighting(5), 1.0);
    }

    #[test]
    fn undiscounted_weighting_is_unit() {
        let d = Discipline::new(Variant::ChanceSampling, None);
        assert_eq!(d.action_weighting(7), 1.0);
        assert!(d.samples_opponents());
    }
}
