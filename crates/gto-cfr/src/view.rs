use gto_core::*;
use gto_kernel::InfoSetKey;
use gto_kernel::InfoSetNode;
use std::collections::BTreeMap;

/// Read-only window onto cumulative solver state.
///
/// Workers hold no shared tables; they regret-match against whatever snapshot
/// the orchestrator last published. Lookups return owned vectors so
/// implementations are free to guard their storage however they like.
pub trait StrategyView: Send + Sync {
    /// Cumulative regrets for an information set, if it has been visited.
    fn regrets(&self, key: &InfoSetKey) -> Option<Vec<Utility>>;
    /// Cumulative strategy weight for an information set.
    fn weights(&self, key: &InfoSetKey) -> Option<Vec<Utility>>;

    /// Immediate strategy via regret matching; uniform for unseen sets.
    fn policy(&self, key: &InfoSetKey, arity: usize) -> Vec<Probability> {
        match self.regrets(key) {
            Some(regrets) if regrets.len() == arity => gto_kernel::regret_match(&regrets),
            _ => gto_kernel::uniform(arity),
        }
    }
    /// Long-run average strategy; uniform for unseen sets.
    fn average(&self, key: &InfoSetKey, arity: usize) -> Vec<Probability> {
        match self.weights(key) {
            Some(weights) if weights.len() == arity => {
                let total = weights.iter().sum::<Utility>();
                if total <= 0.0 {
                    gto_kernel::uniform(arity)
                } else {
                    weights.iter().map(|w| w / total).collect()
                }
            }
            _ => gto_kernel::uniform(arity),
        }
    }
}

/// A plain snapshot of the node table.
#[derive(Debug, Default, Clone)]
pub struct TableView(pub BTreeMap<InfoSetKey, InfoSetNode>);

impl StrategyView for TableView {
    fn regrets(&self, key: &InfoSetKey) -> Option<Vec<Utility>> {
        self.0.get(key).map(|n| n.regret_sum.clone())
    }
    fn weights(&self, key: &InfoSetKey) -> Option<Vec<Utility>> {
        self.0.get(key).map(|n| n.strategy_sum.clone())
    }
}

/// The view before anything has been learned: every set unseen.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyView;

impl StrategyView for EmptyView {
    fn regrets(&self, _: &InfoSetKey) -> Option<Vec<Utility>> {
        None
    }
    fn weights(&self, _: &InfoSetKey) -> Option<Vec<Utility>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gto_cards::Street;

    #[test]
    fn unseen_sets_are_uniform() {
        let key = InfoSetKey::new(0, Street::Pref, 0, String::new(), 12);
        assert_eq!(EmptyView.policy(&key, 4), vec![0.25; 4]);
        assert_eq!(EmptyView.average(&key, 2), vec![0.5; 2]);
    }

    #[test]
    fn table_view_matches_its_nodes() {
        let key = InfoSetKey::new(0, Street::Pref, 0, String::new(), 12);
        let mut node = InfoSetNode::new(2);
        node.accumulate(&[1.0, 3.0], &[1.0, 1.0]).unwrap();
        let view = TableView(BTreeMap::from([(key.clone(), node)]));
        let policy = view.policy(&key, 2);
        assert!((policy[0] - 0.25).abs() < 1e-12);
        assert!((policy[1] - 0.75).abs() < 1e-12);
    }
}
