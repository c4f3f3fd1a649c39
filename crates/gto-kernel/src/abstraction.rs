use crate::Action;
use crate::GameState;

/// Compresses the full legal action set into the solver's compact action
/// ladder.
///
/// Fold/check/call survive untouched. Of the raises, the smallest and the
/// largest are kept, plus one median size when three or more distinct raise
/// amounts exist. Once `raises_so_far` reaches `max_raises` the ladder offers
/// no further aggression, bounding the betting tree per street. Output is
/// ascending, duplicate-free, and a pure function of the inputs, which
/// information-set identity depends on.
pub fn abstract_actions(state: &GameState, raises_so_far: usize, max_raises: usize) -> Vec<Action> {
    let legal = state.legal();
    if raises_so_far >= max_raises {
        legal.into_iter().filter(|a| !a.is_aggro()).collect()
    } else {
        compress(legal)
    }
}

fn compress(legal: Vec<Action>) -> Vec<Action> {
    let mut actions = legal
        .iter()
        .copied()
        .filter(|a| !a.is_aggro())
        .collect::<Vec<_>>();
    let mut raises = legal
        .into_iter()
        .filter_map(|a| match a {
            Action::Raise(n) => Some(n),
            _ => None,
        })
        .collect::<Vec<_>>();
    raises.sort_unstable();
    raises.dedup();
    let kept = match raises.as_slice() {
        [] => vec![],
        [only] => vec![*only],
        [lo, hi] => vec![*lo, *hi],
        ladder => {
            let median = ladder[ladder.len() / 2];
            vec![ladder[0], median, ladder[ladder.len() - 1]]
        }
    };
    actions.extend(kept.into_iter().map(Action::Raise));
    actions
}
