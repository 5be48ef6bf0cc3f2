//! Arg-max over candidate probabilities.

use serde::{Deserialize, Serialize};

/// Which candidate wins when several share the highest probability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// The earliest candidate in iteration order.
    #[default]
    FirstSeen,
    /// The latest candidate in iteration order.
    LastSeen,
}

/// The candidate with the highest probability, or `None` for no candidates.
///
/// NaN probabilities never win against a real number.
pub fn most_probable<K>(
    candidates: impl IntoIterator<Item = (K, f64)>,
    tie_break: TieBreak,
) -> Option<K> {
    let mut best: Option<(K, f64)> = None;
    for (candidate, probability) in candidates {
        let replace = match &best {
            None => true,
            Some((_, best_p)) if best_p.is_nan() => !probability.is_nan(),
            Some((_, best_p)) => match tie_break {
                TieBreak::FirstSeen => probability > *best_p,
                TieBreak::LastSeen => probability >= *best_p,
            },
        };
        if replace {
            best = Some((candidate, probability));
        }
    }
    best.map(|(candidate, _)| candidate)
}
