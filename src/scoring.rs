//! Trait scoring: selection and empowerment → white token count.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::traits::ARCHETYPE_ID;

/// Derived counters shown next to the trait list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenTally {
    /// Selected traits that count (archetype excluded)
    pub selected: u32,
    /// Of those, how many are empowered
    pub empowered_used: u32,
    pub modifier: i64,
    pub total: i64,
}

/// Each selected trait gives 1, or 2 when also empowered. The archetype never
/// counts, whatever the sets contain.
pub fn compute_tokens(selected: &BTreeSet<String>, empowered: &BTreeSet<String>, modifier: i64) -> i64 {
    tally(selected, empowered, modifier).total
}

pub fn tally(selected: &BTreeSet<String>, empowered: &BTreeSet<String>, modifier: i64) -> TokenTally {
    let mut out = TokenTally { modifier, ..TokenTally::default() };
    let mut base: i64 = 0;
    for id in selected.iter().filter(|id| id.as_str() != ARCHETYPE_ID) {
        out.selected += 1;
        if empowered.contains(id) {
            out.empowered_used += 1;
            base = base.saturating_add(2);
        } else {
            base = base.saturating_add(1);
        }
    }
    out.total = base.saturating_add(modifier);
    out
}
