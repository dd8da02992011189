//! Pure analysis stages
//!
//! Each stage takes fully materialized, normalized collections and returns
//! new values. Nothing here performs I/O or keeps state between runs.

mod aggregate;
mod extract;
mod identity;
mod interaction;
mod marketing;
mod meetings;
mod normalize;

pub use aggregate::{Aggregates, Aggregator, UserIdentity};
pub use extract::{Entities, EntityExtractor, HeuristicExtractor};
pub use identity::{
    build_identity_table, normalize_address, parse_display_address, split_address_list,
    IdentityTable,
};
pub use interaction::{humanize_duration, Direction, InteractionAnalysis, ThreadAnalyzer};
pub use marketing::{gmail_query, is_bulk_sender, is_marketing};
pub use meetings::important_upcoming;
pub use normalize::{clean_text, decode_header_text, normalize_event, normalize_message};

use std::collections::HashMap;

/// Counter that remembers the order keys were first seen in
///
/// Iteration and ranking never depend on hash order, so ties always
/// resolve to the earliest key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderedCounter {
    index: HashMap<String, usize>,
    entries: Vec<(String, u32)>,
}

impl OrderedCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: &str, n: u32) {
        match self.index.get(key) {
            Some(&i) => self.entries[i].1 += n,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), n));
            }
        }
    }

    pub fn incr(&mut self, key: &str) {
        self.add(key, 1);
    }

    pub fn get(&self, key: &str) -> u32 {
        self.index.get(key).map(|&i| self.entries[i].1).unwrap_or(0)
    }

    /// Entries in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.entries.iter().map(|(k, n)| (k.as_str(), *n))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Descending by count; equal counts keep first-seen order
    pub fn ranked(&self) -> Vec<(String, u32)> {
        let mut ranked = self.entries.clone();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_counter_ranks_stably() {
        let mut c = OrderedCounter::new();
        for key in ["b", "a", "c", "a", "b", "d"] {
            c.incr(key);
        }
        assert_eq!(c.get("a"), 2);
        assert_eq!(c.get("zzz"), 0);
        let keys: Vec<String> = c.ranked().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a", "c", "d"]);
    }
}
