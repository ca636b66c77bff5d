//! Alias table for retired document identifiers.
//!
//! Built while walking history newest-to-oldest: the first alias recorded
//! for an identifier is the most recent rename or removal and is never
//! replaced. Resolution follows the chain to the current identifier.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

/// Outcome of resolving a historical identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The identifier's current name.
    Canonical(String),
    /// The lineage ends in a removal; the document no longer exists.
    Removed,
    /// The chain loops back on itself; resolution was abandoned.
    Cycle,
}

/// Outcome of registering an alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The alias was recorded.
    Added,
    /// The identifier already has an alias; the newer one stands.
    AlreadyAliased,
    /// Old and new identifiers are equal.
    SelfAlias,
    /// Recording the alias would create a cycle.
    WouldCycle,
}

/// Mapping from retired identifiers to their successors, or to `None` when removed.
///
/// Serializes as a JSON object whose values are the successor identifier or `null`.
///
/// # Examples
///
/// ```
/// use doclineage_history::resolver::{AliasTable, Resolution};
///
/// let mut aliases = AliasTable::new();
/// aliases.register_rename("draft", "7702");
/// aliases.register_rename("old", "draft");
/// aliases.register_removal("gone");
///
/// assert_eq!(aliases.resolve("old"), Resolution::Canonical("7702".into()));
/// assert_eq!(aliases.resolve("gone"), Resolution::Removed);
/// assert_eq!(aliases.resolve("1559"), Resolution::Canonical("1559".into()));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasTable {
    entries: BTreeMap<String, Option<String>>,
}

impl AliasTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `id` was removed, unless it already has an alias.
    pub fn register_removal(&mut self, id: &str) -> Registration {
        if self.entries.contains_key(id) {
            return Registration::AlreadyAliased;
        }
        self.entries.insert(id.to_string(), None);
        Registration::Added
    }

    /// Record that `from` was renamed to `to`, unless `from` already has an alias.
    ///
    /// A rename whose target already resolves back to `from` is refused, so
    /// the table stays acyclic by construction.
    pub fn register_rename(&mut self, from: &str, to: &str) -> Registration {
        if from == to {
            return Registration::SelfAlias;
        }
        if self.entries.contains_key(from) {
            return Registration::AlreadyAliased;
        }
        if self.resolve(to) == Resolution::Canonical(from.to_string()) {
            return Registration::WouldCycle;
        }
        self.entries.insert(from.to_string(), Some(to.to_string()));
        Registration::Added
    }

    /// Follow the alias chain from `id` to its current identifier.
    ///
    /// Terminates within `len() + 1` steps; a revisited identifier yields
    /// [`Resolution::Cycle`] rather than looping.
    pub fn resolve(&self, id: &str) -> Resolution {
        let mut current = id;
        let mut visited: HashSet<&str> = HashSet::new();
        for _ in 0..=self.entries.len() {
            if !visited.insert(current) {
                return Resolution::Cycle;
            }
            match self.entries.get(current) {
                None => return Resolution::Canonical(current.to_string()),
                Some(None) => return Resolution::Removed,
                Some(Some(next)) => current = next.as_str(),
            }
        }
        Resolution::Cycle
    }

    /// The direct alias for `id`: `Some(Some(next))`, `Some(None)` if removed, `None` if unaliased.
    pub fn get(&self, id: &str) -> Option<Option<&str>> {
        self.entries.get(id).map(|target| target.as_deref())
    }

    /// Whether `id` has an alias.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of aliased identifiers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Aliases in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(from, to)| (from.as_str(), to.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_alias_wins() {
        let mut aliases = AliasTable::new();
        assert_eq!(aliases.register_rename("A", "B"), Registration::Added);
        assert_eq!(
            aliases.register_rename("A", "C"),
            Registration::AlreadyAliased
        );
        assert_eq!(aliases.register_removal("A"), Registration::AlreadyAliased);
        assert_eq!(aliases.get("A"), Some(Some("B")));
    }

    #[test]
    fn removal_then_rename_keeps_removal() {
        let mut aliases = AliasTable::new();
        aliases.register_removal("A");
        aliases.register_rename("A", "B");
        assert_eq!(aliases.resolve("A"), Resolution::Removed);
    }

    #[test]
    fn chains_resolve_transitively() {
        let mut aliases = AliasTable::new();
        aliases.register_rename("C", "D");
        aliases.register_rename("B", "C");
        aliases.register_rename("A", "B");
        assert_eq!(aliases.resolve("A"), Resolution::Canonical("D".into()));
        assert_eq!(aliases.resolve("D"), Resolution::Canonical("D".into()));
    }

    #[test]
    fn chain_into_removal_is_removed() {
        let mut aliases = AliasTable::new();
        aliases.register_removal("B");
        aliases.register_rename("A", "B");
        assert_eq!(aliases.resolve("A"), Resolution::Removed);
    }

    #[test]
    fn self_alias_is_ignored() {
        let mut aliases = AliasTable::new();
        assert_eq!(aliases.register_rename("A", "A"), Registration::SelfAlias);
        assert!(aliases.is_empty());
    }

    #[test]
    fn cycles_are_refused_at_registration() {
        let mut aliases = AliasTable::new();
        aliases.register_rename("B", "C");
        aliases.register_rename("A", "B");
        assert_eq!(aliases.register_rename("C", "A"), Registration::WouldCycle);
        assert_eq!(aliases.resolve("A"), Resolution::Canonical("C".into()));
    }

    #[test]
    fn cyclic_table_is_detected_during_resolution() {
        let table: AliasTable =
            serde_json::from_str(r#"{"A": "B", "B": "C", "C": "A"}"#).unwrap();
        assert_eq!(table.resolve("A"), Resolution::Cycle);
        assert_eq!(table.resolve("B"), Resolution::Cycle);
    }

    #[test]
    fn resolution_is_bounded_by_table_size() {
        let mut aliases = AliasTable::new();
        for i in (0..50).rev() {
            aliases.register_rename(&format!("id{i}"), &format!("id{}", i + 1));
        }
        assert_eq!(aliases.len(), 50);
        assert_eq!(aliases.resolve("id0"), Resolution::Canonical("id50".into()));
    }

    #[test]
    fn serializes_removals_as_null() {
        let mut aliases = AliasTable::new();
        aliases.register_rename("A", "B");
        aliases.register_removal("X");
        let json = serde_json::to_value(&aliases).unwrap();
        assert_eq!(json["A"], "B");
        assert!(json["X"].is_null());
        let pairs: Vec<_> = aliases.iter().collect();
        assert_eq!(pairs, vec![("A", Some("B")), ("X", None)]);
    }
}
