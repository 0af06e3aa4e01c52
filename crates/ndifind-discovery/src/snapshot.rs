//! Immutable point-in-time view of the known sources.

use crate::types::{RawSource, Source};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::ops::Deref;

/// The sources known at one instant.
///
/// A snapshot never changes once built. Names are unique within it: when a
/// backend reports the same name more than once, the last record wins and
/// keeps the position of the first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Snapshot {
    sources: Vec<Source>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a snapshot from backend records.
    pub fn from_raw<I>(records: I) -> Self
    where
        I: IntoIterator<Item = RawSource>,
    {
        Self::from_sources(records.into_iter().map(Source::from))
    }

    /// Builds a snapshot from sources, deduplicating by name.
    pub fn from_sources<I>(sources: I) -> Self
    where
        I: IntoIterator<Item = Source>,
    {
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut deduped: Vec<Source> = Vec::new();

        for source in sources {
            match positions.get(source.name()) {
                Some(&index) => deduped[index] = source,
                None => {
                    positions.insert(source.name().to_string(), deduped.len());
                    deduped.push(source);
                }
            }
        }

        Self { sources: deduped }
    }

    /// Looks a source up by name.
    pub fn get(&self, name: &str) -> Option<&Source> {
        self.sources.iter().find(|source| source.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Source names in snapshot order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(Source::name)
    }

    /// Computes what changed between `self` (the previous snapshot) and
    /// `next`, keyed by name.
    pub fn diff(&self, next: &Snapshot) -> SnapshotDiff {
        let previous_names: HashSet<&str> = self.names().collect();
        let next_names: HashSet<&str> = next.names().collect();

        let found = next
            .sources
            .iter()
            .filter(|source| !previous_names.contains(source.name()))
            .cloned()
            .collect();

        let lost = self
            .sources
            .iter()
            .filter(|source| !next_names.contains(source.name()))
            .cloned()
            .collect();

        SnapshotDiff { found, lost }
    }
}

impl Deref for Snapshot {
    type Target = [Source];

    fn deref(&self) -> &[Source] {
        &self.sources
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Source;
    type IntoIter = std::slice::Iter<'a, Source>;

    fn into_iter(self) -> Self::IntoIter {
        self.sources.iter()
    }
}

/// Sources that appeared and disappeared between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    /// In the new snapshot but not the previous one, in new-snapshot order
    pub found: Vec<Source>,

    /// In the previous snapshot but not the new one, in previous-snapshot order
    pub lost: Vec<Source>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.found.is_empty() && self.lost.is_empty()
    }
}
