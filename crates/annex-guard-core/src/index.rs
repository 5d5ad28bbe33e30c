//! Reference index over the Annex II dataset.
//!
//! A [`ReferenceIndex`] is built once per dataset version and never
//! mutated afterwards, so any number of matchers can read it without
//! synchronization. Reloading the dataset builds a new index and swaps
//! a new [`DatasetSnapshot`] in; see
//! [`AnalysisPipeline::reload_dataset`](crate::pipeline::AnalysisPipeline::reload_dataset).
//!
//! # Keys
//!
//! Every canonical name, synonym, and CAS number is normalized with
//! [`normalize`] and registered in the exact-lookup map. Names and
//! synonyms are also fuzzy candidates; CAS numbers are exact-only.
//!
//! When two rows with different regulation identifiers claim the same key,
//! the first row wins and a [`DatasetIntegrityError`] is recorded.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::DatasetIntegrityError;
use crate::models::{DatasetVersion, ReferenceEntry};
use crate::normalize::{normalize, NormalizedToken};

/// Names that are always SAFE, even when they match a reference entry.
pub const DEFAULT_SAFE_OVERRIDES: &[&str] = &[
    "water",
    "aqua",
    "glycerin",
    "glycerol",
    "salt",
    "sodium chloride",
    "sugar",
    "stearic acid",
    "citric acid",
];

/// Origin of a lookup key within its entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    CanonicalName,
    Synonym,
    Cas,
}

/// A fuzzy-match candidate: one normalized name or synonym.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub key: String,
    /// Character count of `key`, used for length bucketing.
    pub chars: usize,
    pub entry: Arc<ReferenceEntry>,
}

/// Immutable, queryable view of one dataset version.
#[derive(Debug)]
pub struct ReferenceIndex {
    version: DatasetVersion,
    entries: Vec<Arc<ReferenceEntry>>,
    exact: HashMap<String, Arc<ReferenceEntry>>,
    /// Sorted by `(chars, key)`.
    candidates: Vec<Candidate>,
    conflicts: Vec<DatasetIntegrityError>,
}

impl ReferenceIndex {
    /// Build an index from parsed dataset rows.
    pub fn build<I>(version: DatasetVersion, rows: I) -> Self
    where
        I: IntoIterator<Item = ReferenceEntry>,
    {
        let mut index = ReferenceIndex {
            version,
            entries: Vec::new(),
            exact: HashMap::new(),
            candidates: Vec::new(),
            conflicts: Vec::new(),
        };

        for row in rows {
            let entry = Arc::new(row);
            index.register(&entry.canonical_name, &entry, KeyKind::CanonicalName);
            for synonym in &entry.synonyms {
                index.register(synonym, &entry, KeyKind::Synonym);
            }
            if let Some(cas) = &entry.cas_number {
                index.register(cas, &entry, KeyKind::Cas);
            }
            index.entries.push(entry);
        }

        index
            .candidates
            .sort_by(|a, b| a.chars.cmp(&b.chars).then_with(|| a.key.cmp(&b.key)));

        tracing::debug!(
            version = %index.version,
            entries = index.entries.len(),
            keys = index.exact.len(),
            conflicts = index.conflicts.len(),
            "built reference index"
        );
        index
    }

    /// An index with no entries; classifies everything as SAFE.
    pub fn empty(version: DatasetVersion) -> Self {
        Self::build(version, Vec::new())
    }

    fn register(&mut self, raw: &str, entry: &Arc<ReferenceEntry>, kind: KeyKind) {
        let key = normalize(raw).into_string();
        if key.is_empty() {
            return;
        }

        if let Some(existing) = self.exact.get(&key) {
            if existing.regulation_id != entry.regulation_id {
                let conflict = DatasetIntegrityError {
                    key: key.clone(),
                    kept_regulation: existing.regulation_id.clone(),
                    dropped_regulation: entry.regulation_id.clone(),
                };
                tracing::warn!(
                    key = %conflict.key,
                    kept = %conflict.kept_regulation,
                    dropped = %conflict.dropped_regulation,
                    "dataset integrity conflict, first entry wins"
                );
                self.conflicts.push(conflict);
            }
            return;
        }

        self.exact.insert(key.clone(), Arc::clone(entry));
        if kind != KeyKind::Cas {
            self.candidates.push(Candidate {
                chars: key.chars().count(),
                key,
                entry: Arc::clone(entry),
            });
        }
    }

    pub fn version(&self) -> &DatasetVersion {
        &self.version
    }

    /// Exact lookup of a normalized name, synonym, or CAS number.
    pub fn lookup_exact(&self, key: &NormalizedToken) -> Option<&Arc<ReferenceEntry>> {
        self.exact.get(key.as_str())
    }

    /// All fuzzy candidates, ordered by key length then key.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Fuzzy candidates whose key length lies in `min_chars..=max_chars`.
    pub fn candidates_by_length(&self, min_chars: usize, max_chars: usize) -> &[Candidate] {
        let lo = self.candidates.partition_point(|c| c.chars < min_chars);
        let hi = self.candidates.partition_point(|c| c.chars <= max_chars);
        if lo >= hi {
            return &[];
        }
        &self.candidates[lo..hi]
    }

    /// Dataset rows in load order.
    pub fn entries(&self) -> &[Arc<ReferenceEntry>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Key collisions found during construction.
    pub fn conflicts(&self) -> &[DatasetIntegrityError] {
        &self.conflicts
    }
}

/// Normalized names forced to SAFE regardless of any match.
#[derive(Debug, Clone, Default)]
pub struct SafeOverrideSet {
    names: HashSet<String>,
}

impl SafeOverrideSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in set of common safe ingredients.
    pub fn with_defaults() -> Self {
        Self::from_names(DEFAULT_SAFE_OVERRIDES.iter().copied())
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        set.extend(names);
        set
    }

    pub fn extend<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let key = normalize(name.as_ref()).into_string();
            if !key.is_empty() {
                self.names.insert(key);
            }
        }
    }

    pub fn contains(&self, token: &NormalizedToken) -> bool {
        self.names.contains(token.as_str())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A reference index and its override set, pinned together as one version.
#[derive(Debug, Clone)]
pub struct DatasetSnapshot {
    pub index: Arc<ReferenceIndex>,
    pub overrides: Arc<SafeOverrideSet>,
}

impl DatasetSnapshot {
    pub fn new(index: ReferenceIndex, overrides: SafeOverrideSet) -> Self {
        Self {
            index: Arc::new(index),
            overrides: Arc::new(overrides),
        }
    }

    pub fn version(&self) -> &DatasetVersion {
        self.index.version()
    }
}
