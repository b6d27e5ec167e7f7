//! Per-line condition map
//!
//! Keyed by file then line so that merge stages can find every record of a
//! file without scanning the whole map.

use std::collections::BTreeMap;

use crate::location::LineKey;
use crate::types::{ConditionSet, Literal};

/// Lines of one file and their gating conditions
pub type FileConditions = BTreeMap<u32, ConditionSet>;

/// Map from line identity to the literal set gating that line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionMap {
    files: BTreeMap<String, FileConditions>,
    records: usize,
}

impl ConditionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union `literals` into the record for `key`, creating it if needed.
    /// Returns the number of literals that were new.
    pub fn union_into<'a, I>(&mut self, key: &LineKey, literals: I) -> usize
    where
        I: IntoIterator<Item = &'a Literal>,
    {
        let lines = self.files.entry(key.file.clone()).or_default();
        if !lines.contains_key(&key.line) {
            self.records += 1;
        }
        lines.entry(key.line).or_default().union_with(literals)
    }

    /// Insert a record, merging with any existing one
    pub fn insert(&mut self, key: LineKey, conditions: ConditionSet) -> usize {
        self.union_into(&key, conditions.iter())
    }

    pub fn get(&self, key: &LineKey) -> Option<&ConditionSet> {
        self.files.get(&key.file).and_then(|lines| lines.get(&key.line))
    }

    pub fn contains(&self, key: &LineKey) -> bool {
        self.get(key).is_some()
    }

    /// Records already present for `file`
    pub fn file(&self, file: &str) -> Option<&FileConditions> {
        self.files.get(file).filter(|lines| !lines.is_empty())
    }

    pub(crate) fn file_mut(&mut self, file: &str) -> Option<&mut FileConditions> {
        self.files.get_mut(file)
    }

    /// Union `literals` into every existing record of `file`.
    /// Returns the number of literals added across all lines.
    pub fn union_into_file(&mut self, file: &str, literals: &[Literal]) -> usize {
        self.file_mut(file)
            .map(|lines| {
                lines
                    .values_mut()
                    .map(|set| set.union_with(literals))
                    .sum::<usize>()
            })
            .unwrap_or(0)
    }

    /// All files, in path order
    pub fn files(&self) -> &BTreeMap<String, FileConditions> {
        &self.files
    }

    /// Every record, ordered by path then line
    pub fn iter(&self) -> impl Iterator<Item = (LineKey, &ConditionSet)> {
        self.files.iter().flat_map(|(file, lines)| {
            lines
                .iter()
                .map(move |(line, set)| (LineKey::new(file.as_str(), *line), set))
        })
    }

    /// Number of line records
    pub fn len(&self) -> usize {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }
}

impl FromIterator<(LineKey, ConditionSet)> for ConditionMap {
    fn from_iter<T: IntoIterator<Item = (LineKey, ConditionSet)>>(iter: T) -> Self {
        let mut map = ConditionMap::new();
        for (key, set) in iter {
            map.insert(key, set);
        }
        map
    }
}
