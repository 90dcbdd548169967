//! Content comparison between the shadow list and the live collection.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use serde::Serialize;

use crate::config::ComparisonMode;

/// Replayed and live contents disagree.
///
/// `expected` is what the notifications add up to, `actual` is what the
/// collection really holds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Mismatch<T> {
    pub label: Option<String>,
    pub mode: ComparisonMode,
    pub expected: Vec<T>,
    pub actual: Vec<T>,
    /// In `expected` but not in `actual`
    pub missing: Vec<T>,
    /// In `actual` but not in `expected`
    pub unexpected: Vec<T>,
}

impl<T: Serialize> Mismatch<T> {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl<T: fmt::Debug> fmt::Display for Mismatch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.label.as_deref().unwrap_or("collection");
        let mode = match self.mode {
            ComparisonMode::Multiset => "multiset",
            ComparisonMode::Sequence => "sequence",
        };
        writeln!(f, "{} diverged from its change notifications ({} comparison)", label, mode)?;
        writeln!(f, "  expected: {:?}", self.expected)?;
        writeln!(f, "  actual:   {:?}", self.actual)?;
        if !self.missing.is_empty() {
            writeln!(f, "  missing:    {:?}", self.missing)?;
        }
        if !self.unexpected.is_empty() {
            writeln!(f, "  unexpected: {:?}", self.unexpected)?;
        }
        Ok(())
    }
}

/// Compare two snapshots. Returns `None` when they agree under `mode`.
pub fn compare<T>(
    expected: &[T],
    actual: &[T],
    mode: ComparisonMode,
    label: Option<&str>,
) -> Option<Mismatch<T>>
where
    T: Clone + Eq + Hash,
{
    let (missing, unexpected) = multiset_diff(expected, actual);
    let agrees = match mode {
        ComparisonMode::Multiset => missing.is_empty() && unexpected.is_empty(),
        ComparisonMode::Sequence => expected == actual,
    };
    if agrees {
        return None;
    }
    Some(Mismatch {
        label: label.map(str::to_string),
        mode,
        expected: expected.to_vec(),
        actual: actual.to_vec(),
        missing,
        unexpected,
    })
}

/// Elements of `left` not matched in `right`, and vice versa, counting
/// multiplicity. Results keep the order of their source slice.
fn multiset_diff<T>(left: &[T], right: &[T]) -> (Vec<T>, Vec<T>)
where
    T: Clone + Eq + Hash,
{
    let mut balance: HashMap<&T, isize> = HashMap::new();
    for item in left {
        *balance.entry(item).or_insert(0) += 1;
    }
    for item in right {
        *balance.entry(item).or_insert(0) -= 1;
    }

    let mut only_left = Vec::new();
    for item in left {
        if let Some(count) = balance.get_mut(item) {
            if *count > 0 {
                *count -= 1;
                only_left.push(item.clone());
            }
        }
    }
    let mut only_right = Vec::new();
    for item in right {
        if let Some(count) = balance.get_mut(item) {
            if *count < 0 {
                *count += 1;
                only_right.push(item.clone());
            }
        }
    }
    (only_left, only_right)
}
