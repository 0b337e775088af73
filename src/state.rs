//! Ordered parameter-name → tensor mapping.
//!
//! A [`StateDict`] is the in-memory form of a model's named parameters:
//! unique dotted keys in declaration order. Backed by a plain
//! `Vec<(String, Tensor)>` — parameter counts here are adapter-sized,
//! and insertion order is worth keeping for stable serialization.

use crate::error::{AdaptarError, Result};
use ndarray::ArrayD;

/// Tensor payload: dynamic-dimensional f32 array.
pub type Tensor = ArrayD<f32>;

/// What a non-strict load tolerated.
///
/// A clean report means every key matched a slot of the same shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Target keys the incoming state did not provide.
    pub missing: Vec<String>,
    /// Incoming keys with no slot in the target.
    pub unexpected: Vec<String>,
    /// Incoming keys whose tensor shape differs from the slot; skipped.
    pub mismatched: Vec<String>,
}

impl LoadReport {
    /// Whether every key matched exactly.
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty() && self.mismatched.is_empty()
    }
}

/// Insertion-ordered mapping from parameter path to tensor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDict {
    entries: Vec<(String, Tensor)>,
}

impl StateDict {
    /// Create an empty state dict.
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Create an empty state dict with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: Vec::with_capacity(capacity) }
    }

    /// Insert a tensor under `name`.
    ///
    /// An existing entry is replaced in place (overwrite wins, position
    /// preserved) and the previous tensor is returned.
    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) -> Option<Tensor> {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, tensor)),
            None => {
                self.entries.push((name, tensor));
                None
            }
        }
    }

    /// Get a tensor by name.
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    /// Get a mutable tensor by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Tensor> {
        self.entries.iter_mut().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    /// Whether an entry named `name` exists.
    pub fn contains_key(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the mapping is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.entries.iter().map(|(n, t)| (n.as_str(), t))
    }

    /// Iterate keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Load `incoming` into this mapping's existing slots.
    ///
    /// Non-strict (`strict = false`): keys without a slot, and keys whose
    /// shape differs from the slot, are skipped and reported — the
    /// partial-match contract that lets an adapter-only state load into
    /// a full model. Strict: the first shape conflict is a
    /// [`AdaptarError::ShapeMismatch`]; any missing or unexpected key is
    /// a [`AdaptarError::KeyMismatch`]. A strict failure leaves the
    /// mapping untouched.
    pub fn merge_from(&mut self, incoming: &StateDict, strict: bool) -> Result<LoadReport> {
        let mut report = LoadReport::default();

        for (name, tensor) in incoming.iter() {
            match self.get(name) {
                Some(slot) if slot.shape() == tensor.shape() => {}
                Some(slot) => {
                    if strict {
                        return Err(AdaptarError::ShapeMismatch {
                            name: name.to_string(),
                            expected: slot.shape().to_vec(),
                            actual: tensor.shape().to_vec(),
                        });
                    }
                    report.mismatched.push(name.to_string());
                }
                None => report.unexpected.push(name.to_string()),
            }
        }
        for name in self.keys() {
            if !incoming.contains_key(name) {
                report.missing.push(name.to_string());
            }
        }

        if strict && (!report.missing.is_empty() || !report.unexpected.is_empty()) {
            return Err(AdaptarError::KeyMismatch {
                missing: report.missing,
                unexpected: report.unexpected,
            });
        }

        for (name, tensor) in incoming.iter() {
            if let Some(slot) = self.get_mut(name) {
                if slot.shape() == tensor.shape() {
                    *slot = tensor.clone();
                }
            }
        }

        Ok(report)
    }
}

impl FromIterator<(String, Tensor)> for StateDict {
    fn from_iter<I: IntoIterator<Item = (String, Tensor)>>(iter: I) -> Self {
        let mut state = StateDict::new();
        for (name, tensor) in iter {
            state.insert(name, tensor);
        }
        state
    }
}

impl IntoIterator for StateDict {
    type Item = (String, Tensor);
    type IntoIter = std::vec::IntoIter<(String, Tensor)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
