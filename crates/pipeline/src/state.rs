//! Shared state container and per-field merge policies.
//!
//! Every stage returns a patch; the executor owns all merging. Each pipeline
//! declares its state and patch types once, and its [`PipelineState::merge`]
//! picks one policy per field from the helpers below:
//!
//! | Policy | Helper | Used for |
//! |--------|--------|----------|
//! | replace | [`replace`], [`replace_value`] | scalars, `output`, `review_results` |
//! | shallow-merge | [`shallow_merge`] | progress and title maps |
//! | append-or-replace | [`append_or_replace`] | collected results |
//! | monotonic error | [`merge_error`] | `error` |
//!
//! Merging is total: no helper can fail. Patch types only name the fields a
//! pipeline declares, so an unknown field is a compile error rather than a
//! merge-time one.

use std::collections::BTreeMap;

/// State threaded through one pipeline run.
pub trait PipelineState: Clone + Send + Sync + 'static {
    /// Partial update returned by a stage. `Default` is the empty patch.
    type Patch: Default + Send + 'static;

    /// Applies `patch` using each field's merge policy.
    fn merge(&mut self, patch: Self::Patch);

    /// The run's error, if any stage has set one.
    fn error(&self) -> Option<&str>;

    /// A patch that sets only the error field.
    fn error_patch(message: String) -> Self::Patch;

    /// Returns `true` if `patch` writes the run's final output.
    fn writes_output(patch: &Self::Patch) -> bool;
}

/// Replace policy for optional fields: a `Some` patch overwrites.
pub fn replace<T>(slot: &mut Option<T>, patch: Option<T>) {
    if let Some(value) = patch {
        *slot = Some(value);
    }
}

/// Replace policy for fields that always hold a value.
pub fn replace_value<T>(slot: &mut T, patch: Option<T>) {
    if let Some(value) = patch {
        *slot = value;
    }
}

/// Shallow-merge policy: patch keys overwrite, absent keys are preserved.
pub fn shallow_merge<K: Ord, V>(map: &mut BTreeMap<K, V>, patch: Option<BTreeMap<K, V>>) {
    if let Some(entries) = patch {
        map.extend(entries);
    }
}

/// Patch for a list field under the append-or-replace policy.
#[derive(Debug, Clone, PartialEq)]
pub enum ListPatch<T> {
    /// Replace the whole list.
    Replace(Vec<T>),
    /// Append one element.
    Append(T),
}

/// Append-or-replace policy: an array replaces, a single element appends.
pub fn append_or_replace<T>(list: &mut Vec<T>, patch: Option<ListPatch<T>>) {
    match patch {
        Some(ListPatch::Replace(items)) => *list = items,
        Some(ListPatch::Append(item)) => list.push(item),
        None => {}
    }
}

/// Error policy: replace, but never clear. A blank message is ignored.
pub fn merge_error(slot: &mut Option<String>, patch: Option<String>) {
    if let Some(message) = patch.filter(|m| !m.trim().is_empty()) {
        *slot = Some(message);
    }
}
