//! Fixpoint Patch Engine
//!
//! One pass walks the document pre-order and lets the patcher queue
//! patches. The queued patches are applied to a copy of the document and
//! the pass is repeated on the result until a pass queues nothing. A patch
//! that no longer applies (an earlier patch of the same batch already
//! changed its target) is skipped.
//!
//! Every patch of a batch addresses positions of the pre-pass document.
//! Array element removals are therefore applied last, highest index first
//! within each array.

use serde_json::Value;
use tracing::debug;

use super::lens::{Lens, PatchSink, PathKey};
use super::patcher::Patcher;
use super::pointer::{self, apply_patch};
use super::{Patch, PatchReport, PatchSet};
use crate::error::PatchError;

/// Passes allowed before a document is declared non-convergent
pub const MAX_ITERATIONS: usize = 10;

/// A stable document plus what it took to get there
#[derive(Debug, Clone)]
pub struct PatchOutcome {
    pub document: Value,
    /// Reports of the first pass only, relative to the source document
    pub reports: Vec<PatchReport>,
    /// Passes run, including the final empty one
    pub iterations: usize,
}

impl PatchOutcome {
    /// Reports that describe upstream mistakes
    pub fn mistakes(&self) -> impl Iterator<Item = &PatchReport> + '_ {
        self.reports.iter().filter(|r| r.is_mistake())
    }
}

/// Run one pass over `document` and return the queued patches
pub fn collect_patches(subject: &str, document: &Value, patcher: &dyn Patcher) -> Vec<PatchReport> {
    let sink = PatchSink::new(subject);
    walk(&Lens::root(document, &sink), patcher, &sink);
    sink.into_reports()
}

fn walk(lens: &Lens<'_>, patcher: &dyn Patcher, sink: &PatchSink) {
    patcher.patch(lens);
    match lens.value() {
        Value::Object(map) => {
            for (key, value) in map {
                if sink.is_removed(&pointer::join(lens.pointer(), key)) {
                    continue;
                }
                walk(&lens.child(PathKey::Property(key.clone()), value), patcher, sink);
            }
        }
        Value::Array(items) => {
            for (index, value) in items.iter().enumerate() {
                if sink.is_removed(&pointer::join(lens.pointer(), &index.to_string())) {
                    continue;
                }
                walk(&lens.child(PathKey::Index(index), value), patcher, sink);
            }
        }
        _ => {}
    }
}

/// Patch `document` until it is stable
///
/// The input is never modified. Fails when the document is still changing
/// after [`MAX_ITERATIONS`] passes, carrying the last two patch sets.
pub fn patch_document(subject: &str, document: &Value, patcher: &dyn Patcher) -> Result<PatchOutcome, PatchError> {
    let mut current = document.clone();
    let mut first: Option<Vec<PatchReport>> = None;
    let mut previous = PatchSet::default();
    let mut last = PatchSet::default();

    for iteration in 1..=MAX_ITERATIONS {
        let reports = collect_patches(subject, &current, patcher);
        if reports.is_empty() {
            debug!(subject, iteration, "Document stable");
            return Ok(PatchOutcome {
                document: current,
                reports: first.unwrap_or_default(),
                iterations: iteration,
            });
        }

        debug!(subject, iteration, patches = reports.len(), "Applying patches");
        let mut next = current.clone();
        for patch in application_order(&current, &reports) {
            if let Err(e) = apply_patch(&mut next, patch) {
                debug!(subject, patch = %patch, error = %e, "Skipping patch");
            }
        }
        current = next;

        if first.is_none() {
            first = Some(reports.clone());
        }
        previous = std::mem::replace(&mut last, PatchSet(reports));
    }

    Err(PatchError::NoConvergence {
        subject: subject.to_string(),
        iterations: MAX_ITERATIONS,
        last,
        previous,
    })
}

/// Patches of a batch in the order they are applied
fn application_order<'r>(document: &Value, reports: &'r [PatchReport]) -> Vec<&'r Patch> {
    let mut ordered = Vec::with_capacity(reports.len());
    let mut removals: Vec<(&str, usize, &Patch)> = Vec::new();
    for report in reports {
        match element_removal(document, &report.patch) {
            Some((array, index)) => removals.push((array, index, &report.patch)),
            None => ordered.push(&report.patch),
        }
    }
    removals.sort_by(|a, b| a.0.cmp(b.0).then(b.1.cmp(&a.1)));
    removals.dedup_by(|a, b| a.0 == b.0 && a.1 == b.1);
    ordered.extend(removals.into_iter().map(|(_, _, patch)| patch));
    ordered
}

/// Array pointer and index of a patch removing an array element
fn element_removal<'p>(document: &Value, patch: &'p Patch) -> Option<(&'p str, usize)> {
    let Patch::Remove { path } = patch else {
        return None;
    };
    let (array, token) = path.rsplit_once('/')?;
    let index = token.parse().ok()?;
    document.pointer(array)?.is_array().then_some((array, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn drop_comments(lens: &Lens<'_>) {
        if let Some(object) = lens.as_object() {
            if object.contains("$comment") {
                object.remove_property("$comment", "comments are not schema");
            }
        }
    }

    #[test]
    fn test_stable_document_takes_one_pass() {
        let doc = json!({"type": "object", "properties": {"A": {"type": "string"}}});
        let outcome = patch_document("Test", &doc, &drop_comments).unwrap();
        assert_eq!(outcome.iterations, 1);
        assert!(outcome.reports.is_empty());
        assert_eq!(outcome.document, doc);
    }

    #[test]
    fn test_removed_keys_are_not_visited() {
        let doc = json!({"$comment": {"$comment": "nested"}, "a": {"$comment": 1}});
        let reports = collect_patches("Test", &doc, &drop_comments);
        let paths: Vec<_> = reports.iter().map(|r| r.patch.path().to_string()).collect();
        assert_eq!(paths, vec!["/$comment", "/a/$comment"]);
    }

    #[test]
    fn test_input_is_not_mutated() {
        let doc = json!({"$comment": "x", "b": 1});
        let outcome = patch_document("Test", &doc, &drop_comments).unwrap();
        assert_eq!(outcome.document, json!({"b": 1}));
        assert_eq!(doc, json!({"$comment": "x", "b": 1}));
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.mistakes().count(), 1);
    }

    fn drop_nulls(lens: &Lens<'_>) {
        if let Some(array) = lens.as_array() {
            for (index, item) in array.items().iter().enumerate() {
                if item.is_null() {
                    array.remove_item(index, "null entry");
                }
            }
        }
    }

    #[test]
    fn test_several_removals_from_one_array() {
        let doc = json!({"xs": [null, null, "keep", null], "ys": ["a", null]});
        let outcome = patch_document("Test", &doc, &drop_nulls).unwrap();
        assert_eq!(outcome.document, json!({"xs": ["keep"], "ys": ["a"]}));
        assert_eq!(outcome.reports.len(), 4);
        assert_eq!(outcome.iterations, 2);
    }

    #[test]
    fn test_removal_queued_twice_applies_once() {
        let doc = json!({"xs": ["a", null, "b"]});
        let twice = crate::patch::patcher::Composite::new().with(drop_nulls).with(drop_nulls);
        let outcome = patch_document("Test", &doc, &twice).unwrap();
        assert_eq!(outcome.document, json!({"xs": ["a", "b"]}));
    }
}
