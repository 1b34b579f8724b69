//! Lenses: read-only cursors into a document
//!
//! A lens exposes the value at one position, its pointer and its ancestors.
//! Mutation is only ever *requested*: the intent operations append a
//! [`PatchReport`] to the pass's [`PatchSink`] and leave the document alone.

use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;

use super::pointer;
use super::{Patch, PatchReport};

// =============================================================================
// Patch Sink
// =============================================================================

/// Append-only collector for the patches of one traversal
#[derive(Debug)]
pub struct PatchSink {
    subject: String,
    reports: RefCell<Vec<PatchReport>>,
    removed: RefCell<HashSet<String>>,
}

impl PatchSink {
    pub fn new(subject: &str) -> Self {
        Self {
            subject: subject.to_string(),
            reports: RefCell::new(Vec::new()),
            removed: RefCell::new(HashSet::new()),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Whether a removal of `pointer` has been requested in this pass
    pub fn is_removed(&self, pointer: &str) -> bool {
        self.removed.borrow().contains(pointer)
    }

    pub fn len(&self) -> usize {
        self.reports.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.borrow().is_empty()
    }

    pub fn into_reports(self) -> Vec<PatchReport> {
        self.reports.into_inner()
    }

    fn record(&self, path: &str, patch: Patch, reason: &str, old_value: &Value, new_value: Option<Value>) {
        self.reports.borrow_mut().push(PatchReport {
            subject: self.subject.clone(),
            path: path.to_string(),
            patch,
            reason: reason.to_string(),
            old_value: old_value.clone(),
            new_value,
        });
    }

    fn mark_removed(&self, pointer: String) {
        self.removed.borrow_mut().insert(pointer);
    }
}

// =============================================================================
// Lens
// =============================================================================

/// How a lens is reached from its parent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathKey {
    Property(String),
    Index(usize),
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathKey::Property(name) => write!(f, "{}", name),
            PathKey::Index(i) => write!(f, "{}", i),
        }
    }
}

/// Cursor on one position of a document
pub struct Lens<'a> {
    root: &'a Value,
    value: &'a Value,
    pointer: String,
    key: Option<PathKey>,
    parent: Option<&'a Lens<'a>>,
    sink: &'a PatchSink,
}

impl<'a> Lens<'a> {
    /// Lens on the document root
    pub fn root(document: &'a Value, sink: &'a PatchSink) -> Self {
        Self {
            root: document,
            value: document,
            pointer: String::new(),
            key: None,
            parent: None,
            sink,
        }
    }

    /// Lens on a child position of this one
    pub fn child<'p>(&'p self, key: PathKey, value: &'p Value) -> Lens<'p> {
        let pointer = pointer::join(&self.pointer, &key.to_string());
        Lens {
            root: self.root,
            value,
            pointer,
            key: Some(key),
            parent: Some(self),
            sink: self.sink,
        }
    }

    pub fn value(&self) -> &'a Value {
        self.value
    }

    pub fn document(&self) -> &'a Value {
        self.root
    }

    pub fn pointer(&self) -> &str {
        &self.pointer
    }

    pub fn key(&self) -> Option<&PathKey> {
        self.key.as_ref()
    }

    /// Property name under which this lens sits, if its parent is an object
    pub fn property_name(&self) -> Option<&str> {
        match &self.key {
            Some(PathKey::Property(name)) => Some(name),
            _ => None,
        }
    }

    pub fn parent(&self) -> Option<&'a Lens<'a>> {
        self.parent
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Parent, grandparent, ... up to the root
    pub fn ancestors(&self) -> impl Iterator<Item = &'a Lens<'a>> {
        std::iter::successors(self.parent, |lens| lens.parent)
    }

    pub fn subject(&self) -> &str {
        self.sink.subject()
    }

    pub fn is_object(&self) -> bool {
        self.value.is_object()
    }

    pub fn is_array(&self) -> bool {
        self.value.is_array()
    }

    /// Shape-specific view of this position
    pub fn kind(&self) -> LensKind<'_> {
        match self.value {
            Value::Object(map) => LensKind::Object(ObjectLens { lens: self, map }),
            Value::Array(items) => LensKind::Array(ArrayLens { lens: self, items }),
            _ => LensKind::Scalar,
        }
    }

    pub fn as_object(&self) -> Option<ObjectLens<'_>> {
        match self.kind() {
            LensKind::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<ArrayLens<'_>> {
        match self.kind() {
            LensKind::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Request replacing the whole value at this position
    pub fn replace_value(&self, value: Value, reason: &str) {
        let patch = Patch::Replace {
            path: self.pointer.clone(),
            value: value.clone(),
        };
        self.sink.record(&self.pointer, patch, reason, self.value, Some(value));
    }

    /// Request removing this position from its parent
    pub fn remove(&self, reason: &str) {
        let patch = Patch::Remove {
            path: self.pointer.clone(),
        };
        self.sink.record(&self.pointer, patch, reason, self.value, None);
        self.sink.mark_removed(self.pointer.clone());
    }
}

impl fmt::Debug for Lens<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lens")
            .field("pointer", &self.pointer)
            .field("value", &self.value)
            .finish()
    }
}

/// Closed set of lens shapes
pub enum LensKind<'l> {
    Object(ObjectLens<'l>),
    Array(ArrayLens<'l>),
    Scalar,
}

// =============================================================================
// Object Lens
// =============================================================================

/// Lens positioned on an object
pub struct ObjectLens<'l> {
    lens: &'l Lens<'l>,
    map: &'l Map<String, Value>,
}

impl<'l> ObjectLens<'l> {
    pub fn lens(&self) -> &'l Lens<'l> {
        self.lens
    }

    pub fn map(&self) -> &'l Map<String, Value> {
        self.map
    }

    pub fn get(&self, key: &str) -> Option<&'l Value> {
        self.map.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    fn property_pointer(&self, key: &str) -> String {
        pointer::join(self.lens.pointer(), key)
    }

    fn record(&self, patch: Patch, reason: &str, after: Map<String, Value>) {
        self.lens.sink.record(
            self.lens.pointer(),
            patch,
            reason,
            self.lens.value,
            Some(Value::Object(after)),
        );
    }

    /// Request removing a property. The engine will not descend into it this pass.
    pub fn remove_property(&self, key: &str, reason: &str) {
        let path = self.property_pointer(key);
        let mut after = self.map.clone();
        after.remove(key);
        self.record(Patch::Remove { path: path.clone() }, reason, after);
        self.lens.sink.mark_removed(path);
    }

    /// Request renaming a property
    pub fn rename_property(&self, from: &str, to: &str, reason: &str) {
        let mut after = self.map.clone();
        if let Some(value) = after.remove(from) {
            after.insert(to.to_string(), value);
        }
        let patch = Patch::Move {
            from: self.property_pointer(from),
            path: self.property_pointer(to),
        };
        self.record(patch, reason, after);
    }

    /// Request adding (or overwriting) a property
    pub fn add_property(&self, key: &str, value: Value, reason: &str) {
        let mut after = self.map.clone();
        after.insert(key.to_string(), value.clone());
        let patch = Patch::Add {
            path: self.property_pointer(key),
            value,
        };
        self.record(patch, reason, after);
    }

    /// Request replacing an existing property's value
    pub fn replace_property(&self, key: &str, value: Value, reason: &str) {
        let mut after = self.map.clone();
        after.insert(key.to_string(), value.clone());
        let patch = Patch::Replace {
            path: self.property_pointer(key),
            value,
        };
        self.record(patch, reason, after);
    }
}

// =============================================================================
// Array Lens
// =============================================================================

/// Lens positioned on an array
pub struct ArrayLens<'l> {
    lens: &'l Lens<'l>,
    items: &'l [Value],
}

impl<'l> ArrayLens<'l> {
    pub fn lens(&self) -> &'l Lens<'l> {
        self.lens
    }

    pub fn items(&self) -> &'l [Value] {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Request removing one element
    pub fn remove_item(&self, index: usize, reason: &str) {
        let path = pointer::join(self.lens.pointer(), &index.to_string());
        let mut after = self.items.to_vec();
        if index < after.len() {
            after.remove(index);
        }
        self.lens.sink.record(
            self.lens.pointer(),
            Patch::Remove { path: path.clone() },
            reason,
            self.lens.value,
            Some(Value::Array(after)),
        );
        self.lens.sink.mark_removed(path);
    }
}
