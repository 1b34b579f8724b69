//! Error types for the canonical schema model
//!
//! Three families of failure exist. Structural defects never surface here:
//! the patch engine corrects them and only leaves a report. Interpretation
//! failures ([`InterpretError`]) are recorded against a resource and skipped.
//! Everything else is an invariant violation and aborts the build.

use thiserror::Error;

use crate::patch::PatchSet;
use crate::store::EntityId;

/// Result type for model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Top-level error for a build or a snapshot operation
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Patch error: {0}")]
    Patch(#[from] PatchError),

    #[error("Interpretation error: {0}")]
    Interpret(#[from] InterpretError),

    #[error("Invalid document for {subject}: {message}")]
    InvalidDocument { subject: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Graph store errors. All of them are invariant violations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{collection}: no entity with id {id}")]
    NotFound { collection: &'static str, id: EntityId },

    #[error("{collection}: no index named '{index}'")]
    NoSuchIndex { collection: &'static str, index: String },

    #[error("{collection}: expected exactly one match for {query}, found {count}")]
    NotUnique {
        collection: &'static str,
        query: String,
        count: usize,
    },

    #[error("{collection}: duplicate entity id {id}")]
    DuplicateId { collection: &'static str, id: EntityId },

    #[error("Snapshot format {found} is not compatible with {expected}")]
    IncompatibleSnapshot {
        found: semver::Version,
        expected: semver::Version,
    },

    #[error("Snapshot checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Snapshot section '{section}' could not be decoded: {source}")]
    Decode {
        section: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Patch engine errors
#[derive(Error, Debug)]
pub enum PatchError {
    #[error(
        "Patching {subject} did not converge after {iterations} iterations\n\
         last patch set:\n{last}\nprevious patch set:\n{previous}"
    )]
    NoConvergence {
        subject: String,
        iterations: usize,
        last: PatchSet,
        previous: PatchSet,
    },
}

/// Failure to apply a single JSON patch operation to a document
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApplyError {
    #[error("Invalid pointer '{0}'")]
    InvalidPointer(String),

    #[error("Nothing at '{0}'")]
    Missing(String),

    #[error("Parent of '{0}' is not a container")]
    NotAContainer(String),

    #[error("Array index out of range at '{0}'")]
    IndexOutOfRange(String),

    #[error("Cannot move '{from}' into its own child '{path}'")]
    MoveIntoChild { from: String, path: String },
}

/// Schema unification errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnifyError {
    #[error("Cannot unify {left} with {right}")]
    KindMismatch { left: String, right: String },

    #[error("Cannot unify reference {left} with {right}")]
    ReferenceMismatch { left: String, right: String },

    #[error("Cannot unify record-like object with map-like object")]
    ObjectShapeMismatch,

    #[error("Unsupported schema shape: {0}")]
    Unsupported(String),

    #[error("Property '{name}': {source}")]
    Property {
        name: String,
        #[source]
        source: Box<UnifyError>,
    },

    #[error("Array items: {0}")]
    Items(Box<UnifyError>),

    #[error("Nothing to unify")]
    Empty,
}

/// Failure to interpret one schema fragment as a property type
#[derive(Error, Debug)]
pub enum InterpretError {
    #[error("Reference {reference} does not resolve")]
    BrokenReference { reference: String },

    #[error("Reference {reference} is cyclic")]
    CyclicReference { reference: String },

    #[error("Unsupported schema at {path}: {reason}")]
    Unsupported { path: String, reason: String },

    #[error("Attribute {name} not found in schema")]
    MissingAttribute { name: String },

    #[error("Unification failed: {0}")]
    Unify(#[from] UnifyError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl InterpretError {
    /// Store failures indicate a defect in the model, not in the source data
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}
