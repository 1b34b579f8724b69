//! Lens/Patch Engine
//!
//! Rule-based correction of raw schema documents. Rules ([`Patcher`]s) look
//! at a document through read-only [`Lens`]es and queue [`Patch`]es; the
//! [`engine`] applies them and repeats until the document is stable.
//!
//! ```text
//! document ──► walk (pre-order) ──► PatchReports ──► apply ──► document'
//!                  ▲                                              │
//!                  └──────────── until no patches (≤ 10) ─────────┘
//! ```

pub mod engine;
pub mod lens;
pub mod patcher;
pub mod pointer;
pub mod rules;

pub use engine::{patch_document, PatchOutcome, MAX_ITERATIONS};
pub use lens::{ArrayLens, Lens, LensKind, ObjectLens, PatchSink, PathKey};
pub use patcher::{at_root, only_arrays, only_objects, Composite, PatchRegistry, Patcher, RuleProvider};
pub use rules::StandardRules;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Reason used for mechanical canonicalizations that are not upstream mistakes.
/// Reports carrying it are applied but left out of the build report.
pub const NO_MISTAKE: &str = "no mistake";

/// One JSON Patch (RFC 6902) operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Patch {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Move { from: String, path: String },
    Copy { from: String, path: String },
}

impl Patch {
    /// Target pointer
    pub fn path(&self) -> &str {
        match self {
            Patch::Add { path, .. }
            | Patch::Remove { path }
            | Patch::Replace { path, .. }
            | Patch::Move { path, .. }
            | Patch::Copy { path, .. } => path,
        }
    }

    pub fn op(&self) -> &'static str {
        match self {
            Patch::Add { .. } => "add",
            Patch::Remove { .. } => "remove",
            Patch::Replace { .. } => "replace",
            Patch::Move { .. } => "move",
            Patch::Copy { .. } => "copy",
        }
    }
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Patch::Move { from, path } | Patch::Copy { from, path } => {
                write!(f, "{} {} -> {}", self.op(), from, path)
            }
            _ => write!(f, "{} {}", self.op(), self.path()),
        }
    }
}

/// A patch together with where it came from and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchReport {
    /// Document the patch was produced for (resource type name)
    pub subject: String,
    /// Pointer of the lens that produced the patch
    pub path: String,
    pub patch: Patch,
    pub reason: String,
    /// Value at `path` before the patch
    pub old_value: Value,
    /// Value at `path` after the patch, `None` when removed
    pub new_value: Option<Value>,
}

impl PatchReport {
    /// Whether this report describes an upstream data error
    pub fn is_mistake(&self) -> bool {
        self.reason != NO_MISTAKE
    }
}

impl fmt::Display for PatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.patch, self.reason)
    }
}

/// Reports of one engine pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchSet(pub Vec<PatchReport>);

impl fmt::Display for PatchSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "  (empty)");
        }
        for report in &self.0 {
            writeln!(f, "  {}", report)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_patch_serializes_as_rfc6902() {
        let patch = Patch::Move {
            from: "/a".into(),
            path: "/b".into(),
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({"op": "move", "from": "/a", "path": "/b"})
        );
    }

    #[test]
    fn test_patch_set_display() {
        let set = PatchSet(vec![PatchReport {
            subject: "AWS::S3::Bucket".into(),
            path: "".into(),
            patch: Patch::Remove { path: "/oneOf".into() },
            reason: NO_MISTAKE.into(),
            old_value: json!({}),
            new_value: None,
        }]);
        assert_eq!(set.to_string(), "  remove /oneOf (no mistake)\n");
        assert!(!set.0[0].is_mistake());
    }
}
