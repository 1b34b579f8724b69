//! Canonical Resource Schemas
//!
//! Normalizes a large corpus of loosely-written JSON resource schemas into a
//! single, strongly-typed, deduplicated model.
//!
//! ## Pipeline
//!
//! ```text
//! registry/*.json ─┐
//!                  ├─► patch (canonicalize) ─► build (resolve, unify, translate)
//! legacy spec ─────┘                                  │
//!                                                     ▼
//!                                   SpecDatabase ─► passes ─► snapshot
//!                                                     │
//!                                                     └─► build report
//! ```
//!
//! - **store**: indexed in-memory graph of entities and relationships with
//!   checksummed snapshots
//! - **patch**: rule-driven rewriting of raw documents to a fixpoint
//! - **unify**: merges alternative schemas into one
//! - **build**: interprets patched documents into resources and shared types
//! - **model**: the canonical entities, database and model diffing

pub mod build;
pub mod checksum;
pub mod config;
pub mod error;
pub mod legacy;
pub mod model;
pub mod passes;
pub mod patch;
pub mod report;
pub mod store;
pub mod unify;

pub use build::{BuildOptions, ModelBuilder};
pub use checksum::Checksum;
pub use config::ModelConfig;
pub use error::{ModelError, Result};
pub use legacy::LegacySpec;
pub use model::{diff_databases, render_tree, DatabaseDiff, PropertyType, SpecDatabase};
pub use patch::{patch_document, PatchRegistry, StandardRules};
pub use report::BuildReport;
pub use store::{EntityId, Snapshot};
pub use unify::unify;
