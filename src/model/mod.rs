//! Canonical Model
//!
//! The concrete database built by the pipeline: resource types, their
//! reusable type definitions, services and regions, plus database diffing.

pub mod database;
pub mod diff;
pub mod types;

pub use database::SpecDatabase;
pub use diff::{diff_databases, render_tree, DatabaseDiff};
pub use types::{Property, PropertyMap, PropertyType, Region, Resource, Service, TypeDefinition, UsesType};
