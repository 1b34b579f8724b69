//! Late-binding passes
//!
//! Run after every resource has been imported. They mutate or link existing
//! resources in place; identities never change.

use tracing::{debug, warn};

use crate::error::StoreError;
use crate::model::SpecDatabase;

/// Mark resources as stateful. Returns the names that matched no resource.
pub fn mark_stateful<S: AsRef<str>>(db: &mut SpecDatabase, type_names: &[S]) -> Result<Vec<String>, StoreError> {
    let mut unknown = Vec::new();
    for type_name in type_names {
        let type_name = type_name.as_ref();
        let found = db.resource_by_type_name(type_name)?.map(|r| r.id);
        match found {
            Some(id) => db.resources.update(id, |r| r.is_stateful = true)?,
            None => {
                warn!(resource = type_name, "Cannot mark unknown resource as stateful");
                unknown.push(type_name.to_string());
            }
        }
    }
    Ok(unknown)
}

/// Record that a region offers the given resources. Returns the names that
/// matched no resource.
pub fn link_region<S: AsRef<str>>(
    db: &mut SpecDatabase,
    region: &str,
    type_names: &[S],
) -> Result<Vec<String>, StoreError> {
    let region_id = db.upsert_region(region)?;
    let mut unknown = Vec::new();
    for type_name in type_names {
        let type_name = type_name.as_ref();
        let found = db.resource_by_type_name(type_name)?.map(|r| r.id);
        match found {
            Some(id) => {
                if db.region_has_resource.add(region_id, id, ()) {
                    debug!(region, resource = type_name, "Linked region");
                }
            }
            None => {
                warn!(region, resource = type_name, "Region lists unknown resource");
                unknown.push(type_name.to_string());
            }
        }
    }
    Ok(unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_stateful() {
        let mut db = SpecDatabase::new();
        let id = db.upsert_resource("AWS::S3::Bucket").unwrap();

        let unknown = mark_stateful(&mut db, &["AWS::S3::Bucket", "AWS::Nope::Nope"]).unwrap();

        assert_eq!(unknown, vec!["AWS::Nope::Nope"]);
        let bucket = db.resources.get(id).unwrap();
        assert!(bucket.is_stateful);
        assert_eq!(db.resource_by_type_name("AWS::S3::Bucket").unwrap().unwrap().id, id);
    }

    #[test]
    fn test_link_region_is_idempotent() {
        let mut db = SpecDatabase::new();
        let id = db.upsert_resource("AWS::S3::Bucket").unwrap();

        link_region(&mut db, "us-east-1", &["AWS::S3::Bucket"]).unwrap();
        link_region(&mut db, "us-east-1", &["AWS::S3::Bucket"]).unwrap();

        assert_eq!(db.regions.len(), 1);
        assert_eq!(db.region_has_resource.len(), 1);
        let region = db.region_by_name("us-east-1").unwrap().unwrap().id;
        let linked = db.region_has_resource.follow(region, &db.resources).unwrap();
        assert_eq!(linked[0].0.id, id);
    }
}
