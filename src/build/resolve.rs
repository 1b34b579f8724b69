//! Reference Resolution
//!
//! Local pointer references (`#/definitions/Tag`) are followed through the
//! document they appear in. Combinator branches and array items are resolved
//! eagerly; object properties are resolved later, when they are translated.

use serde_json::Value;

use crate::error::InterpretError;

/// `anyOf` / `oneOf` / `allOf`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    AnyOf,
    OneOf,
    AllOf,
}

impl Combinator {
    pub const ALL: [Combinator; 3] = [Combinator::AnyOf, Combinator::OneOf, Combinator::AllOf];

    pub fn key(self) -> &'static str {
        match self {
            Combinator::AnyOf => "anyOf",
            Combinator::OneOf => "oneOf",
            Combinator::AllOf => "allOf",
        }
    }
}

/// A schema node with its references followed
#[derive(Debug, Clone)]
pub struct ResolvedSchema<'n> {
    /// The concrete node (the reference target, if the node was a reference)
    pub schema: &'n Value,
    /// Last segment of the last reference followed
    pub name: Option<String>,
    pub shape: Shape<'n>,
}

#[derive(Debug, Clone)]
pub enum Shape<'n> {
    /// Scalar or object node
    Concrete,
    Combinator {
        op: Combinator,
        branches: Vec<ResolvedSchema<'n>>,
    },
    Array {
        items: Option<Box<ResolvedSchema<'n>>>,
    },
}

/// Resolves nodes against one document
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'d> {
    root: &'d Value,
}

impl<'d> Resolver<'d> {
    pub fn new(root: &'d Value) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &'d Value {
        self.root
    }

    /// Resolve `node`, which lives in this document or in a value derived from it
    pub fn resolve<'n>(&self, node: &'n Value) -> Result<ResolvedSchema<'n>, InterpretError>
    where
        'd: 'n,
    {
        self.resolve_inner(node, &mut Vec::new())
    }

    fn resolve_inner<'n>(&self, node: &'n Value, active: &mut Vec<String>) -> Result<ResolvedSchema<'n>, InterpretError>
    where
        'd: 'n,
    {
        let (schema, name, followed) = self.follow(node, active)?;

        let shape = if let Some((op, branches)) = combinator(schema) {
            let branches = branches
                .iter()
                .map(|branch| self.resolve_inner(branch, active))
                .collect::<Result<Vec<_>, _>>()?;
            Shape::Combinator { op, branches }
        } else if is_array(schema) {
            let items = match schema.get("items") {
                Some(items) if items.is_object() => Some(Box::new(self.resolve_inner(items, active)?)),
                _ => None,
            };
            Shape::Array { items }
        } else {
            Shape::Concrete
        };

        active.truncate(active.len() - followed);
        Ok(ResolvedSchema { schema, name, shape })
    }

    /// Follow a chain of references. Returns the target, the name of the
    /// last reference and how many references were pushed onto `active`.
    fn follow<'n>(
        &self,
        node: &'n Value,
        active: &mut Vec<String>,
    ) -> Result<(&'n Value, Option<String>, usize), InterpretError>
    where
        'd: 'n,
    {
        let mut current = node;
        let mut name = None;
        let mut followed = 0;

        while let Some(reference) = current.get("$ref") {
            let reference = reference.as_str().ok_or_else(|| InterpretError::Unsupported {
                path: String::new(),
                reason: format!("non-string $ref {}", reference),
            })?;
            if active.iter().any(|r| r == reference) {
                active.truncate(active.len() - followed);
                return Err(InterpretError::CyclicReference {
                    reference: reference.to_string(),
                });
            }
            let target = self.pointer(reference).inspect_err(|_| {
                active.truncate(active.len() - followed);
            })?;
            active.push(reference.to_string());
            followed += 1;
            name = reference_name(reference);
            current = target;
        }
        Ok((current, name, followed))
    }

    /// Look up a local reference
    pub fn pointer(&self, reference: &str) -> Result<&'d Value, InterpretError> {
        let broken = || InterpretError::BrokenReference {
            reference: reference.to_string(),
        };
        let path = reference.strip_prefix('#').ok_or_else(broken)?;
        self.root.pointer(path).ok_or_else(broken)
    }
}

/// Last segment of a reference, unescaped
pub fn reference_name(reference: &str) -> Option<String> {
    reference
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty() && *s != "#")
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
}

fn combinator(schema: &Value) -> Option<(Combinator, &Vec<Value>)> {
    Combinator::ALL
        .into_iter()
        .find_map(|op| schema.get(op.key()).and_then(Value::as_array).map(|b| (op, b)))
}

fn is_array(schema: &Value) -> bool {
    schema.get("type").and_then(Value::as_str) == Some("array")
        || (schema.get("type").is_none() && schema.get("items").is_some())
}
