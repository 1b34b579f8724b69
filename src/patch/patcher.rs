//! Patchers and their composition
//!
//! A patcher is a rule invoked at every position of a document. Its only
//! effect is to queue patches through the lens it is given.

use std::collections::HashMap;

use super::lens::Lens;

/// A document rewriting rule
pub trait Patcher {
    fn patch(&self, lens: &Lens<'_>);
}

impl<F> Patcher for F
where
    F: Fn(&Lens<'_>),
{
    fn patch(&self, lens: &Lens<'_>) {
        self(lens)
    }
}

/// Runs every patcher in turn at the same position
#[derive(Default)]
pub struct Composite(Vec<Box<dyn Patcher>>);

impl Composite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, patcher: impl Patcher + 'static) -> Self {
        self.0.push(Box::new(patcher));
        self
    }

    pub fn push(&mut self, patcher: Box<dyn Patcher>) {
        self.0.push(patcher);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Patcher for Composite {
    fn patch(&self, lens: &Lens<'_>) {
        for patcher in &self.0 {
            patcher.patch(lens);
        }
    }
}

// =============================================================================
// Guards
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum Guard {
    Objects,
    Arrays,
    Root,
}

/// Invokes the inner patcher only where the guard holds
pub struct Guarded<P> {
    guard: Guard,
    inner: P,
}

impl<P: Patcher> Patcher for Guarded<P> {
    fn patch(&self, lens: &Lens<'_>) {
        let applies = match self.guard {
            Guard::Objects => lens.is_object(),
            Guard::Arrays => lens.is_array(),
            Guard::Root => lens.is_root(),
        };
        if applies {
            self.inner.patch(lens);
        }
    }
}

pub fn only_objects<P: Patcher>(inner: P) -> Guarded<P> {
    Guarded {
        guard: Guard::Objects,
        inner,
    }
}

pub fn only_arrays<P: Patcher>(inner: P) -> Guarded<P> {
    Guarded {
        guard: Guard::Arrays,
        inner,
    }
}

pub fn at_root<P: Patcher>(inner: P) -> Guarded<P> {
    Guarded {
        guard: Guard::Root,
        inner,
    }
}

// =============================================================================
// Registry
// =============================================================================

/// A collaborator module contributing rules
pub trait RuleProvider {
    fn name(&self) -> &str;

    /// Rules applied to every document
    fn global_rules(&self) -> Vec<Box<dyn Patcher>>;

    /// Rules applied only to the named subjects
    fn subject_rules(&self) -> Vec<(String, Box<dyn Patcher>)> {
        Vec::new()
    }
}

/// All rules of a build, assembled once before it starts
#[derive(Default)]
pub struct PatchRegistry {
    global: Vec<Box<dyn Patcher>>,
    by_subject: HashMap<String, Vec<Box<dyn Patcher>>>,
    providers: Vec<String>,
}

impl PatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every rule of a provider
    pub fn install(&mut self, provider: &dyn RuleProvider) {
        self.global.extend(provider.global_rules());
        for (subject, rule) in provider.subject_rules() {
            self.by_subject.entry(subject).or_default().push(rule);
        }
        self.providers.push(provider.name().to_string());
    }

    pub fn register_global(&mut self, patcher: impl Patcher + 'static) {
        self.global.push(Box::new(patcher));
    }

    pub fn register_for(&mut self, subject: &str, patcher: impl Patcher + 'static) {
        self.by_subject
            .entry(subject.to_string())
            .or_default()
            .push(Box::new(patcher));
    }

    /// Names of installed providers, in installation order
    pub fn providers(&self) -> &[String] {
        &self.providers
    }

    /// Global rules followed by the subject's own rules
    pub fn patcher_for<'r>(&'r self, subject: &str) -> SubjectPatcher<'r> {
        SubjectPatcher {
            global: &self.global,
            specific: self.by_subject.get(subject).map(Vec::as_slice).unwrap_or_default(),
        }
    }
}

/// The rules that apply to one subject
pub struct SubjectPatcher<'r> {
    global: &'r [Box<dyn Patcher>],
    specific: &'r [Box<dyn Patcher>],
}

impl Patcher for SubjectPatcher<'_> {
    fn patch(&self, lens: &Lens<'_>) {
        for patcher in self.global.iter().chain(self.specific) {
            patcher.patch(lens);
        }
    }
}
