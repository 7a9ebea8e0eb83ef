//! # Matcher — Declaring Which Entities a System Cares About
//!
//! A [`Matcher`] is an AND of [`Rule`]s. Each rule is a predicate over an
//! entity's component [`Bitmask`]:
//!
//! | Rule | Matches when |
//! |---|---|
//! | `all_of(ids)` | every id is attached |
//! | `any_of(ids)` | at least one id is attached |
//! | `exclude_of(ids)` | none of the ids is attached |
//! | `only_of(ids)` | exactly these ids are attached, nothing else |
//!
//! ```ignore
//! let m = all_of([pos.id(), vel.id()]).exclude_of([frozen.id()]);
//! ```
//!
//! ## Keys
//!
//! Every matcher has a canonical string key used to share one
//! [`Group`](super::group::Group) between equivalent matchers. Each rule's key
//! is `"<kind>:<id>-<id>..."` with sorted ids; the matcher key is the sorted
//! rule keys joined with `" && "`. Duplicate rules are dropped, so
//! `all_of(a).exclude_of(b)` and `exclude_of(b).all_of(a)` share a key.
//!
//! ## Watched Ids
//!
//! A group only needs to re-check an entity when one of the ids its matcher
//! mentions changes. `only_of` is the exception: attaching *any* other id can
//! break an exact match, so a matcher containing it [watches all](Matcher::watches_all)
//! ids.

use std::fmt;

use super::bitmask::Bitmask;
use super::component::{ComponentId, ComponentRegistry};
use crate::error::{EcsError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuleKind {
    AllOf,
    AnyOf,
    ExcludeOf,
    OnlyOf,
}

impl RuleKind {
    fn as_str(self) -> &'static str {
        match self {
            RuleKind::AllOf => "allOf",
            RuleKind::AnyOf => "anyOf",
            RuleKind::ExcludeOf => "excludeOf",
            RuleKind::OnlyOf => "onlyOf",
        }
    }
}

/// One predicate over an entity's component mask.
#[derive(Clone, PartialEq, Eq)]
pub struct Rule {
    kind: RuleKind,
    ids: Vec<ComponentId>,
    mask: Bitmask,
    key: String,
}

impl Rule {
    pub fn new(kind: RuleKind, ids: impl IntoIterator<Item = ComponentId>) -> Self {
        let mut ids: Vec<ComponentId> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        let mask = Bitmask::from_ids(ids.iter().copied());
        let joined = ids
            .iter()
            .map(ComponentId::to_string)
            .collect::<Vec<_>>()
            .join("-");
        let key = format!("{}:{joined}", kind.as_str());
        Self {
            kind,
            ids,
            mask,
            key,
        }
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    /// Sorted, de-duplicated ids.
    pub fn ids(&self) -> &[ComponentId] {
        &self.ids
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_match(&self, entity_mask: &Bitmask) -> bool {
        match self.kind {
            RuleKind::AllOf => self.mask.is_subset_of(entity_mask),
            RuleKind::AnyOf => self.mask.intersects(entity_mask),
            RuleKind::ExcludeOf => !self.mask.intersects(entity_mask),
            RuleKind::OnlyOf => self.mask == *entity_mask,
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// An AND of rules, with a canonical key and the set of ids it watches.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Matcher {
    rules: Vec<Rule>,
    key: String,
    watched: Vec<ComponentId>,
    watches_all: bool,
}

impl Matcher {
    /// An empty matcher. Binding it to a world fails until a rule is added.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        if let Err(pos) = self.rules.binary_search_by(|r| r.key.cmp(&rule.key)) {
            self.rules.insert(pos, rule);
            self.rebuild();
        }
        self
    }

    pub fn all_of(self, ids: impl IntoIterator<Item = ComponentId>) -> Self {
        self.rule(Rule::new(RuleKind::AllOf, ids))
    }

    pub fn any_of(self, ids: impl IntoIterator<Item = ComponentId>) -> Self {
        self.rule(Rule::new(RuleKind::AnyOf, ids))
    }

    pub fn exclude_of(self, ids: impl IntoIterator<Item = ComponentId>) -> Self {
        self.rule(Rule::new(RuleKind::ExcludeOf, ids))
    }

    pub fn only_of(self, ids: impl IntoIterator<Item = ComponentId>) -> Self {
        self.rule(Rule::new(RuleKind::OnlyOf, ids))
    }

    fn rebuild(&mut self) {
        self.key = self
            .rules
            .iter()
            .map(Rule::key)
            .collect::<Vec<_>>()
            .join(" && ");
        let mut watched: Vec<ComponentId> = self
            .rules
            .iter()
            .flat_map(|r| r.ids.iter().copied())
            .collect();
        watched.sort_unstable();
        watched.dedup();
        self.watched = watched;
        self.watches_all = self.rules.iter().any(|r| r.kind == RuleKind::OnlyOf);
    }

    /// True if every rule matches. Stops at the first failing rule.
    pub fn is_match(&self, entity_mask: &Bitmask) -> bool {
        self.rules.iter().all(|r| r.is_match(entity_mask))
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Sorted union of every id named by a rule.
    pub fn watched_ids(&self) -> &[ComponentId] {
        &self.watched
    }

    /// Whether a change to any component id can flip this matcher.
    pub fn watches_all(&self) -> bool {
        self.watches_all
    }

    /// Reject empty matchers and ids the registry never issued.
    pub fn validate(&self, registry: &ComponentRegistry) -> Result<()> {
        if self.rules.is_empty() {
            return Err(EcsError::EmptyMatcher);
        }
        match self.watched.iter().find(|&&id| !registry.is_registered(id)) {
            Some(&id) => Err(EcsError::UnregisteredComponent { id }),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Matcher({})", self.key)
    }
}

pub fn all_of(ids: impl IntoIterator<Item = ComponentId>) -> Matcher {
    Matcher::new().all_of(ids)
}

pub fn any_of(ids: impl IntoIterator<Item = ComponentId>) -> Matcher {
    Matcher::new().any_of(ids)
}

pub fn exclude_of(ids: impl IntoIterator<Item = ComponentId>) -> Matcher {
    Matcher::new().exclude_of(ids)
}

pub fn only_of(ids: impl IntoIterator<Item = ComponentId>) -> Matcher {
    Matcher::new().only_of(ids)
}
