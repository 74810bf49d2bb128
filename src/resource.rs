use crate::error::{Error, Result};
use crate::schema::{Attributes, ObjectSchema};
use crate::types::{Action, ResourceId, ResourceKind};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Registry entry describing one resource kind.
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    kind: ResourceKind,
    attributes: ObjectSchema,
    actions: HashSet<Action>,
}

impl ResourceSchema {
    /// Creates an entry for `kind` with its attribute shape and action vocabulary.
    pub fn new(
        kind: ResourceKind,
        attributes: ObjectSchema,
        actions: impl IntoIterator<Item = Action>,
    ) -> Self {
        Self {
            kind,
            attributes,
            actions: actions.into_iter().collect(),
        }
    }

    /// Returns the resource kind.
    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    /// Returns the attribute schema.
    pub fn attributes(&self) -> &ObjectSchema {
        &self.attributes
    }

    /// Returns the permitted action vocabulary.
    pub fn actions(&self) -> &HashSet<Action> {
        &self.actions
    }

    /// Returns whether `action` belongs to this kind's vocabulary.
    pub fn allows(&self, action: &str) -> bool {
        self.actions.contains(action)
    }
}

/// Authorizable object whose attributes conform to its kind's schema.
///
/// Only [`ResourceRegistry::parse`] constructs resources.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    kind: ResourceKind,
    id: ResourceId,
    attr: Attributes,
}

impl Resource {
    /// Returns the resource kind.
    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    /// Returns the resource identifier.
    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    /// Returns the validated attribute bag.
    pub fn attr(&self) -> &Attributes {
        &self.attr
    }

    /// Returns a single attribute.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attr.get(name)
    }
}

/// Closed catalog of resource kinds.
///
/// Built once from a fixed list and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    index: HashMap<ResourceKind, ResourceSchema>,
}

impl ResourceRegistry {
    /// Registers `entries`. When two entries share a kind, the later one wins.
    pub fn new(entries: impl IntoIterator<Item = ResourceSchema>) -> Self {
        let mut index = HashMap::new();
        for entry in entries {
            let kind = entry.kind.clone();
            if index.insert(kind.clone(), entry).is_some() {
                tracing::warn!(kind = %kind, "duplicate resource kind; later entry replaces earlier");
            }
        }
        Self { index }
    }

    /// Returns whether `kind` is registered.
    pub fn has(&self, kind: &str) -> bool {
        self.index.contains_key(kind)
    }

    /// Returns the entry registered for `kind`.
    pub fn get(&self, kind: &str) -> Result<&ResourceSchema> {
        self.index.get(kind).ok_or_else(|| Error::ResourceNotFound {
            kind: kind.to_string(),
        })
    }

    /// Iterates registered kinds in no particular order.
    pub fn kinds(&self) -> impl Iterator<Item = &ResourceKind> {
        self.index.keys()
    }

    /// Returns whether `action` is in the vocabulary of `kind`. Unknown kinds allow nothing.
    pub fn is_action_allowed(&self, kind: &str, action: &str) -> bool {
        self.index
            .get(kind)
            .is_some_and(|entry| entry.allows(action))
    }

    /// Validates `raw` against the schema of `kind` and constructs a resource.
    pub fn parse(&self, kind: &str, id: impl AsRef<str>, raw: &Value) -> Result<Resource> {
        let entry = self.get(kind)?;
        let id = ResourceId::new(id)?;
        let attr = entry.attributes.validate(raw)?;
        Ok(Resource {
            kind: entry.kind.clone(),
            id,
            attr,
        })
    }
}
