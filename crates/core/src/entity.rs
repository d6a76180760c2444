//! Immutable entity bodies
//!
//! An `Entity` is one snapshot of an object's contents: a map from
//! property name to [`Value`], tagged with the object's own [`Reference`].
//! Entities are created once and never mutated; a changed object produces
//! a whole new entity body under a fresh `EntityId`.

use crate::error::{Error, Result};
use crate::ident::Reference;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Immutable snapshot of an object's contents
///
/// Two entities are equal iff their self reference and their property
/// maps are equal. Property-name ordering is not observable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    self_ref: Reference,
    properties: HashMap<String, Value>,
}

impl Entity {
    /// Create an entity from a reference and a complete property map
    pub fn new(self_ref: Reference, properties: HashMap<String, Value>) -> Self {
        Entity {
            self_ref,
            properties,
        }
    }

    /// Start building an entity for the given reference
    pub fn builder(self_ref: Reference) -> EntityBuilder {
        EntityBuilder::new(self_ref)
    }

    /// The reference this entity is a snapshot of
    pub fn self_reference(&self) -> Reference {
        self.self_ref
    }

    /// All properties of this entity
    pub fn properties(&self) -> &HashMap<String, Value> {
        &self.properties
    }

    /// Look up a single property by name
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

/// Builder for [`Entity`] values
///
/// Collects properties one at a time and rejects duplicate names, so an
/// entity assembled incrementally cannot silently drop an earlier value.
#[derive(Debug)]
pub struct EntityBuilder {
    self_ref: Reference,
    properties: HashMap<String, Value>,
}

impl EntityBuilder {
    /// Create a builder for an entity with the given self reference
    pub fn new(self_ref: Reference) -> Self {
        EntityBuilder {
            self_ref,
            properties: HashMap::new(),
        }
    }

    /// Add a property
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateProperty`] if a property with this name
    /// was already added.
    pub fn property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<Self> {
        let name = name.into();
        if self.properties.contains_key(&name) {
            return Err(Error::DuplicateProperty { name });
        }
        self.properties.insert(name, value.into());
        Ok(self)
    }

    /// Finish building the entity
    pub fn build(self) -> Entity {
        Entity::new(self.self_ref, self.properties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_collects_properties() {
        let entity = Entity::builder(Reference::new(1))
            .property("name", "alice")
            .unwrap()
            .property("age", 30i64)
            .unwrap()
            .build();

        assert_eq!(entity.self_reference(), Reference::new(1));
        assert_eq!(entity.property("name"), Some(&Value::String("alice".to_string())));
        assert_eq!(entity.property("age"), Some(&Value::Int(30)));
        assert_eq!(entity.property("missing"), None);
    }

    #[test]
    fn test_builder_rejects_duplicate_name() {
        let result = Entity::builder(Reference::new(1))
            .property("name", "alice")
            .unwrap()
            .property("name", "bob");

        assert!(matches!(
            result,
            Err(Error::DuplicateProperty { name }) if name == "name"
        ));
    }

    #[test]
    fn test_equality_requires_same_reference_and_properties() {
        let a = Entity::builder(Reference::new(1))
            .property("v", 1i64)
            .unwrap()
            .build();
        let b = Entity::builder(Reference::new(1))
            .property("v", 1i64)
            .unwrap()
            .build();
        let c = Entity::builder(Reference::new(2))
            .property("v", 1i64)
            .unwrap()
            .build();
        let d = Entity::builder(Reference::new(1))
            .property("v", 2i64)
            .unwrap()
            .build();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_reference_valued_property() {
        let target = Reference::new(9);
        let entity = Entity::builder(Reference::new(1))
            .property("next", target)
            .unwrap()
            .build();

        assert_eq!(
            entity.property("next").and_then(Value::as_reference),
            Some(target)
        );
    }

    #[test]
    fn test_empty_entity() {
        let entity = Entity::builder(Reference::new(5)).build();
        assert!(entity.properties().is_empty());
    }
}
