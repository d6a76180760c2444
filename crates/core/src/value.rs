//! Property value types for SmallTable
//!
//! This module defines:
//! - Value: the closed enum of property values an entity may hold
//!
//! ## Canonical Value Model
//!
//! The Value enum has exactly 3 variants:
//! - Int, String, Ref
//!
//! The set is closed by construction. There is no way to smuggle another
//! kind of value into an entity, so validation of the value domain is a
//! compile-time property rather than a runtime check. Different variants
//! are never equal, even when a conversion between them would be lossless.
//!
//! Cross-object links are always expressed as `Ref`. An object is never
//! embedded inside another object's properties, which keeps the graph
//! representable as a flat map keyed by `Reference`.

use crate::ident::Reference;
use serde::{Deserialize, Serialize};

/// Canonical property value for an entity
///
/// ## Type Equality
///
/// Different variants are never equal:
/// - `Int(1) != String("1")`
/// - `Ref(r)` never equals a numeric value, even one with the same bits
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    /// 64-bit signed integer
    Int(i64),
    /// UTF-8 string
    String(String),
    /// Reference to another object in the same repository
    Ref(Reference),
}

impl Value {
    /// Get the variant name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "Int",
            Value::String(_) => "String",
            Value::Ref(_) => "Ref",
        }
    }

    /// Check if this is an integer value
    pub fn is_int(&self) -> bool {
        matches!(self, Value::Int(_))
    }

    /// Check if this is a string value
    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    /// Check if this is a reference value
    pub fn is_ref(&self) -> bool {
        matches!(self, Value::Ref(_))
    }

    /// Get as i64 if this is an Int value
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as &str if this is a String value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as Reference if this is a Ref value
    pub fn as_reference(&self) -> Option<Reference> {
        match self {
            Value::Ref(r) => Some(*r),
            _ => None,
        }
    }
}

// ============================================================================
// From implementations for ergonomic API usage
// ============================================================================

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Reference> for Value {
    fn from(r: Reference) -> Self {
        Value::Ref(r)
    }
}
