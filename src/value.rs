//! Property and argument values.
//!
//! A [`ValueSource`] is what a definition declares (a literal, a reference to
//! another bean, or a deferred expression); a [`Value`] is what the container
//! hands to the bean once the source has been resolved.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::handle::{AnyArc, BeanHandle};
use crate::key::TypeKey;

/// A resolved property or argument value.
#[derive(Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    /// Reference to another bean (possibly early-exposed)
    Bean(BeanHandle),
    /// Arbitrary object, e.g. produced by an expression evaluator or conversion
    Object(AnyArc),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<&BeanHandle> {
        match self {
            Value::Bean(handle) => Some(handle),
            _ => None,
        }
    }

    /// Referenced bean viewed as `T`.
    pub fn bean<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.as_handle().and_then(|h| h.get::<T>())
    }

    /// Referenced bean viewed as `I` (usually `dyn Trait`).
    pub fn bean_as<I: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<I>> {
        self.as_handle().and_then(|h| h.get_as::<I>())
    }

    /// Wrapped object downcast to `T`.
    pub fn object<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Value::Object(obj) => obj.clone().downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Short label of the variant, used in conversion errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Bean(_) => "bean",
            Value::Object(_) => "object",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Bean(a), Value::Bean(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Boolean(b) => write!(f, "Boolean({})", b),
            Value::Integer(i) => write!(f, "Integer({})", i),
            Value::Float(x) => write!(f, "Float({})", x),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Array(items) => f.debug_tuple("Array").field(items).finish(),
            Value::Bean(handle) => write!(f, "Bean({})", handle.name()),
            Value::Object(_) => f.write_str("Object(..)"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<BeanHandle> for Value {
    fn from(v: BeanHandle) -> Self {
        Value::Bean(v)
    }
}

/// Reference from one definition to another bean.
///
/// A reference names its target, describes it by type (optionally narrowed by a
/// qualifier), or both; when both are given the name is used and the type is
/// checked.
///
/// # Examples
///
/// ```rust
/// use ferrous_beans::BeanReference;
///
/// trait Store: Send + Sync {}
///
/// let by_name = BeanReference::to("dataSource");
/// let by_type = BeanReference::of_type::<dyn Store>().qualified("primary").optional();
///
/// assert_eq!(by_name.name(), Some("dataSource"));
/// assert!(by_name.is_required());
/// assert_eq!(by_type.qualifier(), Some("primary"));
/// assert!(!by_type.is_required());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BeanReference {
    name: Option<String>,
    required_type: Option<TypeKey>,
    qualifier: Option<String>,
    required: bool,
}

impl BeanReference {
    /// Reference by bean name.
    pub fn to(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            required_type: None,
            qualifier: None,
            required: true,
        }
    }

    /// Reference by required type.
    pub fn of_type<T: ?Sized + 'static>() -> Self {
        Self::of_type_key(TypeKey::of::<T>())
    }

    pub fn of_type_key(key: TypeKey) -> Self {
        Self {
            name: None,
            required_type: Some(key),
            qualifier: None,
            required: true,
        }
    }

    /// Adds a type check to a by-name reference (or a type to a qualified one).
    pub fn with_type<T: ?Sized + 'static>(mut self) -> Self {
        self.required_type = Some(TypeKey::of::<T>());
        self
    }

    /// Narrows a by-type reference with a qualifier.
    pub fn qualified(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// A missing optional reference resolves to [`Value::Null`].
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn required_type(&self) -> Option<TypeKey> {
        self.required_type
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Human readable description used in error messages.
    pub fn describe(&self) -> String {
        match (&self.name, &self.required_type, &self.qualifier) {
            (Some(name), _, _) => format!("bean '{}'", name),
            (None, Some(key), Some(q)) => format!("{} qualified '{}'", key.name(), q),
            (None, Some(key), None) => key.name().to_string(),
            (None, None, _) => "<unspecified>".to_string(),
        }
    }
}

/// Declared, not yet resolved value of a property or constructor argument.
#[derive(Debug, Clone)]
pub enum ValueSource {
    /// Used as-is (after optional conversion to the target type)
    Literal(Value),
    /// Resolved through the container
    Reference(BeanReference),
    /// Handed to the expression evaluator at population time
    Expression {
        expression: String,
        expected: Option<TypeKey>,
    },
}

impl ValueSource {
    pub fn literal(value: impl Into<Value>) -> Self {
        ValueSource::Literal(value.into())
    }

    pub fn reference(name: impl Into<String>) -> Self {
        ValueSource::Reference(BeanReference::to(name))
    }

    pub fn expression(expression: impl Into<String>) -> Self {
        ValueSource::Expression {
            expression: expression.into(),
            expected: None,
        }
    }

    /// Expression whose result should be converted to `T`.
    pub fn typed_expression<T: ?Sized + 'static>(expression: impl Into<String>) -> Self {
        ValueSource::Expression {
            expression: expression.into(),
            expected: Some(TypeKey::of::<T>()),
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, ValueSource::Reference(_))
    }
}

impl From<BeanReference> for ValueSource {
    fn from(r: BeanReference) -> Self {
        ValueSource::Reference(r)
    }
}

impl From<Value> for ValueSource {
    fn from(v: Value) -> Self {
        ValueSource::Literal(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_conversions_from_primitives() {
        assert_eq!(Value::from(3), Value::Integer(3));
        assert_eq!(Value::from("x"), Value::String("x".into()));
        assert_eq!(Value::from(vec![Value::from(true)]).as_array().map(|a| a.len()), Some(1));
        assert_eq!(Value::Integer(2).as_f64(), Some(2.0));
    }

    #[test]
    fn reference_descriptions() {
        assert_eq!(BeanReference::to("a").describe(), "bean 'a'");
        let typed = BeanReference::of_type::<u8>().qualified("q");
        assert_eq!(typed.describe(), "u8 qualified 'q'");
    }
}
