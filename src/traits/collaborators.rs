//! External collaborators consumed by the container.
//!
//! Each collaborator is injected through [`ContainerBuilder`](crate::ContainerBuilder);
//! the defaults here cover literal conversion and name generation.

use crate::definition::BeanDefinition;
use crate::error::{BeanError, BeanResult};
use crate::key::TypeKey;
use crate::value::Value;

/// Evaluates deferred property expressions.
///
/// The container hands every [`ValueSource::Expression`](crate::ValueSource::Expression)
/// to the evaluator at population time. The built-in implementation is
/// [`PlaceholderEvaluator`](crate::PlaceholderEvaluator).
pub trait ExpressionEvaluator: Send + Sync {
    fn evaluate(&self, expression: &str, expected: Option<TypeKey>) -> BeanResult<Value>;
}

/// Converts resolved values to the type a property or argument expects.
pub trait ConversionService: Send + Sync {
    fn can_convert(&self, value: &Value, target: TypeKey) -> bool;

    fn convert(&self, value: Value, target: TypeKey) -> BeanResult<Value>;
}

/// Produces a name for definitions registered without one.
pub trait NameGenerator: Send + Sync {
    /// `is_taken` reports whether a candidate name is already registered.
    fn generate_name(&self, definition: &BeanDefinition, is_taken: &dyn Fn(&str) -> bool) -> String;
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Target {
    Text,
    Integer,
    Float,
    Boolean,
}

fn target_of(key: TypeKey) -> Option<Target> {
    let id = key.id();
    macro_rules! is {
        ($($t:ty),*) => { false $(|| id == std::any::TypeId::of::<$t>())* };
    }
    if is!(String, str) {
        Some(Target::Text)
    } else if is!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize) {
        Some(Target::Integer)
    } else if is!(f32, f64) {
        Some(Target::Float)
    } else if is!(bool) {
        Some(Target::Boolean)
    } else {
        None
    }
}

/// Literal conversions between strings, integers, floats and booleans.
///
/// Targets the service does not know about are passed through unchanged.
///
/// ```rust
/// use ferrous_beans::{ConversionService, DefaultConversionService, TypeKey, Value};
///
/// let conversion = DefaultConversionService;
/// let port = conversion.convert(Value::from("8080"), TypeKey::of::<u16>()).unwrap();
/// assert_eq!(port, Value::Integer(8080));
///
/// let flag = conversion.convert(Value::from("on"), TypeKey::of::<bool>()).unwrap();
/// assert_eq!(flag, Value::Boolean(true));
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultConversionService;

impl DefaultConversionService {
    fn failed(value: &Value, target: TypeKey) -> BeanError {
        BeanError::msg(format!("cannot convert {:?} to {}", value, target.name()))
    }

    fn parse_bool(text: &str) -> Option<bool> {
        match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConversionService for DefaultConversionService {
    fn can_convert(&self, value: &Value, target: TypeKey) -> bool {
        match (target_of(target), value) {
            (None, _) => true,
            (Some(_), Value::Null) => true,
            (Some(Target::Text), Value::String(_) | Value::Integer(_) | Value::Float(_) | Value::Boolean(_)) => true,
            (Some(Target::Integer), Value::Integer(_) | Value::String(_) | Value::Float(_)) => true,
            (Some(Target::Float), Value::Float(_) | Value::Integer(_) | Value::String(_)) => true,
            (Some(Target::Boolean), Value::Boolean(_) | Value::String(_) | Value::Integer(_)) => true,
            _ => false,
        }
    }

    fn convert(&self, value: Value, target: TypeKey) -> BeanResult<Value> {
        let Some(kind) = target_of(target) else {
            return Ok(value);
        };
        let converted = match (kind, &value) {
            (_, Value::Null) => Some(Value::Null),
            (Target::Text, Value::String(_)) => Some(value.clone()),
            (Target::Text, Value::Integer(i)) => Some(Value::String(i.to_string())),
            (Target::Text, Value::Float(f)) => Some(Value::String(f.to_string())),
            (Target::Text, Value::Boolean(b)) => Some(Value::String(b.to_string())),
            (Target::Integer, Value::Integer(_)) => Some(value.clone()),
            (Target::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::Integer),
            (Target::Integer, Value::Float(f)) if f.fract() == 0.0 => Some(Value::Integer(*f as i64)),
            (Target::Float, Value::Float(_)) => Some(value.clone()),
            (Target::Float, Value::Integer(i)) => Some(Value::Float(*i as f64)),
            (Target::Float, Value::String(s)) => s.trim().parse::<f64>().ok().map(Value::Float),
            (Target::Boolean, Value::Boolean(_)) => Some(value.clone()),
            (Target::Boolean, Value::String(s)) => Self::parse_bool(s).map(Value::Boolean),
            (Target::Boolean, Value::Integer(i)) => Some(Value::Boolean(*i != 0)),
            _ => None,
        };
        converted.ok_or_else(|| Self::failed(&value, target))
    }
}

/// Lower-camel-cased short type name, with a `#n` suffix when taken.
///
/// ```rust
/// use ferrous_beans::{BeanDefinition, DefaultNameGenerator, NameGenerator};
///
/// #[derive(Default)]
/// struct UserService;
///
/// let definition = BeanDefinition::builder::<UserService>().default_constructor().build();
/// let generator = DefaultNameGenerator;
///
/// assert_eq!(generator.generate_name(&definition, &|_| false), "userService");
/// assert_eq!(generator.generate_name(&definition, &|n| n == "userService"), "userService#1");
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultNameGenerator;

impl DefaultNameGenerator {
    fn base_name(definition: &BeanDefinition) -> String {
        let short = definition.bean_type().map(|k| k.short_name()).unwrap_or("bean");
        let mut chars = short.chars();
        match chars.next() {
            Some(first) => first.to_lowercase().chain(chars).collect(),
            None => "bean".to_string(),
        }
    }
}

impl NameGenerator for DefaultNameGenerator {
    fn generate_name(&self, definition: &BeanDefinition, is_taken: &dyn Fn(&str) -> bool) -> String {
        let base = Self::base_name(definition);
        if !is_taken(&base) {
            return base;
        }
        (1..)
            .map(|n| format!("{}#{}", base, n))
            .find(|candidate| !is_taken(candidate))
            .unwrap_or(base)
    }
}
