//! Configuration sources, container settings and `${...}` placeholders.
//!
//! Values are looked up across [`ConfigSource`]s in priority order through a
//! [`ConfigProvider`]. The provider feeds both [`ContainerConfig::load`] and the
//! default expression evaluator, [`PlaceholderEvaluator`].

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use indexmap::IndexMap;
use parking_lot::RwLock;
#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::{BeanError, BeanResult};
use crate::key::TypeKey;
use crate::traits::ExpressionEvaluator;
use crate::value::Value;

/// A configuration value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(untagged))]
pub enum ConfigValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<ConfigValue>),
    Object(HashMap<String, ConfigValue>),
}

impl ConfigValue {
    pub fn as_string(&self) -> BeanResult<&str> {
        match self {
            ConfigValue::String(s) => Ok(s),
            other => Err(mismatch(other, "a string")),
        }
    }

    pub fn as_i64(&self) -> BeanResult<i64> {
        match self {
            ConfigValue::Integer(i) => Ok(*i),
            ConfigValue::String(s) => s.trim().parse().map_err(|_| mismatch(self, "an integer")),
            other => Err(mismatch(other, "an integer")),
        }
    }

    pub fn as_bool(&self) -> BeanResult<bool> {
        match self {
            ConfigValue::Boolean(b) => Ok(*b),
            ConfigValue::String(s) => s.trim().parse().map_err(|_| mismatch(self, "a boolean")),
            other => Err(mismatch(other, "a boolean")),
        }
    }

    pub fn as_f64(&self) -> BeanResult<f64> {
        match self {
            ConfigValue::Float(f) => Ok(*f),
            ConfigValue::Integer(i) => Ok(*i as f64),
            other => Err(mismatch(other, "a number")),
        }
    }

    /// Text form used when a placeholder is embedded in a longer string.
    pub fn to_text(&self) -> String {
        match self {
            ConfigValue::Boolean(b) => b.to_string(),
            ConfigValue::Integer(i) => i.to_string(),
            ConfigValue::Float(f) => f.to_string(),
            ConfigValue::String(s) => s.clone(),
            ConfigValue::Array(items) => items.iter().map(ConfigValue::to_text).collect::<Vec<_>>().join(","),
            ConfigValue::Object(_) => "[object]".to_string(),
        }
    }

    /// Converts to a property value. Objects stay opaque.
    pub fn into_value(self) -> Value {
        match self {
            ConfigValue::Boolean(b) => Value::Boolean(b),
            ConfigValue::Integer(i) => Value::Integer(i),
            ConfigValue::Float(f) => Value::Float(f),
            ConfigValue::String(s) => Value::String(s),
            ConfigValue::Array(items) => Value::Array(items.into_iter().map(ConfigValue::into_value).collect()),
            ConfigValue::Object(map) => Value::Object(Arc::new(map)),
        }
    }

    /// Guesses the type of a raw string, as read from the environment.
    fn parse_raw(raw: String) -> Self {
        if let Ok(i) = raw.parse::<i64>() {
            ConfigValue::Integer(i)
        } else if let Ok(f) = raw.parse::<f64>() {
            ConfigValue::Float(f)
        } else if let Ok(b) = raw.parse::<bool>() {
            ConfigValue::Boolean(b)
        } else {
            ConfigValue::String(raw)
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Integer(value)
    }
}

impl From<i32> for ConfigValue {
    fn from(value: i32) -> Self {
        ConfigValue::Integer(value.into())
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Boolean(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Float(value)
    }
}

fn mismatch(value: &ConfigValue, expected: &str) -> BeanError {
    BeanError::msg(format!("config value {:?} is not {}", value, expected))
}

/// A source of configuration values.
pub trait ConfigSource: Send + Sync + fmt::Debug {
    fn get(&self, key: &str) -> Option<ConfigValue>;

    fn keys(&self) -> Vec<String>;
}

/// Environment variables.
///
/// Keys are upper-cased and dots become underscores, so with prefix `APP`
/// the key `db.pool_size` reads `APP_DB_POOL_SIZE`.
#[derive(Debug, Default, Clone)]
pub struct EnvironmentConfigSource {
    prefix: Option<String>,
}

impl EnvironmentConfigSource {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn variable(&self, key: &str) -> String {
        let key = key.replace(['.', '-'], "_").to_uppercase();
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix.to_uppercase(), key),
            None => key,
        }
    }
}

impl ConfigSource for EnvironmentConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        env::var(self.variable(key)).ok().map(ConfigValue::parse_raw)
    }

    fn keys(&self) -> Vec<String> {
        env::vars()
            .filter_map(|(key, _)| match &self.prefix {
                Some(prefix) => {
                    let head = format!("{}_", prefix.to_uppercase());
                    key.strip_prefix(&head).map(|rest| rest.to_lowercase())
                }
                None => Some(key.to_lowercase()),
            })
            .collect()
    }
}

/// In-memory key/value source.
///
/// ```
/// use ferrous_beans::{ConfigSource, ConfigValue, MapConfigSource};
///
/// let source = MapConfigSource::new().with("db.url", "postgres://localhost").with("db.pool", 4);
/// assert_eq!(source.get("db.pool"), Some(ConfigValue::Integer(4)));
/// ```
#[derive(Debug, Default, Clone)]
pub struct MapConfigSource {
    values: IndexMap<String, ConfigValue>,
}

impl MapConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.values.insert(key.into(), value.into());
    }
}

impl ConfigSource for MapConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.values.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

/// JSON document source. Nested objects are also reachable through dotted keys.
#[cfg(feature = "config")]
#[derive(Debug)]
pub struct JsonConfigSource {
    file_path: Option<String>,
    config: RwLock<Option<HashMap<String, ConfigValue>>>,
}

#[cfg(feature = "config")]
impl JsonConfigSource {
    /// Reads `file_path` lazily on first lookup.
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: Some(file_path.into()),
            config: RwLock::new(None),
        }
    }

    pub fn from_json(text: &str) -> BeanResult<Self> {
        let source = Self {
            file_path: None,
            config: RwLock::new(None),
        };
        *source.config.write() = Some(Self::parse(text)?);
        Ok(source)
    }

    /// Re-reads the backing file.
    pub fn reload(&self) -> BeanResult<()> {
        let Some(path) = &self.file_path else {
            return Ok(());
        };
        let content = std::fs::read_to_string(path).map_err(BeanError::other)?;
        let parsed = Self::parse(&content)?;
        *self.config.write() = Some(parsed);
        tracing::debug!(path = %path, "loaded JSON configuration");
        Ok(())
    }

    fn parse(text: &str) -> BeanResult<HashMap<String, ConfigValue>> {
        let root: HashMap<String, ConfigValue> = serde_json::from_str(text).map_err(BeanError::other)?;
        let mut flat = HashMap::new();
        for (key, value) in root {
            flatten_into(&mut flat, key, value);
        }
        Ok(flat)
    }
}

#[cfg(feature = "config")]
fn flatten_into(out: &mut HashMap<String, ConfigValue>, key: String, value: ConfigValue) {
    if let ConfigValue::Object(children) = &value {
        for (child, nested) in children {
            flatten_into(out, format!("{}.{}", key, child), nested.clone());
        }
    }
    out.insert(key, value);
}

#[cfg(feature = "config")]
impl ConfigSource for JsonConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        if self.config.read().is_none() {
            if let Err(err) = self.reload() {
                tracing::warn!(error = %err, "failed to load JSON configuration");
                return None;
            }
        }
        self.config.read().as_ref()?.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.config
            .read()
            .as_ref()
            .map(|cfg| cfg.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// Looks keys up across sources, first source wins.
pub struct ConfigProvider {
    sources: Vec<Box<dyn ConfigSource>>,
    cache: RwLock<AHashMap<String, ConfigValue>>,
}

impl fmt::Debug for ConfigProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigProvider")
            .field("sources", &self.sources)
            .field("cached", &self.cache.read().len())
            .finish()
    }
}

impl ConfigProvider {
    /// Provider without any source.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            cache: RwLock::new(AHashMap::new()),
        }
    }

    /// Higher priority sources are added first.
    pub fn add_source(&mut self, source: Box<dyn ConfigSource>) {
        self.sources.push(source);
        self.invalidate_cache();
    }

    pub fn with_source(mut self, source: impl ConfigSource + 'static) -> Self {
        self.add_source(Box::new(source));
        self
    }

    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        if let Some(value) = self.cache.read().get(key) {
            return Some(value.clone());
        }
        let value = self.sources.iter().find_map(|source| source.get(key))?;
        self.cache.write().insert(key.to_string(), value.clone());
        Some(value)
    }

    pub fn get_string(&self, key: &str) -> BeanResult<String> {
        self.require(key)?.as_string().map(str::to_string)
    }

    pub fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|_| default.to_string())
    }

    pub fn get_i64(&self, key: &str) -> BeanResult<i64> {
        self.require(key)?.as_i64()
    }

    pub fn get_i64_or(&self, key: &str, default: i64) -> i64 {
        self.get_i64(key).unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str) -> BeanResult<bool> {
        self.require(key)?.as_bool()
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    /// Forgets cached lookups so the next `get` consults the sources again.
    pub fn invalidate_cache(&self) {
        self.cache.write().clear();
    }

    pub fn all_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.sources.iter().flat_map(|s| s.keys()).collect();
        keys.sort();
        keys.dedup();
        keys
    }

    fn require(&self, key: &str) -> BeanResult<ConfigValue> {
        self.get(key)
            .ok_or_else(|| BeanError::msg(format!("configuration key '{}' not found", key)))
    }
}

impl Default for ConfigProvider {
    /// Environment variables only.
    fn default() -> Self {
        Self::new().with_source(EnvironmentConfigSource::new())
    }
}

/// Container-wide settings.
///
/// ```
/// use ferrous_beans::{ConfigProvider, ContainerConfig, MapConfigSource};
///
/// let provider = ConfigProvider::new().with_source(
///     MapConfigSource::new()
///         .with("container.allow_definition_overriding", false)
///         .with("container.max_creation_depth", 64),
/// );
/// let config = ContainerConfig::load(&provider);
///
/// assert!(!config.allow_definition_overriding);
/// assert!(config.allow_circular_references);
/// assert_eq!(config.max_creation_depth, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ContainerConfig {
    /// Registering a second definition under a taken name replaces the first
    pub allow_definition_overriding: bool,
    /// Singletons are exposed early to break property-injection cycles
    pub allow_circular_references: bool,
    /// Factory beans may be instantiated just to learn their product type
    pub allow_eager_init_for_type_matching: bool,
    /// Nested creations on one thread before `DepthExceeded`
    pub max_creation_depth: usize,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            allow_definition_overriding: true,
            allow_circular_references: true,
            allow_eager_init_for_type_matching: true,
            max_creation_depth: 1024,
        }
    }
}

impl ContainerConfig {
    /// Reads `container.*` keys, falling back to the defaults.
    pub fn load(config: &ConfigProvider) -> Self {
        let defaults = Self::default();
        Self {
            allow_definition_overriding: config
                .get_bool_or("container.allow_definition_overriding", defaults.allow_definition_overriding),
            allow_circular_references: config
                .get_bool_or("container.allow_circular_references", defaults.allow_circular_references),
            allow_eager_init_for_type_matching: config.get_bool_or(
                "container.allow_eager_init_for_type_matching",
                defaults.allow_eager_init_for_type_matching,
            ),
            max_creation_depth: config
                .get_i64("container.max_creation_depth")
                .ok()
                .and_then(|depth| usize::try_from(depth).ok())
                .unwrap_or(defaults.max_creation_depth),
        }
    }
}

/// Resolves `${key}` and `${key:default}` placeholders against a provider.
///
/// An expression consisting of a single placeholder keeps the type of the
/// configured value; placeholders embedded in text are substituted as text.
///
/// ```
/// use std::sync::Arc;
/// use ferrous_beans::{ConfigProvider, ExpressionEvaluator, MapConfigSource, PlaceholderEvaluator, Value};
///
/// let provider = ConfigProvider::new().with_source(MapConfigSource::new().with("db.port", 5432));
/// let evaluator = PlaceholderEvaluator::new(Arc::new(provider));
///
/// assert_eq!(evaluator.evaluate("${db.port}", None).unwrap(), Value::Integer(5432));
/// assert_eq!(
///     evaluator.evaluate("${db.host:localhost}:${db.port}", None).unwrap(),
///     Value::from("localhost:5432"),
/// );
/// assert!(evaluator.evaluate("${db.user}", None).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct PlaceholderEvaluator {
    provider: Arc<ConfigProvider>,
}

impl PlaceholderEvaluator {
    pub fn new(provider: Arc<ConfigProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<ConfigProvider> {
        &self.provider
    }

    fn lookup(&self, body: &str) -> BeanResult<ConfigValue> {
        let (key, default) = match body.split_once(':') {
            Some((key, default)) => (key.trim(), Some(default)),
            None => (body.trim(), None),
        };
        match (self.provider.get(key), default) {
            (Some(value), _) => Ok(value),
            (None, Some(default)) => Ok(ConfigValue::String(default.to_string())),
            (None, None) => Err(BeanError::msg(format!("could not resolve placeholder '{}'", key))),
        }
    }
}

impl Default for PlaceholderEvaluator {
    fn default() -> Self {
        Self::new(Arc::new(ConfigProvider::default()))
    }
}

impl ExpressionEvaluator for PlaceholderEvaluator {
    fn evaluate(&self, expression: &str, _expected: Option<TypeKey>) -> BeanResult<Value> {
        if let Some(body) = expression.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
            if !body.contains("${") && !body.contains('}') {
                return Ok(self.lookup(body)?.into_value());
            }
        }

        let mut out = String::with_capacity(expression.len());
        let mut rest = expression;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                return Err(BeanError::msg(format!("unterminated placeholder in '{}'", expression)));
            };
            out.push_str(&self.lookup(&after[..end])?.to_text());
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(Value::String(out))
    }
}
