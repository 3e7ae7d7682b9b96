//! Ordered property assignments of a definition.

use crate::value::ValueSource;

/// One property assignment: a name and the source of its value.
#[derive(Debug, Clone)]
pub struct PropertyValue {
    name: String,
    source: ValueSource,
}

impl PropertyValue {
    pub fn new(name: impl Into<String>, source: impl Into<ValueSource>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &ValueSource {
        &self.source
    }

    pub fn into_parts(self) -> (String, ValueSource) {
        (self.name, self.source)
    }
}

/// Property assignments in declaration order.
///
/// Adding a property whose name is already present replaces the earlier
/// assignment in place, keeping its position.
///
/// ```rust
/// use ferrous_beans::{PropertyValues, ValueSource};
///
/// let mut props = PropertyValues::new();
/// props.add("host", ValueSource::literal("localhost"));
/// props.add("port", ValueSource::literal(80));
/// props.add("host", ValueSource::literal("example.org"));
///
/// let names: Vec<_> = props.iter().map(|p| p.name()).collect();
/// assert_eq!(names, ["host", "port"]);
/// assert_eq!(props.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PropertyValues {
    values: Vec<PropertyValue>,
}

impl PropertyValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, source: impl Into<ValueSource>) -> &mut Self {
        self.push(PropertyValue::new(name, source));
        self
    }

    pub fn push(&mut self, value: PropertyValue) {
        match self.values.iter_mut().find(|v| v.name == value.name) {
            Some(existing) => *existing = value,
            None => self.values.push(value),
        }
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values.iter().find(|v| v.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<PropertyValue> {
        let idx = self.values.iter().position(|v| v.name == name)?;
        Some(self.values.remove(idx))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PropertyValue> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parent assignments first, overridden by name with `self`'s.
    pub(crate) fn merged_over(&self, parent: &PropertyValues) -> PropertyValues {
        let mut merged = parent.clone();
        for value in &self.values {
            merged.push(value.clone());
        }
        merged
    }
}

impl IntoIterator for PropertyValues {
    type Item = PropertyValue;
    type IntoIter = std::vec::IntoIter<PropertyValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl<'a> IntoIterator for &'a PropertyValues {
    type Item = &'a PropertyValue;
    type IntoIter = std::slice::Iter<'a, PropertyValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl FromIterator<PropertyValue> for PropertyValues {
    fn from_iter<I: IntoIterator<Item = PropertyValue>>(iter: I) -> Self {
        let mut values = PropertyValues::new();
        for value in iter {
            values.push(value);
        }
        values
    }
}
