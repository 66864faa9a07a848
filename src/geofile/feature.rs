use std::{collections::HashMap, fmt};

/// Value of a single attribute field. `Null` marks both null fields in the source file and columns a feature
/// does not have at all, e.g. after merging tables with different schemas.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Null,
    Text(String),
    Integer(i64),
    Real(f64),
}

impl AttributeValue {
    /// The value as it is shown to a user and compared against a selection. `None` for `Null`.
    pub fn as_label(&self) -> Option<String> {
        match self {
            AttributeValue::Null => None,
            AttributeValue::Text(text) => Some(text.clone()),
            AttributeValue::Integer(value) => Some(value.to_string()),
            AttributeValue::Real(value) => Some(value.to_string()),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_label() {
            Some(label) => write!(f, "{}", label),
            None => write!(f, "null"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Real(value)
    }
}

static NULL_VALUE: AttributeValue = AttributeValue::Null;

/// Attribute values of one feature keyed by field name.
pub type FeatureMap = HashMap<String, AttributeValue>;

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: geo::Geometry,
    pub attributes: FeatureMap,
}

impl Feature {
    /// Value of `column`, `Null` when the feature has no such attribute.
    pub fn attribute(&self, column: &str) -> &AttributeValue {
        self.attributes.get(column).unwrap_or(&NULL_VALUE)
    }
}

impl From<geo::Geometry> for Feature {
    fn from(value: geo::Geometry) -> Self {
        Self {
            geometry: value,
            attributes: FeatureMap::new(),
        }
    }
}
