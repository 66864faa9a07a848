use crate::geofile::feature::Feature;

/// Ordered features sharing one schema, with geometries in EPSG:4326. Every feature holds exactly the table's
/// columns, columns a source file did not have are `AttributeValue::Null`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    pub columns: Vec<String>,
    pub features: Vec<Feature>,
}

impl FeatureTable {
    pub fn new(columns: Vec<String>, features: Vec<Feature>) -> Self {
        Self { columns, features }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|name| name == column)
    }

    pub fn geometries(&self) -> impl Iterator<Item = &geo::Geometry> {
        self.features.iter().map(|feature| &feature.geometry)
    }
}
