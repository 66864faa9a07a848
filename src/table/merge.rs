use crate::geofile::feature::{AttributeValue, Feature};

use super::feature_table::FeatureTable;

/// Concatenate tables in input order. The schema of the result is the union of all columns in order of first
/// appearance, features of tables lacking a column get `AttributeValue::Null` for it. No feature is ever dropped.
///
/// All tables are expected to be in EPSG:4326 already, which the loader guarantees.
pub fn merge_tables<'a>(tables: impl IntoIterator<Item = &'a FeatureTable>) -> FeatureTable {
    let tables: Vec<&FeatureTable> = tables.into_iter().collect();

    let mut columns: Vec<String> = Vec::new();
    for table in &tables {
        for column in &table.columns {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }
    }

    let features: Vec<Feature> = tables
        .iter()
        .flat_map(|table| table.features.iter())
        .map(|feature| {
            let mut merged = feature.clone();
            for column in &columns {
                merged
                    .attributes
                    .entry(column.clone())
                    .or_insert(AttributeValue::Null);
            }
            merged
        })
        .collect();

    log::debug!(
        "Merged {} tables into {} features with {} columns",
        tables.len(),
        features.len(),
        columns.len()
    );
    FeatureTable::new(columns, features)
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use crate::{
        geofile::feature::{AttributeValue, Feature, FeatureMap},
        table::feature_table::FeatureTable,
    };

    use super::merge_tables;

    fn feature(x: f64, attributes: &[(&str, AttributeValue)]) -> Feature {
        Feature {
            geometry: geo::Geometry::Point(geo::Point::new(x, 0.0)),
            attributes: attributes
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect::<FeatureMap>(),
        }
    }

    fn table(columns: &[&str], features: Vec<Feature>) -> FeatureTable {
        FeatureTable::new(columns.iter().map(|c| c.to_string()).collect(), features)
    }

    #[fixture]
    fn tables() -> Vec<FeatureTable> {
        vec![
            table(
                &["species"],
                vec![
                    feature(1.0, &[("species", AttributeValue::from("Pine"))]),
                    feature(2.0, &[("species", AttributeValue::from("Oak"))]),
                ],
            ),
            table(
                &["species", "height"],
                vec![feature(3.0, &[("species", AttributeValue::from("Pine")), ("height", AttributeValue::Real(12.5))])],
            ),
            table(
                &["age", "species"],
                vec![feature(4.0, &[("age", AttributeValue::Integer(40)), ("species", AttributeValue::from("Birch"))])],
            ),
        ]
    }

    #[rstest]
    fn test_merge_fills_missing_columns(tables: Vec<FeatureTable>) {
        let merged = merge_tables(&tables[..2]);

        assert_eq!(merged.len(), 3);
        assert_eq!(merged.columns, vec!["species", "height"]);
        assert_eq!(merged.features[0].attribute("height"), &AttributeValue::Null);
        assert_eq!(merged.features[1].attribute("height"), &AttributeValue::Null);
        assert_eq!(merged.features[2].attribute("height"), &AttributeValue::Real(12.5));
        assert!(merged
            .features
            .iter()
            .all(|feature| feature.attributes.len() == merged.columns.len()));
    }

    #[rstest]
    fn test_merge_preserves_order(tables: Vec<FeatureTable>) {
        let merged = merge_tables(&tables);
        let xs: Vec<f64> = merged
            .geometries()
            .map(|geometry| match geometry {
                geo::Geometry::Point(point) => point.x(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(xs, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(merged.columns, vec!["species", "height", "age"]);
    }

    #[rstest]
    fn test_merge_is_associative(tables: Vec<FeatureTable>) {
        let left = merge_tables([&merge_tables(&tables[..2]), &tables[2]]);
        let right = merge_tables([&tables[0], &merge_tables(&tables[1..])]);
        let flat = merge_tables(&tables);
        assert_eq!(left, flat);
        assert_eq!(right, flat);
    }

    #[rstest]
    fn test_merge_nothing() {
        let merged = merge_tables(&Vec::<FeatureTable>::new());
        assert!(merged.is_empty());
        assert!(merged.columns.is_empty());
    }
}
