pub mod center;
pub mod color;
pub mod html;
pub mod overlay;

use std::{collections::BTreeSet, path::Path};

use serde::Deserialize;

use crate::{geofile::geojson::write_features_to_geojson, table::feature_table::FeatureTable};

use self::{center::compute_center, color::ColorMap, overlay::compose_overlays, overlay::Overlay};

fn default_zoom() -> u8 {
    11
}

fn default_boundary_label() -> String {
    "Boundary".to_string()
}

fn default_boundary_color() -> String {
    "black".to_string()
}

fn default_boundary_width() -> f64 {
    2.0
}

fn default_species_width() -> f64 {
    1.0
}

fn default_fill_opacity() -> f64 {
    0.6
}

fn default_title() -> String {
    "Species map".to_string()
}

/// Fixed styling of the rendered map.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct MapStyle {
    #[serde(default = "default_zoom")]
    pub zoom: u8,
    /// Tooltip of the boundary outline.
    #[serde(default = "default_boundary_label")]
    pub boundary_label: String,
    #[serde(default = "default_boundary_color")]
    pub boundary_color: String,
    #[serde(default = "default_boundary_width")]
    pub boundary_width: f64,
    #[serde(default = "default_species_width")]
    pub species_width: f64,
    #[serde(default = "default_fill_opacity")]
    pub fill_opacity: f64,
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for MapStyle {
    fn default() -> Self {
        Self {
            zoom: default_zoom(),
            boundary_label: default_boundary_label(),
            boundary_color: default_boundary_color(),
            boundary_width: default_boundary_width(),
            species_width: default_species_width(),
            fill_opacity: default_fill_opacity(),
            title: default_title(),
        }
    }
}

/// Everything the render surface needs: where to look, how close, and what to draw in which order.
#[derive(Debug, Clone, PartialEq)]
pub struct MapView {
    /// Lon/lat center, `None` when there is nothing to center on.
    pub center: Option<geo::Point>,
    pub zoom: u8,
    pub overlays: Vec<Overlay>,
}

impl MapView {
    pub fn to_geojson_features(&self) -> Vec<geojson::Feature> {
        self.overlays
            .iter()
            .map(|overlay| overlay.to_geojson_feature())
            .collect()
    }

    pub fn write_geojson(&self, output_filepath: &Path) -> std::io::Result<()> {
        write_features_to_geojson(self.to_geojson_features(), output_filepath)
    }
}

/// Compose the map for one render pass. The center comes from the filtered features, or from the boundary when no
/// feature matched. Colors are assigned to every selected species, matched or not.
pub fn compose_map(
    boundary: Option<&FeatureTable>,
    filtered: &FeatureTable,
    column: &str,
    selected: &BTreeSet<String>,
    style: &MapStyle,
) -> MapView {
    let center = if filtered.is_empty() {
        boundary.and_then(|boundary| compute_center(boundary.geometries()))
    } else {
        compute_center(filtered.geometries())
    };
    let colors = ColorMap::for_species(selected);
    let overlays = compose_overlays(boundary, filtered, column, &colors, style);
    log::info!(
        "Composed {} overlays for {} selected species",
        overlays.len(),
        colors.len()
    );
    MapView {
        center,
        zoom: style.zoom,
        overlays,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use approx::assert_abs_diff_eq;
    use rstest::rstest;
    use testdir::testdir;

    use crate::{
        geofile::feature::{AttributeValue, Feature, FeatureMap},
        table::feature_table::FeatureTable,
    };

    use super::{compose_map, MapStyle};

    fn square(x: f64, y: f64) -> geo::Geometry {
        geo::Geometry::Polygon(geo::Polygon::new(
            vec![(x, y), (x + 0.01, y), (x + 0.01, y + 0.01), (x, y + 0.01), (x, y)].into(),
            vec![],
        ))
    }

    fn pine_table() -> FeatureTable {
        FeatureTable::new(
            vec!["species".to_string()],
            vec![Feature {
                geometry: square(127.1, 35.8),
                attributes: FeatureMap::from([("species".to_string(), AttributeValue::from("Pine"))]),
            }],
        )
    }

    #[rstest]
    fn test_center_falls_back_to_boundary() {
        let boundary = pine_table();
        let selected = BTreeSet::from(["Oak".to_string()]);
        let view = compose_map(
            Some(&boundary),
            &FeatureTable::empty(),
            "species",
            &selected,
            &MapStyle::default(),
        );
        assert_eq!(view.overlays.len(), 1);
        assert_eq!(view.zoom, 11);
        assert_abs_diff_eq!(
            view.center.unwrap(),
            geo::Point::new(127.105, 35.805),
            epsilon = 1e-4
        );
    }

    #[rstest]
    fn test_empty_map_has_no_center() {
        let view = compose_map(
            None,
            &FeatureTable::empty(),
            "species",
            &BTreeSet::new(),
            &MapStyle::default(),
        );
        assert!(view.overlays.is_empty());
        assert_eq!(view.center, None);
    }

    #[rstest]
    fn test_write_geojson() {
        let table = pine_table();
        let selected = BTreeSet::from(["Pine".to_string()]);
        let view = compose_map(Some(&table), &table, "species", &selected, &MapStyle::default());

        let output_filepath = testdir!().join("overlays.geojson");
        view.write_geojson(&output_filepath).unwrap();

        let contents = std::fs::read_to_string(&output_filepath).unwrap();
        let parsed: geojson::GeoJson = contents.parse().unwrap();
        match parsed {
            geojson::GeoJson::FeatureCollection(collection) => {
                assert_eq!(collection.features.len(), 2)
            }
            other => panic!("Expected a feature collection, got {:?}", other),
        }
    }

    #[rstest]
    fn test_style_from_yaml_uses_defaults() {
        let style: MapStyle = serde_yaml::from_str("boundary_label: Jeonju\nzoom: 12\n").unwrap();
        assert_eq!(style.boundary_label, "Jeonju");
        assert_eq!(style.zoom, 12);
        assert_eq!(style.fill_opacity, 0.6);
        assert_eq!(style.boundary_color, "black");
    }
}
