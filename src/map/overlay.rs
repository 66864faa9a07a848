use serde_json::json;

use crate::table::feature_table::FeatureTable;

use super::{color::ColorMap, MapStyle};

#[derive(Debug, Clone, PartialEq)]
pub enum OverlayKind {
    Boundary,
    Species(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayStyle {
    /// `None` draws the outline only.
    pub fill_color: Option<String>,
    pub stroke_color: String,
    pub stroke_width: f64,
    pub fill_opacity: f64,
}

/// One styled shape for the render surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub kind: OverlayKind,
    pub geometry: geo::Geometry,
    pub style: OverlayStyle,
    pub tooltip: String,
}

impl Overlay {
    /// GeoJSON feature carrying the style as simplestyle properties plus the tooltip.
    pub fn to_geojson_feature(&self) -> geojson::Feature {
        let mut properties = json!({
            "stroke": self.style.stroke_color,
            "stroke-width": self.style.stroke_width,
            "fill-opacity": self.style.fill_opacity,
            "tooltip": self.tooltip,
        });
        if let Some(fill_color) = &self.style.fill_color {
            properties["fill"] = json!(fill_color);
        }
        match &self.kind {
            OverlayKind::Boundary => properties["kind"] = json!("boundary"),
            OverlayKind::Species(name) => {
                properties["kind"] = json!("species");
                properties["species"] = json!(name);
            }
        }
        geojson::Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(&self.geometry))),
            id: None,
            properties: properties.as_object().cloned(),
            foreign_members: None,
        }
    }
}

/// All geometries of a table as one shape: a multipolygon when they are all polygonal, a collection otherwise.
fn combined_geometry(table: &FeatureTable) -> Option<geo::Geometry> {
    if table.len() == 1 {
        return table.geometries().next().cloned();
    }
    let mut polygons = Vec::new();
    for geometry in table.geometries() {
        match geometry {
            geo::Geometry::Polygon(polygon) => polygons.push(polygon.clone()),
            geo::Geometry::MultiPolygon(multi_polygon) => polygons.extend(multi_polygon.0.iter().cloned()),
            _ => {
                return Some(geo::Geometry::GeometryCollection(geo::GeometryCollection(
                    table.geometries().cloned().collect(),
                )))
            }
        }
    }
    if polygons.is_empty() {
        None
    } else {
        Some(geo::Geometry::MultiPolygon(geo::MultiPolygon(polygons)))
    }
}

/// Outline of the boundary table: no fill, fixed stroke and the configured label as tooltip.
pub fn boundary_overlay(boundary: &FeatureTable, style: &MapStyle) -> Option<Overlay> {
    combined_geometry(boundary).map(|geometry| Overlay {
        kind: OverlayKind::Boundary,
        geometry,
        style: OverlayStyle {
            fill_color: None,
            stroke_color: style.boundary_color.clone(),
            stroke_width: style.boundary_width,
            fill_opacity: 0.0,
        },
        tooltip: style.boundary_label.clone(),
    })
}

/// One filled overlay per feature, colored by its value of `column`. Features whose value has no color (not
/// selected, or null) are skipped.
pub fn species_overlays(
    filtered: &FeatureTable,
    column: &str,
    colors: &ColorMap,
    style: &MapStyle,
) -> Vec<Overlay> {
    filtered
        .features
        .iter()
        .filter_map(|feature| {
            let name = feature.attribute(column).as_label()?;
            let color = colors.color_of(&name)?.to_string();
            Some(Overlay {
                tooltip: format!("{}: {}", column, name),
                kind: OverlayKind::Species(name),
                geometry: feature.geometry.clone(),
                style: OverlayStyle {
                    fill_color: Some(color.clone()),
                    stroke_color: color,
                    stroke_width: style.species_width,
                    fill_opacity: style.fill_opacity,
                },
            })
        })
        .collect()
}

/// Boundary outline first, then the species polygons in table order.
pub fn compose_overlays(
    boundary: Option<&FeatureTable>,
    filtered: &FeatureTable,
    column: &str,
    colors: &ColorMap,
    style: &MapStyle,
) -> Vec<Overlay> {
    boundary
        .and_then(|boundary| boundary_overlay(boundary, style))
        .into_iter()
        .chain(species_overlays(filtered, column, colors, style))
        .collect()
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use crate::{
        geofile::feature::{AttributeValue, Feature, FeatureMap},
        map::{color::ColorMap, MapStyle},
        table::feature_table::FeatureTable,
    };

    use super::{boundary_overlay, compose_overlays, OverlayKind};

    fn square(x: f64, y: f64) -> geo::Geometry {
        geo::Geometry::Polygon(geo::Polygon::new(
            vec![(x, y), (x + 1.0, y), (x + 1.0, y + 1.0), (x, y + 1.0), (x, y)].into(),
            vec![],
        ))
    }

    fn table(features: Vec<(geo::Geometry, AttributeValue)>) -> FeatureTable {
        FeatureTable::new(
            vec!["species".to_string()],
            features
                .into_iter()
                .map(|(geometry, value)| Feature {
                    geometry,
                    attributes: FeatureMap::from([("species".to_string(), value)]),
                })
                .collect(),
        )
    }

    #[fixture]
    fn style() -> MapStyle {
        MapStyle::default()
    }

    #[rstest]
    fn test_compose_overlays(style: MapStyle) {
        let boundary = table(vec![(square(0.0, 0.0), AttributeValue::Null)]);
        let filtered = table(vec![
            (square(1.0, 1.0), AttributeValue::from("Pine")),
            (square(2.0, 2.0), AttributeValue::from("Oak")),
        ]);
        let selected = vec!["Pine".to_string(), "Oak".to_string()];
        let colors = ColorMap::for_species(&selected);

        let overlays = compose_overlays(Some(&boundary), &filtered, "species", &colors, &style);

        assert_eq!(overlays.len(), 3);
        assert_eq!(overlays[0].kind, OverlayKind::Boundary);
        assert_eq!(overlays[0].style.fill_color, None);
        assert_eq!(overlays[0].style.stroke_color, "black");
        assert_eq!(overlays[0].style.stroke_width, 2.0);
        assert_eq!(overlays[0].tooltip, style.boundary_label);

        assert_eq!(overlays[1].kind, OverlayKind::Species("Pine".to_string()));
        assert_eq!(overlays[1].tooltip, "species: Pine");
        assert_eq!(overlays[1].style.fill_color.as_deref(), colors.color_of("Pine"));
        assert_eq!(overlays[1].style.stroke_width, 1.0);
        assert_eq!(overlays[1].style.fill_opacity, 0.6);
        assert_eq!(overlays[2].tooltip, "species: Oak");
    }

    #[rstest]
    fn test_compose_without_boundary(style: MapStyle) {
        let filtered = table(vec![(square(1.0, 1.0), AttributeValue::from("Pine"))]);
        let colors = ColorMap::for_species(&vec!["Pine".to_string()]);
        let overlays = compose_overlays(None, &filtered, "species", &colors, &style);
        assert_eq!(overlays.len(), 1);
    }

    #[rstest]
    fn test_boundary_features_are_combined(style: MapStyle) {
        let boundary = table(vec![
            (square(0.0, 0.0), AttributeValue::Null),
            (square(5.0, 5.0), AttributeValue::Null),
        ]);
        let overlay = boundary_overlay(&boundary, &style).unwrap();
        match overlay.geometry {
            geo::Geometry::MultiPolygon(multi_polygon) => assert_eq!(multi_polygon.0.len(), 2),
            other => panic!("Expected a multipolygon, got {:?}", other),
        }
        assert!(boundary_overlay(&FeatureTable::empty(), &style).is_none());
    }

    #[rstest]
    fn test_geojson_feature_properties(style: MapStyle) {
        let boundary = table(vec![(square(0.0, 0.0), AttributeValue::Null)]);
        let filtered = table(vec![(square(1.0, 1.0), AttributeValue::from("Pine"))]);
        let colors = ColorMap::for_species(&vec!["Pine".to_string()]);
        let overlays = compose_overlays(Some(&boundary), &filtered, "species", &colors, &style);

        let outline = overlays[0].to_geojson_feature();
        let properties = outline.properties.unwrap();
        assert_eq!(properties["kind"], "boundary");
        assert!(properties.get("fill").is_none());

        let pine = overlays[1].to_geojson_feature();
        let properties = pine.properties.unwrap();
        assert_eq!(properties["species"], "Pine");
        assert_eq!(properties["fill"], colors.color_of("Pine").unwrap());
        assert_eq!(properties["tooltip"], "species: Pine");
        assert!(pine.geometry.is_some());
    }
}
