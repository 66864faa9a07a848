use anyhow::{anyhow, Context};
use gdal::vector::{FieldValue, LayerAccess};
use indicatif::ProgressBar;
use rayon::prelude::*;
use std::path::Path;

use super::feature::{AttributeValue, Feature, FeatureMap};

pub enum GdalDriverType {
    GeoPackage,
    GeoJson,
    Shapefile,
}

impl GdalDriverType {
    pub fn name(&self) -> &'static str {
        match self {
            GdalDriverType::GeoPackage => "GPKG",
            GdalDriverType::GeoJson => "GeoJSON",
            GdalDriverType::Shapefile => "ESRI Shapefile",
        }
    }
}

/// Everything read from the single layer of a geofile.
pub struct GeofileContents {
    pub features: Vec<Feature>,
    /// Field names in the order of the layer definition.
    pub columns: Vec<String>,
    /// The declared CRS of the layer, `None` if the file does not declare one (e.g. a shapefile without .prj).
    pub spatial_ref: Option<gdal::spatial_ref::SpatialRef>,
}

fn layer_type_for(features: &[Feature]) -> anyhow::Result<gdal::vector::OGRwkbGeometryType::Type> {
    use gdal::vector::OGRwkbGeometryType::*;
    let mut layer_type = None;
    for feature in features {
        let geometry_type = match &feature.geometry {
            geo::Geometry::Point(_) => wkbPoint,
            geo::Geometry::LineString(_) => wkbLineString,
            geo::Geometry::Polygon(_) => wkbPolygon,
            geo::Geometry::MultiPoint(_) => wkbMultiPoint,
            geo::Geometry::MultiLineString(_) => wkbMultiLineString,
            geo::Geometry::MultiPolygon(_) => wkbMultiPolygon,
            geometry => {
                return Err(anyhow!("Cannot write geometry type {:?} to file.", geometry));
            }
        };
        layer_type = match layer_type {
            None => Some(geometry_type),
            Some(current) if current == geometry_type => Some(current),
            // Polygons and multipolygons go into a multipolygon layer, anything else mixed is left to the driver.
            Some(current)
                if (current == wkbPolygon || current == wkbMultiPolygon)
                    && (geometry_type == wkbPolygon || geometry_type == wkbMultiPolygon) =>
            {
                Some(wkbMultiPolygon)
            }
            Some(_) => Some(wkbUnknown),
        };
    }
    layer_type.ok_or_else(|| anyhow!("Cannot derive a layer type without features."))
}

/// Field type for `column`, taken from the first non-null value. Columns without any value are written as strings.
fn field_type_for(features: &[Feature], column: &str) -> gdal::vector::OGRFieldType::Type {
    use gdal::vector::OGRFieldType::*;
    features
        .iter()
        .find_map(|feature| match feature.attribute(column) {
            AttributeValue::Null => None,
            AttributeValue::Text(_) => Some(OFTString),
            AttributeValue::Integer(_) => Some(OFTInteger64),
            AttributeValue::Real(_) => Some(OFTReal),
        })
        .unwrap_or(OFTString)
}

fn field_value_for(value: &AttributeValue) -> Option<FieldValue> {
    match value {
        AttributeValue::Null => None,
        AttributeValue::Text(text) => Some(FieldValue::StringValue(text.clone())),
        AttributeValue::Integer(value) => Some(FieldValue::Integer64Value(*value)),
        AttributeValue::Real(value) => Some(FieldValue::RealValue(*value)),
    }
}

fn attribute_value_for(value: Option<FieldValue>) -> AttributeValue {
    match value {
        None => AttributeValue::Null,
        Some(FieldValue::StringValue(text)) => AttributeValue::Text(text),
        Some(FieldValue::IntegerValue(value)) => AttributeValue::Integer(value as i64),
        Some(FieldValue::Integer64Value(value)) => AttributeValue::Integer(value),
        Some(FieldValue::RealValue(value)) => AttributeValue::Real(value),
        Some(FieldValue::DateValue(date)) => AttributeValue::Text(date.to_string()),
        Some(FieldValue::DateTimeValue(date_time)) => AttributeValue::Text(date_time.to_rfc3339()),
        // List values have no counterpart in a flat attribute table.
        Some(other) => AttributeValue::Text(format!("{:?}", other)),
    }
}

pub fn write_features_to_geofile(
    features: &[Feature],
    columns: &[String],
    output_filepath: &Path,
    crs: Option<&gdal::spatial_ref::SpatialRef>,
    driver: &str,
) -> anyhow::Result<()> {
    let driver = gdal::DriverManager::get_driver_by_name(driver).context("Getting GDAL driver")?;

    if features.is_empty() {
        return Ok(());
    }
    let layer_type = layer_type_for(features)?;

    let crs = match crs {
        Some(crs) => crs.clone(),
        None => gdal::spatial_ref::SpatialRef::from_epsg(4326)?,
    };
    let crs_name = crs.name()?;
    log::debug!("Using spatial ref {} for writing geofile", crs_name);

    let layer_name = output_filepath
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("features");
    let mut dataset = driver.create_vector_only(output_filepath)?;
    let layer_options = gdal::LayerOptions {
        name: layer_name,
        srs: Some(&crs),
        ty: layer_type,
        options: None,
    };

    let mut layer = dataset.create_layer(layer_options)?;

    log::info!("Setting up {} fields", columns.len());
    let field_definitions: Vec<(&str, gdal::vector::OGRFieldType::Type)> = columns
        .par_iter()
        .map(|column| (column as &str, field_type_for(features, column)))
        .collect();
    layer.create_defn_fields(&field_definitions)?;

    log::info!(
        "Writing {} features to {:?}",
        features.len(),
        output_filepath
    );
    unsafe {
        // Start a transaction in case the driver supports transactions, e.g. GeoPackage.
        // Committing all features once as opposed to per-feature is a massive speedup for these drivers.
        gdal_sys::OGR_L_StartTransaction(layer.c_layer());
    };
    let bar = ProgressBar::new(features.len() as u64);
    for feature in features {
        let wkb = wkb::geom_to_wkb(&feature.geometry)
            .map_err(|err| anyhow!("Could not write geometry to WKB, {:?}", err))?;
        let geometry = gdal::vector::Geometry::from_wkb(&wkb)?;

        let mut field_names = Vec::new();
        let mut values = Vec::new();
        for column in columns {
            if let Some(value) = field_value_for(feature.attribute(column)) {
                field_names.push(column as &str);
                values.push(value);
            }
        }
        if field_names.is_empty() {
            layer.create_feature(geometry)?;
        } else {
            layer.create_feature_fields(geometry, &field_names, &values)?;
        }

        bar.inc(1);
    }
    unsafe {
        gdal_sys::OGR_L_CommitTransaction(layer.c_layer());
    };
    bar.finish_and_clear();
    Ok(())
}

/// Whether `geometry` is built only from the 2D point, line and polygon types.
fn is_simple_2d(geometry: &gdal::vector::Geometry) -> bool {
    use gdal::vector::OGRwkbGeometryType::*;
    match geometry.geometry_type() {
        wkbPoint | wkbLineString | wkbPolygon | wkbMultiPoint | wkbMultiLineString | wkbMultiPolygon => true,
        wkbGeometryCollection => (0..geometry.geometry_count())
            .all(|index| is_simple_2d(&geometry.get_geometry(index))),
        _ => false,
    }
}

/// Convert a GDAL geometry to `geo`. Z and M values are dropped, curves and other types without a `geo`
/// counterpart are an error.
fn geometry_to_geo(geometry: &gdal::vector::Geometry) -> anyhow::Result<geo::Geometry> {
    let flat = geometry.clone();
    unsafe {
        gdal_sys::OGR_G_FlattenTo2D(flat.c_geometry());
    };
    if !is_simple_2d(&flat) {
        return Err(anyhow!(
            "Unsupported geometry type {}",
            geometry.geometry_type()
        ));
    }
    let wkb = flat.wkb()?;
    wkb::wkb_to_geom(&mut wkb.as_slice())
        .map_err(|err| anyhow!("Could not read geometry from WKB, {:?}", err))
}

/// Read all features of a single-layer geofile. Geometries are converted to `geo` types through WKB, fields to
/// `AttributeValue`s. Every feature carries every layer field, null fields as `AttributeValue::Null`. Features
/// without geometry are skipped.
pub fn read_features_from_geofile(filepath: &Path) -> anyhow::Result<GeofileContents> {
    gdal::DriverManager::register_all();
    let mut open_options = gdal::DatasetOptions::default();
    open_options.open_flags = gdal::GdalOpenFlags::GDAL_OF_VECTOR;
    let dataset = gdal::Dataset::open_ex(filepath, open_options)?;

    let layer_count = dataset.layer_count();
    if 0 == layer_count || 1 < layer_count {
        return Err(anyhow!(
            "Found {} layers, only one layer is supported.",
            layer_count
        ));
    }
    let mut layer = dataset.layer(0)?;
    let columns: Vec<String> = layer.defn().fields().map(|field| field.name()).collect();
    let spatial_ref = layer.spatial_ref().ok();

    let mut features = Vec::new();
    let mut null_geometries = 0;
    for (index, gdal_feature) in layer.features().enumerate() {
        // Shapefiles may hold records with a null shape.
        let Ok(gdal_geometry) = gdal_feature.geometry_by_index(0) else {
            null_geometries += 1;
            continue;
        };
        let geometry = geometry_to_geo(gdal_geometry)
            .with_context(|| format!("Reading geometry of feature {}", index))?;

        let mut attributes: FeatureMap = columns
            .iter()
            .map(|column| (column.clone(), AttributeValue::Null))
            .collect();
        for (name, value) in gdal_feature.fields() {
            attributes.insert(name, attribute_value_for(value));
        }
        features.push(Feature {
            geometry,
            attributes,
        });
    }

    if null_geometries > 0 {
        log::warn!(
            "Skipped {} features without geometry in {:?}",
            null_geometries,
            filepath
        );
    }

    Ok(GeofileContents {
        features,
        columns,
        spatial_ref,
    })
}
