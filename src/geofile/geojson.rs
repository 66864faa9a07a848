use std::{fs, io, path::Path};

pub fn write_features_to_geojson(
    features: Vec<geojson::Feature>,
    output_filepath: &Path,
) -> io::Result<()> {
    let feature_collection = geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };
    let geojson_contents: geojson::GeoJson = geojson::GeoJson::from(feature_collection);
    fs::write(output_filepath, geojson_contents.to_string())
}
