use std::path::Path;

use crate::{
    crs::{
        crs_utils::{crs_definition, epsg_code_to_authority_string, is_canonical, CANONICAL_EPSG},
        reproject::{project_geometries, within_lon_lat_bounds},
    },
    error::{MapError, MapResult},
    geofile::gdal_geofile::{read_features_from_geofile, GeofileContents},
};

use super::feature_table::FeatureTable;

fn reprojection_failure(source_crs: &str, reason: impl ToString) -> MapError {
    MapError::CrsReprojectionFailure {
        source_crs: source_crs.to_string(),
        reason: reason.to_string(),
    }
}

/// The CRS the features have to be reprojected from, `None` when they already are in EPSG:4326.
fn source_crs_of(
    contents: &GeofileContents,
    fallback_crs: Option<&str>,
    shapefile: &Path,
) -> MapResult<Option<String>> {
    let canonical = epsg_code_to_authority_string(CANONICAL_EPSG);
    match (&contents.spatial_ref, fallback_crs) {
        (Some(spatial_ref), _) if is_canonical(spatial_ref) => Ok(None),
        (Some(spatial_ref), _) => {
            let label = spatial_ref.name().unwrap_or_else(|_| "declared CRS".to_string());
            crs_definition(spatial_ref)
                .map(Some)
                .map_err(|err| reprojection_failure(&label, format!("{:#}", err)))
        }
        (None, Some(fallback_crs)) if fallback_crs == canonical => Ok(None),
        (None, Some(fallback_crs)) => {
            log::info!(
                "{:?} declares no CRS, using configured fallback {}",
                shapefile,
                fallback_crs
            );
            Ok(Some(fallback_crs.to_string()))
        }
        (None, None) => {
            if within_lon_lat_bounds(contents.features.iter().map(|feature| &feature.geometry)) {
                log::warn!(
                    "{:?} declares no CRS, coordinates are within lon/lat bounds so EPSG:4326 is assumed",
                    shapefile
                );
                Ok(None)
            } else {
                Err(reprojection_failure(
                    "undeclared",
                    "the file has no CRS and its coordinates are not lon/lat, configure fallback_crs",
                ))
            }
        }
    }
}

/// Read a shapefile into a `FeatureTable` in EPSG:4326. Geometries in any other declared CRS are reprojected.
/// A file without CRS is reprojected from `fallback_crs` if one is given, otherwise it is taken as lon/lat as long
/// as its coordinates allow that.
pub fn load_feature_table(shapefile: &Path, fallback_crs: Option<&str>) -> MapResult<FeatureTable> {
    let contents =
        read_features_from_geofile(shapefile).map_err(|err| MapError::UnreadableGeometry {
            path: shapefile.to_path_buf(),
            reason: format!("{:#}", err),
        })?;
    let source_crs = source_crs_of(&contents, fallback_crs, shapefile)?;

    let GeofileContents {
        mut features,
        columns,
        ..
    } = contents;
    if let Some(source_crs) = source_crs {
        log::info!(
            "Reprojecting {} features of {:?} to EPSG:4326",
            features.len(),
            shapefile
        );
        let canonical = epsg_code_to_authority_string(CANONICAL_EPSG);
        project_geometries(
            features.iter_mut().map(|feature| &mut feature.geometry),
            &source_crs,
            &canonical,
        )
        .map_err(|err| reprojection_failure(&source_crs, format!("{:#}", err)))?;
        if !within_lon_lat_bounds(features.iter().map(|feature| &feature.geometry)) {
            return Err(reprojection_failure(
                &source_crs,
                "reprojected coordinates fall outside lon/lat bounds",
            ));
        }
    }

    log::info!("Read {} features from {:?}", features.len(), shapefile);
    Ok(FeatureTable::new(columns, features))
}
