use anyhow::anyhow;
use geo::CoordsIter;
use proj::Transform;

/// Project geometries in place. `from_crs` and `to_crs` are any CRS definition PROJ understands, e.g. "EPSG:5186"
/// or a WKT string. Axis order is normalized to x = longitude / easting.
pub fn project_geometries<'a>(
    geometries: impl IntoIterator<Item = &'a mut geo::Geometry>,
    from_crs: &str,
    to_crs: &str,
) -> anyhow::Result<()> {
    let projection = proj::Proj::new_known_crs(from_crs, to_crs, None)
        .map_err(|err| anyhow!("Could not create projection, {}", err))?;
    for geometry in geometries {
        geometry
            .transform(&projection)
            .map_err(|err| anyhow!("Could not project geometry, {}", err))?;
    }
    Ok(())
}

/// Whether every coordinate is a valid longitude/latitude pair.
pub fn within_lon_lat_bounds<'a>(geometries: impl IntoIterator<Item = &'a geo::Geometry>) -> bool {
    geometries.into_iter().all(|geometry| {
        geometry.coords_iter().all(|coord| {
            coord.x.is_finite()
                && coord.y.is_finite()
                && (-180.0..=180.0).contains(&coord.x)
                && (-90.0..=90.0).contains(&coord.y)
        })
    })
}
