use geo::Centroid;

use crate::crs::{
    crs_utils::{epsg_code_to_authority_string, utm_crs_for_point, CANONICAL_EPSG},
    reproject::project_geometries,
};

fn mean_point(points: &[geo::Point]) -> Option<geo::Point> {
    if points.is_empty() {
        return None;
    }
    let count = points.len() as f64;
    let (sum_x, sum_y) = points
        .iter()
        .fold((0.0, 0.0), |(x, y), point| (x + point.x(), y + point.y()));
    Some(geo::Point::new(sum_x / count, sum_y / count))
}

/// Centroids computed in the local UTM zone and projected back to lon/lat.
fn projected_centroids(geometries: &[geo::Geometry], first: geo::Point) -> anyhow::Result<Vec<geo::Point>> {
    let canonical = epsg_code_to_authority_string(CANONICAL_EPSG);
    let utm = epsg_code_to_authority_string(utm_crs_for_point(first.x(), first.y()));

    let mut projected = geometries.to_vec();
    project_geometries(projected.iter_mut(), &canonical, &utm)?;
    let mut centroids: Vec<geo::Geometry> = projected
        .iter()
        .filter_map(|geometry| geometry.centroid())
        .map(geo::Geometry::Point)
        .collect();
    project_geometries(centroids.iter_mut(), &utm, &canonical)?;
    Ok(centroids
        .into_iter()
        .filter_map(|geometry| match geometry {
            geo::Geometry::Point(point) => Some(point),
            _ => None,
        })
        .collect())
}

/// Initial map center: the mean of the centroids of all geometries, which must be in EPSG:4326.
///
/// Centroids are only area-true in a projected CRS, so they are computed in the UTM zone of the first geometry.
/// If that projection fails the centroids are taken on the raw lon/lat coordinates, which is fine for an initial
/// view but not for any measurement. Returns `None` when there is no geometry with a centroid.
pub fn compute_center<'a>(geometries: impl IntoIterator<Item = &'a geo::Geometry>) -> Option<geo::Point> {
    let geometries: Vec<geo::Geometry> = geometries.into_iter().cloned().collect();
    let first = geometries.iter().find_map(|geometry| geometry.centroid())?;

    let centroids = match projected_centroids(&geometries, first) {
        Ok(centroids) => centroids,
        Err(err) => {
            log::warn!(
                "Could not compute projected centroids, using lon/lat centroids. {:#}",
                err
            );
            geometries
                .iter()
                .filter_map(|geometry| geometry.centroid())
                .collect()
        }
    };
    mean_point(&centroids)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    use super::{compute_center, mean_point};

    fn square(x: f64, y: f64, size: f64) -> geo::Geometry {
        geo::Geometry::Polygon(geo::Polygon::new(
            vec![(x, y), (x + size, y), (x + size, y + size), (x, y + size), (x, y)].into(),
            vec![],
        ))
    }

    #[rstest]
    fn test_center_of_single_polygon_is_its_centroid() {
        let geometries = vec![square(127.1, 35.8, 0.01)];
        let center = compute_center(&geometries).unwrap();
        assert_abs_diff_eq!(center, geo::Point::new(127.105, 35.805), epsilon = 1e-4);
    }

    #[rstest]
    fn test_center_is_mean_of_centroids() {
        let geometries = vec![square(127.0, 35.0, 0.01), square(127.2, 35.2, 0.01)];
        let center = compute_center(&geometries).unwrap();
        assert_abs_diff_eq!(center, geo::Point::new(127.105, 35.105), epsilon = 1e-4);
    }

    #[rstest]
    fn test_center_of_nothing() {
        assert_eq!(compute_center(&Vec::<geo::Geometry>::new()), None);
    }

    #[rstest]
    fn test_mean_point() {
        let points = [geo::Point::new(0.0, 0.0), geo::Point::new(2.0, 4.0)];
        assert_eq!(mean_point(&points), Some(geo::Point::new(1.0, 2.0)));
        assert_eq!(mean_point(&[]), None);
    }
}
