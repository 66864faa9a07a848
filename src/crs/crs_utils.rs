use core::slice;
use libc::c_char;
use std::{
    ffi::{c_int, CString},
    ptr::null_mut,
    str::from_utf8,
};

use anyhow::anyhow;
use gdal::spatial_ref::SpatialRef;

pub type EpsgCode = u32;

/// Longitude/latitude on WGS84, the CRS every table is normalized to before filtering or rendering.
pub const CANONICAL_EPSG: EpsgCode = 4326;

pub fn epsg_4326() -> anyhow::Result<SpatialRef> {
    SpatialRef::from_epsg(CANONICAL_EPSG)
        .map_err(|err| anyhow!("Could not create SpatialRef for EPSG:4326. {}", err))
}

/// Query UTM zones which contain the lon/lat WGS84 coordinate.
///
/// # Arguments
/// * lon - longitude in degrees.
/// * lat - latitude in degrees.
/// * datum_name - the name of the geodetic datum to query for. Example: "WGS84", "NAD83". If not specified, zones
///     with all datums are returned.
///
/// # Returns
/// EPSG authority codes for the found UTM zones.
pub fn query_utm_crs_info(
    lon: f64,
    lat: f64,
    datum_name: Option<&str>,
) -> anyhow::Result<Vec<EpsgCode>> {
    let mut results = Vec::new();
    let auth_name = CString::new("EPSG")?;
    unsafe {
        let context = proj_sys::proj_context_create();
        let crs_types: [proj_sys::PJ_TYPE; 1] = [proj_sys::PJ_TYPE_PJ_TYPE_PROJECTED_CRS];
        let query_params = proj_sys::proj_get_crs_list_parameters_create();
        (*query_params).types = crs_types.as_ptr();
        (*query_params).typesCount = 1;

        (*query_params).bbox_valid = true as i32;
        (*query_params).west_lon_degree = lon;
        (*query_params).south_lat_degree = lat;
        (*query_params).east_lon_degree = lon;
        (*query_params).north_lat_degree = lat;

        let out_result_count: *mut c_int = null_mut();

        let mut crs_info_list = proj_sys::proj_get_crs_info_list_from_database(
            context,
            auth_name.as_ptr(),
            query_params,
            out_result_count,
        );
        // Kept to release the list with proj_crs_info_list_destroy once iteration has moved the cursor.
        let crs_info_list_original = crs_info_list;

        proj_sys::proj_get_crs_list_parameters_destroy(query_params);

        if crs_info_list.is_null() {
            proj_sys::proj_context_destroy(context);
            return Err(anyhow!("Failed to query UTM zones."));
        }

        let mut scan_result = Ok(());
        while !(*crs_info_list).is_null() {
            let crs_info = **crs_info_list;
            crs_info_list = crs_info_list.offset(1);

            match utm_code_from_crs_info(crs_info.name, crs_info.code, datum_name) {
                Ok(Some(code)) => results.push(code),
                Ok(None) => {}
                Err(err) => {
                    scan_result = Err(err);
                    break;
                }
            }
        }
        proj_sys::proj_crs_info_list_destroy(crs_info_list_original);
        proj_sys::proj_context_destroy(context);
        scan_result?;
    }
    Ok(results)
}

fn utm_code_from_crs_info(
    name: *const c_char,
    code: *const c_char,
    datum_name: Option<&str>,
) -> anyhow::Result<Option<EpsgCode>> {
    let crs_name = i8_ptr_as_str(name)?;
    if !crs_name.contains("UTM zone") {
        return Ok(None);
    }
    if let Some(datum_name) = datum_name {
        // UTM zone names start with the datum name as e.g. "WGS 84 / UTM zone ...".
        let crs_datum = crs_name
            .split('/')
            .next()
            .ok_or_else(|| anyhow!("CRS '{}' does not have a datum specifier", crs_name))?;
        if crs_datum.replace(' ', "") != datum_name {
            return Ok(None);
        }
    }
    Ok(Some(i8_ptr_as_str(code)?.parse()?))
}

fn i8_ptr_as_str<'a>(c_string: *const c_char) -> anyhow::Result<&'a str> {
    unsafe {
        let slice = slice::from_raw_parts(c_string as *const u8, libc::strlen(c_string));
        from_utf8(slice).map_err(|err| anyhow!("Could not decode string {}", err))
    }
}

/// WGS84 UTM zone of a lon/lat coordinate computed from the 6 degree zone grid.
pub fn utm_zone_epsg(lon: f64, lat: f64) -> EpsgCode {
    let zone = (((lon + 180.0) / 6.0).floor() as i64).clamp(0, 59) as EpsgCode + 1;
    if lat >= 0.0 {
        32600 + zone
    } else {
        32700 + zone
    }
}

/// The WGS84 UTM zone to use as local projected CRS around a lon/lat coordinate. The PROJ database is asked first,
/// the zone grid decides between several candidates and stands in when the database has no answer.
pub fn utm_crs_for_point(lon: f64, lat: f64) -> EpsgCode {
    let grid_zone = utm_zone_epsg(lon, lat);
    match query_utm_crs_info(lon, lat, Some("WGS84")) {
        Ok(codes) if codes.contains(&grid_zone) => grid_zone,
        Ok(codes) if !codes.is_empty() => codes[0],
        Ok(_) => grid_zone,
        Err(err) => {
            log::debug!("UTM zone query failed, using zone grid. {}", err);
            grid_zone
        }
    }
}

pub fn epsg_code_to_authority_string(code: EpsgCode) -> String {
    format!("EPSG:{}", code)
}

/// EPSG code of a spatial reference. ESRI style .prj files carry no authority, those are matched against the EPSG
/// database first. `None` when no EPSG code can be found.
pub fn epsg_code_of(spatial_ref: &SpatialRef) -> Option<EpsgCode> {
    let mut identified = spatial_ref.clone();
    if identified.auth_code().is_err() {
        identified.auto_identify_epsg().ok()?;
    }
    match identified.auth_name() {
        Ok(auth_name) if auth_name == "EPSG" => identified
            .auth_code()
            .ok()
            .map(|code| code as EpsgCode),
        _ => None,
    }
}

/// Definition of the CRS understood by PROJ: the authority string when an EPSG code is known, WKT otherwise.
pub fn crs_definition(spatial_ref: &SpatialRef) -> anyhow::Result<String> {
    match epsg_code_of(spatial_ref) {
        Some(code) => Ok(epsg_code_to_authority_string(code)),
        None => spatial_ref
            .to_wkt()
            .map_err(|err| anyhow!("Could not export CRS as WKT. {}", err)),
    }
}

pub fn is_canonical(spatial_ref: &SpatialRef) -> bool {
    spatial_ref.is_geographic() && epsg_code_of(spatial_ref) == Some(CANONICAL_EPSG)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use std::collections::HashSet;

    use crate::crs::crs_utils::{
        crs_definition, is_canonical, query_utm_crs_info, utm_crs_for_point, utm_zone_epsg,
    };

    use super::EpsgCode;

    #[rstest]
    #[case(139.813385, 35.707317999, Some("WGS84"), vec!(32654))] // WGS 84 UTM zone 54N for a coordinate in Tokyo.
    #[case(139.813385, 35.707317999, Some("Tokyo"), vec!(3095))] // UTM zone 54N in the "Tokyo" projection.
    #[case(139.813385, 35.707317999, Some("NAD83"), vec!())] // NAD 83 is not defined in Japan.
    #[case(-98.261719, 35.581384, Some("NAD83"), vec!(26914))] // NAD 83 UMT zone 14N for a coordinate in the US.
    fn test_query_utm_crs_info(
        #[case] lon: f64,
        #[case] lat: f64,
        #[case] datum_name: Option<&str>,
        #[case] expected_results: Vec<EpsgCode>,
    ) {
        let results = query_utm_crs_info(lon, lat, datum_name).unwrap();
        let results_set: HashSet<EpsgCode> = results.into_iter().collect();
        let expected_results_set: HashSet<EpsgCode> = expected_results.into_iter().collect();
        assert_eq!(results_set, expected_results_set);
    }

    #[rstest]
    #[case(139.81, 35.70, 32654)] // Tokyo.
    #[case(127.14, 35.82, 32652)] // Jeonju.
    #[case(-58.38, -34.60, 32721)] // Buenos Aires.
    #[case(180.0, 10.0, 32660)]
    #[case(-180.0, 10.0, 32601)]
    fn test_utm_zone_epsg(#[case] lon: f64, #[case] lat: f64, #[case] expected: EpsgCode) {
        assert_eq!(utm_zone_epsg(lon, lat), expected);
    }

    #[rstest]
    fn test_utm_crs_for_point() {
        assert_eq!(utm_crs_for_point(127.14, 35.82), 32652);
    }

    #[rstest]
    #[case(4326, true)]
    #[case(5186, false)]
    #[case(32652, false)]
    fn test_is_canonical(#[case] code: u32, #[case] expected: bool) {
        let spatial_ref = gdal::spatial_ref::SpatialRef::from_epsg(code).unwrap();
        assert_eq!(is_canonical(&spatial_ref), expected);
    }

    #[rstest]
    fn test_crs_definition_prefers_authority() {
        let spatial_ref = gdal::spatial_ref::SpatialRef::from_epsg(5186).unwrap();
        assert_eq!(crs_definition(&spatial_ref).unwrap(), "EPSG:5186");
    }

    #[rstest]
    fn test_crs_definition_falls_back_to_wkt() {
        let spatial_ref = gdal::spatial_ref::SpatialRef::from_proj4(
            "+proj=tmerc +lat_0=12.5 +lon_0=33.25 +k=0.9 +x_0=123456 +y_0=654321 +ellps=GRS80 +units=m +no_defs",
        )
        .unwrap();
        let definition = crs_definition(&spatial_ref).unwrap();
        assert!(definition.contains("PROJCS") || definition.contains("PROJCRS"));
    }
}
