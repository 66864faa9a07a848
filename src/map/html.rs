use std::{fs, io, path::Path};

use super::MapView;

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>__TITLE__</title>
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<style>html, body, #map { height: 100%; margin: 0; }</style>
</head>
<body>
<div id="map"></div>
<script>
const overlays = __OVERLAYS__;
const map = L.map("map").setView([__LAT__, __LON__], __ZOOM__);
L.tileLayer("https://tile.openstreetmap.org/{z}/{x}/{y}.png", {
  maxZoom: 19,
  attribution: "&copy; OpenStreetMap contributors"
}).addTo(map);
L.geoJSON(overlays, {
  style: (feature) => ({
    color: feature.properties["stroke"],
    weight: feature.properties["stroke-width"],
    fill: feature.properties["fill"] !== undefined,
    fillColor: feature.properties["fill"],
    fillOpacity: feature.properties["fill-opacity"]
  }),
  onEachFeature: (feature, layer) => layer.bindTooltip(feature.properties["tooltip"])
}).addTo(map);
</script>
</body>
</html>
"#;

/// Zoom used when there is nothing to center on.
const WORLD_ZOOM: u8 = 2;

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Replace each placeholder once, in the order they appear in `template`. Substituted text is never searched
/// again, so values may contain placeholder names.
fn fill_template(template: &str, values: &[(&str, String)]) -> String {
    let mut page = String::with_capacity(template.len());
    let mut rest = template;
    for (placeholder, value) in values {
        if let Some((before, after)) = rest.split_once(placeholder) {
            page.push_str(before);
            page.push_str(value);
            rest = after;
        }
    }
    page.push_str(rest);
    page
}

/// Self-contained Leaflet page showing the overlays of `view` on OpenStreetMap tiles.
pub fn render_map_html(view: &MapView, title: &str) -> String {
    let collection = geojson::GeoJson::from(geojson::FeatureCollection {
        bbox: None,
        features: view.to_geojson_features(),
        foreign_members: None,
    });
    // "</" would end the script element early.
    let overlays = collection.to_string().replace("</", "<\\/");
    let (lon, lat, zoom) = match view.center {
        Some(center) => (center.x(), center.y(), view.zoom),
        None => (0.0, 0.0, WORLD_ZOOM),
    };
    fill_template(
        TEMPLATE,
        &[
            ("__TITLE__", escape_html(title)),
            ("__OVERLAYS__", overlays),
            ("__LAT__", lat.to_string()),
            ("__LON__", lon.to_string()),
            ("__ZOOM__", zoom.to_string()),
        ],
    )
}

pub fn write_map_html(view: &MapView, output_filepath: &Path, title: &str) -> io::Result<()> {
    fs::write(output_filepath, render_map_html(view, title))
}
