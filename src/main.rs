extern crate log;
pub mod archive;
pub mod crs;
pub mod error;
pub mod geofile;
pub mod map;
pub mod session;
pub mod table;
use crate::archive::extract::Upload;
use crate::crs::crs_utils::epsg_4326;
use crate::geofile::gdal_geofile::{write_features_to_geofile, GdalDriverType};
use crate::map::{html::write_map_html, MapStyle};
use crate::session::Session;
use crate::table::filter::Selection;
use anyhow::{anyhow, Context};
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::{fs::read_to_string, path::Path};

/// Map forest species polygons from zipped shapefiles.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input config file.
    #[arg(short, long)]
    config_filepath: String,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
enum ExportFormat {
    GeoPackage,
    GeoJson,
    Shapefile,
}

impl ExportFormat {
    fn driver(&self) -> GdalDriverType {
        match self {
            ExportFormat::GeoPackage => GdalDriverType::GeoPackage,
            ExportFormat::GeoJson => GdalDriverType::GeoJson,
            ExportFormat::Shapefile => GdalDriverType::Shapefile,
        }
    }

    fn filename(&self) -> &'static str {
        match self {
            ExportFormat::GeoPackage => "filtered.gpkg",
            ExportFormat::GeoJson => "filtered.geojson",
            ExportFormat::Shapefile => "filtered.shp",
        }
    }
}

fn default_species_column() -> String {
    "KOFTR_NM".to_string()
}

#[derive(Deserialize, Debug)]
struct Config {
    species_archives: Vec<PathBuf>,
    boundary_archive: PathBuf,
    /// Uploads are extracted below this directory, one subdirectory per archive.
    work_dir: PathBuf,
    output_dir: PathBuf,
    #[serde(default = "default_species_column")]
    species_column: String,
    /// Species to show. Empty means no selection has been made yet.
    #[serde(default)]
    selection: Vec<String>,
    /// CRS assumed for shapefiles without .prj, e.g. "EPSG:5186".
    #[serde(default)]
    fallback_crs: Option<String>,
    #[serde(default)]
    export_filtered: Option<ExportFormat>,
    #[serde(default)]
    map: MapStyle,
}

fn read_uploads(filepaths: &[PathBuf]) -> anyhow::Result<Vec<Upload>> {
    filepaths
        .iter()
        .map(|filepath| {
            Upload::from_file(filepath).with_context(|| format!("Reading archive {:?}", filepath))
        })
        .collect()
}

fn run_session(config: &Config) -> anyhow::Result<()> {
    let fallback_crs = config.fallback_crs.as_deref();
    let column = config.species_column.as_str();
    let mut session = Session::new();

    log::info!("Loading {} species archives", config.species_archives.len());
    let species_uploads = read_uploads(&config.species_archives)?;
    let report = session.upload_species(&config.work_dir, &species_uploads, fallback_crs);
    for (archive, err) in &report.failed {
        log::error!("Species archive {} failed at {}: {}", archive, err.stage(), err);
    }
    log::info!(
        "Loaded {} of {} species archives",
        report.loaded.len(),
        species_uploads.len()
    );
    for loaded in session.species_tables() {
        log::debug!("{} has columns {:?}", loaded.archive, loaded.table.columns);
    }

    log::info!("Loading boundary archive {:?}", config.boundary_archive);
    let boundary_upload = Upload::from_file(&config.boundary_archive)
        .with_context(|| format!("Reading archive {:?}", config.boundary_archive))?;
    if let Err(err) = session.upload_boundary(&config.work_dir, &boundary_upload, fallback_crs) {
        log::error!("Boundary archive failed at {}: {}", err.stage(), err);
    }
    if session.boundary().is_none() {
        log::warn!("No boundary loaded, species can be listed but no map will be rendered");
    }

    if report.is_complete_failure() || session.species_tables().is_empty() {
        log::warn!("No species data loaded, nothing to select from");
        return Ok(());
    }
    let options = match session.species_options(column) {
        Ok(options) => options,
        Err(err) => {
            log::error!("{}", err);
            return Ok(());
        }
    };
    log::info!("{} species available: {}", options.len(), options.join(", "));

    if config.selection.is_empty() {
        log::info!("No species selected, set `selection` in the config to render a map");
        return Ok(());
    }
    for value in &config.selection {
        if !options.contains(value) {
            log::warn!("Selected species '{}' does not occur in the data", value);
        }
    }
    session.select(Selection::from_values(config.selection.iter().cloned()));

    std::fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("Creating output directory {:?}", config.output_dir))?;

    if let Some(format) = config.export_filtered {
        if let Some(filtered) = session.filtered(column)? {
            let output_filepath = config.output_dir.join(format.filename());
            write_features_to_geofile(
                &filtered.features,
                &filtered.columns,
                &output_filepath,
                Some(&epsg_4326()?),
                format.driver().name(),
            )?;
        }
    }

    match session.render(column, &config.map) {
        Ok(Some(view)) => {
            let geojson_filepath = config.output_dir.join("overlays.geojson");
            log::info!("Writing {} overlays to {:?}", view.overlays.len(), geojson_filepath);
            view.write_geojson(&geojson_filepath)?;
            let html_filepath = config.output_dir.join("map.html");
            log::info!("Writing map to {:?}", html_filepath);
            write_map_html(&view, &html_filepath, &config.map.title)?;
        }
        Ok(None) => log::warn!("Species and boundary are both needed to render the map"),
        Err(err) => log::error!("Could not render map: {}", err),
    }
    Ok(())
}

fn read_config(filepath: &Path) -> anyhow::Result<Config> {
    if !filepath.exists() {
        return Err(anyhow!("Config file {:?} not found", filepath));
    }
    let config_contents = read_to_string(filepath)?;
    Ok(serde_yaml::from_str(&config_contents)?)
}

fn try_main() -> anyhow::Result<()> {
    let args = Args::try_parse()?;
    let config = read_config(Path::new(&args.config_filepath))?;
    log::debug!("{:?}", config);
    run_session(&config)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(e) = try_main() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use testdir::testdir;

    use super::{read_config, run_session, Config, ExportFormat};

    #[rstest]
    fn test_config_defaults() {
        let config: Config = serde_yaml::from_str(
            "species_archives: [a.zip, b.zip]\nboundary_archive: boundary.zip\nwork_dir: work\noutput_dir: out\n",
        )
        .unwrap();
        assert_eq!(config.species_archives.len(), 2);
        assert_eq!(config.species_column, "KOFTR_NM");
        assert!(config.selection.is_empty());
        assert_eq!(config.fallback_crs, None);
        assert_eq!(config.export_filtered, None);
        assert_eq!(config.map.zoom, 11);
    }

    #[rstest]
    fn test_config_full() {
        let config: Config = serde_yaml::from_str(
            r#"
species_archives: [pine.zip]
boundary_archive: boundary.zip
work_dir: work
output_dir: out
species_column: species
selection: [Pine, Oak]
fallback_crs: "EPSG:5186"
export_filtered: geojson
map:
  boundary_label: Jeonju
"#,
        )
        .unwrap();
        assert_eq!(config.selection, vec!["Pine", "Oak"]);
        assert_eq!(config.fallback_crs.as_deref(), Some("EPSG:5186"));
        assert_eq!(config.export_filtered, Some(ExportFormat::GeoJson));
        assert_eq!(config.map.boundary_label, "Jeonju");
    }

    #[rstest]
    fn test_missing_config_file() {
        let dir = testdir!();
        assert!(read_config(&dir.join("missing.yaml")).is_err());
    }

    #[rstest]
    fn test_missing_archive_is_config_error() {
        let dir = testdir!();
        let config: Config = serde_yaml::from_str(&format!(
            "species_archives: [{}]\nboundary_archive: {}\nwork_dir: {}\noutput_dir: {}\n",
            dir.join("missing.zip").display(),
            dir.join("boundary.zip").display(),
            dir.join("work").display(),
            dir.join("out").display(),
        ))
        .unwrap();
        assert!(run_session(&config).is_err());
    }
}
