use std::path::Path;

use crate::{
    archive::extract::{locate_shapefile, Upload, UploadKind},
    error::{MapError, MapResult},
    map::{compose_map, MapStyle, MapView},
    table::{
        feature_table::FeatureTable,
        filter::{distinct_values, filter_by_values, Selection},
        loader::load_feature_table,
        merge::merge_tables,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    SpeciesLoaded,
    /// Boundary is loaded, with or without species.
    BoundaryLoaded,
    Filtered,
    Rendered,
}

/// A species table together with the archive it came from.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub archive: String,
    pub table: FeatureTable,
}

/// Outcome of a batch upload: which archives made it and which failed at what stage.
#[derive(Debug, Default)]
pub struct UploadReport {
    pub loaded: Vec<String>,
    pub failed: Vec<(String, MapError)>,
}

impl UploadReport {
    pub fn is_complete_failure(&self) -> bool {
        self.loaded.is_empty() && !self.failed.is_empty()
    }
}

fn load_upload(
    work_dir: &Path,
    kind: UploadKind,
    index: usize,
    upload: &Upload,
    fallback_crs: Option<&str>,
) -> MapResult<FeatureTable> {
    let shapefile = locate_shapefile(work_dir, kind, index, upload)?;
    load_feature_table(&shapefile, fallback_crs)
}

/// State of one user session. Uploads replace the tables of their kind wholesale and drop the selection, which
/// has to be made again against the new data.
#[derive(Debug, Default)]
pub struct Session {
    species_tables: Vec<LoadedTable>,
    boundary: Option<FeatureTable>,
    selection: Selection,
    rendered: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        if self.rendered {
            SessionState::Rendered
        } else if self.selection != Selection::NotMade && self.is_ready_for_selection() {
            SessionState::Filtered
        } else if self.boundary.is_some() {
            SessionState::BoundaryLoaded
        } else if !self.species_tables.is_empty() {
            SessionState::SpeciesLoaded
        } else {
            SessionState::Empty
        }
    }

    fn is_ready_for_selection(&self) -> bool {
        !self.species_tables.is_empty() && self.boundary.is_some()
    }

    pub fn species_tables(&self) -> &[LoadedTable] {
        &self.species_tables
    }

    pub fn boundary(&self) -> Option<&FeatureTable> {
        self.boundary.as_ref()
    }

    /// Load every archive of a species upload. Archives that fail are reported and left out, the others replace the
    /// current species tables. If none loads the previous tables are discarded all the same.
    pub fn upload_species(
        &mut self,
        work_dir: &Path,
        uploads: &[Upload],
        fallback_crs: Option<&str>,
    ) -> UploadReport {
        let mut report = UploadReport::default();
        let mut tables = Vec::new();
        for (index, upload) in uploads.iter().enumerate() {
            match load_upload(work_dir, UploadKind::Species, index, upload, fallback_crs) {
                Ok(table) => {
                    log::info!("Loaded {} species features from {}", table.len(), upload.name);
                    report.loaded.push(upload.name.clone());
                    tables.push(LoadedTable {
                        archive: upload.name.clone(),
                        table,
                    });
                }
                Err(err) => {
                    log::warn!("[{}] {}", err.stage(), err);
                    report.failed.push((upload.name.clone(), err));
                }
            }
        }
        self.species_tables = tables;
        self.reset_selection();
        report
    }

    /// Load the boundary archive. On failure the previous boundary is discarded.
    pub fn upload_boundary(
        &mut self,
        work_dir: &Path,
        upload: &Upload,
        fallback_crs: Option<&str>,
    ) -> MapResult<()> {
        self.boundary = None;
        self.reset_selection();
        let table = load_upload(work_dir, UploadKind::Boundary, 0, upload, fallback_crs)?;
        log::info!("Loaded {} boundary features from {}", table.len(), upload.name);
        self.boundary = Some(table);
        Ok(())
    }

    fn reset_selection(&mut self) {
        self.selection = Selection::NotMade;
        self.rendered = false;
    }

    /// All species tables as one.
    pub fn merged_species(&self) -> FeatureTable {
        merge_tables(self.species_tables.iter().map(|loaded| &loaded.table))
    }

    /// Values offered for selection: distinct, sorted, non-null values of `column`.
    pub fn species_options(&self, column: &str) -> MapResult<Vec<String>> {
        distinct_values(&self.merged_species(), column)
    }

    pub fn select(&mut self, selection: Selection) {
        self.selection = selection;
        self.rendered = false;
    }

    /// The merged species filtered by the current selection, `None` while no selection has been made.
    pub fn filtered(&self, column: &str) -> MapResult<Option<FeatureTable>> {
        match self.selection.values() {
            None => Ok(None),
            Some(selected) => filter_by_values(&self.merged_species(), column, selected).map(Some),
        }
    }

    /// Compose the map for the current selection. `None` until species and boundary are loaded and a selection
    /// has been made.
    pub fn render(&mut self, column: &str, style: &MapStyle) -> MapResult<Option<MapView>> {
        if !self.is_ready_for_selection() {
            return Ok(None);
        }
        let Some(selected) = self.selection.values() else {
            return Ok(None);
        };
        let filtered = filter_by_values(&self.merged_species(), column, selected)?;
        if filtered.is_empty() {
            log::warn!("The selection matched no features");
        }
        let view = compose_map(self.boundary.as_ref(), &filtered, column, selected, style);
        self.rendered = true;
        Ok(Some(view))
    }
}
