use std::path::PathBuf;

use thiserror::Error;

/// Failures of a single pipeline stage. None of them is fatal to a session: the caller reports them and
/// continues with whatever data did load.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("no shapefile found in archive {archive}")]
    NoShapefileFound { archive: String },

    #[error("could not unpack archive {archive}: {reason}")]
    UnreadableArchive { archive: String, reason: String },

    #[error("could not read geometries from {path:?}: {reason}")]
    UnreadableGeometry { path: PathBuf, reason: String },

    #[error("attribute column '{column}' not found, available columns: {available:?}")]
    MissingAttributeColumn {
        column: String,
        available: Vec<String>,
    },

    #[error("could not reproject {source_crs} to EPSG:4326: {reason}")]
    CrsReprojectionFailure { source_crs: String, reason: String },

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

impl MapError {
    /// Short label of the stage that failed, used when reporting to the user.
    pub fn stage(&self) -> &'static str {
        match self {
            MapError::NoShapefileFound { .. } | MapError::UnreadableArchive { .. } => "extract",
            MapError::UnreadableGeometry { .. } => "load",
            MapError::CrsReprojectionFailure { .. } => "reproject",
            MapError::MissingAttributeColumn { .. } => "filter",
            MapError::Io(_) => "filesystem",
        }
    }
}

pub type MapResult<T> = Result<T, MapError>;
