use std::{
    fs,
    io::{self, Cursor},
    path::{Path, PathBuf},
};

use zip::ZipArchive;

use crate::error::{MapError, MapResult};

/// One uploaded archive: the file name it was uploaded under and its raw bytes.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn from_file(filepath: &Path) -> io::Result<Self> {
        let name = filepath
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| filepath.to_string_lossy().into_owned());
        Ok(Self {
            name,
            bytes: fs::read(filepath)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Species,
    Boundary,
}

impl UploadKind {
    pub fn dir_name(&self) -> &'static str {
        match self {
            UploadKind::Species => "species_data",
            UploadKind::Boundary => "boundary_data",
        }
    }
}

/// Directory an upload is extracted to: `<work_dir>/<kind>/<index>_<file stem>`. The index keeps uploads of the
/// same batch apart, the stem keeps it readable. Characters outside `[A-Za-z0-9._-]` are replaced.
pub fn extraction_dir(work_dir: &Path, kind: UploadKind, index: usize, upload_name: &str) -> PathBuf {
    let stem = Path::new(upload_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let sanitized: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let sanitized = if sanitized.is_empty() {
        "upload".to_string()
    } else {
        sanitized
    };
    work_dir
        .join(kind.dir_name())
        .join(format!("{}_{}", index, sanitized))
}

fn unreadable(upload: &Upload, reason: impl ToString) -> MapError {
    MapError::UnreadableArchive {
        archive: upload.name.clone(),
        reason: reason.to_string(),
    }
}

/// Unpack `upload` into `target_dir`. The directory is emptied first so a repeated upload under the same identity
/// replaces its own earlier contents and nothing else. An archive with an entry pointing outside `target_dir` is
/// rejected before anything is touched.
pub fn extract_upload(upload: &Upload, target_dir: &Path) -> MapResult<()> {
    let mut archive =
        ZipArchive::new(Cursor::new(upload.bytes.as_slice())).map_err(|err| unreadable(upload, err))?;

    let mut entry_paths = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i).map_err(|err| unreadable(upload, err))?;
        match entry.enclosed_name() {
            Some(path) => entry_paths.push(target_dir.join(path)),
            None => {
                return Err(unreadable(
                    upload,
                    format!("zip entry {} points outside the archive", entry.name()),
                ));
            }
        }
    }

    if target_dir.exists() {
        fs::remove_dir_all(target_dir)?;
    }
    fs::create_dir_all(target_dir)?;

    for (i, entry_path) in entry_paths.into_iter().enumerate() {
        let mut entry = archive.by_index(i).map_err(|err| unreadable(upload, err))?;

        if entry.is_dir() {
            fs::create_dir_all(&entry_path)?;
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = fs::File::create(&entry_path)?;
        io::copy(&mut entry, &mut outfile)?;
    }
    log::debug!(
        "Extracted {} entries of {} to {:?}",
        archive.len(),
        upload.name,
        target_dir
    );
    Ok(())
}

fn is_shapefile(path: &Path) -> bool {
    path.extension()
        .map(|extension| extension.eq_ignore_ascii_case("shp"))
        .unwrap_or(false)
}

/// All shapefiles below `dir`, in lexicographic path order.
pub fn find_shapefiles(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if is_shapefile(&path) {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

/// Extract an upload to its own directory and return the shapefile to load from it. When the archive holds more
/// than one shapefile the first in path order is used.
pub fn locate_shapefile(
    work_dir: &Path,
    kind: UploadKind,
    index: usize,
    upload: &Upload,
) -> MapResult<PathBuf> {
    let target_dir = extraction_dir(work_dir, kind, index, &upload.name);
    extract_upload(upload, &target_dir)?;
    let shapefiles = find_shapefiles(&target_dir)?;
    if shapefiles.len() > 1 {
        log::warn!(
            "Archive {} contains {} shapefiles, using {:?}",
            upload.name,
            shapefiles.len(),
            shapefiles[0]
        );
    }
    shapefiles
        .into_iter()
        .next()
        .ok_or_else(|| MapError::NoShapefileFound {
            archive: upload.name.clone(),
        })
}
