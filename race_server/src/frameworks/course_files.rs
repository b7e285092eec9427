// Loads course files from disk into the catalog.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::domain::courses::{CourseCatalog, CourseError};

/// Adds every `*.json` file in `dir` to the catalog, keyed by file stem.
/// Returns how many courses were loaded.
pub fn load_course_dir(catalog: &mut CourseCatalog, dir: &Path) -> Result<usize, CourseError> {
    let io_error = |source| CourseError::Io {
        path: dir.display().to_string(),
        source,
    };
    let mut paths: Vec<_> = fs::read_dir(dir)
        .map_err(io_error)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut loaded = 0;
    for path in &paths {
        let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) else {
            debug!(path = %path.display(), "skipping course file without a usable name");
            continue;
        };
        let json = fs::read_to_string(path).map_err(|source| CourseError::Io {
            path: path.display().to_string(),
            source,
        })?;
        catalog.insert_json(id, &json)?;
        debug!(course = id, "course loaded");
        loaded += 1;
    }
    info!(dir = %dir.display(), count = loaded, "course directory loaded");
    Ok(loaded)
}
