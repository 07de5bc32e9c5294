// Zip packaging of a finished batch directory.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::{BatchError, Result};

/// Adds every regular file directly under `dir` to a new archive at
/// `archive_path`, stored by file name in name order. Returns the names.
pub fn package_dir(dir: &Path, archive_path: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| BatchError::io(dir, e))? {
        let entry = entry.map_err(|e| BatchError::io(dir, e))?;
        let path = entry.path();
        if path.is_file() {
            files.push((entry.file_name().to_string_lossy().into_owned(), path));
        }
    }
    files.sort();

    let out = File::create(archive_path).map_err(|e| BatchError::io(archive_path, e))?;
    let mut zip = ZipWriter::new(out);
    let opts = SimpleFileOptions::default();
    for (name, path) in &files {
        let bytes = fs::read(path).map_err(|e| BatchError::io(path, e))?;
        zip.start_file(name.as_str(), opts)?;
        zip.write_all(&bytes).map_err(|e| BatchError::io(archive_path, e))?;
    }
    zip.finish()?;

    Ok(files.into_iter().map(|(name, _)| name).collect())
}
