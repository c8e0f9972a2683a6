use crate::error::Result;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use zip::ZipArchive;

/// True when the file parses as a zip archive (end-of-central-directory
/// record and central directory both readable).
pub fn is_valid_zip(path: &Path) -> bool {
    match count_entries(path) {
        Ok(entries) => {
            log::debug!("{} is a zip archive with {entries} entries", path.display());
            true
        }
        Err(e) => {
            log::debug!("{} is not a valid zip archive: {e}", path.display());
            false
        }
    }
}

fn count_entries(path: &Path) -> Result<usize> {
    let file = File::open(path)?;
    let archive = ZipArchive::new(BufReader::new(file))?;
    Ok(archive.len())
}
