use crate::types::{ChipError, ChipResult};
use std::path::{Path, PathBuf};

/// Stage source files matching a filesystem wildcard into a work
/// directory. Files already present with the same size are kept as-is.
/// Returns the staged paths; matching nothing is an error.
pub fn stage<P: AsRef<Path>>(pattern: &str, work_dir: P) -> ChipResult<Vec<PathBuf>> {
    let work_dir = work_dir.as_ref();
    if !work_dir.is_dir() {
        return Err(ChipError::InvalidParameter(format!(
            "work directory {} does not exist",
            work_dir.display()
        )));
    }

    let matches = glob::glob(pattern).map_err(|e| {
        ChipError::InvalidParameter(format!("bad staging pattern {}: {}", pattern, e))
    })?;

    let mut staged = Vec::new();
    let mut copied = 0usize;
    let mut kept = 0usize;
    for entry in matches {
        let source = entry.map_err(|e| ChipError::Io(e.into_error()))?;
        if !source.is_file() {
            continue;
        }
        let file_name = match source.file_name() {
            Some(name) => name.to_owned(),
            None => continue,
        };
        let dest = work_dir.join(file_name);

        if already_staged(&source, &dest)? {
            log::debug!("{} already staged", dest.display());
            kept += 1;
        } else {
            std::fs::copy(&source, &dest)?;
            log::debug!("Copied {} -> {}", source.display(), dest.display());
            copied += 1;
        }
        staged.push(dest);
    }

    if staged.is_empty() {
        return Err(ChipError::SourceNotFound(format!(
            "no files match {}",
            pattern
        )));
    }

    log::info!(
        "Staged {} file(s) into {} ({} copied, {} already present)",
        staged.len(),
        work_dir.display(),
        copied,
        kept
    );
    Ok(staged)
}

fn already_staged(source: &Path, dest: &Path) -> ChipResult<bool> {
    if !dest.is_file() {
        return Ok(false);
    }
    let source_len = std::fs::metadata(source)?.len();
    let dest_len = std::fs::metadata(dest)?.len();
    Ok(source_len == dest_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_stage_copies_matches() {
        let source_dir = TempDir::new().unwrap();
        let work_dir = TempDir::new().unwrap();
        std::fs::write(source_dir.path().join("a.tif"), b"aaaa").unwrap();
        std::fs::write(source_dir.path().join("b.tif"), b"bb").unwrap();
        std::fs::write(source_dir.path().join("notes.txt"), b"x").unwrap();

        let pattern = format!("{}/*.tif", source_dir.path().display());
        let staged = stage(&pattern, work_dir.path()).unwrap();

        assert_eq!(staged.len(), 2);
        assert!(work_dir.path().join("a.tif").is_file());
        assert!(work_dir.path().join("b.tif").is_file());
        assert!(!work_dir.path().join("notes.txt").exists());
    }

    #[test]
    fn test_stage_skips_files_already_present() {
        let source_dir = TempDir::new().unwrap();
        let work_dir = TempDir::new().unwrap();
        std::fs::write(source_dir.path().join("a.tif"), b"aaaa").unwrap();

        let pattern = format!("{}/*.tif", source_dir.path().display());
        stage(&pattern, work_dir.path()).unwrap();
        let modified_first = std::fs::metadata(work_dir.path().join("a.tif"))
            .unwrap()
            .modified()
            .unwrap();

        // Second run keeps the existing copy
        stage(&pattern, work_dir.path()).unwrap();
        let modified_second = std::fs::metadata(work_dir.path().join("a.tif"))
            .unwrap()
            .modified()
            .unwrap();
        assert_eq!(modified_first, modified_second);
    }

    #[test]
    fn test_stage_rejects_empty_match() {
        let work_dir = TempDir::new().unwrap();
        let pattern = format!("{}/*.zzz", work_dir.path().display());
        assert!(stage(&pattern, work_dir.path()).is_err());
    }
}
