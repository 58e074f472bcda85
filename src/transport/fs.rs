use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;
use walkdir::WalkDir;

use crate::constants::filings::{INSTANCE_EXTENSION, RSSFEED_ENTRY};
use crate::errors::ExtractError;
use crate::runner::FilingRef;
use crate::types::FilingName;

/// True if the path has an `.xbrl` extension (case-insensitive).
pub fn is_instance_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(INSTANCE_EXTENSION))
        .unwrap_or(false)
}

/// Best-effort file modified time, used when no envelope declares one.
pub fn file_mtime(path: &Path) -> Option<DateTime<Utc>> {
    let metadata = std::fs::metadata(path).ok()?;
    let modified = metadata.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
}

/// Filing name derived from a file path (stem without extension).
pub fn filing_name_from_path(path: &Path) -> FilingName {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("unnamed_filing")
        .to_string()
}

/// Collect filing references from a path.
///
/// Accepts a single instance document, a directory of them (walked in sorted
/// order), or a zip archive. Publication time comes from the archive's
/// metadata envelope when present, else from file modification time.
pub fn collect_filings(path: impl AsRef<Path>) -> Result<Vec<FilingRef>, ExtractError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ExtractError::FilingUnreadable {
            filing: path.display().to_string(),
            details: "no such file or directory".to_string(),
        });
    }
    if path.is_file() {
        if path.extension().and_then(|ext| ext.to_str()) == Some("zip") {
            return filings_from_zip(path);
        }
        if !is_instance_file(path) {
            return Err(ExtractError::FilingUnreadable {
                filing: path.display().to_string(),
                details: "not an .xbrl instance document".to_string(),
            });
        }
        let publication_time = file_mtime(path).unwrap_or_else(Utc::now);
        return Ok(vec![FilingRef::from_path(
            filing_name_from_path(path),
            path,
            publication_time,
        )]);
    }

    let mut paths: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.path().to_path_buf())
        .filter(|path| is_instance_file(path))
        .collect();
    paths.sort();

    let filings = paths
        .into_iter()
        .map(|path| {
            let publication_time = file_mtime(&path).unwrap_or_else(Utc::now);
            FilingRef::from_path(filing_name_from_path(&path), &path, publication_time)
        })
        .collect::<Vec<_>>();
    debug!(count = filings.len(), "collected filings from directory");
    Ok(filings)
}

/// Read every `.xbrl` entry of a zip archive into memory.
///
/// When the archive carries a metadata envelope (a JSON object mapping entry
/// names to RFC 3339 publication times), those times take precedence over
/// the archive file's modification time.
pub fn filings_from_zip(path: impl AsRef<Path>) -> Result<Vec<FilingRef>, ExtractError> {
    let path = path.as_ref();
    let unreadable = |details: String| ExtractError::FilingUnreadable {
        filing: path.display().to_string(),
        details,
    };

    let file = File::open(path)?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|err| unreadable(err.to_string()))?;

    let mut publication_times: HashMap<String, DateTime<Utc>> = HashMap::new();
    if let Ok(mut envelope) = archive.by_name(RSSFEED_ENTRY) {
        let mut raw = String::new();
        envelope
            .read_to_string(&mut raw)
            .map_err(|err| unreadable(err.to_string()))?;
        let parsed: HashMap<String, String> = serde_json::from_str(&raw)
            .map_err(|err| unreadable(format!("bad {RSSFEED_ENTRY} envelope: {err}")))?;
        for (name, stamp) in parsed {
            if let Ok(time) = DateTime::parse_from_rfc3339(&stamp) {
                publication_times.insert(name, time.with_timezone(&Utc));
            }
        }
    }

    let fallback = file_mtime(path).unwrap_or_else(Utc::now);
    let mut filings = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|err| unreadable(err.to_string()))?;
        if !entry.is_file() {
            continue;
        }
        let entry_name = entry.name().to_string();
        if !is_instance_file(Path::new(&entry_name)) {
            continue;
        }
        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|err| unreadable(err.to_string()))?;
        let publication_time = publication_times
            .get(&entry_name)
            .copied()
            .unwrap_or(fallback);
        filings.push(FilingRef::from_bytes(
            filing_name_from_path(Path::new(&entry_name)),
            bytes,
            publication_time,
        ));
    }
    filings.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(count = filings.len(), "collected filings from archive");
    Ok(filings)
}
