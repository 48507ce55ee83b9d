//! Small free-standing helpers shared across the store, registry, and
//! coordinator modules.

use std::io;
use std::path::Path;

use jiff::Timestamp;
use uuid::Uuid;

/// Current wall-clock time as an ISO-8601 string (`2025-01-01T00:00:00Z`).
pub fn iso_date() -> String {
    Timestamp::now().strftime("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Current wall-clock time as seconds since epoch, used as a sorted-set score.
pub fn epoch_score() -> f64 {
    Timestamp::now().as_second() as f64
}

/// Fresh UUID v4 string.
pub fn generate_uuid() -> String {
    Uuid::new_v4().to_string()
}

/// Short id suitable for generated job names (`direct-pipeline-<shortid>`,
/// `cmd-<shortid>`). Eight hex characters drawn from a fresh UUID.
pub fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Write `contents` to `path` atomically by writing to a sibling temp file
/// in the same directory and renaming over the destination.
pub fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    std::fs::write(tmp.path(), contents)?;
    tmp.persist(path)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_date_format() {
        let date = iso_date();
        assert!(date.ends_with('Z'));
        assert_eq!(date.len(), 20);
    }

    #[test]
    fn test_short_id_length() {
        let id = short_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_write_atomic_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.Jenkinsfile");
        write_atomic(&path, "pipeline {}").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "pipeline {}");
    }
}
