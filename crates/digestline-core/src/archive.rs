//! Timestamped JSON audit copy of each run's payload

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::Result;
use crate::report::DigestPayload;

/// `digest_<YYYYmmdd_HHMMSS>.json`, stamped in UTC
pub fn archive_file_name(at: DateTime<Utc>) -> String {
    format!("digest_{}.json", at.format("%Y%m%d_%H%M%S"))
}

/// Write the payload verbatim under `dir`, creating it if needed
pub fn write_archive(dir: &Path, payload: &DigestPayload, at: DateTime<Utc>) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(archive_file_name(at));
    let json = serde_json::to_string_pretty(payload)?;
    std::fs::write(&path, json)?;
    info!("Archived digest payload to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_write_archive() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("digests");
        let at = Utc.with_ymd_and_hms(2024, 3, 10, 7, 5, 9).unwrap();
        let payload = DigestPayload {
            top_themes_keywords: vec!["roadmap".to_string()],
            ..Default::default()
        };

        let path = write_archive(&nested, &payload, at).unwrap();
        assert_eq!(path, nested.join("digest_20240310_070509.json"));

        let restored: DigestPayload =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(restored, payload);
    }
}
