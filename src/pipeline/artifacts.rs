//! Deterministic artifact names and cleanup of a previous run.
//!
//! Every file a run writes for source `S` is named after `stem(S)`:
//!
//! ```text
//! {stem}_page1.jpg … {stem}_pageN.jpg   rasterised pages
//! {stem}_response.json                  cached model reply (optional)
//! ```
//!
//! Cleanup deletes exactly these names and nothing else, so re-processing
//! replaces a run's artifacts rather than adding to them. Two concurrent
//! runs for the same stem in the same directory race on these names;
//! callers must serialise them (see [`crate::process::process_many`]).

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the JPEG for `page_num` (1-indexed).
pub fn page_image_name(stem: &str, page_num: usize) -> String {
    format!("{stem}_page{page_num}.jpg")
}

/// File name of the cached raw reply.
pub fn response_cache_name(stem: &str) -> String {
    format!("{stem}_response.json")
}

static RE_ARTIFACT_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^_(?:page\d+\.jpg|response\.json)$").unwrap());

/// Whether `file_name` is an artifact of the source with this stem.
pub fn is_artifact_of(file_name: &str, stem: &str) -> bool {
    file_name
        .strip_prefix(stem)
        .is_some_and(|rest| RE_ARTIFACT_SUFFIX.is_match(rest))
}

/// What a cleanup pass did.
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
    /// Artifacts that could not be deleted, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

/// Delete all artifacts of `stem` in `output_dir`.
///
/// Never fails: a missing directory means there is nothing to clean, and a
/// file that cannot be removed is logged and left behind.
pub async fn cleanup_artifacts(output_dir: &Path, stem: &str) -> CleanupReport {
    let mut report = CleanupReport::default();

    let mut entries = match tokio::fs::read_dir(output_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return report,
        Err(e) => {
            warn!("Cleanup: cannot list {}: {}", output_dir.display(), e);
            report
                .failed
                .push((output_dir.to_path_buf(), e.to_string()));
            return report;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!("Cleanup: error reading {}: {}", output_dir.display(), e);
                report
                    .failed
                    .push((output_dir.to_path_buf(), e.to_string()));
                break;
            }
        };

        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !is_artifact_of(name, stem) {
            continue;
        }

        let path = entry.path();
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Removed stale artifact {}", path.display());
                report.removed.push(path);
            }
            Err(e) => {
                warn!("Failed to remove {}: {}", path.display(), e);
                report.failed.push((path, e.to_string()));
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_deterministic() {
        assert_eq!(page_image_name("minutes", 1), "minutes_page1.jpg");
        assert_eq!(page_image_name("minutes", 12), "minutes_page12.jpg");
        assert_eq!(response_cache_name("minutes"), "minutes_response.json");
    }

    #[test]
    fn matches_only_exact_artifacts() {
        assert!(is_artifact_of("report_page1.jpg", "report"));
        assert!(is_artifact_of("report_page10.jpg", "report"));
        assert!(is_artifact_of("report_response.json", "report"));

        assert!(!is_artifact_of("report_v2_page1.jpg", "report"));
        assert!(!is_artifact_of("report_page1.png", "report"));
        assert!(!is_artifact_of("report_page.jpg", "report"));
        assert!(!is_artifact_of("report.pdf", "report"));
        assert!(!is_artifact_of("other_page1.jpg", "report"));
    }

    #[test]
    fn stem_with_regex_metacharacters() {
        assert!(is_artifact_of("a+b (1)_page2.jpg", "a+b (1)"));
        assert!(!is_artifact_of("aab (1)_page2.jpg", "a+b (1)"));
    }

    #[tokio::test]
    async fn cleanup_removes_only_own_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "doc_page1.jpg",
            "doc_page2.jpg",
            "doc_page9.jpg",
            "doc_response.json",
            "doc_v2_page1.jpg",
            "other_page1.jpg",
            "doc.pdf",
        ] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let report = cleanup_artifacts(dir.path(), "doc").await;
        assert_eq!(report.removed.len(), 4);
        assert!(report.failed.is_empty());

        let mut left: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(left, ["doc.pdf", "doc_v2_page1.jpg", "other_page1.jpg"]);
    }

    #[tokio::test]
    async fn cleanup_of_missing_dir_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let report = cleanup_artifacts(&dir.path().join("absent"), "doc").await;
        assert!(report.removed.is_empty());
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn cleanup_failure_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        // A directory with an artifact name cannot be removed by remove_file.
        std::fs::create_dir(dir.path().join("doc_page1.jpg")).unwrap();
        std::fs::write(dir.path().join("doc_page2.jpg"), b"x").unwrap();

        let report = cleanup_artifacts(dir.path(), "doc").await;
        assert_eq!(report.removed, [dir.path().join("doc_page2.jpg")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, dir.path().join("doc_page1.jpg"));
        assert!(dir.path().join("doc_page1.jpg").is_dir());
    }
}
