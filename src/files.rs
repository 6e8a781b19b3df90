//! File intake for task attachments.
//!
//! Validates a batch of uploaded files against a size cap and an extension
//! allowlist, then persists the accepted ones under generated unique names.
//! The count check fails the whole batch before anything touches disk; a
//! file with a disallowed extension only skips that file.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Attachment;

lazy_static! {
    // Anything outside this set is replaced when sanitizing a filename.
    static ref UNSAFE_CHARS: Regex = Regex::new(r"[^A-Za-z0-9._-]+").unwrap();
}

/// An uploaded file held in memory, as collected from a multipart payload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Reduces a client-supplied filename to a safe single path segment.
///
/// Directory components are discarded, characters outside
/// `[A-Za-z0-9._-]` become underscores, and leading/trailing dots and
/// underscores are stripped so the result can never traverse out of the
/// upload directory or hide as a dotfile.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned = UNSAFE_CHARS.replace_all(base, "_");
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '_');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Checks the file extension (last dot-segment, case-insensitive) against
/// the allowlist.
pub fn allowed_file(filename: &str, allowed_extensions: &HashSet<String>) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| allowed_extensions.contains(&ext.to_lowercase()))
        .unwrap_or(false)
}

/// Persists a batch of uploads and returns metadata for the stored files.
///
/// Fails with a validation error if the batch exceeds `max_count`, before
/// any file is written. Files with disallowed extensions are skipped rather
/// than failing the batch. Each accepted file is stored under
/// `<unique-token>_<sanitized-name>` and its size is read back from the
/// filesystem after the write completes.
pub fn save_uploads(
    files: &[UploadedFile],
    upload_dir: &Path,
    allowed_extensions: &HashSet<String>,
    max_count: usize,
) -> Result<Vec<Attachment>, AppError> {
    if files.len() > max_count {
        return Err(AppError::ValidationError(format!(
            "Only up to {} documents are allowed.",
            max_count
        )));
    }

    let mut metadata = Vec::new();
    for file in files {
        if !allowed_file(&file.original_name, allowed_extensions) {
            log::warn!(
                "Skipping upload with disallowed extension: {}",
                file.original_name
            );
            continue;
        }

        let original_name = sanitize_filename(&file.original_name);
        let stored_name = format!("{}_{}", Uuid::new_v4().simple(), original_name);
        let path = upload_dir.join(&stored_name);

        fs::write(&path, &file.data).map_err(|e| {
            AppError::InternalServerError(format!("Failed to store upload {}: {}", stored_name, e))
        })?;

        let size_bytes = fs::metadata(&path)
            .map_err(|e| {
                AppError::InternalServerError(format!(
                    "Failed to stat stored upload {}: {}",
                    stored_name, e
                ))
            })?
            .len();

        metadata.push(Attachment {
            original_name,
            stored_name,
            path: path.to_string_lossy().into_owned(),
            mime_type: file.content_type.clone(),
            size_bytes,
        });
    }

    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_upload_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("taskboard-files-test-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn pdf_allowlist() -> HashSet<String> {
        ["pdf".to_string()].into_iter().collect()
    }

    fn upload(name: &str, body: &[u8]) -> UploadedFile {
        UploadedFile {
            original_name: name.to_string(),
            content_type: "application/pdf".to_string(),
            data: body.to_vec(),
        }
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("my report (final).pdf"), "my_report_final_.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("..\\windows\\system32"), "system32");
        assert_eq!(sanitize_filename(".hidden"), "hidden");
        assert_eq!(sanitize_filename("///"), "file");
        assert_eq!(sanitize_filename(""), "file");
    }

    #[test]
    fn test_allowed_file_is_case_insensitive() {
        let allowed = pdf_allowlist();
        assert!(allowed_file("report.pdf", &allowed));
        assert!(allowed_file("Report.PDF", &allowed));
        assert!(allowed_file("archive.tar.pdf", &allowed));
        assert!(!allowed_file("report.exe", &allowed));
        assert!(!allowed_file("no-extension", &allowed));
    }

    #[test]
    fn test_too_many_files_fails_before_any_write() {
        let dir = temp_upload_dir();
        let files: Vec<UploadedFile> = (0..4)
            .map(|i| upload(&format!("doc{}.pdf", i), b"content"))
            .collect();

        let result = save_uploads(&files, &dir, &pdf_allowlist(), 3);
        match result {
            Err(AppError::ValidationError(msg)) => assert!(msg.contains("3")),
            other => panic!("Expected ValidationError, got {:?}", other),
        }

        // Fail-fast: nothing was persisted.
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_disallowed_extension_is_skipped_not_fatal() {
        let dir = temp_upload_dir();
        let files = vec![
            upload("first.pdf", b"one"),
            upload("malware.exe", b"two"),
            upload("second.pdf", b"three"),
        ];

        let metadata = save_uploads(&files, &dir, &pdf_allowlist(), 3).unwrap();
        assert_eq!(metadata.len(), 2);
        assert_eq!(metadata[0].original_name, "first.pdf");
        assert_eq!(metadata[1].original_name, "second.pdf");

        // Exactly the two accepted files exist on disk, sizes measured after
        // the write.
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 2);
        assert_eq!(metadata[0].size_bytes, 3);
        assert_eq!(metadata[1].size_bytes, 5);
        for entry in &metadata {
            assert!(PathBuf::from(&entry.path).exists());
            assert!(entry.stored_name.ends_with(&entry.original_name));
        }
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_stored_names_are_unique_per_upload() {
        let dir = temp_upload_dir();
        let files = vec![upload("same.pdf", b"a"), upload("same.pdf", b"b")];

        let metadata = save_uploads(&files, &dir, &pdf_allowlist(), 3).unwrap();
        assert_eq!(metadata.len(), 2);
        assert_ne!(metadata[0].stored_name, metadata[1].stored_name);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_exactly_max_count_is_accepted() {
        let dir = temp_upload_dir();
        let files: Vec<UploadedFile> = (0..3)
            .map(|i| upload(&format!("doc{}.pdf", i), b"content"))
            .collect();

        let metadata = save_uploads(&files, &dir, &pdf_allowlist(), 3).unwrap();
        assert_eq!(metadata.len(), 3);
        fs::remove_dir_all(&dir).unwrap();
    }
}
