//! Upload handlers
//!
//! Accepts PDF and common image uploads, rejects anything else, and never
//! clobbers an existing file: a name collision gets a unix-timestamp
//! suffix.

use std::path::{Path as FsPath, PathBuf};

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::header,
    response::{IntoResponse, Redirect, Response},
};
use pal_printer::{PalResult, SUPPORTED_IMAGE_EXTS};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::error::AppError;
use crate::core::state::ServerState;
use crate::utils::human_bytes;

/// One stored upload, as shown in listings.
#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    pub size_h: String,
    pub mtime: i64,
}

/// Strip path components and unsafe characters from a client filename.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c == ' ' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    cleaned.trim_matches('.').to_string()
}

fn allowed_filename(filename: &str) -> bool {
    let ext = FsPath::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    ext == "pdf" || SUPPORTED_IMAGE_EXTS.contains(&ext.as_str())
}

/// Reject anything that could escape the upload directory.
pub fn reject_traversal(filename: &str) -> Result<(), AppError> {
    if filename.is_empty()
        || filename.contains("..")
        || filename.contains('/')
        || filename.contains('\\')
    {
        return Err(AppError::Validation("Invalid filename".into()));
    }
    Ok(())
}

/// List stored uploads newest first, `limit` clamped to [1, 200].
pub fn list_uploads(dir: &FsPath, limit: usize) -> PalResult<Vec<FileEntry>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    for entry in entries.flatten() {
        let Ok(metadata) = entry.metadata() else { continue };
        if !metadata.is_file() {
            continue;
        }
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        files.push(FileEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            size: metadata.len(),
            size_h: human_bytes(metadata.len()),
            mtime,
        });
    }

    files.sort_by(|a, b| b.mtime.cmp(&a.mtime).then_with(|| a.name.cmp(&b.name)));
    files.truncate(limit.clamp(1, 200));
    Ok(files)
}

/// Pick a destination name, suffixing the unix timestamp on collision.
fn dedup_name(dir: &FsPath, filename: &str) -> (String, PathBuf) {
    let path = dir.join(filename);
    if !path.exists() {
        return (filename.to_string(), path);
    }
    let (base, ext) = match filename.rsplit_once('.') {
        Some((base, ext)) => (base, format!(".{ext}")),
        None => (filename, String::new()),
    };
    let name = format!("{base}_{}{ext}", chrono::Utc::now().timestamp());
    let path = dir.join(&name);
    (name, path)
}

pub async fn upload(
    State(state): State<ServerState>,
    mut multipart: Multipart,
) -> Result<Redirect, AppError> {
    let mut data: Option<Vec<u8>> = None;
    let mut original_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart request: {e}")))?
    {
        let name = field.name().map(|s| s.to_string());
        if name.as_deref() == Some("file") || name.as_deref() == Some("") {
            original_name = field.file_name().map(|s| s.to_string());
            data = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
                    .to_vec(),
            );
            break;
        }
    }

    let data = data.ok_or_else(|| AppError::Validation("No file part".into()))?;
    let raw_name =
        original_name.ok_or_else(|| AppError::Validation("No file provided".into()))?;

    let filename = sanitize_filename(&raw_name);
    if filename.is_empty() {
        return Err(AppError::Validation("Invalid filename".into()));
    }
    if !allowed_filename(&filename) {
        return Err(AppError::UnsupportedMedia(
            "Unsupported file type. Use PDF or common image formats.".into(),
        ));
    }
    if data.is_empty() {
        return Err(AppError::Validation("Empty file provided".into()));
    }
    let max_bytes = state.config().max_upload_bytes();
    if data.len() > max_bytes {
        return Err(AppError::Validation(format!(
            "File too large. Maximum size is {}",
            human_bytes(max_bytes as u64)
        )));
    }

    let (outname, outpath) = dedup_name(state.upload_dir(), &filename);
    tokio::fs::write(&outpath, &data)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to save upload: {e}")))?;

    info!(name = %outname, size = data.len(), "file uploaded");
    Ok(Redirect::to("/"))
}

pub async fn download(
    State(state): State<ServerState>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    reject_traversal(&filename)?;
    let path = state.upload_dir().join(&filename);
    let content = tokio::fs::read(&path)
        .await
        .map_err(|_| AppError::NotFound(format!("File not found: {filename}")))?;

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    Ok((
        [
            (header::CONTENT_TYPE, mime.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        content,
    )
        .into_response())
}

#[derive(Deserialize)]
pub struct FilesQuery {
    limit: Option<usize>,
}

#[derive(Serialize)]
pub struct FilesResponse {
    pub files: Vec<FileEntry>,
}

pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<FilesQuery>,
) -> Result<Json<FilesResponse>, AppError> {
    let files = list_uploads(state.upload_dir(), query.limit.unwrap_or(50))
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(FilesResponse { files }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("my scan (1).png"), "my_scan_1.png");
        assert_eq!(sanitize_filename("..\\..\\x.pdf"), "x.pdf");
        assert_eq!(sanitize_filename("...."), "");
        assert_eq!(sanitize_filename("héllo.pdf"), "hllo.pdf");
    }

    #[test]
    fn test_allowed_filename() {
        assert!(allowed_filename("a.pdf"));
        assert!(allowed_filename("a.PNG"));
        assert!(allowed_filename("a.tiff"));
        assert!(!allowed_filename("a.exe"));
        assert!(!allowed_filename("noext"));
    }

    #[test]
    fn test_reject_traversal() {
        assert!(reject_traversal("ok.pdf").is_ok());
        assert!(reject_traversal("").is_err());
        assert!(reject_traversal("../x.pdf").is_err());
        assert!(reject_traversal("a/b.pdf").is_err());
        assert!(reject_traversal("a\\b.pdf").is_err());
    }

    #[test]
    fn test_list_uploads_sorted_and_clamped() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            std::fs::write(dir.path().join(format!("f{i}.pdf")), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("subdir")).unwrap();

        let files = list_uploads(dir.path(), 3).unwrap();
        assert_eq!(files.len(), 3);
        assert!(files.iter().all(|f| f.name.ends_with(".pdf")));

        // limit of 0 is clamped up to 1
        assert_eq!(list_uploads(dir.path(), 0).unwrap().len(), 1);
        // missing dir is an empty listing, not an error
        assert!(list_uploads(&dir.path().join("nope"), 10).unwrap().is_empty());
    }

    #[test]
    fn test_dedup_name_adds_suffix_on_collision() {
        let dir = tempfile::tempdir().unwrap();
        let (first, _) = dedup_name(dir.path(), "doc.pdf");
        assert_eq!(first, "doc.pdf");

        std::fs::write(dir.path().join("doc.pdf"), b"x").unwrap();
        let (second, path) = dedup_name(dir.path(), "doc.pdf");
        assert_ne!(second, "doc.pdf");
        assert!(second.starts_with("doc_"));
        assert!(second.ends_with(".pdf"));
        assert!(!path.exists());
    }
}
