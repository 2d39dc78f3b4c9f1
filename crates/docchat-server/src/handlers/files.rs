use axum::{extract::State, Json};
use std::path::Path;

use crate::models::chat::FileEntry;
use crate::STATIC_ROUTE;
use crate::state::AppState;
use crate::utils::error::ApiError;

/// `GET /api/index-list`: names in the index directory.
pub async fn index_list_handler(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let mut names = read_file_names(&state.settings.storage.index_dir()).await?;
    names.sort();
    Ok(Json(names))
}

/// `GET /api/file-list`: documents available to chat with, by name (case-insensitive).
pub async fn file_list_handler(State(state): State<AppState>) -> Result<Json<Vec<FileEntry>>, ApiError> {
    let dir = state.settings.storage.file_dir();
    let names = read_file_names(&dir).await?;

    let mut entries: Vec<FileEntry> = names.into_iter().map(file_entry).collect();
    entries.sort_by_key(|e| e.name.to_lowercase());

    Ok(Json(entries))
}

async fn read_file_names(dir: &Path) -> Result<Vec<String>, ApiError> {
    let mut read_dir = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ApiError::InternalError(format!("Failed to read {}: {}", dir.display(), e)))?;

    let mut names = Vec::new();
    while let Some(entry) = read_dir
        .next_entry()
        .await
        .map_err(|e| ApiError::InternalError(e.to_string()))?
    {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// `path` is the URL under the `/static` route, not the on-disk location.
fn file_entry(full_name: String) -> FileEntry {
    let path = Path::new(&full_name);
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| full_name.clone());
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    FileEntry {
        path: format!("{}/file/{}", STATIC_ROUTE, full_name),
        name,
        ext,
        full_name,
    }
}
