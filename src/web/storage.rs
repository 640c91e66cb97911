use std::{
    io,
    path::{Component, Path, PathBuf},
};

use axum::{
    extract::{Path as AxumPath, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use mime::Mime;
use tracing::error;

use crate::web::AppState;

/// Joins `requested` onto `root`, refusing anything that could leave the directory.
pub fn resolve_upload_path(root: &Path, requested: &str) -> Option<PathBuf> {
    if requested.is_empty() || requested.contains('\\') || requested.contains('\0') {
        return None;
    }

    let relative = Path::new(requested);
    let mut resolved = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            _ => return None,
        }
    }

    if resolved == root {
        return None;
    }
    Some(resolved)
}

pub fn content_type_for(path: &Path) -> Mime {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "png" => mime::IMAGE_PNG,
        "jpg" | "jpeg" => mime::IMAGE_JPEG,
        "pdf" => mime::APPLICATION_PDF,
        "mp4" => "video/mp4".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM),
        "mov" => "video/quicktime"
            .parse()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM),
        "epub" => "application/epub+zip"
            .parse()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM),
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

/// `GET /uploads/*path`: raw bytes of a stored material.
pub async fn serve_upload(
    State(state): State<AppState>,
    AxumPath(requested): AxumPath<String>,
) -> Response {
    let Some(path) = resolve_upload_path(state.upload_dir(), &requested) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(err) if matches!(err.kind(), io::ErrorKind::NotFound) => {
            return StatusCode::NOT_FOUND.into_response();
        }
        Err(err) => {
            // Directories land here as well.
            if tokio::fs::metadata(&path)
                .await
                .map(|meta| meta.is_dir())
                .unwrap_or(false)
            {
                return StatusCode::NOT_FOUND.into_response();
            }
            error!(?err, file = %path.display(), "failed to read stored upload");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let content_type = content_type_for(&path);
    let header_value = HeaderValue::from_str(content_type.as_ref())
        .unwrap_or(HeaderValue::from_static("application/octet-stream"));

    ([(header::CONTENT_TYPE, header_value)], bytes).into_response()
}
