//! Uploaded image preview

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use super::error::ApiError;
use crate::upload::read_preview;
use crate::AppState;

/// GET /preview/:filename
///
/// Streams a file from the upload directory with an image content type.
pub async fn preview(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let preview = read_preview(state.pipeline.upload_dir(), &filename).await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, preview.content_type)],
        preview.bytes,
    )
        .into_response())
}
