//! Photo verification endpoint

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    Json,
};

use super::error::ApiError;
use crate::pipeline::VerifyResponse;
use crate::upload::UploadedImage;
use crate::AppState;

/// Multipart field carrying the photo.
const FILE_FIELD: &str = "file";

/// POST /verify
///
/// Multipart upload with the photo in field `file`. A body that is not
/// multipart at all is treated like a missing file.
pub async fn verify(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let upload = match multipart {
        Ok(multipart) => read_upload(multipart).await?,
        Err(rejection) => {
            tracing::debug!(%rejection, "verify: not a multipart request");
            None
        }
    };

    let response = state.pipeline.verify(upload).await?;
    Ok(Json(response))
}

/// Pull the `file` file part out of the form, ignoring any other fields.
async fn read_upload(mut multipart: Multipart) -> Result<Option<UploadedImage>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        // A part without a filename parameter is a plain form value, not a
        // file. An empty filename is the pipeline's to reject.
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await.map_err(upload_error)?;

        return Ok(Some(UploadedImage {
            filename,
            bytes: bytes.to_vec(),
        }));
    }

    Ok(None)
}

/// Oversized bodies keep their 413; anything else is a malformed form.
fn upload_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(format!("Upload too large: {}", err.body_text()))
    } else {
        ApiError::BadRequest(format!("Invalid upload: {}", err.body_text()))
    }
}
