//! The process endpoint: validate the form, store the image, relay the
//! backend's streamed answer.

use axum::{
    body::Body,
    extract::{Multipart, State},
    http::{StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use futures::StreamExt;
use uuid::Uuid;

use crate::AppState;
use crate::errors::{Error, Result};

/// One parsed multipart submission.
struct UploadForm {
    image: Option<ImageField>,
    prompt: Option<String>,
}

struct ImageField {
    filename: String,
    content_type: String,
    bytes: Bytes,
}

/// Handle a form submission.
///
/// Exactly one object is written to storage per successful call. There is no
/// rollback if the backend call fails afterwards; the orphaned upload stays.
pub async fn process(State(state): State<AppState>, multipart: Multipart) -> Result<Response> {
    let form = read_form(multipart).await?;

    // Validation order mirrors the deployed service: image presence, image
    // type, then prompt.
    let Some(image) = form.image else {
        return Err(Error::InvalidInput {
            message: "No image file uploaded.".to_string(),
        });
    };
    if !image.content_type.starts_with("image/") {
        return Err(Error::InvalidInput {
            message: "File uploaded is not an image.".to_string(),
        });
    }
    let prompt = match form.prompt {
        Some(prompt) if !prompt.is_empty() => prompt,
        _ => {
            return Err(Error::InvalidInput {
                message: "No prompt provided.".to_string(),
            });
        }
    };

    let Some(storage) = state.storage.as_ref() else {
        return Err(Error::Storage {
            source: anyhow::anyhow!(
                "object storage is not configured: set account_id, access_key_id, access_key_secret and bucket_name"
            ),
        });
    };

    let key = format!("uploads/{}{}", Uuid::new_v4(), file_extension(&image.filename));
    storage.put(&key, &image.content_type, image.bytes).await?;
    let image_uri = storage.object_uri(&key);
    tracing::info!(key = %key, "Image uploaded, forwarding to backend");

    // Storage failure above short-circuits; the backend is only reached once
    // the object exists.
    let chunks = state.backend.generate(&image_uri, &prompt).await?;
    let body = Body::from_stream(chunks.map(Ok::<_, std::convert::Infallible>));

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(body)
        .unwrap())
}

/// The deployed service answers GET on the process endpoint with this exact
/// line; compatibility tests depend on it.
pub async fn method_not_allowed() -> Error {
    Error::MethodNotAllowed
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm> {
    let mut form = UploadForm {
        image: None,
        prompt: None,
    };

    while let Some(field) = multipart.next_field().await.map_err(|e| Error::InvalidInput {
        message: format!("Failed to parse multipart data: {}", e),
    })? {
        match field.name().unwrap_or("") {
            "image" => {
                // A text field named `image` carries no file at all.
                let Some(filename) = field.file_name().map(str::to_string) else {
                    continue;
                };
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(|e| Error::InvalidInput {
                    message: format!("Failed to read image field: {}", e),
                })?;
                form.image = Some(ImageField {
                    filename,
                    content_type,
                    bytes,
                });
            }
            "prompt" => {
                form.prompt = Some(field.text().await.map_err(|e| Error::InvalidInput {
                    message: format!("Failed to read prompt: {}", e),
                })?);
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Extension of `filename` including the leading dot, or empty when there is
/// none. The stored key keeps the original extension so the backend can tell
/// the format from the URI.
fn file_extension(filename: &str) -> String {
    std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}
