//! HTTP handlers for the catalog.

use std::sync::Arc;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
        FromRequest, Multipart, Path, Request, State,
    },
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bookserver_http::error::{AppError, ErrorBody};
use serde_json::{Map, Number, Value};
use thiserror::Error;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use super::{
    models::{Book, BookCreated, BookSubmission, CreateBookForm, ImageUpload, IMAGE_FIELD},
    service::{CatalogError, CatalogService},
};

pub const READY_MESSAGE: &str = "The library is ready for readers";

type Catalog = State<Arc<CatalogService>>;

/// Problems reading the create request body.
#[derive(Debug, Error)]
enum FormError {
    #[error("Unsupported content type; send multipart/form-data or application/json")]
    UnsupportedContentType,

    #[error("Only one image may be uploaded")]
    ExtraImage,

    #[error("Field '{0}' must be text or a number")]
    InvalidJsonValue(String),

    #[error(transparent)]
    MultipartBody(#[from] MultipartRejection),

    #[error(transparent)]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Json(#[from] JsonRejection),
}

impl From<FormError> for AppError {
    fn from(err: FormError) -> Self {
        let status = match &err {
            FormError::MultipartBody(inner) => inner.status(),
            FormError::Multipart(inner) => inner.status(),
            FormError::Json(inner) => inner.status(),
            _ => StatusCode::BAD_REQUEST,
        };
        let message = match err {
            FormError::MultipartBody(inner) => inner.body_text(),
            FormError::Multipart(inner) => inner.body_text(),
            FormError::Json(inner) => inner.body_text(),
            other => other.to_string(),
        };

        if status == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::payload_too_large(message)
        } else {
            AppError::bad_request(message)
        }
    }
}

/// Readiness message
#[utoipa::path(
    get,
    path = "/",
    tag = "books",
    responses((status = 200, description = "Catalog is serving", body = String, content_type = "text/plain"))
)]
pub async fn ready() -> &'static str {
    READY_MESSAGE
}

/// List every book in insertion order
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    responses(
        (status = 200, description = "All books", body = Vec<Book>),
        (status = 500, description = "Storage backend failure", body = ErrorBody),
    )
)]
pub async fn list_books(State(catalog): Catalog) -> Result<Json<Vec<Book>>, AppError> {
    match catalog.list().await {
        Ok(books) => Ok(Json(books)),
        Err(err) => {
            tracing::error!(error = %err, "error fetching books");
            Err(AppError::backend("Failed to fetch books"))
        }
    }
}

/// Add a book, optionally with a cover image
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    request_body(
        content = CreateBookForm,
        content_type = "multipart/form-data",
        description = "Book fields and an optional `image` file; a JSON object with the same text fields is accepted too"
    ),
    responses(
        (status = 201, description = "Book added", body = BookCreated),
        (status = 400, description = "Missing or invalid fields", body = ErrorBody),
        (status = 413, description = "Request body too large", body = ErrorBody),
        (status = 500, description = "Storage backend failure", body = ErrorBody),
    )
)]
pub async fn create_book(
    State(catalog): Catalog,
    request: Request,
) -> Result<(StatusCode, Json<BookCreated>), AppError> {
    let (submission, image) = read_submission(request).await?;

    tracing::debug!(
        ?submission,
        image = image.as_ref().map(|i| i.file_name.as_str()),
        image_bytes = image.as_ref().map(|i| i.data.len()),
        "create book request"
    );

    match catalog.create(submission, image).await {
        Ok(book_id) => Ok((
            StatusCode::CREATED,
            Json(BookCreated {
                message: "Book added successfully".to_string(),
                book_id,
            }),
        )),
        Err(CatalogError::MissingFields(_)) => {
            Err(AppError::bad_request("Missing required fields"))
        }
        Err(CatalogError::InvalidNumbers(fields)) => {
            Err(AppError::invalid_fields("Invalid numeric fields", fields))
        }
        Err(err) => {
            tracing::error!(error = %err, "error adding book");
            Err(AppError::backend_with_detail("Failed to add book", err))
        }
    }
}

/// Raw bytes of an uploaded image
#[utoipa::path(
    get,
    path = "/uploads/{filename}",
    tag = "books",
    params(("filename" = String, Path, description = "Name returned in a book's imageUrl")),
    responses(
        (status = 200, description = "Stored file", content_type = "application/octet-stream"),
        (status = 404, description = "No such upload", body = ErrorBody),
    )
)]
pub async fn serve_upload(
    State(catalog): Catalog,
    Path(filename): Path<String>,
    request: Request,
) -> Result<Response, AppError> {
    let path = catalog
        .uploads()
        .resolve(&filename)
        .ok_or_else(|| AppError::not_found("Upload not found"))?;

    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Err(AppError::not_found("Upload not found")),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::not_found("Upload not found"))
        }
        Err(err) => {
            return Err(anyhow::Error::new(err)
                .context(format!("failed to inspect upload {filename}"))
                .into())
        }
    }

    Ok(ServeFile::new(&path).oneshot(request).await.into_response())
}

/// Pull the six text fields and the optional image out of either body encoding.
async fn read_submission(
    request: Request,
) -> Result<(BookSubmission, Option<ImageUpload>), FormError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &()).await?;
        read_multipart(multipart).await
    } else if content_type.starts_with("application/json") {
        let Json(object) = Json::<Map<String, Value>>::from_request(request, &()).await?;
        Ok((submission_from_json(object)?, None))
    } else {
        Err(FormError::UnsupportedContentType)
    }
}

async fn read_multipart(
    mut multipart: Multipart,
) -> Result<(BookSubmission, Option<ImageUpload>), FormError> {
    let mut submission = BookSubmission::default();
    let mut image: Option<ImageUpload> = None;

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        if name == IMAGE_FIELD {
            // A part without a filename is a plain text field, not a file.
            let Some(file_name) = field.file_name().map(str::to_owned) else {
                continue;
            };
            let data = field.bytes().await?;
            // Browsers send an empty, unnamed part for an untouched file input.
            if file_name.is_empty() && data.is_empty() {
                continue;
            }
            if image.is_some() {
                return Err(FormError::ExtraImage);
            }
            image = Some(ImageUpload { file_name, data });
        } else if let Some(slot) = submission.field_mut(&name) {
            *slot = Some(field.text().await?);
        }
    }

    Ok((submission, image))
}

fn submission_from_json(object: Map<String, Value>) -> Result<BookSubmission, FormError> {
    let mut submission = BookSubmission::default();

    for (key, value) in object {
        let Some(slot) = submission.field_mut(&key) else {
            continue;
        };
        *slot = match value {
            Value::Null => None,
            Value::String(text) => Some(text),
            Value::Number(number) => Some(number_text(&number)),
            _ => return Err(FormError::InvalidJsonValue(key)),
        };
    }

    Ok(submission)
}

/// Text form of a JSON number. Whole floats such as `5.0` lose their
/// fraction so they still parse as a quantity.
fn number_text(number: &Number) -> String {
    match number.as_f64() {
        Some(value) if number.is_f64() && value.fract() == 0.0 && value.abs() < 1e15 => {
            format!("{value:.0}")
        }
        _ => number.to_string(),
    }
}
