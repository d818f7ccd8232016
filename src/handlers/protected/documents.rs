use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use chrono::NaiveDate;

use crate::database::models::{DocumentVersion, Validity};
use crate::documents::{DeleteReport, DocumentSummary};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

use super::resolve_caller;

/// Parsed multipart body of an upload or update
#[derive(Debug)]
struct UploadForm {
    name: String,
    content: Vec<u8>,
    validity: Validity,
}

/// GET /api/documents - One summary per document of the effective owner
pub async fn list(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Vec<DocumentSummary>> {
    let caller = resolve_caller(&state, &auth_user).await?;
    let summaries = state.engine.list(&caller.owner).await?;
    Ok(ApiResponse::success(summaries))
}

/// POST /api/documents - Create-only upload of version 1
///
/// Multipart parts: `document` (file, required), `valid_from` and
/// `valid_until` (YYYY-MM-DD, optional).
pub async fn upload(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    multipart: Multipart,
) -> ApiResult<DocumentVersion> {
    let caller = resolve_caller(&state, &auth_user).await?;
    caller.require_client()?;

    let form = read_upload_form(multipart).await?;
    let version = state
        .engine
        .upload(&form.name, &caller.owner, &form.content, form.validity)
        .await?;

    Ok(ApiResponse::created(version))
}

/// PUT /api/documents - Store a new version of an existing document
///
/// Without validity parts the previous version's window is kept.
pub async fn update(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    multipart: Multipart,
) -> ApiResult<DocumentVersion> {
    let caller = resolve_caller(&state, &auth_user).await?;
    caller.require_client()?;

    let form = read_upload_form(multipart).await?;
    let version = state
        .engine
        .update(&form.name, &caller.owner, &form.content, Some(form.validity))
        .await?;

    Ok(ApiResponse::success(version))
}

/// GET /api/documents/:name/versions - Version history, oldest first
pub async fn versions(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(name): Path<String>,
) -> ApiResult<Vec<DocumentVersion>> {
    let caller = resolve_caller(&state, &auth_user).await?;
    let versions = state.engine.list_by_name(&name, &caller.owner).await?;

    if versions.is_empty() {
        return Err(ApiError::not_found(format!("no document named '{}'", name)));
    }
    Ok(ApiResponse::success(versions))
}

/// POST /api/documents/:name/revert - Make the previous version current again
pub async fn revert(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(name): Path<String>,
) -> ApiResult<DocumentVersion> {
    let caller = resolve_caller(&state, &auth_user).await?;
    caller.require_client()?;

    let restored = state.engine.use_previous_version(&name, &caller.owner).await?;
    Ok(ApiResponse::success(restored))
}

/// DELETE /api/documents/:name - Remove every version and its file
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(name): Path<String>,
) -> ApiResult<DeleteReport> {
    let caller = resolve_caller(&state, &auth_user).await?;
    caller.require_client()?;

    let report = state.engine.delete(&name, &caller.owner).await?;
    Ok(ApiResponse::success(report))
}

/// GET /api/documents/:name/download - Raw bytes of the current version
pub async fn download(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let caller = resolve_caller(&state, &auth_user).await?;
    let document = state.engine.download(&name, &caller.owner).await?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        document.file_name.replace('"', "")
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
            (
                header::HeaderName::from_static("x-document-version"),
                document.version.version.to_string(),
            ),
        ],
        document.content,
    )
        .into_response())
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut document: Option<(String, Vec<u8>)> = None;
    let mut validity = Validity::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or_default().to_string();

        match field_name.as_str() {
            "document" => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| ApiError::bad_request("The document part must carry a file name"))?;
                let bytes = field.bytes().await.map_err(multipart_error)?;
                document = Some((file_name, bytes.to_vec()));
            }
            "valid_from" => {
                let text = field.text().await.map_err(multipart_error)?;
                validity.valid_from = parse_date("valid_from", &text)?;
            }
            "valid_until" => {
                let text = field.text().await.map_err(multipart_error)?;
                validity.valid_until = parse_date("valid_until", &text)?;
            }
            other => {
                tracing::debug!("Ignoring multipart part '{}'", other);
            }
        }
    }

    let (name, content) = document.ok_or_else(|| ApiError::bad_request("Missing multipart part 'document'"))?;

    if let (Some(from), Some(until)) = (validity.valid_from, validity.valid_until) {
        if until < from {
            return Err(ApiError::bad_request("valid_until must not be before valid_from"));
        }
    }

    Ok(UploadForm { name, content, validity })
}

fn parse_date(field: &str, text: &str) -> Result<Option<NaiveDate>, ApiError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| ApiError::bad_request(format!("{} must be a date in YYYY-MM-DD format", field)))
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("Upload exceeds the maximum request size")
    } else {
        ApiError::bad_request(err.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_are_iso_formatted() {
        assert_eq!(
            parse_date("valid_from", "2024-03-01").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
        assert_eq!(parse_date("valid_from", "  ").unwrap(), None);
        assert_eq!(parse_date("valid_until", "01.03.2024").unwrap_err().status_code(), 400);
    }
}
