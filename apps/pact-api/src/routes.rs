use axum::{
	Json, Router,
	extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartError},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use crate::state::AppState;
use pact_service::{
	Error as ServiceError, SearchRequest, SearchResponse, UploadReport, UploadedFile,
};

const UPLOAD_FIELD: &str = "file";

pub fn router(state: AppState) -> Router {
	let max_upload_bytes = state.service.cfg.service.max_upload_bytes;

	Router::new()
		.route("/health", get(health))
		.route(
			"/v1/contracts/upload",
			post(upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
		)
		.route("/v1/contracts/search", post(search))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

/// Every multipart part named `file` is one document.
async fn upload(
	State(state): State<AppState>,
	mut multipart: Multipart,
) -> Result<Json<UploadReport>, ApiError> {
	let mut files = Vec::new();

	while let Some(field) = multipart.next_field().await? {
		if field.name() != Some(UPLOAD_FIELD) {
			continue;
		}

		let file_name = field.file_name().unwrap_or_default().to_string();
		let bytes = field.bytes().await?;

		files.push(UploadedFile { file_name, bytes: bytes.to_vec() });
	}

	tracing::info!(files = files.len(), "Received upload.");

	let report = state.service.ingest_batch(&files).await?;

	Ok(Json(UploadReport::from(&report)))
}

async fn search(
	State(state): State<AppState>,
	Json(payload): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
	let response = state.service.search(payload).await?;

	Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}
impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), fields }
	}
}
impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		let message = err.to_string();

		match err {
			ServiceError::InvalidRequest { .. } =>
				Self::new(StatusCode::BAD_REQUEST, "invalid_request", message, None),
			ServiceError::AllDocumentsFailed { failed } => Self::new(
				StatusCode::UNPROCESSABLE_ENTITY,
				"all_documents_failed",
				message,
				Some(failed),
			),
			ServiceError::ExtractionFailed { .. }
			| ServiceError::ExtractionMalformed { .. }
			| ServiceError::EmptyDocument { .. } =>
				Self::new(StatusCode::UNPROCESSABLE_ENTITY, "extraction_failed", message, None),
			ServiceError::NotFound { .. } =>
				Self::new(StatusCode::NOT_FOUND, "not_found", message, None),
			ServiceError::Conflict { .. } =>
				Self::new(StatusCode::CONFLICT, "conflict", message, None),
			ServiceError::Provider { .. } =>
				Self::new(StatusCode::BAD_GATEWAY, "provider_error", message, None),
			ServiceError::Storage { .. }
			| ServiceError::Qdrant { .. }
			| ServiceError::Keyword { .. } => {
				tracing::error!(error = %message, "Store request failed.");

				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", message, None)
			},
		}
	}
}
impl From<MultipartError> for ApiError {
	fn from(err: MultipartError) -> Self {
		Self::new(err.status(), "invalid_upload", err.body_text(), None)
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, message: self.message, fields: self.fields };

		(self.status, Json(body)).into_response()
	}
}
