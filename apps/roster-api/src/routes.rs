use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use roster_service::{
	CheckRequest, CheckResponse, DenormalisedDuplicateRecord, Error as ServiceError,
	IgnoreRequest, ListDuplicatesRequest, ListDuplicatesResponse, MergeRequest, MergeResponse,
	ScanRequest, ScanSummary,
};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/duplicates", get(list_duplicates))
		.route("/v1/duplicates/count", get(count_duplicates))
		.route("/v1/duplicates/check", post(check))
		.route("/v1/duplicates/merge", post(merge))
		.route("/v1/duplicates/ignore", post(ignore))
		.with_state(state)
}

pub fn admin_router(state: AppState) -> Router {
	Router::new().route("/v1/admin/scan", post(scan)).with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

#[derive(Debug, Deserialize)]
struct ListQuery {
	limit: Option<i64>,
	offset: Option<i64>,
	#[serde(default)]
	include_records: bool,
}

#[derive(Serialize)]
#[serde(untagged)]
enum ListBody {
	Plain(ListDuplicatesResponse),
	Denormalised { items: Vec<DenormalisedDuplicateRecord>, total: u64 },
}

async fn list_duplicates(
	State(state): State<AppState>,
	Query(query): Query<ListQuery>,
) -> Result<Json<ListBody>, ApiError> {
	let request = ListDuplicatesRequest { limit: query.limit, offset: query.offset };
	let response = state.service.list_duplicates(request).await?;

	if !query.include_records {
		return Ok(Json(ListBody::Plain(response)));
	}

	let items = state.service.denormalise(&response.items).await?;

	Ok(Json(ListBody::Denormalised { items, total: response.total }))
}

#[derive(Serialize)]
struct CountBody {
	count: u64,
}

async fn count_duplicates(State(state): State<AppState>) -> Result<Json<CountBody>, ApiError> {
	let count = state.service.count_duplicates().await?;

	Ok(Json(CountBody { count }))
}

async fn check(
	State(state): State<AppState>,
	Json(payload): Json<CheckRequest>,
) -> Result<Json<CheckResponse>, ApiError> {
	let response = state.service.check(payload).await?;

	Ok(Json(response))
}

async fn merge(
	State(state): State<AppState>,
	Json(payload): Json<MergeRequest>,
) -> Result<Json<MergeResponse>, ApiError> {
	let response = state.service.merge(payload).await?;

	Ok(Json(response))
}

async fn ignore(
	State(state): State<AppState>,
	Json(payload): Json<IgnoreRequest>,
) -> Result<StatusCode, ApiError> {
	state.service.ignore(payload).await?;

	Ok(StatusCode::NO_CONTENT)
}

async fn scan(
	State(state): State<AppState>,
	payload: Option<Json<ScanRequest>>,
) -> Result<Json<ScanSummary>, ApiError> {
	let request = payload.map(|Json(request)| request).unwrap_or_default();
	let summary = state.service.scan(request).await?;

	Ok(Json(summary))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		let (status, error_code) = match &err {
			ServiceError::InvalidRequest { .. } => (StatusCode::BAD_REQUEST, "invalid_request"),
			ServiceError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
			ServiceError::Capability { .. } => (StatusCode::BAD_GATEWAY, "capability_error"),
			ServiceError::Storage { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
		};

		Self { status, error_code: error_code.to_string(), message: err.to_string() }
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}
