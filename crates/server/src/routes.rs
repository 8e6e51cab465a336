//! JSON routes for the quotation core.
//!
//! - `POST   /quotations`                         : draft a quotation
//! - `GET    /quotations`                         : list, newest first
//! - `POST   /quotations/calculate`               : price a specification without saving
//! - `GET    /quotations/{id}`                    : fetch with items
//! - `PATCH  /quotations/{id}`                    : edit a draft
//! - `DELETE /quotations/{id}`                    : remove (not once converted)
//! - `POST   /quotations/{id}/send`               : draft → sent
//! - `POST   /quotations/{id}/approve`            : sent → approved
//! - `POST   /quotations/{id}/reject`             : sent → rejected
//! - `POST   /quotations/{id}/revise`             : new draft version
//! - `POST   /quotations/{id}/convert-to-order`   : approved → converted
//! - `GET    /quotations/{id}/history`            : status changes in order

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{error, warn};

use presswork_core::cpq::{PricingBreakdown, PricingInput};
use presswork_core::domain::customer::CustomerId;
use presswork_core::domain::order::OrderOverrides;
use presswork_core::domain::quotation::{
    NewQuotation, Quotation, QuotationFilter, QuotationHistoryEntry, QuotationId, QuotationStatus,
    QuotationUpdate, DEFAULT_LIST_LIMIT,
};
use presswork_core::errors::{ApplicationError, InterfaceError};

use crate::service::{ConversionOutcome, QuotationService, RequestContext};

#[derive(Clone)]
pub struct AppState {
    service: Arc<QuotationService>,
    api_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(service: QuotationService, api_token: Option<&str>) -> Self {
        Self { service: Arc::new(service), api_token: api_token.map(Arc::from) }
    }

    pub fn api_token(&self) -> Option<&str> {
        self.api_token.as_deref()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/quotations", post(create_quotation).get(list_quotations))
        .route("/quotations/calculate", post(calculate))
        .route(
            "/quotations/{id}",
            get(get_quotation).patch(update_quotation).delete(remove_quotation),
        )
        .route("/quotations/{id}/send", post(send_quotation))
        .route("/quotations/{id}/approve", post(approve_quotation))
        .route("/quotations/{id}/reject", post(reject_quotation))
        .route("/quotations/{id}/revise", post(revise_quotation))
        .route("/quotations/{id}/convert-to-order", post(convert_quotation))
        .route("/quotations/{id}/history", get(quotation_history))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ApiError(InterfaceError);

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    pub correlation_id: String,
}

impl From<InterfaceError> for ApiError {
    fn from(value: InterfaceError) -> Self {
        Self(value)
    }
}

impl ApiError {
    fn application(error: ApplicationError, ctx: &RequestContext) -> Self {
        Self(error.into_interface(ctx.correlation_id.clone()))
    }

    fn bad_request(message: impl Into<String>, ctx: &RequestContext) -> Self {
        Self(InterfaceError::BadRequest {
            message: message.into(),
            correlation_id: ctx.correlation_id.clone(),
        })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error = self.0;
        let status =
            StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!(
                event_name = "api.request.failed",
                correlation_id = %error.correlation_id(),
                status = status.as_u16(),
                error = %error,
                "request failed"
            );
        } else {
            warn!(
                event_name = "api.request.refused",
                correlation_id = %error.correlation_id(),
                status = status.as_u16(),
                error = %error,
                "request refused"
            );
        }

        let body = ErrorBody {
            error: error.user_message().to_string(),
            message: error.message().to_string(),
            correlation_id: error.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Empty bodies fall back to `T::default()`.
fn optional_body<T>(body: &Bytes, ctx: &RequestContext) -> ApiResult<T>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    required_body(body, ctx)
}

fn required_body<T: DeserializeOwned>(body: &Bytes, ctx: &RequestContext) -> ApiResult<T> {
    serde_json::from_slice(body)
        .map_err(|error| ApiError::bad_request(format!("invalid request body: {error}"), ctx))
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub customer_id: Option<String>,
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ListQuery {
    fn into_filter(self, ctx: &RequestContext) -> ApiResult<QuotationFilter> {
        let status = match self.status.as_deref().map(str::trim).filter(|raw| !raw.is_empty()) {
            Some(raw) => Some(
                QuotationStatus::parse(raw)
                    .ok_or_else(|| ApiError::bad_request(format!("unknown status `{raw}`"), ctx))?,
            ),
            None => None,
        };

        Ok(QuotationFilter {
            status,
            customer_id: self.customer_id.filter(|id| !id.trim().is_empty()).map(CustomerId),
            search: self.search,
            limit: self.limit.unwrap_or(DEFAULT_LIST_LIMIT),
            offset: self.offset.unwrap_or(0),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn create_quotation(
    State(state): State<AppState>,
    ctx: RequestContext,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Quotation>)> {
    let input: NewQuotation = required_body(&body, &ctx)?;
    let quotation = state
        .service
        .create(input, &ctx)
        .await
        .map_err(|error| ApiError::application(error, &ctx))?;
    Ok((StatusCode::CREATED, Json(quotation)))
}

async fn list_quotations(
    State(state): State<AppState>,
    ctx: RequestContext,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Quotation>>> {
    let Query(query) =
        query.map_err(|rejection| ApiError::bad_request(rejection.body_text(), &ctx))?;
    let filter = query.into_filter(&ctx)?;
    let quotations =
        state.service.list(&filter).await.map_err(|error| ApiError::application(error, &ctx))?;
    Ok(Json(quotations))
}

async fn calculate(
    State(state): State<AppState>,
    ctx: RequestContext,
    body: Bytes,
) -> ApiResult<Json<PricingBreakdown>> {
    let input: PricingInput = required_body(&body, &ctx)?;
    let breakdown =
        state.service.calculate(&input).map_err(|error| ApiError::application(error, &ctx))?;
    Ok(Json(breakdown))
}

async fn get_quotation(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> ApiResult<Json<Quotation>> {
    let quotation = state
        .service
        .get(&QuotationId(id))
        .await
        .map_err(|error| ApiError::application(error, &ctx))?;
    Ok(Json(quotation))
}

async fn update_quotation(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Quotation>> {
    let update: QuotationUpdate = required_body(&body, &ctx)?;
    let quotation = state
        .service
        .update(&QuotationId(id), update, &ctx)
        .await
        .map_err(|error| ApiError::application(error, &ctx))?;
    Ok(Json(quotation))
}

async fn remove_quotation(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .service
        .remove(&QuotationId(id), &ctx)
        .await
        .map_err(|error| ApiError::application(error, &ctx))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn send_quotation(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> ApiResult<Json<Quotation>> {
    let quotation = state
        .service
        .send(&QuotationId(id), &ctx)
        .await
        .map_err(|error| ApiError::application(error, &ctx))?;
    Ok(Json(quotation))
}

async fn approve_quotation(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> ApiResult<Json<Quotation>> {
    let quotation = state
        .service
        .approve(&QuotationId(id), &ctx)
        .await
        .map_err(|error| ApiError::application(error, &ctx))?;
    Ok(Json(quotation))
}

async fn reject_quotation(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Quotation>> {
    let request: RejectRequest = optional_body(&body, &ctx)?;
    let quotation = state
        .service
        .reject(&QuotationId(id), request.reason, &ctx)
        .await
        .map_err(|error| ApiError::application(error, &ctx))?;
    Ok(Json(quotation))
}

async fn revise_quotation(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<Quotation>)> {
    let revision = state
        .service
        .create_revision(&QuotationId(id), &ctx)
        .await
        .map_err(|error| ApiError::application(error, &ctx))?;
    Ok((StatusCode::CREATED, Json(revision)))
}

async fn convert_quotation(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<ConversionOutcome>)> {
    let overrides: OrderOverrides = optional_body(&body, &ctx)?;
    let outcome = state
        .service
        .convert_to_order(&QuotationId(id), overrides, &ctx)
        .await
        .map_err(|error| ApiError::application(error, &ctx))?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn quotation_history(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<QuotationHistoryEntry>>> {
    let history = state
        .service
        .history(&QuotationId(id))
        .await
        .map_err(|error| ApiError::application(error, &ctx))?;
    Ok(Json(history))
}
