//! HTTP Handlers

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vantiv_core::{BillingProfile, Payment, PaymentError, PaymentId, PaymentMethod, PaymentMethodId};
use vantiv_eprotect::fields::{
    HiddenField, card_input_markup, hidden_request_fields, hidden_response_fields,
};
use vantiv_eprotect::{EprotectSettings, FormVariant};
use vantiv_gateway::{PaymentOperation, TokenizedCard, available_operations};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub mode: &'static str,
    pub transport: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct SettingsQuery {
    pub variant: String,
    #[serde(default)]
    pub order_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub settings: EprotectSettings,
    pub host: &'static str,
    pub library_url: String,
    pub request_fields: Vec<HiddenField>,
    pub response_fields: Vec<HiddenField>,
    /// Raw card inputs, rendered without `name` attributes
    pub card_inputs: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentMethodRequest {
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub billing_profile: BillingProfile,
    /// Posted hidden fields of the tokenization form
    pub fields: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub payment_method_id: String,
    pub order_id: String,
    pub amount: Decimal,
    pub currency: String,
    #[serde(default = "default_capture")]
    pub capture: bool,
}

const fn default_capture() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub struct AmountRequest {
    #[serde(default)]
    pub amount: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct CaptureResponse {
    pub payment: Payment,
    /// Payment split off by a partial capture
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured: Option<Payment>,
}

#[derive(Debug, Serialize)]
pub struct OperationsResponse {
    pub payment_id: PaymentId,
    pub operations: Vec<PaymentOperation>,
}

// ============================================================================
// Error mapping
// ============================================================================

fn api_error(err: &PaymentError) -> ApiError {
    let (status, code, detail) = match err {
        PaymentError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "INVALID_ARGUMENT", true),
        PaymentError::InvalidState(_) => (StatusCode::CONFLICT, "INVALID_STATE", true),
        PaymentError::ExpiredMethod(_) => (StatusCode::PAYMENT_REQUIRED, "EXPIRED_METHOD", false),
        PaymentError::SoftDecline { .. } => (StatusCode::PAYMENT_REQUIRED, "DECLINED", false),
        PaymentError::InvalidRequest(_) => (StatusCode::BAD_GATEWAY, "INVALID_REQUEST", false),
        PaymentError::Codec(_) => (StatusCode::BAD_GATEWAY, "CODEC_ERROR", false),
        PaymentError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR", false),
        PaymentError::Storage(_) | PaymentError::Json(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", false)
        }
    };
    if status.is_server_error() {
        tracing::error!(error = %err, code, "Request failed");
    }
    let error = if detail {
        err.to_string()
    } else {
        err.user_message().to_string()
    };
    (
        status,
        Json(ErrorResponse {
            error,
            code: code.into(),
        }),
    )
}

fn not_found(what: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("{what} {id} not found"),
            code: "NOT_FOUND".into(),
        }),
    )
}

fn load_payment(state: &AppState, id: &str) -> ApiResult<Payment> {
    state
        .gateway
        .payments()
        .get(&PaymentId::from_string(id))
        .map_err(|e| api_error(&e))?
        .ok_or_else(|| not_found("payment", id))
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        mode: state.gateway.config().mode.as_str(),
        transport: state.transport.to_string(),
    })
}

/// Settings and hidden fields for rendering a tokenization form
pub async fn eprotect_settings(
    State(state): State<AppState>,
    Query(query): Query<SettingsQuery>,
) -> ApiResult<Json<SettingsResponse>> {
    let variant = FormVariant::from_name(&query.variant).ok_or_else(|| {
        api_error(&PaymentError::InvalidArgument(format!(
            "unknown form variant {}",
            query.variant
        )))
    })?;

    let config = state.gateway.config();
    let settings = EprotectSettings::new(config.mode.as_str(), variant);
    let environment = settings.environment();

    Ok(Json(SettingsResponse {
        host: environment.host(),
        library_url: environment.library_url(),
        request_fields: hidden_request_fields(
            &config.paypage_id,
            config.default_merchant_id(),
            query.order_id.as_deref(),
            &config.report_group,
        ),
        response_fields: hidden_response_fields(),
        card_inputs: card_input_markup(variant),
        settings,
    }))
}

/// Create a stored payment method from a tokenization result
pub async fn create_payment_method(
    State(state): State<AppState>,
    Json(payload): Json<CreatePaymentMethodRequest>,
) -> ApiResult<(StatusCode, Json<PaymentMethod>)> {
    let card = TokenizedCard::from_fields(&payload.fields).map_err(|e| api_error(&e))?;
    let method = state
        .gateway
        .create_payment_method(payload.owner_id, payload.billing_profile, card)
        .await
        .map_err(|e| api_error(&e))?;
    Ok((StatusCode::CREATED, Json(method)))
}

pub async fn delete_payment_method(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .gateway
        .delete_payment_method(&PaymentMethodId::from_string(id))
        .map_err(|e| api_error(&e))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Authorize or sell a new payment
pub async fn create_payment(
    State(state): State<AppState>,
    Json(payload): Json<CreatePaymentRequest>,
) -> ApiResult<(StatusCode, Json<Payment>)> {
    let mut payment = Payment::new(
        payload.order_id,
        PaymentMethodId::from_string(payload.payment_method_id),
        payload.amount,
        payload.currency,
    );
    state
        .gateway
        .create_payment(&mut payment, payload.capture)
        .await
        .map_err(|e| api_error(&e))?;
    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn capture_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<AmountRequest>>,
) -> ApiResult<Json<CaptureResponse>> {
    let _guard = state.lock_payment(&PaymentId::from_string(&id)).await;
    let mut payment = load_payment(&state, &id)?;
    let amount = body.and_then(|Json(b)| b.amount);
    let captured = state
        .gateway
        .capture_payment(&mut payment, amount)
        .await
        .map_err(|e| api_error(&e))?;
    Ok(Json(CaptureResponse { payment, captured }))
}

pub async fn void_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Payment>> {
    let _guard = state.lock_payment(&PaymentId::from_string(&id)).await;
    let mut payment = load_payment(&state, &id)?;
    state
        .gateway
        .void_payment(&mut payment)
        .await
        .map_err(|e| api_error(&e))?;
    Ok(Json(payment))
}

pub async fn refund_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<AmountRequest>>,
) -> ApiResult<Json<Payment>> {
    let _guard = state.lock_payment(&PaymentId::from_string(&id)).await;
    let mut payment = load_payment(&state, &id)?;
    let amount = body.and_then(|Json(b)| b.amount);
    state
        .gateway
        .refund_payment(&mut payment, amount)
        .await
        .map_err(|e| api_error(&e))?;
    Ok(Json(payment))
}

/// Follow-up operations currently offered for a payment
pub async fn payment_operations(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<OperationsResponse>> {
    let payment = load_payment(&state, &id)?;
    Ok(Json(OperationsResponse {
        operations: available_operations(&payment, Utc::now()),
        payment_id: payment.id,
    }))
}
