use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use loadline_core::domain::negotiation::{
    CallId, LoadId, McNumber, Negotiation, NegotiationDecision, NegotiationId, OfferParty,
};
use loadline_core::negotiation::lifecycle::CreateNegotiation;

use super::{ApiError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/negotiations", post(create))
        .route("/negotiations/cleanup-expired", post(cleanup_expired))
        .route("/negotiations/{negotiation_id}", get(get_one))
        .route("/negotiations/{negotiation_id}/counter-offer", post(counter_offer))
        .route("/negotiations/{negotiation_id}/accept", post(accept))
        .route("/negotiations/{negotiation_id}/reject", post(reject))
        .route("/negotiations/{negotiation_id}/evaluate", post(evaluate))
        .route("/calls/{call_id}/negotiations", get(history_for_call))
        .route("/calls/{call_id}/negotiations/active", get(active_for_call))
}

#[derive(Debug, Deserialize)]
pub struct CreateNegotiationRequest {
    pub negotiation_id: String,
    pub call_id: String,
    pub load_id: String,
    pub mc_number: String,
    pub initial_offer: Decimal,
    pub offered_by: OfferParty,
    pub original_rate: Decimal,
    pub max_rounds: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CounterOfferRequest {
    pub amount: Decimal,
    pub offered_by: OfferParty,
    pub carrier_feedback: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AcceptRequest {
    pub final_rate: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub carrier_offer: Decimal,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub expired: usize,
}

fn require_amount(name: &str, amount: Decimal) -> Result<(), ApiError> {
    if amount.is_sign_negative() {
        return Err(ApiError::BadRequest(format!("{name} must not be negative")));
    }
    Ok(())
}

async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateNegotiationRequest>,
) -> Result<(StatusCode, Json<Negotiation>), ApiError> {
    if request.negotiation_id.trim().is_empty() {
        return Err(ApiError::BadRequest("negotiation_id must not be blank".to_string()));
    }
    require_amount("initial_offer", request.initial_offer)?;
    require_amount("original_rate", request.original_rate)?;
    if request.max_rounds == Some(0) {
        return Err(ApiError::BadRequest("max_rounds must be at least 1".to_string()));
    }

    let negotiation = state
        .lifecycle
        .create(CreateNegotiation {
            id: NegotiationId(request.negotiation_id),
            call_id: CallId(request.call_id),
            load_id: LoadId(request.load_id),
            mc_number: McNumber(request.mc_number),
            initial_offer: request.initial_offer,
            offered_by: request.offered_by,
            original_rate: request.original_rate,
            max_rounds: request.max_rounds,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(negotiation)))
}

async fn get_one(
    State(state): State<AppState>,
    Path(negotiation_id): Path<String>,
) -> Result<Json<Negotiation>, ApiError> {
    let negotiation = state.lifecycle.get(&NegotiationId(negotiation_id)).await?;
    Ok(Json(negotiation))
}

async fn counter_offer(
    State(state): State<AppState>,
    Path(negotiation_id): Path<String>,
    Json(request): Json<CounterOfferRequest>,
) -> Result<Json<Negotiation>, ApiError> {
    require_amount("amount", request.amount)?;

    let negotiation = state
        .lifecycle
        .counter_offer(
            &NegotiationId(negotiation_id),
            request.amount,
            request.offered_by,
            request.carrier_feedback,
        )
        .await?;
    Ok(Json(negotiation))
}

async fn accept(
    State(state): State<AppState>,
    Path(negotiation_id): Path<String>,
    Json(request): Json<AcceptRequest>,
) -> Result<Json<Negotiation>, ApiError> {
    require_amount("final_rate", request.final_rate)?;

    let negotiation =
        state.lifecycle.accept(&NegotiationId(negotiation_id), request.final_rate).await?;
    Ok(Json(negotiation))
}

async fn reject(
    State(state): State<AppState>,
    Path(negotiation_id): Path<String>,
    Json(request): Json<RejectRequest>,
) -> Result<Json<Negotiation>, ApiError> {
    let negotiation =
        state.lifecycle.reject(&NegotiationId(negotiation_id), request.reason).await?;
    Ok(Json(negotiation))
}

async fn evaluate(
    State(state): State<AppState>,
    Path(negotiation_id): Path<String>,
    Json(request): Json<EvaluateRequest>,
) -> Result<Json<NegotiationDecision>, ApiError> {
    require_amount("carrier_offer", request.carrier_offer)?;

    let decision = state
        .lifecycle
        .evaluate_offer(&NegotiationId(negotiation_id), request.carrier_offer)
        .await?;
    Ok(Json(decision))
}

async fn cleanup_expired(
    State(state): State<AppState>,
) -> Result<Json<CleanupResponse>, ApiError> {
    let expired = state.lifecycle.cleanup_expired().await?;
    Ok(Json(CleanupResponse { expired }))
}

async fn history_for_call(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> Result<Json<Vec<Negotiation>>, ApiError> {
    let history = state.lifecycle.history_for_call(&CallId(call_id)).await?;
    Ok(Json(history))
}

async fn active_for_call(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> Result<Json<Negotiation>, ApiError> {
    let call_id = CallId(call_id);
    let negotiation = state
        .lifecycle
        .active_for_call(&call_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no active negotiation for call `{}`", call_id.0)))?;
    Ok(Json(negotiation))
}
