use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use loadline_core::classify::{classify_outcome, classify_sentiment};
use loadline_core::domain::call::{CallOutcome, CallRecord, CallSentiment, CallSummary};
use loadline_core::domain::negotiation::{CallId, LoadId, McNumber};

use super::{ApiError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/calls", post(create))
        .route("/calls/recent", get(list_recent))
        .route("/calls/summary", get(summary))
        .route("/calls/{call_id}", get(get_one).put(update))
        .route("/calls/{call_id}/end", post(end_call))
        .route("/carriers/{mc_number}/calls", get(list_for_carrier))
        .route("/webhooks/call-events", post(webhook))
}

#[derive(Debug, Deserialize)]
pub struct CreateCallRequest {
    pub call_id: String,
    pub mc_number: String,
    pub start_time: DateTime<Utc>,
    pub platform_call_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCallRequest {
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub transcript: Option<String>,
    pub discussed_load_id: Option<String>,
    pub initial_rate_offered: Option<Decimal>,
    pub final_negotiated_rate: Option<Decimal>,
    pub outcome: Option<String>,
    pub sentiment: Option<String>,
    pub extracted: Option<Value>,
}

/// Normalized inputs for finalizing a call. The caller supplies the facts;
/// the classifier decides outcome and sentiment.
#[derive(Debug, Deserialize)]
pub struct EndCallRequest {
    pub negotiation_successful: bool,
    pub carrier_verified: bool,
    pub loads_available: bool,
    pub transcript: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CarrierCallsQuery {
    pub offset: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub days: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub accepted: bool,
    pub call_id: Option<String>,
}

async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateCallRequest>,
) -> Result<(StatusCode, Json<CallRecord>), ApiError> {
    if request.call_id.trim().is_empty() {
        return Err(ApiError::BadRequest("call_id must not be blank".to_string()));
    }

    let now = Utc::now();
    let call = CallRecord {
        call_id: CallId(request.call_id),
        mc_number: McNumber(request.mc_number),
        start_time: request.start_time,
        end_time: None,
        duration_seconds: None,
        platform_call_id: request.platform_call_id,
        transcript: None,
        discussed_load_id: None,
        initial_rate_offered: None,
        final_negotiated_rate: None,
        outcome: None,
        sentiment: None,
        extracted: None,
        created_at: now,
        updated_at: now,
    };

    state.calls.insert(call.clone()).await?;
    Ok((StatusCode::CREATED, Json(call)))
}

async fn get_one(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> Result<Json<CallRecord>, ApiError> {
    let call = state
        .calls
        .find_by_id(&CallId(call_id.clone()))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("call `{call_id}` was not found")))?;
    Ok(Json(call))
}

async fn update(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
    Json(request): Json<UpdateCallRequest>,
) -> Result<Json<CallRecord>, ApiError> {
    let mut call = state
        .calls
        .find_by_id(&CallId(call_id.clone()))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("call `{call_id}` was not found")))?;

    apply_update(&mut call, request)?;
    call.updated_at = Utc::now();

    state.calls.update(call.clone()).await?;
    Ok(Json(call))
}

fn apply_update(call: &mut CallRecord, request: UpdateCallRequest) -> Result<(), ApiError> {
    if let Some(end_time) = request.end_time {
        call.end_time = Some(end_time);
    }
    if let Some(duration_seconds) = request.duration_seconds {
        call.duration_seconds = Some(duration_seconds);
    }
    if let Some(transcript) = request.transcript {
        call.transcript = Some(transcript);
    }
    if let Some(discussed_load_id) = request.discussed_load_id {
        call.discussed_load_id = Some(LoadId(discussed_load_id));
    }
    if let Some(initial_rate_offered) = request.initial_rate_offered {
        call.initial_rate_offered = Some(initial_rate_offered);
    }
    if let Some(final_negotiated_rate) = request.final_negotiated_rate {
        call.final_negotiated_rate = Some(final_negotiated_rate);
    }
    if let Some(outcome) = request.outcome {
        call.outcome = Some(
            CallOutcome::parse(&outcome)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown outcome `{outcome}`")))?,
        );
    }
    if let Some(sentiment) = request.sentiment {
        call.sentiment = Some(
            CallSentiment::parse(&sentiment)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown sentiment `{sentiment}`")))?,
        );
    }
    if let Some(extracted) = request.extracted {
        call.extracted = Some(extracted);
    }
    Ok(())
}

async fn end_call(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
    Json(request): Json<EndCallRequest>,
) -> Result<Json<CallRecord>, ApiError> {
    let mut call = state
        .calls
        .find_by_id(&CallId(call_id.clone()))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("call `{call_id}` was not found")))?;

    if let Some(transcript) = request.transcript {
        call.transcript = Some(transcript);
    }

    let transcript = call.transcript.clone().unwrap_or_default();
    let outcome = classify_outcome(
        &transcript,
        request.negotiation_successful,
        request.carrier_verified,
        request.loads_available,
    );
    let sentiment = classify_sentiment(&transcript);

    call.finalize(Utc::now(), outcome, sentiment);
    state.calls.update(call.clone()).await?;

    info!(
        event_name = "call.finalized",
        call_id = %call.call_id.0,
        outcome = outcome.as_str(),
        sentiment = sentiment.as_str(),
        "call classified and closed"
    );
    Ok(Json(call))
}

async fn list_recent(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<CallRecord>>, ApiError> {
    let calls = state.calls.list_recent(query.limit.unwrap_or(50).min(500)).await?;
    Ok(Json(calls))
}

async fn list_for_carrier(
    State(state): State<AppState>,
    Path(mc_number): Path<String>,
    Query(query): Query<CarrierCallsQuery>,
) -> Result<Json<Vec<CallRecord>>, ApiError> {
    let calls = state
        .calls
        .list_for_carrier(
            &McNumber(mc_number),
            query.offset.unwrap_or(0),
            query.limit.unwrap_or(100).min(500),
        )
        .await?;
    Ok(Json(calls))
}

async fn summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<CallSummary>, ApiError> {
    let days = query.days.unwrap_or(30).clamp(1, 365);
    let since = Utc::now() - Duration::days(i64::from(days));
    let summary = state.calls.summary(since).await?;
    Ok(Json(summary))
}

/// Webhook ingestion for the external call platform. Payloads are loosely
/// structured; everything here is best effort with conservative fallbacks,
/// and a malformed payload is reported as not accepted rather than an error.
async fn webhook(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Json<WebhookResponse> {
    let event = normalize_call_event(&payload, Utc::now());

    let result = upsert_event(&state, &event).await;
    match result {
        Ok(()) => {
            info!(
                event_name = "webhook.call_event_stored",
                call_id = %event.call_id,
                outcome = event.outcome.map(CallOutcome::as_str).unwrap_or("unset"),
                "call event ingested"
            );
            Json(WebhookResponse { accepted: true, call_id: Some(event.call_id) })
        }
        Err(error) => {
            warn!(
                event_name = "webhook.call_event_rejected",
                call_id = %event.call_id,
                error = %error,
                "call event could not be stored"
            );
            Json(WebhookResponse { accepted: false, call_id: None })
        }
    }
}

#[derive(Debug)]
struct NormalizedCallEvent {
    call_id: String,
    mc_number: String,
    platform_call_id: Option<String>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    transcript: Option<String>,
    discussed_load_id: Option<String>,
    final_rate: Option<Decimal>,
    outcome: Option<CallOutcome>,
    sentiment: Option<CallSentiment>,
    extracted: Option<Value>,
}

fn normalize_call_event(payload: &Value, now: DateTime<Utc>) -> NormalizedCallEvent {
    let call_data = payload.get("call_data").cloned().unwrap_or_else(|| Value::Object(Default::default()));

    // extracted_data arrives as an object, a JSON-encoded string, or not at
    // all; a string that fails to parse degrades to empty.
    let extracted = match call_data.get("extracted_data") {
        Some(Value::String(raw)) => serde_json::from_str::<Value>(raw).ok(),
        Some(value @ Value::Object(_)) => Some(value.clone()),
        _ => payload.get("extracted_data").filter(|value| value.is_object()).cloned(),
    };
    let extracted_ref = extracted.as_ref();

    let str_field = |source: Option<&Value>, key: &str| -> Option<String> {
        source
            .and_then(|value| value.get(key))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    };

    let platform_call_id = str_field(Some(&call_data), "platform_call_id");
    let call_id = match &platform_call_id {
        Some(platform_id) => format!("ev_{platform_id}"),
        None => format!("call_{}", Uuid::new_v4().simple()),
    };

    let parse_time = |key: &str| -> DateTime<Utc> {
        str_field(Some(&call_data), key)
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|parsed| parsed.with_timezone(&Utc))
            .unwrap_or(now)
    };

    let final_rate = extracted_ref.and_then(|value| value.get("final_agreed_rate")).and_then(
        |value| match value {
            Value::String(text) => text.trim().parse::<Decimal>().ok(),
            Value::Number(number) => number.to_string().parse::<Decimal>().ok(),
            _ => None,
        },
    );

    NormalizedCallEvent {
        call_id,
        mc_number: str_field(extracted_ref, "carrier_mc_number")
            .unwrap_or_else(|| "unknown".to_string()),
        platform_call_id,
        start_time: parse_time("start_time"),
        end_time: parse_time("end_time"),
        transcript: str_field(Some(&call_data), "transcript"),
        discussed_load_id: str_field(extracted_ref, "discussed_load_id"),
        final_rate,
        outcome: str_field(extracted_ref, "call_outcome")
            .as_deref()
            .and_then(CallOutcome::parse),
        sentiment: str_field(extracted_ref, "carrier_sentiment")
            .as_deref()
            .and_then(CallSentiment::parse),
        extracted,
    }
}

async fn upsert_event(state: &AppState, event: &NormalizedCallEvent) -> Result<(), ApiError> {
    let call_id = CallId(event.call_id.clone());
    let now = Utc::now();
    let duration = (event.end_time - event.start_time).num_seconds().max(0);

    let mut call = match state.calls.find_by_id(&call_id).await? {
        Some(existing) => existing,
        None => {
            let fresh = CallRecord {
                call_id: call_id.clone(),
                mc_number: McNumber(event.mc_number.clone()),
                start_time: event.start_time,
                end_time: None,
                duration_seconds: None,
                platform_call_id: event.platform_call_id.clone(),
                transcript: None,
                discussed_load_id: None,
                initial_rate_offered: None,
                final_negotiated_rate: None,
                outcome: None,
                sentiment: None,
                extracted: None,
                created_at: now,
                updated_at: now,
            };
            state.calls.insert(fresh.clone()).await?;
            fresh
        }
    };

    call.end_time = Some(event.end_time);
    call.duration_seconds = Some(duration);
    call.transcript = event.transcript.clone().or(call.transcript);
    call.discussed_load_id =
        event.discussed_load_id.clone().map(LoadId).or(call.discussed_load_id);
    call.final_negotiated_rate = event.final_rate.or(call.final_negotiated_rate);
    call.outcome = event.outcome.or(call.outcome);
    call.sentiment = event.sentiment.or(call.sentiment);
    call.extracted = event.extracted.clone().or(call.extracted);
    call.updated_at = now;

    state.calls.update(call).await?;
    Ok(())
}
