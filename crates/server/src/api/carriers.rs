use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use loadline_core::domain::carrier::{Carrier, FmcsaVerification};
use loadline_core::domain::negotiation::McNumber;

use super::{ApiError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/carriers", post(create).get(list))
        .route("/carriers/{mc_number}", get(get_one).put(update))
        .route("/carriers/{mc_number}/verify", post(verify))
}

#[derive(Debug, Deserialize)]
pub struct CreateCarrierRequest {
    pub mc_number: String,
    pub company_name: String,
    pub dot_number: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub equipment_types: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCarrierRequest {
    pub company_name: Option<String>,
    pub dot_number: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub equipment_types: Option<Vec<String>>,
    pub last_contact_at: Option<chrono::DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub offset: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub verification: FmcsaVerification,
    pub carrier: Option<Carrier>,
}

async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateCarrierRequest>,
) -> Result<(StatusCode, Json<Carrier>), ApiError> {
    if request.mc_number.trim().is_empty() {
        return Err(ApiError::BadRequest("mc_number must not be blank".to_string()));
    }

    let now = Utc::now();
    let carrier = Carrier {
        mc_number: McNumber(request.mc_number),
        company_name: request.company_name,
        dot_number: request.dot_number,
        phone: request.phone,
        email: request.email,
        address: request.address,
        is_verified: false,
        fmcsa_status: None,
        last_verified_at: None,
        total_loads: 0,
        successful_loads: 0,
        equipment_types: request.equipment_types.unwrap_or_default(),
        last_contact_at: None,
        created_at: now,
        updated_at: now,
    };

    state.carriers.insert(carrier.clone()).await?;
    Ok((StatusCode::CREATED, Json(carrier)))
}

async fn get_one(
    State(state): State<AppState>,
    Path(mc_number): Path<String>,
) -> Result<Json<Carrier>, ApiError> {
    let carrier = state
        .carriers
        .find_by_id(&McNumber(mc_number.clone()))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("carrier `{mc_number}` was not found")))?;
    Ok(Json(carrier))
}

async fn update(
    State(state): State<AppState>,
    Path(mc_number): Path<String>,
    Json(request): Json<UpdateCarrierRequest>,
) -> Result<Json<Carrier>, ApiError> {
    let mut carrier = state
        .carriers
        .find_by_id(&McNumber(mc_number.clone()))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("carrier `{mc_number}` was not found")))?;

    if let Some(company_name) = request.company_name {
        carrier.company_name = company_name;
    }
    if let Some(dot_number) = request.dot_number {
        carrier.dot_number = Some(dot_number);
    }
    if let Some(phone) = request.phone {
        carrier.phone = Some(phone);
    }
    if let Some(email) = request.email {
        carrier.email = Some(email);
    }
    if let Some(address) = request.address {
        carrier.address = Some(address);
    }
    if let Some(equipment_types) = request.equipment_types {
        carrier.equipment_types = equipment_types;
    }
    if let Some(last_contact_at) = request.last_contact_at {
        carrier.last_contact_at = Some(last_contact_at);
    }
    carrier.updated_at = Utc::now();

    state.carriers.update(carrier.clone()).await?;
    Ok(Json(carrier))
}

async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Carrier>>, ApiError> {
    let carriers = state
        .carriers
        .list(query.offset.unwrap_or(0), query.limit.unwrap_or(100).min(500))
        .await?;
    Ok(Json(carriers))
}

/// Verify the carrier's operating authority and fold the result into the
/// stored record. A valid verification for an unknown MC number creates the
/// record from the lookup data.
async fn verify(
    State(state): State<AppState>,
    Path(mc_number): Path<String>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let mc_number = McNumber(mc_number);
    let verification = state.verifier.verify(&mc_number).await?;
    let now = Utc::now();

    let carrier = match state.carriers.find_by_id(&mc_number).await? {
        Some(mut existing) => {
            existing.apply_verification(&verification, now);
            state.carriers.update(existing.clone()).await?;
            Some(existing)
        }
        None if verification.is_valid => {
            let mut fresh = Carrier {
                mc_number: mc_number.clone(),
                company_name: verification
                    .company_name
                    .clone()
                    .unwrap_or_else(|| format!("Carrier {}", mc_number.0)),
                dot_number: None,
                phone: None,
                email: None,
                address: None,
                is_verified: false,
                fmcsa_status: None,
                last_verified_at: None,
                total_loads: 0,
                successful_loads: 0,
                equipment_types: Vec::new(),
                last_contact_at: None,
                created_at: now,
                updated_at: now,
            };
            fresh.apply_verification(&verification, now);
            state.carriers.insert(fresh.clone()).await?;
            Some(fresh)
        }
        None => None,
    };

    Ok(Json(VerifyResponse { verification, carrier }))
}
