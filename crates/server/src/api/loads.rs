use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use loadline_core::domain::load::{Load, LoadSearch};
use loadline_core::domain::negotiation::{LoadId, McNumber};

use super::{ApiError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/loads", post(create).get(list))
        .route("/loads/search", post(search))
        .route("/loads/{load_id}", get(get_one).put(update).delete(delete_one))
}

#[derive(Debug, Deserialize)]
pub struct CreateLoadRequest {
    pub load_id: String,
    pub origin: String,
    pub destination: String,
    pub pickup_at: DateTime<Utc>,
    pub delivery_at: DateTime<Utc>,
    pub equipment_type: String,
    pub loadboard_rate: Decimal,
    pub notes: Option<String>,
    pub weight_lbs: Option<i64>,
    pub commodity_type: String,
    pub num_of_pieces: Option<i64>,
    pub miles: Option<i64>,
    pub dimensions: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateLoadRequest {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub pickup_at: Option<DateTime<Utc>>,
    pub delivery_at: Option<DateTime<Utc>>,
    pub equipment_type: Option<String>,
    pub loadboard_rate: Option<Decimal>,
    pub notes: Option<String>,
    pub weight_lbs: Option<i64>,
    pub commodity_type: Option<String>,
    pub num_of_pieces: Option<i64>,
    pub miles: Option<i64>,
    pub dimensions: Option<String>,
    pub is_available: Option<bool>,
    pub assigned_carrier_mc: Option<String>,
    pub final_rate: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub offset: Option<u32>,
    pub limit: Option<u32>,
    pub available: Option<bool>,
}

async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateLoadRequest>,
) -> Result<(StatusCode, Json<Load>), ApiError> {
    if request.load_id.trim().is_empty() {
        return Err(ApiError::BadRequest("load_id must not be blank".to_string()));
    }
    if request.loadboard_rate.is_sign_negative() {
        return Err(ApiError::BadRequest("loadboard_rate must not be negative".to_string()));
    }
    if request.delivery_at < request.pickup_at {
        return Err(ApiError::BadRequest("delivery_at must not precede pickup_at".to_string()));
    }

    let now = Utc::now();
    let load = Load {
        load_id: LoadId(request.load_id),
        origin: request.origin,
        destination: request.destination,
        pickup_at: request.pickup_at,
        delivery_at: request.delivery_at,
        equipment_type: request.equipment_type,
        loadboard_rate: request.loadboard_rate,
        notes: request.notes,
        weight_lbs: request.weight_lbs,
        commodity_type: request.commodity_type,
        num_of_pieces: request.num_of_pieces,
        miles: request.miles,
        dimensions: request.dimensions,
        is_available: true,
        assigned_carrier_mc: None,
        final_rate: None,
        created_at: now,
        updated_at: now,
    };

    state.loads.insert(load.clone()).await?;
    Ok((StatusCode::CREATED, Json(load)))
}

async fn get_one(
    State(state): State<AppState>,
    Path(load_id): Path<String>,
) -> Result<Json<Load>, ApiError> {
    let load = state
        .loads
        .find_by_id(&LoadId(load_id.clone()))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("load `{load_id}` was not found")))?;
    Ok(Json(load))
}

async fn update(
    State(state): State<AppState>,
    Path(load_id): Path<String>,
    Json(request): Json<UpdateLoadRequest>,
) -> Result<Json<Load>, ApiError> {
    let mut load = state
        .loads
        .find_by_id(&LoadId(load_id.clone()))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("load `{load_id}` was not found")))?;

    if let Some(origin) = request.origin {
        load.origin = origin;
    }
    if let Some(destination) = request.destination {
        load.destination = destination;
    }
    if let Some(pickup_at) = request.pickup_at {
        load.pickup_at = pickup_at;
    }
    if let Some(delivery_at) = request.delivery_at {
        load.delivery_at = delivery_at;
    }
    if let Some(equipment_type) = request.equipment_type {
        load.equipment_type = equipment_type;
    }
    if let Some(loadboard_rate) = request.loadboard_rate {
        if loadboard_rate.is_sign_negative() {
            return Err(ApiError::BadRequest("loadboard_rate must not be negative".to_string()));
        }
        load.loadboard_rate = loadboard_rate;
    }
    if let Some(notes) = request.notes {
        load.notes = Some(notes);
    }
    if let Some(weight_lbs) = request.weight_lbs {
        load.weight_lbs = Some(weight_lbs);
    }
    if let Some(commodity_type) = request.commodity_type {
        load.commodity_type = commodity_type;
    }
    if let Some(num_of_pieces) = request.num_of_pieces {
        load.num_of_pieces = Some(num_of_pieces);
    }
    if let Some(miles) = request.miles {
        load.miles = Some(miles);
    }
    if let Some(dimensions) = request.dimensions {
        load.dimensions = Some(dimensions);
    }
    if let Some(is_available) = request.is_available {
        load.is_available = is_available;
    }
    if let Some(assigned_carrier_mc) = request.assigned_carrier_mc {
        load.assigned_carrier_mc = Some(McNumber(assigned_carrier_mc));
    }
    if let Some(final_rate) = request.final_rate {
        load.final_rate = Some(final_rate);
    }
    load.updated_at = Utc::now();

    state.loads.update(load.clone()).await?;
    Ok(Json(load))
}

async fn delete_one(
    State(state): State<AppState>,
    Path(load_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let deleted = state.loads.delete(&LoadId(load_id.clone())).await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("load `{load_id}` was not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Load>>, ApiError> {
    let loads = state
        .loads
        .list(
            query.offset.unwrap_or(0),
            query.limit.unwrap_or(100).min(500),
            query.available.unwrap_or(true),
        )
        .await?;
    Ok(Json(loads))
}

async fn search(
    State(state): State<AppState>,
    Json(criteria): Json<LoadSearch>,
) -> Result<Json<Vec<Load>>, ApiError> {
    let loads = state.loads.search(&criteria).await?;
    Ok(Json(loads))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    use crate::bootstrap::test_state;

    async fn send(
        router: axum::Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = match body {
            Some(body) => Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
            None => Request::builder().method(method).uri(uri).body(Body::empty()).expect("request"),
        };

        let response = router.oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    fn dry_van(id: &str) -> Value {
        json!({
            "load_id": id,
            "origin": "Los Angeles, CA",
            "destination": "Phoenix, AZ",
            "pickup_at": "2025-08-02T08:00:00Z",
            "delivery_at": "2025-08-03T17:00:00Z",
            "equipment_type": "Dry Van",
            "loadboard_rate": "1500.00",
            "commodity_type": "general freight",
            "weight_lbs": 42000,
        })
    }

    #[tokio::test]
    async fn create_list_search_and_booking_flow() {
        let state = test_state().await;
        let router = super::super::router(state);

        let (status, _) =
            send(router.clone(), Method::POST, "/api/v1/loads", Some(dry_van("LD001"))).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(
            router.clone(),
            Method::POST,
            "/api/v1/loads/search",
            Some(json!({"equipment_type": "dry van", "origin": "los angeles"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(1));

        // Booking the load takes it off the board.
        let (status, body) = send(
            router.clone(),
            Method::PUT,
            "/api/v1/loads/LD001",
            Some(json!({"is_available": false, "assigned_carrier_mc": "123456", "final_rate": "1450.00"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["final_rate"], "1450.00");

        let (_, body) = send(router, Method::GET, "/api/v1/loads?available=true", None).await;
        assert_eq!(body.as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn duplicate_create_conflicts_and_delete_reports_missing() {
        let state = test_state().await;
        let router = super::super::router(state);

        send(router.clone(), Method::POST, "/api/v1/loads", Some(dry_van("LD001"))).await;
        let (status, _) =
            send(router.clone(), Method::POST, "/api/v1/loads", Some(dry_van("LD001"))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) =
            send(router.clone(), Method::DELETE, "/api/v1/loads/LD001", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(router, Method::DELETE, "/api/v1/loads/LD001", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn inverted_schedule_is_rejected() {
        let state = test_state().await;
        let router = super::super::router(state);

        let mut body = dry_van("LD001");
        body["delivery_at"] = Value::String("2025-08-01T00:00:00Z".to_string());
        let (status, _) = send(router, Method::POST, "/api/v1/loads", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
