use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use loadline_core::domain::negotiation::{
    CallId, LoadId, McNumber, Negotiation, NegotiationId, NegotiationStatus, OfferParty, OfferType,
};
use loadline_core::negotiation::store::{NegotiationStore, StoreError};

use super::{fmt_ts, is_unique_violation, parse_decimal, parse_ts};
use crate::DbPool;

/// SQLite adapter for the core negotiation store port. SQLite serializes
/// writers, which gives the lifecycle manager the at-most-one-mutator
/// guarantee it assumes per identifier.
pub struct SqlNegotiationStore {
    pool: DbPool,
}

impl SqlNegotiationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn backend(error: sqlx::Error) -> StoreError {
    StoreError::Backend(error.to_string())
}

fn decode(message: String) -> StoreError {
    StoreError::Backend(format!("decode failure: {message}"))
}

fn row_to_negotiation(row: &sqlx::sqlite::SqliteRow) -> Result<Negotiation, StoreError> {
    let field = |name: &str| -> Result<String, StoreError> {
        row.try_get::<String, _>(name).map_err(backend)
    };
    let opt_field = |name: &str| -> Result<Option<String>, StoreError> {
        row.try_get::<Option<String>, _>(name).map_err(backend)
    };

    let status_str = field("status")?;
    let status = NegotiationStatus::parse(&status_str)
        .ok_or_else(|| decode(format!("unknown status `{status_str}`")))?;
    let offer_by_str = field("current_offer_by")?;
    let current_offer_by = OfferParty::parse(&offer_by_str)
        .ok_or_else(|| decode(format!("unknown offer party `{offer_by_str}`")))?;
    let offer_type_str = field("current_offer_type")?;
    let current_offer_type = OfferType::parse(&offer_type_str)
        .ok_or_else(|| decode(format!("unknown offer type `{offer_type_str}`")))?;

    let final_agreed_rate = opt_field("final_agreed_rate")?
        .map(|value| parse_decimal(&value))
        .transpose()
        .map_err(decode)?;

    Ok(Negotiation {
        id: NegotiationId(field("negotiation_id")?),
        call_id: CallId(field("call_id")?),
        load_id: LoadId(field("load_id")?),
        mc_number: McNumber(field("mc_number")?),
        status,
        current_round: row.try_get::<i64, _>("current_round").map_err(backend)? as u32,
        max_rounds: row.try_get::<i64, _>("max_rounds").map_err(backend)? as u32,
        current_offer_amount: parse_decimal(&field("current_offer_amount")?).map_err(decode)?,
        current_offer_by,
        current_offer_type,
        original_rate: parse_decimal(&field("original_rate")?).map_err(decode)?,
        final_agreed_rate,
        broker_notes: opt_field("broker_notes")?,
        carrier_feedback: opt_field("carrier_feedback")?,
        created_at: parse_ts(&field("created_at")?).map_err(decode)?,
        updated_at: parse_ts(&field("updated_at")?).map_err(decode)?,
        expires_at: parse_ts(&field("expires_at")?).map_err(decode)?,
    })
}

const SELECT_COLUMNS: &str = "negotiation_id, call_id, load_id, mc_number, status, \
     current_round, max_rounds, current_offer_amount, current_offer_by, current_offer_type, \
     original_rate, final_agreed_rate, broker_notes, carrier_feedback, created_at, updated_at, \
     expires_at";

#[async_trait]
impl NegotiationStore for SqlNegotiationStore {
    async fn get(&self, id: &NegotiationId) -> Result<Option<Negotiation>, StoreError> {
        let query =
            format!("SELECT {SELECT_COLUMNS} FROM negotiations WHERE negotiation_id = ?1");
        let row = sqlx::query(&query)
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.as_ref().map(row_to_negotiation).transpose()
    }

    async fn insert(&self, negotiation: Negotiation) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO negotiations (
                negotiation_id, call_id, load_id, mc_number, status, current_round, max_rounds,
                current_offer_amount, current_offer_by, current_offer_type, original_rate,
                final_agreed_rate, broker_notes, carrier_feedback, created_at, updated_at,
                expires_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        )
        .bind(&negotiation.id.0)
        .bind(&negotiation.call_id.0)
        .bind(&negotiation.load_id.0)
        .bind(&negotiation.mc_number.0)
        .bind(negotiation.status.as_str())
        .bind(i64::from(negotiation.current_round))
        .bind(i64::from(negotiation.max_rounds))
        .bind(negotiation.current_offer_amount.to_string())
        .bind(negotiation.current_offer_by.as_str())
        .bind(negotiation.current_offer_type.as_str())
        .bind(negotiation.original_rate.to_string())
        .bind(negotiation.final_agreed_rate.map(|rate| rate.to_string()))
        .bind(&negotiation.broker_notes)
        .bind(&negotiation.carrier_feedback)
        .bind(fmt_ts(negotiation.created_at))
        .bind(fmt_ts(negotiation.updated_at))
        .bind(fmt_ts(negotiation.expires_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(error) if is_unique_violation(&error) => Err(StoreError::Conflict),
            Err(error) => Err(backend(error)),
        }
    }

    async fn update(&self, negotiation: Negotiation) -> Result<(), StoreError> {
        // Identity, creation time, and the deadline never change after insert.
        let result = sqlx::query(
            "UPDATE negotiations SET
                status = ?2, current_round = ?3, current_offer_amount = ?4,
                current_offer_by = ?5, current_offer_type = ?6, final_agreed_rate = ?7,
                broker_notes = ?8, carrier_feedback = ?9, updated_at = ?10
             WHERE negotiation_id = ?1",
        )
        .bind(&negotiation.id.0)
        .bind(negotiation.status.as_str())
        .bind(i64::from(negotiation.current_round))
        .bind(negotiation.current_offer_amount.to_string())
        .bind(negotiation.current_offer_by.as_str())
        .bind(negotiation.current_offer_type.as_str())
        .bind(negotiation.final_agreed_rate.map(|rate| rate.to_string()))
        .bind(&negotiation.broker_notes)
        .bind(&negotiation.carrier_feedback)
        .bind(fmt_ts(negotiation.updated_at))
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Backend(format!(
                "update of unknown negotiation `{}`",
                negotiation.id
            )));
        }
        Ok(())
    }

    async fn find_active_for_call(
        &self,
        call_id: &CallId,
    ) -> Result<Option<Negotiation>, StoreError> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM negotiations
             WHERE call_id = ?1 AND status = 'active'
             ORDER BY created_at DESC LIMIT 1"
        );
        let row = sqlx::query(&query)
            .bind(&call_id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.as_ref().map(row_to_negotiation).transpose()
    }

    async fn list_for_call(&self, call_id: &CallId) -> Result<Vec<Negotiation>, StoreError> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM negotiations
             WHERE call_id = ?1 ORDER BY created_at DESC"
        );
        let rows = sqlx::query(&query)
            .bind(&call_id.0)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        rows.iter().map(row_to_negotiation).collect()
    }

    async fn list_active_expired(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Negotiation>, StoreError> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM negotiations
             WHERE status = 'active' AND expires_at <= ?1"
        );
        let rows = sqlx::query(&query)
            .bind(fmt_ts(now))
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        rows.iter().map(row_to_negotiation).collect()
    }
}
