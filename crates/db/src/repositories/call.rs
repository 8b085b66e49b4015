use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use loadline_core::domain::call::{CallOutcome, CallRecord, CallSentiment, CallSummary};
use loadline_core::domain::negotiation::{CallId, LoadId, McNumber};

use super::{fmt_ts, is_unique_violation, parse_decimal, parse_ts, CallRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCallRepository {
    pool: DbPool,
}

impl SqlCallRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode(message: String) -> RepositoryError {
    RepositoryError::Decode(message)
}

fn row_to_call(row: &sqlx::sqlite::SqliteRow) -> Result<CallRecord, RepositoryError> {
    let opt = |name: &str| -> Result<Option<String>, RepositoryError> {
        row.try_get::<Option<String>, _>(name).map_err(RepositoryError::from)
    };

    let extracted = opt("extracted")?
        .map(|raw| serde_json::from_str(&raw).map_err(|error| decode(error.to_string())))
        .transpose()?;

    Ok(CallRecord {
        call_id: CallId(row.try_get("call_id")?),
        mc_number: McNumber(row.try_get("mc_number")?),
        start_time: parse_ts(&row.try_get::<String, _>("start_time")?).map_err(decode)?,
        end_time: opt("end_time")?.map(|value| parse_ts(&value)).transpose().map_err(decode)?,
        duration_seconds: row.try_get("duration_seconds")?,
        platform_call_id: opt("platform_call_id")?,
        transcript: opt("transcript")?,
        discussed_load_id: opt("discussed_load_id")?.map(LoadId),
        initial_rate_offered: opt("initial_rate_offered")?
            .map(|value| parse_decimal(&value))
            .transpose()
            .map_err(decode)?,
        final_negotiated_rate: opt("final_negotiated_rate")?
            .map(|value| parse_decimal(&value))
            .transpose()
            .map_err(decode)?,
        // Unrecognized labels degrade to unset rather than failing the read.
        outcome: opt("outcome")?.as_deref().and_then(CallOutcome::parse),
        sentiment: opt("sentiment")?.as_deref().and_then(CallSentiment::parse),
        extracted,
        created_at: parse_ts(&row.try_get::<String, _>("created_at")?).map_err(decode)?,
        updated_at: parse_ts(&row.try_get::<String, _>("updated_at")?).map_err(decode)?,
    })
}

const SELECT_COLUMNS: &str = "call_id, mc_number, start_time, end_time, duration_seconds, \
     platform_call_id, transcript, discussed_load_id, initial_rate_offered, \
     final_negotiated_rate, outcome, sentiment, extracted, created_at, updated_at";

#[async_trait]
impl CallRepository for SqlCallRepository {
    async fn find_by_id(&self, call_id: &CallId) -> Result<Option<CallRecord>, RepositoryError> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM calls WHERE call_id = ?1");
        let row = sqlx::query(&query).bind(&call_id.0).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_call).transpose()
    }

    async fn insert(&self, call: CallRecord) -> Result<(), RepositoryError> {
        let extracted = call
            .extracted
            .as_ref()
            .map(|value| serde_json::to_string(value).map_err(|error| decode(error.to_string())))
            .transpose()?;

        let result = sqlx::query(
            "INSERT INTO calls (
                call_id, mc_number, start_time, end_time, duration_seconds, platform_call_id,
                transcript, discussed_load_id, initial_rate_offered, final_negotiated_rate,
                outcome, sentiment, extracted, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        )
        .bind(&call.call_id.0)
        .bind(&call.mc_number.0)
        .bind(fmt_ts(call.start_time))
        .bind(call.end_time.map(fmt_ts))
        .bind(call.duration_seconds)
        .bind(&call.platform_call_id)
        .bind(&call.transcript)
        .bind(call.discussed_load_id.as_ref().map(|id| id.0.clone()))
        .bind(call.initial_rate_offered.map(|rate| rate.to_string()))
        .bind(call.final_negotiated_rate.map(|rate| rate.to_string()))
        .bind(call.outcome.map(CallOutcome::as_str))
        .bind(call.sentiment.map(CallSentiment::as_str))
        .bind(extracted)
        .bind(fmt_ts(call.created_at))
        .bind(fmt_ts(call.updated_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(error) if is_unique_violation(&error) => Err(RepositoryError::Conflict),
            Err(error) => Err(error.into()),
        }
    }

    async fn update(&self, call: CallRecord) -> Result<(), RepositoryError> {
        let extracted = call
            .extracted
            .as_ref()
            .map(|value| serde_json::to_string(value).map_err(|error| decode(error.to_string())))
            .transpose()?;

        let result = sqlx::query(
            "UPDATE calls SET
                mc_number = ?2, start_time = ?3, end_time = ?4, duration_seconds = ?5,
                platform_call_id = ?6, transcript = ?7, discussed_load_id = ?8,
                initial_rate_offered = ?9, final_negotiated_rate = ?10, outcome = ?11,
                sentiment = ?12, extracted = ?13, updated_at = ?14
             WHERE call_id = ?1",
        )
        .bind(&call.call_id.0)
        .bind(&call.mc_number.0)
        .bind(fmt_ts(call.start_time))
        .bind(call.end_time.map(fmt_ts))
        .bind(call.duration_seconds)
        .bind(&call.platform_call_id)
        .bind(&call.transcript)
        .bind(call.discussed_load_id.as_ref().map(|id| id.0.clone()))
        .bind(call.initial_rate_offered.map(|rate| rate.to_string()))
        .bind(call.final_negotiated_rate.map(|rate| rate.to_string()))
        .bind(call.outcome.map(CallOutcome::as_str))
        .bind(call.sentiment.map(CallSentiment::as_str))
        .bind(extracted)
        .bind(fmt_ts(call.updated_at))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<CallRecord>, RepositoryError> {
        let query =
            format!("SELECT {SELECT_COLUMNS} FROM calls ORDER BY start_time DESC LIMIT ?1");
        let rows = sqlx::query(&query).bind(i64::from(limit)).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_call).collect()
    }

    async fn list_for_carrier(
        &self,
        mc_number: &McNumber,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<CallRecord>, RepositoryError> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM calls WHERE mc_number = ?1
             ORDER BY start_time DESC LIMIT ?2 OFFSET ?3"
        );
        let rows = sqlx::query(&query)
            .bind(&mc_number.0)
            .bind(i64::from(limit))
            .bind(i64::from(offset))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_call).collect()
    }

    async fn summary(&self, since: DateTime<Utc>) -> Result<CallSummary, RepositoryError> {
        let cutoff = fmt_ts(since);

        let totals = sqlx::query(
            "SELECT COUNT(*) AS total,
                    SUM(CASE WHEN outcome = 'successful_booking' THEN 1 ELSE 0 END) AS booked,
                    AVG(duration_seconds) AS avg_duration
             FROM calls WHERE start_time >= ?1",
        )
        .bind(&cutoff)
        .fetch_one(&self.pool)
        .await?;

        let total_calls: i64 = totals.try_get("total")?;
        let successful_bookings: i64 =
            totals.try_get::<Option<i64>, _>("booked")?.unwrap_or(0);
        let average_duration_seconds: Option<f64> = totals.try_get("avg_duration")?;

        let mut sentiment_breakdown = BTreeMap::new();
        let sentiment_rows = sqlx::query(
            "SELECT sentiment, COUNT(*) AS count FROM calls
             WHERE start_time >= ?1 AND sentiment IS NOT NULL GROUP BY sentiment",
        )
        .bind(&cutoff)
        .fetch_all(&self.pool)
        .await?;
        for row in &sentiment_rows {
            sentiment_breakdown
                .insert(row.try_get::<String, _>("sentiment")?, row.try_get::<i64, _>("count")?);
        }

        let mut outcome_breakdown = BTreeMap::new();
        let outcome_rows = sqlx::query(
            "SELECT outcome, COUNT(*) AS count FROM calls
             WHERE start_time >= ?1 AND outcome IS NOT NULL GROUP BY outcome",
        )
        .bind(&cutoff)
        .fetch_all(&self.pool)
        .await?;
        for row in &outcome_rows {
            outcome_breakdown
                .insert(row.try_get::<String, _>("outcome")?, row.try_get::<i64, _>("count")?);
        }

        Ok(CallSummary {
            total_calls,
            successful_bookings,
            average_duration_seconds,
            sentiment_breakdown,
            outcome_breakdown,
            conversion_rate_pct: CallSummary::conversion_rate(successful_bookings, total_calls),
        })
    }
}
