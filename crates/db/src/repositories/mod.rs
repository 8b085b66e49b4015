use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use loadline_core::domain::call::{CallRecord, CallSummary};
use loadline_core::domain::carrier::Carrier;
use loadline_core::domain::load::{Load, LoadSearch};
use loadline_core::domain::negotiation::{CallId, LoadId, McNumber};

pub mod call;
pub mod carrier;
pub mod load;
pub mod memory;
pub mod negotiation;

pub use call::SqlCallRepository;
pub use carrier::SqlCarrierRepository;
pub use load::SqlLoadRepository;
pub use memory::{InMemoryCallRepository, InMemoryCarrierRepository, InMemoryLoadRepository};
pub use negotiation::SqlNegotiationStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("record already exists")]
    Conflict,
    #[error("record was not found")]
    NotFound,
}

#[async_trait]
pub trait CallRepository: Send + Sync {
    async fn find_by_id(&self, call_id: &CallId) -> Result<Option<CallRecord>, RepositoryError>;
    async fn insert(&self, call: CallRecord) -> Result<(), RepositoryError>;
    async fn update(&self, call: CallRecord) -> Result<(), RepositoryError>;
    async fn list_recent(&self, limit: u32) -> Result<Vec<CallRecord>, RepositoryError>;
    async fn list_for_carrier(
        &self,
        mc_number: &McNumber,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<CallRecord>, RepositoryError>;
    /// Roll up calls whose `start_time` is at or after the cutoff.
    async fn summary(&self, since: DateTime<Utc>) -> Result<CallSummary, RepositoryError>;
}

#[async_trait]
pub trait LoadRepository: Send + Sync {
    async fn find_by_id(&self, load_id: &LoadId) -> Result<Option<Load>, RepositoryError>;
    async fn insert(&self, load: Load) -> Result<(), RepositoryError>;
    async fn update(&self, load: Load) -> Result<(), RepositoryError>;
    async fn delete(&self, load_id: &LoadId) -> Result<bool, RepositoryError>;
    async fn list(
        &self,
        offset: u32,
        limit: u32,
        available_only: bool,
    ) -> Result<Vec<Load>, RepositoryError>;
    async fn search(&self, criteria: &LoadSearch) -> Result<Vec<Load>, RepositoryError>;
}

#[async_trait]
pub trait CarrierRepository: Send + Sync {
    async fn find_by_id(&self, mc_number: &McNumber) -> Result<Option<Carrier>, RepositoryError>;
    async fn insert(&self, carrier: Carrier) -> Result<(), RepositoryError>;
    async fn update(&self, carrier: Carrier) -> Result<(), RepositoryError>;
    async fn list(&self, offset: u32, limit: u32) -> Result<Vec<Carrier>, RepositoryError>;
}

// Storage encoding shared by the SQL repositories: fixed-width RFC 3339 UTC
// text for timestamps (lexicographic order == chronological order) and plain
// decimal text for money.

pub(crate) fn fmt_ts(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| format!("bad timestamp `{value}`: {error}"))
}

pub(crate) fn parse_decimal(value: &str) -> Result<Decimal, String> {
    value.parse::<Decimal>().map_err(|error| format!("bad decimal `{value}`: {error}"))
}

pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{fmt_ts, parse_decimal, parse_ts};

    #[test]
    fn timestamp_encoding_round_trips_and_sorts_lexicographically() {
        let earlier = Utc.with_ymd_and_hms(2025, 8, 1, 9, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2025, 8, 1, 9, 0, 1).unwrap();

        assert_eq!(parse_ts(&fmt_ts(earlier)).unwrap(), earlier);
        assert!(fmt_ts(earlier) < fmt_ts(later));
        assert_eq!(fmt_ts(earlier), "2025-08-01T09:00:00.000000Z");
    }

    #[test]
    fn decimal_encoding_is_exact() {
        let amount = parse_decimal("1425.00").unwrap();
        assert_eq!(amount.to_string(), "1425.00");
        assert!(parse_decimal("not-money").is_err());
    }
}
