use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::negotiation::{CallId, LoadId, McNumber};

/// How an inbound carrier call ended, as recorded on the call record once the
/// negotiation resolves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    SuccessfulBooking,
    RejectedByCarrier,
    FailedVerification,
    NoSuitableLoads,
    NegotiationFailed,
    TransferredToSales,
    CallDropped,
    SystemError,
}

impl CallOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SuccessfulBooking => "successful_booking",
            Self::RejectedByCarrier => "rejected_by_carrier",
            Self::FailedVerification => "failed_verification",
            Self::NoSuitableLoads => "no_suitable_loads",
            Self::NegotiationFailed => "negotiation_failed",
            Self::TransferredToSales => "transferred_to_sales",
            Self::CallDropped => "call_dropped",
            Self::SystemError => "system_error",
        }
    }

    /// Lenient wire parsing: unknown labels map to `None`, never an error.
    /// External payloads are full of surprises.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "successful_booking" => Some(Self::SuccessfulBooking),
            "rejected_by_carrier" => Some(Self::RejectedByCarrier),
            "failed_verification" => Some(Self::FailedVerification),
            "no_suitable_loads" => Some(Self::NoSuitableLoads),
            "negotiation_failed" => Some(Self::NegotiationFailed),
            "transferred_to_sales" => Some(Self::TransferredToSales),
            "call_dropped" => Some(Self::CallDropped),
            "system_error" => Some(Self::SystemError),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallSentiment {
    Positive,
    Neutral,
    Negative,
    Frustrated,
    Satisfied,
}

impl CallSentiment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
            Self::Frustrated => "frustrated",
            Self::Satisfied => "satisfied",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "positive" => Some(Self::Positive),
            "neutral" => Some(Self::Neutral),
            "negative" => Some(Self::Negative),
            "frustrated" => Some(Self::Frustrated),
            "satisfied" => Some(Self::Satisfied),
            _ => None,
        }
    }
}

/// One inbound carrier call and everything extracted from it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub call_id: CallId,
    pub mc_number: McNumber,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub platform_call_id: Option<String>,
    pub transcript: Option<String>,
    pub discussed_load_id: Option<LoadId>,
    pub initial_rate_offered: Option<Decimal>,
    pub final_negotiated_rate: Option<Decimal>,
    pub outcome: Option<CallOutcome>,
    pub sentiment: Option<CallSentiment>,
    pub extracted: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CallRecord {
    /// Finalize the record: stamp the end time, derive the duration, and set
    /// the classified outcome and sentiment.
    pub fn finalize(
        &mut self,
        end_time: DateTime<Utc>,
        outcome: CallOutcome,
        sentiment: CallSentiment,
    ) {
        self.end_time = Some(end_time);
        self.duration_seconds = Some((end_time - self.start_time).num_seconds().max(0));
        self.outcome = Some(outcome);
        self.sentiment = Some(sentiment);
        self.updated_at = end_time;
    }
}

/// Rolled-up call analytics over a trailing window. Breakdown maps are keyed
/// by the wire labels so the JSON shape is stable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallSummary {
    pub total_calls: i64,
    pub successful_bookings: i64,
    pub average_duration_seconds: Option<f64>,
    pub sentiment_breakdown: BTreeMap<String, i64>,
    pub outcome_breakdown: BTreeMap<String, i64>,
    pub conversion_rate_pct: f64,
}

impl CallSummary {
    pub fn empty() -> Self {
        Self {
            total_calls: 0,
            successful_bookings: 0,
            average_duration_seconds: None,
            sentiment_breakdown: BTreeMap::new(),
            outcome_breakdown: BTreeMap::new(),
            conversion_rate_pct: 0.0,
        }
    }

    pub fn conversion_rate(successful: i64, total: i64) -> f64 {
        if total == 0 {
            return 0.0;
        }
        successful as f64 / total as f64 * 100.0
    }
}
