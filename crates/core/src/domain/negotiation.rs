use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::NegotiationError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NegotiationId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoadId(pub String);

/// Motor Carrier number, the regulatory identifier for a trucking company.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct McNumber(pub String);

impl fmt::Display for NegotiationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for McNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationStatus {
    Active,
    Accepted,
    Rejected,
    Expired,
}

impl NegotiationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferType {
    Initial,
    Counter,
    Final,
}

impl OfferType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Counter => "counter",
            Self::Final => "final",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "initial" => Some(Self::Initial),
            "counter" => Some(Self::Counter),
            "final" => Some(Self::Final),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferParty {
    Broker,
    Carrier,
}

impl OfferParty {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Broker => "broker",
            Self::Carrier => "carrier",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "broker" => Some(Self::Broker),
            "carrier" => Some(Self::Carrier),
            _ => None,
        }
    }
}

/// One price negotiation between the broker and a carrier over a single load.
///
/// Records are never physically deleted; terminal rows stay behind as the
/// bargaining audit trail. All mutation goes through the lifecycle manager.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Negotiation {
    #[serde(rename = "negotiation_id")]
    pub id: NegotiationId,
    pub call_id: CallId,
    pub load_id: LoadId,
    pub mc_number: McNumber,
    pub status: NegotiationStatus,
    pub current_round: u32,
    pub max_rounds: u32,
    pub current_offer_amount: Decimal,
    pub current_offer_by: OfferParty,
    pub current_offer_type: OfferType,
    pub original_rate: Decimal,
    pub final_agreed_rate: Option<Decimal>,
    pub broker_notes: Option<String>,
    pub carrier_feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Negotiation {
    pub fn has_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn rounds_remaining(&self) -> u32 {
        self.max_rounds.saturating_sub(self.current_round)
    }

    /// A record accepts further counter-offers only while active, before its
    /// deadline, with at least one round left.
    pub fn is_biddable_at(&self, now: DateTime<Utc>) -> bool {
        self.status == NegotiationStatus::Active
            && !self.has_expired_at(now)
            && self.rounds_remaining() > 0
    }

    pub fn can_transition_to(&self, next: NegotiationStatus) -> bool {
        self.status == NegotiationStatus::Active && next.is_terminal()
    }

    /// Close the record. Only `Active -> terminal` moves are legal; terminal
    /// rows are immutable apart from the bookkeeping timestamp.
    pub fn transition_to(
        &mut self,
        next: NegotiationStatus,
        at: DateTime<Utc>,
    ) -> Result<(), NegotiationError> {
        if self.can_transition_to(next) {
            self.status = next;
            self.updated_at = at;
            return Ok(());
        }

        Err(NegotiationError::InvalidState { id: self.id.clone(), status: self.status })
    }
}

/// Recommendation produced by the offer evaluator. Transient: computed fresh
/// on every evaluation and never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NegotiationDecision {
    pub should_accept: bool,
    pub counter_offer_amount: Option<Decimal>,
    pub reasoning: String,
    pub is_final_offer: bool,
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use super::{
        CallId, LoadId, McNumber, Negotiation, NegotiationId, NegotiationStatus, OfferParty,
        OfferType,
    };

    fn negotiation(status: NegotiationStatus) -> Negotiation {
        let now = Utc::now();
        Negotiation {
            id: NegotiationId("NEG-1".to_string()),
            call_id: CallId("CALL-1".to_string()),
            load_id: LoadId("LD001".to_string()),
            mc_number: McNumber("123456".to_string()),
            status,
            current_round: 1,
            max_rounds: 3,
            current_offer_amount: Decimal::new(120_000, 2),
            current_offer_by: OfferParty::Carrier,
            current_offer_type: OfferType::Initial,
            original_rate: Decimal::new(150_000, 2),
            final_agreed_rate: None,
            broker_notes: None,
            carrier_feedback: None,
            created_at: now,
            updated_at: now,
            expires_at: now + Duration::hours(24),
        }
    }

    #[test]
    fn active_negotiation_can_close() {
        let mut negotiation = negotiation(NegotiationStatus::Active);
        negotiation
            .transition_to(NegotiationStatus::Accepted, Utc::now())
            .expect("active -> accepted");
        assert_eq!(negotiation.status, NegotiationStatus::Accepted);
    }

    #[test]
    fn terminal_negotiation_is_immutable() {
        let mut negotiation = negotiation(NegotiationStatus::Rejected);
        let error = negotiation
            .transition_to(NegotiationStatus::Expired, Utc::now())
            .expect_err("rejected rows stay rejected");
        assert!(matches!(
            error,
            crate::errors::NegotiationError::InvalidState {
                status: NegotiationStatus::Rejected,
                ..
            }
        ));
        assert_eq!(negotiation.status, NegotiationStatus::Rejected);
    }

    #[test]
    fn reopening_is_not_a_legal_transition() {
        let negotiation = negotiation(NegotiationStatus::Active);
        assert!(!negotiation.can_transition_to(NegotiationStatus::Active));
    }

    #[test]
    fn biddable_requires_active_unexpired_with_rounds_left() {
        let now = Utc::now();
        let mut fresh = negotiation(NegotiationStatus::Active);
        assert!(fresh.is_biddable_at(now));

        fresh.current_round = fresh.max_rounds;
        assert!(!fresh.is_biddable_at(now));

        let expired = negotiation(NegotiationStatus::Active);
        assert!(!expired.is_biddable_at(now + Duration::hours(25)));
        assert!(expired.has_expired_at(expired.expires_at));
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            NegotiationStatus::Active,
            NegotiationStatus::Accepted,
            NegotiationStatus::Rejected,
            NegotiationStatus::Expired,
        ] {
            assert_eq!(NegotiationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(NegotiationStatus::parse("CLOSED"), None);
        assert_eq!(OfferParty::parse("Carrier"), Some(OfferParty::Carrier));
        assert_eq!(OfferType::parse("counter"), Some(OfferType::Counter));
    }
}
