pub mod audit;
pub mod classify;
pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod negotiation;

pub use audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink, NoopAuditSink};
pub use classify::{classify_outcome, classify_sentiment};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::call::{CallOutcome, CallRecord, CallSentiment, CallSummary};
pub use domain::carrier::{Carrier, FmcsaVerification};
pub use domain::load::{Load, LoadSearch};
pub use domain::negotiation::{
    CallId, LoadId, McNumber, Negotiation, NegotiationDecision, NegotiationId, NegotiationStatus,
    OfferParty, OfferType,
};
pub use errors::{ApplicationError, NegotiationError};
pub use negotiation::{
    CreateNegotiation, InMemoryNegotiationStore, LifecycleManager, NegotiationPolicy,
    NegotiationStore, OfferEvaluator, StoreError,
};
