use thiserror::Error;

use crate::domain::negotiation::{NegotiationId, NegotiationStatus};

/// Typed failures of the negotiation lifecycle. All of these are local,
/// recoverable conditions reported to the caller; none are fatal.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NegotiationError {
    #[error("negotiation `{0}` was not found")]
    NotFound(NegotiationId),
    #[error("negotiation `{0}` already exists")]
    DuplicateId(NegotiationId),
    #[error("negotiation `{id}` is closed ({status:?}) and cannot be modified")]
    InvalidState { id: NegotiationId, status: NegotiationStatus },
    #[error("negotiation `{0}` expired before the offer arrived")]
    Expired(NegotiationId),
    #[error("negotiation `{0}` has no bargaining rounds left")]
    RoundLimitExceeded(NegotiationId),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Negotiation(#[from] NegotiationError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    /// Whether the failure is the caller's to fix (conflict, bad state)
    /// rather than an infrastructure fault.
    pub fn is_client_fault(&self) -> bool {
        matches!(self, Self::Negotiation(_))
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::negotiation::{NegotiationId, NegotiationStatus};
    use crate::errors::{ApplicationError, NegotiationError};

    #[test]
    fn negotiation_errors_convert_into_application_errors() {
        let error: ApplicationError =
            NegotiationError::NotFound(NegotiationId("NEG-404".to_string())).into();
        assert!(error.is_client_fault());
        assert_eq!(error.to_string(), "negotiation `NEG-404` was not found");
    }

    #[test]
    fn persistence_errors_are_not_client_faults() {
        let error = ApplicationError::Persistence("database lock timeout".to_string());
        assert!(!error.is_client_fault());
    }

    #[test]
    fn invalid_state_error_names_the_blocking_status() {
        let error = NegotiationError::InvalidState {
            id: NegotiationId("NEG-7".to_string()),
            status: NegotiationStatus::Accepted,
        };
        assert!(error.to_string().contains("Accepted"));
    }
}
