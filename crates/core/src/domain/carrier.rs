use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::negotiation::McNumber;

/// A trucking company, keyed by its MC number.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Carrier {
    pub mc_number: McNumber,
    pub company_name: String,
    pub dot_number: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub is_verified: bool,
    pub fmcsa_status: Option<String>,
    pub last_verified_at: Option<DateTime<Utc>>,
    pub total_loads: i64,
    pub successful_loads: i64,
    pub equipment_types: Vec<String>,
    pub last_contact_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of an FMCSA authority lookup for one MC number.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FmcsaVerification {
    pub mc_number: McNumber,
    pub is_valid: bool,
    pub status: String,
    pub company_name: Option<String>,
    pub dot_number: Option<String>,
}

impl Carrier {
    /// Fold a verification result into the stored record.
    pub fn apply_verification(&mut self, verification: &FmcsaVerification, at: DateTime<Utc>) {
        self.is_verified = verification.is_valid;
        self.fmcsa_status = Some(verification.status.clone());
        self.last_verified_at = Some(at);
        if let Some(dot_number) = &verification.dot_number {
            self.dot_number = Some(dot_number.clone());
        }
        self.updated_at = at;
    }
}
