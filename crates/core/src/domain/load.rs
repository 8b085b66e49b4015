use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::negotiation::{LoadId, McNumber};

/// A freight shipment posted to the loadboard.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Load {
    pub load_id: LoadId,
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
    pub is_available: bool,
    pub assigned_carrier_mc: Option<McNumber>,
    pub final_rate: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Criteria a carrier states on a call when asking what is available.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSearch {
    pub equipment_type: Option<String>,
    pub origin: Option<String>,
    pub max_weight_lbs: Option<i64>,
}

impl LoadSearch {
    /// Availability is implicit: booked loads never match.
    pub fn matches(&self, load: &Load) -> bool {
        if !load.is_available {
            return false;
        }
        if let Some(equipment_type) = &self.equipment_type {
            if !load.equipment_type.eq_ignore_ascii_case(equipment_type) {
                return false;
            }
        }
        if let Some(origin) = &self.origin {
            if !load.origin.to_ascii_lowercase().contains(&origin.to_ascii_lowercase()) {
                return false;
            }
        }
        if let Some(max_weight) = self.max_weight_lbs {
            if load.weight_lbs.is_some_and(|weight| weight > max_weight) {
                return false;
            }
        }
        true
    }
}
