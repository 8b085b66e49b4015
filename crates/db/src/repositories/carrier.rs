use async_trait::async_trait;
use sqlx::Row;

use loadline_core::domain::carrier::Carrier;
use loadline_core::domain::negotiation::McNumber;

use super::{fmt_ts, is_unique_violation, parse_ts, CarrierRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCarrierRepository {
    pool: DbPool,
}

impl SqlCarrierRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode(message: String) -> RepositoryError {
    RepositoryError::Decode(message)
}

fn row_to_carrier(row: &sqlx::sqlite::SqliteRow) -> Result<Carrier, RepositoryError> {
    let opt = |name: &str| -> Result<Option<String>, RepositoryError> {
        row.try_get::<Option<String>, _>(name).map_err(RepositoryError::from)
    };

    let equipment_raw: String = row.try_get("equipment_types")?;
    let equipment_types: Vec<String> =
        serde_json::from_str(&equipment_raw).map_err(|error| decode(error.to_string()))?;

    Ok(Carrier {
        mc_number: McNumber(row.try_get("mc_number")?),
        company_name: row.try_get("company_name")?,
        dot_number: opt("dot_number")?,
        phone: opt("phone")?,
        email: opt("email")?,
        address: opt("address")?,
        is_verified: row.try_get::<i64, _>("is_verified")? != 0,
        fmcsa_status: opt("fmcsa_status")?,
        last_verified_at: opt("last_verified_at")?
            .map(|value| parse_ts(&value))
            .transpose()
            .map_err(decode)?,
        total_loads: row.try_get("total_loads")?,
        successful_loads: row.try_get("successful_loads")?,
        equipment_types,
        last_contact_at: opt("last_contact_at")?
            .map(|value| parse_ts(&value))
            .transpose()
            .map_err(decode)?,
        created_at: parse_ts(&row.try_get::<String, _>("created_at")?).map_err(decode)?,
        updated_at: parse_ts(&row.try_get::<String, _>("updated_at")?).map_err(decode)?,
    })
}

const SELECT_COLUMNS: &str = "mc_number, company_name, dot_number, phone, email, address, \
     is_verified, fmcsa_status, last_verified_at, total_loads, successful_loads, \
     equipment_types, last_contact_at, created_at, updated_at";

#[async_trait]
impl CarrierRepository for SqlCarrierRepository {
    async fn find_by_id(&self, mc_number: &McNumber) -> Result<Option<Carrier>, RepositoryError> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM carriers WHERE mc_number = ?1");
        let row = sqlx::query(&query).bind(&mc_number.0).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_carrier).transpose()
    }

    async fn insert(&self, carrier: Carrier) -> Result<(), RepositoryError> {
        let equipment = serde_json::to_string(&carrier.equipment_types)
            .map_err(|error| decode(error.to_string()))?;

        let result = sqlx::query(
            "INSERT INTO carriers (
                mc_number, company_name, dot_number, phone, email, address, is_verified,
                fmcsa_status, last_verified_at, total_loads, successful_loads, equipment_types,
                last_contact_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        )
        .bind(&carrier.mc_number.0)
        .bind(&carrier.company_name)
        .bind(&carrier.dot_number)
        .bind(&carrier.phone)
        .bind(&carrier.email)
        .bind(&carrier.address)
        .bind(i64::from(carrier.is_verified))
        .bind(&carrier.fmcsa_status)
        .bind(carrier.last_verified_at.map(fmt_ts))
        .bind(carrier.total_loads)
        .bind(carrier.successful_loads)
        .bind(equipment)
        .bind(carrier.last_contact_at.map(fmt_ts))
        .bind(fmt_ts(carrier.created_at))
        .bind(fmt_ts(carrier.updated_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(error) if is_unique_violation(&error) => Err(RepositoryError::Conflict),
            Err(error) => Err(error.into()),
        }
    }

    async fn update(&self, carrier: Carrier) -> Result<(), RepositoryError> {
        let equipment = serde_json::to_string(&carrier.equipment_types)
            .map_err(|error| decode(error.to_string()))?;

        let result = sqlx::query(
            "UPDATE carriers SET
                company_name = ?2, dot_number = ?3, phone = ?4, email = ?5, address = ?6,
                is_verified = ?7, fmcsa_status = ?8, last_verified_at = ?9, total_loads = ?10,
                successful_loads = ?11, equipment_types = ?12, last_contact_at = ?13,
                updated_at = ?14
             WHERE mc_number = ?1",
        )
        .bind(&carrier.mc_number.0)
        .bind(&carrier.company_name)
        .bind(&carrier.dot_number)
        .bind(&carrier.phone)
        .bind(&carrier.email)
        .bind(&carrier.address)
        .bind(i64::from(carrier.is_verified))
        .bind(&carrier.fmcsa_status)
        .bind(carrier.last_verified_at.map(fmt_ts))
        .bind(carrier.total_loads)
        .bind(carrier.successful_loads)
        .bind(equipment)
        .bind(carrier.last_contact_at.map(fmt_ts))
        .bind(fmt_ts(carrier.updated_at))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn list(&self, offset: u32, limit: u32) -> Result<Vec<Carrier>, RepositoryError> {
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM carriers ORDER BY company_name ASC LIMIT ?1 OFFSET ?2"
        );
        let rows = sqlx::query(&query)
            .bind(i64::from(limit))
            .bind(i64::from(offset))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_carrier).collect()
    }
}
