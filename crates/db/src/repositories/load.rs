use async_trait::async_trait;
use sqlx::{QueryBuilder, Row};

use loadline_core::domain::load::{Load, LoadSearch};
use loadline_core::domain::negotiation::{LoadId, McNumber};

use super::{fmt_ts, is_unique_violation, parse_decimal, parse_ts, LoadRepository, RepositoryError};
use crate::DbPool;

pub struct SqlLoadRepository {
    pool: DbPool,
}

impl SqlLoadRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode(message: String) -> RepositoryError {
    RepositoryError::Decode(message)
}

fn row_to_load(row: &sqlx::sqlite::SqliteRow) -> Result<Load, RepositoryError> {
    let opt = |name: &str| -> Result<Option<String>, RepositoryError> {
        row.try_get::<Option<String>, _>(name).map_err(RepositoryError::from)
    };

    Ok(Load {
        load_id: LoadId(row.try_get("load_id")?),
        origin: row.try_get("origin")?,
        destination: row.try_get("destination")?,
        pickup_at: parse_ts(&row.try_get::<String, _>("pickup_at")?).map_err(decode)?,
        delivery_at: parse_ts(&row.try_get::<String, _>("delivery_at")?).map_err(decode)?,
        equipment_type: row.try_get("equipment_type")?,
        loadboard_rate: parse_decimal(&row.try_get::<String, _>("loadboard_rate")?)
            .map_err(decode)?,
        notes: opt("notes")?,
        weight_lbs: row.try_get("weight_lbs")?,
        commodity_type: row.try_get("commodity_type")?,
        num_of_pieces: row.try_get("num_of_pieces")?,
        miles: row.try_get("miles")?,
        dimensions: opt("dimensions")?,
        is_available: row.try_get::<i64, _>("is_available")? != 0,
        assigned_carrier_mc: opt("assigned_carrier_mc")?.map(McNumber),
        final_rate: opt("final_rate")?.map(|value| parse_decimal(&value)).transpose().map_err(decode)?,
        created_at: parse_ts(&row.try_get::<String, _>("created_at")?).map_err(decode)?,
        updated_at: parse_ts(&row.try_get::<String, _>("updated_at")?).map_err(decode)?,
    })
}

const SELECT_COLUMNS: &str = "load_id, origin, destination, pickup_at, delivery_at, \
     equipment_type, loadboard_rate, notes, weight_lbs, commodity_type, num_of_pieces, miles, \
     dimensions, is_available, assigned_carrier_mc, final_rate, created_at, updated_at";

#[async_trait]
impl LoadRepository for SqlLoadRepository {
    async fn find_by_id(&self, load_id: &LoadId) -> Result<Option<Load>, RepositoryError> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM loads WHERE load_id = ?1");
        let row = sqlx::query(&query).bind(&load_id.0).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_load).transpose()
    }

    async fn insert(&self, load: Load) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO loads (
                load_id, origin, destination, pickup_at, delivery_at, equipment_type,
                loadboard_rate, notes, weight_lbs, commodity_type, num_of_pieces, miles,
                dimensions, is_available, assigned_carrier_mc, final_rate, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        )
        .bind(&load.load_id.0)
        .bind(&load.origin)
        .bind(&load.destination)
        .bind(fmt_ts(load.pickup_at))
        .bind(fmt_ts(load.delivery_at))
        .bind(&load.equipment_type)
        .bind(load.loadboard_rate.to_string())
        .bind(&load.notes)
        .bind(load.weight_lbs)
        .bind(&load.commodity_type)
        .bind(load.num_of_pieces)
        .bind(load.miles)
        .bind(&load.dimensions)
        .bind(i64::from(load.is_available))
        .bind(load.assigned_carrier_mc.as_ref().map(|mc| mc.0.clone()))
        .bind(load.final_rate.map(|rate| rate.to_string()))
        .bind(fmt_ts(load.created_at))
        .bind(fmt_ts(load.updated_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(error) if is_unique_violation(&error) => Err(RepositoryError::Conflict),
            Err(error) => Err(error.into()),
        }
    }

    async fn update(&self, load: Load) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE loads SET
                origin = ?2, destination = ?3, pickup_at = ?4, delivery_at = ?5,
                equipment_type = ?6, loadboard_rate = ?7, notes = ?8, weight_lbs = ?9,
                commodity_type = ?10, num_of_pieces = ?11, miles = ?12, dimensions = ?13,
                is_available = ?14, assigned_carrier_mc = ?15, final_rate = ?16, updated_at = ?17
             WHERE load_id = ?1",
        )
        .bind(&load.load_id.0)
        .bind(&load.origin)
        .bind(&load.destination)
        .bind(fmt_ts(load.pickup_at))
        .bind(fmt_ts(load.delivery_at))
        .bind(&load.equipment_type)
        .bind(load.loadboard_rate.to_string())
        .bind(&load.notes)
        .bind(load.weight_lbs)
        .bind(&load.commodity_type)
        .bind(load.num_of_pieces)
        .bind(load.miles)
        .bind(&load.dimensions)
        .bind(i64::from(load.is_available))
        .bind(load.assigned_carrier_mc.as_ref().map(|mc| mc.0.clone()))
        .bind(load.final_rate.map(|rate| rate.to_string()))
        .bind(fmt_ts(load.updated_at))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, load_id: &LoadId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM loads WHERE load_id = ?1")
            .bind(&load_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(
        &self,
        offset: u32,
        limit: u32,
        available_only: bool,
    ) -> Result<Vec<Load>, RepositoryError> {
        let mut builder = QueryBuilder::new(format!("SELECT {SELECT_COLUMNS} FROM loads"));
        if available_only {
            builder.push(" WHERE is_available = 1");
        }
        builder.push(" ORDER BY pickup_at ASC LIMIT ");
        builder.push_bind(i64::from(limit));
        builder.push(" OFFSET ");
        builder.push_bind(i64::from(offset));

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_load).collect()
    }

    async fn search(&self, criteria: &LoadSearch) -> Result<Vec<Load>, RepositoryError> {
        let mut builder = QueryBuilder::new(format!(
            "SELECT {SELECT_COLUMNS} FROM loads WHERE is_available = 1"
        ));
        if let Some(equipment_type) = &criteria.equipment_type {
            builder.push(" AND equipment_type = ");
            builder.push_bind(equipment_type.clone());
            builder.push(" COLLATE NOCASE");
        }
        if let Some(origin) = &criteria.origin {
            builder.push(" AND origin LIKE ");
            builder.push_bind(format!("%{origin}%"));
        }
        if let Some(max_weight) = criteria.max_weight_lbs {
            builder.push(" AND (weight_lbs IS NULL OR weight_lbs <= ");
            builder.push_bind(max_weight);
            builder.push(")");
        }
        builder.push(" ORDER BY pickup_at ASC");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_load).collect()
    }
}
