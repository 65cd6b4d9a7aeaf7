//! Postgres-backed catalog store
//!
//! Expects the `services` table managed by the site's migrations:
//!
//! | Column | Type |
//! |--------|------|
//! | `id` | `BIGSERIAL` primary key |
//! | `name`, `description` | `TEXT` |
//! | `base_price` | `NUMERIC` |
//! | `display_order` | `INTEGER NULL` |
//! | `details` | `TEXT NULL` (serialized details document) |
//! | `capture_duration`, `treatment_duration`, `deliverables`, `add_ons`, `travel_fee` | `TEXT NULL` (legacy mirror) |

use anyhow::{bail, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::store::CatalogStore;
use crate::types::{
    DetailsDocument, FlatDetails, PersistedServiceRow, ServiceKey, ServiceRowWrite,
};

#[derive(Debug, sqlx::FromRow)]
struct ServiceRecord {
    id: i64,
    name: String,
    description: Option<String>,
    base_price: Decimal,
    display_order: Option<i32>,
    details: Option<String>,
    capture_duration: Option<String>,
    treatment_duration: Option<String>,
    deliverables: Option<String>,
    add_ons: Option<String>,
    travel_fee: Option<String>,
}

impl From<ServiceRecord> for PersistedServiceRow {
    fn from(record: ServiceRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            description: record.description.unwrap_or_default(),
            base_price: record.base_price,
            display_order: record.display_order,
            details_document: record.details.map(DetailsDocument::Text),
            flat: FlatDetails {
                capture_duration: record.capture_duration,
                treatment_duration: record.treatment_duration,
                deliverables: record.deliverables,
                add_ons: record.add_ons,
                travel_fee: record.travel_fee,
            },
        }
    }
}

pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn list_services(&self) -> Result<Vec<PersistedServiceRow>> {
        let records: Vec<ServiceRecord> = sqlx::query_as(
            r#"
            SELECT id, name, description, base_price, display_order, details,
                   capture_duration, treatment_duration, deliverables, add_ons, travel_fee
            FROM services
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(PersistedServiceRow::from).collect())
    }

    async fn create_service(&self, row: &ServiceRowWrite) -> Result<ServiceKey> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO services
                (name, description, base_price, display_order, details,
                 capture_duration, treatment_duration, deliverables, add_ons, travel_fee)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(&row.name)
        .bind(&row.description)
        .bind(row.base_price)
        .bind(row.display_order)
        .bind(&row.details_document)
        .bind(&row.flat.capture_duration)
        .bind(&row.flat.treatment_duration)
        .bind(&row.flat.deliverables)
        .bind(&row.flat.add_ons)
        .bind(&row.flat.travel_fee)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn update_service(&self, key: ServiceKey, row: &ServiceRowWrite) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE services
            SET name = $1,
                description = $2,
                base_price = $3,
                display_order = $4,
                details = $5,
                capture_duration = $6,
                treatment_duration = $7,
                deliverables = $8,
                add_ons = $9,
                travel_fee = $10
            WHERE id = $11
            "#,
        )
        .bind(&row.name)
        .bind(&row.description)
        .bind(row.base_price)
        .bind(row.display_order)
        .bind(&row.details_document)
        .bind(&row.flat.capture_duration)
        .bind(&row.flat.treatment_duration)
        .bind(&row.flat.deliverables)
        .bind(&row.flat.add_ons)
        .bind(&row.flat.travel_fee)
        .bind(key)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            bail!("service {} not found", key);
        }
        Ok(())
    }

    async fn delete_service(&self, key: ServiceKey) -> Result<()> {
        let result = sqlx::query(r#"DELETE FROM services WHERE id = $1"#)
            .bind(key)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            bail!("service {} not found", key);
        }
        Ok(())
    }

    async fn delete_all_services(&self) -> Result<u64> {
        let result = sqlx::query(r#"DELETE FROM services"#)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
