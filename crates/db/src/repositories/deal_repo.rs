//! Repository for the `deals` table.

use sqlx::PgPool;

use flipscout_core::deal::Deal;

use crate::models::deal::DealRow;

/// Column list for `deals` queries.
const COLUMNS: &str = "\
    id, title, description, price, condition, category, deal_score, \
    latitude, longitude, distance_km, listed_at, ingested_at";

/// Provides storage operations for ingested deals.
pub struct DealRepo;

impl DealRepo {
    /// Upsert a batch of deals in one transaction. Re-ingested listings
    /// refresh their mutable fields (price, score, text) in place.
    ///
    /// Returns the number of rows written.
    pub async fn upsert_batch(pool: &PgPool, deals: &[Deal]) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut written = 0u64;
        for deal in deals {
            let result = sqlx::query(
                "INSERT INTO deals \
                    (id, title, description, price, condition, category, deal_score, \
                     latitude, longitude, distance_km, listed_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
                 ON CONFLICT (id) DO UPDATE SET \
                    title = EXCLUDED.title, \
                    description = EXCLUDED.description, \
                    price = EXCLUDED.price, \
                    condition = EXCLUDED.condition, \
                    category = EXCLUDED.category, \
                    deal_score = EXCLUDED.deal_score, \
                    latitude = EXCLUDED.latitude, \
                    longitude = EXCLUDED.longitude, \
                    distance_km = EXCLUDED.distance_km, \
                    ingested_at = NOW()",
            )
            .bind(&deal.id)
            .bind(&deal.title)
            .bind(&deal.description)
            .bind(deal.price)
            .bind(deal.condition.as_str())
            .bind(&deal.category)
            .bind(deal.deal_score)
            .bind(deal.latitude)
            .bind(deal.longitude)
            .bind(deal.distance_km)
            .bind(deal.listed_at)
            .execute(&mut *tx)
            .await?;
            written += result.rows_affected();
        }
        tx.commit().await?;
        Ok(written)
    }

    /// The most recently ingested deals, newest first. Serves the
    /// rule-test operation.
    pub async fn recent(pool: &PgPool, limit: i64) -> Result<Vec<DealRow>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM deals ORDER BY ingested_at DESC, id LIMIT $1");
        sqlx::query_as::<_, DealRow>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
