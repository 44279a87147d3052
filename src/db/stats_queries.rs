use chrono::NaiveDate;
use sqlx::PgPool;

use crate::models::DailyStats;

pub async fn fetch_by_date(
    pool: &PgPool,
    date: NaiveDate,
) -> Result<Option<DailyStats>, sqlx::Error> {
    sqlx::query_as::<_, DailyStats>(
        r#"
        SELECT date, avg_price, min_price, max_price, median_price, price_count
        FROM daily_stats
        WHERE date = $1
        "#,
    )
    .bind(date)
    .fetch_optional(pool)
    .await
}

/// The most recent N days of cached stats, newest first.
pub async fn fetch_recent(pool: &PgPool, days: i64) -> Result<Vec<DailyStats>, sqlx::Error> {
    sqlx::query_as::<_, DailyStats>(
        r#"
        SELECT date, avg_price, min_price, max_price, median_price, price_count
        FROM daily_stats
        ORDER BY date DESC
        LIMIT $1
        "#,
    )
    .bind(days)
    .fetch_all(pool)
    .await
}

pub async fn upsert(pool: &PgPool, stats: &DailyStats) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO daily_stats (date, avg_price, min_price, max_price, median_price, price_count)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (date)
        DO UPDATE SET avg_price = EXCLUDED.avg_price,
                      min_price = EXCLUDED.min_price,
                      max_price = EXCLUDED.max_price,
                      median_price = EXCLUDED.median_price,
                      price_count = EXCLUDED.price_count,
                      computed_at = NOW()
        "#,
    )
    .bind(stats.date)
    .bind(stats.avg_price)
    .bind(stats.min_price)
    .bind(stats.max_price)
    .bind(stats.median_price)
    .bind(stats.price_count)
    .execute(pool)
    .await?;

    Ok(())
}
