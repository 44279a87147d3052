use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::PriceRecord;

/// Insert or overwrite one hourly price. Last write wins for the price; the
/// forecast flag can only ever move from true to false, never back.
pub async fn upsert_price(pool: &PgPool, record: &PriceRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO electricity_prices (id, ts, price_cents_kwh, price_area, forecast)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (ts, price_area)
        DO UPDATE SET price_cents_kwh = EXCLUDED.price_cents_kwh,
                      forecast = electricity_prices.forecast AND EXCLUDED.forecast
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(record.timestamp)
    .bind(record.price_cents_kwh)
    .bind(&record.price_area)
    .bind(record.forecast)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn sweep_forecast_flags(pool: &PgPool, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE electricity_prices
        SET forecast = FALSE
        WHERE forecast = TRUE AND ts <= $1
        "#,
    )
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Prices for the trailing window, newest first.
pub async fn fetch_recent(pool: &PgPool, hours: i64) -> Result<Vec<PriceRecord>, sqlx::Error> {
    sqlx::query_as::<_, PriceRecord>(
        r#"
        SELECT ts, price_cents_kwh, price_area, forecast
        FROM electricity_prices
        WHERE ts >= $1
        ORDER BY ts DESC
        LIMIT 1000
        "#,
    )
    .bind(Utc::now() - Duration::hours(hours))
    .fetch_all(pool)
    .await
}

/// The current hour's record and the one before it, newest first. The stored
/// forecast flag may lag the hour boundary until the sweep runs; callers that
/// serve it derive the flag from the clock instead.
pub async fn fetch_latest(
    pool: &PgPool,
    now: DateTime<Utc>,
) -> Result<Vec<PriceRecord>, sqlx::Error> {
    sqlx::query_as::<_, PriceRecord>(
        r#"
        SELECT ts, price_cents_kwh, price_area, forecast
        FROM electricity_prices
        WHERE ts <= $1
        ORDER BY ts DESC
        LIMIT 2
        "#,
    )
    .bind(now)
    .fetch_all(pool)
    .await
}

/// Non-forecast prices of one UTC calendar day, ascending. Used for daily
/// stats, which only ever aggregate confirmed hours.
pub async fn fetch_actual_for_date(
    pool: &PgPool,
    date: NaiveDate,
) -> Result<Vec<PriceRecord>, sqlx::Error> {
    let day_start = date.and_time(NaiveTime::MIN).and_utc();
    let day_end = day_start + Duration::days(1);

    sqlx::query_as::<_, PriceRecord>(
        r#"
        SELECT ts, price_cents_kwh, price_area, forecast
        FROM electricity_prices
        WHERE ts >= $1 AND ts < $2 AND forecast = FALSE
        ORDER BY ts ASC
        "#,
    )
    .bind(day_start)
    .bind(day_end)
    .fetch_all(pool)
    .await
}

pub async fn count_since(pool: &PgPool, since: DateTime<Utc>) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM electricity_prices WHERE ts >= $1
        "#,
    )
    .bind(since)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}
