use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::Regex;
use reqwest::Client;
use tracing::{error, warn};

use crate::external::market_data::{MarketDataError, MarketDataProvider};
use crate::models::PriceRecord;

const BASE_URL: &str = "https://web-api.tp.entsoe.eu/api";

/// EIC code for the Finnish bidding zone.
pub const FINLAND_DOMAIN: &str = "10YFI-1--------U";

/// A44 = day-ahead prices.
const DOCUMENT_TYPE_DAY_AHEAD: &str = "A44";

const HTTP_TIMEOUT_SECS: u64 = 30;

/// How much of an unparseable response body gets logged for diagnosis.
const PREVIEW_LEN: usize = 300;

/// Client for the ENTSO-E transparency platform. Fetches day-ahead price
/// documents for a single bidding zone (in and out domain are identical).
pub struct EntsoEClient {
    client: Client,
    api_key: String,
    domain: String,
    price_area: String,
}

impl EntsoEClient {
    pub fn new(
        api_key: String,
        domain: String,
        price_area: String,
    ) -> Result<Self, MarketDataError> {
        if api_key.is_empty() {
            return Err(MarketDataError::Config(
                "ENTSO-E API key is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| MarketDataError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            domain,
            price_area,
        })
    }

    /// Reads `ENTSOE_API_KEY` (required), `ENTSOE_DOMAIN` and `PRICE_AREA`
    /// (optional, default Finland) from the environment.
    pub fn from_env() -> Result<Self, MarketDataError> {
        let api_key = std::env::var("ENTSOE_API_KEY")
            .map_err(|_| MarketDataError::Config("ENTSOE_API_KEY not set".to_string()))?;
        let domain =
            std::env::var("ENTSOE_DOMAIN").unwrap_or_else(|_| FINLAND_DOMAIN.to_string());
        let price_area = std::env::var("PRICE_AREA").unwrap_or_else(|_| "FI".to_string());

        Self::new(api_key, domain, price_area)
    }
}

#[async_trait]
impl MarketDataProvider for EntsoEClient {
    async fn fetch_day_ahead_prices(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<PriceRecord>, MarketDataError> {
        let period_start = date.and_time(NaiveTime::MIN).and_utc();
        let period_end = period_start + Duration::days(1);
        let period_start_param = format_period(period_start);
        let period_end_param = format_period(period_end);

        let response = self
            .client
            .get(BASE_URL)
            .query(&[
                ("securityToken", self.api_key.as_str()),
                ("documentType", DOCUMENT_TYPE_DAY_AHEAD),
                ("in_Domain", self.domain.as_str()),
                ("out_Domain", self.domain.as_str()),
                ("periodStart", period_start_param.as_str()),
                ("periodEnd", period_end_param.as_str()),
            ])
            .header("Accept", "application/xml")
            .send()
            .await
            .map_err(|e| MarketDataError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MarketDataError::Upstream {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| MarketDataError::Network(e.to_string()))?;

        parse_day_ahead_document(&body, Utc::now(), &self.price_area).map_err(|e| {
            let preview: String = body.chars().take(PREVIEW_LEN).collect();
            error!("Failed to parse ENTSO-E response for {}: {} (preview: {})", date, e, preview);
            e
        })
    }
}

/// `yyyyMMddHHmm` in UTC, the period format the ENTSO-E API expects.
fn format_period(instant: DateTime<Utc>) -> String {
    instant.format("%Y%m%d%H%M").to_string()
}

/// Parse a `Publication_MarketDocument` into normalized price records.
///
/// Each `TimeSeries` holds a `Period` with an interval start, a resolution
/// and 1-based hourly points priced in EUR/MWh. A document with no series is
/// a valid empty day, not an error. Output is sorted ascending by timestamp.
pub fn parse_day_ahead_document(
    xml: &str,
    now: DateTime<Utc>,
    price_area: &str,
) -> Result<Vec<PriceRecord>, MarketDataError> {
    if !xml.contains("<Publication_MarketDocument") {
        return Err(MarketDataError::Parse(
            "missing Publication_MarketDocument root".to_string(),
        ));
    }

    let series_re = Regex::new(r"(?s)<TimeSeries>(.*?)</TimeSeries>").unwrap();
    let point_re = Regex::new(r"(?s)<Point>(.*?)</Point>").unwrap();

    let mut records: Vec<PriceRecord> = Vec::new();
    let mut series_count = 0;

    for series_cap in series_re.captures_iter(xml) {
        series_count += 1;
        let series = &series_cap[1];

        let resolution = extract_tag(series, "resolution")
            .ok_or_else(|| MarketDataError::Parse("Period missing resolution".to_string()))?;
        if resolution != "PT60M" && resolution != "PT1H" {
            warn!("Skipping TimeSeries with unsupported resolution {}", resolution);
            continue;
        }

        let start_str = extract_tag(series, "start")
            .ok_or_else(|| MarketDataError::Parse("Period missing interval start".to_string()))?;
        let period_start = parse_interval_start(&start_str)?;

        for point_cap in point_re.captures_iter(series) {
            let point = &point_cap[1];

            let position: i64 = extract_tag(point, "position")
                .ok_or_else(|| MarketDataError::Parse("Point missing position".to_string()))?
                .parse()
                .map_err(|e| MarketDataError::Parse(format!("invalid position: {}", e)))?;

            let eur_per_mwh: f64 = extract_tag(point, "price.amount")
                .ok_or_else(|| MarketDataError::Parse("Point missing price.amount".to_string()))?
                .parse()
                .map_err(|e| MarketDataError::Parse(format!("invalid price.amount: {}", e)))?;

            // Position is 1-based: position 1 is the hour starting at the
            // period start.
            let timestamp = period_start + Duration::hours(position - 1);

            records.push(PriceRecord::new(
                timestamp,
                round_cents(eur_per_mwh / 10.0),
                price_area,
                timestamp > now,
            ));
        }
    }

    if series_count == 0 {
        warn!("No TimeSeries data in ENTSO-E response");
    }

    records.sort_by_key(|r| r.timestamp);
    Ok(records)
}

/// ENTSO-E intervals come as `2024-01-15T00:00Z`; be tolerant of full
/// RFC 3339 as well.
fn parse_interval_start(value: &str) -> Result<DateTime<Utc>, MarketDataError> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%MZ")
        .map(|naive| naive.and_utc())
        .or_else(|_| {
            DateTime::parse_from_rfc3339(value).map(|parsed| parsed.with_timezone(&Utc))
        })
        .map_err(|e| MarketDataError::Parse(format!("invalid interval start {:?}: {}", value, e)))
}

/// EUR/MWh to cents/kWh is a divide by ten; round to whole cents with ties
/// away from zero.
fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn extract_tag(xml: &str, tag: &str) -> Option<String> {
    let pattern = format!(r"<{}[^>]*>(.*?)</{}>", regex::escape(tag), regex::escape(tag));
    let re = Regex::new(&pattern).ok()?;
    re.captures(xml)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Publication_MarketDocument>
  <TimeSeries>
    <Period>
      <timeInterval>
        <start>2024-01-15T00:00Z</start>
        <end>2024-01-16T00:00Z</end>
      </timeInterval>
      <resolution>PT60M</resolution>
      <Point>
        <position>1</position>
        <price.amount>75.50</price.amount>
      </Point>
      <Point>
        <position>2</position>
        <price.amount>65.25</price.amount>
      </Point>
    </Period>
  </TimeSeries>
</Publication_MarketDocument>"#;

    fn utc(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
    }

    #[test]
    fn parses_points_into_hourly_records() {
        let now = utc(2024, 1, 20, 12);
        let records = parse_day_ahead_document(SAMPLE_XML, now, "FI").unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].timestamp, utc(2024, 1, 15, 0));
        assert_eq!(records[0].price_cents_kwh, 7.55);
        assert_eq!(records[0].price_area, "FI");
        assert_eq!(records[1].timestamp, utc(2024, 1, 15, 1));
        // 65.25 EUR/MWh = 6.525 c/kWh, rounds up to 6.53
        assert_eq!(records[1].price_cents_kwh, 6.53);
    }

    #[test]
    fn timestamps_increase_by_one_hour_from_period_start() {
        let xml = r#"<Publication_MarketDocument><TimeSeries><Period>
            <timeInterval><start>2024-03-01T00:00Z</start><end>2024-03-02T00:00Z</end></timeInterval>
            <resolution>PT60M</resolution>
            <Point><position>1</position><price.amount>10</price.amount></Point>
            <Point><position>2</position><price.amount>20</price.amount></Point>
            <Point><position>3</position><price.amount>30</price.amount></Point>
            <Point><position>4</position><price.amount>40</price.amount></Point>
        </Period></TimeSeries></Publication_MarketDocument>"#;

        let records = parse_day_ahead_document(xml, utc(2024, 3, 5, 0), "FI").unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].timestamp, utc(2024, 3, 1, 0));
        for pair in records.windows(2) {
            assert_eq!(pair[1].timestamp - pair[0].timestamp, Duration::hours(1));
        }
    }

    #[test]
    fn forecast_flag_follows_wall_clock() {
        // Clock between the two points: first hour has passed, second is ahead.
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 0, 30, 0).unwrap();
        let records = parse_day_ahead_document(SAMPLE_XML, now, "FI").unwrap();

        assert!(!records[0].forecast);
        assert!(records[1].forecast);
    }

    #[test]
    fn timestamp_equal_to_now_is_not_forecast() {
        let now = utc(2024, 1, 15, 1);
        let records = parse_day_ahead_document(SAMPLE_XML, now, "FI").unwrap();
        assert!(!records[1].forecast);
    }

    #[test]
    fn document_without_series_is_empty_not_error() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <Publication_MarketDocument>
            </Publication_MarketDocument>"#;
        let records = parse_day_ahead_document(xml, utc(2024, 1, 15, 0), "FI").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn missing_document_root_is_a_parse_error() {
        let err = parse_day_ahead_document("not xml at all", utc(2024, 1, 15, 0), "FI")
            .unwrap_err();
        assert!(matches!(err, MarketDataError::Parse(_)));
    }

    #[test]
    fn garbage_position_is_a_parse_error() {
        let xml = r#"<Publication_MarketDocument><TimeSeries><Period>
            <timeInterval><start>2024-01-15T00:00Z</start></timeInterval>
            <resolution>PT60M</resolution>
            <Point><position>abc</position><price.amount>10</price.amount></Point>
        </Period></TimeSeries></Publication_MarketDocument>"#;
        let err = parse_day_ahead_document(xml, utc(2024, 1, 15, 0), "FI").unwrap_err();
        assert!(matches!(err, MarketDataError::Parse(_)));
    }

    #[test]
    fn quarter_hour_series_is_skipped() {
        let xml = r#"<Publication_MarketDocument>
        <TimeSeries><Period>
            <timeInterval><start>2024-01-15T00:00Z</start></timeInterval>
            <resolution>PT15M</resolution>
            <Point><position>1</position><price.amount>99</price.amount></Point>
        </Period></TimeSeries>
        <TimeSeries><Period>
            <timeInterval><start>2024-01-15T00:00Z</start></timeInterval>
            <resolution>PT60M</resolution>
            <Point><position>1</position><price.amount>50</price.amount></Point>
        </Period></TimeSeries>
        </Publication_MarketDocument>"#;

        let records = parse_day_ahead_document(xml, utc(2024, 1, 20, 0), "FI").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].price_cents_kwh, 5.0);
    }

    #[test]
    fn series_out_of_order_are_sorted_by_timestamp() {
        let xml = r#"<Publication_MarketDocument>
        <TimeSeries><Period>
            <timeInterval><start>2024-01-16T00:00Z</start></timeInterval>
            <resolution>PT60M</resolution>
            <Point><position>1</position><price.amount>20</price.amount></Point>
        </Period></TimeSeries>
        <TimeSeries><Period>
            <timeInterval><start>2024-01-15T00:00Z</start></timeInterval>
            <resolution>PT60M</resolution>
            <Point><position>1</position><price.amount>10</price.amount></Point>
        </Period></TimeSeries>
        </Publication_MarketDocument>"#;

        let records = parse_day_ahead_document(xml, utc(2024, 1, 20, 0), "FI").unwrap();
        assert_eq!(records[0].timestamp, utc(2024, 1, 15, 0));
        assert_eq!(records[1].timestamp, utc(2024, 1, 16, 0));
    }

    #[test]
    fn round_cents_ties_go_away_from_zero() {
        assert_eq!(round_cents(7.55), 7.55);
        assert_eq!(round_cents(6.525), 6.53);
        assert_eq!(round_cents(0.0), 0.0);
        assert_eq!(round_cents(12.344), 12.34);
    }

    #[test]
    fn parses_both_interval_start_formats() {
        let short = parse_interval_start("2024-01-15T00:00Z").unwrap();
        let rfc3339 = parse_interval_start("2024-01-15T00:00:00+00:00").unwrap();
        assert_eq!(short, utc(2024, 1, 15, 0));
        assert_eq!(short, rfc3339);

        assert!(parse_interval_start("15.1.2024").is_err());
    }

    #[test]
    fn period_format_is_compact_utc() {
        assert_eq!(format_period(utc(2024, 1, 15, 0)), "202401150000");
        assert_eq!(
            format_period(Utc.with_ymd_and_hms(2024, 12, 3, 23, 45, 0).unwrap()),
            "202412032345"
        );
    }

    #[test]
    fn missing_api_key_fails_construction() {
        let err = EntsoEClient::new(String::new(), FINLAND_DOMAIN.to_string(), "FI".to_string())
            .err()
            .unwrap();
        assert!(matches!(err, MarketDataError::Config(_)));
    }
}
