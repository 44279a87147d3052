use std::sync::Arc;

use sqlx::PgPool;

use crate::external::market_data::MarketDataProvider;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub market_data: Arc<dyn MarketDataProvider>,
    pub cron_secret: Option<String>,
}
