mod daily_stats;
mod price_record;

pub use daily_stats::DailyStats;
pub use price_record::PriceRecord;
