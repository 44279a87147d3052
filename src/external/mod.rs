pub mod entsoe;
pub mod market_data;
