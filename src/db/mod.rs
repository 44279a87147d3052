pub mod job_queries;
pub mod price_queries;
pub mod stats_queries;
pub mod store;
