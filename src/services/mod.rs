pub mod job_scheduler_service;
pub mod price_service;
pub mod stats_service;
