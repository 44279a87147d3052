pub(crate) mod cron;
pub(crate) mod health;
pub(crate) mod jobs;
pub(crate) mod prices;
pub(crate) mod stats;
