pub mod api_keys;
pub mod credits;
pub mod jobs;
pub mod transactions;
pub mod uploads;
