pub mod experts;
pub mod health;
pub mod log_batch;
pub mod posts;
pub mod query;
