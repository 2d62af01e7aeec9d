pub mod boundary;
pub mod closer;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod policy;
pub mod records;
pub mod scheduler;
pub mod status;

pub use errors::{AppError, AppResult};
