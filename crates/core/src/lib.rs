pub mod config;
pub mod dedupe;
pub mod error;
pub mod metrics;
pub mod modes;
pub mod types;
pub mod utils;

pub use config::AppConfig;
pub use error::{Error, Result};
