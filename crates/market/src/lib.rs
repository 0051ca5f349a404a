pub mod client;
pub mod error;
pub mod models;

pub use client::{DexScreenerClient, SnapshotSource};
pub use error::FetchError;
