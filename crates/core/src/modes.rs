use anyhow::anyhow;

use crate::error::Result;

/// Whether a failed snapshot fetch consumes one of the candidate's retries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchErrorPolicy {
    Count,
    Ignore,
}

impl FetchErrorPolicy {
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "count" | "count_errors" | "count-errors" => Ok(Self::Count),
            "ignore" | "ignore_errors" | "ignore-errors" => Ok(Self::Ignore),
            _ => Err(anyhow!("unsupported queue.fetch_error_policy: {raw}").into()),
        }
    }
}
