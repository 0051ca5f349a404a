use alloy::primitives::Address;
use anyhow::anyhow;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

pub fn parse_address(s: &str) -> anyhow::Result<Address> {
    Address::from_str(s.trim()).map_err(|e| anyhow!("invalid address {s}: {e}"))
}

/// Lower-cased `0x` form used in alert text and api paths.
pub fn lower_hex(address: &Address) -> String {
    address.to_string().to_ascii_lowercase()
}
