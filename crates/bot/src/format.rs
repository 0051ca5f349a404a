use alloy::primitives::Address;
use moonwatch_core::types::Snapshot;
use moonwatch_core::utils::lower_hex;
use std::fmt::Write;

pub const PLACEHOLDER: &str = "Waiting...";
const TAX_WARNING_PCT: f64 = 10.0;

pub fn format_number(value: Option<f64>) -> String {
    match value {
        Some(value) if value.is_finite() => {
            if value >= 1_000_000.0 {
                format!("{:.2}M", value / 1_000_000.0)
            } else if value >= 1_000.0 {
                format!("{:.2}k", value / 1_000.0)
            } else {
                format!("{value:.6}")
            }
        }
        _ => PLACEHOLDER.to_string(),
    }
}

/// Elapsed time since `created_ms` as `{h}h{mm}m`. Timestamps ahead of `now_ms`
/// render as zero age.
pub fn format_age(created_ms: Option<u64>, now_ms: u64) -> String {
    let Some(created_ms) = created_ms else {
        return PLACEHOLDER.to_string();
    };
    let age_secs = now_ms.saturating_sub(created_ms) / 1_000;
    let hours = age_secs / 3_600;
    let minutes = (age_secs % 3_600) / 60;
    format!("{hours}h{minutes:02}m")
}

pub fn tax_warnings(snapshot: &Snapshot) -> Vec<String> {
    let mut warnings = Vec::new();
    if snapshot.buy_tax_pct > TAX_WARNING_PCT {
        warnings.push(format!("⚠️ Buy Tax is {:.2}%", snapshot.buy_tax_pct));
    }
    if snapshot.sell_tax_pct > TAX_WARNING_PCT {
        warnings.push(format!("⚠️ Sell Tax is {:.2}%", snapshot.sell_tax_pct));
    }
    warnings
}

pub fn render_alert(address: &Address, snapshot: &Snapshot, now_ms: u64) -> String {
    let mut msg = String::new();
    let _ = writeln!(msg, "🚀 New token found!");
    let _ = writeln!(
        msg,
        "• Ticker: {}",
        snapshot.symbol.as_deref().unwrap_or("Unknown")
    );
    let _ = writeln!(msg, "• CA: {}", lower_hex(address));
    let _ = writeln!(msg, "• 🔗 DS: {}", snapshot.link);
    let _ = writeln!(msg, "• 💸 Price: ${}", format_number(snapshot.price_usd));
    let _ = writeln!(msg, "• 💰 FDV: ${}", format_number(snapshot.fdv));
    let _ = writeln!(
        msg,
        "• 💵 Liquidity: ${}",
        format_number(snapshot.liquidity_usd)
    );
    let _ = writeln!(
        msg,
        "• ⏳ Pair Age: {}",
        format_age(snapshot.pair_created_at_ms, now_ms)
    );
    let _ = write!(
        msg,
        "• 📊 Volume (24h): ${}",
        format_number(snapshot.volume_24h)
    );

    let warnings = tax_warnings(snapshot);
    if !warnings.is_empty() {
        let _ = write!(msg, "\n\n{}", warnings.join("\n"));
    }
    msg
}
