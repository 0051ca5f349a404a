//! DexScreener `/latest/dex/tokens/{address}` response shapes.
//!
//! Numeric fields arrive either as JSON numbers or as decimal strings
//! depending on the field, so every one of them goes through the lenient
//! deserializers below. Anything that does not parse becomes `None`.

use moonwatch_core::types::Snapshot;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};

/// `pairCreatedAt` values below this are taken to be unix seconds.
const SECONDS_CUTOFF: u64 = 100_000_000_000;

#[derive(Debug, Default, Deserialize)]
pub struct TokenPairsResponse {
    #[serde(default)]
    pub pairs: Option<Vec<PairRecord>>,
}

impl TokenPairsResponse {
    pub fn first_pair(self) -> Option<PairRecord> {
        self.pairs.and_then(|pairs| pairs.into_iter().next())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairRecord {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price_usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub fdv: Option<f64>,
    #[serde(default)]
    pub liquidity: Option<Liquidity>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub pair_created_at: Option<u64>,
    #[serde(default)]
    pub volume: Option<Volume>,
    #[serde(default)]
    pub base_token: Option<BaseToken>,
    #[serde(default)]
    pub txns: Option<Txns>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub info: Option<PairInfo>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Liquidity {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub usd: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Volume {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub h24: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BaseToken {
    #[serde(default)]
    pub symbol: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Txns {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub buy_tax: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub sell_tax: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairInfo {
    #[serde(default)]
    pub image_url: Option<String>,
}

impl PairRecord {
    /// `None` when the pair has no USD price yet.
    pub fn into_snapshot(self, link: String) -> Option<Snapshot> {
        let price_usd = self.price_usd?;
        let (buy_tax_pct, sell_tax_pct) = self
            .txns
            .map(|txns| (txns.buy_tax.unwrap_or(0.0), txns.sell_tax.unwrap_or(0.0)))
            .unwrap_or((0.0, 0.0));
        let image_url = self
            .thumbnail
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.info.and_then(|info| info.image_url))
            .filter(|url| !url.trim().is_empty());
        Some(Snapshot {
            price_usd: Some(price_usd),
            fdv: self.fdv,
            liquidity_usd: self.liquidity.and_then(|l| l.usd),
            volume_24h: self.volume.and_then(|v| v.h24),
            pair_created_at_ms: self.pair_created_at.map(normalize_epoch_ms),
            symbol: self
                .base_token
                .and_then(|token| token.symbol)
                .filter(|symbol| !symbol.is_empty()),
            link,
            image_url,
            buy_tax_pct,
            sell_tax_pct,
        })
    }
}

pub fn normalize_epoch_ms(raw: u64) -> u64 {
    if raw < SECONDS_CUTOFF {
        raw.saturating_mul(1_000)
    } else {
        raw
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient {
    Number(f64),
    Text(String),
    Other(IgnoredAny),
}

impl Lenient {
    fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Lenient::Number(value) => *value,
            Lenient::Text(text) => text.trim().parse::<f64>().ok()?,
            Lenient::Other(IgnoredAny) => return None,
        };
        value.is_finite().then_some(value)
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Lenient>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(Lenient::as_f64))
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = lenient_f64(deserializer)?;
    Ok(value.filter(|v| *v >= 0.0).map(|v| v as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> TokenPairsResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn parses_string_and_number_fields() {
        let body = r#"{
            "schemaVersion": "1.0.0",
            "pairs": [{
                "priceUsd": "0.000123",
                "fdv": 1500000,
                "liquidity": {"usd": "5000", "base": 10},
                "pairCreatedAt": 1760000000000,
                "volume": {"h24": "20000", "h1": 100},
                "baseToken": {"address": "0x1", "name": "Foo", "symbol": "FOO"},
                "txns": {"m5": {"buys": 3, "sells": 1}, "buyTax": "12.5"}
            }]
        }"#;
        let pair = parse(body).first_pair().unwrap();
        let snapshot = pair.into_snapshot("https://example/0x1".to_string()).unwrap();

        assert_eq!(snapshot.price_usd, Some(0.000123));
        assert_eq!(snapshot.fdv, Some(1_500_000.0));
        assert_eq!(snapshot.liquidity_usd, Some(5_000.0));
        assert_eq!(snapshot.volume_24h, Some(20_000.0));
        assert_eq!(snapshot.pair_created_at_ms, Some(1_760_000_000_000));
        assert_eq!(snapshot.symbol.as_deref(), Some("FOO"));
        assert_eq!(snapshot.buy_tax_pct, 12.5);
        assert_eq!(snapshot.sell_tax_pct, 0.0);
        assert_eq!(snapshot.link, "https://example/0x1");
        assert!(snapshot.image_url.is_none());
    }

    #[test]
    fn missing_metrics_stay_absent() {
        let body = r#"{"pairs": [{"priceUsd": "1.5", "fdv": null, "liquidity": {}}]}"#;
        let snapshot = parse(body)
            .first_pair()
            .unwrap()
            .into_snapshot(String::new())
            .unwrap();

        assert_eq!(snapshot.price_usd, Some(1.5));
        assert!(snapshot.fdv.is_none());
        assert!(snapshot.liquidity_usd.is_none());
        assert!(snapshot.volume_24h.is_none());
        assert!(snapshot.pair_created_at_ms.is_none());
        assert!(!snapshot.is_usable());
    }

    #[test]
    fn unparseable_numbers_become_absent() {
        let body = r#"{"pairs": [{"priceUsd": "0.1", "fdv": "n/a", "volume": {"h24": true},
            "liquidity": {"usd": {"nested": [1, 2, {"deep": null}]}},
            "pairCreatedAt": [1760000000000]}]}"#;
        let snapshot = parse(body)
            .first_pair()
            .unwrap()
            .into_snapshot(String::new())
            .unwrap();
        assert_eq!(snapshot.price_usd, Some(0.1));
        assert!(snapshot.fdv.is_none());
        assert!(snapshot.volume_24h.is_none());
        assert!(snapshot.liquidity_usd.is_none());
        assert!(snapshot.pair_created_at_ms.is_none());
    }

    #[test]
    fn pair_without_price_is_absent() {
        let body = r#"{"pairs": [{"fdv": 100, "pairCreatedAt": 1760000000000}]}"#;
        assert!(parse(body)
            .first_pair()
            .unwrap()
            .into_snapshot(String::new())
            .is_none());
    }

    #[test]
    fn null_or_empty_pairs_have_no_first_pair() {
        assert!(parse(r#"{"pairs": null}"#).first_pair().is_none());
        assert!(parse(r#"{"pairs": []}"#).first_pair().is_none());
        assert!(parse(r#"{}"#).first_pair().is_none());
    }

    #[test]
    fn only_first_pair_is_used() {
        let body = r#"{"pairs": [
            {"priceUsd": "1", "baseToken": {"symbol": "ONE"}},
            {"priceUsd": "2", "baseToken": {"symbol": "TWO"}}
        ]}"#;
        let snapshot = parse(body)
            .first_pair()
            .unwrap()
            .into_snapshot(String::new())
            .unwrap();
        assert_eq!(snapshot.symbol.as_deref(), Some("ONE"));
    }

    #[test]
    fn image_falls_back_to_info_image_url() {
        let body = r#"{"pairs": [{"priceUsd": "1", "info": {"imageUrl": "https://img/a.png"}}]}"#;
        let snapshot = parse(body)
            .first_pair()
            .unwrap()
            .into_snapshot(String::new())
            .unwrap();
        assert_eq!(snapshot.image_url.as_deref(), Some("https://img/a.png"));

        let body = r#"{"pairs": [{"priceUsd": "1", "thumbnail": "https://img/t.png",
            "info": {"imageUrl": "https://img/a.png"}}]}"#;
        let snapshot = parse(body)
            .first_pair()
            .unwrap()
            .into_snapshot(String::new())
            .unwrap();
        assert_eq!(snapshot.image_url.as_deref(), Some("https://img/t.png"));
    }

    #[test]
    fn second_timestamps_are_scaled_to_ms() {
        assert_eq!(normalize_epoch_ms(1_760_000_000), 1_760_000_000_000);
        assert_eq!(normalize_epoch_ms(1_760_000_000_000), 1_760_000_000_000);
    }
}
