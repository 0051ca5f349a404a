use crate::format::render_alert;
use anyhow::{anyhow, Result};
use moonwatch_core::config::TelegramConfig;
use moonwatch_core::types::{CandidateToken, Snapshot};
use moonwatch_core::utils::lower_hex;
use reqwest::Client;
use serde::Serialize;
use std::future::Future;
use tokio::time::Duration;
use tracing::{debug, info, warn};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const TELEGRAM_MESSAGE_LIMIT: usize = 4096;
const BUY_BUTTON_TEXT: &str = "✅ Buy on Looter";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertButton {
    pub text: String,
    pub url: String,
}

/// Outbound chat delivery.
pub trait AlertTransport {
    fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        button: Option<&AlertButton>,
    ) -> impl Future<Output = Result<()>> + Send;

    fn send_photo(&self, chat_id: &str, photo_url: &str) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Renders alerts and fans them out to every configured chat. A failing chat
/// never stops delivery to the others.
pub struct Notifier<T> {
    transport: T,
    chat_ids: Vec<String>,
    buy_link_base: String,
}

impl<T> Notifier<T>
where
    T: AlertTransport,
{
    pub fn new(transport: T, chat_ids: Vec<String>, buy_link_base: String) -> Self {
        Self {
            transport,
            chat_ids,
            buy_link_base,
        }
    }

    pub fn chat_count(&self) -> usize {
        self.chat_ids.len()
    }

    pub async fn notify(
        &self,
        candidate: &CandidateToken,
        snapshot: &Snapshot,
        now_ms: u64,
    ) -> DeliveryReport {
        let text = truncate_message(render_alert(&candidate.address, snapshot, now_ms));
        let button = AlertButton {
            text: BUY_BUTTON_TEXT.to_string(),
            url: format!("{}{}", self.buy_link_base, lower_hex(&candidate.address)),
        };
        let mut report = DeliveryReport::default();
        for chat_id in &self.chat_ids {
            match self
                .transport
                .send_message(chat_id, &text, Some(&button))
                .await
            {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    warn!(?err, %chat_id, address = %candidate.address, "alert delivery failed");
                    report.failed += 1;
                    continue;
                }
            }
            if let Some(image_url) = snapshot.image_url.as_deref() {
                if let Err(err) = self.transport.send_photo(chat_id, image_url).await {
                    debug!(?err, %chat_id, "alert image delivery failed");
                }
            }
        }
        info!(
            address = %candidate.address,
            delivered = report.delivered,
            failed = report.failed,
            "alert sent"
        );
        report
    }

    /// Plain text broadcast without button or image.
    pub async fn announce(&self, text: &str) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for chat_id in &self.chat_ids {
            match self.transport.send_message(chat_id, text, None).await {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    warn!(?err, %chat_id, "announcement delivery failed");
                    report.failed += 1;
                }
            }
        }
        report
    }
}

#[derive(Clone)]
pub struct TelegramTransport {
    client: Client,
    base_url: String,
}

impl TelegramTransport {
    pub fn from_config(cfg: &TelegramConfig) -> Result<Self> {
        let token = cfg.bot_token()?;
        Self::new(TELEGRAM_API_BASE, &token, cfg.send_timeout_ms)
    }

    pub fn new(api_base: &str, token: &str, timeout_ms: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;
        let base_url = format!("{}/bot{token}", api_base.trim_end_matches('/'));
        Ok(Self { client, base_url })
    }

    async fn post<P: Serialize>(&self, method: &str, payload: &P) -> Result<()> {
        let url = format!("{}/{method}", self.base_url);
        let response = self.client.post(&url).json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("telegram {method} failed: {status}"));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct InlineButton<'a> {
    text: &'a str,
    url: &'a str,
}

#[derive(Serialize)]
struct ReplyMarkup<'a> {
    inline_keyboard: Vec<Vec<InlineButton<'a>>>,
}

#[derive(Serialize)]
struct MessagePayload<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<ReplyMarkup<'a>>,
}

#[derive(Serialize)]
struct PhotoPayload<'a> {
    chat_id: &'a str,
    photo: &'a str,
}

impl AlertTransport for TelegramTransport {
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        button: Option<&AlertButton>,
    ) -> Result<()> {
        let payload = MessagePayload {
            chat_id,
            text,
            disable_web_page_preview: true,
            reply_markup: button.map(|button| ReplyMarkup {
                inline_keyboard: vec![vec![InlineButton {
                    text: &button.text,
                    url: &button.url,
                }]],
            }),
        };
        self.post("sendMessage", &payload).await
    }

    async fn send_photo(&self, chat_id: &str, photo_url: &str) -> Result<()> {
        let payload = PhotoPayload {
            chat_id,
            photo: photo_url,
        };
        self.post("sendPhoto", &payload).await
    }
}

/// Cuts `message` to Telegram's limit on a char boundary, marking the cut with `...`.
fn truncate_message(mut message: String) -> String {
    if message.len() <= TELEGRAM_MESSAGE_LIMIT {
        return message;
    }
    let mut cut = TELEGRAM_MESSAGE_LIMIT - 3;
    while !message.is_char_boundary(cut) {
        cut -= 1;
    }
    message.truncate(cut);
    message.push_str("...");
    message
}
