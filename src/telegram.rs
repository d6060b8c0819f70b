//! Telegram Bot API long-poll listener. Feeds channel posts and messages
//! from allowed chats into the pipeline queue.

use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, TelegramConfig};
use crate::model::InboundMessage;

const ERROR_BACKOFF: Duration = Duration::from_secs(2);
const HTTP_GRACE: Duration = Duration::from_secs(5);
const ALLOWED_UPDATES: &str = r#"["message","channel_post"]"#;

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Network error: {0}")]
    Network(reqwest::Error),
    #[error("Bot API error: {0}")]
    Api(String),
}

// Request URLs embed the bot token.
impl From<reqwest::Error> for TelegramError {
    fn from(e: reqwest::Error) -> Self {
        TelegramError::Network(e.without_url())
    }
}

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    message: Option<ChatMessage>,
    #[serde(default)]
    channel_post: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    message_id: i64,
    date: i64,
    #[serde(default)]
    chat: Option<Chat>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

/// Convert an update into an inbound message, or `None` when it should be skipped.
/// Channel posts win over plain messages.
pub fn to_inbound(update: &Update, allowed_chats: &HashSet<i64>) -> Option<InboundMessage> {
    let post = update.channel_post.as_ref().or(update.message.as_ref())?;
    let chat = post.chat.as_ref()?;
    let text = post.text.as_deref().filter(|t| !t.trim().is_empty())?;

    if !allowed_chats.is_empty() && !allowed_chats.contains(&chat.id) {
        debug!(chat_id = chat.id, "update from chat outside allow-list");
        return None;
    }

    let timestamp = Utc.timestamp_opt(post.date, 0).single()?;
    Some(InboundMessage::new(post.message_id, text, timestamp).with_chat(chat.id))
}

pub struct TelegramListener {
    client: Client,
    updates_url: String,
    allowed_chats: HashSet<i64>,
    poll_timeout: Duration,
    batch: u32,
    offset: i64,
}

impl TelegramListener {
    pub fn new(config: &TelegramConfig, bot_token: &str) -> Result<Self, ConfigError> {
        let poll_timeout = Duration::from_secs(config.poll_timeout_seconds);
        let client = Client::builder()
            .timeout(poll_timeout + HTTP_GRACE)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("telegram http client: {}", e)))?;

        Ok(Self {
            client,
            updates_url: format!(
                "{}/bot{}/getUpdates",
                config.api_base.trim_end_matches('/'),
                bot_token
            ),
            allowed_chats: config.allowed_chat_ids.iter().copied().collect(),
            poll_timeout,
            batch: config.max_update_batch,
            offset: 0,
        })
    }

    /// Poll until the receiving side of `tx` is dropped.
    pub async fn run(mut self, tx: mpsc::Sender<InboundMessage>) {
        info!(
            allowed_chats = self.allowed_chats.len(),
            poll_timeout_secs = self.poll_timeout.as_secs(),
            "📡 Telegram listener started"
        );

        loop {
            let fetched = tokio::select! {
                _ = tx.closed() => break,
                res = self.fetch() => res,
            };

            let updates = match fetched {
                Ok(updates) => updates,
                Err(e) => {
                    warn!("Telegram getUpdates failed: {}", e);
                    tokio::time::sleep(ERROR_BACKOFF).await;
                    continue;
                }
            };

            for update in updates {
                self.offset = self.offset.max(update.update_id + 1);
                if let Some(message) = to_inbound(&update, &self.allowed_chats) {
                    if tx.send(message).await.is_err() {
                        info!("Pipeline queue closed, stopping Telegram listener");
                        return;
                    }
                }
            }
        }

        info!("Telegram listener stopped");
    }

    async fn fetch(&self) -> Result<Vec<Update>, TelegramError> {
        let resp = self
            .client
            .get(&self.updates_url)
            .query(&[
                ("offset", self.offset.to_string()),
                ("timeout", self.poll_timeout.as_secs().to_string()),
                ("limit", self.batch.to_string()),
                ("allowed_updates", ALLOWED_UPDATES.to_string()),
            ])
            .send()
            .await?;

        let body: UpdatesResponse = resp.json().await?;
        if !body.ok {
            return Err(TelegramError::Api(
                body.description.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(body.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn updates(raw: &str) -> Vec<Update> {
        serde_json::from_str::<UpdatesResponse>(raw).unwrap().result
    }

    const FIXTURE: &str = r#"{
        "ok": true,
        "result": [
            {"update_id": 10, "channel_post": {"message_id": 501, "date": 1710000000,
                "chat": {"id": -1001}, "text": "MEGA PUMP SIGNAL"}},
            {"update_id": 11, "message": {"message_id": 502, "date": 1710000001,
                "chat": {"id": 42}, "text": "hello"}},
            {"update_id": 12, "message": {"message_id": 503, "date": 1710000002,
                "chat": {"id": 42}}},
            {"update_id": 13, "edited_message": {"message_id": 504, "date": 1710000003,
                "chat": {"id": 42}, "text": "edited"}}
        ]
    }"#;

    #[test]
    fn test_extracts_posts_and_skips_empty() {
        let all = HashSet::new();
        let messages: Vec<_> = updates(FIXTURE)
            .iter()
            .filter_map(|u| to_inbound(u, &all))
            .collect();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, 501);
        assert_eq!(messages[0].chat_id, Some(-1001));
        assert_eq!(messages[0].timestamp.timestamp(), 1_710_000_000);
        assert_eq!(messages[1].text, "hello");
    }

    #[test]
    fn test_allow_list_filters_chats() {
        let allowed: HashSet<i64> = [-1001].into_iter().collect();
        let messages: Vec<_> = updates(FIXTURE)
            .iter()
            .filter_map(|u| to_inbound(u, &allowed))
            .collect();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].chat_id, Some(-1001));
    }

    #[test]
    fn test_channel_post_preferred_over_message() {
        let raw = r#"{"ok": true, "result": [{"update_id": 1,
            "message": {"message_id": 1, "date": 1, "chat": {"id": 5}, "text": "from message"},
            "channel_post": {"message_id": 2, "date": 1, "chat": {"id": 6}, "text": "from channel"}}]}"#;
        let msg = to_inbound(&updates(raw)[0], &HashSet::new()).unwrap();
        assert_eq!(msg.text, "from channel");
        assert_eq!(msg.chat_id, Some(6));
    }

    #[tokio::test]
    async fn test_listener_forwards_and_stops_when_queue_closes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/botTEST-TOKEN/getUpdates"))
            .and(query_param("allowed_updates", ALLOWED_UPDATES))
            .respond_with(ResponseTemplate::new(200).set_body_string(FIXTURE))
            .mount(&server)
            .await;

        let config = TelegramConfig {
            enabled: true,
            allowed_chat_ids: vec![-1001],
            poll_timeout_seconds: 1,
            api_base: server.uri(),
            ..TelegramConfig::default()
        };
        let listener = TelegramListener::new(&config, "TEST-TOKEN").unwrap();

        let (tx, mut rx) = mpsc::channel(4);
        let handle = tokio::spawn(listener.run(tx));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.id, 501);
        assert_eq!(first.text, "MEGA PUMP SIGNAL");

        drop(rx);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("listener should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_network_error_hides_bot_token() {
        let config = TelegramConfig {
            api_base: "http://127.0.0.1:1".to_string(),
            ..TelegramConfig::default()
        };
        let listener = TelegramListener::new(&config, "123456:SECRET-BOT-TOKEN").unwrap();

        let err = listener.fetch().await.unwrap_err();
        assert!(matches!(err, TelegramError::Network(_)));
        let rendered = format!("{} {:?}", err, err);
        assert!(!rendered.contains("SECRET-BOT-TOKEN"));
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"ok": false, "description": "Unauthorized"}"#),
            )
            .mount(&server)
            .await;

        let config = TelegramConfig {
            api_base: server.uri(),
            ..TelegramConfig::default()
        };
        let listener = TelegramListener::new(&config, "bad").unwrap();
        let err = listener.fetch().await.unwrap_err();
        assert!(matches!(err, TelegramError::Api(ref msg) if msg == "Unauthorized"));
    }
}
