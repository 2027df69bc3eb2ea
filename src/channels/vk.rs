//! VK community channel: long-polls the Bots Long Poll API for messages
//! and replies with `messages.send`.

use async_trait::async_trait;
use serde::Deserialize;

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingMessage};
use crate::error::{ApiError, ChannelError};
use crate::vk::VkApi;

/// Pause after a failed long-poll request before trying again.
const POLL_RETRY_DELAY: std::time::Duration = std::time::Duration::from_secs(5);

/// VK channel: connects to a community's Bots Long Poll server.
pub struct VkChannel {
    api: VkApi,
    group_id: u64,
    wait_secs: u64,
}

impl VkChannel {
    pub fn new(api: VkApi, group_id: u64, wait: std::time::Duration) -> Self {
        Self {
            api,
            group_id,
            wait_secs: wait.as_secs().max(1),
        }
    }
}

/// Credentials of a long-poll session.
#[derive(Debug, Clone, Deserialize)]
struct LongPollServer {
    key: String,
    server: String,
    #[serde(deserialize_with = "string_or_number")]
    ts: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value_to_string(&value))
}

fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

async fn fetch_server(api: &VkApi, group_id: u64) -> Result<LongPollServer, ApiError> {
    api.call(
        "groups.getLongPollServer",
        &[("group_id", group_id.to_string())],
    )
    .await
}

/// What a long-poll response asks the poller to do next.
#[derive(Debug, PartialEq, Eq)]
enum PollOutcome {
    /// New events; continue from `ts`.
    Updates {
        ts: String,
        messages: Vec<IncomingMessage>,
    },
    /// Event history was lost; continue from `ts`.
    Resync { ts: String },
    /// Key expired or session lost; request a new server.
    Reconnect,
}

fn parse_poll_response(body: &serde_json::Value) -> PollOutcome {
    if let Some(failed) = body.get("failed").and_then(serde_json::Value::as_i64) {
        return match (failed, body.get("ts")) {
            (1, Some(ts)) => PollOutcome::Resync {
                ts: value_to_string(ts),
            },
            _ => PollOutcome::Reconnect,
        };
    }

    let Some(ts) = body.get("ts").map(value_to_string) else {
        return PollOutcome::Reconnect;
    };

    let messages = body
        .get("updates")
        .and_then(serde_json::Value::as_array)
        .map(|updates| updates.iter().filter_map(parse_update).collect())
        .unwrap_or_default();

    PollOutcome::Updates { ts, messages }
}

/// Decode a `message_new` update. Other update types are skipped.
fn parse_update(update: &serde_json::Value) -> Option<IncomingMessage> {
    if update.get("type").and_then(serde_json::Value::as_str) != Some("message_new") {
        return None;
    }

    let object = update.get("object")?;
    // API >= 5.103 nests the message; older versions put it inline.
    let message = object.get("message").unwrap_or(object);

    let from_id = message.get("from_id").and_then(serde_json::Value::as_i64)?;
    let peer_id = message
        .get("peer_id")
        .and_then(serde_json::Value::as_i64)
        .unwrap_or(from_id);
    let text = message
        .get("text")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default();
    let outgoing = message
        .get("out")
        .and_then(serde_json::Value::as_i64)
        .unwrap_or(0)
        != 0;

    Some(
        IncomingMessage::new("vk", from_id, text)
            .with_directed_at_bot(!outgoing && peer_id == from_id),
    )
}

// ── Channel trait implementation ────────────────────────────────────

#[async_trait]
impl Channel for VkChannel {
    fn name(&self) -> &str {
        "vk"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let mut session = fetch_server(&self.api, self.group_id).await.map_err(|e| {
            ChannelError::StartupFailed {
                name: "vk".into(),
                reason: e.to_string(),
            }
        })?;

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let api = self.api.clone();
        let group_id = self.group_id;
        let wait = self.wait_secs.to_string();

        tokio::spawn(async move {
            tracing::info!(group_id, "VK channel listening for messages...");

            loop {
                let resp = match api
                    .http()
                    .get(&session.server)
                    .query(&[
                        ("act", "a_check"),
                        ("key", session.key.as_str()),
                        ("ts", session.ts.as_str()),
                        ("wait", wait.as_str()),
                    ])
                    .send()
                    .await
                {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("VK poll error: {e}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                let body: serde_json::Value = match resp.json().await {
                    Ok(b) => b,
                    Err(e) => {
                        tracing::warn!("VK poll parse error: {e}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                match parse_poll_response(&body) {
                    PollOutcome::Updates { ts, messages } => {
                        session.ts = ts;
                        for message in messages {
                            if tx.send(message).is_err() {
                                tracing::info!("VK listener channel closed");
                                return;
                            }
                        }
                    }
                    PollOutcome::Resync { ts } => {
                        tracing::debug!("VK long poll history lost, resyncing");
                        session.ts = ts;
                    }
                    PollOutcome::Reconnect => {
                        tracing::debug!("VK long poll key expired, reconnecting");
                        match fetch_server(&api, group_id).await {
                            Ok(fresh) => session = fresh,
                            Err(e) => {
                                tracing::warn!("VK long poll reconnect failed: {e}");
                                tokio::time::sleep(POLL_RETRY_DELAY).await;
                            }
                        }
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn send(&self, message: OutgoingMessage) -> Result<(), ChannelError> {
        let mut params = vec![
            ("user_id", message.user_id.to_string()),
            ("message", message.text),
            ("random_id", rand::random::<i32>().to_string()),
        ];
        if let Some(keyboard) = &message.keyboard {
            params.push(("keyboard", keyboard.to_json()));
        }
        if let Some(attachment) = message.attachment {
            params.push(("attachment", attachment));
        }

        self.api
            .call::<serde_json::Value>("messages.send", &params)
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "vk".into(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        self.api
            .call::<serde_json::Value>("groups.getById", &[("group_id", self.group_id.to_string())])
            .await
            .map(|_| ())
            .map_err(|e| ChannelError::StartupFailed {
                name: "vk".into(),
                reason: e.to_string(),
            })
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("VK channel shutting down");
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{Button, ButtonColor, Keyboard};
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn channel(server: &MockServer) -> VkChannel {
        let api = VkApi::new(SecretString::from("group-token"), "5.131").with_base_url(server.uri());
        VkChannel::new(api, 42, std::time::Duration::from_secs(1))
    }

    // ── Update parsing ──────────────────────────────────────────────

    #[test]
    fn parses_private_message() {
        let body = json!({
            "ts": "12",
            "updates": [{
                "type": "message_new",
                "object": {"message": {"from_id": 7, "peer_id": 7, "text": "Да", "out": 0}}
            }]
        });
        let outcome = parse_poll_response(&body);
        assert_eq!(
            outcome,
            PollOutcome::Updates {
                ts: "12".into(),
                messages: vec![IncomingMessage::new("vk", 7, "Да")],
            }
        );
    }

    #[test]
    fn chat_messages_are_not_directed_at_bot() {
        let update = json!({
            "type": "message_new",
            "object": {"message": {"from_id": 7, "peer_id": 2000000001, "text": "hi"}}
        });
        let msg = parse_update(&update).unwrap();
        assert!(!msg.directed_at_bot);
    }

    #[test]
    fn outgoing_messages_are_not_directed_at_bot() {
        let update = json!({
            "type": "message_new",
            "object": {"message": {"from_id": 7, "peer_id": 7, "text": "echo", "out": 1}}
        });
        assert!(!parse_update(&update).unwrap().directed_at_bot);
    }

    #[test]
    fn legacy_inline_message_object() {
        let update = json!({
            "type": "message_new",
            "object": {"from_id": 3, "peer_id": 3, "text": "нет"}
        });
        let msg = parse_update(&update).unwrap();
        assert_eq!(msg.user_id, 3);
        assert_eq!(msg.text, "нет");
    }

    #[test]
    fn other_update_types_are_skipped() {
        let update = json!({"type": "message_typing_state", "object": {"from_id": 1}});
        assert!(parse_update(&update).is_none());
    }

    #[test]
    fn numeric_ts_is_accepted() {
        let outcome = parse_poll_response(&json!({"ts": 99, "updates": []}));
        assert_eq!(
            outcome,
            PollOutcome::Updates {
                ts: "99".into(),
                messages: vec![]
            }
        );
    }

    #[test]
    fn failed_one_resyncs() {
        let outcome = parse_poll_response(&json!({"failed": 1, "ts": "30"}));
        assert_eq!(outcome, PollOutcome::Resync { ts: "30".into() });
    }

    #[test]
    fn failed_two_and_three_reconnect() {
        assert_eq!(parse_poll_response(&json!({"failed": 2})), PollOutcome::Reconnect);
        assert_eq!(parse_poll_response(&json!({"failed": 3})), PollOutcome::Reconnect);
    }

    // ── API calls ───────────────────────────────────────────────────

    #[tokio::test]
    async fn send_includes_keyboard_and_attachment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages.send"))
            .and(body_string_contains("user_id=7"))
            .and(body_string_contains("keyboard="))
            .and(body_string_contains("attachment=photo1_2"))
            .and(body_string_contains("random_id="))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let msg = OutgoingMessage::text(7, "hello")
            .with_keyboard(Keyboard::column(vec![Button::text("Да", ButtonColor::Positive)]))
            .with_attachment("photo1_2");
        channel(&server).send(msg).await.unwrap();
    }

    #[tokio::test]
    async fn send_failure_is_channel_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages.send"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": {"error_code": 901, "error_msg": "Can't send messages for users without permission"}
            })))
            .mount(&server)
            .await;

        let err = channel(&server)
            .send(OutgoingMessage::text(7, "hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::SendFailed { .. }));
    }

    #[tokio::test]
    async fn start_fails_without_long_poll_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/groups.getLongPollServer"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": {"error_code": 100, "error_msg": "group_id is undefined"}
            })))
            .mount(&server)
            .await;

        let result = channel(&server).start().await;
        assert!(matches!(result, Err(ChannelError::StartupFailed { .. })));
    }

    #[tokio::test]
    async fn start_streams_long_poll_messages() {
        use futures::StreamExt;

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/groups.getLongPollServer"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": {"key": "k", "server": format!("{}/poll", server.uri()), "ts": "1"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/poll"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ts": "2",
                "updates": [{
                    "type": "message_new",
                    "object": {"message": {"from_id": 5, "peer_id": 5, "text": "Привет"}}
                }]
            })))
            .mount(&server)
            .await;

        let mut stream = channel(&server).start().await.unwrap();
        let msg = tokio::time::timeout(std::time::Duration::from_secs(5), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.user_id, 5);
        assert_eq!(msg.text, "Привет");
        assert!(msg.directed_at_bot);
    }

    #[tokio::test]
    async fn health_check_calls_get_by_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/groups.getById"))
            .and(body_string_contains("group_id=42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": [{"id": 42}]})))
            .mount(&server)
            .await;

        channel(&server).health_check().await.unwrap();
    }
}
