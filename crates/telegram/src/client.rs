use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use pricepost_core::config::TelegramConfig;
use pricepost_core::domain::chat::{ChatId, InlineKeyboard};
use pricepost_core::domain::directory::MessageId;
use pricepost_core::errors::DeliveryError;
use pricepost_core::ports::MessagingClient;
use pricepost_core::retry::{retry_with_backoff, RetryError, RetryPolicy, Retryable};
use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::api::{ApiResponse, BotApi};

/// Added on top of the wait the API asks for.
const RATE_LIMIT_PADDING: Duration = Duration::from_secs(1);
const NOT_MODIFIED: &str = "message is not modified";

const RETRY_AFTER_PATTERN: &str = r"(?i)retry after (\d+)";

/// `None` if the pattern fails to compile; descriptions are then not scanned.
fn retry_after_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(RETRY_AFTER_PATTERN).ok()).as_ref()
}

/// Mandated wait of a rate-limited response, if it is one.
pub fn rate_limit_wait(response: &ApiResponse) -> Option<Duration> {
    if response.ok {
        return None;
    }
    if let Some(seconds) = response.parameters.as_ref().and_then(|parameters| parameters.retry_after) {
        return Some(Duration::from_secs(seconds));
    }
    let description = response.description.as_deref()?;
    let seconds = retry_after_pattern()?.captures(description)?.get(1)?.as_str().parse().ok()?;
    Some(Duration::from_secs(seconds))
}

#[derive(Debug)]
enum CallFailure {
    RateLimited { wait: Duration, description: String },
    Api(String),
    Transport(String),
}

impl fmt::Display for CallFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited { wait, description } => {
                write!(f, "rate limited for {}s: {description}", wait.as_secs())
            }
            Self::Api(description) => f.write_str(description),
            Self::Transport(message) => f.write_str(message),
        }
    }
}

fn classify(failure: &CallFailure) -> Retryable {
    match failure {
        CallFailure::RateLimited { wait, .. } => Retryable::After(*wait),
        CallFailure::Api(_) | CallFailure::Transport(_) => Retryable::No,
    }
}

/// [`MessagingClient`] over the Bot API. Rate-limited calls sleep for the mandated
/// wait and are retried; any other failure is returned to the caller at once.
pub struct TelegramClient {
    api: Arc<dyn BotApi>,
    policy: RetryPolicy,
}

impl TelegramClient {
    pub fn new(api: Arc<dyn BotApi>, max_attempts: u32) -> Self {
        Self { api, policy: RetryPolicy::mandated(max_attempts, RATE_LIMIT_PADDING) }
    }

    pub fn from_config(api: Arc<dyn BotApi>, config: &TelegramConfig) -> Self {
        Self::new(api, config.max_attempts)
    }

    async fn call(&self, method: &'static str, payload: Value) -> Result<Option<Value>, DeliveryError> {
        let api = &self.api;
        let payload = &payload;
        let outcome = retry_with_backoff(
            method,
            &self.policy,
            move |attempt| async move {
                debug!(event_name = "telegram.api.call", method, attempt, "calling bot api");
                let response = match api.call(method, payload).await {
                    Ok(response) => response,
                    Err(error) => return Err(CallFailure::Transport(error.to_string())),
                };
                if response.ok {
                    return Ok(response.result);
                }
                match rate_limit_wait(&response) {
                    Some(wait) => Err(CallFailure::RateLimited {
                        wait,
                        description: response.description().to_owned(),
                    }),
                    None => Err(CallFailure::Api(response.description().to_owned())),
                }
            },
            classify,
        )
        .await;

        outcome.map_err(|retry_error| {
            let error = match retry_error {
                RetryError::Exhausted { attempts, last: CallFailure::RateLimited { .. } } => {
                    DeliveryError::RateLimited { method: method.to_owned(), attempts }
                }
                other => match other.into_inner() {
                    CallFailure::Transport(message) => {
                        DeliveryError::Transport { method: method.to_owned(), message }
                    }
                    CallFailure::Api(description)
                    | CallFailure::RateLimited { description, .. } => {
                        DeliveryError::Api { method: method.to_owned(), description }
                    }
                },
            };
            warn!(event_name = "telegram.api.failed", method, error = %error, "bot api call failed");
            error
        })
    }
}

#[async_trait]
impl MessagingClient for TelegramClient {
    async fn send(
        &self,
        chat: &ChatId,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<MessageId, DeliveryError> {
        let mut payload = json!({
            "chat_id": chat.as_str(),
            "text": text,
            "parse_mode": "HTML",
        });
        if let Some(keyboard) = keyboard {
            payload["reply_markup"] = json!(keyboard);
        }

        let result = self.call("sendMessage", payload).await?;
        result
            .as_ref()
            .and_then(|message| message.get("message_id"))
            .and_then(Value::as_i64)
            .map(MessageId)
            .ok_or_else(|| DeliveryError::UnexpectedResult {
                method: "sendMessage".to_owned(),
                message: "result carries no message_id".to_owned(),
            })
    }

    async fn edit(&self, chat: &ChatId, message_id: MessageId, text: &str) -> Result<(), DeliveryError> {
        let payload = json!({
            "chat_id": chat.as_str(),
            "message_id": message_id,
            "text": text,
            "parse_mode": "HTML",
        });
        match self.call("editMessageText", payload).await {
            Ok(_) => Ok(()),
            Err(DeliveryError::Api { description, .. }) if description.contains(NOT_MODIFIED) => {
                debug!(
                    event_name = "telegram.edit.unchanged",
                    message_id = %message_id,
                    "message already has this content"
                );
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    async fn delete(&self, chat: &ChatId, message_id: MessageId) -> Result<(), DeliveryError> {
        let payload = json!({ "chat_id": chat.as_str(), "message_id": message_id });
        self.call("deleteMessage", payload).await.map(|_| ())
    }

    async fn pin(&self, chat: &ChatId, message_id: MessageId) -> Result<(), DeliveryError> {
        let payload = json!({
            "chat_id": chat.as_str(),
            "message_id": message_id,
            "disable_notification": true,
        });
        self.call("pinChatMessage", payload).await.map(|_| ())
    }

    async fn unpin(&self, chat: &ChatId, message_id: MessageId) -> Result<(), DeliveryError> {
        let payload = json!({ "chat_id": chat.as_str(), "message_id": message_id });
        self.call("unpinChatMessage", payload).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use pricepost_core::domain::chat::{ChatId, InlineKeyboard, LinkButton};
    use pricepost_core::domain::directory::MessageId;
    use pricepost_core::errors::DeliveryError;
    use pricepost_core::ports::MessagingClient;
    use serde_json::{json, Value};
    use tokio::sync::Mutex;

    use super::{rate_limit_wait, retry_after_pattern, TelegramClient};
    use crate::api::{ApiResponse, BotApi, ResponseParameters, TransportError};

    #[derive(Default)]
    struct ScriptedBotApi {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        responses: VecDeque<Result<ApiResponse, TransportError>>,
        calls: Vec<(String, Value)>,
    }

    impl ScriptedBotApi {
        fn with_script(responses: Vec<Result<ApiResponse, TransportError>>) -> Self {
            Self {
                state: Mutex::new(ScriptedState { responses: responses.into(), calls: Vec::new() }),
            }
        }

        async fn calls(&self) -> Vec<(String, Value)> {
            self.state.lock().await.calls.clone()
        }
    }

    #[async_trait]
    impl BotApi for ScriptedBotApi {
        async fn call(&self, method: &str, payload: &Value) -> Result<ApiResponse, TransportError> {
            let mut state = self.state.lock().await;
            state.calls.push((method.to_owned(), payload.clone()));
            state.responses.pop_front().unwrap_or_else(|| Ok(ok(json!(true))))
        }
    }

    fn ok(result: Value) -> ApiResponse {
        ApiResponse { ok: true, result: Some(result), ..Default::default() }
    }

    fn failure(code: i64, description: &str) -> ApiResponse {
        ApiResponse {
            ok: false,
            error_code: Some(code),
            description: Some(description.to_owned()),
            ..Default::default()
        }
    }

    fn chat() -> ChatId {
        ChatId::new("@prices")
    }

    #[tokio::test]
    async fn send_posts_html_with_keyboard_and_returns_message_id() {
        let api = Arc::new(ScriptedBotApi::with_script(vec![Ok(ok(json!({ "message_id": 321 })))]));
        let client = TelegramClient::new(api.clone(), 5);
        let keyboard = InlineKeyboard::one_per_row([LinkButton {
            text: "Phones".to_owned(),
            url: "https://t.me/prices/10".to_owned(),
        }]);

        let message_id = client.send(&chat(), "<b>hi</b>", Some(&keyboard)).await.expect("send");

        assert_eq!(message_id, MessageId(321));
        let calls = api.calls().await;
        assert_eq!(calls[0].0, "sendMessage");
        assert_eq!(calls[0].1["parse_mode"], "HTML");
        assert_eq!(calls[0].1["chat_id"], "@prices");
        assert_eq!(
            calls[0].1["reply_markup"],
            json!({ "inline_keyboard": [[{ "text": "Phones", "url": "https://t.me/prices/10" }]] })
        );
    }

    #[tokio::test]
    async fn send_without_keyboard_omits_reply_markup() {
        let api = Arc::new(ScriptedBotApi::with_script(vec![Ok(ok(json!({ "message_id": 1 })))]));
        let client = TelegramClient::new(api.clone(), 5);

        client.send(&chat(), "text", None).await.expect("send");

        assert!(api.calls().await[0].1.get("reply_markup").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_call_waits_and_retries() {
        let api = Arc::new(ScriptedBotApi::with_script(vec![
            Ok(failure(429, "Too Many Requests: retry after 3")),
            Ok(ok(json!(true))),
        ]));
        let client = TelegramClient::new(api.clone(), 5);
        let started = tokio::time::Instant::now();

        client.pin(&chat(), MessageId(9)).await.expect("pin after retry");

        assert_eq!(api.calls().await.len(), 2);
        assert!(started.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_gives_up_after_max_attempts() {
        let script = (0..6).map(|_| Ok(failure(429, "Too Many Requests: retry after 1"))).collect();
        let api = Arc::new(ScriptedBotApi::with_script(script));
        let client = TelegramClient::new(api.clone(), 5);

        let error = client.edit(&chat(), MessageId(9), "text").await.expect_err("exhausted");

        assert_eq!(
            error,
            DeliveryError::RateLimited { method: "editMessageText".to_owned(), attempts: 5 }
        );
        assert_eq!(api.calls().await.len(), 5);
    }

    #[tokio::test]
    async fn api_errors_are_not_retried() {
        let api = Arc::new(ScriptedBotApi::with_script(vec![Ok(failure(
            400,
            "Bad Request: message to delete not found",
        ))]));
        let client = TelegramClient::new(api.clone(), 5);

        let error = client.delete(&chat(), MessageId(9)).await.expect_err("rejected");

        assert!(matches!(error, DeliveryError::Api { ref method, .. } if method == "deleteMessage"));
        assert_eq!(api.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn transport_errors_are_not_retried() {
        let api = Arc::new(ScriptedBotApi::with_script(vec![Err(TransportError::Request(
            "connection reset".to_owned(),
        ))]));
        let client = TelegramClient::new(api.clone(), 5);

        let error = client.unpin(&chat(), MessageId(9)).await.expect_err("transport");

        assert!(matches!(error, DeliveryError::Transport { .. }));
        assert_eq!(api.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn unchanged_edit_counts_as_success() {
        let api = Arc::new(ScriptedBotApi::with_script(vec![Ok(failure(
            400,
            "Bad Request: message is not modified: specified new message content and reply markup are exactly the same",
        ))]));
        let client = TelegramClient::new(api.clone(), 5);

        client.edit(&chat(), MessageId(9), "same text").await.expect("not modified is fine");
    }

    #[tokio::test]
    async fn send_without_message_id_is_unexpected() {
        let api = Arc::new(ScriptedBotApi::with_script(vec![Ok(ok(json!(true)))]));
        let client = TelegramClient::new(api.clone(), 5);

        let error = client.send(&chat(), "text", None).await.expect_err("no id");

        assert!(matches!(error, DeliveryError::UnexpectedResult { .. }));
    }

    #[test]
    fn retry_after_pattern_compiles_and_ignores_case() {
        let pattern = retry_after_pattern().expect("pattern compiles");
        let captures = pattern.captures("Too Many Requests: Retry After 7").expect("match");
        assert_eq!(&captures[1], "7");
    }

    #[test]
    fn rate_limit_wait_prefers_parameters_and_falls_back_to_description() {
        let mut response = failure(429, "Too Many Requests: retry after 12");
        assert_eq!(rate_limit_wait(&response), Some(Duration::from_secs(12)));

        response.parameters = Some(ResponseParameters { retry_after: Some(30) });
        assert_eq!(rate_limit_wait(&response), Some(Duration::from_secs(30)));

        assert_eq!(rate_limit_wait(&failure(429, "Too Many Requests")), None);
        assert_eq!(rate_limit_wait(&failure(400, "Bad Request: chat not found")), None);
        assert_eq!(rate_limit_wait(&ok(json!(true))), None);
    }
}
