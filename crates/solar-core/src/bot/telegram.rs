//! Telegram Bot API client
//!
//! Long polling is not used: every `getUpdates` returns immediately so the
//! monitor loop keeps its pace.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use log::{error, warn};
use serde::{Deserialize, Serialize};

use super::{BotError, BotTransport, CommandMessage, Update};
use crate::app_state::FromTruncated;
use crate::config::BotConfig;
use crate::net::Connector;
use crate::net::http::{self, Request, Response};

pub const TELEGRAM_HOST: &str = "api.telegram.org";
pub const TELEGRAM_PORT: u16 = 443;

const JSON_CONTENT_TYPE: &str = "application/json";
const MAX_RESPONSE_LEN: usize = 8 * 1024;

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Deserialize)]
struct ApiUpdate {
    update_id: i64,
    #[serde(default)]
    message: Option<ApiMessage>,
}

#[derive(Deserialize)]
struct ApiMessage {
    chat: ApiChat,
    #[serde(default)]
    from: Option<ApiUser>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiChat {
    id: i64,
}

#[derive(Deserialize)]
struct ApiUser {
    #[serde(default)]
    first_name: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

impl From<ApiUpdate> for Update {
    fn from(update: ApiUpdate) -> Self {
        let message = update.message.and_then(|message| {
            let text = message.text?;
            Some(CommandMessage {
                chat_id: message.chat.id.to_string(),
                sender_name: message.from.map(|user| user.first_name).unwrap_or_default(),
                text,
            })
        });
        Update {
            id: update.update_id,
            message,
        }
    }
}

/// Unwrap the `{ "ok": .., "result": .. }` envelope.
fn decode_envelope<T: for<'de> Deserialize<'de>>(response: &Response) -> Result<Option<T>, BotError> {
    let envelope: ApiResponse<T> = match serde_json::from_slice(&response.body) {
        Ok(envelope) => envelope,
        Err(_) if !response.is_success() => return Err(BotError::Status(response.status)),
        Err(e) => {
            error!("Bot API response did not parse: {}", e);
            return Err(BotError::Decode);
        }
    };

    if !envelope.ok {
        let description = envelope.description.as_deref().unwrap_or("request failed");
        warn!("Bot API error {}: {}", response.status, description);
        return Err(BotError::Api(FromTruncated::from_truncated(description)));
    }
    if !response.is_success() {
        return Err(BotError::Status(response.status));
    }
    Ok(envelope.result)
}

/// Decode a `getUpdates` response.
pub fn decode_updates(response: &Response) -> Result<Vec<Update>, BotError> {
    let updates: Option<Vec<ApiUpdate>> = decode_envelope(response)?;
    Ok(updates.unwrap_or_default().into_iter().map(Update::from).collect())
}

pub struct TelegramClient<'a, C> {
    connector: C,
    token: &'a str,
    update_limit: u8,
}

impl<'a, C: Connector> TelegramClient<'a, C> {
    pub fn new(connector: C, config: &BotConfig<'a>) -> Self {
        Self {
            connector,
            token: config.token,
            update_limit: config.update_limit.max(1),
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    async fn call(&mut self, request: &Request<'_>) -> Result<Response, BotError> {
        let response = http::exchange(
            &mut self.connector,
            TELEGRAM_HOST,
            TELEGRAM_PORT,
            request,
            MAX_RESPONSE_LEN,
        )
        .await?;
        Ok(response)
    }
}

impl<C: Connector> BotTransport for TelegramClient<'_, C> {
    async fn get_updates(&mut self, offset: i64) -> Result<Vec<Update>, BotError> {
        let path = format!(
            "/bot{}/getUpdates?offset={}&limit={}",
            self.token, offset, self.update_limit
        );
        let response = self.call(&Request::get(&path)).await?;
        decode_updates(&response)
    }

    async fn send_message(&mut self, chat_id: &str, text: &str) -> Result<(), BotError> {
        let path = format!("/bot{}/sendMessage", self.token);
        let body = serde_json::to_vec(&SendMessage { chat_id, text }).map_err(|_| BotError::Decode)?;
        let response = self
            .call(&Request::post(&path, JSON_CONTENT_TYPE, &body))
            .await?;
        decode_envelope::<serde::de::IgnoredAny>(&response).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockConnector;
    use embassy_futures::block_on;

    fn ok_response(body: &str) -> Response {
        Response {
            status: 200,
            body: body.as_bytes().to_vec(),
        }
    }

    fn http_reply(status: &str, body: &str) -> Vec<u8> {
        format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
            status,
            body.len(),
            body
        )
        .into_bytes()
    }

    fn client(connector: MockConnector) -> TelegramClient<'static, MockConnector> {
        let config = BotConfig {
            token: "123:ABC",
            authorized_chat_id: "1001",
            ..BotConfig::default()
        };
        TelegramClient::new(connector, &config)
    }

    #[test]
    fn test_decode_text_update() {
        let response = ok_response(
            r#"{"ok":true,"result":[{"update_id":77,"message":{"message_id":3,
            "from":{"id":1001,"is_bot":false,"first_name":"Asha"},
            "chat":{"id":1001,"type":"private"},"date":1700000000,"text":"/status"}}]}"#,
        );

        let updates = decode_updates(&response).unwrap();

        assert_eq!(
            updates,
            [Update {
                id: 77,
                message: Some(CommandMessage {
                    chat_id: "1001".into(),
                    sender_name: "Asha".into(),
                    text: "/status".into(),
                }),
            }]
        );
    }

    #[test]
    fn test_decode_keeps_non_text_updates() {
        let response = ok_response(
            r#"{"ok":true,"result":[
                {"update_id":5,"edited_message":{"text":"x"}},
                {"update_id":6,"message":{"chat":{"id":-42},"sticker":{}}},
                {"update_id":7,"message":{"chat":{"id":-42},"text":"/start"}}]}"#,
        );

        let updates = decode_updates(&response).unwrap();

        assert_eq!(updates.len(), 3);
        assert_eq!(updates[0].message, None);
        assert_eq!(updates[1].message, None);
        let last = updates[2].message.as_ref().unwrap();
        assert_eq!(last.chat_id, "-42");
        assert_eq!(last.sender_name, "");
    }

    #[test]
    fn test_decode_api_error() {
        let response = Response {
            status: 401,
            body: br#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#.to_vec(),
        };

        match decode_updates(&response) {
            Err(BotError::Api(description)) => assert_eq!(description.as_str(), "Unauthorized"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_non_json_error_page() {
        let response = Response {
            status: 502,
            body: b"<html>Bad Gateway</html>".to_vec(),
        };
        assert_eq!(decode_updates(&response), Err(BotError::Status(502)));
        assert_eq!(decode_updates(&ok_response("garbage")), Err(BotError::Decode));
    }

    #[test]
    fn test_get_updates_request() {
        let mut connector = MockConnector::new();
        connector.push_reply(&http_reply("200 OK", r#"{"ok":true,"result":[]}"#));
        let mut client = client(connector);

        let updates = block_on(client.get_updates(78)).unwrap();

        assert!(updates.is_empty());
        let connector = client.connector();
        assert_eq!(connector.connected_to()[0], (String::from(TELEGRAM_HOST), 443));
        assert!(connector.sent()[0].starts_with(
            "GET /bot123:ABC/getUpdates?offset=78&limit=1 HTTP/1.1\r\nHost: api.telegram.org\r\n"
        ));
    }

    #[test]
    fn test_send_message_posts_json() {
        let mut connector = MockConnector::new();
        connector.push_reply(&http_reply("200 OK", r#"{"ok":true,"result":{"message_id":9}}"#));
        let mut client = client(connector);

        block_on(client.send_message("1001", "Voltage: 1.00 V\n")).unwrap();

        let sent = &client.connector().sent()[0];
        assert!(sent.starts_with("POST /bot123:ABC/sendMessage HTTP/1.1\r\n"));
        assert!(sent.contains("Content-Type: application/json\r\n"));
        assert!(sent.ends_with(r#"{"chat_id":"1001","text":"Voltage: 1.00 V\n"}"#));
    }
}
