use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::LlmError;
use crate::settings::{LlmFlavor, LlmSettings};

const SYSTEM_PROMPT: &str = "\
You restructure text that was extracted from a public web page.

The input is a JSON object whose keys are the page's visible headings, in page \
order, and whose values are the text found under each heading. It may be \
followed by a `=== SOCIAL MEDIA LINKS ===` block listing profile URLs.

Rules:
- Do not summarize, paraphrase or add anything. Keep the original wording.
- Keep every piece of meaningful visible content.
- Drop leftovers that are not content: navigation labels, cookie or legal \
notices, advertising, accessibility boilerplate.
- Group the content by heading and keep line breaks and list items.
- If a SOCIAL MEDIA LINKS block is present, repeat it unchanged at the end.
- Output plain text only, no HTML, JSON or commentary, in this layout:

=== HEADING ===
content
";

/// Turns structured section text into restructured prose. The output is opaque.
pub trait Restructurer {
    fn restructure(&self, input: &str) -> impl Future<Output = Result<String, LlmError>> + Send;
}

#[derive(Debug, Clone)]
enum Auth {
    ApiKeyHeader(String),
    Bearer(String),
}

/// Chat-completions client for Azure OpenAI deployments or OpenAI-compatible APIs.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: Client,
    url: String,
    auth: Auth,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_input_chars: usize,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

impl ChatClient {
    pub fn new(settings: &LlmSettings) -> Result<Self, LlmError> {
        let endpoint = settings
            .endpoint
            .as_deref()
            .ok_or(LlmError::NotConfigured("llm.endpoint"))?
            .trim_end_matches('/');
        let api_key = settings
            .api_key
            .clone()
            .ok_or(LlmError::NotConfigured("llm.api_key"))?;
        let model = settings
            .model
            .clone()
            .ok_or(LlmError::NotConfigured("llm.model"))?;

        let (url, auth) = match settings.flavor {
            LlmFlavor::Azure => (
                format!(
                    "{}/openai/deployments/{}/chat/completions?api-version={}",
                    endpoint, model, settings.api_version
                ),
                Auth::ApiKeyHeader(api_key),
            ),
            LlmFlavor::OpenAi => (
                format!("{}/chat/completions", endpoint),
                Auth::Bearer(api_key),
            ),
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(ChatClient {
            client,
            url,
            auth,
            model,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            max_input_chars: settings.max_input_chars,
        })
    }
}

impl Restructurer for ChatClient {
    async fn restructure(&self, input: &str) -> Result<String, LlmError> {
        let (text, dropped) = truncate_chars(input, self.max_input_chars);
        if dropped > 0 {
            warn!(
                dropped,
                limit = self.max_input_chars,
                "Input too long for the model, truncated"
            );
        }

        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: text },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let request = self.client.post(&self.url).json(&body);
        let request = match &self.auth {
            Auth::ApiKeyHeader(key) => request.header("api-key", key),
            Auth::Bearer(key) => request.bearer_auth(key),
        };

        info!(chars = text.chars().count(), "Sending text to model {}", self.model);
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

/// Cut `text` to at most `max` chars. Returns the kept prefix and the number of chars dropped.
fn truncate_chars(text: &str, max: usize) -> (&str, usize) {
    match text.char_indices().nth(max) {
        Some((idx, _)) => (&text[..idx], text[idx..].chars().count()),
        None => (text, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn settings(endpoint: String, flavor: LlmFlavor) -> LlmSettings {
        LlmSettings {
            endpoint: Some(endpoint),
            api_key: Some("secret".into()),
            model: Some("gpt-4o".into()),
            flavor,
            ..LlmSettings::default()
        }
    }

    fn reply(content: &str) -> String {
        json!({ "choices": [ { "message": { "role": "assistant", "content": content } } ] }).to_string()
    }

    #[test]
    fn truncates_on_char_boundary() {
        assert_eq!(truncate_chars("héllo", 2), ("hé", 3));
        assert_eq!(truncate_chars("abc", 3), ("abc", 0));
        assert_eq!(truncate_chars("", 0), ("", 0));
    }

    #[test]
    fn missing_settings_are_reported() {
        let err = ChatClient::new(&LlmSettings::default()).unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured("llm.endpoint")));
    }

    #[tokio::test]
    async fn azure_deployment_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/openai/deployments/gpt-4o/chat/completions")
            .match_query(Matcher::UrlEncoded(
                "api-version".into(),
                "2024-03-01-preview".into(),
            ))
            .match_header("api-key", "secret")
            .match_body(Matcher::PartialJson(json!({
                "max_tokens": 4096,
                "messages": [ { "role": "system" }, { "role": "user", "content": "{\"A\":\"a\"}" } ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(reply("  === A ===\na  "))
            .create_async()
            .await;

        let client = ChatClient::new(&settings(format!("{}/", server.url()), LlmFlavor::Azure)).unwrap();
        let out = client.restructure("{\"A\":\"a\"}").await.unwrap();
        assert_eq!(out, "=== A ===\na");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn openai_request_uses_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::PartialJson(json!({ "model": "gpt-4o" })))
            .with_status(200)
            .with_body(reply("ok"))
            .create_async()
            .await;

        let client =
            ChatClient::new(&settings(format!("{}/v1", server.url()), LlmFlavor::OpenAi)).unwrap();
        assert_eq!(client.restructure("x").await.unwrap(), "ok");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn error_status_carries_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", Matcher::Any)
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;

        let client = ChatClient::new(&settings(server.url(), LlmFlavor::OpenAi)).unwrap();
        let err = client.restructure("x").await.unwrap_err();
        assert!(matches!(err, LlmError::Status { status: 429, ref body } if body == "slow down"));
    }

    #[tokio::test]
    async fn empty_choices_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", Matcher::Any)
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let client = ChatClient::new(&settings(server.url(), LlmFlavor::OpenAi)).unwrap();
        assert!(matches!(
            client.restructure("x").await,
            Err(LlmError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn long_input_is_truncated_before_sending() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .match_body(Matcher::PartialJson(json!({
                "messages": [ { "role": "system" }, { "role": "user", "content": "abcd" } ]
            })))
            .with_status(200)
            .with_body(reply("done"))
            .create_async()
            .await;

        let mut s = settings(server.url(), LlmFlavor::OpenAi);
        s.max_input_chars = 4;
        let client = ChatClient::new(&s).unwrap();
        assert_eq!(client.restructure("abcdefgh").await.unwrap(), "done");
        mock.assert_async().await;
    }
}
