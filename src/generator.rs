//! Weekly plan generation through the Gemini `generateContent` REST API.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate, trimmed.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
            .trim()
            .to_string()
    }
}

pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, model: &str) -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, api_key, model)
    }

    pub fn with_base_url(base_url: &str, api_key: Option<String>, model: &str) -> Result<Self> {
        let api_key = api_key.filter(|key| !key.trim().is_empty()).context(
            "No Gemini API key configured. Set google_api_key in the settings file or GOOGLE_API_KEY.",
        )?;

        Ok(GeminiClient {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        })
    }

    /// Send `prompt` and return the model's reply text.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        debug!(model = %self.model, prompt_len = prompt.len(), "generateContent");

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to reach the Gemini API")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API returned {}: {}", status, body.trim());
        }

        let reply: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse the Gemini API response")?;

        let text = reply.text();
        if text.is_empty() {
            if let Some(reason) = reply.prompt_feedback.and_then(|f| f.block_reason) {
                anyhow::bail!("Gemini blocked the prompt: {}", reason);
            }
            anyhow::bail!("Gemini returned an empty reply");
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GeminiClient {
        GeminiClient::with_base_url(&server.uri(), Some("key-123".to_string()), "gemini-2.5-pro")
            .unwrap()
    }

    #[test]
    fn api_key_is_required() {
        assert!(GeminiClient::new(None, "gemini-2.5-pro").is_err());
        assert!(GeminiClient::new(Some("  ".to_string()), "gemini-2.5-pro").is_err());
    }

    #[tokio::test]
    async fn returns_trimmed_reply_text() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-pro:generateContent"))
            .and(header("x-goog-api-key", "key-123"))
            .and(body_json(json!({"contents": [{"parts": [{"text": "plan my week"}]}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"parts": [{"text": "  {\"events\": "}, {"text": "[]}\n"}]}
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = client(&server).generate("plan my week").await.unwrap();
        assert_eq!(text, "{\"events\": []}");
    }

    #[tokio::test]
    async fn reports_http_errors_and_blocked_prompts() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-pro:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [],
                "promptFeedback": {"blockReason": "SAFETY"}
            })))
            .mount(&server)
            .await;

        let err = client(&server).generate("x").await.unwrap_err();
        assert!(err.to_string().contains("SAFETY"));

        let failing = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("API key not valid"))
            .mount(&failing)
            .await;

        let err = client(&failing).generate("x").await.unwrap_err();
        assert!(err.to_string().contains("400"));
        assert!(err.to_string().contains("API key not valid"));
    }
}
